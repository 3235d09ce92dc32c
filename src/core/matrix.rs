// File: src/core/matrix.rs
use crate::error::{FastTextError, Result};

/// Row-major `f32` matrix. Holds the input embeddings (one row per word and
/// per n-gram bucket) and the output weights.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl DenseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| FastTextError::corrupt(format!("matrix {rows}x{cols} overflows")))?;
        if data.len() != expected {
            return Err(FastTextError::corrupt(format!(
                "matrix {rows}x{cols} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Builds a matrix from equally sized rows. Mostly useful for synthetic models.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|row| row.len() != cols) {
            return Err(FastTextError::invalid_argument(format!(
                "row {bad} has {} values, expected {cols}",
                rows[bad].len()
            )));
        }
        Self::from_vec(rows.len(), cols, rows.concat())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn dot_row(&self, vec: &[f32], i: usize) -> f32 {
        dot(self.row(i), vec)
    }

    /// `acc += scale * row(i)`
    pub fn add_row_to(&self, acc: &mut [f32], i: usize, scale: f32) {
        for (a, &v) in acc.iter_mut().zip(self.row(i)) {
            *a += scale * v;
        }
    }

    /// Mean of the given rows; zero vector when `ids` is empty.
    pub fn average_rows(&self, ids: &[usize]) -> Vec<f32> {
        let mut out = vec![0.0; self.cols];
        for &id in ids {
            self.add_row_to(&mut out, id, 1.0);
        }
        if !ids.is_empty() {
            let inv = 1.0 / ids.len() as f32;
            out.iter_mut().for_each(|v| *v *= inv);
        }
        out
    }

    /// Copy with every row scaled to unit L2 norm. Zero rows stay zero.
    pub fn normalized_rows(&self, rows: usize) -> Self {
        let rows = rows.min(self.rows);
        let mut out = Self::zeros(rows, self.cols);
        for i in 0..rows {
            let norm = l2_norm(self.row(i));
            if norm > 0.0 {
                self.add_row_to(out.row_mut(i), i, 1.0 / norm);
            }
        }
        out
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
