#![allow(dead_code)]

use fasttext_core::core::dictionary::Dictionary;
use fasttext_core::core::matrix::DenseMatrix;
use fasttext_core::core::types::{Args, LossName, ModelName};
use fasttext_core::{save_model, FastText};
use std::path::{Path, PathBuf};

/// vocabulary {"cat": 0, "dog": 1}, labels {"__label__animal": 0}, dim 2, 4 buckets.
pub fn golden_model(loss: LossName) -> FastText {
    let args = Args { dim: 2, bucket: 4, loss, ..Args::default() };
    let dict = Dictionary::from_counts(&args, &[("cat", 2), ("dog", 1)], &[("__label__animal", 3)]).unwrap();
    let input = DenseMatrix::from_rows(&[
        vec![1.0, 0.5],
        vec![0.5, 1.0],
        vec![0.0, 0.0],
        vec![0.0, 0.0],
        vec![0.0, 0.0],
        vec![0.0, 0.0],
    ])
    .unwrap();
    let output = DenseMatrix::from_rows(&[vec![2.0, -2.0]]).unwrap();
    FastText::new(args, 12, dict, input, output).unwrap()
}

pub const WORDS: [&str; 8] = ["the", "movie", "was", "great", "awful", "plot", "actors", "boring"];
pub const LABELS: [&str; 5] = ["__label__pos", "__label__neg", "__label__neutral", "__label__spam", "__label__other"];

/// A classifier with character n-grams and word bigrams, deterministic weights.
pub fn classifier(loss: LossName, bias: f32) -> FastText {
    let args = Args { dim: 4, bucket: 16, minn: 2, maxn: 3, word_ngrams: 2, loss, ..Args::default() };
    let words: Vec<(&str, i64)> = WORDS.iter().enumerate().map(|(i, w)| (*w, 100 - i as i64)).collect();
    let labels: Vec<(&str, i64)> = LABELS.iter().enumerate().map(|(i, l)| (*l, 50 - 5 * i as i64)).collect();
    let dict = Dictionary::from_counts(&args, &words, &labels).unwrap();
    let rows = dict.input_rows();
    let input = DenseMatrix::from_vec(
        rows,
        4,
        (0..rows * 4).map(|i| ((i as f32) * 0.731).sin() * 0.5).collect(),
    )
    .unwrap();
    let output = DenseMatrix::from_vec(
        LABELS.len(),
        4,
        (0..LABELS.len() * 4).map(|i| ((i as f32) * 1.37).cos() + bias).collect(),
    )
    .unwrap();
    FastText::new(args, 12, dict, input, output).unwrap()
}

/// Skip-gram style embedding model with character n-grams.
pub fn embeddings() -> FastText {
    let args = Args {
        dim: 3,
        bucket: 8,
        minn: 3,
        maxn: 4,
        model: ModelName::SkipGram,
        loss: LossName::NegativeSampling,
        ..Args::default()
    };
    let words: Vec<(&str, i64)> = WORDS.iter().map(|w| (*w, 1)).collect();
    let dict = Dictionary::from_counts(&args, &words, &[]).unwrap();
    let rows = dict.input_rows();
    let input = DenseMatrix::from_vec(rows, 3, (0..rows * 3).map(|i| ((i as f32) * 0.41).sin()).collect()).unwrap();
    let output = DenseMatrix::zeros(WORDS.len(), 3);
    FastText::new(args, 12, dict, input, output).unwrap()
}

pub fn write_model_file(dir: &Path, file: &str, model: &FastText) -> PathBuf {
    let path = dir.join(file);
    save_model(model, &path).unwrap();
    path
}
