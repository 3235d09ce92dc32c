// File: src/core/model.rs
use crate::core::dictionary::{tokenize, Dictionary};
use crate::core::matrix::{l2_norm, DenseMatrix};
use crate::core::output::{OutputModel, Scored, TopK};
use crate::core::types::{Args, EntryType, ModelName};
use crate::error::{FastTextError, Result};
use std::sync::OnceLock;

/// Width of the fixed "top intents" answer.
pub const MAX_INTENTIONS: usize = 6;

/// Below this norm a query vector is treated as "no information".
const MIN_QUERY_NORM: f32 = 1e-8;

/// A fully loaded, immutable model. Every query method is a pure function of
/// the model and its arguments, so one instance can serve any number of
/// threads at once.
#[derive(Debug)]
pub struct FastText {
    args: Args,
    version: i32,
    dict: Dictionary,
    input: DenseMatrix,
    output: OutputModel,
    /// Unit-norm word vectors, built on the first similarity query.
    word_vectors: OnceLock<DenseMatrix>,
}

impl FastText {
    /// Assembles a model, checking that every part agrees on its shape.
    pub fn new(args: Args, version: i32, dict: Dictionary, input: DenseMatrix, output: DenseMatrix) -> Result<Self> {
        if input.rows() != dict.input_rows() {
            return Err(FastTextError::corrupt(format!(
                "input matrix has {} rows, dictionary addresses {}",
                input.rows(),
                dict.input_rows()
            )));
        }
        if input.cols() != args.dim || output.cols() != args.dim {
            return Err(FastTextError::corrupt(format!(
                "matrix widths {}/{} disagree with dimension {}",
                input.cols(),
                output.cols(),
                args.dim
            )));
        }
        let counts = match args.model {
            ModelName::Supervised => dict.label_counts(),
            ModelName::Cbow | ModelName::SkipGram => dict.word_counts(),
        };
        if output.rows() != counts.len() {
            return Err(FastTextError::corrupt(format!(
                "output matrix has {} rows for {} classes",
                output.rows(),
                counts.len()
            )));
        }
        let output = OutputModel::new(output, args.loss, &counts)?;
        Ok(Self { args, version, dict, input, output, word_vectors: OnceLock::new() })
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn input_matrix(&self) -> &DenseMatrix {
        &self.input
    }

    pub fn output_model(&self) -> &OutputModel {
        &self.output
    }

    pub fn dimension(&self) -> usize {
        self.args.dim
    }

    pub fn is_supervised(&self) -> bool {
        self.args.model == ModelName::Supervised
    }

    /// Mean of the input rows a query line activates. Zero when nothing matches.
    pub fn hidden(&self, text: &str) -> Vec<f32> {
        self.input.average_rows(&self.dict.line_rows(text))
    }

    /// Top `k` labels for `text` with their probabilities, best first.
    pub fn predict(&self, text: &str, k: usize, threshold: f32) -> Result<Vec<(String, f32)>> {
        if k == 0 {
            return Err(FastTextError::invalid_argument("k needs to be 1 or higher"));
        }
        if !self.is_supervised() {
            return Err(FastTextError::Inference(
                "model needs to be supervised for prediction".into(),
            ));
        }
        let rows = self.dict.line_rows(text);
        if rows.is_empty() {
            tracing::debug!("query has no known words or n-grams");
            return Ok(Vec::new());
        }
        let hidden = self.input.average_rows(&rows);
        Ok(self
            .output
            .predict(&hidden, k, threshold)
            .into_iter()
            .map(|s| (self.dict.label(s.id).to_string(), s.score.exp().min(1.0)))
            .collect())
    }

    /// The `MAX_INTENTIONS` best labels as parallel label/score vectors.
    pub fn predict_max_intention(&self, text: &str) -> Result<(Vec<String>, Vec<f32>)> {
        Ok(self.predict(text, MAX_INTENTIONS, 0.0)?.into_iter().unzip())
    }

    /// Stored row for a known word; mean of its n-gram buckets otherwise.
    pub fn word_vector(&self, word: &str) -> Vec<f32> {
        self.input.average_rows(&self.dict.word_rows(word))
    }

    /// Supervised models average the same rows prediction uses; embedding
    /// models average the unit-normalized vectors of the words.
    pub fn sentence_vector(&self, text: &str) -> Vec<f32> {
        if self.is_supervised() {
            return self.hidden(text);
        }
        let mut sum = vec![0.0; self.args.dim];
        let mut count = 0usize;
        for token in tokenize(text) {
            let known = self.dict.get_id(token);
            let is_word = match known {
                Some(id) => self.dict.entries()[id].entry_type == EntryType::Word,
                None => EntryType::of_token(token) == EntryType::Word,
            };
            if !is_word {
                continue;
            }
            let vec = self.word_vector(token);
            let norm = l2_norm(&vec);
            let scale = if norm > 0.0 { 1.0 / norm } else { 1.0 };
            sum.iter_mut().zip(&vec).for_each(|(s, v)| *s += v * scale);
            count += 1;
        }
        if count > 0 {
            sum.iter_mut().for_each(|s| *s /= count as f32);
        }
        sum
    }

    fn normalized_word_vectors(&self) -> &DenseMatrix {
        self.word_vectors.get_or_init(|| {
            tracing::debug!(words = self.dict.nwords(), "normalizing word vectors");
            self.input.normalized_rows(self.dict.nwords())
        })
    }

    /// The `k` words closest to `query` by cosine similarity, best first,
    /// excluding the query itself when it is a known word.
    /// O(V * dim) per query.
    pub fn most_similar(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let query_vec = self.word_vector(query);
        let query_norm = l2_norm(&query_vec);
        if query_norm < MIN_QUERY_NORM {
            return Vec::new();
        }
        let banned = self.dict.word_id(query);
        let vectors = self.normalized_word_vectors();

        let mut best = TopK::new(k);
        for id in (0..self.dict.nwords()).filter(|&id| Some(id) != banned) {
            let similarity = vectors.dot_row(&query_vec, id) / query_norm;
            best.offer(Scored { score: similarity, id });
        }
        best.into_sorted_vec()
            .into_iter()
            .map(|s| (self.dict.word(s.id).to_string(), s.score.clamp(-1.0, 1.0)))
            .collect()
    }

    pub fn word_count(&self) -> usize {
        self.dict.nwords()
    }

    pub fn words(&self) -> Vec<String> {
        self.dict.words().map(str::to_string).collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.dict.labels().map(str::to_string).collect()
    }
}
