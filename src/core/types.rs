// src/core/types.rs
use crate::error::{FastTextError, Result};
use serde::{Deserialize, Serialize};

/// Dense, zero-based index of a dictionary entry. Words come first, labels after.
pub type WordId = usize;

/// Row index into the input embedding matrix (word row or n-gram bucket row).
pub type RowId = usize;

/// End-of-sentence token stored in unsupervised vocabularies.
pub const EOS: &str = "</s>";
/// Word boundary markers wrapped around a token before extracting character n-grams.
pub const BOW: &str = "<";
pub const EOW: &str = ">";
/// Prefix that marks a token as a label rather than a word.
pub const LABEL_PREFIX: &str = "__label__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Word,
    Label,
}

impl EntryType {
    pub fn from_code(code: i8) -> Result<Self> {
        match code {
            0 => Ok(Self::Word),
            1 => Ok(Self::Label),
            other => Err(FastTextError::corrupt(format!("unknown entry type {other}"))),
        }
    }

    pub fn code(self) -> i8 {
        match self {
            Self::Word => 0,
            Self::Label => 1,
        }
    }

    /// Classifies a token that is not in the dictionary.
    pub fn of_token(token: &str) -> Self {
        if token.starts_with(LABEL_PREFIX) {
            Self::Label
        } else {
            Self::Word
        }
    }
}

/// One vocabulary entry: a word or a classification label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub word: String,
    /// Training frequency. Drives the Huffman tree for labels; informational for words.
    pub count: i64,
    pub entry_type: EntryType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossName {
    HierarchicalSoftmax,
    NegativeSampling,
    Softmax,
    OneVsAll,
}

impl LossName {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(Self::HierarchicalSoftmax),
            2 => Ok(Self::NegativeSampling),
            3 => Ok(Self::Softmax),
            4 => Ok(Self::OneVsAll),
            other => Err(FastTextError::corrupt(format!("unknown loss code {other}"))),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::HierarchicalSoftmax => 1,
            Self::NegativeSampling => 2,
            Self::Softmax => 3,
            Self::OneVsAll => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelName {
    Cbow,
    SkipGram,
    Supervised,
}

impl ModelName {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(Self::Cbow),
            2 => Ok(Self::SkipGram),
            3 => Ok(Self::Supervised),
            other => Err(FastTextError::corrupt(format!("unknown model code {other}"))),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Cbow => 1,
            Self::SkipGram => 2,
            Self::Supervised => 3,
        }
    }
}

/// Hyperparameters stored in the model header.
///
/// Only `dim`, `word_ngrams`, `loss`, `model`, `bucket`, `minn` and `maxn` matter
/// at inference time; the rest are carried so a saved model is byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Args {
    pub dim: usize,
    pub ws: i32,
    pub epoch: i32,
    pub min_count: i32,
    pub neg: i32,
    pub word_ngrams: usize,
    pub loss: LossName,
    pub model: ModelName,
    pub bucket: usize,
    pub minn: usize,
    pub maxn: usize,
    pub lr_update_rate: i32,
    pub t: f64,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            dim: 100,
            ws: 5,
            epoch: 5,
            min_count: 1,
            neg: 5,
            word_ngrams: 1,
            loss: LossName::Softmax,
            model: ModelName::Supervised,
            bucket: 0,
            minn: 0,
            maxn: 0,
            lr_update_rate: 100,
            t: 1e-4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_file_format() {
        for loss in [
            LossName::HierarchicalSoftmax,
            LossName::NegativeSampling,
            LossName::Softmax,
            LossName::OneVsAll,
        ] {
            assert_eq!(LossName::from_code(loss.code()).unwrap(), loss);
        }
        assert_eq!(ModelName::from_code(3).unwrap(), ModelName::Supervised);
        assert!(ModelName::from_code(0).is_err());
        assert!(matches!(
            EntryType::from_code(7),
            Err(FastTextError::CorruptModel(_))
        ));
    }

    #[test]
    fn label_prefix_decides_unknown_token_type() {
        assert_eq!(EntryType::of_token("__label__spam"), EntryType::Label);
        assert_eq!(EntryType::of_token("spam"), EntryType::Word);
    }
}
