// File: src/error.rs
use thiserror::Error;

/// Everything that can go wrong while loading or querying a model.
#[derive(Debug, Error)]
pub enum FastTextError {
    /// The model file could not be opened, read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a model, is truncated, or disagrees with itself.
    #[error("corrupt model: {0}")]
    CorruptModel(String),

    /// The magic number matched but the format version is unknown.
    #[error("unsupported model format version {0}")]
    UnsupportedVersion(i32),

    /// A well-formed model using a feature this engine does not implement.
    #[error("unsupported model feature: {0}")]
    UnsupportedFeature(String),

    #[error("no model registered under '{0}'")]
    ModelNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The model exists but cannot answer this kind of query.
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl FastTextError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptModel(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True for failures the caller can fix by loading the model and retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ModelNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, FastTextError>;
