use semchunk_core::ConfigError;
use thiserror::Error;

use crate::embedding::EmbeddingError;

/// Fatal failures of a chunking run. Any of these aborts the whole document.
#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("sentence segmenter unavailable: {0}")]
    SegmenterUnavailable(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("mismatched chunker inputs: {0}")]
    InputMismatch(String),

    #[error("invalid document metadata: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
