use thiserror::Error;
use vitrine_core::ComputeError;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid index dimension: {0}")]
    InvalidDimension(usize),

    #[error("Vector dimension {actual} doesn't match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate product id: {0}")]
    DuplicateProductId(u64),

    #[error("k must be at least 1")]
    InvalidK,

    #[error("Query vector contains non-finite values")]
    InvalidQuery,

    #[error("Invalid catalog entry: {0}")]
    InvalidEntry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Embedding error: {0}")]
    Compute(#[from] ComputeError),
}
