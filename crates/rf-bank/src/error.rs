//! Error types for bank dump parsing

use thiserror::Error;

/// Bank parsing errors
#[derive(Error, Debug)]
pub enum BankError {
    #[error("Chunk {chunk} ({bank}) malformed at line {line}: {reason}")]
    ChunkParse {
        chunk: usize,
        bank: String,
        line: usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Result type for bank operations
pub type BankResult<T> = Result<T, BankError>;
