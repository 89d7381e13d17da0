//! Error types for sound map building

use rf_bank::BankError;
use thiserror::Error;

use crate::container::ContainerError;

/// Sound map errors
#[derive(Error, Debug)]
pub enum SoundMapError {
    #[error("Bank error: {0}")]
    Bank(#[from] BankError),

    #[error("Container table error: {0}")]
    Container(#[from] ContainerError),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error(
        "Event {event}: sound {hash} reached with conflicting {field} ({discovered} sounds discovered)"
    )]
    MergeConflict {
        event: String,
        hash: u64,
        field: String,
        discovered: usize,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Result type for sound map operations
pub type SoundMapResult<T> = Result<T, SoundMapError>;
