//! Shared error types

use thiserror::Error;

/// Rule violations detected before anything is persisted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid board: {0}")]
    InvalidBoard(String),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
