mod bingo;
mod bounties;
mod clan;
mod operators;
mod proof;

pub use bingo::*;
pub use bounties::*;
pub use clan::*;
pub use operators::*;
pub use proof::*;

use clanhub_core::CoreError;
use thiserror::Error;

use crate::infra::{
    blob::Error as BlobError, db::DatabaseWriteError, stats::Error as StatsError,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("problem querying db: {0}")]
    DbError(#[from] sqlx::Error),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for Error {
    fn from(e: CoreError) -> Self {
        Error::BadRequest(e.to_string())
    }
}

impl From<DatabaseWriteError> for Error {
    fn from(e: DatabaseWriteError) -> Self {
        match e {
            DatabaseWriteError::Sqlx(e) => Error::DbError(e),
            e => Error::Internal(e.to_string()),
        }
    }
}

impl From<StatsError> for Error {
    fn from(e: StatsError) -> Self {
        match e {
            StatsError::NotFound(msg) => Error::NotFound(msg),
            e => Error::Upstream(e.to_string()),
        }
    }
}

impl From<BlobError> for Error {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::NotFound(msg) => Error::NotFound(msg),
            BlobError::InvalidName(name) => Error::BadRequest(format!("invalid file name {}", name)),
            e => Error::Upstream(e.to_string()),
        }
    }
}
