//! Crate-wide error type.
//!
//! Storage and extractor failures are surfaced as-is; nothing in here
//! retries. Callers decide whether an operation is worth repeating.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResonateError {
    #[error("config error: {0}")]
    Config(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("extract error: {0}")]
    Extract(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<sqlx::Error> for ResonateError {
    fn from(e: sqlx::Error) -> Self { ResonateError::Db(e.to_string()) }
}

impl From<serde_json::Error> for ResonateError {
    fn from(e: serde_json::Error) -> Self { ResonateError::Parse(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, ResonateError>;
