// src/error.rs
//! Typed errors for each pipeline seam. Binaries and glue code wrap these in
//! `anyhow` with context; inside the pipeline they are matched and absorbed.

use thiserror::Error;

/// Startup configuration problems. The only error kind allowed to stop the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("sources file {path}: {reason}")]
    Sources { path: String, reason: String },
}

/// One source (subreddit) could not be read.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http error for {source_name}: {message}")]
    Http { source_name: String, message: String },

    #[error("unexpected status {status} for {source_name}")]
    Status { source_name: String, status: u16 },

    #[error("auth failed: {0}")]
    Auth(String),

    #[error("malformed listing for {source_name}: {message}")]
    Decode { source_name: String, message: String },
}

/// A classification or summarization capability call failed.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability {0} is disabled")]
    Disabled(&'static str),

    #[error("capability request failed: {0}")]
    Request(String),

    #[error("capability returned status {0}")]
    Status(u16),

    #[error("capability returned an unexpected payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("buffer io: {0}")]
    Io(#[from] std::io::Error),

    #[error("buffer payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("buffer unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type BufferResult<T> = Result<T, BufferError>;
