//! Unified error types for crawlgate.
//!
//! Each variant carries a stable uppercase code in its message so log
//! lines can be grepped and alerted on without parsing.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the core and client crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a relative manifest path).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure talking to an upstream (connect, TLS, timeout, body read).
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Upstream answered, but not with a cacheable response.
    #[error("NOT_CACHEABLE: {url} returned {status}")]
    NotCacheable { url: String, status: u16 },

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored headers could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt headers: {0}")]
    CorruptHeaders(String),

    /// The named cache generation does not exist.
    #[error("NOT_CACHED: unknown generation {0}")]
    UnknownGeneration(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptHeaders(err.to_string())
    }
}
