//! Error types for WolfStore

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias using WolfStore Error
pub type Result<T> = std::result::Result<T, Error>;

/// WolfStore error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Malformed or incomplete bucket/key path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Malformed Range header
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Syntactically valid range that cannot be satisfied
    #[error("Range not satisfiable (object is {total} bytes)")]
    RangeNotSatisfiable {
        /// Total object size, reported back via Content-Range
        total: u64,
    },
}

impl Error {
    /// Map to the HTTP status code used by the object API
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidPath(_) | Error::InvalidRange(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
