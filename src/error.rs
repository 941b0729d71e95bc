//! Centralized error types for mailsift.
//!
//! Only conditions that leave nothing usable are errors. Everything else
//! (unknown charsets, broken encodings, odd multipart layouts) is absorbed
//! by the parser and shows up as a content difference instead.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailsift library.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The message has no `From` header.
    #[error("Message has no From header")]
    MissingSender,

    /// The `From` header exists but holds no usable address.
    #[error("Unparsable From header: {0:?}")]
    InvalidSender(String),

    /// The top-level multipart body could not be split into any part.
    #[error("Multipart message has no identifiable parts (boundary: {boundary:?})")]
    MalformedMultipart { boundary: Option<String> },

    /// The message file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, ParseError>`.
pub type Result<T> = std::result::Result<T, ParseError>;

impl ParseError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
