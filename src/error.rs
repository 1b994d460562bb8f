//! Centralized error types for eudoraconv.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the eudoraconv library.
///
/// Only two conditions abort a mailbox conversion: the source file cannot
/// be opened, or the destination sink cannot be written. Everything else
/// (bad dates, missing attachments, TOC anomalies) is recorded through
/// [`crate::context::ConversionContext`] and processing continues.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified mailbox file does not exist.
    #[error("Mailbox file not found: {0}")]
    FileNotFound(PathBuf),

    /// The TOC sidecar exists but carries a version word we do not know.
    #[error("Unsupported TOC index format in '{path}': version 0x{version:04x}")]
    UnsupportedIndexFormat { path: PathBuf, version: u16 },

    /// The destination mailbox sink failed.
    #[error("Mailbox sink error: {0}")]
    Sink(String),
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `ConvertError`
/// when no path context is available (rare; prefer `ConvertError::io`).
impl From<std::io::Error> for ConvertError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
