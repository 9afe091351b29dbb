//! State Store Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A state store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for state store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The document (or its directory) could not be opened, locked, read or written.
    #[display("state document unavailable: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The document exists but is not valid JSON of the expected shape.
    /// Retrying won't help; inspect or remove the file.
    #[display("state document is corrupt: {}", _0.display())]
    Corrupt(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
