//! Library Error Types
//!
//! Errors for the entry points that are not part of a reconciliation pass
//! (building an [`Engine`](crate::Engine), cache requests, listings). A pass
//! itself fails with [`sync::Error`](crate::sync::error::Error), and apply
//! failures carry their partial report alongside.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or updating the persistent state document failed.
    #[display("state store unavailable")]
    State { retryable: bool },
    /// The media server client could not be constructed.
    #[display("media server client unavailable")]
    MediaServer,
    /// A tier the operation needs has no configured root.
    #[display("tier {_0} is not configured")]
    TierUnavailable(#[error(not(source))] mvault_storage::Tier),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::State { retryable: true })
    }

    /// Raises a state store failure, keeping whether retrying can help.
    pub(crate) fn state(err: mvault_state::error::Error) -> Error {
        let retryable = err.is_retryable();
        err.raise(Self::State { retryable })
    }
}
