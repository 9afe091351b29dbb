//! Error types for the [`sync`](super) module.

use crate::transaction::ApplyReport;
use derive_more::{Display, Error};

/// A sync error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of a pass failed.
///
/// Every failure happens before the commit, so pending requests and the
/// change counter are left as they were and the next pass starts over.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The state document could not be read (before planning) or written
    /// (after applying). A corrupt document stays corrupt; a locked or
    /// briefly unreachable one may not.
    #[display("state store unavailable")]
    State { retryable: bool },
    /// Applying the plan stopped part-way; the report lists everything that
    /// had already been done.
    #[display("apply aborted after {} operations", _0.sequence.len())]
    Apply(#[error(not(source))] ApplyReport),
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

    /// What had been applied before the pass failed.
    pub fn partial_report(&self) -> Option<&ApplyReport> {
        match self {
            Self::Apply(report) => Some(report),
            Self::State { .. } => None,
        }
    }
}
