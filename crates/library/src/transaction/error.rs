//! Error types for the [`transaction`](super) module.

use crate::transaction::TransactionKind;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A transaction error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transaction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which physical step of an apply failed.
///
/// The underlying storage error (permission denied, disk full, a hard link
/// across filesystems) is kept as the child of the error tree.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not create folder {}", _0.display())]
    CreateFolder(#[error(not(source))] PathBuf),
    #[display("could not delete {}", _0.display())]
    Delete(#[error(not(source))] PathBuf),
    #[display("could not {_0} {} to {}", _1.display(), _2.display())]
    Transfer(TransactionKind, PathBuf, PathBuf),
    #[display("could not write metadata {}", _0.display())]
    Metadata(#[error(not(source))] PathBuf),
    #[display("could not remove empty folders below {}", _0.display())]
    Prune(#[error(not(source))] PathBuf),
}
