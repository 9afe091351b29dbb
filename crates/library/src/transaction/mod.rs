//! File transactions: planning the difference between expected and actual
//! tier contents, and applying it to the filesystem.
//!
//! [`plan`] turns the expected cache and merged view into a list of
//! [`FileTransaction`]s; [`apply`] performs them (or, on a dry run, only
//! classifies them) and returns a [`FileTransactionSummary`] plus the
//! [`FileSequenceTransaction`] audit log of what physically happened.

mod apply;
pub mod error;
mod plan;

pub use self::apply::{ApplyFailure, ApplyOptions, ApplyReport, apply};
pub use self::plan::{PlanInputs, plan, snapshot};

use crate::models::MediaItem;
use derive_more::Display;
use serde::Serialize;
use std::path::PathBuf;

/// Kind of a planned file operation, in apply priority order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    #[display("delete")]
    Delete,
    #[display("link")]
    Link,
    #[display("copy")]
    Copy,
    #[display("move")]
    Move,
}
impl TransactionKind {
    /// Lower runs first when deletes are forced ahead of everything else.
    pub fn priority(self) -> u8 {
        match self {
            Self::Delete => 0,
            Self::Link => 1,
            Self::Copy => 2,
            Self::Move => 3,
        }
    }
}

/// What to do when a link, copy or move finds its destination occupied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExistingFileAction {
    #[default]
    Overwrite,
    Skip,
    /// Skip when source and destination have the same size (and, for hard
    /// links on Unix, are already the same file).
    SkipIfSameSize,
}

/// One planned operation. Consumed once by [`apply`]; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTransaction {
    pub kind: TransactionKind,
    /// File to read from, or the file to remove for [`TransactionKind::Delete`].
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub existing: ExistingFileAction,
    /// Written as a JSON sidecar next to the destination when enabled.
    #[serde(skip)]
    pub metadata: Option<Box<MediaItem>>,
}
impl FileTransaction {
    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: TransactionKind::Delete,
            source: path.into(),
            destination: None,
            existing: ExistingFileAction::default(),
            metadata: None,
        }
    }

    pub fn transfer(
        kind: TransactionKind,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        existing: ExistingFileAction,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
            destination: Some(destination.into()),
            existing,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, item: MediaItem) -> Self {
        self.metadata = Some(Box::new(item));
        self
    }
}

/// Physical action recorded in the audit log.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequenceOperation {
    CreateFolder,
    Delete,
    Link,
    Copy,
    Move,
    WriteMetadata,
    DeleteFolder,
}
impl From<TransactionKind> for SequenceOperation {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Delete => Self::Delete,
            TransactionKind::Link => Self::Link,
            TransactionKind::Copy => Self::Copy,
            TransactionKind::Move => Self::Move,
        }
    }
}

/// Append-only record of one action actually taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSequenceTransaction {
    pub operation: SequenceOperation,
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
}

/// Classification of every transaction in one apply call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileTransactionSummary {
    /// Copied or moved to a destination that did not exist.
    pub added: Vec<PathBuf>,
    /// Destination existed and was replaced.
    pub updated: Vec<PathBuf>,
    /// Destination existed and the existing-file policy kept it.
    pub skipped: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    /// Hard-linked to a destination that did not exist.
    pub linked: Vec<PathBuf>,
}
impl FileTransactionSummary {
    /// Whether nothing changed (skips aside).
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty() && self.linked.is_empty()
    }
}
