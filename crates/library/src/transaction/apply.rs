use crate::transaction::error::{Error, ErrorKind, Result};
use crate::transaction::{
    ExistingFileAction, FileSequenceTransaction, FileTransaction, FileTransactionSummary, SequenceOperation,
    TransactionKind,
};
use exn::ResultExt;
use mvault_config::TransactionSettings;
use mvault_storage::{fs, sidecar_path};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::instrument;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub write_metadata: bool,
    /// Classify only; touch nothing and record no sequence.
    pub dry_run: bool,
}
impl ApplyOptions {
    pub fn new(settings: TransactionSettings, dry_run: bool) -> Self {
        Self {
            write_metadata: settings.write_metadata,
            dry_run,
        }
    }
}

/// What an apply call did (or, on a dry run, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub summary: FileTransactionSummary,
    /// Physical actions in the order they happened; always empty on a dry run.
    pub sequence: Vec<FileSequenceTransaction>,
}

/// An apply call that stopped part-way.
///
/// Nothing is rolled back: `report` describes exactly what was done before
/// `error` happened, and the next pass re-plans from that state.
#[derive(Debug)]
pub struct ApplyFailure {
    pub report: ApplyReport,
    pub error: Error,
}

/// Applies `transactions`, then removes folders left empty below `roots`.
///
/// Transactions run in [`TransactionKind::priority`] order (every delete
/// before any link, copy or move), keeping plan order within a kind. Aborts
/// on the first failure.
#[instrument(level = "debug", skip_all, fields(transactions = transactions.len(), dry_run = options.dry_run))]
pub fn apply(
    mut transactions: Vec<FileTransaction>,
    options: ApplyOptions,
    roots: &[&Path],
) -> std::result::Result<ApplyReport, ApplyFailure> {
    transactions.sort_by_key(|t| t.kind.priority());
    let mut applier = Applier {
        options,
        report: ApplyReport::default(),
    };
    match applier.run(&transactions, roots) {
        Ok(()) => {
            let summary = &applier.report.summary;
            tracing::info!(
                added = summary.added.len(),
                updated = summary.updated.len(),
                linked = summary.linked.len(),
                deleted = summary.deleted.len(),
                skipped = summary.skipped.len(),
                dry_run = options.dry_run,
                "Applied transactions"
            );
            Ok(applier.report)
        },
        Err(error) => {
            tracing::error!(error = %error, actions = applier.report.sequence.len(), "Apply aborted");
            Err(ApplyFailure {
                report: applier.report,
                error,
            })
        },
    }
}

struct Applier {
    options: ApplyOptions,
    report: ApplyReport,
}

impl Applier {
    fn run(&mut self, transactions: &[FileTransaction], roots: &[&Path]) -> Result<()> {
        for transaction in transactions {
            match (transaction.kind, &transaction.destination) {
                (TransactionKind::Delete, _) => self.delete(&transaction.source)?,
                (_, Some(destination)) => self.transfer(transaction, destination)?,
                (kind, None) => {
                    tracing::warn!(%kind, source = %transaction.source.display(), "Transaction has no destination; ignoring");
                },
            }
        }
        if !self.options.dry_run {
            for root in roots {
                for folder in fs::prune_empty_dirs(root).or_raise(|| ErrorKind::Prune(root.to_path_buf()))? {
                    self.record(SequenceOperation::DeleteFolder, folder, None);
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, operation: SequenceOperation, source: PathBuf, destination: Option<PathBuf>) {
        tracing::debug!(%operation, source = %source.display(), destination = ?destination, "Applied");
        self.report.sequence.push(FileSequenceTransaction {
            operation,
            source,
            destination,
        });
    }

    fn delete(&mut self, path: &Path) -> Result<()> {
        let raise = || ErrorKind::Delete(path.to_path_buf());
        if self.options.dry_run {
            if fs::exists(path).or_raise(raise)? {
                self.report.summary.deleted.push(path.to_path_buf());
            }
            return Ok(());
        }
        if fs::remove_file(path).or_raise(raise)? {
            self.record(SequenceOperation::Delete, path.to_path_buf(), None);
            self.report.summary.deleted.push(path.to_path_buf());
        }
        let sidecar = sidecar_path(path);
        if fs::remove_file(&sidecar).or_raise(|| ErrorKind::Delete(sidecar.clone()))? {
            self.record(SequenceOperation::Delete, sidecar, None);
        }
        Ok(())
    }

    fn transfer(&mut self, transaction: &FileTransaction, destination: &Path) -> Result<()> {
        let kind = transaction.kind;
        let source = transaction.source.as_path();
        let raise = || ErrorKind::Transfer(kind, source.to_path_buf(), destination.to_path_buf());

        let existing = fs::size(destination).or_raise(raise)?;
        if let Some(size) = existing
            && self.keep_existing(transaction, destination, size).or_raise(raise)?
        {
            tracing::trace!(destination = %destination.display(), "Destination up to date");
            self.report.summary.skipped.push(destination.to_path_buf());
            return Ok(());
        }
        if !self.options.dry_run {
            self.perform(transaction, destination, existing.is_some())?;
        }
        let summary = &mut self.report.summary;
        let bucket = match (existing, kind) {
            (Some(_), _) => &mut summary.updated,
            (None, TransactionKind::Link) => &mut summary.linked,
            (None, _) => &mut summary.added,
        };
        bucket.push(destination.to_path_buf());
        Ok(())
    }

    fn perform(&mut self, transaction: &FileTransaction, destination: &Path, occupied: bool) -> Result<()> {
        let kind = transaction.kind;
        let source = transaction.source.as_path();
        let raise = || ErrorKind::Transfer(kind, source.to_path_buf(), destination.to_path_buf());

        if let Some(parent) = destination.parent() {
            for folder in fs::create_dir_all(parent).or_raise(|| ErrorKind::CreateFolder(parent.to_path_buf()))? {
                self.record(SequenceOperation::CreateFolder, folder, None);
            }
        }
        if occupied {
            fs::remove_file(destination).or_raise(|| ErrorKind::Delete(destination.to_path_buf()))?;
            self.record(SequenceOperation::Delete, destination.to_path_buf(), None);
        }
        match kind {
            TransactionKind::Link => fs::hard_link(source, destination).or_raise(raise)?,
            TransactionKind::Copy => {
                fs::copy(source, destination).or_raise(raise)?;
            },
            TransactionKind::Move => fs::rename(source, destination).or_raise(raise)?,
            TransactionKind::Delete => unreachable!("deletes have no destination"),
        }
        self.record(kind.into(), source.to_path_buf(), Some(destination.to_path_buf()));

        if self.options.write_metadata
            && let Some(item) = &transaction.metadata
        {
            let sidecar = sidecar_path(destination);
            let raise = || ErrorKind::Metadata(sidecar.clone());
            let json = serde_json::to_vec_pretty(item).or_raise(raise)?;
            fs::write(&sidecar, &json).or_raise(raise)?;
            self.record(SequenceOperation::WriteMetadata, destination.to_path_buf(), Some(sidecar));
        }
        Ok(())
    }

    /// Whether the existing-file policy keeps an occupied destination.
    fn keep_existing(
        &self,
        transaction: &FileTransaction,
        destination: &Path,
        size: u64,
    ) -> mvault_storage::error::Result<bool> {
        match transaction.existing {
            ExistingFileAction::Overwrite => Ok(false),
            ExistingFileAction::Skip => Ok(true),
            ExistingFileAction::SkipIfSameSize => {
                if fs::size(&transaction.source)? != Some(size) {
                    return Ok(false);
                }
                // Same size but a different inode is a stale link.
                match transaction.kind == TransactionKind::Link && cfg!(unix) {
                    true => fs::is_same_file(&transaction.source, destination),
                    false => Ok(true),
                }
            },
        }
    }
}
