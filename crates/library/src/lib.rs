//! Tiered media library reconciliation.
//!
//! A media vault keeps a bulk source tier, a bounded fast cache tier and an
//! optional merged view (one best-quality copy of every title, built from
//! hard links) consistent with its configuration. The [`Engine`] ties the
//! stages together; every stage is also usable on its own:
//!
//! - [`scan`](scan::scan) catalogs a tier,
//! - [`resolve_merged_view`](merge::resolve_merged_view) picks the best
//!   quality per title folder,
//! - [`compute_expected_cache`](cache::compute_expected_cache) decides cache
//!   membership under the byte budget,
//! - [`plan`](transaction::plan) and [`apply`](transaction::apply) turn the
//!   expected tiers into filesystem operations.

pub mod cache;
mod engine;
pub mod error;
pub mod merge;
pub mod models;
pub mod notify;
mod requests;
pub mod scan;
pub mod sync;
#[cfg(test)]
mod test_support;
pub mod transaction;

pub use crate::engine::Engine;
pub use crate::models::{MediaGroupFolder, MediaItem, MediaItemGroup, SourceRef};
pub use crate::scan::MediaFilter;
pub use crate::sync::{Detail, SyncOptions, SyncResult, SyncStatus};
