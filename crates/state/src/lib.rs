//! Persistent state shared between reconciliation passes and the requests
//! that feed them.
//!
//! A single JSON document per store holds the pending cache add/remove
//! requests, the library-changed counter used to debounce passes, and the
//! manifest of what the engine last put in the cache tier.

mod document;
pub mod error;
mod store;

pub use crate::document::{Commit, Manifest, ManifestEntry, StateDocument};
pub use crate::store::{STATE_FILE, StateStore};
