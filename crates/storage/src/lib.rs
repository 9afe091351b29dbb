//! Storage primitives shared by every tier of the media vault.
//!
//! A tier is a plain directory tree laid out as
//! `{root}/{prefix}-{quality}/{title}/{relative path}`. This crate knows
//! nothing about quality ranking or caches; it provides the vocabulary
//! ([`Tier`], [`IdentityKey`], [`ExtendedInfo`]) and the blocking filesystem
//! operations the reconciliation engine is built from.

pub mod error;
mod file;
pub mod fs;
mod key;
mod path;
mod tier;

pub use crate::file::{ExtendedInfo, SIDECAR_EXTENSION, sidecar_path};
pub use crate::key::IdentityKey;
pub use crate::path::{is_single_component, validate as validate_path};
pub use crate::tier::Tier;
