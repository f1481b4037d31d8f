//! # stremsync model
//!
//! Domain and wire types shared by the stremsync reconciliation engine.
//!
//! This crate provides:
//! - Addon descriptors and manifest-URL normalization
//! - Manifest JSON parsing, including catalog search normalization
//! - Desired-state records (group membership order, per-user overrides)
//! - Sync outcome summaries
//! - JSON payload types for the addon-collection and device-link APIs
//!
//! ## Key Invariants
//!
//! - Addon identity is the normalized manifest URL; comparison is
//!   case-insensitive, storage preserves case
//! - Group order is significant and carried through unchanged
//! - Exclusion wins over protection when a key is in both override sets
//! - Remote snapshots are ephemeral and never cached across sync runs

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod addon;
mod desired;
mod error;
mod ids;
pub mod wire;

pub use addon::{
    normalize_manifest_url, AddonDescriptor, AddonKey, CatalogRef, ExtraProp, Manifest,
    ManifestCatalog, ManifestResource,
};
pub use desired::{GroupDesiredSet, RemoteSnapshot, SyncOutcome, SyncStatus, UserOverrides};
pub use error::{ModelError, ModelResult};
pub use ids::{AuthKey, GroupId, UserId};
