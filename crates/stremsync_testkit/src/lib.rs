//! # Stremsync Testkit
//!
//! Test utilities for Stremsync.
//!
//! This crate provides:
//! - Addon descriptor and manifest fixtures
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stremsync_testkit::fixtures::addon;
//!
//! #[test]
//! fn test_with_addons() {
//!     let cinema = addon("https://cinema.example/manifest.json");
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
