//! # dirstore testkit
//!
//! Test utilities for dirstore.
//!
//! This crate provides:
//! - Fixtures for temporary storage engines and backends
//! - Property-based test generators using proptest
//! - A concurrent contention runner for the retry wrapper
//!
//! ## Usage
//!
//! ```rust
//! use dirstore_testkit::prelude::*;
//!
//! let backend = TestBackend::memory(&["dc=example,dc=com"]);
//! assert_eq!(backend.get_entry_count(), Some(0));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
