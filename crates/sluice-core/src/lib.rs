//! Core shared types for Sluice.
//!
//! This crate is intentionally small: it carries the build version identifier and the row schema
//! descriptors ([`RowMeta`], [`ValueMeta`]) that steps exchange when describing the output of a
//! database operation.

mod row;

pub use row::{RowMeta, StorageType, TrimType, ValueMeta, ValueType};

/// Version of the running Sluice build.
///
/// Persisted artifacts whose layout depends on the binary format of this build (for example the
/// database metadata cache) embed this string in their file name.
pub const SLUICE_VERSION: &str = env!("CARGO_PKG_VERSION");
