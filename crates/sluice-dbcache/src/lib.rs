//! Database metadata cache.
//!
//! Describing the columns a query or table produces costs a round trip to the database, and
//! pipelines ask the same questions over and over (per step copy, per execution, per worker).
//! This crate remembers the answers:
//!
//! - [`DbCacheKey`]: a database name plus the query/table signature that was described
//! - [`DbCache`]: the thread-safe in-memory map from key to [`sluice_core::RowMeta`], with an
//!   active/inactive switch and selective invalidation by database
//! - [`codec`]: the flat binary file format used to persist the map between runs
//! - [`DbCacheService`] / [`SharedDbCache`]: binding the map to its file, loading at startup and
//!   saving on demand
//!
//! ## On-disk layout
//!
//! One file per build version: `<cache_dir>/db.cache-<version>` (see [`cache_file_path`]). The
//! file holds back-to-back `(key, schema)` records encoded with `bincode` (fixed-width integers,
//! little endian). There is no header and no record count; a version bump simply starts a new
//! file.
//!
//! The cache is an optimization only. Lookups report hit or miss and never fail; only loading and
//! saving return errors.

pub mod codec;
mod config;
mod error;
mod key;
mod service;
mod stats;
mod store;
mod util;

pub use config::{
    cache_file_path, default_cache_root, DbCacheConfig, CACHE_DIR_ENV_VAR, DB_CACHE_FILE_PREFIX,
};
pub use error::{DbCacheError, Result};
pub use key::DbCacheKey;
pub use service::{DbCacheService, SharedDbCache};
pub use stats::DbCacheStats;
pub use store::DbCache;
pub use util::BINCODE_PAYLOAD_LIMIT_BYTES;
