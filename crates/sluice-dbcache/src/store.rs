use crate::key::DbCacheKey;
use crate::stats::{DbCacheStats, StatsCounters};
use parking_lot::RwLock;
use sluice_core::RowMeta;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory map from [`DbCacheKey`] to the row schema that operation produces.
///
/// Every method takes `&self` and is safe to call from any number of threads. Schemas are cloned
/// on the way in and on the way out, so neither the caller that stored a schema nor any caller
/// that retrieved one can mutate what the cache holds.
///
/// While inactive, [`DbCache::put`] is ignored and [`DbCache::get`] always misses, but existing
/// entries are retained and become visible again on [`DbCache::activate`].
#[derive(Debug)]
pub struct DbCache {
    entries: RwLock<HashMap<DbCacheKey, RowMeta>>,
    active: AtomicBool,
    stats: StatsCounters,
}

impl Default for DbCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DbCache {
    /// Creates an empty, active cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            active: AtomicBool::new(true),
            stats: StatsCounters::default(),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn activate(&self) {
        self.set_active(true);
    }

    pub fn deactivate(&self) {
        self.set_active(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stores a copy of `schema` under `key`, replacing any previous entry. No-op while inactive.
    pub fn put(&self, key: DbCacheKey, schema: &RowMeta) {
        if !self.is_active() {
            return;
        }
        self.insert(key, schema.clone());
        self.stats.record_put();
    }

    /// Inserts regardless of the active flag and without counting a put. Used when loading from
    /// disk.
    pub(crate) fn insert(&self, key: DbCacheKey, schema: RowMeta) {
        self.entries.write().insert(key, schema);
    }

    /// Returns a fresh copy of the schema cached for `key`.
    ///
    /// `None` is a cache miss: the key is absent or the cache is inactive.
    pub fn get(&self, key: &DbCacheKey) -> Option<RowMeta> {
        if !self.is_active() {
            self.stats.record_miss();
            return None;
        }

        let schema = self.peek(key);
        if schema.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        schema
    }

    /// Like [`DbCache::get`] but ignores the active flag and doesn't count towards statistics.
    pub fn peek(&self, key: &DbCacheKey) -> Option<RowMeta> {
        self.entries.read().get(key).cloned()
    }

    /// Number of entries held, regardless of the active flag.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains_key(&self, key: &DbCacheKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Snapshot of the current keys, in no particular order.
    pub fn keys(&self) -> Vec<DbCacheKey> {
        self.entries.read().keys().cloned().collect()
    }

    /// Snapshot of every entry (deep copies), in no particular order.
    pub fn entries(&self) -> Vec<(DbCacheKey, RowMeta)> {
        self.entries
            .read()
            .iter()
            .map(|(key, schema)| (key.clone(), schema.clone()))
            .collect()
    }

    /// Drops cached schemas.
    ///
    /// With `None`, the whole map is replaced by an empty one and the cache is re-activated. With
    /// `Some(database)`, only entries whose key matches that database are removed and the active
    /// flag is left alone.
    pub fn invalidate(&self, database: Option<&str>) {
        match database {
            None => self.invalidate_all(),
            Some(database) => {
                self.invalidate_database(database);
            }
        }
    }

    /// Empties the cache and forces it active.
    ///
    /// A `put` that races with this call may land in the discarded map and be lost.
    pub fn invalidate_all(&self) {
        let previous = std::mem::take(&mut *self.entries.write());
        self.set_active(true);
        self.stats.record_invalidation();
        tracing::debug!(
            target: "sluice.dbcache",
            removed = previous.len(),
            "cleared database cache"
        );
    }

    /// Removes every entry recorded against `database`; returns how many were removed.
    pub fn invalidate_database(&self, database: &str) -> usize {
        let removed = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|key, _| !key.matches_database(database));
            before - entries.len()
        };
        self.stats.record_invalidation();
        tracing::debug!(
            target: "sluice.dbcache",
            database,
            removed,
            "invalidated database cache entries"
        );
        removed
    }

    pub fn stats(&self) -> DbCacheStats {
        self.stats.snapshot(self.len())
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}
