use sluice_core::{ValueMeta, ValueType};
use sluice_dbcache::{DbCacheConfig, DbCacheError, DbCacheKey, DbCacheService, SharedDbCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

#[test]
fn get_returns_the_same_instance() {
    let tmp = TempDir::new().unwrap();
    let shared = SharedDbCache::new(DbCacheConfig::new(tmp.path()).with_version("test-1"));
    assert!(!shared.is_initialized());

    let first = shared.get().unwrap();
    let second = shared.get().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(shared.is_initialized());

    let key = DbCacheKey::new("warehouse", "orders");
    first.put(key.clone(), &[ValueMeta::new("id", ValueType::Integer)].into_iter().collect());
    assert!(second.get(&key).is_some());
}

#[test]
fn concurrent_first_use_opens_once() {
    let opened = Arc::new(AtomicUsize::new(0));
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("db.cache-test-1");

    let shared = {
        let opened = opened.clone();
        Arc::new(SharedDbCache::with_opener(move || {
            opened.fetch_add(1, Ordering::SeqCst);
            DbCacheService::open_at(&path, true)
        }))
    };

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || shared.get().unwrap())
        })
        .collect();
    let services: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert!(services.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn initialization_failure_is_sticky() {
    let tmp = TempDir::new().unwrap();
    let config = DbCacheConfig::new(tmp.path()).with_version("test-1");
    std::fs::write(config.cache_file_path(), [0xffu8; 5]).unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let shared = {
        let attempts = attempts.clone();
        let config = config.clone();
        SharedDbCache::with_opener(move || {
            attempts.fetch_add(1, Ordering::SeqCst);
            DbCacheService::open(&config)
        })
    };

    let first = shared.get().unwrap_err();
    assert!(matches!(*first, DbCacheError::Init { .. }), "{first}");

    // Repairing the file afterwards doesn't resurrect the cache: the failure is final.
    std::fs::remove_file(config.cache_file_path()).unwrap();
    let second = shared.get().unwrap_err();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
