use sluice_core::{RowMeta, ValueMeta, ValueType};
use sluice_dbcache::{DbCache, DbCacheKey};
use std::sync::{Arc, Barrier};
use std::thread;

fn schema_for(thread_id: usize, i: usize) -> RowMeta {
    [
        ValueMeta::with_length(format!("t{thread_id}_c{i}"), ValueType::Integer, 9, 0),
        ValueMeta::new("payload", ValueType::String),
    ]
    .into_iter()
    .collect()
}

#[test]
fn concurrent_puts_and_gets_lose_nothing() {
    let cache = Arc::new(DbCache::new());
    let threads = 16;
    let iters = 200;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|thread_id| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..iters {
                    let key = DbCacheKey::new(
                        format!("db{}", thread_id % 4),
                        format!("q{thread_id}_{i}"),
                    );
                    cache.put(key.clone(), &schema_for(thread_id, i));
                    assert_eq!(cache.get(&key), Some(schema_for(thread_id, i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), threads * iters);
    let stats = cache.stats();
    assert_eq!(stats.hits, (threads * iters) as u64);
    assert_eq!(stats.puts, (threads * iters) as u64);
}

#[test]
fn readers_mutating_their_copies_do_not_interfere() {
    let cache = Arc::new(DbCache::new());
    let key = DbCacheKey::new("warehouse", "SELECT * FROM orders");
    let original = schema_for(0, 0);
    cache.put(key.clone(), &original);

    let handles: Vec<_> = (0..8)
        .map(|thread_id| {
            let cache = cache.clone();
            let key = key.clone();
            let original = original.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let mut copy = cache.get(&key).unwrap();
                    assert_eq!(copy, original);
                    copy.get_mut(0).unwrap().name = format!("mutated by {thread_id}");
                    copy.push(ValueMeta::new("extra", ValueType::Binary));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.get(&key), Some(original));
}

#[test]
fn full_invalidation_racing_with_puts_stays_consistent() {
    let cache = Arc::new(DbCache::new());
    let writers = 4;
    let iters = 500;

    let mut handles: Vec<_> = (0..writers)
        .map(|thread_id| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..iters {
                    cache.put(
                        DbCacheKey::new("db", format!("q{thread_id}_{i}")),
                        &schema_for(thread_id, i),
                    );
                }
            })
        })
        .collect();
    {
        let cache = cache.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                cache.deactivate();
                cache.invalidate_all();
                assert!(cache.is_active());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Puts racing with a full invalidation may be dropped, but whatever survived is intact.
    assert!(cache.len() <= writers * iters);
    for (key, schema) in cache.entries() {
        let (thread_id, i) = key
            .signature()
            .trim_start_matches('q')
            .split_once('_')
            .map(|(t, i)| (t.parse::<usize>().unwrap(), i.parse::<usize>().unwrap()))
            .unwrap();
        assert_eq!(schema, schema_for(thread_id, i));
    }
}

#[test]
fn selective_invalidation_during_reads() {
    let cache = Arc::new(DbCache::new());
    for i in 0..100 {
        cache.put(DbCacheKey::new("keep", format!("q{i}")), &schema_for(0, i));
        cache.put(DbCacheKey::new("drop", format!("q{i}")), &schema_for(1, i));
    }

    let reader = {
        let cache = cache.clone();
        thread::spawn(move || {
            for round in 0..20 {
                for i in 0..100 {
                    let key = DbCacheKey::new("keep", format!("q{i}"));
                    assert_eq!(cache.get(&key), Some(schema_for(0, i)), "round {round}");
                }
            }
        })
    };
    cache.invalidate_database("drop");
    reader.join().unwrap();

    assert_eq!(cache.len(), 100);
    assert!(cache.keys().iter().all(|key| key.matches_database("keep")));
}
