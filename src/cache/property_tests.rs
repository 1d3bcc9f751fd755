//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the in-memory provider against a model.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crate::cache::{CachePriority, CacheProvider, CacheStore, InMemoryCacheProvider};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 16;

// == Strategies ==
/// Small key space so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-d]{1,2}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,32}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Clear { key: String },
    Increment { key: String, by: i64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Clear { key }),
        (key_strategy(), -5i64..5).prop_map(|(key, by)| CacheOp::Increment { key, by }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Without eviction pressure the provider behaves like a plain map, and
    // statistics count exactly the gets that found or missed a value.
    #[test]
    fn prop_provider_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let provider = InMemoryCacheProvider::new(1_000, None);
        let mut model: HashMap<String, String> = HashMap::new();
        let (mut hits, mut misses) = (0u64, 0u64);

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    provider.set(&key, value.clone(), CachePriority::Normal, None).unwrap();
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    let actual = provider.get(&key).unwrap();
                    prop_assert_eq!(actual.as_ref(), model.get(&key));
                    if actual.is_some() { hits += 1 } else { misses += 1 }
                }
                CacheOp::Clear { key } => {
                    provider.clear(&key).unwrap();
                    model.remove(&key);
                }
                CacheOp::Increment { key, by } => {
                    let expected = match model.get(&key).map(|v| v.trim().parse::<i64>()) {
                        None => Some(1 + by),
                        Some(Ok(current)) => current.checked_add(by),
                        Some(Err(_)) => None,
                    };
                    let actual = provider.increment(&key, 1, by).ok();
                    prop_assert_eq!(actual, expected);
                    if let Some(next) = expected {
                        model.insert(key, next.to_string());
                    }
                }
            }
        }

        let stats = provider.stats().unwrap();
        prop_assert_eq!(stats.hits, hits);
        prop_assert_eq!(stats.misses, misses);
        prop_assert_eq!(stats.total_entries, model.len());
    }

    // Capacity is never exceeded and counters written before the pressure
    // survive any amount of eviction.
    #[test]
    fn prop_counters_survive_eviction(
        counters in prop::collection::hash_set("gen[0-9]", 1..4),
        keys in prop::collection::vec("[a-z]{1,6}", 1..100),
    ) {
        let mut store = CacheStore::new(TEST_MAX_ENTRIES, Some(300));
        for counter in &counters {
            store.increment(counter, 1, 1).unwrap();
        }
        for key in &keys {
            store.set(key, "v".to_string(), CachePriority::High, None).unwrap();
            prop_assert!(store.len() <= TEST_MAX_ENTRIES);
        }
        for counter in &counters {
            prop_assert_eq!(store.get(counter), Some("2".to_string()));
        }
    }

    // Concurrent increments are all applied.
    #[test]
    fn prop_concurrent_increments_sum(threads in 2usize..6, per_thread in 1usize..40, start in -100i64..100) {
        let provider = Arc::new(InMemoryCacheProvider::default());
        provider.set("gen", start.to_string(), CachePriority::NotRemovable, None).unwrap();

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        provider.increment("gen", 0, 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected = start + (threads * per_thread) as i64;
        prop_assert_eq!(provider.get("gen").unwrap(), Some(expected.to_string()));
    }
}
