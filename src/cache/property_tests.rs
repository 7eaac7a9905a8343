//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache contract on the in-memory adapter against
//! a plain map model, and the TTL and snapshot building blocks on their own.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::adapter::{AdapterOptions, CacheAdapter, MemoryAdapter, ValueMap};
use crate::cache::{snapshot, CacheEntry, JsonSerializer, ManualClock, Snapshot, Ttl};

// == Test Configuration ==
const START: i64 = 1_700_000_000;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn adapter_with_clock() -> (MemoryAdapter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let adapter = MemoryAdapter::new(AdapterOptions::new().with_clock(clock.clone()));
    (adapter, clock)
}

// == Strategies ==
/// Generates valid cache keys (non-empty)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:/.-]{1,32}"
}

/// Small key space so operations collide often
fn colliding_key_strategy() -> impl Strategy<Value = String> {
    "[a-d]"
}

/// Arbitrary JSON payloads without floats
fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[ -~]{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Get { key: String },
    Has { key: String },
    Delete { key: String },
    Clear,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (colliding_key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        3 => colliding_key_strategy().prop_map(|key| CacheOp::Get { key }),
        2 => colliding_key_strategy().prop_map(|key| CacheOp::Has { key }),
        2 => colliding_key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => Just(CacheOp::Clear),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any sequence of operations behaves like a plain map when nothing expires.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(cache_op_strategy(), 1..40)) {
        block_on(async {
            let adapter = MemoryAdapter::default();
            let mut model: HashMap<String, Value> = HashMap::new();

            for op in ops {
                match op {
                    CacheOp::Set { key, value } => {
                        prop_assert!(adapter.set(&key, value.clone(), Ttl::Never).await.unwrap());
                        model.insert(key, value);
                    }
                    CacheOp::Get { key } => {
                        let got = adapter.get(&key, json!("<miss>")).await.unwrap();
                        let expected = model.get(&key).cloned().unwrap_or(json!("<miss>"));
                        prop_assert_eq!(got, expected);
                    }
                    CacheOp::Has { key } => {
                        prop_assert_eq!(adapter.has(&key).await.unwrap(), model.contains_key(&key));
                    }
                    CacheOp::Delete { key } => {
                        let removed = adapter.delete(&key).await.unwrap();
                        prop_assert_eq!(removed, model.remove(&key).is_some());
                    }
                    CacheOp::Clear => {
                        prop_assert!(adapter.clear().await.unwrap());
                        model.clear();
                    }
                }
            }
            prop_assert_eq!(adapter.len().await, model.len());
            Ok(())
        })?;
    }

    // A stored value reads back unchanged, including falsy payloads.
    #[test]
    fn prop_roundtrip(key in valid_key_strategy(), value in value_strategy()) {
        block_on(async {
            let adapter = MemoryAdapter::default();
            adapter.set(&key, value.clone(), Ttl::Never).await.unwrap();
            prop_assert_eq!(adapter.get(&key, json!("<miss>")).await.unwrap(), value);
            Ok(())
        })?;
    }

    // An entry is live up to and including its expiry second and gone after it.
    #[test]
    fn prop_expiry_boundary(key in valid_key_strategy(), ttl in 1i64..100_000) {
        block_on(async {
            let (adapter, clock) = adapter_with_clock();
            adapter.set(&key, json!("v"), Ttl::Seconds(ttl)).await.unwrap();

            clock.advance(ttl);
            prop_assert!(adapter.has(&key).await.unwrap());

            clock.advance(1);
            prop_assert!(!adapter.has(&key).await.unwrap());
            prop_assert_eq!(adapter.get(&key, json!("D")).await.unwrap(), json!("D"));
            Ok(())
        })?;
    }

    // Non-positive TTLs never expire, however much time passes.
    #[test]
    fn prop_non_positive_ttl_never_expires(ttl in i64::MIN..=0, elapsed in 0i64..1_000_000_000) {
        block_on(async {
            let (adapter, clock) = adapter_with_clock();
            adapter.set("k", json!(1), Ttl::Seconds(ttl)).await.unwrap();
            clock.advance(elapsed);
            prop_assert_eq!(adapter.get("k", json!(null)).await.unwrap(), json!(1));
            Ok(())
        })?;
    }

    // get_multiple answers every requested key, in request order.
    #[test]
    fn prop_batch_order(
        stored in prop::collection::btree_map(valid_key_strategy(), value_strategy(), 0..8),
        requested in prop::collection::vec(valid_key_strategy(), 0..8),
    ) {
        block_on(async {
            let adapter = MemoryAdapter::default();
            let values: ValueMap = stored.clone().into_iter().collect();
            adapter.set_multiple(values, Ttl::Never).await.unwrap();

            let keys: Vec<&str> = requested.iter().map(String::as_str).collect();
            let result = adapter.get_multiple(&keys, json!("<miss>")).await.unwrap();

            let mut expected_order: Vec<&str> = Vec::new();
            for key in &keys {
                if !expected_order.contains(key) {
                    expected_order.push(*key);
                }
            }
            let got_order: Vec<&str> = result.keys().map(String::as_str).collect();
            prop_assert_eq!(got_order, expected_order);

            for (key, value) in &result {
                let expected = stored.get(key).cloned().unwrap_or(json!("<miss>"));
                prop_assert_eq!(value, &expected);
            }
            Ok(())
        })?;
    }

    // Normalization keeps positive seconds that fit after `now`, folds the
    // rest of the non-positive range to "never" and rejects the overflow.
    #[test]
    fn prop_ttl_normalize(seconds in any::<i64>()) {
        let normalized = Ttl::Seconds(seconds).normalize(START);
        if seconds <= 0 {
            prop_assert_eq!(normalized.unwrap(), 0);
        } else if START.checked_add(seconds).is_some() {
            prop_assert_eq!(normalized.unwrap(), seconds as u64);
            prop_assert_eq!(Ttl::Seconds(seconds).expire_at(START).unwrap(), START + seconds);
        } else {
            prop_assert!(normalized.is_err());
        }
    }

    // A snapshot decodes to the entries it was encoded from.
    #[test]
    fn prop_snapshot_preserves_entries(
        entries in prop::collection::btree_map(
            valid_key_strategy(),
            (0i64..i64::MAX, value_strategy()),
            0..8,
        ),
    ) {
        let snap: Snapshot = entries
            .into_iter()
            .map(|(key, (expire_at, payload))| (key, CacheEntry { expire_at, payload }))
            .collect();

        let bytes = snapshot::encode(&JsonSerializer, &snap).unwrap();
        prop_assert_eq!(snapshot::decode(&JsonSerializer, &bytes).unwrap(), snap);
    }
}
