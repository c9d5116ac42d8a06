//! Property-based tests for the cache store.

use proptest::prelude::*;
use std::collections::HashSet;
use std::thread::sleep;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::models::order::fixtures::sample_order;
use crate::models::Order;

// == Test Configuration ==
const TEST_CAPACITY: usize = 100;
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
fn order_uid_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,32}"
}

fn order_strategy() -> impl Strategy<Value = Order> {
    (order_uid_strategy(), "[A-Z]{4,14}", 0.0f64..=100.0).prop_map(|(uid, track, sale)| {
        let mut order = sample_order(&uid);
        order.track_number = track;
        order.items[0].sale_percent = sale;
        order
    })
}

fn unique_uids(uids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    uids.into_iter().filter(|uid| seen.insert(uid.clone())).collect()
}

#[derive(Debug, Clone)]
enum CacheOp {
    Save(Order),
    Get(String),
    Remove(String),
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        order_strategy().prop_map(CacheOp::Save),
        order_uid_strategy().prop_map(CacheOp::Get),
        order_uid_strategy().prop_map(CacheOp::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_save_get_round_trip(order in order_strategy()) {
        let mut store = CacheStore::new(TEST_CAPACITY, TEST_TTL);

        store.save(order.clone());

        prop_assert_eq!(store.get(&order.order_uid), Some(order));
    }

    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let mut store = CacheStore::new(TEST_CAPACITY, TEST_TTL);
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;

        for op in ops {
            match op {
                CacheOp::Save(order) => store.save(order),
                CacheOp::Get(uid) => match store.get(&uid) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Remove(uid) => {
                    store.remove(&uid);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, store.len());
    }

    #[test]
    fn prop_capacity_enforcement(orders in prop::collection::vec(order_strategy(), 1..200)) {
        let capacity = 20;
        let mut store = CacheStore::new(capacity, TEST_TTL);

        for order in orders {
            store.save(order);
            prop_assert!(store.len() <= capacity, "size {} exceeds {}", store.len(), capacity);
        }
    }

    #[test]
    fn prop_fill_to_capacity_then_evict_oldest(
        uids in prop::collection::vec(order_uid_strategy(), 2..12),
        extra in order_uid_strategy()
    ) {
        let uids = unique_uids(uids);
        prop_assume!(uids.len() >= 2);
        prop_assume!(!uids.contains(&extra));

        let capacity = uids.len();
        let mut store = CacheStore::new(capacity, TEST_TTL);
        for uid in &uids {
            store.save(sample_order(uid));
        }

        let held: HashSet<String> = store.orders().into_iter().map(|o| o.order_uid).collect();
        prop_assert_eq!(held, uids.iter().cloned().collect::<HashSet<_>>());

        store.save(sample_order(&extra));

        prop_assert_eq!(store.len(), capacity);
        prop_assert!(!store.contains(&uids[0]), "oldest '{}' should be evicted", uids[0]);
        prop_assert!(store.contains(&extra));
        for uid in uids.iter().skip(1) {
            prop_assert!(store.contains(uid), "'{}' should survive", uid);
        }
    }

    #[test]
    fn prop_read_protects_from_eviction(
        uids in prop::collection::vec(order_uid_strategy(), 3..10),
        extra in order_uid_strategy()
    ) {
        let uids = unique_uids(uids);
        prop_assume!(uids.len() >= 3);
        prop_assume!(!uids.contains(&extra));

        let mut store = CacheStore::new(uids.len(), TEST_TTL);
        for uid in &uids {
            store.save(sample_order(uid));
        }

        // Reading the oldest makes the second one the eviction candidate
        prop_assert!(store.get(&uids[0]).is_some());
        store.save(sample_order(&extra));

        prop_assert!(store.contains(&uids[0]));
        prop_assert!(!store.contains(&uids[1]));
    }

    #[test]
    fn prop_remove_and_save_are_idempotent(order in order_strategy()) {
        let mut store = CacheStore::new(TEST_CAPACITY, TEST_TTL);

        store.save(order.clone());
        store.save(order.clone());
        prop_assert_eq!(store.len(), 1);
        prop_assert_eq!(store.get(&order.order_uid), Some(order.clone()));

        prop_assert!(store.remove(&order.order_uid));
        prop_assert!(!store.remove(&order.order_uid));
        prop_assert_eq!(store.get(&order.order_uid), None);
    }

    #[test]
    fn prop_overwrite_returns_latest(first in order_strategy(), track in "[A-Z]{4,14}") {
        let mut store = CacheStore::new(TEST_CAPACITY, TEST_TTL);
        let mut second = first.clone();
        second.track_number = track;

        store.save(first.clone());
        store.save(second.clone());

        prop_assert_eq!(store.get(&first.order_uid), Some(second));
        prop_assert_eq!(store.len(), 1);
    }
}

// Fewer cases for the sleeping TTL property
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    #[test]
    fn prop_ttl_expiration(order in order_strategy()) {
        let mut store = CacheStore::new(TEST_CAPACITY, Duration::from_millis(50));

        store.save(order.clone());
        prop_assert_eq!(store.get(&order.order_uid), Some(order.clone()));

        sleep(Duration::from_millis(80));

        prop_assert_eq!(store.get(&order.order_uid), None);
        prop_assert!(store.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_capacity_keeps_everything() {
        let mut store = CacheStore::new(0, Duration::ZERO);
        for i in 0..500 {
            store.save(sample_order(&format!("order{}", i)));
        }
        assert_eq!(store.len(), 500);
        assert_eq!(store.stats().evictions, 0);
    }
}
