//! Property-based tests for cache invariants

use flycache::{CacheManager, ContentCategory, EntryOptions, ManualClock};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

fn cache(max_entries: usize, clock: &ManualClock) -> CacheManager {
    CacheManager::builder()
        .with_max_entries(max_entries)
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap()
}

/// Generate JSON payloads with a small value space so duplicates are common
fn arb_payload() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0u8..8).prop_map(|n| json!(n)),
        "[a-c]{1,3}".prop_map(|s| json!(s)),
        prop::collection::vec(0u8..4, 0..4).prop_map(|v| json!({ "items": v })),
    ]
}

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn arb_tags() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("t[0-3]", 0..3)
}

proptest! {
    /// A put followed by a get within the TTL returns the stored value
    #[test]
    fn prop_round_trip(key in arb_key(), value in arb_payload()) {
        let clock = ManualClock::new();
        let cache = cache(100, &clock);

        prop_assert!(cache.put(key.clone(), value.clone(), ContentCategory::ApiResponse, None).unwrap());
        clock.advance(Duration::from_secs(1));
        prop_assert_eq!(cache.get(&key), Some(value));
    }

    /// Live flyweights equal the distinct contents referenced by entries
    #[test]
    fn prop_dedup_invariant(puts in prop::collection::vec((arb_key(), arb_payload()), 1..60)) {
        let clock = ManualClock::new();
        let cache = cache(1_000, &clock);

        for (key, value) in &puts {
            cache.put(key.clone(), value.clone(), ContentCategory::ComputedResult, None).unwrap();
        }

        let keys: HashSet<&String> = puts.iter().map(|(k, _)| k).collect();
        let distinct: HashSet<String> = keys
            .iter()
            .map(|key| cache.get_flyweight(key).unwrap().fingerprint().to_hex())
            .collect();

        let stats = cache.get_cache_stats();
        prop_assert_eq!(stats.current_entries, keys.len());
        prop_assert_eq!(stats.flyweight_stats.total_flyweights, distinct.len());
        prop_assert_eq!(stats.memory.referenced_flyweights, distinct.len());
        prop_assert!(stats.memory.flyweight_bytes <= stats.memory.logical_bytes);
    }

    /// The entry budget holds after every single put
    #[test]
    fn prop_budget_invariant(
        max_entries in 1usize..20,
        puts in prop::collection::vec((arb_key(), arb_payload()), 1..80),
    ) {
        let clock = ManualClock::new();
        let cache = cache(max_entries, &clock);

        for (key, value) in puts {
            clock.advance(Duration::from_millis(1));
            cache.put(key, value, ContentCategory::DatabaseQuery, None).unwrap();
            prop_assert!(cache.len() <= max_entries);
        }
    }

    /// Tag invalidation removes exactly the tagged entries
    #[test]
    fn prop_tag_invalidation(
        entries in prop::collection::btree_map(arb_key(), (arb_payload(), arb_tags()), 0..30),
        target in "t[0-3]",
    ) {
        let clock = ManualClock::new();
        let cache = cache(1_000, &clock);

        for (key, (value, tags)) in &entries {
            let options = EntryOptions::new().with_tags(tags.iter().cloned());
            cache.put_with(key.clone(), value.clone(), ContentCategory::FileContent, options).unwrap();
        }

        let expected = entries.values().filter(|(_, tags)| tags.contains(&target)).count();
        prop_assert_eq!(cache.invalidate_by_tags([target.as_str()]), expected);

        for (key, (_, tags)) in &entries {
            prop_assert_eq!(cache.contains_key(key), !tags.contains(&target));
        }
    }

    /// A second forced eviction with nothing added in between does nothing
    #[test]
    fn prop_force_eviction_idempotent(
        puts in prop::collection::vec((arb_key(), arb_payload()), 1..40),
        target in 0u64..20_000,
    ) {
        let clock = ManualClock::new();
        let cache = cache(1_000, &clock);
        for (key, value) in puts {
            cache.put(key, value, ContentCategory::ApiResponse, None).unwrap();
        }

        let before = cache.len();
        let evicted = cache.force_eviction_to(target).unwrap();
        prop_assert_eq!(cache.len(), before - evicted);
        prop_assert_eq!(cache.force_eviction().unwrap(), 0);
    }
}
