//! Per-key monotonic sequence allocation, per spec §4.5 "Sequence
//! allocation".
//!
//! A `DashMap` holds one counter per key; the first use of a key seeds it from the
//! backend under a single-writer lock, then increments are lock-free.
//! Eviction bounds memory the same way the registry bounds
//! `TaskRegistry::get_tasks`: a documented cap with an explicit
//! oldest-first policy rather than unbounded growth.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

/// Above this many distinct keys, evict [`EVICTION_BATCH`] of the oldest
/// (by first-insertion order).
pub const MAX_TRACKED_KEYS: usize = 10_000;
pub const EVICTION_BATCH: usize = 1_000;

/// Seeds a key's counter from the backend on first use. Implemented by
/// the snapshot/event stores, which know how to run `SELECT
/// max(<seqField>) WHERE <selectorField>=key` against the document
/// store.
#[async_trait::async_trait]
pub trait SequenceSeed: Send + Sync {
    async fn seed(&self, key: &str) -> u64;
}

pub struct SequenceAllocator<S: SequenceSeed> {
    counters: DashMap<String, u64>,
    insertion_order: Arc<Mutex<VecDeque<String>>>,
    seed_lock: Arc<Mutex<()>>,
    seed: S,
}

impl<S: SequenceSeed> SequenceAllocator<S> {
    pub fn new(seed: S) -> Self {
        Self {
            counters: DashMap::new(),
            insertion_order: Arc::new(Mutex::new(VecDeque::new())),
            seed_lock: Arc::new(Mutex::new(())),
            seed,
        }
    }

    /// Return the next sequence value for `key`, seeding from the
    /// backend on first use.
    pub async fn next(&self, key: &str) -> u64 {
        if !self.counters.contains_key(key) {
            let _guard = self.seed_lock.lock().await;
            // Re-check after acquiring the lock: another task may have
            // seeded this key while we waited.
            if !self.counters.contains_key(key) {
                let seeded = self.seed.seed(key).await;
                self.counters.insert(key.to_string(), seeded);
                let mut order = self.insertion_order.lock().await;
                order.push_back(key.to_string());
                self.evict_if_needed(&mut order).await;
            }
        }

        let mut counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    async fn evict_if_needed(&self, order: &mut VecDeque<String>) {
        if order.len() <= MAX_TRACKED_KEYS {
            return;
        }
        for _ in 0..EVICTION_BATCH {
            if let Some(oldest) = order.pop_front() {
                self.counters.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ZeroSeed;

    #[async_trait::async_trait]
    impl SequenceSeed for ZeroSeed {
        async fn seed(&self, _key: &str) -> u64 {
            0
        }
    }

    struct FixedSeed(u64);

    #[async_trait::async_trait]
    impl SequenceSeed for FixedSeed {
        async fn seed(&self, _key: &str) -> u64 {
            self.0
        }
    }

    #[tokio::test]
    async fn sequence_starts_at_one_with_zero_seed() {
        let allocator = SequenceAllocator::new(ZeroSeed);
        assert_eq!(allocator.next("t1").await, 1);
        assert_eq!(allocator.next("t1").await, 2);
        assert_eq!(allocator.next("t1").await, 3);
    }

    #[tokio::test]
    async fn separate_keys_have_independent_sequences() {
        let allocator = SequenceAllocator::new(ZeroSeed);
        assert_eq!(allocator.next("t1").await, 1);
        assert_eq!(allocator.next("t2").await, 1);
        assert_eq!(allocator.next("t1").await, 2);
    }

    #[tokio::test]
    async fn seeds_from_backend_on_first_use() {
        let allocator = SequenceAllocator::new(FixedSeed(41));
        assert_eq!(allocator.next("t1").await, 42);
        assert_eq!(allocator.next("t1").await, 43);
    }

    #[tokio::test]
    async fn monotonic_under_concurrent_appends_for_fixed_key() {
        let allocator = Arc::new(SequenceAllocator::new(ZeroSeed));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move { allocator.next("shared").await }));
        }
        let mut values: Vec<u64> = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }
        values.sort();
        let expected: Vec<u64> = (1..=50).collect();
        assert_eq!(values, expected);
    }
}
