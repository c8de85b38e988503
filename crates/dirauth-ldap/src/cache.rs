//! Time-bucketed result cache
//!
//! Time is cut into fixed-width buckets of `period` seconds. Every entry
//! belongs to the bucket that was current when the cache was last touched,
//! and the whole map is dropped as soon as a later bucket begins. There is no
//! per-key TTL and no size bound.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Source of the current time in whole Unix seconds
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp().max(0) as u64)
}

/// Start of the bucket containing `now`; a period of 0 means every second
/// is its own bucket
pub fn timeslice(period: u64, now: u64) -> u64 {
    match now.checked_rem(period) {
        Some(offset) => now - offset,
        None => now,
    }
}

pub struct TimeBucketedCache<K, V> {
    period: u64,
    clock: Clock,
    state: Mutex<CacheState<K, V>>,
}

struct CacheState<K, V> {
    last_bucket: u64,
    entries: HashMap<K, V>,
}

impl<K, V> TimeBucketedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// A period of 0 disables the cache
    pub fn new(period: u64) -> Self {
        Self::with_clock(period, system_clock())
    }

    pub fn with_clock(period: u64, clock: Clock) -> Self {
        Self {
            period,
            clock,
            state: Mutex::new(CacheState {
                last_bucket: 0,
                entries: HashMap::new(),
            }),
        }
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn is_enabled(&self) -> bool {
        self.period > 0
    }

    pub fn get(&self, key: &K) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }

        let mut state = self.state.lock();
        self.rotate(&mut state);
        state.entries.get(key).cloned()
    }

    pub fn put(&self, key: K, value: V) {
        if !self.is_enabled() {
            return;
        }

        let mut state = self.state.lock();
        self.rotate(&mut state);
        state.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    fn rotate(&self, state: &mut CacheState<K, V>) {
        let bucket = timeslice(self.period, (self.clock)());

        if bucket > state.last_bucket {
            debug!(
                "Dumping cache; now bucket: {}, last bucket: {}",
                bucket, state.last_bucket
            );
            state.entries.clear();
            state.last_bucket = bucket;
        }
    }
}
