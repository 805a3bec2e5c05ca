//! Bounded memoization of node-pair distances.
//!
//! During insertion the same node pairs are measured repeatedly: once while
//! collecting candidates and again while pruning over-capacity neighbor
//! lists. [`DistanceCache`] memoizes those pair distances with approximate
//! LRU eviction. It is an explicit context object owned by the caller and
//! threaded through insert operations; there is no global cache, and it is
//! deliberately not thread-safe (single writer per index).

use crate::config;
use std::collections::HashMap;

/// Order-independent packing of two node ids into one cache key.
#[inline]
fn pair_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

/// Hit/miss counters for a cache instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded node-pair distance cache with approximate LRU eviction.
///
/// Each entry carries the tick of its last access; when the cache fills, the
/// stalest quarter is dropped in one batch rather than evicting per insert.
#[derive(Debug)]
pub struct DistanceCache {
    entries: HashMap<u64, (f32, u64)>,
    capacity: usize,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl Default for DistanceCache {
    fn default() -> Self {
        Self::new(config::DISTANCE_CACHE_DEFAULT_CAPACITY)
    }
}

impl DistanceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up the distance between `a` and `b`, computing and caching it on
    /// a miss. Identical ids short-circuit to 0.
    pub fn distance_between<F: FnOnce() -> f32>(&mut self, a: u32, b: u32, compute: F) -> f32 {
        if a == b {
            return 0.0;
        }
        self.tick += 1;
        let key = pair_key(a, b);
        if let Some(entry) = self.entries.get_mut(&key) {
            self.hits += 1;
            entry.1 = self.tick;
            return entry.0;
        }
        self.misses += 1;
        let dist = compute();
        if self.entries.len() >= self.capacity {
            self.evict_stale();
        }
        self.entries.insert(key, (dist, self.tick));
        dist
    }

    /// Drop the least-recently-touched quarter of the entries.
    fn evict_stale(&mut self) {
        let mut ticks: Vec<u64> = self.entries.values().map(|&(_, t)| t).collect();
        ticks.sort_unstable();
        let cut_idx =
            ((ticks.len() as f64) * config::DISTANCE_CACHE_EVICT_FRACTION).floor() as usize;
        let cutoff = ticks[cut_idx.min(ticks.len() - 1)];
        self.entries.retain(|_, &mut (_, t)| t > cutoff);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.tick = 0;
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.entries.len(),
        }
    }
}
