//! Dual-ended priority queue for graph search.
//!
//! [`DualHeap`] is a min-heap over `f32` keys that additionally supports
//! amortized O(log n) access to the *worst* (maximum) element, which is what
//! turns it into a bounded best-k collector: keep pushing, evict via
//! [`DualHeap::pop_worst`] once over budget, and only the closest k survive.
//!
//! Every entry is tracked by a stable sequence id assigned at push time. Both
//! internal heaps store `(key, seq)` pairs and a removal from one side marks
//! the seq dead; the other side skips dead entries lazily. No structural
//! equality of payloads is ever consulted.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Min-heap with amortized worst-side access.
///
/// Keys are `f32` distances; `T` is an opaque payload. The max-oriented
/// mirror heap is built lazily on the first worst-side call and kept in sync
/// by subsequent pushes.
#[derive(Debug)]
pub struct DualHeap<T> {
    min: BinaryHeap<Reverse<(OrderedFloat<f32>, u64)>>,
    /// Lazily built mirror; `None` until the first worst-side access.
    max: Option<BinaryHeap<(OrderedFloat<f32>, u64)>>,
    alive: HashMap<u64, (f32, T)>,
    next_seq: u64,
}

impl<T> Default for DualHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DualHeap<T> {
    pub fn new() -> Self {
        Self {
            min: BinaryHeap::new(),
            max: None,
            alive: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            min: BinaryHeap::with_capacity(capacity),
            max: None,
            alive: HashMap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    /// Insert an entry. O(log n).
    pub fn push(&mut self, key: f32, value: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.alive.insert(seq, (key, value));
        self.min.push(Reverse((OrderedFloat(key), seq)));
        if let Some(max) = self.max.as_mut() {
            max.push((OrderedFloat(key), seq));
        }
    }

    /// Bulk load. Rebuilds the primary heap in O(n) and discards the mirror.
    pub fn push_bulk(&mut self, items: Vec<(f32, T)>) {
        for (key, value) in items {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.alive.insert(seq, (key, value));
        }
        self.min = self
            .alive
            .iter()
            .map(|(&seq, &(key, _))| Reverse((OrderedFloat(key), seq)))
            .collect();
        self.max = None;
    }

    /// Remove and return the minimum entry.
    pub fn pop(&mut self) -> Option<(f32, T)> {
        loop {
            let Reverse((_, seq)) = self.min.pop()?;
            if let Some((key, value)) = self.alive.remove(&seq) {
                self.prune_dead_tops();
                return Some((key, value));
            }
        }
    }

    /// The minimum entry, without removing it.
    pub fn peek(&self) -> Option<(f32, &T)> {
        let &Reverse((_, seq)) = self.min.peek()?;
        self.alive.get(&seq).map(|(key, value)| (*key, value))
    }

    /// The maximum entry, without removing it. Builds the mirror heap on
    /// first use (O(n)), then amortized O(log n).
    pub fn get_worst(&mut self) -> Option<(f32, &T)> {
        self.ensure_max();
        let max = self.max.as_ref()?;
        let &(_, seq) = max.peek()?;
        self.alive.get(&seq).map(|(key, value)| (*key, value))
    }

    /// Remove and return the maximum entry.
    pub fn pop_worst(&mut self) -> Option<(f32, T)> {
        self.ensure_max();
        loop {
            let (_, seq) = self.max.as_mut()?.pop()?;
            if let Some((key, value)) = self.alive.remove(&seq) {
                self.prune_dead_tops();
                return Some((key, value));
            }
        }
    }

    pub fn clear(&mut self) {
        self.min.clear();
        self.max = None;
        self.alive.clear();
        self.next_seq = 0;
    }

    /// Drain everything into a vector sorted ascending by key.
    pub fn into_sorted_vec(mut self) -> Vec<(f32, T)> {
        let mut out = Vec::with_capacity(self.alive.len());
        while let Some(Reverse((_, seq))) = self.min.pop() {
            if let Some((key, value)) = self.alive.remove(&seq) {
                out.push((key, value));
            }
        }
        out
    }

    fn ensure_max(&mut self) {
        if self.max.is_none() {
            self.max = Some(
                self.alive
                    .iter()
                    .map(|(&seq, &(key, _))| (OrderedFloat(key), seq))
                    .collect(),
            );
        }
    }

    /// Drop dead entries off both heap tops so `peek` stays O(1) and `&self`.
    fn prune_dead_tops(&mut self) {
        while let Some(&Reverse((_, seq))) = self.min.peek() {
            if self.alive.contains_key(&seq) {
                break;
            }
            self.min.pop();
        }
        if let Some(max) = self.max.as_mut() {
            while let Some(&(_, seq)) = max.peek() {
                if self.alive.contains_key(&seq) {
                    break;
                }
                max.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_is_non_decreasing() {
        let mut heap = DualHeap::new();
        for &k in &[5.0, 1.0, 3.0, 2.0, 4.0, 1.0] {
            heap.push(k, ());
        }
        let mut last = f32::MIN;
        while let Some((k, ())) = heap.pop() {
            assert!(k >= last, "pop sequence must be non-decreasing");
            last = k;
        }
    }

    #[test]
    fn test_pop_worst_is_non_increasing() {
        let mut heap = DualHeap::new();
        for &k in &[5.0, 1.0, 3.0, 2.0, 4.0] {
            heap.push(k, ());
        }
        let mut last = f32::MAX;
        while let Some((k, ())) = heap.pop_worst() {
            assert!(k <= last, "pop_worst sequence must be non-increasing");
            last = k;
        }
    }

    #[test]
    fn test_interleaved_both_ends() {
        let mut heap = DualHeap::new();
        for i in 0..10 {
            heap.push(i as f32, i);
        }
        assert_eq!(heap.pop().map(|(k, _)| k), Some(0.0));
        assert_eq!(heap.pop_worst().map(|(k, _)| k), Some(9.0));
        assert_eq!(heap.pop().map(|(k, _)| k), Some(1.0));
        assert_eq!(heap.pop_worst().map(|(k, _)| k), Some(8.0));
        assert_eq!(heap.len(), 6);
        assert_eq!(heap.peek().map(|(k, _)| k), Some(2.0));
        assert_eq!(heap.get_worst().map(|(k, _)| k), Some(7.0));
    }

    #[test]
    fn test_duplicate_keys_distinct_entries() {
        // Entries with equal keys and equal payloads must still be tracked
        // independently (stable seq ids, not value equality).
        let mut heap = DualHeap::new();
        heap.push(1.0, "a");
        heap.push(1.0, "a");
        heap.push(1.0, "a");
        assert!(heap.pop_worst().is_some());
        assert_eq!(heap.len(), 2);
        assert!(heap.pop().is_some());
        assert_eq!(heap.len(), 1);
        assert!(heap.pop().is_some());
        assert!(heap.is_empty());
    }

    #[test]
    fn test_push_bulk_and_into_sorted_vec() {
        let mut heap = DualHeap::new();
        heap.push_bulk(vec![(3.0, 'c'), (1.0, 'a'), (2.0, 'b')]);
        heap.push(0.5, 'z');
        let sorted = heap.into_sorted_vec();
        let keys: Vec<f32> = sorted.iter().map(|&(k, _)| k).collect();
        assert_eq!(keys, vec![0.5, 1.0, 2.0, 3.0]);
        assert_eq!(sorted[0].1, 'z');
    }

    #[test]
    fn test_bounded_collector_pattern() {
        // The usage pattern search_layer relies on: cap at 3 via pop_worst.
        let mut heap = DualHeap::new();
        for &k in &[9.0, 2.0, 7.0, 4.0, 1.0, 8.0] {
            heap.push(k, ());
            if heap.len() > 3 {
                heap.pop_worst();
            }
        }
        let keys: Vec<f32> = heap.into_sorted_vec().iter().map(|&(k, _)| k).collect();
        assert_eq!(keys, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_clear_and_empty_behavior() {
        let mut heap = DualHeap::new();
        assert!(heap.pop().is_none());
        assert!(heap.pop_worst().is_none());
        heap.push(1.0, 1);
        heap.clear();
        assert!(heap.is_empty());
        assert!(heap.peek().is_none());
        assert!(heap.get_worst().is_none());
    }

    #[test]
    fn test_mirror_stays_synchronized_after_build() {
        let mut heap = DualHeap::new();
        heap.push(2.0, ());
        assert_eq!(heap.get_worst().map(|(k, _)| k), Some(2.0)); // builds mirror
        heap.push(5.0, ()); // must reach the mirror too
        heap.push(1.0, ());
        assert_eq!(heap.get_worst().map(|(k, _)| k), Some(5.0));
        assert_eq!(heap.pop_worst().map(|(k, _)| k), Some(5.0));
        assert_eq!(heap.pop().map(|(k, _)| k), Some(1.0));
    }
}
