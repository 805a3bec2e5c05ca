//! Generation-based visited set for HNSW graph traversal.
//!
//! Replaces `HashSet<u32>` with O(1) array indexing. Each `clear()` bumps a
//! generation counter instead of zeroing the array, so repeated searches on
//! the same thread stay allocation- and memset-free.

/// Generation-based visited set over dense `u32` node ids.
///
/// Uses a u16 generation so a full memset is only needed every 65534 clears.
#[derive(Debug)]
pub struct VisitedSet {
    marks: Vec<u16>,
    generation: u16,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            marks: vec![0u16; capacity],
            generation: 1,
        }
    }

    /// Reset the set. O(1) amortized.
    pub fn clear(&mut self) {
        if self.generation == u16::MAX {
            self.marks.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    /// Grow to cover at least `cap` ids.
    pub fn ensure_capacity(&mut self, cap: usize) {
        if cap > self.marks.len() {
            self.marks.resize(cap, 0);
        }
    }

    /// Mark `id` as visited. Returns `true` if it was newly inserted.
    #[inline]
    pub fn insert(&mut self, id: u32) -> bool {
        let idx = id as usize;
        if self.marks[idx] == self.generation {
            false
        } else {
            self.marks[idx] = self.generation;
            true
        }
    }
}

impl Default for VisitedSet {
    fn default() -> Self {
        Self::new(0)
    }
}
