//! Minimum priority queue with priority updates.
//!
//! [`MinQueue`] is a binary heap of `(key, priority)` entries paired with a
//! hash index from each key to its slot in the heap. The index is what makes
//! [`MinQueue::add_or_update`] `O(log n)`: the search engine lowers the
//! tentative cost of the same pixel many times while a search runs, and a
//! plain `BinaryHeap` would need either a linear scan or stale duplicates.
//!
//! Keys with equal priority leave the queue in the order in which they
//! received that priority (first come, first served). The tie-break is
//! deterministic so that traced paths are reproducible.
//!
//! A queue instance is owned by a single search and is not shared across
//! threads.

use std::collections::HashMap;
use std::hash::Hash;

/// Returned when peeking at or removing from an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("priority queue is empty")]
pub struct EmptyQueue;

#[derive(Debug, Clone)]
struct Entry<K> {
    key: K,
    priority: u64,
    /// Stamp taken when the entry last received its priority.
    seq: u64,
}

impl<K> Entry<K> {
    /// Whether this entry must sit above `other` in the heap.
    const fn precedes(&self, other: &Self) -> bool {
        self.priority < other.priority || (self.priority == other.priority && self.seq < other.seq)
    }
}

/// A min priority queue of distinct keys with integer priorities.
#[derive(Debug, Clone)]
pub struct MinQueue<K> {
    /// Min-heap: `heap[i]` never precedes `heap[(i - 1) / 2]`.
    heap: Vec<Entry<K>>,
    /// Slot of every queued key: `heap[index[k]].key == k`.
    index: HashMap<K, usize>,
    next_seq: u64,
}

impl<K> Default for MinQueue<K> {
    fn default() -> Self {
        Self {
            heap: Vec::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> MinQueue<K> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue with room for `capacity` keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Whether the queue holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of keys in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether `key` is queued.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Current priority of `key`, if queued.
    #[must_use]
    pub fn priority(&self, key: &K) -> Option<u64> {
        self.index.get(key).map(|&slot| self.heap[slot].priority)
    }

    /// The key with the smallest priority, without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyQueue`] if the queue is empty.
    pub fn peek_key(&self) -> Result<&K, EmptyQueue> {
        self.heap.first().map(|e| &e.key).ok_or(EmptyQueue)
    }

    /// The smallest priority in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyQueue`] if the queue is empty.
    pub fn peek_priority(&self) -> Result<u64, EmptyQueue> {
        self.heap.first().map(|e| e.priority).ok_or(EmptyQueue)
    }

    /// Insert `key` with `priority`, or change its priority if it is
    /// already queued.
    pub fn add_or_update(&mut self, key: K, priority: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(&slot) = self.index.get(&key) {
            let old = self.heap[slot].priority;
            self.heap[slot].priority = priority;
            self.heap[slot].seq = seq;
            if priority < old {
                self.bubble_up(slot);
            } else {
                self.bubble_down(slot);
            }
        } else {
            let slot = self.heap.len();
            self.index.insert(key.clone(), slot);
            self.heap.push(Entry { key, priority, seq });
            self.bubble_up(slot);
        }

        debug_assert!(self.invariant_holds());
    }

    /// Remove and return the key with the smallest priority.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyQueue`] if the queue is empty.
    pub fn remove_min(&mut self) -> Result<K, EmptyQueue> {
        self.pop_entry().map(|e| e.key)
    }

    /// Remove and return the key with the smallest priority along with
    /// that priority.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyQueue`] if the queue is empty.
    pub fn remove_min_with_priority(&mut self) -> Result<(K, u64), EmptyQueue> {
        self.pop_entry().map(|e| (e.key, e.priority))
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.index.clear();
        self.next_seq = 0;
    }

    fn pop_entry(&mut self) -> Result<Entry<K>, EmptyQueue> {
        if self.heap.is_empty() {
            return Err(EmptyQueue);
        }
        let first = self.heap.swap_remove(0);
        self.index.remove(&first.key);
        if let Some(moved) = self.heap.first() {
            self.index.insert(moved.key.clone(), 0);
            self.bubble_down(0);
        }

        debug_assert!(self.invariant_holds());
        Ok(first)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        if let Some(slot) = self.index.get_mut(&self.heap[i].key) {
            *slot = i;
        }
        if let Some(slot) = self.index.get_mut(&self.heap[j].key) {
            *slot = j;
        }
    }

    fn bubble_up(&mut self, mut child: usize) {
        while child > 0 {
            let parent = (child - 1) / 2;
            if !self.heap[child].precedes(&self.heap[parent]) {
                break;
            }
            self.swap(child, parent);
            child = parent;
        }
    }

    fn bubble_down(&mut self, mut parent: usize) {
        loop {
            let left = 2 * parent + 1;
            if left >= self.heap.len() {
                break;
            }
            let right = left + 1;
            let child = if right < self.heap.len() && self.heap[right].precedes(&self.heap[left]) {
                right
            } else {
                left
            };
            if !self.heap[child].precedes(&self.heap[parent]) {
                break;
            }
            self.swap(parent, child);
            parent = child;
        }
    }

    /// Heap order and index synchronisation.
    fn invariant_holds(&self) -> bool {
        self.index.len() == self.heap.len()
            && self.heap.iter().enumerate().all(|(i, entry)| {
                let ordered = i == 0 || !entry.precedes(&self.heap[(i - 1) / 2]);
                ordered && self.index.get(&entry.key) == Some(&i)
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Tiny deterministic generator so randomised runs are reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            self.0 >> 33
        }
    }

    #[test]
    fn new_queue_is_empty() {
        let q: MinQueue<u32> = MinQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert_eq!(q.peek_key(), Err(EmptyQueue));
        assert_eq!(q.peek_priority(), Err(EmptyQueue));
    }

    #[test]
    fn remove_from_empty_fails() {
        let mut q: MinQueue<&str> = MinQueue::new();
        assert_eq!(q.remove_min(), Err(EmptyQueue));
    }

    #[test]
    fn peek_returns_minimum() {
        let mut q = MinQueue::new();
        q.add_or_update("c", 30);
        q.add_or_update("a", 10);
        q.add_or_update("b", 20);
        assert_eq!(q.len(), 3);
        assert_eq!(*q.peek_key().unwrap(), "a");
        assert_eq!(q.peek_priority().unwrap(), 10);
        // Peeking does not remove.
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn add_existing_key_updates_instead_of_duplicating() {
        let mut q = MinQueue::new();
        q.add_or_update('x', 50);
        q.add_or_update('y', 40);
        q.add_or_update('x', 5);
        assert_eq!(q.len(), 2);
        assert_eq!(q.priority(&'x'), Some(5));
        assert_eq!(q.remove_min().unwrap(), 'x');

        // Raising a priority moves the key down.
        q.add_or_update('z', 45);
        q.add_or_update('y', 100);
        assert_eq!(q.remove_min().unwrap(), 'z');
        assert_eq!(q.remove_min().unwrap(), 'y');
        assert!(q.is_empty());
    }

    #[test]
    fn ties_leave_in_arrival_order() {
        let mut q = MinQueue::new();
        for key in ["first", "second", "third"] {
            q.add_or_update(key, 7);
        }
        // An update re-stamps the key, sending it behind its peers.
        q.add_or_update("first", 7);
        assert_eq!(q.remove_min().unwrap(), "second");
        assert_eq!(q.remove_min().unwrap(), "third");
        assert_eq!(q.remove_min().unwrap(), "first");
    }

    #[test]
    fn clear_empties_queue() {
        let mut q = MinQueue::new();
        q.add_or_update(1, 1);
        q.add_or_update(2, 2);
        q.clear();
        assert!(q.is_empty());
        assert!(!q.contains(&1));
        q.add_or_update(1, 9);
        assert_eq!(q.remove_min_with_priority().unwrap(), (1, 9));
    }

    #[test]
    fn random_operations_drain_in_priority_order() {
        let mut rng = Lcg(0x5eed);
        for _round in 0..20 {
            let mut q = MinQueue::with_capacity(64);
            let mut reference: HashMap<u64, u64> = HashMap::new();

            for _ in 0..300 {
                let key = rng.next() % 64;
                match rng.next() % 4 {
                    0 if !q.is_empty() => {
                        let min_priority = q.peek_priority().unwrap();
                        let (removed, priority) = q.remove_min_with_priority().unwrap();
                        assert_eq!(priority, min_priority);
                        assert_eq!(reference.remove(&removed), Some(priority));
                        assert!(reference.values().all(|&p| p >= priority));
                    }
                    _ => {
                        let priority = rng.next() % 1000;
                        q.add_or_update(key, priority);
                        reference.insert(key, priority);
                    }
                }
                assert!(q.invariant_holds());
                assert_eq!(q.len(), reference.len());
            }

            let mut last = 0;
            while let Ok((key, priority)) = q.remove_min_with_priority() {
                assert!(priority >= last, "priorities must be non-decreasing");
                assert_eq!(reference.remove(&key), Some(priority));
                last = priority;
                assert!(q.invariant_holds());
            }
            assert!(reference.is_empty());
        }
    }
}
