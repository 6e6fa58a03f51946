use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ahash::AHashMap;

/// Sentinel indices in the `nodes` arena.
const HEAD: usize = 0; // most-recently-used end
const TAIL: usize = 1; // least-recently-used end
const NULL: usize = usize::MAX;

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A resident entry: key, value and pin count.
///
/// Shared with callers as `Arc<Entry>` for the duration of a pin. The pin
/// count is mutated only under the store's exclusive lock; the atomic lets
/// victim scans and tests read it without one.
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: Arc<V>,
    pin_count: AtomicU32,
}

impl<K, V> Entry<K, V> {
    fn new(key: K, value: Arc<V>) -> Self {
        // An entry is born pinned for the caller that created it.
        Entry {
            key,
            value,
            pin_count: AtomicU32::new(1),
        }
    }

    pub(crate) fn pins(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    fn pin(&self) {
        self.pin_count.fetch_add(1, Ordering::Relaxed);
    }

    fn unpin(&self) {
        let prev = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "unpin without a matching pin");
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct Node<K, V> {
    /// `None` only for the HEAD and TAIL sentinels and freed slots.
    entry: Option<Arc<Entry<K, V>>>,
    /// Index toward HEAD (more recently used).
    prev: usize,
    /// Index toward TAIL (less recently used).
    next: usize,
}

/// Key index plus recency order, backed by an index-arena doubly-linked
/// list. O(1) insertion, move-to-front and removal, no raw pointers.
///
/// Front = most recently used. Every key in the map corresponds to exactly
/// one linked node; the list contains no duplicates.
pub(crate) struct Store<K, V> {
    /// Index 0 = HEAD sentinel, 1 = TAIL sentinel, 2+ = real entries.
    nodes: Vec<Node<K, V>>,
    /// Maps a key to its index in `nodes`.
    map: AHashMap<K, usize>,
    /// Indices of freed (reusable) slots.
    free_list: Vec<usize>,
}

impl<K: Hash + Eq + Clone, V> Store<K, V> {
    pub(crate) fn new() -> Self {
        let mut nodes: Vec<Node<K, V>> = Vec::with_capacity(16);
        nodes.push(Node {
            entry: None,
            prev: NULL,
            next: TAIL,
        });
        nodes.push(Node {
            entry: None,
            prev: HEAD,
            next: NULL,
        });

        Store {
            nodes,
            map: AHashMap::new(),
            free_list: Vec::new(),
        }
    }

    /// Links `idx` immediately after the HEAD sentinel (marks it MRU).
    fn link_after_head(&mut self, idx: usize) {
        let old_first = self.nodes[HEAD].next;
        self.nodes[idx].prev = HEAD;
        self.nodes[idx].next = old_first;
        self.nodes[HEAD].next = idx;
        self.nodes[old_first].prev = idx;
    }

    /// Detaches `idx` from its current position in the list.
    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[idx].prev = NULL;
        self.nodes[idx].next = NULL;
    }

    /// Allocates a node (reusing from the free list when available).
    fn alloc_node(&mut self, entry: Arc<Entry<K, V>>) -> usize {
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx].entry = Some(entry);
            self.nodes[idx].prev = NULL;
            self.nodes[idx].next = NULL;
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(Node {
                entry: Some(entry),
                prev: NULL,
                next: NULL,
            });
            idx
        }
    }

    // -----------------------------------------------------------------------
    // Pinning operations
    // -----------------------------------------------------------------------

    /// Locates the entry for `key`, moves it to the front of the recency
    /// order, increments its pin count and returns it. `None` if absent.
    pub(crate) fn peek_and_pin(&mut self, key: &K) -> Option<Arc<Entry<K, V>>> {
        let &idx = self.map.get(key)?;
        self.unlink(idx);
        self.link_after_head(idx);
        let entry = self.nodes[idx].entry.as_ref()?;
        entry.pin();
        Some(Arc::clone(entry))
    }

    /// Pins `entry` again, but only if it is still the resident entry for
    /// `key`. Returns `false` when the key is absent or now maps to a
    /// different entry (the original was evicted and reloaded).
    pub(crate) fn repin(&mut self, key: &K, entry: &Arc<Entry<K, V>>) -> bool {
        let Some(&idx) = self.map.get(key) else {
            return false;
        };
        let resident = match self.nodes[idx].entry.as_ref() {
            Some(resident) if Arc::ptr_eq(resident, entry) => Arc::clone(resident),
            _ => return false,
        };
        self.unlink(idx);
        self.link_after_head(idx);
        resident.pin();
        true
    }

    /// Decrements the pin count for `key`. A missing key is a no-op: the
    /// entry may have been evicted by a prior admission. Returns whether an
    /// entry was actually unpinned.
    pub(crate) fn unpin(&mut self, key: &K) -> bool {
        let Some(&idx) = self.map.get(key) else {
            return false;
        };
        match self.nodes[idx].entry.as_ref() {
            Some(entry) => {
                entry.unpin();
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Residency operations
    // -----------------------------------------------------------------------

    /// Inserts a new entry for `key` at the front of the recency order with
    /// pin count 1 and returns it. The key must not already be resident.
    pub(crate) fn insert_pinned(&mut self, key: K, value: Arc<V>) -> Arc<Entry<K, V>> {
        debug_assert!(!self.map.contains_key(&key), "key already resident");
        let entry = Arc::new(Entry::new(key.clone(), value));
        let idx = self.alloc_node(Arc::clone(&entry));
        self.map.insert(key, idx);
        self.link_after_head(idx);
        entry
    }

    /// Removes the entry for `key` from the map and the recency order.
    /// Returns the removed entry, if any.
    pub(crate) fn remove(&mut self, key: &K) -> Option<Arc<Entry<K, V>>> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        let entry = self.nodes[idx].entry.take();
        self.free_list.push(idx);
        entry
    }

    /// Walks entries from the LRU end, feeding each *unpinned* key to
    /// `collector` until it reports that evicting the accumulated victims
    /// frees enough room. Pinned entries are skipped.
    ///
    /// Returns the victims in eviction order, or `None` if the walk
    /// exhausted the list before the collector was satisfied.
    pub(crate) fn plan_eviction(
        &self,
        collector: &mut dyn FnMut(&K) -> bool,
    ) -> Option<Vec<K>> {
        let mut victims = Vec::new();
        let mut idx = self.nodes[TAIL].prev;
        while idx != HEAD {
            let prev = self.nodes[idx].prev;
            if let Some(entry) = self.nodes[idx].entry.as_ref() {
                if entry.pins() == 0 {
                    victims.push(entry.key.clone());
                    if collector(&entry.key) {
                        return Some(victims);
                    }
                }
            }
            idx = prev;
        }
        None
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
