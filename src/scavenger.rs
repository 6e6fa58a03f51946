//! Scavenger — the pluggable accounting policy behind admission.
//!
//! The scavenger decides from **keys alone** whether a new entry fits and,
//! when it does not, which victims would make room. It never sees values:
//! accounting runs before value loading, which may be expensive.
//!
//! The protocol is a two-step handshake. [`Scavenger::collect`] tentatively
//! accounts for a key: if there is room the accounting is committed and
//! [`Admission::Fits`] is returned; otherwise [`Admission::Evict`] carries a
//! *collector* that the cache feeds victim candidates in LRU order until it
//! reports that evicting all of them frees enough room. Every committed
//! `collect` must eventually be balanced by exactly one [`Scavenger::throw`].

use std::sync::Arc;

/// Outcome of [`Scavenger::collect`].
pub enum Admission<K> {
    /// Room exists; the accounting for the key has been committed.
    Fits,
    /// No room. The collector is invoked once per victim candidate and
    /// returns `true` when the proposed set of victims is sufficient.
    /// Nothing has been committed.
    Evict(Collector<K>),
}

/// Victim-accumulating predicate handed out by [`Scavenger::collect`].
///
/// Typically returns `false` several times before it returns `true`.
pub type Collector<K> = Box<dyn FnMut(&K) -> bool + Send>;

/// Records occupancy of the cache and decides whether eviction is necessary.
///
/// All calls are made under the cache's exclusive lock, so implementations
/// need no interior synchronization.
pub trait Scavenger<K>: Send + Sync + 'static {
    /// Tentatively accounts for admitting `key`.
    fn collect(&mut self, key: &K) -> Admission<K>;

    /// Releases the accounting previously committed for `key`.
    fn throw(&mut self, key: &K);
}

// ---------------------------------------------------------------------------
// LazyScavenger
// ---------------------------------------------------------------------------

/// The default scavenger: an integer `size` tracked against a fixed
/// `capacity`, with a per-key weight function.
///
/// `collect` commits `size += weight(key)` when it fits; otherwise the
/// returned collector subtracts victim weights from the outstanding deficit
/// and reports `true` once the deficit reaches zero.
pub struct LazyScavenger<K> {
    capacity: i64,
    size: i64,
    weight: Arc<dyn Fn(&K) -> i64 + Send + Sync>,
}

impl<K: 'static> LazyScavenger<K> {
    pub fn new<W>(weight: W, capacity: i64) -> Self
    where
        W: Fn(&K) -> i64 + Send + Sync + 'static,
    {
        LazyScavenger {
            capacity,
            size: 0,
            weight: Arc::new(weight),
        }
    }

    /// Every key costs exactly 1 unit, so `capacity` is an entry count.
    pub fn unit(capacity: i64) -> Self {
        Self::new(|_: &K| 1, capacity)
    }

    /// Occupancy currently committed against the capacity.
    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }
}

impl<K: Send + Sync + 'static> Scavenger<K> for LazyScavenger<K> {
    fn collect(&mut self, key: &K) -> Admission<K> {
        let w = (self.weight)(key);
        if self.size + w > self.capacity {
            let weight = Arc::clone(&self.weight);
            let mut deficit = self.size + w - self.capacity;
            return Admission::Evict(Box::new(move |victim: &K| {
                deficit -= weight(victim);
                deficit <= 0
            }));
        }
        self.size += w;
        Admission::Fits
    }

    fn throw(&mut self, key: &K) {
        self.size -= (self.weight)(key);
    }
}
