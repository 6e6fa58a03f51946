use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::builder::CacheBuilder;
use crate::error::Error;
use crate::flight::{Flight, Group};
use crate::loader::{Finalizer, Loader};
use crate::metrics::stats::{Metrics, StatsCounter};
use crate::scavenger::{Admission, Scavenger};
use crate::store::{Entry, Store};
use crate::waitlist::{Notify, WaitQueue};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a successful [`Cache::do_with`] or [`Cache::do_wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome<R> {
    /// Whatever the caller's closure returned.
    pub output: R,
    /// `true` if this call went through the loader path (a miss), `false`
    /// if the key was already resident (a hit).
    pub missing: bool,
}

// ---------------------------------------------------------------------------
// Cache interior
// ---------------------------------------------------------------------------

/// State guarded by the single exclusive lock. Admission decisions need a
/// consistent view of residency, recency, pin counts and accounting, so all
/// four live under one lock.
struct State<K, V> {
    store: Store<K, V>,
    scavenger: Box<dyn Scavenger<K>>,
    waiters: WaitQueue<K>,
}

impl<K: Hash + Eq + Clone + 'static, V> State<K, V> {
    /// Admission accounting for `key`. Returns the victims that must be
    /// evicted first (empty when the key fits outright), or `None` when no
    /// unpinned set can make room.
    ///
    /// An in-capacity `collect` is immediately given back: this is a dry
    /// run, and the caller commits authoritatively after eviction.
    fn plan_admission(&mut self, key: &K) -> Option<Vec<K>> {
        match self.scavenger.collect(key) {
            Admission::Fits => {
                self.scavenger.throw(key);
                Some(Vec::new())
            }
            Admission::Evict(mut collector) => self.store.plan_eviction(&mut *collector),
        }
    }
}

pub(crate) struct Inner<K, V> {
    state: RwLock<State<K, V>>,
    flight: Group<K, Result<Arc<Entry<K, V>>, Error>>,
    loader: Option<Box<dyn Loader<K, V>>>,
    finalizer: Option<Box<dyn Finalizer<K, V>>>,
    metrics: StatsCounter,
}

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

/// A concurrent pinning cache with single-flight loading.
///
/// Values are admitted on demand through the configured loader and stay
/// resident — immune to eviction — while any caller's closure runs against
/// them. Unpinned entries are evicted in least-recently-used order when a
/// new key needs room.
///
/// # Example
/// ```
/// use corretto::CacheBuilder;
///
/// let cache: corretto::Cache<u64, String> = CacheBuilder::new()
///     .capacity(2)
///     .loader(|key: &u64| Some(key.to_string()))
///     .build();
///
/// let first = cache.do_with(&1, |v| v.clone()).unwrap();
/// assert!(first.missing);
/// assert_eq!(first.output, "1");
///
/// let second = cache.do_with(&1, |v| v.len()).unwrap();
/// assert!(!second.missing);
/// ```
pub struct Cache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Cache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        loader: Option<Box<dyn Loader<K, V>>>,
        finalizer: Option<Box<dyn Finalizer<K, V>>>,
        scavenger: Box<dyn Scavenger<K>>,
    ) -> Self {
        Cache {
            inner: Arc::new(Inner {
                state: RwLock::new(State {
                    store: Store::new(),
                    scavenger,
                    waiters: WaitQueue::new(),
                }),
                flight: Group::new(),
                loader,
                finalizer,
                metrics: StatsCounter::new(),
            }),
        }
    }

    /// Returns a [`CacheBuilder`] for constructing a new cache.
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Makes `key` resident and pinned, then runs `doer` against the value.
    ///
    /// The entry cannot be evicted while `doer` runs; the pin is released on
    /// every exit path, including a panicking closure. The closure receives
    /// a borrow scoped to this call — values must not escape it.
    ///
    /// Fails with [`Error::NoSuchItem`] if the loader reports the key absent
    /// (or no loader is configured), and with [`Error::NotEnoughSpace`] if
    /// admission is impossible without waiting.
    pub fn do_with<R>(
        &self,
        key: &K,
        doer: impl FnOnce(&V) -> R,
    ) -> Result<Outcome<R>, Error> {
        match self.get_and_pin(key) {
            Ok((entry, missing)) => self.run_doer(key, &entry, missing, doer),
            Err(err) => {
                self.inner.metrics.record_miss();
                Err(err)
            }
        }
    }

    /// As [`Cache::do_with`], but a failed admission enrolls the caller on
    /// the wait queue and retries each time any entry is unpinned, until
    /// `timeout` has elapsed since the first attempt.
    ///
    /// On deadline expiry the call fails with [`Error::TimedOut`] and the
    /// waiter record is removed; `doer` is never invoked. A zero timeout on
    /// an unadmittable miss therefore times out immediately.
    pub fn do_wait<R>(
        &self,
        key: &K,
        timeout: Duration,
        doer: impl FnOnce(&V) -> R,
    ) -> Result<Outcome<R>, Error> {
        let start = Instant::now();
        let mut enrolled: Option<Arc<Notify>> = None;

        let (entry, missing) = loop {
            match self.get_and_pin(key) {
                Ok(pinned) => break pinned,
                Err(Error::NotEnoughSpace) => {}
                Err(err) => {
                    if let Some(cell) = enrolled.take() {
                        self.forget_waiter(key, &cell);
                    }
                    self.inner.metrics.record_miss();
                    return Err(err);
                }
            }

            let cell = match &enrolled {
                Some(cell) => Arc::clone(cell),
                None => {
                    let cell = Arc::new(Notify::new());
                    self.inner
                        .state
                        .write()
                        .waiters
                        .push(key.clone(), Arc::clone(&cell));
                    enrolled = Some(Arc::clone(&cell));
                    cell
                }
            };

            // The deadline is measured from the first admission attempt,
            // not from enrollment and not per retry.
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() || !cell.wait_for(remaining) {
                self.forget_waiter(key, &cell);
                self.inner.metrics.record_timeout();
                return Err(Error::TimedOut);
            }
        };

        if let Some(cell) = enrolled.take() {
            self.forget_waiter(key, &cell);
        }
        self.run_doer(key, &entry, missing, doer)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> Metrics {
        self.inner.metrics.snapshot()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.state.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().store.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.state.read().store.contains(key)
    }

    // -----------------------------------------------------------------------
    // Pinned execution
    // -----------------------------------------------------------------------

    fn run_doer<R>(
        &self,
        key: &K,
        entry: &Arc<Entry<K, V>>,
        missing: bool,
        doer: impl FnOnce(&V) -> R,
    ) -> Result<Outcome<R>, Error> {
        if missing {
            self.inner.metrics.record_miss();
        } else {
            self.inner.metrics.record_hit();
        }
        // The guard releases the pin even if `doer` panics.
        let _guard = PinGuard { cache: self, key };
        let output = doer(entry.value.as_ref());
        Ok(Outcome { output, missing })
    }

    /// Returns the pinned entry for `key` and whether this call took the
    /// loader path.
    fn get_and_pin(&self, key: &K) -> Result<(Arc<Entry<K, V>>, bool), Error> {
        loop {
            if let Some(entry) = self.peek_and_pin(key) {
                return Ok((entry, false));
            }

            let Some(loader) = self.inner.loader.as_deref() else {
                return Err(Error::NoSuchItem);
            };

            // Fail fast when even a full eviction cannot make room. The
            // check is speculative: the lock is dropped before loading, so
            // admission is re-run authoritatively in `set_and_pin`.
            if !self.try_scavenge(key) {
                return Err(Error::NotEnoughSpace);
            }

            let flight = self.inner.flight.run(key, || {
                // A concurrent flight may have installed the value between
                // our miss and this critical section.
                if let Some(entry) = self.peek_and_pin(key) {
                    return Ok(entry);
                }
                self.inner.metrics.record_load();
                let value = loader.load(key).ok_or(Error::NoSuchItem)?;
                self.set_and_pin(key.clone(), value)
            });

            match flight {
                Flight::Led(result) => return result.map(|entry| (entry, true)),
                Flight::Joined(Ok(entry)) => {
                    // The leader's pin belongs to the leader. This caller
                    // takes its own, valid only while the entry is still the
                    // resident one; otherwise start over.
                    if self.repin(key, &entry) {
                        return Ok((entry, true));
                    }
                }
                Flight::Joined(Err(err)) => return Err(err),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Store access
    // -----------------------------------------------------------------------

    fn peek_and_pin(&self, key: &K) -> Option<Arc<Entry<K, V>>> {
        self.inner.state.write().store.peek_and_pin(key)
    }

    fn repin(&self, key: &K, entry: &Arc<Entry<K, V>>) -> bool {
        self.inner.state.write().store.repin(key, entry)
    }

    fn unpin(&self, key: &K) {
        let mut state = self.inner.state.write();
        if state.store.unpin(key) {
            state.waiters.broadcast();
        }
    }

    fn forget_waiter(&self, key: &K, cell: &Arc<Notify>) {
        self.inner.state.write().waiters.remove(key, cell);
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    fn try_scavenge(&self, key: &K) -> bool {
        self.inner.state.write().plan_admission(key).is_some()
    }

    /// Installs a freshly loaded value: re-runs admission under the lock,
    /// evicts the chosen victims, commits the accounting and inserts the
    /// entry pinned at the front of the recency order.
    fn set_and_pin(&self, key: K, value: V) -> Result<Arc<Entry<K, V>>, Error> {
        let value = Arc::new(value);
        let mut state = self.inner.state.write();

        let Some(victims) = state.plan_admission(&key) else {
            drop(state);
            // Loaded but never resident: the finalizer still runs so that
            // resources bound to the value are released.
            self.finalize(&key, value.as_ref());
            return Err(Error::NotEnoughSpace);
        };

        let mut evicted = Vec::with_capacity(victims.len());
        for victim in &victims {
            if let Some(entry) = state.store.remove(victim) {
                state.scavenger.throw(victim);
                evicted.push(entry);
            }
        }

        // The victims covered the deficit; this commit cannot fail.
        let commit = state.scavenger.collect(&key);
        debug_assert!(matches!(commit, Admission::Fits));

        let entry = state.store.insert_pinned(key, value);
        drop(state);

        for evictee in evicted {
            self.finalize(&evictee.key, evictee.value.as_ref());
            self.inner.metrics.record_eviction(1);
        }
        Ok(entry)
    }

    /// Runs the finalizer, if configured. Failures are logged and swallowed:
    /// the entry is already gone from the index, so there is nothing left to
    /// roll back.
    fn finalize(&self, key: &K, value: &V) {
        if let Some(finalizer) = self.inner.finalizer.as_deref() {
            if let Err(error) = finalizer.finalize(key, value) {
                tracing::warn!(%error, "cache finalizer failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PinGuard
// ---------------------------------------------------------------------------

/// Releases a pin on drop and wakes capacity waiters.
struct PinGuard<'a, K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    cache: &'a Cache<K, V>,
    key: &'a K,
}

impl<K, V> Drop for PinGuard<'_, K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.cache.unpin(self.key);
    }
}
