use std::hash::Hash;

use crate::cache::Cache;
use crate::loader::{FinalizeError, Finalizer, FnFinalizer, FnLoader, Loader};
use crate::scavenger::{LazyScavenger, Scavenger};

/// Number of unit-weight entries a cache built without explicit capacity
/// configuration may hold.
const DEFAULT_CAPACITY: i64 = 64;

/// Builder for configuring and constructing a [`Cache`].
///
/// # Example
/// ```
/// use corretto::CacheBuilder;
///
/// let cache: corretto::Cache<String, Vec<u8>> = CacheBuilder::new()
///     .capacity(1_000)
///     .loader(|key: &String| Some(key.as_bytes().to_vec()))
///     .build();
/// ```
pub struct CacheBuilder<K, V> {
    loader: Option<Box<dyn Loader<K, V>>>,
    finalizer: Option<Box<dyn Finalizer<K, V>>>,
    scavenger: Box<dyn Scavenger<K>>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Send + Sync + 'static,
    V: 'static,
{
    /// Creates a builder with no loader, no finalizer, and a unit-weight
    /// [`LazyScavenger`] holding up to 64 entries.
    ///
    /// Without a loader every miss fails with
    /// [`Error::NoSuchItem`](crate::Error::NoSuchItem).
    pub fn new() -> Self {
        CacheBuilder {
            loader: None,
            finalizer: None,
            scavenger: Box::new(LazyScavenger::unit(DEFAULT_CAPACITY)),
        }
    }

    /// Set the loader closure invoked on a miss. Returning `None` reports
    /// the key as nonexistent.
    pub fn loader<F>(mut self, f: F) -> Self
    where
        F: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        self.loader = Some(Box::new(FnLoader(f)));
        self
    }

    /// Set a loader using any type that implements the [`Loader`] trait.
    pub fn loader_impl<L: Loader<K, V>>(mut self, l: L) -> Self {
        self.loader = Some(Box::new(l));
        self
    }

    /// Register a finalizer closure.
    ///
    /// The closure is called for every entry that leaves the cache — on
    /// eviction and on a freshly loaded value that fails admission. Errors
    /// are logged and swallowed. **Do not call cache methods from within
    /// the closure.**
    ///
    /// # Example
    /// ```
    /// use corretto::CacheBuilder;
    ///
    /// let cache: corretto::Cache<u64, u64> = CacheBuilder::new()
    ///     .capacity(10)
    ///     .loader(|k: &u64| Some(*k))
    ///     .finalizer(|key: &u64, _val: &u64| {
    ///         println!("released key={key}");
    ///         Ok(())
    ///     })
    ///     .build();
    /// ```
    pub fn finalizer<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) -> Result<(), FinalizeError> + Send + Sync + 'static,
    {
        self.finalizer = Some(Box::new(FnFinalizer(f)));
        self
    }

    /// Register a finalizer via the [`Finalizer`] trait.
    pub fn finalizer_impl<F: Finalizer<K, V>>(mut self, f: F) -> Self {
        self.finalizer = Some(Box::new(f));
        self
    }

    /// Use a [`LazyScavenger`] with the given per-key weight function and
    /// capacity.
    pub fn lazy_scavenger<W>(mut self, weight: W, capacity: i64) -> Self
    where
        W: Fn(&K) -> i64 + Send + Sync + 'static,
    {
        self.scavenger = Box::new(LazyScavenger::new(weight, capacity));
        self
    }

    /// Cap the cache at `capacity` unit-weight entries.
    pub fn capacity(mut self, capacity: i64) -> Self {
        self.scavenger = Box::new(LazyScavenger::unit(capacity));
        self
    }

    /// Use any type that implements the [`Scavenger`] trait.
    pub fn scavenger_impl<S: Scavenger<K>>(mut self, s: S) -> Self {
        self.scavenger = Box::new(s);
        self
    }
}

impl<K, V> Default for CacheBuilder<K, V>
where
    K: Send + Sync + 'static,
    V: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn build(self) -> Cache<K, V> {
        Cache::new(self.loader, self.finalizer, self.scavenger)
    }
}
