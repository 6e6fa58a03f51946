//! Loader and finalizer hooks — how values enter and leave the cache.
//!
//! The loader produces a value for a missing key; the finalizer releases
//! whatever external resources are bound to a value once the cache is done
//! with it. The finalizer runs on eviction **and** when a freshly loaded
//! value fails admission and never becomes resident — implementations must
//! treat both calls the same.
//!
//! # Example
//! ```
//! use corretto::CacheBuilder;
//!
//! let cache: corretto::Cache<u64, String> = CacheBuilder::new()
//!     .capacity(16)
//!     .loader(|key: &u64| Some(key.to_string()))
//!     .finalizer(|_key: &u64, _value: &String| Ok(()))
//!     .build();
//!
//! let out = cache.do_with(&7, |v| v.clone()).unwrap();
//! assert_eq!(out.output, "7");
//! ```

/// Error type returned by a [`Finalizer`].
///
/// Finalizer failures are never propagated to callers: the entry is already
/// gone from the index by the time the hook runs, so the cache logs the
/// error and proceeds.
pub type FinalizeError = Box<dyn std::error::Error + Send + Sync>;

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Produces the value for a missing key.
///
/// Returning `None` means the key does not exist; the caller receives
/// [`Error::NoSuchItem`](crate::Error::NoSuchItem).
///
/// The loader runs **without** the cache's internal lock held, but under the
/// per-key single-flight guard: for any key, at most one invocation is in
/// flight at a time, and concurrent callers for that key share its result.
pub trait Loader<K, V>: Send + Sync + 'static {
    fn load(&self, key: &K) -> Option<V>;
}

/// A [`Loader`] backed by a closure.
///
/// Created via [`CacheBuilder::loader`](crate::CacheBuilder::loader).
pub struct FnLoader<F>(pub F);

impl<K, V, F> Loader<K, V> for FnLoader<F>
where
    F: Fn(&K) -> Option<V> + Send + Sync + 'static,
{
    #[inline]
    fn load(&self, key: &K) -> Option<V> {
        (self.0)(key)
    }
}

// ---------------------------------------------------------------------------
// Finalizer
// ---------------------------------------------------------------------------

/// Releases resources bound to a value that is leaving the cache.
///
/// Invoked after the entry has been removed from the index (eviction), or on
/// a freshly loaded value that lost the authoritative capacity check and
/// never became resident. **Do not call cache methods from inside the
/// finalizer.**
pub trait Finalizer<K, V>: Send + Sync + 'static {
    fn finalize(&self, key: &K, value: &V) -> Result<(), FinalizeError>;
}

/// A [`Finalizer`] backed by a closure.
///
/// Created via [`CacheBuilder::finalizer`](crate::CacheBuilder::finalizer).
pub struct FnFinalizer<F>(pub F);

impl<K, V, F> Finalizer<K, V> for FnFinalizer<F>
where
    F: Fn(&K, &V) -> Result<(), FinalizeError> + Send + Sync + 'static,
{
    #[inline]
    fn finalize(&self, key: &K, value: &V) -> Result<(), FinalizeError> {
        (self.0)(key, value)
    }
}
