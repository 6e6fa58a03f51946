use thiserror::Error;

/// Errors returned by [`Cache::do_with`] and [`Cache::do_wait`].
///
/// [`Cache::do_with`]: crate::Cache::do_with
/// [`Cache::do_wait`]: crate::Cache::do_wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The key is not resident and the loader could not produce it
    /// (or no loader is configured).
    #[error("no such item")]
    NoSuchItem,

    /// Admission is not possible right now: the key's weight does not fit
    /// even after evicting every unpinned entry.
    ///
    /// [`Cache::do_with`] surfaces this immediately; [`Cache::do_wait`]
    /// converts it into a wait and only ever surfaces [`Error::TimedOut`].
    ///
    /// [`Cache::do_with`]: crate::Cache::do_with
    /// [`Cache::do_wait`]: crate::Cache::do_wait
    #[error("not enough space")]
    NotEnoughSpace,

    /// A [`Cache::do_wait`] call exceeded its deadline before admission
    /// succeeded.
    ///
    /// [`Cache::do_wait`]: crate::Cache::do_wait
    #[error("timed out")]
    TimedOut,
}
