//! Per-key single-flight execution.
//!
//! For any key, at most one invocation of the guarded work runs at a time.
//! The first caller becomes the *leader* and executes the work; callers that
//! arrive while the flight is open block and receive a clone of the
//! published result. The slot is cleared once the result is published, so a
//! later caller starts a fresh flight.

use std::collections::hash_map::Entry as MapEntry;
use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};

/// How a caller obtained its result from [`Group::run`].
pub(crate) enum Flight<T> {
    /// This caller executed the work itself.
    Led(T),
    /// Another caller's in-flight execution produced the result.
    Joined(T),
}

struct Call<T> {
    result: Mutex<Option<T>>,
    published: Condvar,
}

impl<T> Call<T> {
    fn new() -> Self {
        Call {
            result: Mutex::new(None),
            published: Condvar::new(),
        }
    }
}

/// Deduplicates concurrent executions keyed by `K`.
pub(crate) struct Group<K, T> {
    calls: Mutex<AHashMap<K, Arc<Call<T>>>>,
}

impl<K, T> Group<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    pub(crate) fn new() -> Self {
        Group {
            calls: Mutex::new(AHashMap::new()),
        }
    }

    /// Runs `work` for `key`, deduplicated against concurrent callers.
    pub(crate) fn run(&self, key: &K, work: impl FnOnce() -> T) -> Flight<T> {
        let call = {
            let mut calls = self.calls.lock();
            match calls.entry(key.clone()) {
                MapEntry::Occupied(open) => {
                    // A flight for this key is open: wait for its result.
                    let call = Arc::clone(open.get());
                    drop(calls);
                    let mut slot = call.result.lock();
                    loop {
                        if let Some(result) = slot.as_ref() {
                            return Flight::Joined(result.clone());
                        }
                        call.published.wait(&mut slot);
                    }
                }
                MapEntry::Vacant(vacant) => {
                    let call = Arc::new(Call::new());
                    vacant.insert(Arc::clone(&call));
                    call
                }
            }
        };

        let result = work();

        *call.result.lock() = Some(result.clone());
        call.published.notify_all();
        self.calls.lock().remove(key);

        Flight::Led(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn leader_result_is_shared_with_joiners() {
        let group: Arc<Group<u32, u32>> = Arc::new(Group::new());
        let executions = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let group = Arc::clone(&group);
                let executions = Arc::clone(&executions);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    match group.run(&7, || {
                        executions.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(100));
                        42
                    }) {
                        Flight::Led(v) | Flight::Joined(v) => v,
                    }
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1, "work must run once");
    }

    #[test]
    fn distinct_keys_run_independently() {
        let group: Group<u32, u32> = Group::new();
        let Flight::Led(a) = group.run(&1, || 10) else {
            panic!("uncontended run must lead");
        };
        let Flight::Led(b) = group.run(&2, || 20) else {
            panic!("uncontended run must lead");
        };
        assert_eq!((a, b), (10, 20));
    }

    #[test]
    fn slot_is_cleared_after_publication() {
        let group: Group<u32, u32> = Group::new();
        let executions = AtomicUsize::new(0);
        for _ in 0..2 {
            group.run(&1, || {
                executions.fetch_add(1, Ordering::SeqCst);
                0
            });
        }
        assert_eq!(
            executions.load(Ordering::SeqCst),
            2,
            "sequential flights must each execute"
        );
    }
}
