//! Wait queue — callers blocked until capacity might be available.
//!
//! A caller that fails admission enqueues a waiter record. Every unpin
//! broadcasts to **every** waiter; each woken waiter retries admission on
//! its own and re-blocks for its remaining timeout if it loses the race.
//! Deliberately coarse: an admission retry is cheap next to loader cost,
//! and fairness is not a goal.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

// ---------------------------------------------------------------------------
// Notify
// ---------------------------------------------------------------------------

/// A one-slot notification cell.
///
/// The flag absorbs a notification that arrives before the waiter starts
/// waiting, so a wake between admission attempts is not lost.
pub(crate) struct Notify {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Notify {
    pub(crate) fn new() -> Self {
        Notify {
            signaled: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn notify(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.cond.notify_all();
    }

    /// Blocks until notified or until `timeout` elapses. Returns `true` if
    /// a notification was observed; consumes it either way.
    pub(crate) fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.cond.wait_until(&mut signaled, deadline).timed_out() {
                break;
            }
        }
        let woken = *signaled;
        *signaled = false;
        woken
    }
}

// ---------------------------------------------------------------------------
// WaitQueue
// ---------------------------------------------------------------------------

struct Waiter<K> {
    key: K,
    cell: Arc<Notify>,
}

/// FIFO queue of waiter records, guarded by the cache's exclusive lock.
pub(crate) struct WaitQueue<K> {
    queue: VecDeque<Waiter<K>>,
}

impl<K: Eq> WaitQueue<K> {
    pub(crate) fn new() -> Self {
        WaitQueue {
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, key: K, cell: Arc<Notify>) {
        self.queue.push_back(Waiter { key, cell });
    }

    /// Removes the record identified by `key` and the exact cell. Identity
    /// matters: several waiters may be queued for the same key.
    pub(crate) fn remove(&mut self, key: &K, cell: &Arc<Notify>) {
        self.queue
            .retain(|w| !(w.key == *key && Arc::ptr_eq(&w.cell, cell)));
    }

    /// Wakes every queued waiter.
    pub(crate) fn broadcast(&self) {
        for waiter in &self.queue {
            waiter.cell.notify();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_before_wait_is_not_lost() {
        let cell = Notify::new();
        cell.notify();
        assert!(cell.wait_for(Duration::from_millis(1)));
        // The notification was consumed.
        assert!(!cell.wait_for(Duration::from_millis(1)));
    }

    #[test]
    fn wait_times_out_without_notification() {
        let cell = Notify::new();
        let start = Instant::now();
        assert!(!cell.wait_for(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_returns_when_notified_from_another_thread() {
        let cell = Arc::new(Notify::new());
        let notifier = Arc::clone(&cell);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            notifier.notify();
        });
        assert!(cell.wait_for(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn remove_matches_on_cell_identity() {
        let mut queue: WaitQueue<&str> = WaitQueue::new();
        let first = Arc::new(Notify::new());
        let second = Arc::new(Notify::new());
        queue.push("k", Arc::clone(&first));
        queue.push("k", Arc::clone(&second));

        queue.remove(&"k", &first);
        assert_eq!(queue.len(), 1, "only the matching record is removed");
        queue.remove(&"k", &second);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn broadcast_wakes_every_waiter() {
        let mut queue: WaitQueue<u32> = WaitQueue::new();
        let cells: Vec<_> = (0..3).map(|_| Arc::new(Notify::new())).collect();
        for (i, cell) in cells.iter().enumerate() {
            queue.push(i as u32, Arc::clone(cell));
        }
        queue.broadcast();
        for cell in &cells {
            assert!(cell.wait_for(Duration::from_millis(1)));
        }
    }
}
