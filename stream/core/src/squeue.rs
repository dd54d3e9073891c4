//! Batched single-producer/single-consumer handoff: the producer accumulates
//! a burst locally and splices it onto the shared list with one lock
//! acquisition; the consumer takes the whole shared list in one move.

use std::sync::{Condvar, Mutex};
use std::thread;

struct Inner<T> {
    list: Vec<T>,
    active: bool,
}

pub struct SyncQueue<T> {
    inner: Mutex<Inner<T>>,
    avail: Condvar,
}

impl<T> SyncQueue<T> {
    pub fn new() -> SyncQueue<T> {
        SyncQueue {
            inner: Mutex::new(Inner {
                list: Vec::new(),
                active: true,
            }),
            avail: Condvar::new(),
        }
    }

    /// Splices the whole batch onto the shared list and wakes the consumer.
    /// The batch vector comes back empty, ready for reuse.
    pub fn push_list(&self, batch: &mut Vec<T>) {
        if batch.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        if inner.list.is_empty() {
            std::mem::swap(&mut inner.list, batch);
        } else {
            inner.list.append(batch);
        }
        self.avail.notify_one();
    }

    /// Blocks until a batch is available or the queue has shut down, then
    /// moves the entire shared list into `out`. Returns false once the queue
    /// is inactive and drained; no batch is delivered in that case.
    pub fn pull_list(&self, out: &mut Vec<T>) -> bool {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        loop {
            if !inner.list.is_empty() {
                if out.is_empty() {
                    std::mem::swap(&mut inner.list, out);
                } else {
                    out.append(&mut inner.list);
                }
                return true;
            }
            if !inner.active {
                return false;
            }
            inner = self.avail.wait(inner).expect("queue mutex poisoned");
        }
    }

    /// Waits for the consumer to drain the shared list, then deactivates the
    /// queue and wakes it one last time.
    pub fn shutdown(&self) {
        loop {
            let mut inner = self.inner.lock().expect("queue mutex poisoned");
            if inner.list.is_empty() {
                inner.active = false;
                self.avail.notify_one();
                return;
            }
            drop(inner);
            thread::yield_now();
        }
    }
}

impl<T> Default for SyncQueue<T> {
    fn default() -> Self {
        SyncQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn batches_cross_the_thread_boundary_in_order() {
        let queue: Arc<SyncQueue<u64>> = Arc::new(SyncQueue::new());
        let consumer_q = queue.clone();

        let consumer = thread::spawn(move || {
            let mut seen = Vec::new();
            let mut batch = Vec::new();
            while consumer_q.pull_list(&mut batch) {
                seen.append(&mut batch);
            }
            seen
        });

        let mut batch = Vec::new();
        let mut next = 0u64;
        for _ in 0..100 {
            for _ in 0..50 {
                batch.push(next);
                next += 1;
            }
            queue.push_list(&mut batch);
            assert!(batch.is_empty());
        }
        queue.shutdown();

        let seen = consumer.join().unwrap();
        let expected: Vec<u64> = (0..5000).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn pull_after_shutdown_reports_end_of_stream() {
        let queue: SyncQueue<u32> = SyncQueue::new();
        queue.shutdown();
        let mut out = Vec::new();
        assert!(!queue.pull_list(&mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn shutdown_waits_for_the_drain() {
        let queue: Arc<SyncQueue<u32>> = Arc::new(SyncQueue::new());
        let mut batch = vec![1, 2, 3];
        queue.push_list(&mut batch);

        let consumer_q = queue.clone();
        let consumer = thread::spawn(move || {
            let mut out = Vec::new();
            let mut total = 0;
            while consumer_q.pull_list(&mut out) {
                total += out.drain(..).count();
            }
            total
        });

        queue.shutdown();
        assert_eq!(consumer.join().unwrap(), 3);
    }

    #[test]
    fn empty_push_does_not_wake_anything() {
        let queue: SyncQueue<u32> = SyncQueue::new();
        let mut empty = Vec::new();
        queue.push_list(&mut empty);
        queue.shutdown();
        let mut out = Vec::new();
        assert!(!queue.pull_list(&mut out));
    }
}
