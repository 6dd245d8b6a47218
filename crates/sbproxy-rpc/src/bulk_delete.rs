//! Batched release of remote handles.
//!
//! Proxies queue their handle when dropped; the queue is drained into a
//! single delete call once it reaches the batch size or when the owner
//! signals an idle point with [`BulkDeleter::flush`].
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Pending deletions for one handle type.
pub struct BulkDeleter<T> {
    batch_size: usize,
    pending: Mutex<Vec<T>>,
    /// Held while a drained batch is being handed to the deleter.
    flushing: Mutex<()>,
}

impl<T> BulkDeleter<T> {
    /// A deleter that flushes automatically every `batch_size` items.
    /// A size of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pending: Mutex::new(Vec::new()),
            flushing: Mutex::new(()),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of items waiting for a flush.
    pub fn len(&self) -> usize {
        self.lock_pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `item`. When the batch size is reached, the queue is
    /// drained and `deleter` runs once with every queued item, outside
    /// the queue lock.
    ///
    /// If another flush is in progress the items stay queued for the
    /// next trigger instead of blocking the caller.
    pub fn queue_for_deletion<F>(&self, item: T, deleter: F)
    where
        F: FnOnce(Vec<T>),
    {
        let (batch, _flush_guard) = {
            let mut pending = self.lock_pending();
            pending.push(item);
            if pending.len() < self.batch_size {
                return;
            }
            let guard = match self.flushing.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            (mem::take(&mut *pending), guard)
        };
        deleter(batch);
    }

    /// Drain everything queued so far into one `deleter` call.
    ///
    /// Returns `false` without calling `deleter` when nothing is queued.
    /// Items queued while the deleter runs are left for the next flush.
    pub fn flush<F>(&self, deleter: F) -> bool
    where
        F: FnOnce(Vec<T>),
    {
        let _flush_guard = self.flushing.lock().unwrap_or_else(PoisonError::into_inner);
        let batch = mem::take(&mut *self.lock_pending());
        if batch.is_empty() {
            return false;
        }
        deleter(batch);
        true
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<T>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn recorder() -> (Arc<Mutex<Vec<Vec<u64>>>>, impl Fn() -> Box<dyn FnOnce(Vec<u64>)>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        let make = move || {
            let sink = Arc::clone(&sink);
            Box::new(move |batch: Vec<u64>| sink.lock().unwrap().push(batch))
                as Box<dyn FnOnce(Vec<u64>)>
        };
        (batches, make)
    }

    #[test]
    fn queue_below_batch_size_does_not_flush() {
        let deleter = BulkDeleter::new(3);
        let (batches, make) = recorder();
        deleter.queue_for_deletion(1, make());
        deleter.queue_for_deletion(2, make());
        assert!(batches.lock().unwrap().is_empty());
        assert_eq!(deleter.len(), 2);
    }

    #[test]
    fn reaching_batch_size_flushes_everything_once() {
        let deleter = BulkDeleter::new(3);
        let (batches, make) = recorder();
        for id in 1..=3 {
            deleter.queue_for_deletion(id, make());
        }
        assert_eq!(*batches.lock().unwrap(), vec![vec![1, 2, 3]]);
        assert!(deleter.is_empty());
    }

    #[test]
    fn default_batch_of_hundred_is_one_call() {
        let deleter = BulkDeleter::new(100);
        let (batches, make) = recorder();
        for id in 0..250 {
            deleter.queue_for_deletion(id, make());
        }
        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 100));
        assert_eq!(deleter.len(), 50);
    }

    #[test]
    fn flush_empty_queue_is_noop() {
        let deleter: BulkDeleter<u64> = BulkDeleter::new(10);
        let (batches, make) = recorder();
        assert!(!deleter.flush(make()));
        assert!(batches.lock().unwrap().is_empty());
    }

    #[test]
    fn flush_twice_issues_one_delete() {
        let deleter = BulkDeleter::new(10);
        let (batches, make) = recorder();
        deleter.queue_for_deletion(7, make());
        deleter.queue_for_deletion(8, make());
        assert!(deleter.flush(make()));
        assert!(!deleter.flush(make()));
        assert_eq!(*batches.lock().unwrap(), vec![vec![7, 8]]);
    }

    #[test]
    fn duplicates_are_kept() {
        let deleter = BulkDeleter::new(10);
        let (batches, make) = recorder();
        deleter.queue_for_deletion(42, make());
        deleter.queue_for_deletion(42, make());
        deleter.flush(make());
        assert_eq!(*batches.lock().unwrap(), vec![vec![42, 42]]);
    }

    #[test]
    fn zero_batch_size_flushes_every_item() {
        let deleter = BulkDeleter::new(0);
        assert_eq!(deleter.batch_size(), 1);
        let (batches, make) = recorder();
        deleter.queue_for_deletion(1, make());
        deleter.queue_for_deletion(2, make());
        assert_eq!(*batches.lock().unwrap(), vec![vec![1], vec![2]]);
    }

    #[test]
    fn items_queued_during_flush_survive() {
        let deleter = Arc::new(BulkDeleter::new(100));
        deleter.queue_for_deletion(1, |_| {});
        let inner = Arc::clone(&deleter);
        let mut flushed = Vec::new();
        deleter.flush(|batch| {
            flushed = batch;
            // Arrives after the drain started; must not be lost.
            inner.queue_for_deletion(2, |_| panic!("no threshold flush expected"));
        });
        assert_eq!(flushed, vec![1]);
        assert_eq!(deleter.len(), 1);
    }

    #[test]
    fn threshold_reached_during_flush_defers() {
        let deleter = Arc::new(BulkDeleter::new(1));
        let inner = Arc::clone(&deleter);
        deleter.queue_for_deletion(1, move |batch| {
            assert_eq!(batch, vec![1]);
            // The flush lock is held; this must queue, not deadlock.
            inner.queue_for_deletion(2, |_| panic!("concurrent flush"));
        });
        assert_eq!(deleter.len(), 1);
    }

    #[test]
    fn concurrent_queueing_loses_nothing() {
        let deleter = Arc::new(BulkDeleter::new(16));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let threads: Vec<_> = (0..8u64)
            .map(|t| {
                let deleter = Arc::clone(&deleter);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    for i in 0..100u64 {
                        let seen = Arc::clone(&seen);
                        deleter.queue_for_deletion(t * 1000 + i, move |batch| {
                            seen.lock().unwrap().extend(batch)
                        });
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        let sink = Arc::clone(&seen);
        deleter.flush(move |batch| sink.lock().unwrap().extend(batch));
        let mut all = seen.lock().unwrap().clone();
        all.sort_unstable();
        assert_eq!(all.len(), 800);
        all.dedup();
        assert_eq!(all.len(), 800);
    }
}
