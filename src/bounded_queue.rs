//! The bounded buffer and its three guards.
//!
//! Protocol for both sides: take the counting permit, then the lock; drop the
//! lock, then hand the opposite permit over. The lock is never held while
//! waiting on a semaphore, so neither side can block the other's progress.

use std::time::Duration;

use log::trace;

use crate::cancel::CancelToken;
use crate::error::{BufferError, QueueError, WaitError};
use crate::ring::Ring;
use crate::semaphore::Semaphore;
use crate::sync::{lock, AtomicUsize, Mutex, Ordering};

pub struct BoundedQueue<T> {
    queue: Mutex<Ring<T>>,
    empty_slots: Semaphore,
    full_slots: Semaphore,
    cancel: CancelToken,
    wait_timeout: Option<Duration>,
    inside: AtomicUsize,
    peak_inside: AtomicUsize,
}

impl<T> BoundedQueue<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero, since no put could ever complete.
    /// [`crate::config::Config::validate`] rejects that for the pipeline.
    pub fn new(capacity: usize) -> Self {
        Self::with_cancel(capacity, CancelToken::new(), None)
    }

    /// Same as [`new`](Self::new), sharing `cancel` and bounding every wait
    /// by `wait_timeout`.
    pub fn with_cancel(
        capacity: usize,
        cancel: CancelToken,
        wait_timeout: Option<Duration>,
    ) -> Self {
        if capacity == 0 {
            panic!("cannot create a bounded queue with a capacity of 0");
        }
        Self {
            queue: Mutex::new(Ring::new(capacity)),
            empty_slots: Semaphore::new(capacity),
            full_slots: Semaphore::new(0),
            cancel,
            wait_timeout,
            inside: AtomicUsize::new(0),
            peak_inside: AtomicUsize::new(0),
        }
    }

    /// Appends `value` at the tail, blocking while the buffer is full.
    /// Returns the buffer size right after the insertion.
    pub fn put(&self, value: T) -> Result<usize, QueueError> {
        self.wait(&self.empty_slots)?;
        trace!("empty slot acquired");
        // From here on the permit is ours and must be matched by an insert,
        // so cancellation is no longer observed.
        let size = self.critical(|ring| {
            ring.push(value)?;
            Ok(ring.len())
        })?;
        self.full_slots.release();
        trace!("full slot released, size {size}");
        Ok(size)
    }

    /// Removes the head item, blocking while the buffer is empty. Returns the
    /// item and the buffer size right after the removal.
    pub fn take(&self) -> Result<(T, usize), QueueError> {
        self.wait(&self.full_slots)?;
        trace!("full slot acquired");
        let taken = self.critical(|ring| {
            let value = ring.pop()?;
            Ok((value, ring.len()))
        })?;
        self.empty_slots.release();
        trace!("empty slot released, size {}", taken.1);
        Ok(taken)
    }

    /// Cancels every current and future wait on this queue. Operations that
    /// already hold a permit still finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.empty_slots.interrupt();
        self.full_slots.interrupt();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Current occupancy, for observation only. Never use it to decide
    /// whether to put or take.
    pub fn size(&self) -> usize {
        lock(&self.queue).len()
    }

    pub fn capacity(&self) -> usize {
        lock(&self.queue).capacity()
    }

    pub fn empty_slots(&self) -> usize {
        self.empty_slots.available()
    }

    pub fn full_slots(&self) -> usize {
        self.full_slots.available()
    }

    /// Highest number of threads ever seen inside the critical section at
    /// once. Anything above 1 means mutual exclusion was broken.
    pub fn peak_critical_occupancy(&self) -> usize {
        self.peak_inside.load(Ordering::Acquire)
    }

    fn wait(&self, permits: &Semaphore) -> Result<(), WaitError> {
        permits.acquire_with(Some(&self.cancel), self.wait_timeout)
    }

    fn critical<R>(
        &self,
        f: impl FnOnce(&mut Ring<T>) -> Result<R, BufferError>,
    ) -> Result<R, QueueError> {
        let mut ring = lock(&self.queue);
        let entered = self.inside.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_inside.fetch_max(entered, Ordering::AcqRel);
        let result = f(&mut ring);
        self.inside.fetch_sub(1, Ordering::AcqRel);
        drop(ring);
        result.map_err(QueueError::Broken)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn test_bounded_queue() {
        let shared_queue = Arc::new(BoundedQueue::<i32>::new(5));
        let producer_queue = shared_queue.clone();
        let consumer_queue = shared_queue.clone();

        let loops = 100;

        let producer_handle = thread::spawn(move || {
            for i in 0..loops {
                let size = producer_queue.put(i).unwrap();
                assert!((1..=5).contains(&size));
            }
        });
        let consumer_handle = thread::spawn(move || {
            (0..loops)
                .map(|_| consumer_queue.take().unwrap().0)
                .collect::<Vec<_>>()
        });

        producer_handle.join().unwrap();
        let consumed = consumer_handle.join().unwrap();
        assert_eq!(consumed, (0..loops).collect::<Vec<_>>());
        assert_eq!(shared_queue.size(), 0);
        assert_eq!(shared_queue.empty_slots(), 5);
        assert_eq!(shared_queue.full_slots(), 0);
        assert_eq!(shared_queue.peak_critical_occupancy(), 1);
    }

    #[test]
    fn test_slot_counts_track_occupancy() {
        let queue = BoundedQueue::new(3);
        assert_eq!(queue.put('a'), Ok(1));
        assert_eq!(queue.put('b'), Ok(2));
        assert_eq!(queue.empty_slots() + queue.full_slots(), 3);
        assert_eq!(queue.full_slots(), 2);
        assert_eq!(queue.take(), Ok(('a', 1)));
        assert_eq!(queue.empty_slots(), 2);
        assert_eq!(queue.empty_slots() + queue.full_slots(), 3);
    }

    #[test]
    fn test_full_queue_times_out() {
        let timeout = Some(Duration::from_millis(20));
        let queue = BoundedQueue::with_cancel(1, CancelToken::new(), timeout);
        queue.put(1).unwrap();
        assert_eq!(queue.put(2), Err(QueueError::Wait(WaitError::TimedOut)));
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.empty_slots() + queue.full_slots(), 1);
    }

    #[test]
    fn test_cancel_releases_blocked_consumer() {
        let queue = Arc::new(BoundedQueue::<u8>::new(2));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take())
        };
        thread::sleep(Duration::from_millis(20));
        queue.cancel();
        assert_eq!(consumer.join().unwrap(), Err(QueueError::Wait(WaitError::Cancelled)));
        assert_eq!(queue.empty_slots(), 2);
        assert_eq!(queue.full_slots(), 0);
    }

    #[test]
    fn test_cancelled_queue_rejects_new_work() {
        let queue = BoundedQueue::new(2);
        queue.put(7).unwrap();
        queue.cancel();
        assert_eq!(queue.put(8), Err(QueueError::Wait(WaitError::Cancelled)));
        assert_eq!(queue.take(), Err(QueueError::Wait(WaitError::Cancelled)));
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn test_fresh_queue_slots() {
        let queue = BoundedQueue::<u8>::new(4);
        assert_eq!((queue.empty_slots(), queue.full_slots()), (4, 0));
        assert_eq!(queue.capacity(), 4);
        assert_eq!(queue.size(), 0);
    }

    #[test]
    #[should_panic(expected = "capacity of 0")]
    fn test_zero_capacity_rejected() {
        let _ = BoundedQueue::<u8>::new(0);
    }

    #[test]
    fn test_permit_without_item_is_broken() {
        let queue = BoundedQueue::<u8>::new(2);
        // Forge a full-slot permit that no insert backs.
        queue.full_slots.release();
        assert_eq!(queue.take(), Err(QueueError::Broken(BufferError::Underflow)));
        // The unmatched permit is not handed back to the producer side.
        assert_eq!(queue.empty_slots(), 2);
    }
}

#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn test_put_take_capacity_one() {
        loom::model(|| {
            let queue = Arc::new(BoundedQueue::new(1));
            let producer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..2 {
                        let size = queue.put(i).unwrap();
                        assert_eq!(size, 1);
                    }
                })
            };

            let mut consumed = vec![];
            for _ in 0..2 {
                let (value, size) = queue.take().unwrap();
                assert_eq!(size, 0);
                consumed.push(value);
            }
            producer.join().unwrap();

            assert_eq!(consumed, vec![0, 1]);
            assert_eq!(queue.empty_slots(), 1);
            assert_eq!(queue.full_slots(), 0);
            assert_eq!(queue.peak_critical_occupancy(), 1);
        });
    }

    #[test]
    fn test_cancel_while_consumer_waits() {
        loom::model(|| {
            let queue = Arc::new(BoundedQueue::<u8>::new(1));
            let consumer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.take())
            };
            queue.cancel();
            let result = consumer.join().unwrap();
            assert_eq!(result, Err(QueueError::Wait(WaitError::Cancelled)));
            assert_eq!(queue.empty_slots() + queue.full_slots(), 1);
        });
    }
}
