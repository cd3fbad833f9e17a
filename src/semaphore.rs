use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::WaitError;
use crate::sync::{lock, Condvar, Mutex};

/// Counting semaphore built from a counter and a condition variable.
pub struct Semaphore {
    value: Mutex<usize>,
    cond_var: Condvar,
}

impl Semaphore {
    pub fn new(value: usize) -> Self {
        Self {
            value: Mutex::new(value),
            cond_var: Condvar::new(),
        }
    }

    /// Blocks until a permit is available, then takes it.
    pub fn acquire(&self) {
        let mut guard = lock(&self.value);
        while *guard == 0 {
            guard = self
                .cond_var
                .wait(guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *guard -= 1;
    }

    pub fn try_acquire(&self) -> bool {
        let mut guard = lock(&self.value);
        if *guard == 0 {
            return false;
        }
        *guard -= 1;
        true
    }

    /// Like [`acquire`](Self::acquire) but gives up once `cancel` is set or
    /// `timeout` has elapsed. A failed wait never takes a permit.
    ///
    /// Cancellation is checked on every wakeup, so whoever cancels must
    /// also call [`interrupt`](Self::interrupt) to wake sleeping waiters.
    pub fn acquire_with(
        &self,
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<(), WaitError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = lock(&self.value);
        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(WaitError::Cancelled);
            }
            if *guard > 0 {
                *guard -= 1;
                return Ok(());
            }
            guard = match deadline {
                None => self
                    .cond_var
                    .wait(guard)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WaitError::TimedOut);
                    }
                    let (guard, _) = self
                        .cond_var
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    guard
                }
            };
        }
    }

    pub fn release(&self) {
        *lock(&self.value) += 1;
        self.cond_var.notify_one();
    }

    /// Wakes every waiter without handing out permits. Holding the counter
    /// lock while notifying means a waiter is either before its
    /// cancellation check or already parked, never in between.
    pub fn interrupt(&self) {
        let _guard = lock(&self.value);
        self.cond_var.notify_all();
    }

    /// Current permit count. Stale as soon as it returns.
    pub fn available(&self) -> usize {
        *lock(&self.value)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn test_basic_sempahore() {
        let capacity = 5;
        let sem = Arc::new(Semaphore::new(capacity));
        let mut handles = vec![];

        for _ in 0..capacity {
            let sem_clone = Arc::clone(&sem);
            handles.push(thread::spawn(move || {
                sem_clone.acquire();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sem.available(), 0);
        assert!(!sem.try_acquire());
    }

    #[test]
    fn test_release_wakes_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.acquire())
        };
        thread::sleep(Duration::from_millis(20));
        sem.release();
        waiter.join().unwrap();
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn test_timeout_leaves_count_untouched() {
        let sem = Semaphore::new(0);
        let result = sem.acquire_with(None, Some(Duration::from_millis(20)));
        assert_eq!(result, Err(WaitError::TimedOut));
        assert_eq!(sem.available(), 0);

        sem.release();
        assert_eq!(sem.acquire_with(None, Some(Duration::from_millis(20))), Ok(()));
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn test_cancel_before_wait() {
        let sem = Semaphore::new(3);
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(sem.acquire_with(Some(&token), None), Err(WaitError::Cancelled));
        assert_eq!(sem.available(), 3);
    }

    #[test]
    fn test_interrupt_wakes_cancelled_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let token = CancelToken::new();
        let waiter = {
            let sem = Arc::clone(&sem);
            let token = token.clone();
            thread::spawn(move || sem.acquire_with(Some(&token), None))
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        sem.interrupt();
        assert_eq!(waiter.join().unwrap(), Err(WaitError::Cancelled));
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn test_interrupt_without_cancel_keeps_waiting() {
        let sem = Arc::new(Semaphore::new(0));
        let token = CancelToken::new();
        let waiter = {
            let sem = Arc::clone(&sem);
            let token = token.clone();
            thread::spawn(move || sem.acquire_with(Some(&token), None))
        };
        thread::sleep(Duration::from_millis(20));
        sem.interrupt();
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        sem.release();
        assert_eq!(waiter.join().unwrap(), Ok(()));
    }
}
