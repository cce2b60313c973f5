//! Mutex/condvar monitor used for shared playback state.
//!
//! Session state and the backend sample queue are both "a little state plus
//! threads that sleep on it", so they share this wrapper: a value guarded by
//! a `Mutex` paired with a `Condvar`. Waiters block in `wait_while`; the
//! writing thread mutates under the lock and calls `notify_all`.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// A value guarded by a mutex paired with a condition variable.
pub struct Monitor<T> {
    state: Mutex<T>,
    signal: Condvar,
}

impl<T> Monitor<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(value),
            signal: Condvar::new(),
        }
    }

    /// Lock the guarded value.
    ///
    /// Poisoning is deliberately ignored: a panicking writer leaves the value
    /// in its last written state, which is still safe to read here.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wake every thread blocked in `wait_while`/`wait_timeout_while`.
    pub fn notify_all(&self) {
        self.signal.notify_all();
    }

    /// Block until `condition` returns false.
    pub fn wait_while<'a, F>(&self, guard: MutexGuard<'a, T>, condition: F) -> MutexGuard<'a, T>
    where
        F: FnMut(&mut T) -> bool,
    {
        self.signal
            .wait_while(guard, condition)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Block until `condition` returns false or `timeout` elapses.
    ///
    /// Returns the reacquired guard and whether the wait timed out with the
    /// condition still true.
    pub fn wait_timeout_while<'a, F>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
        condition: F,
    ) -> (MutexGuard<'a, T>, bool)
    where
        F: FnMut(&mut T) -> bool,
    {
        let (guard, result) = self
            .signal
            .wait_timeout_while(guard, timeout, condition)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (guard, result.timed_out())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_while_released_by_notify() {
        let monitor = Arc::new(Monitor::new(false));
        let waiter = Arc::clone(&monitor);

        let handle = thread::spawn(move || {
            let guard = waiter.lock();
            let guard = waiter.wait_while(guard, |ready| !*ready);
            *guard
        });

        thread::sleep(Duration::from_millis(20));
        *monitor.lock() = true;
        monitor.notify_all();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wait_timeout_while_times_out() {
        let monitor = Monitor::new(0u32);
        let guard = monitor.lock();
        let (guard, timed_out) =
            monitor.wait_timeout_while(guard, Duration::from_millis(10), |value| *value == 0);
        assert!(timed_out);
        assert_eq!(*guard, 0);
    }

    #[test]
    fn test_wait_timeout_while_condition_already_false() {
        let monitor = Monitor::new(5u32);
        let guard = monitor.lock();
        let (_guard, timed_out) =
            monitor.wait_timeout_while(guard, Duration::from_millis(10), |value| *value == 0);
        assert!(!timed_out);
    }
}
