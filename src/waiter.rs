//! Readiness signal that lets scenario content delay its capture.
//!
//! Content that finishes asynchronously (remote images, map tiles, ...)
//! calls [`RenderWaiter::wait`] while building its view and
//! [`RenderWaiter::fulfill`] once the final state is in place. The renderer
//! blocks a background thread on the waiter before rasterizing.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Deadline applied by [`RenderWaiter::wait`].
pub const DEFAULT_WAIT: Duration = Duration::from_secs(10);

/// How a blocking wait on a [`RenderWaiter`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// `fulfill()` was called (or nobody was waiting).
    Fulfilled,
    /// The deadline passed without a `fulfill()`.
    DeadlineElapsed,
}

#[derive(Debug)]
struct Shared {
    deadline: Mutex<Option<Instant>>,
    changed: Condvar,
    default_wait: Duration,
}

/// A deadline-bounded readiness signal.
///
/// Cloning yields another handle to the same signal.
#[derive(Debug, Clone)]
pub struct RenderWaiter {
    shared: Arc<Shared>,
}

impl Default for RenderWaiter {
    fn default() -> Self {
        Self::with_default_wait(DEFAULT_WAIT)
    }
}

impl RenderWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A waiter whose [`wait`](RenderWaiter::wait) uses `default_wait`.
    pub fn with_default_wait(default_wait: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                deadline: Mutex::new(None),
                changed: Condvar::new(),
                default_wait,
            }),
        }
    }

    /// Whether a deadline is set and still in the future.
    pub fn is_waiting(&self) -> bool {
        matches!(*self.lock(), Some(deadline) if deadline > Instant::now())
    }

    /// Wait for the default duration ([`DEFAULT_WAIT`] unless configured)
    /// from now.
    pub fn wait(&self) {
        self.wait_for(self.shared.default_wait);
    }

    pub fn wait_for(&self, timeout: Duration) {
        self.wait_until(Instant::now() + timeout);
    }

    /// Replace the current deadline. Last writer wins.
    pub fn wait_until(&self, deadline: Instant) {
        *self.lock() = Some(deadline);
        self.shared.changed.notify_all();
    }

    /// End waiting.
    pub fn fulfill(&self) {
        *self.lock() = None;
        self.shared.changed.notify_all();
    }

    /// Block the calling thread until the waiter is fulfilled or its
    /// deadline lapses. Must not be called from the render thread.
    pub fn block_until_ready(&self) -> WaitOutcome {
        let mut deadline = self.lock();
        loop {
            let Some(until) = *deadline else {
                return WaitOutcome::Fulfilled;
            };
            let now = Instant::now();
            if until <= now {
                *deadline = None;
                return WaitOutcome::DeadlineElapsed;
            }
            deadline = match self.shared.changed.wait_timeout(deadline, until - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Instant>> {
        self.shared
            .deadline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn idle_waiter_is_not_waiting() {
        let w = RenderWaiter::new();
        assert!(!w.is_waiting());
        assert_eq!(w.block_until_ready(), WaitOutcome::Fulfilled);
    }

    #[test]
    fn fulfill_clears_deadline() {
        let w = RenderWaiter::new();
        w.wait();
        assert!(w.is_waiting());
        w.fulfill();
        assert!(!w.is_waiting());
    }

    #[test]
    fn configured_default_applies_to_wait() {
        let w = RenderWaiter::with_default_wait(Duration::from_millis(20));
        w.wait();
        assert_eq!(w.block_until_ready(), WaitOutcome::DeadlineElapsed);
    }

    #[test]
    fn last_deadline_wins() {
        let w = RenderWaiter::new();
        w.wait_for(Duration::from_secs(60));
        w.wait_until(Instant::now() - Duration::from_millis(1));
        assert!(!w.is_waiting());
    }

    #[test]
    fn fulfill_from_another_thread_wakes_blocker() {
        let w = RenderWaiter::new();
        w.wait_for(Duration::from_secs(5));
        let remote = w.clone();
        let started = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.fulfill();
        });
        assert_eq!(w.block_until_ready(), WaitOutcome::Fulfilled);
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn unfulfilled_waiter_stops_at_deadline() {
        let w = RenderWaiter::new();
        w.wait_for(Duration::from_millis(40));
        let started = Instant::now();
        assert_eq!(w.block_until_ready(), WaitOutcome::DeadlineElapsed);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_secs(2));
        assert!(!w.is_waiting());
    }
}
