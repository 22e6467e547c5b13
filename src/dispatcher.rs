//! Single-flight, debounced job queue.
//!
//! Jobs run one at a time in enqueue order. Each job starts `interval` after
//! the previous one finished (or after it was enqueued into an empty queue).

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use log::debug;
use tokio::runtime::Handle;

/// Delay between two jobs unless configured otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

struct Entry {
    id: u64,
    job: BoxFuture<'static, ()>,
}

#[derive(Default)]
struct State {
    queue: VecDeque<Entry>,
    next_id: u64,
    /// Bumped by [`SerialDispatcher::cancel`]; drivers of an older
    /// generation stop scheduling.
    generation: u64,
    driving: bool,
}

type Shared = Arc<Mutex<State>>;

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serial job queue driven by a task on a tokio runtime.
#[derive(Clone)]
pub struct SerialDispatcher {
    interval: Duration,
    runtime: Handle,
    state: Shared,
}

impl SerialDispatcher {
    pub fn new(interval: Duration, runtime: Handle) -> Self {
        Self { interval, runtime, state: Arc::new(Mutex::new(State::default())) }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Enqueue `job`. A driver is started when the queue was idle.
    pub fn dispatch<F>(&self, job: F) -> DispatchHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.queue.push_back(Entry { id, job: job.boxed() });

        if !state.driving {
            state.driving = true;
            let generation = state.generation;
            self.runtime
                .spawn(drive(self.state.clone(), self.interval, generation));
        }
        DispatchHandle { id, state: Arc::downgrade(&self.state) }
    }

    /// Drop every queued job. A job that is already running finishes.
    ///
    /// Dropped jobs are destroyed after the queue lock is released, so their
    /// destructors may dispatch or cancel again.
    pub fn cancel(&self) {
        let dropped = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.driving = false;
            std::mem::take(&mut state.queue)
        };
        debug!("dispatcher cancelled; dropped {} queued job(s)", dropped.len());
        drop(dropped);
    }

    /// Number of jobs waiting to start.
    pub fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }
}

async fn drive(state: Shared, interval: Duration, generation: u64) {
    loop {
        {
            let mut s = lock(&state);
            if s.generation != generation {
                return;
            }
            if s.queue.is_empty() {
                s.driving = false;
                return;
            }
        }

        tokio::time::sleep(interval).await;

        let job = {
            let mut s = lock(&state);
            if s.generation != generation {
                return;
            }
            match s.queue.pop_front() {
                Some(entry) => entry.job,
                None => {
                    s.driving = false;
                    return;
                }
            }
        };
        job.await;
    }
}

/// Handle to one queued job.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    id: u64,
    state: Weak<Mutex<State>>,
}

impl DispatchHandle {
    /// Remove the job if it has not started yet. Returns whether it was
    /// still queued.
    pub fn cancel(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let removed = {
            let mut s = lock(&state);
            let index = s.queue.iter().position(|entry| entry.id == self.id);
            index.and_then(|i| s.queue.remove(i))
        };
        removed.is_some()
    }

    /// Whether the job is still waiting to start.
    pub fn is_queued(&self) -> bool {
        self.state
            .upgrade()
            .map(|state| lock(&state).queue.iter().any(|entry| entry.id == self.id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn runs_jobs_in_order_spaced_by_interval() {
        let interval = Duration::from_millis(30);
        let dispatcher = SerialDispatcher::new(interval, Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        for i in 0..4 {
            let tx = tx.clone();
            dispatcher.dispatch(async move {
                let _ = tx.send((i, Instant::now()));
            });
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(item) = rx.recv().await {
            seen.push(item);
        }
        assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        for pair in seen.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= interval);
        }
    }

    #[tokio::test]
    async fn cancelled_entries_never_run() {
        let dispatcher = SerialDispatcher::new(Duration::from_millis(20), Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handles = Vec::new();
        for i in 0..5 {
            let tx = tx.clone();
            handles.push(dispatcher.dispatch(async move {
                let _ = tx.send(i);
            }));
        }
        drop(tx);
        assert!(handles[1].cancel());
        assert!(handles[3].cancel());
        assert!(!handles[3].is_queued());

        let mut seen = Vec::new();
        while let Some(i) = rx.recv().await {
            seen.push(i);
        }
        assert_eq!(seen, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn cancel_clears_queue_and_dispatch_resumes() {
        let dispatcher = SerialDispatcher::new(Duration::from_millis(20), Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        for i in 0..3 {
            let tx = tx.clone();
            dispatcher.dispatch(async move {
                let _ = tx.send(i);
            });
        }
        dispatcher.cancel();
        assert_eq!(dispatcher.pending(), 0);

        let tx2 = tx.clone();
        dispatcher.dispatch(async move {
            let _ = tx2.send(99);
        });
        drop(tx);
        assert_eq!(rx.recv().await, Some(99));
        assert_eq!(rx.recv().await, None);
    }

    struct Dropped(Arc<Mutex<Vec<u32>>>, u32);

    impl Drop for Dropped {
        fn drop(&mut self) {
            self.0.lock().unwrap().push(self.1);
        }
    }

    #[tokio::test]
    async fn cancelled_jobs_are_destroyed_without_running() {
        let dispatcher = SerialDispatcher::new(Duration::from_millis(200), Handle::current());
        let dropped = Arc::new(Mutex::new(Vec::new()));
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3 {
            let guard = Dropped(dropped.clone(), i);
            let ran = ran.clone();
            handles.push(dispatcher.dispatch(async move {
                let _guard = guard;
                ran.lock().unwrap().push(i);
            }));
        }

        assert!(handles[1].cancel());
        assert_eq!(*dropped.lock().unwrap(), vec![1]);
        dispatcher.cancel();
        dropped.lock().unwrap().sort();
        assert_eq!(*dropped.lock().unwrap(), vec![0, 1, 2]);
        assert!(ran.lock().unwrap().is_empty());
    }
}
