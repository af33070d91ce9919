//! Single-threaded executor driven by the test

use cadence_core::environment::Executor;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::task::{self, ArcWake};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

#[derive(Default)]
struct Queues {
    spawned: Mutex<Vec<BoxFuture<'static, ()>>>,
    running: Mutex<FuturesUnordered<BoxFuture<'static, ()>>>,
}

#[derive(Default)]
struct WakeFlag(AtomicBool);

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Executor that only makes progress inside [`ManualExecutor::run_until_stalled`].
///
/// Spawned futures are queued; the test decides when they run, on its own
/// thread. Clones share the same queues.
#[derive(Clone, Default)]
pub struct ManualExecutor {
    queues: Arc<Queues>,
}

impl ManualExecutor {
    /// Create an empty executor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll every spawned future until none can make progress
    ///
    /// Futures spawned while this runs are picked up in the same call.
    /// Returns the number of futures that completed.
    pub fn run_until_stalled(&self) -> usize {
        let flag = Arc::new(WakeFlag::default());
        let waker = task::waker(Arc::clone(&flag));
        let mut cx = Context::from_waker(&waker);
        let mut completed = 0;

        loop {
            let spawned = std::mem::take(&mut *lock(&self.queues.spawned));
            flag.0.store(false, Ordering::SeqCst);

            {
                let mut running = lock(&self.queues.running);
                running.extend(spawned);
                loop {
                    match running.poll_next_unpin(&mut cx) {
                        Poll::Ready(Some(())) => completed += 1,
                        Poll::Ready(None) | Poll::Pending => break,
                    }
                }
            }

            let woken = flag.0.load(Ordering::SeqCst);
            if !woken && lock(&self.queues.spawned).is_empty() {
                break;
            }
        }

        completed
    }

    /// Number of futures spawned and not yet completed
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.queues.spawned).len() + lock(&self.queues.running).len()
    }
}

impl Executor for ManualExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        lock(&self.queues.spawned).push(task);
    }
}

impl std::fmt::Debug for ManualExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}
