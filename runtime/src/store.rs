//! The Store - runtime coordinator for a reducer
//!
//! The Store owns state and runs one action at a time through the reducer.
//! `send` is synchronous: when it returns, the action (and anything sent
//! re-entrantly while it was being reduced) has been reduced and the
//! resulting effects have been handed to the scheduler.
//!
//! Actions produced by effects arrive through the scheduler's feedback sink,
//! join the same queue, and are dropped at dequeue time if their task was
//! cancelled in the meantime.

use crate::metrics::StoreMetrics;
use crate::scheduler::{EffectScheduler, Feedback, TaskHandle};
use crate::{StoreConfig, StoreError};
use cadence_core::reducer::Reducer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Queued<A> {
    action: A,
    origin: Option<TaskHandle>,
}

/// The Store - runtime coordinator for a reducer
///
/// The Store manages:
/// 1. State (behind a mutex, read through closures or snapshots)
/// 2. Reducer (business logic)
/// 3. Environment (injected dependencies)
/// 4. Effect execution (with feedback loop)
///
/// Cloning a Store is cheap; clones share state.
///
/// # Type Parameters
///
/// - `S`: State type
/// - `A`: Action type
/// - `E`: Environment type
/// - `R`: Reducer implementation
///
/// # Example
///
/// ```ignore
/// let store = Store::new(TodosState::default(), TodosReducer::new(), environment);
///
/// store.send(AppAction::AddTodoButtonTapped)?;
/// let count = store.state(|s| s.todos.len());
/// ```
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    inner: Arc<StoreInner<S, A, E, R>>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StoreInner<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Mutex<S>,
    reducer: R,
    environment: E,
    scheduler: EffectScheduler<R::CancelId>,
    feedback: Feedback<A>,
    queue: Mutex<VecDeque<Queued<A>>>,
    serial: Mutex<()>,
    draining: Mutex<Option<ThreadId>>,
    shutdown: AtomicBool,
    state_tx: watch::Sender<S>,
    /// Actions produced by effects, for observers.
    action_broadcast: broadcast::Sender<A>,
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment
    ///
    /// Uses [`StoreConfig::default`]: wall-clock delays on the tokio timer and
    /// effect futures spawned onto the ambient tokio runtime.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_config(initial_state, reducer, environment, StoreConfig::default())
    }

    /// Create a store with an explicit clock, executor and broadcast capacity
    #[must_use]
    pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
        let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let (state_tx, _) = watch::channel(initial_state.clone());

        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner<S, A, E, R>>| {
            let weak = weak.clone();
            let feedback: Feedback<A> = Arc::new(move |action: A, task: &TaskHandle| {
                if let Some(inner) = weak.upgrade() {
                    inner.feed_back(action, task);
                }
            });

            StoreInner {
                state: Mutex::new(initial_state),
                reducer,
                environment,
                scheduler: EffectScheduler::new(config.clock, config.executor),
                feedback,
                queue: Mutex::new(VecDeque::new()),
                serial: Mutex::new(()),
                draining: Mutex::new(None),
                shutdown: AtomicBool::new(false),
                state_tx,
                action_broadcast,
            }
        });

        Self { inner }
    }

    /// Send an action to the store
    ///
    /// 1. Queues the action
    /// 2. Runs the reducer for it (and for anything queued ahead of it)
    /// 3. Hands returned effects to the scheduler
    ///
    /// Concurrent callers are serialized: no two reducer runs overlap. A
    /// `send` made from inside the loop on the same thread (for example by a
    /// synchronous effect callback) is queued and settled by the outer call
    /// before it returns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store has been shut down.
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub fn send(&self, action: A) -> Result<(), StoreError> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            tracing::warn!("Rejected action: store is shutting down");
            StoreMetrics::record_rejected();
            return Err(StoreError::ShutdownInProgress);
        }

        self.inner.enqueue(Queued {
            action,
            origin: None,
        });
        self.inner.drain();
        Ok(())
    }

    /// Send an action and wait for a matching action produced by an effect
    ///
    /// Subscribes to the action broadcast before sending, so a fast effect
    /// cannot be missed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ShutdownInProgress`]: Store was shut down
    /// - [`StoreError::Timeout`]: Timeout expired before a matching action arrived
    /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        // Subscribe BEFORE sending to avoid race condition
        let mut rx = self.inner.action_broadcast.subscribe();

        self.send(action)?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Action observer lagged, {} actions skipped", skipped);
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Read current state via a closure
    ///
    /// ```ignore
    /// let completed = store.state(|s| s.todos.iter().filter(|t| t.is_complete).count());
    /// ```
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = lock(&self.inner.state);
        f(&state)
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn current_state(&self) -> S {
        lock(&self.inner.state).clone()
    }

    /// Subscribe to state snapshots, published after every reducer run
    ///
    /// Every reduced action marks the receiver changed, including actions
    /// that leave state untouched, so `changed()` wakes once per action.
    /// Compare snapshots to detect real changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to actions produced by effects
    ///
    /// Actions sent directly through [`Store::send`] are not broadcast.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.inner.action_broadcast.subscribe()
    }

    /// Number of effect tasks still in flight
    #[must_use]
    pub fn in_flight_effects(&self) -> usize {
        self.inner.scheduler.in_flight()
    }

    /// Whether [`Store::shutdown`] has been called
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting actions and cancel every in-flight effect
    ///
    /// Returns the number of effects cancelled. Actions those effects would
    /// have produced are discarded.
    pub fn shutdown(&self) -> usize {
        tracing::info!("Shutting down store");
        self.inner.shutdown.store(true, Ordering::Release);
        let cancelled = self.inner.scheduler.cancel_all();
        tracing::info!(cancelled, "Store shut down");
        cancelled
    }
}

impl<S, A, E, R> StoreInner<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
    A: Clone + Send + 'static,
    S: Clone,
{
    fn enqueue(&self, queued: Queued<A>) {
        lock(&self.queue).push_back(queued);
    }

    fn feed_back(&self, action: A, task: &TaskHandle) {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::trace!(task = ?task.id(), "Dropping effect action after shutdown");
            StoreMetrics::record_dropped();
            return;
        }
        self.enqueue(Queued {
            action,
            origin: Some(task.clone()),
        });
        self.drain();
    }

    /// Run queued actions until the queue is empty.
    ///
    /// Returns immediately when called re-entrantly from the draining thread;
    /// the outer loop picks the new action up.
    fn drain(&self) {
        let current = std::thread::current().id();
        if *lock(&self.draining) == Some(current) {
            tracing::trace!("Re-entrant send queued");
            return;
        }

        let _serial = lock(&self.serial);
        let _draining = DrainingGuard::enter(&self.draining, current);

        loop {
            let next = lock(&self.queue).pop_front();
            let Some(queued) = next else {
                break;
            };
            self.process(queued);
        }
    }

    fn process(&self, queued: Queued<A>) {
        let Queued { action, origin } = queued;

        let broadcast = match &origin {
            Some(task) if task.is_cancelled() => {
                tracing::trace!(task = ?task.id(), "Dropping action from cancelled effect");
                StoreMetrics::record_dropped();
                return;
            },
            Some(_) => Some(action.clone()),
            None => None,
        };

        tracing::debug!("Processing action");

        let effects = {
            let mut state = lock(&self.state);

            let span = tracing::debug_span!("reducer_execution");
            let _enter = span.enter();

            let start = Instant::now();
            let effects = self.reducer.reduce(&mut state, action, &self.environment);
            StoreMetrics::record_action(start.elapsed());

            tracing::trace!("Reducer completed, returned {} effects", effects.len());

            // One notification per reduced action, changed or not
            self.state_tx.send_replace(state.clone());
            effects
        };

        if let Some(action) = broadcast {
            // No receivers is fine
            let _ = self.action_broadcast.send(action);
        }

        for effect in effects {
            self.scheduler.run(effect, &self.feedback);
        }
    }
}

/// Marks the current thread as the one draining the queue until dropped.
struct DrainingGuard<'a> {
    draining: &'a Mutex<Option<ThreadId>>,
}

impl<'a> DrainingGuard<'a> {
    fn enter(draining: &'a Mutex<Option<ThreadId>>, thread: ThreadId) -> Self {
        *lock(draining) = Some(thread);
        Self { draining }
    }
}

impl Drop for DrainingGuard<'_> {
    fn drop(&mut self) {
        *lock(self.draining) = None;
    }
}
