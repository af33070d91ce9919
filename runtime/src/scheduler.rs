//! Effect scheduler - runs effect descriptions and tracks in-flight work by key
//!
//! Every task the scheduler starts is registered in a task table, keyed or
//! not, until it finishes or is cancelled. Keys map to the tasks registered
//! under them; a task started inside nested `Cancellable` scopes is registered
//! under every enclosing key and is cancelled by any of them.
//!
//! Cancellation is checked at delivery time: once a task is cancelled, no
//! action it produces reaches the feedback sink. Executor futures are also
//! aborted so they stop at their next poll, and clock timers are withdrawn
//! from the clock so a re-armed debounce leaves exactly one timer behind.

use crate::metrics::SchedulerMetrics;
use cadence_core::SmallVec;
use cadence_core::effect::{Effect, EffectId};
use cadence_core::environment::{Clock, Executor, Scheduled};
use futures::FutureExt;
use futures::StreamExt;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Where actions produced by effects are delivered.
///
/// The handle identifies the task that produced the action, so the receiver
/// can re-check cancellation at the moment it would reduce the action.
pub type Feedback<A> = Arc<dyn Fn(A, &TaskHandle) + Send + Sync>;

/// Identifier of a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug)]
struct TaskSlot {
    id: TaskId,
    cancelled: AtomicBool,
    finished: AtomicBool,
    abort: AbortHandle,
    timer: Mutex<Option<Scheduled>>,
}

impl TaskSlot {
    fn attach_timer(&self, timer: Scheduled) {
        let mut slot = lock(&self.timer);
        if self.cancelled.load(Ordering::Acquire) {
            drop(slot);
            timer.cancel();
        } else {
            *slot = Some(timer);
        }
    }
}

/// Shared view of a scheduled task.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    slot: Arc<TaskSlot>,
}

impl TaskHandle {
    /// The task's identifier
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.slot.id
    }

    /// Whether the task has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.slot.cancelled.load(Ordering::Acquire)
    }
}

struct LiveTask<Id> {
    slot: Arc<TaskSlot>,
    keys: SmallVec<[Id; 2]>,
}

struct TaskTable<Id> {
    next_id: u64,
    live: HashMap<TaskId, LiveTask<Id>>,
    by_key: HashMap<Id, Vec<TaskId>>,
}

impl<Id: EffectId> TaskTable<Id> {
    fn new() -> Self {
        Self {
            next_id: 0,
            live: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    fn register(&mut self, keys: &[Id], abort: AbortHandle) -> Arc<TaskSlot> {
        let id = TaskId(self.next_id);
        self.next_id += 1;

        let slot = Arc::new(TaskSlot {
            id,
            cancelled: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            abort,
            timer: Mutex::new(None),
        });

        for key in keys {
            self.by_key.entry(*key).or_default().push(id);
        }
        self.live.insert(
            id,
            LiveTask {
                slot: Arc::clone(&slot),
                keys: keys.iter().copied().collect(),
            },
        );

        slot
    }

    fn remove(&mut self, id: TaskId) -> Option<Arc<TaskSlot>> {
        let task = self.live.remove(&id)?;
        for key in &task.keys {
            if let Some(ids) = self.by_key.get_mut(key) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.by_key.remove(key);
                }
            }
        }
        Some(task.slot)
    }

    fn cancel_key(&mut self, key: Id) -> usize {
        let mut cancelled = 0;
        for id in self.by_key.remove(&key).unwrap_or_default() {
            if let Some(slot) = self.remove(id) {
                cancel_slot(&slot);
                cancelled += 1;
            }
        }
        cancelled
    }

    fn cancel_all(&mut self) -> usize {
        self.by_key.clear();
        let cancelled = self.live.len();
        for (_, task) in self.live.drain() {
            cancel_slot(&task.slot);
        }
        cancelled
    }
}

fn cancel_slot(slot: &TaskSlot) {
    slot.cancelled.store(true, Ordering::Release);
    slot.finished.store(true, Ordering::Release);
    slot.abort.abort();
    let timer = lock(&slot.timer).take();
    if let Some(timer) = timer {
        timer.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owned registration of a running task.
///
/// Dropping the guard finishes the task and unlinks it from its keys, so a
/// task that completes, panics, or is dropped by its executor never lingers
/// in the table.
struct TaskGuard<Id: EffectId> {
    handle: TaskHandle,
    table: Weak<Mutex<TaskTable<Id>>>,
}

impl<Id: EffectId> TaskGuard<Id> {
    fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    fn deliver<A>(&self, feedback: &Feedback<A>, action: A) {
        if self.is_cancelled() {
            tracing::trace!(task = ?self.handle.id(), "Suppressed action from cancelled task");
            return;
        }
        feedback(action, &self.handle);
    }
}

impl<Id: EffectId> Drop for TaskGuard<Id> {
    fn drop(&mut self) {
        if self.handle.slot.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(table) = self.table.upgrade() {
            let mut table = lock(&table);
            table.remove(self.handle.id());
            SchedulerMetrics::record_in_flight(table.live.len());
        }
    }
}

/// Runs effects on an injected clock and executor, tracking them by key.
///
/// # Example
///
/// ```ignore
/// let scheduler = EffectScheduler::new(Arc::new(SystemClock), Arc::new(TokioExecutor));
/// let feedback: Feedback<Action> = Arc::new(|action, _task| println!("{action:?}"));
///
/// scheduler.run(
///     Effect::Debounce { id: Key::Search, duration, action: Box::new(Action::Search) },
///     &feedback,
/// );
/// scheduler.cancel(Key::Search);
/// ```
pub struct EffectScheduler<Id: EffectId> {
    clock: Arc<dyn Clock>,
    executor: Arc<dyn Executor>,
    tasks: Arc<Mutex<TaskTable<Id>>>,
}

impl<Id: EffectId> EffectScheduler<Id> {
    /// Create a scheduler that times delays on `clock` and runs futures on `executor`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, executor: Arc<dyn Executor>) -> Self {
        Self {
            clock,
            executor,
            tasks: Arc::new(Mutex::new(TaskTable::new())),
        }
    }

    /// The clock delays are measured on
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Start `effect`, delivering any actions it produces to `feedback`
    pub fn run<A>(&self, effect: Effect<A, Id>, feedback: &Feedback<A>)
    where
        A: Send + 'static,
    {
        self.execute(effect, &[], feedback);
    }

    /// Cancel every task registered under `id`
    ///
    /// Returns the number of tasks cancelled. Cancelling an idle key is a
    /// no-op.
    pub fn cancel(&self, id: Id) -> usize {
        let cancelled = {
            let mut table = lock(&self.tasks);
            let cancelled = table.cancel_key(id);
            if cancelled > 0 {
                SchedulerMetrics::record_in_flight(table.live.len());
            }
            cancelled
        };

        if cancelled > 0 {
            tracing::debug!(?id, cancelled, "Cancelled in-flight effects");
            SchedulerMetrics::record_cancelled(cancelled);
        }
        cancelled
    }

    /// Cancel every live task, keyed or not
    pub fn cancel_all(&self) -> usize {
        let cancelled = {
            let mut table = lock(&self.tasks);
            let cancelled = table.cancel_all();
            if cancelled > 0 {
                SchedulerMetrics::record_in_flight(table.live.len());
            }
            cancelled
        };
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cancelled all in-flight effects");
            SchedulerMetrics::record_cancelled(cancelled);
        }
        cancelled
    }

    /// Number of tasks started and not yet finished or cancelled
    #[must_use]
    pub fn in_flight(&self) -> usize {
        lock(&self.tasks).live.len()
    }

    /// Whether any task is registered under `id`
    #[must_use]
    pub fn is_active(&self, id: Id) -> bool {
        lock(&self.tasks).by_key.contains_key(&id)
    }

    fn register(&self, keys: &[Id]) -> (TaskGuard<Id>, AbortRegistration) {
        let (abort, registration) = AbortHandle::new_pair();
        let slot = {
            let mut table = lock(&self.tasks);
            let slot = table.register(keys, abort);
            SchedulerMetrics::record_in_flight(table.live.len());
            slot
        };

        let guard = TaskGuard {
            handle: TaskHandle { slot },
            table: Arc::downgrade(&self.tasks),
        };
        (guard, registration)
    }

    fn spawn<F>(&self, task: F, registration: AbortRegistration)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.executor
            .spawn(Abortable::new(task, registration).map(drop).boxed());
    }

    fn execute<A>(&self, effect: Effect<A, Id>, keys: &[Id], feedback: &Feedback<A>)
    where
        A: Send + 'static,
    {
        if !matches!(effect, Effect::None | Effect::Parallel(_)) {
            tracing::trace!(kind = effect.kind(), ?keys, "Executing effect");
            SchedulerMetrics::record_effect(effect.kind());
        }

        match effect {
            Effect::None => {},
            Effect::Future(future) => {
                let (guard, registration) = self.register(keys);
                let feedback = Arc::clone(feedback);
                self.spawn(
                    async move {
                        if let Some(action) = future.await {
                            guard.deliver(&feedback, action);
                        }
                    },
                    registration,
                );
            },
            Effect::Stream(mut stream) => {
                let (guard, registration) = self.register(keys);
                let feedback = Arc::clone(feedback);
                self.spawn(
                    async move {
                        while let Some(action) = stream.next().await {
                            if guard.is_cancelled() {
                                break;
                            }
                            guard.deliver(&feedback, action);
                        }
                    },
                    registration,
                );
            },
            Effect::FireAndForget(future) => {
                let (guard, registration) = self.register(keys);
                self.spawn(
                    async move {
                        future.await;
                        drop(guard);
                    },
                    registration,
                );
            },
            Effect::Delay { duration, action } => {
                let (guard, _) = self.register(keys);
                let slot = Arc::clone(&guard.handle.slot);
                let feedback = Arc::clone(feedback);
                let timer = self.clock.schedule(
                    duration,
                    Box::new(move || guard.deliver(&feedback, *action)),
                );
                slot.attach_timer(timer);
            },
            Effect::Debounce {
                id,
                duration,
                action,
            } => {
                if self.cancel(id) > 0 {
                    tracing::trace!(?id, "Debounce re-armed");
                    SchedulerMetrics::record_rearm();
                }
                let mut scoped: SmallVec<[Id; 4]> = keys.iter().copied().collect();
                scoped.push(id);
                self.execute(Effect::Delay { duration, action }, &scoped, feedback);
            },
            Effect::Cancellable { id, effect } => {
                self.cancel(id);
                let mut scoped: SmallVec<[Id; 4]> = keys.iter().copied().collect();
                scoped.push(id);
                self.execute(*effect, &scoped, feedback);
            },
            Effect::Cancel(id) => {
                self.cancel(id);
            },
            Effect::Parallel(effects) => {
                for effect in effects {
                    self.execute(effect, keys, feedback);
                }
            },
        }
    }
}
