//! Environment module - Dependency injection traits
//!
//! All external capabilities are abstracted behind traits and injected via the
//! reducer's Environment (id generation, analytics) or the store's
//! configuration (clock, executor). Production implementations live here;
//! deterministic test doubles live in `cadence-testing`.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Work scheduled on a [`Clock`].
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a callback waiting on a [`Clock`].
///
/// [`Scheduled::cancel`] discards the callback if it has not fired yet.
/// Dropping the handle leaves the callback scheduled.
pub struct Scheduled {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Scheduled {
    /// Handle that runs `cancel` when the scheduled work is cancelled
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle for work that cannot be cancelled, or was never scheduled
    #[must_use]
    pub const fn detached() -> Self {
        Self { cancel: None }
    }

    /// Discard the callback if it is still pending
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Scheduled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduled")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Clock trait - abstracts time for testability
///
/// A clock both tells the time and runs callbacks once a delay has elapsed on
/// it. Delayed and debounced effects are scheduled through the store's clock,
/// so a virtual clock gives tests full control over when they fire.
///
/// # Examples
///
/// ```ignore
/// // Production - tokio timer
/// let clock = SystemClock;
/// clock.schedule(Duration::from_secs(1), Box::new(|| println!("tick")));
///
/// // Test - nothing fires until the test advances time
/// let clock = VirtualClock::new();
/// clock.schedule(Duration::from_secs(1), Box::new(|| println!("tick")));
/// clock.advance(Duration::from_secs(1));
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;

    /// Run `callback` once `delay` has elapsed on this clock
    ///
    /// Cancelling the returned handle releases the callback and whatever it
    /// captured without running it.
    fn schedule(&self, delay: Duration, callback: Callback) -> Scheduled;
}

/// Executor trait - where effect futures run
pub trait Executor: Send + Sync {
    /// Start driving `task` to completion
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Wall-clock time backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule(&self, delay: Duration, callback: Callback) -> Scheduled {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let timer = handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    callback();
                });
                Scheduled::new(move || timer.abort())
            },
            Err(error) => {
                tracing::error!(%error, ?delay, "SystemClock used outside a tokio runtime; callback dropped");
                Scheduled::detached()
            },
        }
    }
}

/// Spawns effect futures onto the ambient tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            },
            Err(error) => {
                tracing::error!(%error, "TokioExecutor used outside a tokio runtime; effect dropped");
            },
        }
    }
}

/// Source of fresh identifiers.
pub trait IdGenerator: Send + Sync {
    /// Generate the next identifier
    fn generate(&self) -> Uuid;
}

/// Random v4 UUIDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// An analytics event: a name plus flat string properties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEvent {
    /// Event name, e.g. `"Filter Changed"`
    pub name: String,
    /// Event properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl TrackedEvent {
    /// Event without properties
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a property
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Errors from an analytics sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// The sink could not be reached
    #[error("Tracking sink unavailable: {0}")]
    Unavailable(String),

    /// The sink refused the event
    #[error("Tracking sink rejected event {name}: {reason}")]
    Rejected {
        /// Name of the rejected event
        name: String,
        /// Reason given by the sink
        reason: String,
    },
}

/// Analytics capability.
///
/// `track` only builds the future; nothing is sent until an effect runs it.
pub trait Tracker: Send + Sync {
    /// Record `event`
    fn track(&self, event: TrackedEvent) -> BoxFuture<'static, Result<(), TrackingError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn tracked_event_builder() {
        let event = TrackedEvent::new("Todo Deleted").with_property("editMode", "inactive");
        assert_eq!(event.name, "Todo Deleted");
        assert_eq!(
            event.properties.get("editMode").map(String::as_str),
            Some("inactive")
        );
    }

    #[test]
    fn uuid_generator_is_unique() {
        let ids = UuidGenerator;
        assert_ne!(ids.generate(), ids.generate());
    }

    #[tokio::test(start_paused = true)]
    async fn system_clock_fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        SystemClock.schedule(
            Duration::from_millis(500),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_system_clock_timer_never_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let timer = SystemClock.schedule(
            Duration::from_millis(500),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!fired.load(Ordering::SeqCst));
        // The aborted timer released the callback and its captures
        assert_eq!(Arc::strong_count(&fired), 1);
    }

    #[test]
    fn detached_handle_cancels_nothing() {
        Scheduled::detached().cancel();
    }

    #[test]
    fn system_clock_outside_runtime_drops_callback() {
        let _ = SystemClock.schedule(Duration::ZERO, Box::new(|| {}));
        TokioExecutor.spawn(Box::pin(async {}));
    }
}
