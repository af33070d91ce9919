//! # Cadence Runtime
//!
//! Runtime implementation for Cadence.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and the scheduler that runs, cancels and debounces effects.
//!
//! ## Core Components
//!
//! - **Store**: Owns state, serializes actions, publishes state snapshots
//! - **`EffectScheduler`**: Runs effect descriptions and tracks in-flight work by key
//! - **Feedback loop**: action → reducer → effects → action
//!
//! ## Example
//!
//! ```ignore
//! use cadence_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action; the reducer has run by the time this returns
//! store.send(Action::DoSomething)?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field);
//! ```

use cadence_core::environment::{Clock, Executor, SystemClock, TokioExecutor};
use std::sync::Arc;

/// Metrics for the store and the effect scheduler
pub mod metrics;

/// Keyed effect scheduler
pub mod scheduler;

/// The Store runtime
pub mod store;

pub use error::StoreError;
pub use scheduler::{EffectScheduler, Feedback, TaskHandle, TaskId};
pub use store::Store;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    ///
    /// Reducers never fail; these only describe the store's own lifecycle.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Timeout waiting for terminal action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        ///
        /// The action broadcast channel was closed, typically because the
        /// store was dropped.
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

/// Store configuration
///
/// Selects the clock delays are measured on and the executor effect futures
/// run on. Defaults to wall-clock time and the ambient tokio runtime.
///
/// # Example
///
/// ```ignore
/// let clock = VirtualClock::new();
/// let config = StoreConfig::default()
///     .with_clock(clock.clone())
///     .with_broadcast_capacity(64);
///
/// let store = Store::with_config(state, reducer, env, config);
/// ```
#[derive(Clone)]
pub struct StoreConfig {
    /// Clock used for delays and debounces
    pub clock: Arc<dyn Clock>,
    /// Executor used for futures, streams and fire-and-forget work
    pub executor: Arc<dyn Executor>,
    /// Capacity of the effect-action broadcast channel
    pub broadcast_capacity: usize,
}

impl StoreConfig {
    /// Use `clock` for delays and debounces
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Use `executor` for effect futures
    #[must_use]
    pub fn with_executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    /// Set the action broadcast capacity (at least 1)
    #[must_use]
    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            executor: Arc::new(TokioExecutor),
            broadcast_capacity: 16,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("broadcast_capacity", &self.broadcast_capacity)
            .finish_non_exhaustive()
    }
}
