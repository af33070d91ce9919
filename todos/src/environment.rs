//! Injected dependencies for the Todos reducers.

use crate::config::TodosConfig;
use cadence_core::environment::{IdGenerator, TrackedEvent, Tracker, TrackingError, UuidGenerator};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// Environment dependencies for the Todos reducers
#[derive(Clone)]
pub struct TodosEnvironment {
    /// Source of ids for new todos
    pub ids: Arc<dyn IdGenerator>,
    /// Analytics sink
    pub tracker: Arc<dyn Tracker>,
    /// Quiet period after a checkbox toggle before completed todos sort down
    pub completion_sort_delay: Duration,
    /// Quiet period after a move before completed todos sort down
    pub reorder_sort_delay: Duration,
}

impl TodosEnvironment {
    /// Environment with the default sort delays (1s after a toggle, 100ms
    /// after a move)
    #[must_use]
    pub fn new(ids: impl IdGenerator + 'static, tracker: impl Tracker + 'static) -> Self {
        Self {
            ids: Arc::new(ids),
            tracker: Arc::new(tracker),
            completion_sort_delay: TodosConfig::DEFAULT_COMPLETION_SORT_DELAY,
            reorder_sort_delay: TodosConfig::DEFAULT_REORDER_SORT_DELAY,
        }
    }

    /// Production environment: random ids, events written to the log
    #[must_use]
    pub fn live(config: &TodosConfig) -> Self {
        Self::new(UuidGenerator, LoggingTracker).with_sort_delays(
            config.completion_sort_delay,
            config.reorder_sort_delay,
        )
    }

    /// Override both sort delays
    #[must_use]
    pub fn with_sort_delays(mut self, completion: Duration, reorder: Duration) -> Self {
        self.completion_sort_delay = completion;
        self.reorder_sort_delay = reorder;
        self
    }
}

impl std::fmt::Debug for TodosEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodosEnvironment")
            .field("completion_sort_delay", &self.completion_sort_delay)
            .field("reorder_sort_delay", &self.reorder_sort_delay)
            .finish_non_exhaustive()
    }
}

/// Tracker that writes each event to the log as JSON
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingTracker;

impl Tracker for LoggingTracker {
    fn track(&self, event: TrackedEvent) -> BoxFuture<'static, Result<(), TrackingError>> {
        Box::pin(async move {
            let json = serde_json::to_string(&event).map_err(|error| TrackingError::Rejected {
                name: event.name.clone(),
                reason: error.to_string(),
            })?;
            tracing::info!(target: "todos::analytics", event = %json, "Tracked event");
            Ok(())
        })
    }
}
