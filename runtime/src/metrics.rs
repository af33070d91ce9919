//! Metrics for the store and the effect scheduler.
//!
//! Metrics go through the `metrics` facade; install whichever recorder the
//! host application uses. Without one, recording is a no-op.
//!
//! # Example
//!
//! ```rust,ignore
//! cadence_runtime::metrics::register_metrics();
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use std::time::Duration;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Register all metric descriptions with the installed recorder.
pub fn register_metrics() {
    // Store Metrics
    describe_counter!(
        "store.actions.total",
        "Total number of actions reduced by stores"
    );
    describe_counter!(
        "store.actions.dropped",
        "Actions discarded because the effect that produced them was cancelled"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shut down"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time taken to run the reducer for one action"
    );

    // Scheduler Metrics
    describe_counter!(
        "store.effects.executed",
        "Effects started by the scheduler, labelled by type"
    );
    describe_counter!(
        "scheduler.tasks.cancelled",
        "In-flight tasks cancelled by key or by shutdown"
    );
    describe_counter!(
        "scheduler.debounce.rearmed",
        "Debounces that replaced a pending debounce under the same key"
    );
    describe_gauge!(
        "scheduler.tasks.in_flight",
        "Tasks currently registered with the scheduler"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record an action reduced.
    pub fn record_action(duration: Duration) {
        counter!("store.actions.total").increment(1);
        histogram!("store.reducer.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an action discarded because its task was cancelled.
    pub fn record_dropped() {
        counter!("store.actions.dropped").increment(1);
    }

    /// Record an action rejected after shutdown.
    pub fn record_rejected() {
        counter!("store.shutdown.rejected_actions").increment(1);
    }
}

/// Scheduler metrics recorder.
pub struct SchedulerMetrics;

impl SchedulerMetrics {
    /// Record an effect started, labelled by its kind.
    pub fn record_effect(kind: &'static str) {
        counter!("store.effects.executed", "type" => kind).increment(1);
    }

    /// Record tasks cancelled.
    pub fn record_cancelled(count: usize) {
        if count > 0 {
            counter!("scheduler.tasks.cancelled").increment(count as u64);
        }
    }

    /// Record a debounce replacing a pending one.
    pub fn record_rearm() {
        counter!("scheduler.debounce.rearmed").increment(1);
    }

    /// Record the number of live tasks.
    #[allow(clippy::cast_precision_loss)] // task counts stay far below 2^52
    pub fn record_in_flight(count: usize) {
        gauge!("scheduler.tasks.in_flight").set(count as f64);
    }
}
