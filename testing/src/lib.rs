//! # Cadence Testing
//!
//! Testing utilities and helpers for Cadence.
//!
//! This crate provides:
//! - [`VirtualClock`]: time that only moves when the test advances it
//! - [`ManualExecutor`]: effect futures run on the test's thread, on demand
//! - [`TestStore`]: exhaustive send / receive / advance scenarios
//! - [`ReducerTest`]: Given-When-Then reducer tests with effect assertions
//! - Mock implementations of Environment traits
//!
//! ## Example
//!
//! ```ignore
//! use cadence_testing::{mocks::SequentialIdGenerator, TestStore};
//!
//! #[test]
//! fn completing_a_todo_sorts_after_a_second() {
//!     let mut store = TestStore::new(state, TodosReducer::new(), environment);
//!
//!     store.send(AppAction::Todo { id, action: TodoAction::CheckBoxToggled }, |state| {
//!         state.todos[0].is_complete = true;
//!     });
//!     store.advance(Duration::from_secs(1));
//!     store.receive(AppAction::SortCompletedTodos, |state| state.todos.swap(0, 1));
//! }
//! ```

mod executor;
mod test_store;
mod virtual_clock;

pub use executor::ManualExecutor;
pub use reducer_test::{assertions, ReducerTest};
pub use test_store::TestStore;
pub use virtual_clock::VirtualClock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::VirtualClock;
    use cadence_core::environment::{IdGenerator, TrackedEvent, Tracker, TrackingError};
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    /// Create a virtual clock for tests, starting at 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn test_clock() -> VirtualClock {
        VirtualClock::new()
    }

    /// Predictable ids: `00000000-0000-0000-0000-000000000000`, then `…001`, …
    ///
    /// # Example
    ///
    /// ```
    /// use cadence_core::environment::IdGenerator;
    /// use cadence_testing::mocks::SequentialIdGenerator;
    ///
    /// let ids = SequentialIdGenerator::new();
    /// assert_eq!(ids.generate().to_string(), "00000000-0000-0000-0000-000000000000");
    /// assert_eq!(ids.generate().to_string(), "00000000-0000-0000-0000-000000000001");
    /// ```
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Start counting at zero
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }

        /// The id the `n`th call returns, counting from zero
        #[must_use]
        pub const fn nth(n: u64) -> Uuid {
            Uuid::from_u128(n as u128)
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn generate(&self) -> Uuid {
            Self::nth(self.next.fetch_add(1, Ordering::SeqCst))
        }
    }

    /// Id generator that fails the test if it is ever called
    #[derive(Debug, Default, Clone, Copy)]
    pub struct UnimplementedIdGenerator;

    impl IdGenerator for UnimplementedIdGenerator {
        #[allow(clippy::panic)] // Calling it is the failure being reported
        fn generate(&self) -> Uuid {
            panic!("IdGenerator::generate is unimplemented in this test");
        }
    }

    /// Tracker that hands every event to the test over a channel
    #[derive(Debug, Clone)]
    pub struct RecordingTracker {
        events: mpsc::UnboundedSender<TrackedEvent>,
    }

    impl RecordingTracker {
        /// Create a tracker and the receiving end the test reads from
        #[must_use]
        pub fn new() -> (Self, TrackedEvents) {
            let (events, receiver) = mpsc::unbounded_channel();
            (Self { events }, TrackedEvents { receiver })
        }
    }

    impl Tracker for RecordingTracker {
        fn track(&self, event: TrackedEvent) -> BoxFuture<'static, Result<(), TrackingError>> {
            let events = self.events.clone();
            Box::pin(async move {
                events
                    .send(event)
                    .map_err(|_| TrackingError::Unavailable("recording receiver dropped".into()))
            })
        }
    }

    /// Events recorded by a [`RecordingTracker`]
    #[derive(Debug)]
    pub struct TrackedEvents {
        receiver: mpsc::UnboundedReceiver<TrackedEvent>,
    }

    impl TrackedEvents {
        /// Take every event recorded so far
        pub fn drain(&mut self) -> Vec<TrackedEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.receiver.try_recv() {
                events.push(event);
            }
            events
        }
    }

    /// Tracker whose every call fails
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FailingTracker;

    impl Tracker for FailingTracker {
        fn track(&self, event: TrackedEvent) -> BoxFuture<'static, Result<(), TrackingError>> {
            Box::pin(async move {
                Err(TrackingError::Rejected {
                    name: event.name,
                    reason: "tracking disabled in this test".into(),
                })
            })
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Route `tracing` output through the test harness's captured output
    ///
    /// Honours `RUST_LOG`. Safe to call from every test; only the first call
    /// installs the subscriber.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use mocks::test_clock;

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::mocks::*;
    use cadence_core::environment::{Clock, IdGenerator, TrackedEvent, Tracker, TrackingError};

    #[test]
    fn test_clock_is_frozen_until_advanced() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.generate(), SequentialIdGenerator::nth(0));
        assert_eq!(ids.generate(), SequentialIdGenerator::nth(1));
        assert_eq!(
            SequentialIdGenerator::nth(1).to_string(),
            "00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    #[should_panic(expected = "unimplemented in this test")]
    fn unimplemented_ids_fail_the_test() {
        let _ = UnimplementedIdGenerator.generate();
    }

    #[test]
    fn recording_tracker_records_only_when_run() {
        let (tracker, mut events) = RecordingTracker::new();

        let pending = tracker.track(TrackedEvent::new("Filter Changed").with_property("filter", "active"));
        assert!(events.drain().is_empty());

        futures::executor::block_on(pending).unwrap();
        assert_eq!(
            events.drain(),
            vec![TrackedEvent::new("Filter Changed").with_property("filter", "active")]
        );
    }

    #[test]
    fn failing_tracker_rejects() {
        let result = futures::executor::block_on(FailingTracker.track(TrackedEvent::new("Todo Deleted")));
        assert!(matches!(result, Err(TrackingError::Rejected { name, .. }) if name == "Todo Deleted"));
    }
}
