//! Scenario harness for reducers with time-based effects
//!
//! A [`TestStore`] runs a reducer against a [`VirtualClock`] and a
//! [`ManualExecutor`], so every effect runs on the test's thread at the
//! moment the test chooses. Actions produced by effects are not fed back
//! automatically: they queue up and each must be claimed with
//! [`TestStore::receive`], so a scenario states every step explicitly.

#![allow(clippy::module_name_repetitions)] // TestStore is the natural name

use crate::executor::ManualExecutor;
use crate::virtual_clock::VirtualClock;
use cadence_core::reducer::Reducer;
use cadence_runtime::scheduler::{EffectScheduler, Feedback, TaskHandle};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deterministic scenario harness
///
/// - [`send`](TestStore::send) runs a user action and checks the resulting state
/// - [`receive`](TestStore::receive) claims the next action an effect produced
/// - [`advance`](TestStore::advance) moves virtual time, firing due effects
/// - [`finish`](TestStore::finish) (or drop) fails on anything left unclaimed
///
/// # Example
///
/// ```ignore
/// let mut store = TestStore::new(TodosState::default(), TodosReducer::new(), environment);
///
/// store.send(AppAction::Todo { id, action: TodoAction::CheckBoxToggled }, |state| {
///     state.todos[0].is_complete = true;
/// });
/// store.advance(Duration::from_secs(1));
/// store.receive(AppAction::SortCompletedTodos, |state| {
///     state.todos.swap(0, 1);
/// });
/// ```
pub struct TestStore<R>
where
    R: Reducer,
    R::State: Clone + PartialEq + Debug,
    R::Action: Clone + PartialEq + Debug + Send + 'static,
{
    reducer: R,
    environment: R::Environment,
    state: R::State,
    clock: VirtualClock,
    executor: ManualExecutor,
    scheduler: EffectScheduler<R::CancelId>,
    received: Arc<Mutex<VecDeque<R::Action>>>,
    feedback: Feedback<R::Action>,
    finished: bool,
}

impl<R> TestStore<R>
where
    R: Reducer,
    R::State: Clone + PartialEq + Debug,
    R::Action: Clone + PartialEq + Debug + Send + 'static,
{
    /// Create a harness with a fresh virtual clock
    #[must_use]
    pub fn new(initial_state: R::State, reducer: R, environment: R::Environment) -> Self {
        Self::with_clock(initial_state, reducer, environment, VirtualClock::new())
    }

    /// Create a harness on an existing virtual clock
    ///
    /// Use this when the environment also reads the same clock.
    #[must_use]
    pub fn with_clock(
        initial_state: R::State,
        reducer: R,
        environment: R::Environment,
        clock: VirtualClock,
    ) -> Self {
        let executor = ManualExecutor::new();
        let scheduler = EffectScheduler::new(Arc::new(clock.clone()), Arc::new(executor.clone()));

        let received = Arc::new(Mutex::new(VecDeque::new()));
        let sink = Arc::clone(&received);
        let feedback: Feedback<R::Action> = Arc::new(move |action: R::Action, _task: &TaskHandle| {
            lock(&sink).push_back(action);
        });

        Self {
            reducer,
            environment,
            state: initial_state,
            clock,
            executor,
            scheduler,
            received,
            feedback,
            finished: false,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &R::State {
        &self.state
    }

    /// The virtual clock effects are scheduled on
    #[must_use]
    pub const fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// The environment passed to the reducer
    #[must_use]
    pub const fn environment(&self) -> &R::Environment {
        &self.environment
    }

    /// Number of effects started and not yet finished or cancelled
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }

    /// Send a user action
    ///
    /// `update` receives a copy of the state before the action and must turn
    /// it into the state expected after it.
    ///
    /// # Panics
    ///
    /// Panics if actions produced by effects are still waiting to be
    /// received, or if the resulting state differs from the expected one.
    #[track_caller]
    #[allow(clippy::panic)] // Test assertion
    pub fn send<F>(&mut self, action: R::Action, update: F)
    where
        F: FnOnce(&mut R::State),
    {
        {
            let received = lock(&self.received);
            if !received.is_empty() {
                panic!(
                    "Must handle {} received action(s) before sending {:?}. Unhandled: {:?}",
                    received.len(),
                    action,
                    received
                );
            }
        }

        self.step(action, update);
    }

    /// Claim the next action produced by an effect
    ///
    /// # Panics
    ///
    /// Panics if nothing was received, if the next received action is not
    /// `expected`, or if the resulting state differs from the expected one.
    #[track_caller]
    #[allow(clippy::panic)] // Test assertion
    pub fn receive<F>(&mut self, expected: R::Action, update: F)
    where
        F: FnOnce(&mut R::State),
    {
        let next = lock(&self.received).pop_front();
        let Some(action) = next else {
            panic!("Expected to receive {expected:?}, but no action was received");
        };
        assert_eq!(action, expected, "Received an unexpected action");

        self.step(action, update);
    }

    /// Move virtual time forward, firing due effects and driving futures
    pub fn advance(&mut self, by: Duration) {
        self.executor.run_until_stalled();
        self.clock.advance(by);
        self.executor.run_until_stalled();
    }

    /// Cancel every effect still in flight
    ///
    /// For scenarios that deliberately end with long-lived work running.
    pub fn skip_in_flight_effects(&mut self) {
        let cancelled = self.scheduler.cancel_all();
        tracing::debug!(cancelled, "Skipped in-flight effects");
    }

    /// End the scenario
    ///
    /// # Panics
    ///
    /// Panics if any received action was never claimed or any effect is
    /// still in flight.
    #[track_caller]
    pub fn finish(mut self) {
        self.finished = true;
        self.assert_exhausted();
    }

    #[track_caller]
    fn step<F>(&mut self, action: R::Action, update: F)
    where
        F: FnOnce(&mut R::State),
    {
        let mut expected = self.state.clone();
        update(&mut expected);

        let effects = self
            .reducer
            .reduce(&mut self.state, action.clone(), &self.environment);

        assert_eq!(
            self.state, expected,
            "State after {action:?} does not match the expected state"
        );

        for effect in effects {
            self.scheduler.run(effect, &self.feedback);
        }
        self.executor.run_until_stalled();
    }

    #[track_caller]
    fn assert_exhausted(&self) {
        self.executor.run_until_stalled();

        let received = lock(&self.received);
        assert!(
            received.is_empty(),
            "The store received {} action(s) that were never asserted: {:?}",
            received.len(),
            received
        );

        let in_flight = self.scheduler.in_flight();
        assert!(
            in_flight == 0,
            "{in_flight} effect(s) are still in flight. Advance the clock until they finish, \
             receive what they produce, or call skip_in_flight_effects()"
        );
    }
}

impl<R> Drop for TestStore<R>
where
    R: Reducer,
    R::State: Clone + PartialEq + Debug,
    R::Action: Clone + PartialEq + Debug + Send + 'static,
{
    fn drop(&mut self) {
        if !self.finished && !std::thread::panicking() {
            self.assert_exhausted();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::effect::Effect;
    use cadence_core::{smallvec, SmallVec};

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum SearchId {
        Query,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum SearchAction {
        Typed(&'static str),
        Search,
        Results(usize),
        Watch,
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct SearchState {
        query: String,
        searching: bool,
        results: usize,
    }

    struct SearchReducer;

    impl Reducer for SearchReducer {
        type State = SearchState;
        type Action = SearchAction;
        type Environment = ();
        type CancelId = SearchId;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action, Self::CancelId>; 4]> {
            match action {
                SearchAction::Typed(query) => {
                    state.query = query.to_string();
                    smallvec![Effect::Debounce {
                        id: SearchId::Query,
                        duration: Duration::from_millis(300),
                        action: Box::new(SearchAction::Search),
                    }]
                },
                SearchAction::Search => {
                    state.searching = true;
                    let count = state.query.len();
                    smallvec![Effect::send(SearchAction::Results(count))]
                },
                SearchAction::Results(count) => {
                    state.searching = false;
                    state.results = count;
                    SmallVec::new()
                },
                SearchAction::Watch => smallvec![Effect::future(futures::future::pending())],
            }
        }
    }

    fn store() -> TestStore<SearchReducer> {
        TestStore::new(SearchState::default(), SearchReducer, ())
    }

    #[test]
    fn debounced_search_scenario() {
        let mut store = store();

        store.send(SearchAction::Typed("ru"), |s| s.query = "ru".into());
        store.advance(Duration::from_millis(200));
        store.send(SearchAction::Typed("rust"), |s| s.query = "rust".into());
        store.advance(Duration::from_millis(300));

        store.receive(SearchAction::Search, |s| s.searching = true);
        store.receive(SearchAction::Results(4), |s| {
            s.searching = false;
            s.results = 4;
        });
        store.finish();
    }

    #[test]
    #[should_panic(expected = "does not match the expected state")]
    fn wrong_expectation_fails() {
        let mut store = store();
        store.send(SearchAction::Typed("ru"), |s| s.query = "rust".into());
    }

    #[test]
    #[should_panic(expected = "Must handle 1 received action(s)")]
    fn sending_with_unhandled_actions_fails() {
        let mut store = store();
        store.send(SearchAction::Typed("ru"), |s| s.query = "ru".into());
        store.advance(Duration::from_millis(300));
        store.send(SearchAction::Typed("rus"), |s| s.query = "rus".into());
    }

    #[test]
    #[should_panic(expected = "Received an unexpected action")]
    fn receiving_the_wrong_action_fails() {
        let mut store = store();
        store.send(SearchAction::Typed("ru"), |s| s.query = "ru".into());
        store.advance(Duration::from_millis(300));
        store.receive(SearchAction::Results(2), |_| {});
    }

    #[test]
    #[should_panic(expected = "never asserted")]
    fn unreceived_actions_fail_finish() {
        let mut store = store();
        store.send(SearchAction::Typed("ru"), |s| s.query = "ru".into());
        store.advance(Duration::from_millis(300));
        store.finish();
    }

    #[test]
    #[should_panic(expected = "still in flight")]
    fn in_flight_effects_fail_on_drop() {
        let mut store = store();
        store.send(SearchAction::Typed("ru"), |s| s.query = "ru".into());
    }

    #[test]
    fn skipping_in_flight_effects_allows_finish() {
        let mut store = store();
        store.send(SearchAction::Watch, |_| {});
        assert_eq!(store.in_flight(), 1);

        store.skip_in_flight_effects();
        store.finish();
    }
}
