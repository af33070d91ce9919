//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`**: Run multiple reducers on the same state/action
//! - **`scope_reducer`**: Embed a child reducer in a parent's state, actions and environment
//! - **`for_each_reducer`**: Run a child reducer against one element of a collection, by id
//!
//! Child effects are lifted into parent actions with [`Effect::map`], so
//! actions produced by a child's effects come back through the parent.
//! Parent and child share one cancellation key type.
//!
//! # Examples
//!
//! ## Combining Reducers
//!
//! ```
//! use cadence_core::{smallvec, Effect, NoEffectId, Reducer, SmallVec};
//! use cadence_core::composition::combine_reducers;
//!
//! #[derive(Clone, Default)]
//! struct MyState {
//!     count: i32,
//!     name: String,
//! }
//!
//! #[derive(Clone)]
//! enum MyAction {
//!     Increment,
//!     SetName(String),
//! }
//!
//! struct CounterReducer;
//! struct NameReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = MyState;
//!     type Action = MyAction;
//!     type Environment = ();
//!     type CancelId = NoEffectId;
//!
//!     fn reduce(&self, state: &mut MyState, action: MyAction, _env: &()) -> SmallVec<[Effect<MyAction>; 4]> {
//!         if matches!(action, MyAction::Increment) {
//!             state.count += 1;
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! impl Reducer for NameReducer {
//!     type State = MyState;
//!     type Action = MyAction;
//!     type Environment = ();
//!     type CancelId = NoEffectId;
//!
//!     fn reduce(&self, state: &mut MyState, action: MyAction, _env: &()) -> SmallVec<[Effect<MyAction>; 4]> {
//!         if let MyAction::SetName(name) = action {
//!             state.name = name;
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let combined = combine_reducers(vec![Box::new(CounterReducer), Box::new(NameReducer)]);
//! let mut state = MyState::default();
//! let _ = combined.reduce(&mut state, MyAction::Increment, &());
//! assert_eq!(state.count, 1);
//! ```

use crate::effect::{Effect, EffectId};
use crate::reducer::Reducer;
use smallvec::SmallVec;
use std::marker::PhantomData;

/// Boxed reducer as stored by [`CombinedReducer`].
pub type BoxedReducer<S, A, E, K> =
    Box<dyn Reducer<State = S, Action = A, Environment = E, CancelId = K> + Send + Sync>;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in order, and all effects are collected and
/// concatenated in that order. A later reducer sees the state as the earlier
/// ones left it.
#[must_use]
pub fn combine_reducers<S, A, E, K>(reducers: Vec<BoxedReducer<S, A, E, K>>) -> CombinedReducer<S, A, E, K>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
    K: EffectId,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E, K>
where
    S: 'static,
    A: 'static,
    E: 'static,
    K: EffectId,
{
    reducers: Vec<BoxedReducer<S, A, E, K>>,
}

impl<S, A, E, K> Reducer for CombinedReducer<S, A, E, K>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
    K: EffectId,
{
    type State = S;
    type Action = A;
    type Environment = E;
    type CancelId = K;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action, Self::CancelId>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in &self.reducers {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects);
        }

        all_effects
    }
}

/// Embeds a child reducer into a parent domain.
///
/// - `state` focuses the parent state on the child's state
/// - `to_child` extracts a child action, `None` for actions the child ignores
/// - `from_child` embeds child actions produced by effects back into the parent
/// - `environment` projects the parent environment onto the child's
///
/// # Examples
///
/// ```
/// use cadence_core::{smallvec, Effect, NoEffectId, Reducer, SmallVec};
/// use cadence_core::composition::scope_reducer;
///
/// #[derive(Clone, Default)]
/// struct CounterState {
///     count: i32,
/// }
///
/// #[derive(Clone, Debug)]
/// enum CounterAction {
///     Increment,
/// }
///
/// struct CounterReducer;
///
/// impl Reducer for CounterReducer {
///     type State = CounterState;
///     type Action = CounterAction;
///     type Environment = ();
///     type CancelId = NoEffectId;
///
///     fn reduce(&self, state: &mut CounterState, action: CounterAction, _env: &()) -> SmallVec<[Effect<CounterAction>; 4]> {
///         match action {
///             CounterAction::Increment => state.count += 1,
///         }
///         smallvec![Effect::None]
///     }
/// }
///
/// #[derive(Clone, Default)]
/// struct AppState {
///     counter: CounterState,
///     title: String,
/// }
///
/// #[derive(Clone, Debug)]
/// enum AppAction {
///     Counter(CounterAction),
///     Rename(String),
/// }
///
/// fn counter_state(app: &mut AppState) -> &mut CounterState {
///     &mut app.counter
/// }
///
/// fn counter_action(action: AppAction) -> Option<CounterAction> {
///     match action {
///         AppAction::Counter(action) => Some(action),
///         AppAction::Rename(_) => None,
///     }
/// }
///
/// fn counter_environment(env: &()) -> &() {
///     env
/// }
///
/// let scoped = scope_reducer(
///     CounterReducer,
///     counter_state,
///     counter_action,
///     AppAction::Counter,
///     counter_environment,
/// );
///
/// let mut state = AppState::default();
/// let _ = scoped.reduce(&mut state, AppAction::Counter(CounterAction::Increment), &());
/// assert_eq!(state.counter.count, 1);
/// ```
pub fn scope_reducer<S, A, E, R>(
    reducer: R,
    state: fn(&mut S) -> &mut R::State,
    to_child: fn(A) -> Option<R::Action>,
    from_child: fn(R::Action) -> A,
    environment: fn(&E) -> &R::Environment,
) -> ScopedReducer<S, A, E, R>
where
    R: Reducer,
{
    ScopedReducer {
        reducer,
        state,
        to_child,
        from_child,
        environment,
    }
}

/// A child reducer embedded in a parent domain.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, A, E, R>
where
    R: Reducer,
{
    reducer: R,
    state: fn(&mut S) -> &mut R::State,
    to_child: fn(A) -> Option<R::Action>,
    from_child: fn(R::Action) -> A,
    environment: fn(&E) -> &R::Environment,
}

impl<S, A, E, R> Reducer for ScopedReducer<S, A, E, R>
where
    R: Reducer,
    R::Action: Send + 'static,
    A: Send + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;
    type CancelId = R::CancelId;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action, Self::CancelId>; 4]> {
        let Some(child_action) = (self.to_child)(action) else {
            return SmallVec::new();
        };

        let effects = self.reducer.reduce(
            (self.state)(state),
            child_action,
            (self.environment)(env),
        );

        effects
            .into_iter()
            .map(|effect| effect.map(self.from_child))
            .collect()
    }
}

/// Runs a child reducer against the element of a collection whose id an
/// action names.
///
/// - `elements` focuses the parent state on the collection
/// - `id_of` reads an element's id
/// - `to_child` extracts `(id, child action)`, `None` for other actions
/// - `from_child` embeds child actions produced by effects, tagged with the id
/// - `environment` projects the parent environment onto the child's
///
/// An action for an id that is not in the collection is ignored.
pub fn for_each_reducer<S, A, E, Id, R>(
    reducer: R,
    elements: fn(&mut S) -> &mut Vec<R::State>,
    id_of: fn(&R::State) -> Id,
    to_child: fn(A) -> Option<(Id, R::Action)>,
    from_child: fn(Id, R::Action) -> A,
    environment: fn(&E) -> &R::Environment,
) -> ForEachReducer<S, A, E, Id, R>
where
    R: Reducer,
    Id: PartialEq,
{
    ForEachReducer {
        reducer,
        elements,
        id_of,
        to_child,
        from_child,
        environment,
        _id: PhantomData,
    }
}

/// A child reducer applied to one element of a collection.
///
/// Created by [`for_each_reducer`].
pub struct ForEachReducer<S, A, E, Id, R>
where
    R: Reducer,
{
    reducer: R,
    elements: fn(&mut S) -> &mut Vec<R::State>,
    id_of: fn(&R::State) -> Id,
    to_child: fn(A) -> Option<(Id, R::Action)>,
    from_child: fn(Id, R::Action) -> A,
    environment: fn(&E) -> &R::Environment,
    _id: PhantomData<fn() -> Id>,
}

impl<S, A, E, Id, R> Reducer for ForEachReducer<S, A, E, Id, R>
where
    R: Reducer,
    R::Action: Send + 'static,
    A: Send + 'static,
    Id: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;
    type CancelId = R::CancelId;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action, Self::CancelId>; 4]> {
        let Some((id, child_action)) = (self.to_child)(action) else {
            return SmallVec::new();
        };

        let elements = (self.elements)(state);
        let Some(element) = elements.iter_mut().find(|element| (self.id_of)(element) == id) else {
            tracing::debug!(?id, "Action for missing element ignored");
            return SmallVec::new();
        };

        let effects = self
            .reducer
            .reduce(element, child_action, (self.environment)(env));

        let from_child = self.from_child;
        effects
            .into_iter()
            .map(|effect| {
                let id = id.clone();
                effect.map(move |action| from_child(id.clone(), action))
            })
            .collect()
    }
}
