//! # Cadence Core
//!
//! Core traits and types for Cadence, a reducer-driven state core whose side
//! effects are cancellable, debounceable, and driven by an injected clock.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for a feature
//! - **Action**: Every input a reducer can see (user intent and effect results alike)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution), optionally keyed for cancellation
//! - **Environment**: Injected capabilities (clock, executor, id generator, tracker)
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Explicit Effects (no hidden I/O)
//! - Time is a capability: nothing reads the wall clock behind the reducer's back
//!
//! ## Example
//!
//! ```
//! use cadence_core::{smallvec, Effect, Reducer, SmallVec};
//! use std::time::Duration;
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum SearchId {
//!     Query,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum SearchAction {
//!     QueryChanged(String),
//!     Search,
//! }
//!
//! #[derive(Default)]
//! struct SearchState {
//!     query: String,
//! }
//!
//! struct SearchReducer;
//!
//! impl Reducer for SearchReducer {
//!     type State = SearchState;
//!     type Action = SearchAction;
//!     type Environment = ();
//!     type CancelId = SearchId;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut SearchState,
//!         action: SearchAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<SearchAction, SearchId>; 4]> {
//!         match action {
//!             SearchAction::QueryChanged(query) => {
//!                 state.query = query;
//!                 smallvec![Effect::Debounce {
//!                     id: SearchId::Query,
//!                     duration: Duration::from_millis(300),
//!                     action: Box::new(SearchAction::Search),
//!                 }]
//!             },
//!             SearchAction::Search => smallvec![Effect::None],
//!         }
//!     }
//! }
//!
//! let mut state = SearchState::default();
//! let effects = SearchReducer.reduce(&mut state, SearchAction::QueryChanged("rust".into()), &());
//! assert_eq!(state.query, "rust");
//! assert_eq!(effects.len(), 1);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

pub mod composition;
pub mod effect;
mod effect_macros;
pub mod environment;

pub use effect::{Effect, EffectId, NoEffectId};
pub use reducer::Reducer;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable. Any
/// time-dependent behaviour is expressed through the returned effects, never
/// by sleeping or reading the clock as a side channel.
pub mod reducer {
    use super::effect::{Effect, EffectId};
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `CancelId`: The key type its effects are cancelled and debounced by
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for TimerReducer {
    ///     type State = TimerState;
    ///     type Action = TimerAction;
    ///     type Environment = TimerEnvironment;
    ///     type CancelId = TimerId;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut TimerState,
    ///         action: TimerAction,
    ///         env: &TimerEnvironment,
    ///     ) -> SmallVec<[Effect<TimerAction, TimerId>; 4]> {
    ///         match action {
    ///             TimerAction::Stop => {
    ///                 state.running = false;
    ///                 smallvec![Effect::Cancel(TimerId::Tick)]
    ///             }
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Cancellation key type for this reducer's effects
        ///
        /// Use [`NoEffectId`](crate::NoEffectId) when the reducer never
        /// cancels or debounces.
        type CancelId: EffectId;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Updates state in place
        /// 2. Returns effect descriptions to be executed by the runtime
        ///
        /// Actions the reducer does not care about must leave state untouched
        /// and return no effects.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action, Self::CancelId>; 4]>;
    }
}
