//! Effect module - Side effect descriptions
//!
//! Effects describe side effects to be performed by the runtime. They are
//! values (not execution): a reducer returns them, the scheduler runs them,
//! and whatever actions they produce are fed back into the reducer.
//!
//! Effects can be keyed by an [`EffectId`]. Keyed work can be cancelled
//! ([`Effect::Cancel`]), replaced ([`Effect::Cancellable`]) or debounced
//! ([`Effect::Debounce`]). Once a key is cancelled, nothing started under it
//! delivers another action.

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

/// Key that identifies a family of in-flight effects.
///
/// Implemented for every small copyable key type; in practice a fieldless
/// enum per feature.
pub trait EffectId: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> EffectId for T where T: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

/// Cancellation key for reducers that never cancel anything.
///
/// Uninhabited, so `Effect::Cancel`, `Effect::Debounce` and
/// `Effect::Cancellable` cannot be constructed with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoEffectId {}

/// Effect type - describes a side effect to be executed
///
/// # Type Parameters
///
/// - `Action`: The action type that effects can produce (feedback loop)
/// - `Id`: The cancellation key type
pub enum Effect<Action, Id = NoEffectId> {
    /// No-op effect
    None,

    /// Arbitrary async computation
    ///
    /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
    Future(BoxFuture<'static, Option<Action>>),

    /// Async computation producing zero or more actions
    Stream(BoxStream<'static, Action>),

    /// Async work run only for its side effect (analytics, logging)
    FireAndForget(BoxFuture<'static, ()>),

    /// Delayed action, measured on the store's clock
    Delay {
        /// How long to wait
        duration: Duration,
        /// Action to dispatch after delay
        action: Box<Action>,
    },

    /// Delayed action that replaces any pending work under the same key
    ///
    /// Re-issuing a debounce before it fires cancels the earlier one and
    /// restarts the delay from the current instant.
    Debounce {
        /// Debounce key
        id: Id,
        /// Quiet period before the action is delivered
        duration: Duration,
        /// Action to dispatch once the key has been quiet for `duration`
        action: Box<Action>,
    },

    /// Run `effect` under `id`, cancelling whatever was already running under it
    Cancellable {
        /// Key the wrapped effect is registered under
        id: Id,
        /// The wrapped effect
        effect: Box<Effect<Action, Id>>,
    },

    /// Cancel every in-flight effect registered under the key
    Cancel(Id),

    /// Run effects concurrently
    Parallel(Vec<Effect<Action, Id>>),
}

// Manual Debug implementation since futures and streams don't implement Debug
impl<Action, Id> std::fmt::Debug for Effect<Action, Id>
where
    Action: std::fmt::Debug,
    Id: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::None => write!(f, "Effect::None"),
            Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            Effect::Stream(_) => write!(f, "Effect::Stream(<stream>)"),
            Effect::FireAndForget(_) => write!(f, "Effect::FireAndForget(<future>)"),
            Effect::Delay { duration, action } => f
                .debug_struct("Effect::Delay")
                .field("duration", duration)
                .field("action", action)
                .finish(),
            Effect::Debounce {
                id,
                duration,
                action,
            } => f
                .debug_struct("Effect::Debounce")
                .field("id", id)
                .field("duration", duration)
                .field("action", action)
                .finish(),
            Effect::Cancellable { id, effect } => f
                .debug_struct("Effect::Cancellable")
                .field("id", id)
                .field("effect", effect)
                .finish(),
            Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            Effect::Parallel(effects) => f.debug_tuple("Effect::Parallel").field(effects).finish(),
        }
    }
}

impl<Action, Id> Effect<Action, Id> {
    /// Combine effects to run in parallel
    #[must_use]
    pub const fn merge(effects: Vec<Effect<Action, Id>>) -> Effect<Action, Id> {
        Effect::Parallel(effects)
    }

    /// Wrap this effect so it runs under `id`, replacing in-flight work there.
    ///
    /// `Effect::None` stays `Effect::None`; there is nothing to register.
    #[must_use]
    pub fn cancellable(self, id: Id) -> Self {
        if self.is_none() {
            return Effect::None;
        }
        Effect::Cancellable {
            id,
            effect: Box::new(self),
        }
    }

    /// Whether running this effect would do nothing at all.
    pub fn is_none(&self) -> bool {
        match self {
            Effect::None => true,
            Effect::Parallel(effects) => effects.iter().all(Effect::is_none),
            _ => false,
        }
    }

    /// Short label for the variant, used in logs and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Future(_) => "future",
            Effect::Stream(_) => "stream",
            Effect::FireAndForget(_) => "fire_and_forget",
            Effect::Delay { .. } => "delay",
            Effect::Debounce { .. } => "debounce",
            Effect::Cancellable { .. } => "cancellable",
            Effect::Cancel(_) => "cancel",
            Effect::Parallel(_) => "parallel",
        }
    }
}

impl<Action, Id> Effect<Action, Id>
where
    Action: Send + 'static,
{
    /// Effect from an async computation that may produce an action.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Option<Action>> + Send + 'static,
    {
        Effect::Future(Box::pin(future))
    }

    /// Effect that feeds `action` straight back into the reducer.
    pub fn send(action: Action) -> Self {
        Effect::Future(Box::pin(futures::future::ready(Some(action))))
    }

    /// Effect that runs `future` and produces no action.
    pub fn fire_and_forget<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Effect::FireAndForget(Box::pin(future))
    }

    /// Lift this effect into a parent action type.
    ///
    /// Keys are preserved, so a parent can cancel or debounce work a child
    /// started with the same key type.
    #[must_use]
    pub fn map<B, F>(self, f: F) -> Effect<B, Id>
    where
        B: Send + 'static,
        F: Fn(Action) -> B + Clone + Send + Sync + 'static,
    {
        match self {
            Effect::None => Effect::None,
            Effect::Future(future) => Effect::Future(Box::pin(async move { future.await.map(f) })),
            Effect::Stream(stream) => Effect::Stream(stream.map(f).boxed()),
            Effect::FireAndForget(future) => Effect::FireAndForget(future),
            Effect::Delay { duration, action } => Effect::Delay {
                duration,
                action: Box::new(f(*action)),
            },
            Effect::Debounce {
                id,
                duration,
                action,
            } => Effect::Debounce {
                id,
                duration,
                action: Box::new(f(*action)),
            },
            Effect::Cancellable { id, effect } => Effect::Cancellable {
                id,
                effect: Box::new(effect.map(f)),
            },
            Effect::Cancel(id) => Effect::Cancel(id),
            Effect::Parallel(effects) => Effect::Parallel(
                effects
                    .into_iter()
                    .map(|effect| effect.map(f.clone()))
                    .collect(),
            ),
        }
    }
}
