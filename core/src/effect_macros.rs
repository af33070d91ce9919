//! Declarative macros for ergonomic effect construction

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use cadence_core::async_effect;
///
/// async_effect! {
///     let todos = api.fetch_todos().await.ok()?;
///     Some(AppAction::TodosLoaded(todos))
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use cadence_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(30),
///     action: SessionAction::TimeoutExpired
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

/// Create an `Effect::Debounce` that re-arms the key on every call
///
/// # Example
///
/// ```rust,ignore
/// use cadence_core::debounce;
/// use std::time::Duration;
///
/// debounce! {
///     id: TodosEffectId::Sort,
///     duration: Duration::from_secs(1),
///     action: AppAction::SortCompletedTodos
/// }
/// ```
#[macro_export]
macro_rules! debounce {
    (
        id: $id:expr,
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Debounce {
            id: $id,
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}
