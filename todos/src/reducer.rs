//! Reducer logic for the Todos feature.
//!
//! Two reducers are combined, child first:
//!
//! 1. [`TodoReducer`] runs on the single todo an `AppAction::Todo` names.
//! 2. [`TodosCoreReducer`] handles list-level actions and reacts to row
//!    actions, for example by debouncing the completed-todos sort after a
//!    checkbox toggle.
//!
//! [`TodosReducer`] is the combination and is what a store runs.

use crate::environment::TodosEnvironment;
use crate::types::{AppAction, EditMode, Todo, TodoAction, TodoId, TodosEffectId, TodosState};
use cadence_core::composition::{combine_reducers, for_each_reducer, BoxedReducer, CombinedReducer};
use cadence_core::environment::TrackedEvent;
use cadence_core::{debounce, effect::Effect, reducer::Reducer, smallvec, SmallVec};
use std::collections::BTreeSet;

/// Effects produced by the Todos reducers
pub type TodosEffects = SmallVec<[Effect<AppAction, TodosEffectId>; 4]>;

/// Reducer for a single todo row
#[derive(Clone, Copy, Debug, Default)]
pub struct TodoReducer;

impl Reducer for TodoReducer {
    type State = Todo;
    type Action = TodoAction;
    type Environment = ();
    type CancelId = TodosEffectId;

    fn reduce(
        &self,
        todo: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action, Self::CancelId>; 4]> {
        match action {
            TodoAction::CheckBoxToggled => {
                todo.is_complete = !todo.is_complete;
            },
            TodoAction::TextFieldChanged(description) => {
                todo.description = description;
            },
        }
        SmallVec::new()
    }
}

/// List-level reducer for the Todos feature
#[derive(Clone, Copy, Debug, Default)]
pub struct TodosCoreReducer;

impl TodosCoreReducer {
    /// Emit `event` through the environment's tracker
    ///
    /// Failures are logged and dropped; they never reach state.
    fn track(env: &TodosEnvironment, event: TrackedEvent) -> Effect<AppAction, TodosEffectId> {
        let name = event.name.clone();
        let pending = env.tracker.track(event);
        Effect::fire_and_forget(async move {
            if let Err(error) = pending.await {
                tracing::warn!(%error, event = %name, "Failed to track event");
            }
        })
    }

    fn sort_after(delay: std::time::Duration) -> Effect<AppAction, TodosEffectId> {
        debounce! {
            id: TodosEffectId::Sort,
            duration: delay,
            action: AppAction::SortCompletedTodos
        }
    }
}

impl Reducer for TodosCoreReducer {
    type State = TodosState;
    type Action = AppAction;
    type Environment = TodosEnvironment;
    type CancelId = TodosEffectId;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> TodosEffects {
        match action {
            AppAction::AddTodoButtonTapped => {
                let id = TodoId::generate(env.ids.as_ref());
                state.todos.insert(0, Todo::new(id));
                tracing::debug!(%id, "Added todo");
                SmallVec::new()
            },

            AppAction::ClearCompletedButtonTapped => {
                state.todos.retain(|todo| !todo.is_complete);
                smallvec![Self::track(env, TrackedEvent::new("Cleared Completed Todos"))]
            },

            AppAction::Delete(indices) => {
                remove_at(&mut state.todos, &indices);
                smallvec![Self::track(
                    env,
                    TrackedEvent::new("Todo Deleted").with_property("editMode", state.edit_mode.as_str()),
                )]
            },

            AppAction::EditModeChanged(edit_mode) => {
                state.edit_mode = edit_mode;
                SmallVec::new()
            },

            AppAction::FilterPicked(filter) => {
                state.filter = filter;
                smallvec![Self::track(
                    env,
                    TrackedEvent::new("Filter Changed").with_property("filter", filter.as_str()),
                )]
            },

            AppAction::Move {
                source,
                destination,
            } => {
                move_to(&mut state.todos, &source, destination);
                smallvec![Self::sort_after(env.reorder_sort_delay)]
            },

            AppAction::SortCompletedTodos => {
                sort_completed(&mut state.todos);
                SmallVec::new()
            },

            AppAction::Todo {
                id,
                action: TodoAction::CheckBoxToggled,
            } if state.contains(id) => smallvec![Self::sort_after(env.completion_sort_delay)],

            // Row edits are handled by `TodoReducer`
            AppAction::Todo { .. } => SmallVec::new(),

            AppAction::AlertDismissed => {
                state.alert = None;
                SmallVec::new()
            },
        }
    }
}

/// The complete Todos reducer: row reducer first, then the list reducer
pub type TodosReducer = CombinedReducer<TodosState, AppAction, TodosEnvironment, TodosEffectId>;

/// Build the complete Todos reducer
#[must_use]
pub fn todos_reducer() -> TodosReducer {
    let reducers: Vec<BoxedReducer<TodosState, AppAction, TodosEnvironment, TodosEffectId>> = vec![
        Box::new(for_each_reducer(
            TodoReducer,
            todos_of,
            id_of,
            row_action,
            AppAction::todo,
            row_environment,
        )),
        Box::new(TodosCoreReducer),
    ];
    combine_reducers(reducers)
}

fn todos_of(state: &mut TodosState) -> &mut Vec<Todo> {
    &mut state.todos
}

const fn id_of(todo: &Todo) -> TodoId {
    todo.id
}

fn row_action(action: AppAction) -> Option<(TodoId, TodoAction)> {
    match action {
        AppAction::Todo { id, action } => Some((id, action)),
        _ => None,
    }
}

const fn row_environment(_env: &TodosEnvironment) -> &() {
    &()
}

impl AppAction {
    /// Wrap a row action for the todo with `id`
    #[must_use]
    pub const fn todo(id: TodoId, action: TodoAction) -> Self {
        Self::Todo { id, action }
    }
}

/// Move completed todos after incomplete ones, keeping each group's order
pub fn sort_completed(todos: &mut [Todo]) {
    // `sort_by_key` is stable
    todos.sort_by_key(|todo| todo.is_complete);
}

/// Remove the items at `indices`; positions past the end are ignored
pub fn remove_at<T>(items: &mut Vec<T>, indices: &BTreeSet<usize>) {
    let mut position = 0;
    items.retain(|_| {
        let keep = !indices.contains(&position);
        position += 1;
        keep
    });
}

/// Move the items at `source` so they form one block in front of the item
/// that was at `destination`
///
/// Moved items keep their relative order. `destination` counts positions in
/// the list before the move; a destination past the end appends the block.
/// Source positions past the end are ignored.
pub fn move_to<T>(items: &mut Vec<T>, source: &BTreeSet<usize>, destination: usize) {
    let destination = destination.min(items.len());
    let shift = source.range(..destination).count();

    let mut moved = Vec::with_capacity(source.len());
    let mut kept = Vec::with_capacity(items.len());
    for (position, item) in items.drain(..).enumerate() {
        if source.contains(&position) {
            moved.push(item);
        } else {
            kept.push(item);
        }
    }

    let at = (destination - shift).min(kept.len());
    kept.splice(at..at, moved);
    *items = kept;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use crate::types::Filter;
    use cadence_testing::assertions;
    use cadence_testing::mocks::{RecordingTracker, UnimplementedIdGenerator};
    use cadence_testing::ReducerTest;
    use proptest::prelude::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn todo(n: u128, is_complete: bool) -> Todo {
        Todo {
            id: TodoId::from_uuid(Uuid::from_u128(n)),
            description: String::new(),
            is_complete,
        }
    }

    fn env() -> TodosEnvironment {
        TodosEnvironment::new(UnimplementedIdGenerator, RecordingTracker::new().0)
    }

    #[test]
    fn stable_partition_keeps_group_order() {
        let mut todos = vec![todo(0, false), todo(1, true), todo(2, false)];
        sort_completed(&mut todos);
        let order: Vec<_> = todos.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![todo(0, false).id, todo(2, false).id, todo(1, true).id]);
    }

    #[test]
    fn move_single_item_forward() {
        let mut items = vec!['a', 'b', 'c'];
        move_to(&mut items, &BTreeSet::from([0]), 2);
        assert_eq!(items, vec!['b', 'a', 'c']);
    }

    #[test]
    fn move_to_end_and_backwards() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        move_to(&mut items, &BTreeSet::from([0, 2]), 4);
        assert_eq!(items, vec!['b', 'd', 'a', 'c']);

        let mut items = vec!['a', 'b', 'c', 'd'];
        move_to(&mut items, &BTreeSet::from([3]), 0);
        assert_eq!(items, vec!['d', 'a', 'b', 'c']);

        let mut items = vec!['a', 'b', 'c'];
        move_to(&mut items, &BTreeSet::from([1, 9]), 99);
        assert_eq!(items, vec!['a', 'c', 'b']);
    }

    #[test]
    fn remove_ignores_out_of_range() {
        let mut items = vec!['a', 'b', 'c'];
        remove_at(&mut items, &BTreeSet::from([1, 7]));
        assert_eq!(items, vec!['a', 'c']);
    }

    #[test]
    fn toggle_debounces_sort() {
        ReducerTest::new(todos_reducer())
            .with_env(env())
            .given_state(TodosState::with_todos(vec![todo(0, false)]))
            .when_action(AppAction::todo(todo(0, false).id, TodoAction::CheckBoxToggled))
            .then_state(|state| assert!(state.todos[0].is_complete))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_debounce(
                    effects,
                    TodosEffectId::Sort,
                    Duration::from_secs(1),
                    &AppAction::SortCompletedTodos,
                );
            })
            .run();
    }

    #[test]
    fn toggle_of_missing_todo_is_a_no_op() {
        ReducerTest::new(todos_reducer())
            .with_env(env())
            .given_state(TodosState::with_todos(vec![todo(0, false)]))
            .when_action(AppAction::todo(todo(9, false).id, TodoAction::CheckBoxToggled))
            .then_state(|state| assert_eq!(*state, TodosState::with_todos(vec![todo(0, false)])))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn move_rearms_sort_with_reorder_delay() {
        ReducerTest::new(todos_reducer())
            .with_env(env())
            .given_state(TodosState::with_todos(vec![todo(0, false), todo(1, false)]))
            .when_action(AppAction::Move {
                source: BTreeSet::from([0]),
                destination: 2,
            })
            .then_state(|state| assert_eq!(state.todos[0].id, todo(1, false).id))
            .then_effects(|effects| {
                assertions::assert_has_debounce(
                    effects,
                    TodosEffectId::Sort,
                    Duration::from_millis(100),
                    &AppAction::SortCompletedTodos,
                );
            })
            .run();
    }

    #[test]
    fn filter_change_is_tracked() {
        ReducerTest::new(todos_reducer())
            .with_env(env())
            .given_state(TodosState::default())
            .when_action(AppAction::FilterPicked(Filter::Active))
            .then_state(|state| assert_eq!(state.filter, Filter::Active))
            .then_effects(assertions::assert_has_fire_and_forget)
            .run();
    }

    #[test]
    fn alert_dismissed_clears_alert() {
        ReducerTest::new(todos_reducer())
            .with_env(env())
            .given_state(TodosState {
                alert: Some("Sync failed".into()),
                edit_mode: EditMode::Active,
                ..TodosState::default()
            })
            .when_action(AppAction::AlertDismissed)
            .then_state(|state| {
                assert_eq!(state.alert, None);
                assert_eq!(state.edit_mode, EditMode::Active);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    proptest! {
        #[test]
        fn prop_sort_is_a_stable_partition(flags in prop::collection::vec(any::<bool>(), 0..32)) {
            let mut todos: Vec<Todo> = flags
                .iter()
                .enumerate()
                .map(|(n, done)| todo(n as u128, *done))
                .collect();
            let incomplete: Vec<_> = todos.iter().filter(|t| !t.is_complete).map(|t| t.id).collect();
            let complete: Vec<_> = todos.iter().filter(|t| t.is_complete).map(|t| t.id).collect();

            sort_completed(&mut todos);

            let expected: Vec<_> = incomplete.into_iter().chain(complete).collect();
            let actual: Vec<_> = todos.iter().map(|t| t.id).collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn prop_move_keeps_every_item_and_block_order(
            len in 0usize..16,
            source in prop::collection::btree_set(0usize..16, 0..6),
            destination in 0usize..20,
        ) {
            let mut items: Vec<usize> = (0..len).collect();
            move_to(&mut items, &source, destination);

            let mut sorted = items.clone();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (0..len).collect::<Vec<_>>());

            let moved: Vec<usize> = source.iter().copied().filter(|&i| i < len).collect();
            if let Some(&first) = moved.first() {
                let start = items.iter().position(|&i| i == first).unwrap();
                prop_assert_eq!(&items[start..start + moved.len()], moved.as_slice());
            }

            let kept: Vec<usize> = items.iter().copied().filter(|i| !source.contains(i)).collect();
            let expected_kept: Vec<usize> = (0..len).filter(|i| !source.contains(i)).collect();
            prop_assert_eq!(kept, expected_kept);
        }
    }
}
