//! Domain types for the Todos feature.

use cadence_core::environment::IdGenerator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique identifier for a todo item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TodoId(Uuid);

impl TodoId {
    /// Draws a fresh id from `ids`
    #[must_use]
    pub fn generate(ids: &dyn IdGenerator) -> Self {
        Self(ids.generate())
    }

    /// Creates a `TodoId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for TodoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single todo item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier, fixed at creation
    pub id: TodoId,
    /// Free-form text
    pub description: String,
    /// Whether the todo is done
    pub is_complete: bool,
}

impl Todo {
    /// An empty, incomplete todo
    #[must_use]
    pub const fn new(id: TodoId) -> Self {
        Self {
            id,
            description: String::new(),
            is_complete: false,
        }
    }
}

/// Which todos the list shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Every todo
    #[default]
    All,
    /// Incomplete todos
    Active,
    /// Completed todos
    Completed,
}

impl Filter {
    /// Name used in tracked events
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Whether `todo` is shown under this filter
    #[must_use]
    pub const fn matches(self, todo: &Todo) -> bool {
        match self {
            Self::All => true,
            Self::Active => !todo.is_complete,
            Self::Completed => todo.is_complete,
        }
    }
}

/// Whether the list is in edit mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Normal browsing
    #[default]
    Inactive,
    /// Rows can be moved and deleted
    Active,
}

impl EditMode {
    /// Name used in tracked events
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
        }
    }
}

/// State of the todo list
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodosState {
    /// Todos in display order
    pub todos: Vec<Todo>,
    /// Current filter
    pub filter: Filter,
    /// Current edit mode
    pub edit_mode: EditMode,
    /// Pending alert message, if any
    pub alert: Option<String>,
}

impl TodosState {
    /// State holding `todos` with default filter and edit mode
    #[must_use]
    pub fn with_todos(todos: Vec<Todo>) -> Self {
        Self {
            todos,
            ..Self::default()
        }
    }

    /// Todos visible under the current filter, in display order
    pub fn filtered_todos(&self) -> impl Iterator<Item = &Todo> {
        let filter = self.filter;
        self.todos.iter().filter(move |todo| filter.matches(todo))
    }

    /// Number of completed todos
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.todos.iter().filter(|todo| todo.is_complete).count()
    }

    /// Whether a todo with `id` exists
    #[must_use]
    pub fn contains(&self, id: TodoId) -> bool {
        self.todos.iter().any(|todo| todo.id == id)
    }
}

/// Actions on a single todo row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodoAction {
    /// The completion checkbox was tapped
    CheckBoxToggled,
    /// The description was edited
    TextFieldChanged(String),
}

/// Actions on the todo list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppAction {
    /// Insert an empty todo at the top
    AddTodoButtonTapped,
    /// Remove every completed todo
    ClearCompletedButtonTapped,
    /// Remove the todos at these positions
    Delete(BTreeSet<usize>),
    /// Enter or leave edit mode
    EditModeChanged(EditMode),
    /// Change the filter
    FilterPicked(Filter),
    /// Move the todos at `source` so they start at `destination`
    Move {
        /// Positions of the todos being moved
        source: BTreeSet<usize>,
        /// Position, in the list before the move, the block lands in front of
        destination: usize,
    },
    /// Debounced: move completed todos below incomplete ones
    SortCompletedTodos,
    /// An action on one todo
    Todo {
        /// Which todo
        id: TodoId,
        /// What happened to it
        action: TodoAction,
    },
    /// The alert was dismissed
    AlertDismissed,
}

/// Cancellation keys for Todos effects
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TodosEffectId {
    /// The pending completed-todos sort
    Sort,
}
