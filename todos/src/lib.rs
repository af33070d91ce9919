//! Todo list feature built on Cadence.
//!
//! Demonstrates:
//!
//! - Row reducers composed into a list reducer with `for_each_reducer`
//! - A debounced follow-up action: completed todos sort below incomplete
//!   ones once toggling has been quiet for a second
//! - Fire-and-forget analytics through an injected `Tracker`
//! - Deterministic scenario tests with `TestStore` and a virtual clock
//!
//! # Quick Start
//!
//! ```no_run
//! use cadence_runtime::Store;
//! use todos::{todos_reducer, AppAction, TodosConfig, TodosEnvironment, TodosState};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let env = TodosEnvironment::live(&TodosConfig::default());
//! let store = Store::new(TodosState::default(), todos_reducer(), env);
//!
//! store.send(AppAction::AddTodoButtonTapped)?;
//! println!("Todos: {}", store.state(|s| s.todos.len()));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod environment;
pub mod reducer;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigError, TodosConfig};
pub use environment::{LoggingTracker, TodosEnvironment};
pub use reducer::{todos_reducer, TodoReducer, TodosCoreReducer, TodosReducer};
pub use types::{AppAction, EditMode, Filter, Todo, TodoAction, TodoId, TodosEffectId, TodosState};

/// Store type running the complete Todos reducer
pub type TodosStore = cadence_runtime::Store<TodosState, AppAction, TodosEnvironment, TodosReducer>;
