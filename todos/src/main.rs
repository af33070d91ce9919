//! Command-line walkthrough of the Todos feature.
//!
//! Adds a few todos, completes one and waits for the debounced sort to move
//! it to the bottom, then filters and clears completed todos. Tracked events
//! are written to the log.

use anyhow::Context;
use cadence_runtime::Store;
use std::time::Duration;
use todos::{
    todos_reducer, AppAction, Filter, TodoAction, TodoId, TodosConfig, TodosEnvironment, TodosState,
    TodosStore,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    let config = TodosConfig::from_env().context("loading todos configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    cadence_runtime::metrics::register_metrics();

    tracing::info!(?config, "Starting todos demo");

    let env = TodosEnvironment::live(&config);
    let store: TodosStore = Store::new(TodosState::default(), todos_reducer(), env);

    for description in ["Deploy to production", "Write documentation", "Buy milk"] {
        store.send(AppAction::AddTodoButtonTapped)?;
        let id = newest(&store)?;
        store.send(AppAction::todo(id, TodoAction::TextFieldChanged(description.to_string())))?;
    }
    print_todos("Todos created", &store.current_state());

    let first = newest(&store)?;
    println!("\nCompleting the first todo...");
    let sorted = store
        .send_and_wait_for(
            AppAction::todo(first, TodoAction::CheckBoxToggled),
            |action| matches!(action, AppAction::SortCompletedTodos),
            config.completion_sort_delay + Duration::from_secs(1),
        )
        .await;
    match sorted {
        Ok(_) => print_todos("After the debounced sort", &store.current_state()),
        Err(error) => tracing::warn!(%error, "Sort never arrived"),
    }

    store.send(AppAction::FilterPicked(Filter::Active))?;
    let state = store.current_state();
    println!("\nActive todos: {}", state.filtered_todos().count());

    store.send(AppAction::ClearCompletedButtonTapped)?;
    print_todos("After clearing completed", &store.current_state());

    // Let fire-and-forget tracking finish before shutting down
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.shutdown();
    Ok(())
}

fn newest(store: &TodosStore) -> anyhow::Result<TodoId> {
    store
        .state(|s| s.todos.first().map(|todo| todo.id))
        .context("todo list is empty")
}

fn print_todos(title: &str, state: &TodosState) {
    println!("\n{title}:");
    for todo in &state.todos {
        let status = if todo.is_complete { "✓" } else { " " };
        println!("  [{status}] {}", todo.description);
    }
}
