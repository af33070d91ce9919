//! Configuration for the Todos demo
//!
//! Values come from environment variables (optionally seeded from a `.env`
//! file by the binary). Every variable has a default.
//!
//! | Variable                         | Default |
//! |----------------------------------|---------|
//! | `TODOS_COMPLETION_SORT_DELAY_MS` | `1000`  |
//! | `TODOS_REORDER_SORT_DELAY_MS`    | `100`   |
//! | `TODOS_LOG_LEVEL`                | `info`  |
//!
//! # Example
//!
//! ```no_run
//! use todos::config::TodosConfig;
//!
//! # fn main() -> Result<(), todos::config::ConfigError> {
//! let config = TodosConfig::from_env()?;
//! println!("Sorting {:?} after a toggle", config.completion_sort_delay);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Value found
        value: String,
    },
}

/// Todos demo configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodosConfig {
    /// Quiet period after a checkbox toggle before completed todos sort down
    pub completion_sort_delay: Duration,
    /// Quiet period after a move before completed todos sort down
    pub reorder_sort_delay: Duration,
    /// `tracing` filter directive for the demo binary
    pub log_level: String,
}

impl TodosConfig {
    /// Default quiet period after a checkbox toggle
    pub const DEFAULT_COMPLETION_SORT_DELAY: Duration = Duration::from_secs(1);
    /// Default quiet period after a move
    pub const DEFAULT_REORDER_SORT_DELAY: Duration = Duration::from_millis(100);

    const COMPLETION_SORT_DELAY_VAR: &'static str = "TODOS_COMPLETION_SORT_DELAY_MS";
    const REORDER_SORT_DELAY_VAR: &'static str = "TODOS_REORDER_SORT_DELAY_MS";
    const LOG_LEVEL_VAR: &'static str = "TODOS_LOG_LEVEL";

    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a delay variable is set but is
    /// not a whole number of milliseconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a delay variable is set but is
    /// not a whole number of milliseconds.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            completion_sort_delay: millis(
                &lookup,
                Self::COMPLETION_SORT_DELAY_VAR,
                defaults.completion_sort_delay,
            )?,
            reorder_sort_delay: millis(&lookup, Self::REORDER_SORT_DELAY_VAR, defaults.reorder_sort_delay)?,
            log_level: lookup(Self::LOG_LEVEL_VAR).unwrap_or(defaults.log_level),
        })
    }
}

impl Default for TodosConfig {
    fn default() -> Self {
        Self {
            completion_sort_delay: Self::DEFAULT_COMPLETION_SORT_DELAY,
            reorder_sort_delay: Self::DEFAULT_REORDER_SORT_DELAY,
            log_level: "info".to_string(),
        }
    }
}

fn millis<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn missing_variables_take_defaults() {
        let config = TodosConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TodosConfig::default());
        assert_eq!(config.completion_sort_delay, Duration::from_secs(1));
        assert_eq!(config.reorder_sort_delay, Duration::from_millis(100));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn variables_override_defaults() {
        let config = TodosConfig::from_lookup(lookup(&[
            ("TODOS_COMPLETION_SORT_DELAY_MS", "250"),
            ("TODOS_REORDER_SORT_DELAY_MS", " 10 "),
            ("TODOS_LOG_LEVEL", "todos=debug"),
        ]))
        .unwrap();

        assert_eq!(config.completion_sort_delay, Duration::from_millis(250));
        assert_eq!(config.reorder_sort_delay, Duration::from_millis(10));
        assert_eq!(config.log_level, "todos=debug");
    }

    #[test]
    fn unparsable_delay_is_an_error() {
        let error = TodosConfig::from_lookup(lookup(&[("TODOS_REORDER_SORT_DELAY_MS", "soon")])).unwrap_err();
        assert_eq!(
            error,
            ConfigError::InvalidValue {
                var: "TODOS_REORDER_SORT_DELAY_MS",
                value: "soon".to_string(),
            }
        );
        assert_eq!(
            error.to_string(),
            "Invalid value for TODOS_REORDER_SORT_DELAY_MS: \"soon\""
        );
    }
}
