//! Configuration surface.
//!
//! [`TaskConfig`] carries the process-wide settings (eager mode, endpoint
//! base URL, default queue). [`TaskOptions`] carries the per-task settings
//! attached to a binding at registration.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::errors::ConfigError;

/// Environment variable toggling eager execution.
pub const ENV_EAGER_TASKS: &str = "EAGER_TASKS";
/// Environment variable holding the endpoint base URL.
pub const ENV_BASE_URL: &str = "TASKS_BASE_URL";
/// Environment variable holding the default queue name.
pub const ENV_DEFAULT_QUEUE: &str = "TASKS_DEFAULT_QUEUE";

/// The queue used when a task does not name one.
pub const DEFAULT_QUEUE: &str = "tasks";

/// How dispatched tasks are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Push to the queue; the queue invokes the endpoint later.
    #[default]
    Queued,
    /// Run in-process and return the task's result.
    Eager,
}

/// Process-wide dispatch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Bypass the queue and run tasks in-process.
    #[serde(default)]
    pub eager_tasks: bool,
    /// Base URL the queue pushes invocations to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Queue used by tasks without their own.
    #[serde(default = "default_queue")]
    pub default_queue: String,
    /// Suffix of the fallback queue used while a queue is being recreated.
    #[serde(default = "default_temp_queue_suffix")]
    pub temp_queue_suffix: String,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

fn default_temp_queue_suffix() -> String {
    "--temp".to_string()
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            eager_tasks: false,
            base_url: default_base_url(),
            default_queue: default_queue(),
            temp_queue_suffix: default_temp_queue_suffix(),
        }
    }
}

impl TaskConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables eager execution.
    #[must_use]
    pub fn with_eager_tasks(mut self, eager: bool) -> Self {
        self.eager_tasks = eager;
        self
    }

    /// Sets the endpoint base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the default queue.
    #[must_use]
    pub fn with_default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = queue.into();
        self
    }

    /// Returns the execution mode implied by `eager_tasks`.
    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        if self.eager_tasks {
            ExecutionMode::Eager
        } else {
            ExecutionMode::Queued
        }
    }

    /// Builds the endpoint URL for a task.
    #[must_use]
    pub fn task_url(&self, task_name: &str) -> String {
        format!("{}/tasks/{}", self.base_url.trim_end_matches('/'), task_name)
    }

    /// Name of the fallback queue for `queue_name`.
    #[must_use]
    pub fn temp_queue_name(&self, queue_name: &str) -> String {
        format!("{queue_name}{}", self.temp_queue_suffix)
    }

    /// Loads defaults overridden by environment variables, then validates.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads from a JSON file, then validates.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Read(format!("{}: {e}", path.as_ref().display())))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Read(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_EAGER_TASKS) {
            config.eager_tasks = parse_bool(ENV_EAGER_TASKS, &raw)?;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(queue) = lookup(ENV_DEFAULT_QUEUE) {
            config.default_queue = queue;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates URL and queue names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::invalid(
                "base_url",
                format!("{:?} is not an http(s) URL", self.base_url),
            ));
        }
        self.validate_queue(&self.default_queue)
    }

    /// Checks `queue_name` and its fallback queue name.
    pub fn validate_queue(&self, queue_name: &str) -> Result<(), ConfigError> {
        validate_queue_name(queue_name)?;
        validate_queue_name(&self.temp_queue_name(queue_name))
    }
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::invalid(field, format!("{other:?} is not a boolean"))),
    }
}

#[allow(clippy::expect_used)]
fn queue_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9-]{1,100}$").expect("queue name pattern"))
}

/// Checks a queue name against the characters push queues accept.
pub fn validate_queue_name(name: &str) -> Result<(), ConfigError> {
    if queue_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "queue_name",
            format!("{name:?} must be 1-100 letters, digits or hyphens"),
        ))
    }
}

/// Per-task dispatch options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Queue for this task; `None` uses the configured default.
    #[serde(default)]
    pub queue_name: Option<String>,
    /// Whether the queue may hold only one pending invocation per payload.
    #[serde(default = "default_unique")]
    pub unique: bool,
}

fn default_unique() -> bool {
    true
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskOptions {
    /// Options with the default queue and uniqueness enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue_name: None,
            unique: true,
        }
    }

    /// Routes the task to a dedicated queue.
    #[must_use]
    pub fn with_queue(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    /// Allows duplicate pending invocations.
    #[must_use]
    pub fn not_unique(mut self) -> Self {
        self.unique = false;
        self
    }

    /// Resolves the queue name against the process configuration.
    #[must_use]
    pub fn queue_name<'a>(&'a self, config: &'a TaskConfig) -> &'a str {
        self.queue_name.as_deref().unwrap_or(&config.default_queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TaskConfig::default();
        assert!(!config.eager_tasks);
        assert_eq!(config.default_queue, "tasks");
        assert_eq!(config.execution_mode(), ExecutionMode::Queued);
        assert_eq!(
            config.task_url("CalculatePriceTask"),
            "http://localhost:8080/tasks/CalculatePriceTask"
        );
    }

    #[test]
    fn test_task_url_trims_trailing_slash() {
        let config = TaskConfig::new().with_base_url("https://example.com/");
        assert_eq!(config.task_url("SayHelloTask"), "https://example.com/tasks/SayHelloTask");
    }

    #[test]
    fn test_temp_queue_name() {
        assert_eq!(TaskConfig::default().temp_queue_name("tasks"), "tasks--temp");
    }

    #[test]
    fn test_from_env_overrides() {
        let config = TaskConfig::from_lookup(lookup(&[
            (ENV_EAGER_TASKS, "True"),
            (ENV_BASE_URL, "https://tasks.example.com"),
            (ENV_DEFAULT_QUEUE, "background"),
        ]))
        .unwrap();

        assert_eq!(config.execution_mode(), ExecutionMode::Eager);
        assert_eq!(config.base_url, "https://tasks.example.com");
        assert_eq!(config.default_queue, "background");
    }

    #[test]
    fn test_from_env_rejects_bad_bool() {
        let err = TaskConfig::from_lookup(lookup(&[(ENV_EAGER_TASKS, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == ENV_EAGER_TASKS));
    }

    #[test]
    fn test_validate_rejects_bad_queue_name() {
        let config = TaskConfig::new().with_default_queue("not a queue!");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_queue_checks_fallback_name() {
        let config = TaskConfig::new();
        assert!(config.validate_queue("pricing").is_ok());
        assert!(config.validate_queue("pricing queue").is_err());
        assert!(config.validate_queue(&"q".repeat(95)).is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let config = TaskConfig::new().with_base_url("ftp://example.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"eager_tasks": true, "default_queue": "jobs"}}"#).unwrap();

        let config = TaskConfig::from_file(file.path()).unwrap();
        assert!(config.eager_tasks);
        assert_eq!(config.default_queue, "jobs");
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.temp_queue_suffix, "--temp");
    }

    #[test]
    fn test_from_missing_file() {
        let err = TaskConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }

    #[test]
    fn test_task_options() {
        let config = TaskConfig::default();
        let options = TaskOptions::new();
        assert!(options.unique);
        assert_eq!(options.queue_name(&config), "tasks");

        let options = TaskOptions::new().with_queue("dedicated").not_unique();
        assert!(!options.unique);
        assert_eq!(options.queue_name(&config), "dedicated");
    }
}
