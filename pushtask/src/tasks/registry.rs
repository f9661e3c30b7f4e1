//! Task registry.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::{TaskBinding, TaskCategory};
use crate::errors::{RegistryError, TaskNotFound};

/// Name-to-binding map for every task the process knows about.
///
/// Populated once at startup, then shared read-only behind an `Arc`.
/// Names are unique across the three categories.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    bindings: HashMap<String, TaskBinding>,
}

#[allow(clippy::expect_used)]
fn task_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("task name pattern"))
}

impl TaskRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a binding.
    ///
    /// Fails if the name is already taken in any category or is not usable
    /// as an endpoint path segment.
    pub fn register(&mut self, binding: TaskBinding) -> Result<(), RegistryError> {
        if !task_name_pattern().is_match(binding.name()) {
            return Err(RegistryError::InvalidName(binding.name().to_string()));
        }
        if let Some(existing) = self.bindings.get(binding.name()) {
            return Err(RegistryError::Duplicate {
                name: binding.name().to_string(),
                existing: existing.category().to_string(),
            });
        }
        self.bindings.insert(binding.name().to_string(), binding);
        Ok(())
    }

    /// Looks up a binding by name.
    pub fn get(&self, name: &str) -> Result<&TaskBinding, TaskNotFound> {
        self.bindings.get(name).ok_or_else(|| TaskNotFound::new(name))
    }

    /// Checks if a task is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Names registered under a category, sorted.
    #[must_use]
    pub fn names(&self, category: TaskCategory) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .bindings
            .values()
            .filter(|b| b.category() == category)
            .map(TaskBinding::name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Names of on-demand tasks.
    #[must_use]
    pub fn on_demand_tasks(&self) -> Vec<&str> {
        self.names(TaskCategory::OnDemand)
    }

    /// Names of periodic tasks.
    #[must_use]
    pub fn periodic_tasks(&self) -> Vec<&str> {
        self.names(TaskCategory::Periodic)
    }

    /// Names of subscriber tasks.
    #[must_use]
    pub fn subscriber_tasks(&self) -> Vec<&str> {
        self.names(TaskCategory::Subscriber)
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("on_demand", &self.on_demand_tasks())
            .field("periodic", &self.periodic_tasks())
            .field("subscriber", &self.subscriber_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::FnTask;
    use serde_json::Value;

    fn noop() -> FnTask {
        FnTask::new(|_| async { Ok(Value::Null) })
    }

    #[test]
    fn test_registry_creation() {
        let registry = TaskRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.on_demand_tasks().is_empty());
    }

    #[test]
    fn test_registry_partitions() {
        let mut registry = TaskRegistry::new();
        registry.register(TaskBinding::on_demand("SayHelloTask", noop())).unwrap();
        registry.register(TaskBinding::on_demand("CalculatePriceTask", noop())).unwrap();
        registry
            .register(TaskBinding::periodic("SaySomethingTask", "* * * * *", noop()))
            .unwrap();
        registry
            .register(TaskBinding::subscriber("PleaseNotifyMeTask", "notifications", noop()))
            .unwrap();

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.on_demand_tasks(), vec!["CalculatePriceTask", "SayHelloTask"]);
        assert_eq!(registry.periodic_tasks(), vec!["SaySomethingTask"]);
        assert_eq!(registry.subscriber_tasks(), vec!["PleaseNotifyMeTask"]);
    }

    #[test]
    fn test_registry_get() {
        let mut registry = TaskRegistry::new();
        registry.register(TaskBinding::on_demand("SayHelloTask", noop())).unwrap();

        assert_eq!(registry.get("SayHelloTask").unwrap().name(), "SayHelloTask");
        assert!(registry.contains("SayHelloTask"));
    }

    #[test]
    fn test_registry_get_not_found() {
        let registry = TaskRegistry::new();
        let err = registry.get("PotatoTask").unwrap_err();
        assert_eq!(err, TaskNotFound::new("PotatoTask"));
    }

    #[test]
    fn test_registry_rejects_duplicates_across_categories() {
        let mut registry = TaskRegistry::new();
        registry
            .register(TaskBinding::periodic("SaySomethingTask", "* * * * *", noop()))
            .unwrap();

        let err = registry
            .register(TaskBinding::on_demand("SaySomethingTask", noop()))
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::Duplicate {
                name: "SaySomethingTask".to_string(),
                existing: "periodic".to_string(),
            }
        );
        assert_eq!(registry.periodic_tasks(), vec!["SaySomethingTask"]);
        assert!(registry.on_demand_tasks().is_empty());
    }

    #[test]
    fn test_registry_rejects_invalid_names() {
        let mut registry = TaskRegistry::new();
        let err = registry.register(TaskBinding::on_demand("say/hello", noop())).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName(_)));
    }
}
