//! Run plan - the validated input to the scheduler

use crate::task::TaskDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use swarm_foundation::{Error, Result};

/// How a plan's tasks are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One at a time, in declared order
    #[default]
    Sequential,

    /// Bounded worker pool, completion order
    Parallel,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Ordered, validated set of tasks plus dispatch policy
#[derive(Debug, Clone)]
pub struct RunPlan {
    tasks: Vec<TaskDefinition>,
    mode: ExecutionMode,
    stop_on_failure: bool,
    workflow: Option<String>,
    unresolved: Vec<String>,
}

impl RunPlan {
    /// Create a plan; task ids must be unique
    pub fn new(tasks: Vec<TaskDefinition>, mode: ExecutionMode) -> Result<Self> {
        let mut seen = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            if !seen.insert(task.id()) {
                return Err(Error::validation(format!(
                    "Duplicate task id in plan: {}",
                    task.id()
                )));
            }
        }

        Ok(Self {
            tasks,
            mode,
            stop_on_failure: false,
            workflow: None,
            unresolved: Vec::new(),
        })
    }

    /// Halt a sequential run at the first non-completed task
    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    pub fn with_workflow(mut self, name: impl Into<String>) -> Self {
        self.workflow = Some(name.into());
        self
    }

    /// References that could not be resolved to a task
    pub fn with_unresolved(mut self, unresolved: Vec<String>) -> Self {
        self.unresolved = unresolved;
        self
    }

    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<TaskDefinition> {
        self.tasks
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn stop_on_failure(&self) -> bool {
        self.stop_on_failure
    }

    pub fn workflow(&self) -> Option<&str> {
        self.workflow.as_deref()
    }

    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> TaskDefinition {
        TaskDefinition::builder(id, format!("prompt for {}", id))
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = RunPlan::new(vec![task("a"), task("b"), task("a")], ExecutionMode::Parallel)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_plan_keeps_order() {
        let plan = RunPlan::new(vec![task("b"), task("a")], ExecutionMode::Sequential)
            .unwrap()
            .with_stop_on_failure(true)
            .with_workflow("ci");

        let ids: Vec<&str> = plan.tasks().iter().map(|t| t.id()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert!(plan.stop_on_failure());
        assert_eq!(plan.workflow(), Some("ci"));
    }

    #[test]
    fn test_mode_serde() {
        let mode: ExecutionMode = serde_json::from_str("\"parallel\"").unwrap();
        assert_eq!(mode, ExecutionMode::Parallel);
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::Parallel.to_string(), "parallel");
    }
}
