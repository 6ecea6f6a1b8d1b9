//! Result aggregation and the persisted run summary

use crate::context::RunContext;
use crate::plan::{ExecutionMode, RunPlan};
use crate::state::TaskStatus;
use crate::task::ExecutionResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use swarm_foundation::{Error, Result};
use tracing::debug;
use uuid::Uuid;

/// One task's line in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl From<&ExecutionResult> for TaskRecord {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            id: result.task_id.clone(),
            name: result.task_name.clone(),
            status: result.status(),
            duration_secs: result
                .duration()
                .map(|d| d.as_secs_f64())
                .unwrap_or_default(),
            exit_code: result.exit_code,
            error: result.error.clone(),
            log_file: result.log_path.clone(),
        }
    }
}

/// Finalized outcome of a run
///
/// Records are in the order results arrived (completion order for parallel
/// runs). `succeeded + failed == total` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    pub mode: ExecutionMode,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
    pub tasks: Vec<TaskRecord>,
}

impl RunSummary {
    /// True iff every dispatched task completed (vacuously true for none)
    pub fn overall_success(&self) -> bool {
        self.failed == 0
    }

    pub fn record(&self, task_id: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|r| r.id == task_id)
    }

    /// Count of records with a given status
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|r| r.status == status).count()
    }

    /// Write as pretty JSON
    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!("Summary written to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Single writer of per-run result state
pub struct ResultAggregator {
    run_id: Uuid,
    timestamp: String,
    workflow: Option<String>,
    mode: ExecutionMode,
    unresolved: Vec<String>,
    records: Vec<TaskRecord>,
    seen: HashSet<String>,
    succeeded: usize,
}

impl ResultAggregator {
    pub fn new(context: &RunContext, mode: ExecutionMode) -> Self {
        Self {
            run_id: context.run_id(),
            timestamp: context.timestamp().to_string(),
            workflow: None,
            mode,
            unresolved: Vec::new(),
            records: Vec::new(),
            seen: HashSet::new(),
            succeeded: 0,
        }
    }

    /// Aggregator carrying a plan's metadata
    pub fn for_plan(context: &RunContext, plan: &RunPlan) -> Self {
        let mut aggregator = Self::new(context, plan.mode());
        aggregator.workflow = plan.workflow().map(str::to_string);
        aggregator.unresolved = plan.unresolved().to_vec();
        aggregator
    }

    /// Add a terminal result; duplicates and non-terminal results are rejected
    pub fn record(&mut self, result: &ExecutionResult) -> Result<()> {
        let status = result.status();
        if !status.is_terminal() {
            return Err(Error::Task(format!(
                "Result for {} is not terminal ({})",
                result.task_id, status
            )));
        }
        if !self.seen.insert(result.task_id.clone()) {
            return Err(Error::Task(format!(
                "Result for {} already recorded",
                result.task_id
            )));
        }

        if status.is_success() {
            self.succeeded += 1;
        }
        self.records.push(TaskRecord::from(result));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded
    }

    pub fn overall_success(&self) -> bool {
        self.failed() == 0
    }

    /// Freeze into a summary
    pub fn finalize(self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            timestamp: self.timestamp,
            workflow: self.workflow,
            mode: self.mode,
            total: self.records.len(),
            succeeded: self.succeeded,
            failed: self.records.len() - self.succeeded,
            unresolved: self.unresolved,
            tasks: self.records,
        }
    }
}
