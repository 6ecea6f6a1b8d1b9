//! Task definition and execution result types

use crate::state::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use swarm_foundation::{Error, Result, DEFAULT_APPROVAL};

/// Default per-task timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// ApprovalPolicy
// ============================================================================

/// Flags controlling what the external tool may do without asking
///
/// Accepts either a single flag string (`"--allow-tool 'shell(git)'"`) or an
/// ordered list of flags (`["--allow-tool", "shell(git)"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApprovalPolicy {
    Flag(String),
    Flags(Vec<String>),
}

impl ApprovalPolicy {
    /// Flatten into argument tokens, in order
    ///
    /// A flag string is split with POSIX shell-word rules. A list is taken
    /// as-is, minus empty entries.
    pub fn flatten(&self) -> Result<Vec<String>> {
        match self {
            ApprovalPolicy::Flag(flag) => shlex::split(flag).ok_or_else(|| {
                Error::validation(format!("Unbalanced quotes in approval flags: {}", flag))
            }),
            ApprovalPolicy::Flags(flags) => Ok(flags
                .iter()
                .filter(|f| !f.trim().is_empty())
                .cloned()
                .collect()),
        }
    }
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        ApprovalPolicy::Flag(DEFAULT_APPROVAL.to_string())
    }
}

impl From<&str> for ApprovalPolicy {
    fn from(flag: &str) -> Self {
        ApprovalPolicy::Flag(flag.to_string())
    }
}

impl From<String> for ApprovalPolicy {
    fn from(flag: String) -> Self {
        ApprovalPolicy::Flag(flag)
    }
}

impl From<Vec<String>> for ApprovalPolicy {
    fn from(flags: Vec<String>) -> Self {
        ApprovalPolicy::Flags(flags)
    }
}

impl std::fmt::Display for ApprovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalPolicy::Flag(flag) => write!(f, "{}", flag),
            ApprovalPolicy::Flags(flags) => write!(f, "{}", flags.join(" ")),
        }
    }
}

// ============================================================================
// TaskDefinition
// ============================================================================

/// One unit of work: a single invocation of the external tool
///
/// Immutable once built; use [`TaskDefinition::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    id: String,
    name: String,
    prompt: String,
    approval: ApprovalPolicy,
    approval_args: Vec<String>,
    timeout: Duration,
    description: String,
}

impl TaskDefinition {
    /// Start building a task
    pub fn builder(id: impl Into<String>, prompt: impl Into<String>) -> TaskDefinitionBuilder {
        TaskDefinitionBuilder {
            id: id.into(),
            prompt: prompt.into(),
            name: None,
            approval: ApprovalPolicy::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            description: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn approval(&self) -> &ApprovalPolicy {
        &self.approval
    }

    /// Approval flags flattened into argument tokens
    pub fn approval_args(&self) -> &[String] {
        &self.approval_args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for [`TaskDefinition`]
#[derive(Debug, Clone)]
pub struct TaskDefinitionBuilder {
    id: String,
    prompt: String,
    name: Option<String>,
    approval: ApprovalPolicy,
    timeout_secs: u64,
    description: Option<String>,
}

impl TaskDefinitionBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn approval(mut self, approval: impl Into<ApprovalPolicy>) -> Self {
        self.approval = approval.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<TaskDefinition> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(Error::validation("Task id must not be empty"));
        }
        if self.prompt.trim().is_empty() {
            return Err(Error::validation(format!("Task '{}' has an empty prompt", id)));
        }
        if self.timeout_secs == 0 {
            return Err(Error::validation(format!(
                "Task '{}' timeout must be greater than 0",
                id
            )));
        }

        let approval_args = self
            .approval
            .flatten()
            .map_err(|e| Error::validation(format!("Task '{}': {}", id, e)))?;

        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| self.prompt.clone());

        Ok(TaskDefinition {
            id,
            name,
            prompt: self.prompt,
            approval: self.approval,
            approval_args,
            timeout: Duration::from_secs(self.timeout_secs),
            description,
        })
    }
}

// ============================================================================
// ExecutionResult
// ============================================================================

/// Outcome of one task execution
///
/// Created `pending` at dispatch and moved to a terminal status exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub task_id: String,
    pub task_name: String,
    status: TaskStatus,

    /// Present only for completed/failed
    pub exit_code: Option<i32>,

    pub stdout: String,
    pub stderr: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,

    /// Human-readable message for timeout/error
    pub error: Option<String>,

    pub log_path: Option<PathBuf>,
}

impl ExecutionResult {
    /// New pending result for a task
    pub fn pending(task: &TaskDefinition) -> Self {
        Self {
            task_id: task.id().to_string(),
            task_name: task.name().to_string(),
            status: TaskStatus::Pending,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            started_at: None,
            ended_at: None,
            error: None,
            log_path: None,
        }
    }

    /// Result that went straight to `error` (e.g. the executor panicked)
    pub fn errored(task: &TaskDefinition, message: impl Into<String>) -> Self {
        let mut result = Self::pending(task);
        result.status = TaskStatus::Error;
        result.error = Some(message.into());
        result.ended_at = Some(Utc::now());
        result
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Mark as running
    pub fn start(&mut self) -> Result<()> {
        self.status = self.status.transition(TaskStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Process exited: 0 is completed, anything else failed
    pub fn finish_exit(&mut self, exit_code: i32, stdout: String, stderr: String) -> Result<()> {
        let next = if exit_code == 0 {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        self.finish(next)?;
        self.exit_code = Some(exit_code);
        self.stdout = stdout;
        self.stderr = stderr;
        Ok(())
    }

    /// Process was killed at its deadline
    pub fn finish_timeout(&mut self, timeout: Duration, stdout: String, stderr: String) -> Result<()> {
        self.finish(TaskStatus::Timeout)?;
        self.error = Some(format!("Timed out after {}s", timeout.as_secs()));
        self.stdout = stdout;
        self.stderr = stderr;
        Ok(())
    }

    /// Spawn or OS-level failure
    pub fn finish_error(&mut self, message: impl Into<String>) -> Result<()> {
        self.finish(TaskStatus::Error)?;
        self.error = Some(message.into());
        Ok(())
    }

    fn finish(&mut self, next: TaskStatus) -> Result<()> {
        self.status = self.status.transition(next)?;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Wall-clock duration, once both ends are known
    pub fn duration(&self) -> Option<Duration> {
        let start = self.started_at?;
        let end = self.ended_at?;
        Some((end - start).to_std().unwrap_or_default())
    }
}
