//! # swarm-task
//!
//! Orchestration engine for agent-swarm: runs many invocations of an external
//! coding-assistant CLI, sequentially or under bounded concurrency.
//!
//! ## Features
//!
//! - Immutable task definitions with validated approval flags
//! - Process executor with hard, process-group timeouts and per-task logs
//! - Sequential (fail-fast optional) and parallel scheduling
//! - Single-writer aggregation into a persisted run summary
//! - JSON/YAML task and workflow documents

pub mod aggregator;
pub mod context;
pub mod document;
pub mod executor;
pub mod log;
pub mod plan;
pub mod scheduler;
pub mod state;
pub mod task;

// Task model
pub use plan::{ExecutionMode, RunPlan};
pub use state::TaskStatus;
pub use task::{
    ApprovalPolicy, ExecutionResult, TaskDefinition, TaskDefinitionBuilder, DEFAULT_TIMEOUT_SECS,
};

// Execution
pub use executor::{
    normalize_exit, verify_tool, Executor, ProcessExecutor, ProcessExecutorConfig,
};
pub use scheduler::{Scheduler, DEFAULT_MAX_WORKERS};

// Results and logs
pub use aggregator::{ResultAggregator, RunSummary, TaskRecord};
pub use context::RunContext;
pub use log::{RunLog, TaskLog};

// Documents
pub use document::{DocumentFormat, TaskDefaults, TaskDocument, WorkflowDefinition};
