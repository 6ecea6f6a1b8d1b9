//! Executor trait

use crate::context::RunContext;
use crate::task::{ExecutionResult, TaskDefinition};
use async_trait::async_trait;

/// Executor trait - implement to add new execution backends
///
/// `execute` never fails: spawn errors, timeouts and nonzero exits are all
/// folded into the returned result's terminal status.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute one task to a terminal status
    async fn execute(&self, task: &TaskDefinition, context: &RunContext) -> ExecutionResult;

    /// Get executor name
    fn name(&self) -> &'static str;
}
