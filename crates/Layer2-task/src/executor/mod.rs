//! Task executors
//!
//! - `Executor` - the seam the scheduler drives
//! - `ProcessExecutor` - runs the external tool as a child process with a
//!   hard timeout and a per-task log

pub mod local;
pub mod r#trait;

pub use local::{normalize_exit, verify_tool, ProcessExecutor, ProcessExecutorConfig};
pub use r#trait::Executor;
