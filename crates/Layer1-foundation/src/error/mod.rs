//! Error types for agent-swarm
//!
//! Run-fatal errors (validation, missing tool, config, documents) surface through
//! `Result`. Per-task failures never do: the execution engine folds them into the
//! task's terminal status instead.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// agent-swarm error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Run-fatal, raised before dispatch
    // ========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Tool not found on PATH: {0}")]
    ToolMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Task documents
    // ========================================================================
    #[error("Document error: {0}")]
    Document(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    // ========================================================================
    // Per-task execution (converted into a terminal status by the engine)
    // ========================================================================
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Task error: {0}")]
    Task(String),

    // ========================================================================
    // External conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Errors that abort the whole run before any task is dispatched
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::ToolMissing(_)
                | Error::Config(_)
                | Error::Document(_)
                | Error::UnsupportedFormat(_)
                | Error::WorkflowNotFound(_)
                | Error::Json(_)
                | Error::Yaml(_)
                | Error::Toml(_)
        )
    }

    /// Validation error helper
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Status transition error helper
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
