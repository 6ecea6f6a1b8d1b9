//! Swarm Config - settings for the external tool and for runs

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Binary invoked for every task
pub const DEFAULT_BINARY: &str = "copilot";

/// Approval flag applied when a task does not specify one
pub const DEFAULT_APPROVAL: &str = "--allow-all-tools";

/// Timeout for quick, interactive and agent-list tasks
pub const DEFAULT_QUICK_TIMEOUT_SECS: u64 = 900;

/// Environment variable the external tool reads its model from
pub const DEFAULT_MODEL_ENV: &str = "COPILOT_MODEL";

// ============================================================================
// SwarmConfig
// ============================================================================

/// Complete configuration, merged from files, env and CLI flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// External tool settings
    pub tool: ToolConfig,

    /// Run settings
    pub run: RunConfig,
}

impl SwarmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject values the scheduler or engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.tool.binary.trim().is_empty() {
            return Err(Error::Config("tool.binary must not be empty".to_string()));
        }
        if self.run.max_workers == 0 {
            return Err(Error::Config("run.max_workers must be at least 1".to_string()));
        }
        if self.run.default_timeout_secs == 0 {
            return Err(Error::Config(
                "run.default_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.run.quick_timeout_secs == 0 {
            return Err(Error::Config(
                "run.quick_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `SWARM_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply `SWARM_*` overrides using a custom lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(binary) = non_empty("SWARM_BINARY") {
            self.tool.binary = binary;
        }
        if let Some(model) = non_empty("SWARM_MODEL") {
            self.tool.model = Some(model);
        }
        if let Some(dir) = non_empty("SWARM_RESULTS_DIR") {
            self.run.results_dir = PathBuf::from(dir);
        }
        if let Some(workers) = non_empty("SWARM_MAX_WORKERS") {
            self.run.max_workers = workers.trim().parse().map_err(|_| {
                Error::Config(format!("SWARM_MAX_WORKERS is not a number: {}", workers))
            })?;
        }
        Ok(())
    }

    /// Workspace the external tool runs in (falls back to the current directory)
    pub fn workspace_dir(&self) -> PathBuf {
        self.run
            .workspace
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

// ============================================================================
// Tool
// ============================================================================

/// How the external tool is invoked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Binary name or path, resolved on PATH
    pub binary: String,

    /// Pass `--allow-all-paths` (needed for fully headless runs)
    pub allow_all_paths: bool,

    /// Model handed to the tool through `model_env`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Name of the variable carrying the model
    pub model_env: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            allow_all_paths: false,
            model: None,
            model_env: DEFAULT_MODEL_ENV.to_string(),
        }
    }
}

// ============================================================================
// Run
// ============================================================================

/// Scheduling and persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Root directory; each run gets a timestamped subdirectory
    pub results_dir: PathBuf,

    /// Worker pool size for parallel runs
    pub max_workers: usize,

    /// Working directory for the external tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    /// Timeout for tasks that do not set one
    pub default_timeout_secs: u64,

    /// Timeout for tasks spawned by `quick` / `interactive`
    pub quick_timeout_secs: u64,

    /// Approval flags for tasks that do not set any
    pub default_approval: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("./copilot-results"),
            max_workers: 4,
            workspace: None,
            default_timeout_secs: 120,
            quick_timeout_secs: DEFAULT_QUICK_TIMEOUT_SECS,
            default_approval: DEFAULT_APPROVAL.to_string(),
        }
    }
}
