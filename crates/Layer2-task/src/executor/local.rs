//! Process executor - runs the external tool on the host
//!
//! Features:
//! - `<binary> -p <prompt> [--allow-all-paths] <approval flags...>`
//! - stdin disabled, working directory pinned to the workspace
//! - Hard timeout: the child leads its own process group and the whole
//!   group is killed at the deadline
//! - Output captured before a kill is kept
//! - One log file per task, written on every exit path

use crate::context::RunContext;
use crate::executor::Executor;
use crate::log::TaskLog;
use crate::task::{ExecutionResult, TaskDefinition};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use swarm_foundation::{Error, Result, SwarmConfig, DEFAULT_BINARY, DEFAULT_MODEL_ENV};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Flag that lets the tool touch any path (headless runs)
pub const ALLOW_ALL_PATHS_FLAG: &str = "--allow-all-paths";

/// How long to wait for output readers once the process is gone
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8192;

/// Resolve the tool on `PATH`
pub fn verify_tool(binary: &str) -> Result<PathBuf> {
    which::which(binary).map_err(|_| Error::ToolMissing(binary.to_string()))
}

/// Exit code of a finished process; signals map to `128 + signal`
pub fn normalize_exit(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(sig) = status.signal() {
            128 + sig
        } else {
            1
        }
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}

// ============================================================================
// Config
// ============================================================================

/// Process executor configuration
#[derive(Debug, Clone)]
pub struct ProcessExecutorConfig {
    /// Tool binary (name on PATH or path)
    pub binary: String,

    /// Append `--allow-all-paths`
    pub allow_all_paths: bool,

    /// Model passed to the child through `model_env`
    pub model: Option<String>,

    /// Variable name carrying the model
    pub model_env: String,

    /// Working directory of the child
    pub workspace: PathBuf,

    /// Grace period for collecting output after exit or kill
    pub drain_timeout: Duration,
}

impl Default for ProcessExecutorConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            allow_all_paths: false,
            model: None,
            model_env: DEFAULT_MODEL_ENV.to_string(),
            workspace: PathBuf::from("."),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ProcessExecutorConfig {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Default::default()
        }
    }

    /// Build from the merged application config
    pub fn from_config(config: &SwarmConfig) -> Self {
        Self {
            binary: config.tool.binary.clone(),
            allow_all_paths: config.tool.allow_all_paths,
            model: config.tool.model.clone(),
            model_env: config.tool.model_env.clone(),
            workspace: config.workspace_dir(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_allow_all_paths(mut self, allow: bool) -> Self {
        self.allow_all_paths = allow;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

// ============================================================================
// Process outcome
// ============================================================================

/// What happened to the child process
#[derive(Debug)]
enum ProcessOutcome {
    Exited {
        code: i32,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        stdout: String,
        stderr: String,
    },
}

/// Background reader filling a shared buffer, so partial output survives
/// an abort
struct OutputCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl OutputCapture {
    fn spawn<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let handle = reader.map(|mut reader| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; READ_CHUNK];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => buffer.lock().extend_from_slice(&chunk[..n]),
                        Err(e) => {
                            debug!("Output reader stopped: {}", e);
                            break;
                        }
                    }
                }
            })
        });

        Self { buffer, handle }
    }

    async fn finish(mut self, drain_timeout: Duration) -> String {
        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(drain_timeout, &mut handle).await.is_err() {
                // a descendant still holds the pipe open
                handle.abort();
            }
        }
        self.text()
    }

    /// Stop the reader now, keeping what it read so far
    async fn abort(mut self) -> String {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // resolves once the reader has actually stopped
            let _ = handle.await;
        }
        self.text()
    }

    fn text(&self) -> String {
        let bytes = self.buffer.lock();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        text
    }
}

// ============================================================================
// ProcessExecutor
// ============================================================================

/// Executor that runs the external tool as a local child process
pub struct ProcessExecutor {
    config: ProcessExecutorConfig,
}

impl ProcessExecutor {
    pub fn new(config: ProcessExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessExecutorConfig {
        &self.config
    }

    /// Arguments passed to the tool, in a fixed order
    pub fn command_args(&self, task: &TaskDefinition) -> Vec<String> {
        let mut args = Vec::with_capacity(3 + task.approval_args().len());
        args.push("-p".to_string());
        args.push(task.prompt().to_string());
        if self.config.allow_all_paths {
            args.push(ALLOW_ALL_PATHS_FLAG.to_string());
        }
        args.extend(task.approval_args().iter().cloned());
        args
    }

    async fn run_process(&self, task: &TaskDefinition, args: &[String]) -> Result<ProcessOutcome> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(args)
            .current_dir(&self.config.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(model) = &self.config.model {
            cmd.env(&self.config.model_env, model);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Spawn(format!("{}: {}", self.config.binary, e)))?;

        debug!(
            "Spawned {} for task {} (pid {:?})",
            self.config.binary,
            task.id(),
            child.id()
        );

        let stdout = OutputCapture::spawn(child.stdout.take());
        let stderr = OutputCapture::spawn(child.stderr.take());

        match tokio::time::timeout(task.timeout(), child.wait()).await {
            Ok(Ok(status)) => Ok(ProcessOutcome::Exited {
                code: normalize_exit(status),
                stdout: stdout.finish(self.config.drain_timeout).await,
                stderr: stderr.finish(self.config.drain_timeout).await,
            }),
            Ok(Err(e)) => {
                stdout.abort().await;
                stderr.abort().await;
                Err(e.into())
            }
            Err(_) => {
                warn!(
                    "Task {} exceeded {}s, killing process group",
                    task.id(),
                    task.timeout().as_secs()
                );
                kill_process_group(&child);
                if let Err(e) = child.kill().await {
                    debug!("Kill after timeout for task {}: {}", task.id(), e);
                }
                Ok(ProcessOutcome::TimedOut {
                    stdout: stdout.finish(self.config.drain_timeout).await,
                    stderr: stderr.finish(self.config.drain_timeout).await,
                })
            }
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(ProcessExecutorConfig::default())
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, task: &TaskDefinition, context: &RunContext) -> ExecutionResult {
        let mut result = ExecutionResult::pending(task);
        let args = self.command_args(task);
        let log_path = context.task_log_path(task.id());

        let mut log = match TaskLog::create(&log_path, task, &args) {
            Ok(log) => log,
            Err(e) => {
                let message = format!("Cannot open task log {}: {}", log_path.display(), e);
                if let Err(e) = result.finish_error(message) {
                    warn!("Task {}: {}", task.id(), e);
                }
                return result;
            }
        };
        result.log_path = Some(log_path);

        let transition = match result.start() {
            Ok(()) => match self.run_process(task, &args).await {
                Ok(ProcessOutcome::Exited {
                    code,
                    stdout,
                    stderr,
                }) => result.finish_exit(code, stdout, stderr),
                Ok(ProcessOutcome::TimedOut { stdout, stderr }) => {
                    result.finish_timeout(task.timeout(), stdout, stderr)
                }
                Err(e) => result.finish_error(e.to_string()),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = transition {
            warn!("Task {}: {}", task.id(), e);
        }

        if let Err(e) = log.write_result(&result) {
            warn!("Failed to write task log for {}: {}", task.id(), e);
        }

        result
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// SIGKILL the child's whole process group
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: the child was spawned with process_group(0), so its pid is
        // also the id of a group containing only it and its descendants.
        let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
        if rc != 0 {
            debug!(
                "killpg({}) failed: {}",
                pid,
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}
