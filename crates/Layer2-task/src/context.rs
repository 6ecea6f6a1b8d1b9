//! Run context - per-run identity and file layout
//!
//! ```text
//! <results_dir>/<timestamp>[_<n>]/
//!   run_<timestamp>.log
//!   task_<encoded id>_<timestamp>.log
//!   summary.json
//! ```

use chrono::Local;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use swarm_foundation::Result;
use tracing::debug;
use uuid::Uuid;

/// Timestamp format used for directory and file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Summary document name inside a run directory
pub const SUMMARY_FILE: &str = "summary.json";

/// One run's identity and paths
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    timestamp: String,
    started: Instant,
    run_dir: PathBuf,
}

impl RunContext {
    /// Create the run directory under `results_dir` using the current time
    pub fn create(results_dir: impl AsRef<Path>) -> Result<Self> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::with_timestamp(results_dir, timestamp)
    }

    /// Create the run directory with an explicit timestamp
    ///
    /// If another run already owns `<timestamp>`, the first free
    /// `<timestamp>_<n>` is used instead.
    pub fn with_timestamp(results_dir: impl AsRef<Path>, timestamp: impl Into<String>) -> Result<Self> {
        let timestamp = timestamp.into();
        let run_dir = claim_run_dir(results_dir.as_ref(), &timestamp)?;

        Ok(Self {
            run_id: Uuid::new_v4(),
            timestamp,
            started: Instant::now(),
            run_dir,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.run_dir.join(format!("run_{}.log", self.timestamp))
    }

    pub fn task_log_path(&self, task_id: &str) -> PathBuf {
        self.run_dir
            .join(format!("task_{}_{}.log", sanitize_id(task_id), self.timestamp))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.run_dir.join(SUMMARY_FILE)
    }
}

/// Create a run directory nobody else holds
fn claim_run_dir(results_dir: &Path, timestamp: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(results_dir)?;

    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            timestamp.to_string()
        } else {
            format!("{}_{}", timestamp, attempt)
        };
        let candidate = results_dir.join(name);
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Run directory {} taken", candidate.display());
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// File-name form of a task id
///
/// `[A-Za-z0-9._-]` is kept; every other byte becomes `%XX`, so distinct ids
/// always give distinct names. A name made only of dots is encoded entirely.
pub fn sanitize_id(id: &str) -> String {
    let all_dots = !id.is_empty() && id.bytes().all(|b| b == b'.');

    let mut encoded = String::with_capacity(id.len());
    for byte in id.bytes() {
        let keep = !all_dots && (byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-'));
        if keep {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}
