//! Run and task log files
//!
//! - `RunLog` - append-only, human-readable run log, mirrored to `tracing`
//! - `TaskLog` - one file per task with header, result and full transcript

use crate::state::TaskStatus;
use crate::task::{ExecutionResult, TaskDefinition};
use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use swarm_foundation::Result;
use tracing::{debug, error, info, warn};

/// Line timestamp format
const LINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const RULE: &str = "============================================================";

// ============================================================================
// RunLog
// ============================================================================

/// Log level for run log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Append-only run log
///
/// Each line is `[YYYY-MM-DD HH:MM:SS] message`. Writes never fail the run;
/// an I/O error is reported through `tracing` and the line is dropped.
pub struct RunLog {
    path: PathBuf,
    file: Mutex<File>,
    verbose: bool,
}

impl RunLog {
    /// Open (or create) the log for appending
    pub fn open(path: impl Into<PathBuf>, verbose: bool) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            verbose,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(RunLogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(RunLogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(RunLogLevel::Error, message.as_ref());
    }

    /// Only written in verbose mode
    pub fn detail(&self, message: impl AsRef<str>) {
        if self.verbose {
            self.log(RunLogLevel::Debug, message.as_ref());
        }
    }

    /// Log a terminal result with its status symbol
    pub fn result(&self, result: &ExecutionResult) {
        let status = result.status();
        let mut line = format!(
            "{} {} ({}): {}",
            status.symbol(),
            result.task_name,
            result.task_id,
            status
        );
        if let Some(code) = result.exit_code {
            line.push_str(&format!(" [exit {}]", code));
        }
        if let Some(duration) = result.duration() {
            line.push_str(&format!(" in {:.1}s", duration.as_secs_f64()));
        }
        if let Some(err) = &result.error {
            line.push_str(&format!(" - {}", err));
        }

        let level = match status {
            TaskStatus::Completed => RunLogLevel::Info,
            TaskStatus::Failed | TaskStatus::Timeout => RunLogLevel::Warn,
            _ => RunLogLevel::Error,
        };
        self.log(level, &line);

        if let Some(path) = &result.log_path {
            self.detail(format!("  log: {}", path.display()));
        }
    }

    fn log(&self, level: RunLogLevel, message: &str) {
        match level {
            RunLogLevel::Debug => debug!("{}", message),
            RunLogLevel::Info => info!("{}", message),
            RunLogLevel::Warn => warn!("{}", message),
            RunLogLevel::Error => error!("{}", message),
        }

        let line = format!("[{}] {}\n", Local::now().format(LINE_TIME_FORMAT), message);
        let mut file = self.file.lock();
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!("Failed to write run log {}: {}", self.path.display(), e);
        }
    }
}

// ============================================================================
// TaskLog
// ============================================================================

/// Scoped per-task log file
///
/// Opened before the process is spawned. If it is dropped before
/// [`TaskLog::write_result`] ran, an "interrupted" trailer is written. The
/// buffer is always flushed on drop.
pub struct TaskLog {
    path: PathBuf,
    writer: BufWriter<File>,
    finished: bool,
}

impl TaskLog {
    /// Create the file and write the task header
    pub fn create(path: impl Into<PathBuf>, task: &TaskDefinition, args: &[String]) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        let mut log = Self {
            path,
            writer: BufWriter::new(file),
            finished: false,
        };
        log.write_header(task, args)?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_header(&mut self, task: &TaskDefinition, args: &[String]) -> Result<()> {
        let w = &mut self.writer;
        writeln!(w, "{}", RULE)?;
        writeln!(w, "Task ID:     {}", task.id())?;
        writeln!(w, "Name:        {}", task.name())?;
        writeln!(w, "Description: {}", task.description())?;
        writeln!(w, "Approval:    {}", task.approval_args().join(" "))?;
        writeln!(w, "Timeout:     {}s", task.timeout().as_secs())?;
        writeln!(w, "Command:     {}", args.join(" "))?;
        writeln!(w, "Started:     {}", format_time(Utc::now()))?;
        writeln!(w, "{}", RULE)?;
        writeln!(w, "Prompt:")?;
        writeln!(w, "{}", task.prompt())?;
        writeln!(w)?;
        w.flush()?;
        Ok(())
    }

    /// Write the outcome and transcript
    pub fn write_result(&mut self, result: &ExecutionResult) -> Result<()> {
        let w = &mut self.writer;
        writeln!(w, "{}", RULE)?;
        writeln!(w, "Status:      {} {}", result.status().symbol(), result.status())?;
        if let Some(started) = result.started_at {
            writeln!(w, "Started:     {}", format_time(started))?;
        }
        if let Some(ended) = result.ended_at {
            writeln!(w, "Ended:       {}", format_time(ended))?;
        }
        if let Some(duration) = result.duration() {
            writeln!(w, "Duration:    {:.2}s", duration.as_secs_f64())?;
        }
        if let Some(code) = result.exit_code {
            writeln!(w, "Exit code:   {}", code)?;
        }
        if let Some(err) = &result.error {
            writeln!(w, "Error:       {}", err)?;
        }
        writeln!(w, "{}", RULE)?;
        writeln!(w, "--- stdout ---")?;
        write_block(w, &result.stdout)?;
        writeln!(w, "--- stderr ---")?;
        write_block(w, &result.stderr)?;
        w.flush()?;

        self.finished = true;
        Ok(())
    }
}

impl Drop for TaskLog {
    fn drop(&mut self) {
        if !self.finished {
            let _ = writeln!(self.writer, "{}", RULE);
            let _ = writeln!(
                self.writer,
                "INTERRUPTED: no result recorded ({})",
                format_time(Utc::now())
            );
        }
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush task log {}: {}", self.path.display(), e);
        }
    }
}

fn write_block(w: &mut impl Write, text: &str) -> std::io::Result<()> {
    if text.is_empty() {
        writeln!(w, "(empty)")
    } else if text.ends_with('\n') {
        write!(w, "{}", text)
    } else {
        writeln!(w, "{}", text)
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(LINE_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn task() -> TaskDefinition {
        TaskDefinition::builder("lint", "run the linter")
            .name("Lint")
            .build()
            .unwrap()
    }

    #[test]
    fn test_run_log_appends_timestamped_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");

        let log = RunLog::open(&path, false).unwrap();
        log.info("Run started");
        log.warn("Dropped reference: ghost");
        log.detail("hidden unless verbose");
        drop(log);

        let log = RunLog::open(&path, true).unwrap();
        log.detail("shown");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] Run started"));
        assert!(lines[1].ends_with("Dropped reference: ghost"));
        assert!(lines[2].ends_with("shown"));
    }

    #[test]
    fn test_task_log_records_result() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task.log");
        let task = task();

        let mut result = ExecutionResult::pending(&task);
        result.start().unwrap();
        result
            .finish_exit(0, "all clean\n".into(), String::new())
            .unwrap();

        let mut log = TaskLog::create(&path, &task, &["-p".into(), "run the linter".into()]).unwrap();
        log.write_result(&result).unwrap();
        drop(log);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Task ID:     lint"));
        assert!(content.contains("Status:      ✓ completed"));
        assert!(content.contains("Exit code:   0"));
        assert!(content.contains("all clean"));
        assert!(!content.contains("INTERRUPTED"));
    }

    #[test]
    fn test_task_log_interrupted_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task.log");

        let log = TaskLog::create(&path, &task(), &[]).unwrap();
        drop(log);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Prompt:"));
        assert!(content.contains("INTERRUPTED"));
    }
}
