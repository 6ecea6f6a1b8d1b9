//! Colored terminal output

use crate::cli::RunOutcome;
use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};
use swarm_task::{RunSummary, TaskStatus};

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Completed => Color::Green,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Timeout | TaskStatus::Error => Color::Yellow,
        TaskStatus::Pending | TaskStatus::Running => Color::DarkGrey,
    }
}

/// Print the end-of-run summary to stdout
pub fn print_summary(outcome: &RunOutcome) -> io::Result<()> {
    let mut stdout = io::stdout();
    render_summary(&mut stdout, outcome)?;
    stdout.flush()
}

pub fn render_summary(out: &mut impl Write, outcome: &RunOutcome) -> io::Result<()> {
    let summary = &outcome.summary;

    queue!(
        out,
        Print("\n"),
        SetForegroundColor(Color::Cyan),
        Print("=== SUMMARY ===\n"),
        ResetColor
    )?;

    if let Some(workflow) = &summary.workflow {
        queue!(out, Print(format!("Workflow: {} ({})\n", workflow, summary.mode)))?;
    }

    let width = summary
        .tasks
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0);

    for record in &summary.tasks {
        let mut detail = format!("{:.1}s", record.duration_secs);
        if let Some(code) = record.exit_code {
            detail.push_str(&format!(", exit {}", code));
        }
        if let Some(err) = &record.error {
            detail.push_str(&format!(", {}", err));
        }

        queue!(
            out,
            SetForegroundColor(status_color(record.status)),
            Print(format!(
                "{} {:<width$}  {:<9}",
                record.status.symbol(),
                record.name,
                record.status.to_string(),
                width = width
            )),
            ResetColor,
            Print(format!(" {}\n", detail))
        )?;
    }

    render_totals(out, summary)?;

    if outcome.interrupted {
        queue!(
            out,
            SetForegroundColor(Color::Yellow),
            Print("Run was interrupted; remaining tasks were not started\n"),
            ResetColor
        )?;
    }

    queue!(
        out,
        SetForegroundColor(Color::Cyan),
        Print(format!("Summary: {}\n", outcome.summary_path.display())),
        Print(format!("Logs: {}\n", outcome.run_dir.display())),
        ResetColor
    )?;
    Ok(())
}

fn render_totals(out: &mut impl Write, summary: &RunSummary) -> io::Result<()> {
    let failed_color = if summary.failed > 0 {
        Color::Red
    } else {
        Color::Reset
    };

    queue!(
        out,
        Print(format!("Total: {}  ", summary.total)),
        SetForegroundColor(Color::Green),
        Print(format!("Succeeded: {}  ", summary.succeeded)),
        SetForegroundColor(failed_color),
        Print(format!("Failed: {}\n", summary.failed)),
        ResetColor
    )?;

    let timeouts = summary.count(TaskStatus::Timeout);
    let errors = summary.count(TaskStatus::Error);
    if timeouts + errors > 0 {
        queue!(
            out,
            SetForegroundColor(Color::Yellow),
            Print(format!("  (timeout: {}, error: {})\n", timeouts, errors)),
            ResetColor
        )?;
    }

    if !summary.unresolved.is_empty() {
        queue!(
            out,
            SetForegroundColor(Color::Yellow),
            Print(format!("Unresolved: {}\n", summary.unresolved.join(", "))),
            ResetColor
        )?;
    }
    Ok(())
}

/// Tool not on PATH
pub fn print_tool_missing(binary: &str) {
    let mut stderr = io::stderr();
    let _ = queue!(
        stderr,
        SetForegroundColor(Color::Red),
        Print(format!("Error: '{}' was not found on PATH\n", binary)),
        SetForegroundColor(Color::Yellow),
        Print("Install the GitHub Copilot CLI or point --binary at it\n"),
        ResetColor
    );
    let _ = stderr.flush();
}

pub fn print_error(error: &anyhow::Error) {
    let mut stderr = io::stderr();
    let _ = queue!(
        stderr,
        SetForegroundColor(Color::Red),
        Print(format!("Error: {:#}\n", error)),
        ResetColor
    );
    let _ = stderr.flush();
}

pub fn print_notice(message: &str) {
    let mut stdout = io::stdout();
    let _ = queue!(
        stdout,
        SetForegroundColor(Color::Yellow),
        Print(format!("{}\n", message)),
        ResetColor
    );
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use swarm_task::{ExecutionMode, ResultAggregator, RunContext, RunPlan, TaskRecord};
    use tempfile::TempDir;

    fn record(id: &str, status: TaskStatus, exit_code: Option<i32>) -> TaskRecord {
        TaskRecord {
            id: id.into(),
            name: id.into(),
            status,
            duration_secs: 1.5,
            exit_code,
            error: None,
            log_file: None,
        }
    }

    fn summary(dir: &TempDir) -> RunSummary {
        let context = RunContext::with_timestamp(dir.path(), "20240101_120000").unwrap();
        let plan = RunPlan::new(Vec::new(), ExecutionMode::Sequential)
            .unwrap()
            .with_workflow("ci")
            .with_unresolved(vec!["ghost".into()]);
        let mut summary = ResultAggregator::for_plan(&context, &plan).finalize();
        summary.tasks = vec![
            record("build", TaskStatus::Completed, Some(0)),
            record("test", TaskStatus::Failed, Some(1)),
        ];
        summary.total = 2;
        summary.succeeded = 1;
        summary.failed = 1;
        summary
    }

    #[test]
    fn test_render_summary() {
        let dir = TempDir::new().unwrap();
        let outcome = RunOutcome {
            summary: summary(&dir),
            run_dir: PathBuf::from("/tmp/results/20240101_120000"),
            summary_path: PathBuf::from("/tmp/results/20240101_120000/summary.json"),
            interrupted: false,
        };

        let mut out = Vec::new();
        render_summary(&mut out, &outcome).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("=== SUMMARY ==="));
        assert!(text.contains("Workflow: ci (sequential)"));
        assert!(text.contains("✓ build"));
        assert!(text.contains("✗ test"));
        assert!(text.contains("exit 1"));
        assert!(text.contains("Failed: 1"));
        assert!(!text.contains("(timeout:"));
        assert!(text.contains("Unresolved: ghost"));
        assert!(text.contains("summary.json"));
        assert!(!text.contains("interrupted"));
    }

    #[test]
    fn test_render_failure_breakdown() {
        let dir = TempDir::new().unwrap();
        let mut summary = summary(&dir);
        summary.tasks.push(record("slow", TaskStatus::Timeout, None));
        summary.tasks.push(record("broken", TaskStatus::Error, None));
        summary.total = 4;
        summary.failed = 3;

        let mut out = Vec::new();
        render_totals(&mut out, &summary).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Failed: 3"));
        assert!(text.contains("(timeout: 1, error: 1)"));
    }

    #[test]
    fn test_render_interrupted() {
        let dir = TempDir::new().unwrap();
        let outcome = RunOutcome {
            summary: summary(&dir),
            run_dir: dir.path().to_path_buf(),
            summary_path: dir.path().join("summary.json"),
            interrupted: true,
        };

        let mut out = Vec::new();
        render_summary(&mut out, &outcome).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Run was interrupted"));
    }
}
