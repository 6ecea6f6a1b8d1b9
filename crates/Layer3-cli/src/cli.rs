//! Run setup - config, plans and execution

use crate::GlobalOpts;
use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swarm_foundation::{ConfigLoader, SwarmConfig};
use swarm_task::{
    ExecutionMode, ProcessExecutor, ProcessExecutorConfig, RunContext, RunLog, RunPlan,
    RunSummary, Scheduler, TaskDefaults, TaskDefinition, TaskDocument,
};
use tokio_util::sync::CancellationToken;

/// Explicit config files outrank user and project config
const EXPLICIT_CONFIG_PRIORITY: u8 = 100;

/// Finished run, ready for reporting
pub struct RunOutcome {
    pub summary: RunSummary,
    pub run_dir: PathBuf,
    pub summary_path: PathBuf,
    pub interrupted: bool,
}

/// Files, then `SWARM_*` env, then flags
pub fn load_config(opts: &GlobalOpts) -> anyhow::Result<SwarmConfig> {
    let working_dir = match &opts.workspace {
        Some(workspace) => workspace.clone(),
        None => std::env::current_dir().context("Cannot determine current directory")?,
    };

    let mut loader = ConfigLoader::new(&working_dir);
    if let Some(path) = &opts.config {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }
        loader.add_path(path.clone(), EXPLICIT_CONFIG_PRIORITY);
    }

    let mut config = loader.load()?;
    config.apply_env()?;
    apply_flags(&mut config, opts);
    config.validate()?;
    Ok(config)
}

fn apply_flags(config: &mut SwarmConfig, opts: &GlobalOpts) {
    if let Some(dir) = &opts.results_dir {
        config.run.results_dir = dir.clone();
    }
    if let Some(workers) = opts.max_workers {
        config.run.max_workers = workers.max(1);
    }
    if let Some(workspace) = &opts.workspace {
        config.run.workspace = Some(workspace.clone());
    }
    if let Some(model) = &opts.model {
        config.tool.model = Some(model.clone());
    }
    if let Some(binary) = &opts.binary {
        config.tool.binary = binary.clone();
    }
}

// ============================================================================
// Plans
// ============================================================================

/// One ad hoc task
pub fn single_plan(
    config: &SwarmConfig,
    name: &str,
    prompt: &str,
    approval: Option<String>,
    timeout: Option<u64>,
) -> anyhow::Result<RunPlan> {
    let task = TaskDefinition::builder(name, prompt)
        .name(name)
        .approval(approval.unwrap_or_else(|| config.run.default_approval.clone()))
        .timeout_secs(timeout.unwrap_or(config.run.default_timeout_secs))
        .build()?;

    Ok(RunPlan::new(vec![task], ExecutionMode::Sequential)?)
}

/// Which part of a task document to run
#[derive(Debug, Default)]
pub struct FileSelection {
    pub workflow: Option<String>,
    pub tasks: Vec<String>,
    pub sequential: bool,
    pub stop_on_failure: bool,
}

/// Plan from a task document
///
/// A workflow keeps its own mode unless `sequential` is set. Explicit ids
/// (or all tasks) run in parallel unless `sequential` is set. Agent lists
/// run with any path allowed, like `quick`.
pub fn file_plan(
    mut config: SwarmConfig,
    file: &Path,
    selection: &FileSelection,
) -> anyhow::Result<(SwarmConfig, RunPlan)> {
    let defaults = TaskDefaults::from_config(&config.run);
    let document = TaskDocument::load(file, &defaults)?;
    if document.has_agents() {
        config.tool.allow_all_paths = true;
    }

    let plan = match &selection.workflow {
        Some(workflow) => document.workflow_plan(
            workflow,
            selection.sequential.then_some(ExecutionMode::Sequential),
            selection.stop_on_failure,
        )?,
        None => {
            let mode = if selection.sequential {
                ExecutionMode::Sequential
            } else {
                ExecutionMode::Parallel
            };
            document.tasks_plan(&selection.tasks, mode, selection.stop_on_failure)?
        }
    };
    Ok((config, plan))
}

/// Parallel agents `agent-0..N`, allowed to touch any path
pub fn quick_plan(
    mut config: SwarmConfig,
    prompts: &[String],
    approval: Option<String>,
    timeout: Option<u64>,
) -> anyhow::Result<(SwarmConfig, RunPlan)> {
    config.tool.allow_all_paths = true;
    let approval = approval.unwrap_or_else(|| config.run.default_approval.clone());
    let timeout = timeout.unwrap_or(config.run.quick_timeout_secs);

    let tasks = prompts
        .iter()
        .enumerate()
        .map(|(i, prompt)| {
            TaskDefinition::builder(format!("agent-{}", i), prompt.as_str())
                .approval(approval.as_str())
                .timeout_secs(timeout)
                .build()
        })
        .collect::<swarm_foundation::Result<Vec<_>>>()?;

    let plan = RunPlan::new(tasks, ExecutionMode::Parallel)?;
    Ok((config, plan))
}

/// Parallel plan for interactively entered agents
pub fn agents_plan(
    mut config: SwarmConfig,
    tasks: Vec<TaskDefinition>,
) -> anyhow::Result<(SwarmConfig, RunPlan)> {
    config.tool.allow_all_paths = true;
    let plan = RunPlan::new(tasks, ExecutionMode::Parallel)?;
    Ok((config, plan))
}

// ============================================================================
// Execution
// ============================================================================

/// Run a plan; Ctrl-C stops dispatch, a second Ctrl-C exits immediately
pub async fn execute(
    config: &SwarmConfig,
    plan: RunPlan,
    verbose: bool,
) -> anyhow::Result<RunOutcome> {
    let context = Arc::new(
        RunContext::create(&config.run.results_dir).with_context(|| {
            format!(
                "Cannot create results directory {}",
                config.run.results_dir.display()
            )
        })?,
    );
    let run_log = Arc::new(RunLog::open(context.run_log_path(), verbose)?);

    run_log.info(format!("Results: {}", context.run_dir().display()));
    if let Some(model) = &config.tool.model {
        run_log.info(format!("Model: {}", model));
    }
    run_log.detail(format!(
        "Tool: {} (workspace {})",
        config.tool.binary,
        config.workspace_dir().display()
    ));

    let executor = Arc::new(ProcessExecutor::new(ProcessExecutorConfig::from_config(
        config,
    )));
    let cancel = CancellationToken::new();
    let scheduler = Scheduler::new(executor, Arc::clone(&context), Arc::clone(&run_log))
        .with_max_workers(config.run.max_workers)
        .with_cancellation(cancel.clone());

    let signals = {
        let cancel = cancel.clone();
        let run_log = Arc::clone(&run_log);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            run_log.warn("Interrupted: no new tasks will start, running tasks finish or time out");
            cancel.cancel();

            if tokio::signal::ctrl_c().await.is_ok() {
                run_log.error("Interrupted again, exiting");
                std::process::exit(130);
            }
        })
    };

    let summary = scheduler.run(plan).await;
    signals.abort();
    let summary = summary?;

    Ok(RunOutcome {
        summary,
        run_dir: context.run_dir().to_path_buf(),
        summary_path: context.summary_path(),
        interrupted: cancel.is_cancelled(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DOC: &str = r#"
tasks:
  build:
    prompt: Fix the build
  test:
    prompt: Run the tests
    timeout: 600
workflows:
  ci:
    tasks: [build, test]
    mode: parallel
"#;

    fn write_doc(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("tasks.yaml");
        fs::write(&path, DOC).unwrap();
        path
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = SwarmConfig::default();
        let opts = GlobalOpts {
            results_dir: Some(PathBuf::from("/tmp/out")),
            max_workers: Some(0),
            model: Some("gpt-5".into()),
            binary: Some("copilot-nightly".into()),
            ..Default::default()
        };

        apply_flags(&mut config, &opts);

        assert_eq!(config.run.results_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.run.max_workers, 1);
        assert_eq!(config.tool.model.as_deref(), Some("gpt-5"));
        assert_eq!(config.tool.binary, "copilot-nightly");
    }

    #[test]
    fn test_explicit_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("swarm.toml");
        fs::write(&path, "[run]\nmax_workers = 7\n").unwrap();
        let opts = GlobalOpts {
            workspace: Some(dir.path().to_path_buf()),
            config: Some(path),
            ..Default::default()
        };

        let config = load_config(&opts).unwrap();
        assert_eq!(config.run.max_workers, 7);
        assert_eq!(config.run.workspace.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_missing_config_file() {
        let dir = TempDir::new().unwrap();
        let opts = GlobalOpts {
            workspace: Some(dir.path().to_path_buf()),
            config: Some(dir.path().join("nope.toml")),
            ..Default::default()
        };
        assert!(load_config(&opts).is_err());
    }

    #[test]
    fn test_single_plan_uses_config_defaults() {
        let mut config = SwarmConfig::default();
        config.run.default_timeout_secs = 42;

        let plan = single_plan(&config, "lint", "run the linter", None, None).unwrap();
        let task = &plan.tasks()[0];
        assert_eq!(task.id(), "lint");
        assert_eq!(task.timeout().as_secs(), 42);
        assert_eq!(task.approval_args(), ["--allow-all-tools"]);
    }

    #[test]
    fn test_single_plan_rejects_empty_prompt() {
        let config = SwarmConfig::default();
        assert!(single_plan(&config, "lint", " ", None, None).is_err());
    }

    #[test]
    fn test_file_plan_modes() {
        let dir = TempDir::new().unwrap();
        let file = write_doc(&dir);
        let plan_for = |selection: &FileSelection| {
            file_plan(SwarmConfig::default(), &file, selection).unwrap().1
        };

        let workflow = FileSelection {
            workflow: Some("ci".into()),
            ..Default::default()
        };
        assert_eq!(plan_for(&workflow).mode(), ExecutionMode::Parallel);

        let forced = FileSelection {
            workflow: Some("ci".into()),
            sequential: true,
            stop_on_failure: true,
            ..Default::default()
        };
        let plan = plan_for(&forced);
        assert_eq!(plan.mode(), ExecutionMode::Sequential);
        assert!(plan.stop_on_failure());

        let all = plan_for(&FileSelection::default());
        assert_eq!(all.mode(), ExecutionMode::Parallel);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_file_plan_unknown_workflow() {
        let dir = TempDir::new().unwrap();
        let file = write_doc(&dir);
        let selection = FileSelection {
            workflow: Some("nightly".into()),
            ..Default::default()
        };
        assert!(file_plan(SwarmConfig::default(), &file, &selection).is_err());
    }

    #[test]
    fn test_file_plan_agent_list() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("agents.json");
        fs::write(
            &file,
            r#"{"agents": [{"name": "docs", "task": "Update docs"}, {"name": "lint", "task": "Lint"}]}"#,
        )
        .unwrap();

        let (config, plan) =
            file_plan(SwarmConfig::default(), &file, &FileSelection::default()).unwrap();

        assert!(config.tool.allow_all_paths);
        assert_eq!(plan.mode(), ExecutionMode::Parallel);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.tasks()[1].name(), "lint");
        assert_eq!(plan.tasks()[1].timeout().as_secs(), 900);
    }

    #[test]
    fn test_file_plan_unrecognized_document() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("other.json");
        fs::write(&file, r#"{"jobs": [{"task": "x"}]}"#).unwrap();

        let err = file_plan(SwarmConfig::default(), &file, &FileSelection::default()).unwrap_err();
        assert!(err.to_string().contains("'jobs'"));
    }

    #[test]
    fn test_quick_plan() {
        let prompts = vec!["write docs".to_string(), "add tests".to_string()];
        let (config, plan) = quick_plan(SwarmConfig::default(), &prompts, None, None).unwrap();

        assert!(config.tool.allow_all_paths);
        assert_eq!(plan.mode(), ExecutionMode::Parallel);
        let ids: Vec<&str> = plan.tasks().iter().map(|t| t.id()).collect();
        assert_eq!(ids, ["agent-0", "agent-1"]);
        assert_eq!(plan.tasks()[0].timeout().as_secs(), 900);
    }
}
