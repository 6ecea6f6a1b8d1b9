//! agent-swarm CLI - Main entry point

mod cli;
mod interactive;
mod report;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use swarm_foundation::Error;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// agent-swarm - run coding-assistant CLI tasks sequentially or in parallel
#[derive(Parser, Debug)]
#[command(name = "swarm")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Options shared by every subcommand
#[derive(clap::Args, Debug, Default, Clone)]
pub struct GlobalOpts {
    /// Root directory for run results
    #[arg(short = 'd', long, global = true)]
    pub results_dir: Option<PathBuf>,

    /// Verbose output (prompts, flags and log paths)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Worker pool size for parallel runs
    #[arg(long, global = true)]
    pub max_workers: Option<usize>,

    /// Working directory for the tool
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Model for the tool (passed through COPILOT_MODEL)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Tool binary to invoke
    #[arg(long, global = true)]
    pub binary: Option<String>,

    /// Extra config file, applied over user and project config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single ad hoc task
    Single {
        /// Task name
        name: String,
        /// Task prompt
        prompt: String,
        /// Approval flags
        #[arg(long)]
        approval: Option<String>,
        /// Task timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run tasks from a JSON or YAML file (tasks/workflows, or an agents list)
    FromFile {
        /// Task definition file
        file: PathBuf,
        /// Workflow to run
        #[arg(long, conflicts_with = "tasks")]
        workflow: Option<String>,
        /// Specific task ids to run
        #[arg(long, num_args = 1..)]
        tasks: Vec<String>,
        /// Run one task at a time
        #[arg(long)]
        sequential: bool,
        /// Stop a sequential run at the first failure
        #[arg(long)]
        stop_on_failure: bool,
    },
    /// Spawn one parallel agent per prompt
    Quick {
        /// Agent prompts
        #[arg(required = true)]
        prompts: Vec<String>,
        /// Approval flags for all agents
        #[arg(long)]
        approval: Option<String>,
        /// Per-agent timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Enter agents one by one on stdin, then run them in parallel
    Interactive {
        /// Default approval flags
        #[arg(long)]
        approval: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.global.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<Error>() {
                Some(Error::ToolMissing(binary)) => report::print_tool_missing(binary),
                Some(err) if err.is_run_fatal() => {
                    report::print_error(&e);
                    report::print_notice("No tasks were started");
                }
                _ => report::print_error(&e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = cli::load_config(&args.global)?;
    let tool = swarm_task::verify_tool(&config.tool.binary)?;
    debug!(
        "Using {} ({} workers, results in {})",
        tool.display(),
        config.run.max_workers,
        config.run.results_dir.display()
    );

    let (config, plan) = match args.command {
        Command::Single {
            name,
            prompt,
            approval,
            timeout,
        } => {
            let plan = cli::single_plan(&config, &name, &prompt, approval, timeout)?;
            (config, plan)
        }
        Command::FromFile {
            file,
            workflow,
            tasks,
            sequential,
            stop_on_failure,
        } => {
            let selection = cli::FileSelection {
                workflow,
                tasks,
                sequential,
                stop_on_failure,
            };
            cli::file_plan(config, &file, &selection)?
        }
        Command::Quick {
            prompts,
            approval,
            timeout,
        } => cli::quick_plan(config, &prompts, approval, timeout)?,
        Command::Interactive { approval } => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let entered = interactive::read_agents(stdin.lock(), stdout.lock(), &config, approval)?;
            match entered {
                interactive::Entry::Cancelled => {
                    report::print_notice("Cancelled");
                    return Ok(ExitCode::FAILURE);
                }
                interactive::Entry::Agents(tasks) if tasks.is_empty() => {
                    report::print_notice("No agents created");
                    return Ok(ExitCode::SUCCESS);
                }
                interactive::Entry::Agents(tasks) => cli::agents_plan(config, tasks)?,
            }
        }
    };

    let outcome = cli::execute(&config, plan, args.global.verbose).await?;
    report::print_summary(&outcome)?;

    if outcome.summary.overall_success() && !outcome.interrupted {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "swarm", "single", "build", "fix it", "--timeout", "30", "-v", "--max-workers", "2",
        ])
        .unwrap();

        assert!(args.global.verbose);
        assert_eq!(args.global.max_workers, Some(2));
        match args.command {
            Command::Single { name, timeout, .. } => {
                assert_eq!(name, "build");
                assert_eq!(timeout, Some(30));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_from_file_task_list() {
        let args = Args::try_parse_from([
            "swarm", "from-file", "tasks.yaml", "--tasks", "a", "b", "--sequential",
        ])
        .unwrap();

        match args.command {
            Command::FromFile {
                tasks, sequential, ..
            } => {
                assert_eq!(tasks, ["a", "b"]);
                assert!(sequential);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_workflow_conflicts_with_tasks() {
        let result = Args::try_parse_from([
            "swarm", "from-file", "t.json", "--workflow", "ci", "--tasks", "a",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quick_requires_prompts() {
        assert!(Args::try_parse_from(["swarm", "quick"]).is_err());
        assert!(Args::try_parse_from(["swarm", "quick", "one", "two"]).is_ok());
    }
}
