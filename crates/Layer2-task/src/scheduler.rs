//! Scheduler - dispatches a run plan to an executor
//!
//! ## Modes
//!
//! - **Sequential**: declared order, one task at a time, optional
//!   stop-on-failure.
//! - **Parallel**: bounded worker pool (`Semaphore`), results collected in
//!   completion order through a single channel consumer.
//!
//! ## Cancellation
//!
//! Cancelling the token stops dispatch of tasks that have not started.
//! Tasks already running are not preempted; they finish on their own or at
//! their timeout.

use crate::aggregator::{ResultAggregator, RunSummary};
use crate::context::RunContext;
use crate::executor::Executor;
use crate::log::RunLog;
use crate::plan::{ExecutionMode, RunPlan};
use crate::task::{ExecutionResult, TaskDefinition};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use swarm_foundation::Result;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Default worker pool size
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Runs plans against an executor
pub struct Scheduler {
    executor: Arc<dyn Executor>,
    context: Arc<RunContext>,
    run_log: Arc<RunLog>,
    max_workers: usize,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(executor: Arc<dyn Executor>, context: Arc<RunContext>, run_log: Arc<RunLog>) -> Self {
        Self {
            executor,
            context,
            run_log,
            max_workers: DEFAULT_MAX_WORKERS,
            cancel: CancellationToken::new(),
        }
    }

    /// Worker pool size; values below 1 are clamped to 1
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run a plan to completion and persist its summary
    ///
    /// Only the summary write can fail; task failures end up in the summary.
    pub async fn run(&self, plan: RunPlan) -> Result<RunSummary> {
        let mut aggregator = ResultAggregator::for_plan(&self.context, &plan);

        self.run_log.info(format!(
            "Run {} started: {} task(s), mode {}{}",
            self.context.run_id(),
            plan.len(),
            plan.mode(),
            plan.workflow()
                .map(|w| format!(", workflow '{}'", w))
                .unwrap_or_default()
        ));
        for missing in plan.unresolved() {
            self.run_log
                .warn(format!("Unresolved task reference skipped: {}", missing));
        }

        match plan.mode() {
            ExecutionMode::Sequential => self.run_sequential(plan, &mut aggregator).await,
            ExecutionMode::Parallel => self.run_parallel(plan, &mut aggregator).await,
        }

        let summary = aggregator.finalize();
        self.run_log.info(format!(
            "Run finished in {:.1}s: {} total, {} succeeded, {} failed",
            self.context.elapsed().as_secs_f64(),
            summary.total,
            summary.succeeded,
            summary.failed
        ));

        summary.persist(&self.context.summary_path())?;
        Ok(summary)
    }

    async fn run_sequential(&self, plan: RunPlan, aggregator: &mut ResultAggregator) {
        let stop_on_failure = plan.stop_on_failure();
        let tasks = plan.into_tasks();
        let total = tasks.len();

        for (index, task) in tasks.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.run_log.warn(format!(
                    "Run cancelled: {} task(s) not started",
                    total - index
                ));
                break;
            }

            self.log_start(task, index, total);
            let result = execute_isolated(self.executor.as_ref(), task, &self.context).await;
            let succeeded = result.is_success();
            self.record(aggregator, result);

            if !succeeded && stop_on_failure {
                let skipped = total - index - 1;
                if skipped > 0 {
                    self.run_log.warn(format!(
                        "Stopping after failure of {}: {} task(s) skipped",
                        task.id(),
                        skipped
                    ));
                }
                break;
            }
        }
    }

    async fn run_parallel(&self, plan: RunPlan, aggregator: &mut ResultAggregator) {
        let tasks = plan.into_tasks();
        let total = tasks.len();
        let (tx, mut rx) = mpsc::unbounded_channel::<ExecutionResult>();

        let dispatcher = {
            let executor = Arc::clone(&self.executor);
            let context = Arc::clone(&self.context);
            let run_log = Arc::clone(&self.run_log);
            let semaphore = Arc::new(Semaphore::new(self.max_workers));
            let cancel = self.cancel.clone();

            tokio::spawn(async move {
                let mut workers = JoinSet::new();
                let mut dispatched = 0usize;

                for (index, task) in tasks.into_iter().enumerate() {
                    let permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => break,
                        },
                    };
                    if cancel.is_cancelled() {
                        break;
                    }

                    log_start(&run_log, &task, index, total);
                    dispatched += 1;

                    let executor = Arc::clone(&executor);
                    let context = Arc::clone(&context);
                    let tx = tx.clone();
                    workers.spawn(async move {
                        let result = execute_isolated(executor.as_ref(), &task, &context).await;
                        drop(permit);
                        // receiver lives until every sender is gone
                        let _ = tx.send(result);
                    });
                }
                drop(tx);

                if dispatched < total {
                    run_log.warn(format!(
                        "Run cancelled: {} task(s) not started",
                        total - dispatched
                    ));
                }

                while let Some(joined) = workers.join_next().await {
                    if let Err(e) = joined {
                        error!("Worker task failed: {}", e);
                    }
                }
            })
        };

        while let Some(result) = rx.recv().await {
            self.record(aggregator, result);
        }

        if let Err(e) = dispatcher.await {
            error!("Dispatcher failed: {}", e);
        }
    }

    fn record(&self, aggregator: &mut ResultAggregator, result: ExecutionResult) {
        self.run_log.result(&result);
        if let Err(e) = aggregator.record(&result) {
            self.run_log.error(format!("Result not recorded: {}", e));
        }
    }

    fn log_start(&self, task: &TaskDefinition, index: usize, total: usize) {
        log_start(&self.run_log, task, index, total);
    }
}

fn log_start(run_log: &RunLog, task: &TaskDefinition, index: usize, total: usize) {
    run_log.info(format!(
        "[{}/{}] Starting {} ({})",
        index + 1,
        total,
        task.name(),
        task.id()
    ));
    run_log.detail(format!("  prompt: {}", task.prompt()));
    run_log.detail(format!("  approval: {}", task.approval_args().join(" ")));
}

/// Run one task, converting an executor panic into an `error` result
async fn execute_isolated(
    executor: &dyn Executor,
    task: &TaskDefinition,
    context: &RunContext,
) -> ExecutionResult {
    match AssertUnwindSafe(executor.execute(task, context))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Executor panicked on task {}: {}", task.id(), message);
            ExecutionResult::errored(task, format!("Executor panicked: {}", message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
