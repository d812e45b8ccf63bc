use super::ledger::{LedgerSnapshot, TaskLedger};
use super::window::{partition, TimeWindow, MIN_SPLIT_WIDTH};
use crate::config::types::SchedulerConfig;
use crate::output::ResultAggregator;
use crate::service::{
    PollOutcome, QueryHandle, QueryService, QueryStatus, ServiceError, RESULT_LIMIT,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Errors that abort a scheduler run
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("query over {window} failed: {source}")]
    Service {
        window: TimeWindow,
        #[source]
        source: ServiceError,
    },

    #[error(
        "{matched} records matched in {window}, which is too narrow to split further; \
         query this range manually"
    )]
    Unsplittable { window: TimeWindow, matched: u64 },

    #[error("query {query_id} over {window} still running after {attempts} polls")]
    PollLimitExceeded {
        query_id: String,
        window: TimeWindow,
        attempts: u32,
    },

    #[error("max_concurrent_queries must be at least 1")]
    NoConcurrency,

    #[error("progress_interval must be greater than zero")]
    ZeroProgressInterval,

    #[error("concurrency permits closed before {window} could be submitted")]
    PermitsClosed { window: TimeWindow },
}

/// A window waiting to be submitted.
#[derive(Debug)]
pub struct SubmissionTask {
    pub window: TimeWindow,
}

/// A submitted query waiting to be polled.
///
/// Holds the concurrency permit taken at submission time; the permit is
/// released when the task is dropped at a terminal outcome.
#[derive(Debug)]
pub struct PollTask {
    pub handle: QueryHandle,
    pub attempts: u32,
    _permit: OwnedSemaphorePermit,
}

/// Totals reported at the end of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub windows_issued: u64,
    pub windows_completed: u64,
    pub windows_split: u64,
    pub records_matched: u64,
    pub records_scanned: u64,
}

impl From<LedgerSnapshot> for RunSummary {
    fn from(snapshot: LedgerSnapshot) -> Self {
        Self {
            windows_issued: snapshot.issued,
            windows_completed: snapshot.completed,
            windows_split: snapshot.split,
            records_matched: snapshot.records_matched,
            records_scanned: snapshot.records_scanned,
        }
    }
}

/// State shared by every dispatcher and handler of one run.
struct SchedulerContext {
    service: Arc<dyn QueryService>,
    ledger: TaskLedger,
    aggregator: Arc<ResultAggregator>,
    permits: Arc<Semaphore>,
    submit_tx: mpsc::UnboundedSender<SubmissionTask>,
    poll_tx: mpsc::UnboundedSender<PollTask>,
    fatal_tx: mpsc::UnboundedSender<SchedulerError>,
    config: SchedulerConfig,
}

impl SchedulerContext {
    fn submit(&self, window: TimeWindow) {
        if self.submit_tx.send(SubmissionTask { window }).is_err() {
            debug!(window = %window, "Submission queue closed, dropping window");
        }
    }

    fn requeue(&self, task: PollTask) {
        if self.poll_tx.send(task).is_err() {
            debug!("Polling queue closed, dropping query");
        }
    }

    /// Finish the window as aborted and hand the error to the run.
    ///
    /// The error is queued before the ledger moves, so a run whose last
    /// window aborts is never reported as done.
    fn abort(&self, err: SchedulerError) {
        error!(error = %err, "Fatal scheduler error");
        let _ = self.fatal_tx.send(err);
        self.ledger.complete();
    }
}

/// Fetch every record in `range`, splitting windows until each fits the
/// service's result cap, and merge the results into `aggregator`.
///
/// Returns once all issued windows, including those created by bisection,
/// have delivered their results, or with the first fatal error. In-flight
/// queries are abandoned on error.
pub async fn run_scheduler(
    service: Arc<dyn QueryService>,
    aggregator: Arc<ResultAggregator>,
    range: TimeWindow,
    config: SchedulerConfig,
) -> Result<RunSummary, SchedulerError> {
    if config.max_concurrent_queries == 0 {
        return Err(SchedulerError::NoConcurrency);
    }
    if config.progress_interval.is_zero() {
        return Err(SchedulerError::ZeroProgressInterval);
    }

    let (submit_tx, submit_rx) = mpsc::unbounded_channel();
    let (poll_tx, poll_rx) = mpsc::unbounded_channel();
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();

    let progress_interval = config.progress_interval;
    let ctx = Arc::new(SchedulerContext {
        service,
        ledger: TaskLedger::new(),
        aggregator,
        permits: Arc::new(Semaphore::new(config.max_concurrent_queries)),
        submit_tx,
        poll_tx,
        fatal_tx,
        config,
    });

    let submission_handle = tokio::spawn(run_submission_dispatcher(submit_rx, Arc::clone(&ctx)));
    let polling_handle = tokio::spawn(run_polling_dispatcher(poll_rx, Arc::clone(&ctx)));

    let windows = partition(range);
    info!(range = %range, windows = windows.len(), "Partitioned time range");
    for window in windows {
        ctx.ledger.issue(1);
        ctx.submit(window);
    }
    ctx.ledger.seal();

    let mut progress = tokio::time::interval(progress_interval);
    progress.tick().await;

    let result = loop {
        tokio::select! {
            biased;
            Some(err) = fatal_rx.recv() => break Err(err),
            _ = ctx.ledger.wait_until_done() => break Ok(()),
            _ = progress.tick() => {
                let snapshot = ctx.ledger.snapshot();
                info!(
                    progress = %format!("{:.0}%", snapshot.progress_percent()),
                    issued = snapshot.issued,
                    completed = snapshot.completed,
                    split = snapshot.split,
                    "Query progress"
                );
            }
        }
    };

    shutdown(submission_handle, polling_handle);
    result?;

    let summary = RunSummary::from(ctx.ledger.snapshot());
    info!(
        windows = summary.windows_completed,
        splits = summary.windows_split,
        records_matched = summary.records_matched,
        records_scanned = summary.records_scanned,
        "All queries complete"
    );
    Ok(summary)
}

fn shutdown(submission: JoinHandle<()>, polling: JoinHandle<()>) {
    submission.abort();
    polling.abort();
}

/// Spawn one submission handler per queued window.
async fn run_submission_dispatcher(
    mut queue: mpsc::UnboundedReceiver<SubmissionTask>,
    ctx: Arc<SchedulerContext>,
) {
    debug!("Submission dispatcher started");
    while let Some(task) = queue.recv().await {
        tokio::spawn(handle_submission(task, Arc::clone(&ctx)));
    }
    debug!("Submission dispatcher stopped");
}

/// Spawn one polling handler per queued query.
async fn run_polling_dispatcher(
    mut queue: mpsc::UnboundedReceiver<PollTask>,
    ctx: Arc<SchedulerContext>,
) {
    debug!("Polling dispatcher started");
    while let Some(task) = queue.recv().await {
        tokio::spawn(handle_poll(task, Arc::clone(&ctx)));
    }
    debug!("Polling dispatcher stopped");
}

async fn handle_submission(task: SubmissionTask, ctx: Arc<SchedulerContext>) {
    let window = task.window;
    let Ok(permit) = Arc::clone(&ctx.permits).acquire_owned().await else {
        return ctx.abort(SchedulerError::PermitsClosed { window });
    };

    match ctx.service.start_query(&window).await {
        Ok(query_id) => {
            debug!(query_id = %query_id, window = %window, "Query submitted");
            ctx.requeue(PollTask {
                handle: QueryHandle { query_id, window },
                attempts: 0,
                _permit: permit,
            });
        }
        Err(source) => ctx.abort(SchedulerError::Service { window, source }),
    }
}

async fn handle_poll(mut task: PollTask, ctx: Arc<SchedulerContext>) {
    let window = task.handle.window;
    let outcome = match ctx.service.poll_query(&task.handle.query_id).await {
        Ok(outcome) => outcome,
        Err(source) => return ctx.abort(SchedulerError::Service { window, source }),
    };
    task.attempts += 1;

    match outcome.status {
        QueryStatus::Running => {
            if let Some(max) = ctx.config.max_poll_attempts {
                if task.attempts >= max {
                    return ctx.abort(SchedulerError::PollLimitExceeded {
                        query_id: task.handle.query_id.to_string(),
                        window,
                        attempts: task.attempts,
                    });
                }
            }
            tokio::time::sleep(ctx.config.poll_interval).await;
            ctx.requeue(task);
        }
        QueryStatus::Complete | QueryStatus::Failed if outcome.overflowed(RESULT_LIMIT) => {
            split_window(&ctx, window, &outcome);
        }
        QueryStatus::Complete | QueryStatus::Failed => {
            ctx.ledger
                .record_stats(outcome.records_matched, outcome.records_scanned);
            let rows = ctx.aggregator.merge(&outcome.records);
            ctx.ledger.complete();
            debug!(
                window = %window,
                rows = rows,
                scanned = outcome.records_scanned,
                "Window complete"
            );
        }
    }
}

/// Replace an overflowing window by its two halves on the submission queue.
fn split_window(ctx: &SchedulerContext, window: TimeWindow, outcome: &PollOutcome) {
    let Some((left, right)) = window.bisect(MIN_SPLIT_WIDTH) else {
        return ctx.abort(SchedulerError::Unsplittable {
            window,
            matched: outcome.records_matched,
        });
    };

    debug!(
        window = %window,
        matched = outcome.records_matched,
        status = ?outcome.status,
        "Result cap exceeded, splitting window"
    );
    ctx.ledger.split();
    ctx.submit(left);
    ctx.submit(right);
}
