//! Concurrent task runner.
//!
//! Runs a batch of tasks in parallel under a shared child context. The first
//! failure cancels that context so the siblings can stop; once every task has
//! returned the context is cancelled benignly. The runner returns as soon as
//! the context is done, so tasks that ignore cancellation are left running in
//! the background rather than awaited.

use std::any::Any;

use tokio::task::JoinSet;

use crate::error::Error;
use crate::lifecycle::context::Context;
use crate::lifecycle::Task;
use crate::observability::metrics;

/// Which phase a batch of tasks belongs to; used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Main,
    Shutdown,
}

impl Phase {
    /// Label used in log fields and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Main => "main",
            Phase::Shutdown => "shutdown",
        }
    }
}

/// Run `tasks` concurrently and return the first real failure.
///
/// Benign cancellations (every task finished, or `parent` was cancelled
/// without a failure) yield `Ok(())`. A deadline on `parent` is reported as
/// [`Error::DeadlineExceeded`].
pub async fn run_tasks(parent: &Context, tasks: Vec<Task>, phase: Phase) -> Result<(), Error> {
    if tasks.is_empty() {
        return Ok(());
    }

    let ctx = parent.child();
    let mut set = JoinSet::new();

    tracing::debug!(phase = phase.as_str(), tasks = tasks.len(), "Starting tasks");

    for task in tasks {
        let task_ctx = ctx.clone();
        set.spawn(async move {
            if let Err(err) = task(task_ctx.clone()).await {
                tracing::debug!(phase = phase.as_str(), error = %err, "Task failed");
                metrics::record_task_failure(phase.as_str());
                task_ctx.cancel_with(Error::task(err));
            }
        });
    }

    // Supervise the set in the background so this call can return as soon
    // as the context is cancelled.
    let supervisor = ctx.clone();
    tokio::spawn(async move {
        while let Some(joined) = set.join_next().await {
            if let Err(join_err) = joined {
                if join_err.is_panic() {
                    let message = panic_message(join_err.into_panic());
                    tracing::error!(phase = phase.as_str(), panic = %message, "Task panicked");
                    metrics::record_task_failure(phase.as_str());
                    supervisor.cancel_with(Error::Panicked { message });
                }
            }
        }
        supervisor.cancel();
    });

    ctx.cancelled().await;

    match ctx.error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
