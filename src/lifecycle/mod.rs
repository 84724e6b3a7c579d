//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Run (runtime.rs):
//!     run_context → root context (+ signals.rs listener)
//!         → runner.rs (main tasks, first failure cancels siblings)
//!         → shutdown phase (exactly once)
//!         → join main error + shutdown error
//!
//! Shutdown (shutdown.rs):
//!     Snapshot handlers → fresh context with deadline → runner.rs
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM/SIGQUIT → cancel root context
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative: tasks observe their [`Context`]
//! - Shutdown runs once; every caller receives the same cached result
//! - Shutdown deadline starts when the shutdown phase starts

use std::future::Future;

use futures_util::future::BoxFuture;

use crate::error::BoxError;

pub mod context;
pub mod runner;
pub mod runtime;
pub mod shutdown;
pub mod signals;

pub use context::{Cause, Context};
pub use runner::{run_tasks, Phase};
pub use runtime::{RuntimeState, ServiceRuntime, DEFAULT_SHUTDOWN_DEADLINE};

/// Result returned by a task or shutdown handler.
pub type TaskResult = Result<(), BoxError>;

/// A unit of work run by the runtime: a main task or a shutdown handler.
pub type Task = Box<dyn FnOnce(Context) -> BoxFuture<'static, TaskResult> + Send>;

/// Box an async closure into a [`Task`].
pub fn task<F, Fut>(f: F) -> Task
where
    F: FnOnce(Context) -> Fut + Send + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    Box::new(move |ctx| Box::pin(f(ctx)))
}
