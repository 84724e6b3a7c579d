//! Service runtime: main tasks, signals and the once-only shutdown phase.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::config::RuntimeConfig;
use crate::error::Error;
use crate::lifecycle::context::Context;
use crate::lifecycle::runner::{run_tasks, Phase};
use crate::lifecycle::shutdown::ShutdownHandlers;
use crate::lifecycle::signals;
use crate::lifecycle::Task;
use crate::observability::metrics;

/// Shutdown deadline used when none (or zero) is configured.
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Where the runtime is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Idle,
    Running,
    ShuttingDown,
    Terminated,
}

/// Runs main tasks in parallel and executes shutdown handlers afterwards.
///
/// The handle is cheap to clone so tasks can register shutdown handlers or
/// request shutdown from inside the run. A runtime is meant for a single
/// [`run`](Self::run) or [`run_context`](Self::run_context) call.
#[derive(Clone)]
pub struct ServiceRuntime {
    inner: Arc<Inner>,
}

struct Inner {
    shutdown_deadline: Duration,
    handle_signals: bool,
    lifecycle: Mutex<Lifecycle>,
    handlers: ShutdownHandlers,
    /// The single shutdown execution, shared by every caller of `shutdown`.
    shutdown_phase: OnceLock<Shared<BoxFuture<'static, Result<(), Error>>>>,
}

struct Lifecycle {
    state: RuntimeState,
    /// Context of the run in progress, if any.
    root: Option<Context>,
}

impl ServiceRuntime {
    /// Create a runtime with the default 30 second shutdown deadline.
    pub fn new() -> Self {
        Self::with_shutdown_deadline(DEFAULT_SHUTDOWN_DEADLINE)
    }

    /// Create a runtime with a specific shutdown deadline. A zero deadline is
    /// replaced by [`DEFAULT_SHUTDOWN_DEADLINE`].
    pub fn with_shutdown_deadline(shutdown_deadline: Duration) -> Self {
        Self::build(shutdown_deadline, true)
    }

    /// Create a runtime from loaded configuration.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::build(config.shutdown.deadline(), config.shutdown.handle_signals)
    }

    fn build(shutdown_deadline: Duration, handle_signals: bool) -> Self {
        let shutdown_deadline = if shutdown_deadline.is_zero() {
            DEFAULT_SHUTDOWN_DEADLINE
        } else {
            shutdown_deadline
        };

        Self {
            inner: Arc::new(Inner {
                shutdown_deadline,
                handle_signals,
                lifecycle: Mutex::new(Lifecycle {
                    state: RuntimeState::Idle,
                    root: None,
                }),
                handlers: ShutdownHandlers::new(),
                shutdown_phase: OnceLock::new(),
            }),
        }
    }

    /// Time allowed for the shutdown handlers once the shutdown phase starts.
    pub fn shutdown_deadline(&self) -> Duration {
        self.inner.shutdown_deadline
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RuntimeState {
        self.lifecycle().state
    }

    /// Run `tasks` under a fresh background context. See [`run_context`](Self::run_context).
    pub async fn run(&self, tasks: impl IntoIterator<Item = Task>) -> Result<(), Error> {
        self.run_context(&Context::background(), tasks).await
    }

    /// Run `tasks` in parallel, then run the shutdown handlers.
    ///
    /// The tasks share a context that is cancelled when `parent` is cancelled,
    /// a termination signal arrives, [`request_shutdown`](Self::request_shutdown)
    /// or [`shutdown`](Self::shutdown) is called, or any task fails. The
    /// returned error joins the first task failure with the shutdown result,
    /// task failure first.
    pub async fn run_context(
        &self,
        parent: &Context,
        tasks: impl IntoIterator<Item = Task>,
    ) -> Result<(), Error> {
        let root = parent.child();
        {
            let mut lifecycle = self.lifecycle();
            let state = lifecycle.state;
            match state {
                RuntimeState::Idle | RuntimeState::Running => {
                    lifecycle.state = RuntimeState::Running;
                }
                RuntimeState::ShuttingDown | RuntimeState::Terminated => {
                    tracing::warn!("Shutdown already started, main tasks start cancelled");
                    root.cancel();
                }
            }
            lifecycle.root = Some(root.clone());
        }

        let listener = self
            .inner
            .handle_signals
            .then(|| signals::spawn_listener(root.clone()));

        let tasks: Vec<Task> = tasks.into_iter().collect();
        tracing::info!(tasks = tasks.len(), "Service running");

        let main_result = run_tasks(&root, tasks, Phase::Main).await;
        if let Err(e) = &main_result {
            tracing::error!(error = %e, "Main task failed");
        }

        let shutdown_result = self.shutdown().await;

        root.cancel();
        if let Some(listener) = listener {
            listener.abort();
        }
        {
            let mut lifecycle = self.lifecycle();
            lifecycle.root = None;
            lifecycle.state = RuntimeState::Terminated;
        }

        match Error::join(main_result.err(), shutdown_result.err()) {
            Some(err) => Err(err),
            None => {
                tracing::info!("Service stopped");
                Ok(())
            }
        }
    }

    /// Register handlers to run during the shutdown phase.
    ///
    /// Handlers registered after the shutdown phase has taken its snapshot
    /// are never run.
    pub fn register_shutdown_handler(&self, handlers: impl IntoIterator<Item = Task>) {
        if !self.inner.handlers.register(handlers) {
            tracing::warn!("Shutdown already started, handler will not run");
        }
    }

    /// Cancel the run context so main tasks can exit. Does not wait for them
    /// and does not run shutdown handlers itself.
    pub fn request_shutdown(&self) {
        match &self.lifecycle().root {
            Some(root) => {
                tracing::info!("Shutdown requested");
                root.cancel();
            }
            None => tracing::debug!("Shutdown requested with no run in progress"),
        }
    }

    /// Cancel the run context and run the shutdown handlers under the
    /// shutdown deadline.
    ///
    /// The handlers run once, on a task of their own, so dropping a caller
    /// does not cancel or restart them. Every call, concurrent or later,
    /// returns the result of that single execution.
    pub async fn shutdown(&self) -> Result<(), Error> {
        let phase = self
            .inner
            .shutdown_phase
            .get_or_init(|| {
                let runtime = self.clone();
                let handle = tokio::spawn(async move { runtime.run_shutdown_handlers().await });
                async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(Error::Panicked {
                            message: e.to_string(),
                        })
                    })
                }
                .boxed()
                .shared()
            })
            .clone();
        phase.await
    }

    async fn run_shutdown_handlers(&self) -> Result<(), Error> {
        {
            let mut lifecycle = self.lifecycle();
            lifecycle.state = RuntimeState::ShuttingDown;
            if let Some(root) = &lifecycle.root {
                root.cancel();
            }
        }

        let handlers = self.inner.handlers.seal();
        let deadline = self.inner.shutdown_deadline;
        tracing::info!(
            handlers = handlers.len(),
            deadline = ?deadline,
            "Running shutdown handlers"
        );

        let started = Instant::now();
        let ctx = Context::background().with_timeout(deadline);
        let result = run_tasks(&ctx, handlers, Phase::Shutdown)
            .await
            .map_err(Error::into_handler_error);
        ctx.cancel();

        let elapsed = started.elapsed();
        let deadline_exceeded = matches!(&result, Err(e) if e.is_deadline_exceeded());
        metrics::record_shutdown(elapsed, deadline_exceeded);

        match &result {
            Ok(()) => tracing::info!(elapsed = ?elapsed, "Shutdown complete"),
            Err(_) if deadline_exceeded => tracing::warn!(
                deadline = ?deadline,
                "Shutdown deadline exceeded"
            ),
            Err(e) => tracing::error!(error = %e, "Shutdown handler failed"),
        }

        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.root.is_none() {
                lifecycle.state = RuntimeState::Terminated;
            }
        }

        result
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ServiceRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::task;

    #[test]
    fn test_zero_deadline_uses_default() {
        let runtime = ServiceRuntime::with_shutdown_deadline(Duration::ZERO);
        assert_eq!(runtime.shutdown_deadline(), DEFAULT_SHUTDOWN_DEADLINE);

        let runtime = ServiceRuntime::with_shutdown_deadline(Duration::from_secs(5));
        assert_eq!(runtime.shutdown_deadline(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_config() {
        let mut config = RuntimeConfig::default();
        config.shutdown.deadline_ms = 250;
        config.shutdown.handle_signals = false;

        let runtime = ServiceRuntime::from_config(&config);
        assert_eq!(runtime.shutdown_deadline(), Duration::from_millis(250));
        assert!(!runtime.inner.handle_signals);
        assert_eq!(runtime.state(), RuntimeState::Idle);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let runtime = ServiceRuntime::new();
        let observer = runtime.clone();

        let result = runtime
            .run([task(move |_| async move {
                assert_eq!(observer.state(), RuntimeState::Running);
                Ok(())
            })])
            .await;

        assert!(result.is_ok());
        assert_eq!(runtime.state(), RuntimeState::Terminated);
    }

    #[tokio::test]
    async fn test_shutdown_without_run_terminates() {
        let runtime = ServiceRuntime::new();
        assert!(runtime.shutdown().await.is_ok());
        assert_eq!(runtime.state(), RuntimeState::Terminated);
    }

    #[tokio::test]
    async fn test_run_after_shutdown_starts_cancelled() {
        let runtime = ServiceRuntime::new();
        runtime.shutdown().await.unwrap();

        let result = runtime
            .run([task(|ctx: Context| async move {
                assert!(ctx.is_cancelled());
                Ok(())
            })])
            .await;

        assert!(result.is_ok());
    }

    #[test]
    fn test_request_shutdown_without_run_is_noop() {
        let runtime = ServiceRuntime::new();
        runtime.request_shutdown();
        assert_eq!(runtime.state(), RuntimeState::Idle);
    }
}
