//! OS signal handling.
//!
//! SIGINT, SIGTERM and SIGQUIT (Ctrl+C on other platforms) cancel the run
//! context. Receiving a signal is treated the same as
//! [`ServiceRuntime::request_shutdown`](crate::ServiceRuntime::request_shutdown).
//!
//! # Design Decisions
//! - The listener stays active until the shutdown phase has finished
//! - A signal after the run context is cancelled forces the process to exit

use tokio::task::JoinHandle;

use crate::lifecycle::context::Context;
use crate::observability::metrics;

/// Exit code used when a repeated signal forces the process down.
pub const FORCED_EXIT_CODE: i32 = 1;

/// Spawn a listener that cancels `ctx` on the first termination signal and
/// exits the process on the next one.
///
/// The caller aborts the returned handle once the shutdown phase is over.
pub fn spawn_listener(ctx: Context) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut signals = match TerminationSignals::install() {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            signal = signals.recv() => {
                tracing::info!(signal, "Shutdown signal received");
                metrics::record_signal(signal);
                ctx.cancel();
            }
            _ = ctx.cancelled() => {}
        }

        let signal = signals.recv().await;
        tracing::warn!(signal, "Signal received during shutdown, exiting immediately");
        metrics::record_signal(signal);
        std::process::exit(FORCED_EXIT_CODE);
    })
}

/// Installed listeners for the termination signals.
struct TerminationSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    quit: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    #[cfg(unix)]
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal and return its name.
    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_outlives_context_until_aborted() {
        let ctx = Context::background();
        let handle = spawn_listener(ctx.clone());

        ctx.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        handle.abort();
        let err = handle.await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
