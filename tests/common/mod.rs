//! Shared helpers for runtime integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use service_runtime::{task, BoxError, Context, Task};

/// A task that increments `counter` and returns immediately.
pub fn counting(counter: Arc<AtomicU32>) -> Task {
    task(move |_| async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

/// A task that fails immediately with `message`.
pub fn failing(message: &'static str) -> Task {
    task(move |_| async move { Err(BoxError::from(message)) })
}

/// A task that sleeps for `duration`, returning early if cancelled.
pub fn cooperative_sleep(duration: Duration) -> Task {
    task(move |ctx: Context| async move {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = ctx.cancelled() => {}
        }
        Ok(())
    })
}

/// A task that sleeps for `duration` without looking at its context.
#[allow(dead_code)]
pub fn stubborn_sleep(duration: Duration, counter: Arc<AtomicU32>) -> Task {
    task(move |_| async move {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(duration).await;
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}
