//! Cancellable execution context passed to every task.
//!
//! A [`Context`] is a cheap handle around a [`CancellationToken`] plus the
//! cause of its cancellation. The first cancellation wins: later calls to
//! [`Context::cancel`] or [`Context::cancel_with`] are no-ops. A child that is
//! cancelled because its parent was cancelled reports the parent's cause.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Why a context was cancelled.
#[derive(Debug, Clone)]
pub enum Cause {
    /// Cancelled without a failure: all work finished, or shutdown was requested.
    Canceled,
    /// A deadline attached with [`Context::with_timeout`] elapsed.
    DeadlineExceeded(Duration),
    /// A task failed.
    Failed(Error),
}

/// Cancellable context shared by a batch of tasks.
///
/// Clones observe the same cancellation; use [`Context::child`] for a
/// context that can be cancelled independently.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    cause: Arc<Mutex<Option<Cause>>>,
    parent: Option<Box<Context>>,
}

impl Context {
    /// A root context that is only cancelled explicitly.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            cause: Arc::new(Mutex::new(None)),
            parent: None,
        }
    }

    /// Derive a child that is cancelled with this context but can also be
    /// cancelled on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            cause: Arc::new(Mutex::new(None)),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Derive a child that is cancelled with [`Cause::DeadlineExceeded`] once
    /// `timeout` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let ctx = self.child();
        let timer = ctx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    timer.cancel_with_cause(Cause::DeadlineExceeded(timeout));
                }
                _ = timer.token.cancelled() => {}
            }
        });
        ctx
    }

    /// Cancel without a failure.
    pub fn cancel(&self) {
        self.cancel_with_cause(Cause::Canceled);
    }

    /// Cancel with `err` as the cause, unless already cancelled.
    pub fn cancel_with(&self, err: Error) {
        self.cancel_with_cause(Cause::Failed(err));
    }

    fn cancel_with_cause(&self, cause: Cause) {
        let mut slot = self.cause.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() || self.token.is_cancelled() {
            return;
        }
        *slot = Some(cause);
        self.token.cancel();
    }

    /// Wait until the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cancellation cause, or `None` while the context is still live.
    pub fn cause(&self) -> Option<Cause> {
        let own = self
            .cause
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match own {
            Some(cause) => Some(cause),
            // Cancelled through the parent, or directly through the raw token.
            None if self.token.is_cancelled() => self
                .parent
                .as_ref()
                .and_then(|parent| parent.cause())
                .or(Some(Cause::Canceled)),
            None => None,
        }
    }

    /// The error behind the cancellation, if it was anything other than a
    /// benign cancel.
    pub fn error(&self) -> Option<Error> {
        match self.cause()? {
            Cause::Canceled => None,
            Cause::DeadlineExceeded(timeout) => Some(Error::DeadlineExceeded(timeout)),
            Cause::Failed(err) => Some(err),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_cause_wins() {
        let ctx = Context::background();
        ctx.cancel_with(Error::task("first".into()));
        ctx.cancel_with(Error::task("second".into()));
        ctx.cancel();

        assert!(ctx.is_cancelled());
        assert_eq!(ctx.error().unwrap().to_string(), "first");
    }

    #[test]
    fn test_child_inherits_parent_cause() {
        let parent = Context::background();
        let child = parent.child();

        parent.cancel_with(Error::task("parent failed".into()));

        assert!(child.is_cancelled());
        assert_eq!(child.error().unwrap().to_string(), "parent failed");

        // Cancelling the child afterwards does not override the inherited cause.
        child.cancel_with(Error::task("late".into()));
        assert_eq!(child.error().unwrap().to_string(), "parent failed");
    }

    #[test]
    fn test_child_cancel_leaves_parent_live() {
        let parent = Context::background();
        let child = parent.child();

        child.cancel();

        assert!(!parent.is_cancelled());
        assert!(parent.cause().is_none());
        assert!(matches!(child.cause(), Some(Cause::Canceled)));
        assert!(child.error().is_none());
    }

    #[tokio::test]
    async fn test_timeout_sets_deadline_cause() {
        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        ctx.cancelled().await;

        assert!(matches!(ctx.cause(), Some(Cause::DeadlineExceeded(_))));
        assert!(ctx.error().unwrap().is_deadline_exceeded());
    }

    #[tokio::test]
    async fn test_cancel_before_timeout_is_benign() {
        let ctx = Context::background().with_timeout(Duration::from_secs(60));
        ctx.cancel();

        assert!(ctx.error().is_none());
    }
}
