//! Error types surfaced by the runtime.
//!
//! Main-task and shutdown-handler failures keep the message of the error the
//! task returned. When both phases fail, the errors are joined into a
//! [`ErrorList`] that renders one message per line, main phase first.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error type returned by caller-supplied tasks and handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A task error shared between every caller that observes it.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Errors returned by [`ServiceRuntime`](crate::ServiceRuntime) and the task runner.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A main task returned an error.
    #[error("{0}")]
    Task(SharedError),

    /// A shutdown handler returned an error.
    #[error("{0}")]
    Handler(SharedError),

    /// A task or handler panicked instead of returning.
    #[error("task panicked: {message}")]
    Panicked { message: String },

    /// The shutdown handlers did not finish within the shutdown deadline.
    #[error("shutdown deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Errors from more than one phase of the run.
    #[error("{0}")]
    Multiple(ErrorList),
}

impl Error {
    /// Wrap an error returned by a main task.
    pub fn task(err: BoxError) -> Self {
        Error::Task(Arc::from(err))
    }

    /// Join the main-phase and shutdown-phase results.
    ///
    /// Returns whichever error is present, or both joined with `main` first.
    pub fn join(main: Option<Error>, shutdown: Option<Error>) -> Option<Error> {
        match (main, shutdown) {
            (Some(main), Some(shutdown)) => {
                let mut list = ErrorList::default();
                list.push(main);
                list.push(shutdown);
                Some(Error::Multiple(list))
            }
            (Some(err), None) | (None, Some(err)) => Some(err),
            (None, None) => None,
        }
    }

    /// Iterate over the individual errors, unwrapping joined ones.
    pub fn errors(&self) -> Box<dyn Iterator<Item = &Error> + '_> {
        match self {
            Error::Multiple(list) => Box::new(list.iter()),
            other => Box::new(std::iter::once(other)),
        }
    }

    /// Whether the shutdown deadline was exceeded anywhere in this error.
    pub fn is_deadline_exceeded(&self) -> bool {
        self.errors()
            .any(|err| matches!(err, Error::DeadlineExceeded(_)))
    }

    /// Reclassify a task failure as a shutdown-handler failure.
    pub(crate) fn into_handler_error(self) -> Self {
        match self {
            Error::Task(inner) => Error::Handler(inner),
            Error::Multiple(list) => Error::Multiple(ErrorList(
                list.0.into_iter().map(Error::into_handler_error).collect(),
            )),
            other => other,
        }
    }
}

/// Ordered collection of errors from a single run.
#[derive(Debug, Clone, Default)]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    /// Append an error, flattening nested lists so rendering stays one level deep.
    pub fn push(&mut self, err: Error) {
        match err {
            Error::Multiple(list) => self.0.extend(list.0),
            other => self.0.push(other),
        }
    }

    /// Iterate in rendering order.
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_keeps_main_error_first() {
        let main = Error::task("m".into());
        let shutdown = Error::task("h".into()).into_handler_error();

        let joined = Error::join(Some(main), Some(shutdown)).unwrap();
        assert_eq!(joined.to_string(), "m\nh");
        assert!(matches!(joined.errors().nth(1), Some(Error::Handler(_))));
    }

    #[test]
    fn test_join_single_side() {
        assert!(Error::join(None, None).is_none());

        let only_shutdown = Error::join(None, Some(Error::DeadlineExceeded(Duration::from_millis(50))));
        assert!(matches!(only_shutdown, Some(Error::DeadlineExceeded(_))));

        let only_main = Error::join(Some(Error::task("a".into())), None).unwrap();
        assert_eq!(only_main.to_string(), "a");
    }

    #[test]
    fn test_nested_lists_flatten() {
        let inner = Error::join(Some(Error::task("a".into())), Some(Error::task("b".into())));
        let outer = Error::join(inner, Some(Error::task("c".into()))).unwrap();

        assert_eq!(outer.errors().count(), 3);
        assert_eq!(outer.to_string(), "a\nb\nc");
    }

    #[test]
    fn test_deadline_detected_inside_join() {
        let joined = Error::join(
            Some(Error::task("m".into())),
            Some(Error::DeadlineExceeded(Duration::from_secs(1))),
        )
        .unwrap();

        assert!(joined.is_deadline_exceeded());
        assert!(!Error::task("m".into()).is_deadline_exceeded());
    }
}
