//! Shutdown handler registry.

use std::sync::{Mutex, PoisonError};

use crate::lifecycle::Task;

/// Registry of shutdown handlers.
///
/// Handlers can be registered from any task until the shutdown phase takes
/// its snapshot. After that the registry is sealed and further handlers are
/// dropped without running.
#[derive(Default)]
pub struct ShutdownHandlers {
    inner: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    handlers: Vec<Task>,
    sealed: bool,
}

impl ShutdownHandlers {
    /// Create an empty, unsealed registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append handlers. Returns `false` if the registry was already sealed and
    /// the handlers were discarded.
    pub fn register(&self, handlers: impl IntoIterator<Item = Task>) -> bool {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if registry.sealed {
            return false;
        }
        registry.handlers.extend(handlers);
        true
    }

    /// Take the registered handlers and seal the registry.
    pub fn seal(&self) -> Vec<Task> {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.sealed = true;
        std::mem::take(&mut registry.handlers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::task;

    fn noop() -> Task {
        task(|_| async { Ok(()) })
    }

    #[test]
    fn test_register_then_seal() {
        let handlers = ShutdownHandlers::new();
        assert!(handlers.register([noop(), noop()]));
        assert!(handlers.register([noop()]));

        assert_eq!(handlers.seal().len(), 3);
        // A second snapshot finds nothing left.
        assert!(handlers.seal().is_empty());
    }

    #[test]
    fn test_register_after_seal_is_dropped() {
        let handlers = ShutdownHandlers::new();
        handlers.seal();

        assert!(!handlers.register([noop()]));
        assert!(handlers.seal().is_empty());
    }
}
