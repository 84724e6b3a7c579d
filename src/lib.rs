//! Service runtime library.
//!
//! Runs a set of long-lived tasks concurrently, stops them together on the
//! first failure or a termination signal, then runs registered shutdown
//! handlers once under a deadline.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::RuntimeConfig;
pub use error::{BoxError, Error};
pub use lifecycle::{task, Context, ServiceRuntime, Task, TaskResult};
