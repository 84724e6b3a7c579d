//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle/ produces:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and histograms via the `metrics` facade)
//! ```
//!
//! # Design Decisions
//! - The library never installs a metrics exporter; without a recorder the
//!   facade calls are no-ops
//! - Log level configurable via config, overridden by `RUST_LOG`

pub mod logging;
pub mod metrics;
