//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RuntimeConfig (validated, immutable)
//!     → ServiceRuntime::from_config / init_logging
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal (or empty) configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ObservabilityConfig, RuntimeConfig, ShutdownConfig};
pub use validation::{validate_config, ValidationError};
