//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → schema.rs apply_env (blank fields from the environment)
//!     → validation.rs (semantic checks)
//!     → RotateConfig (validated, read once at startup)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Values in the file win over the environment
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    LogFormat, NodeConfig, ObservabilityConfig, PollingConfig, ProbeConfig, RolePolicyConfig,
    RotateConfig, RotationConfig, SenderConfig,
};
pub use validation::{validate_config, ValidationError};
