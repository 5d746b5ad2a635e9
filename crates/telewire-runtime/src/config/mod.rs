//! Configuration module for the telewire runtime.
//!
//! Settings are layered with figment (defaults, files, `TELEWIRE_*`
//! environment variables, programmatic overrides) and validated before a
//! runtime is built from them.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ApiConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, PollingConfig, SpanEventConfig,
    TelewireConfig,
};
pub use validation::validate_config;
