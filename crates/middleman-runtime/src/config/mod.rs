//! Configuration for the Middleman runtime.
//!
//! Settings are layered with figment from built-in defaults, an optional
//! `middleman.toml` and `MIDDLEMAN_*` environment variables.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file, validate};
pub use schema::{
    DispatchConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, MiddlemanConfig,
    SpanEventConfig,
};
