//! Middleman Runtime - configuration and logging for the Middleman router.
//!
//! This crate provides:
//! - Layered configuration (`MiddlemanConfig`, `ConfigLoader`) over figment
//! - Logging setup (`LoggingBuilder`) over `tracing-subscriber`
//! - `MiddlemanRuntime`, which applies both to a `ServiceCollection`
//!
//! ```ignore
//! use middleman_runtime::MiddlemanRuntime;
//! use middleman_services::{Lifetime, ServiceCollection};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = MiddlemanRuntime::new();
//!
//!     let mut services = ServiceCollection::new();
//!     services.add_command_handler::<PlaceOrder, _>(Lifetime::Scoped, || PlaceOrderHandler);
//!
//!     let middleman = runtime.build(services);
//!     middleman.send(&PlaceOrder { sku: 42 }, &CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, DispatchConfig, MiddlemanConfig};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{MiddlemanRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for application code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
