//! # Middleman
//!
//! An in-process message router. Application code sends commands, queries
//! and events through one façade, and the router finds the handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────┐     ┌─────────────────┐
//! │  Caller  │────▶│ Middleman │────▶│ CommandHandler  │  exactly one
//! │          │     │  (core)   │────▶│ QueryHandler    │  exactly one, returns
//! └──────────┘     └─────┬─────┘────▶│ EventHandler ×N │  ascending order
//!                        │ scope     └─────────────────┘
//!                        ▼
//!                ┌─────────────────┐
//!                │ ServiceProvider │  singleton / scoped / transient
//!                └─────────────────┘
//! ```
//!
//! - **Core**: message contracts, router, ordered event dispatch, dynamic routing
//! - **Services**: handler registration and per-dispatch scopes
//! - **Runtime**: figment configuration and `tracing` logging
//! - **Macros**: `Command`, `Query`, `Event` and `HandlerOrder` derives
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use middleman::prelude::*;
//!
//! #[derive(Event)]
//! struct OrderPlaced { order_id: u64 }
//!
//! #[derive(HandlerOrder)]
//! #[order(500)]
//! struct SendReceiptHandler;
//!
//! #[async_trait]
//! impl EventHandler<OrderPlaced> for SendReceiptHandler {
//!     async fn handle(&self, event: &OrderPlaced, _cancel: &CancellationToken) -> HandlerResult {
//!         info!(order_id = event.order_id, "Receipt sent");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> MiddlemanResult<()> {
//!     let runtime = MiddlemanRuntime::new();
//!
//!     let mut services = ServiceCollection::new();
//!     services.add_event_handler::<OrderPlaced, _>(Lifetime::Singleton, || SendReceiptHandler);
//!
//!     let middleman = runtime.build(services);
//!     middleman.notify(&OrderPlaced { order_id: 1 }, &CancellationToken::new()).await
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: Enable the derive macros (default)
//! - `toml-config`: Load `middleman.toml` (default)
//! - `yaml-config`: Load `middleman.yaml`
//! - `json-log`: JSON log output

pub use middleman_core as core;
pub use middleman_runtime as runtime;
pub use middleman_services as services;

#[cfg(feature = "macros")]
pub use middleman_macros as macros;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use middleman::prelude::*;
/// ```
pub mod prelude {
    // Runtime
    pub use middleman_runtime::{MiddlemanConfig, MiddlemanRuntime};

    // Registration
    pub use middleman_services::{Lifetime, ServiceCollection, ServiceProvider};

    // Messages, handlers and the router
    pub use middleman_core::{
        AnyMessage, Cancelled, CancellationToken, Command, CommandBus, CommandHandler, Event,
        EventBus, EventHandler, HandlerOrder, HandlerResult, Middleman, MiddlemanError,
        MiddlemanResult, Query, QueryBus, QueryHandler, WeakMiddleman, async_trait,
    };

    #[cfg(feature = "macros")]
    pub use middleman_macros::{Command, Event, HandlerOrder, Query};

    // Logging
    pub use middleman_runtime::prelude::*;
}
