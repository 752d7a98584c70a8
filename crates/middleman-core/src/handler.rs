//! Handler contracts.
//!
//! Handlers are registered with a lookup service under their contract type
//! (`dyn CommandHandler<C>`, `dyn QueryHandler<Q>` or `dyn EventHandler<E>`)
//! and resolved by the router per dispatch call.
//!
//! Every handler receives the dispatch's [`CancellationToken`]. A handler
//! that observes cancellation should fail with
//! [`Cancelled`](crate::Cancelled).
//!
//! # Example
//!
//! ```rust,ignore
//! struct SendReceiptHandler;
//!
//! #[async_trait]
//! impl EventHandler<OrderPlaced> for SendReceiptHandler {
//!     async fn handle(&self, event: &OrderPlaced, cancel: &CancellationToken) -> HandlerResult {
//!         if cancel.is_cancelled() {
//!             return Err(Cancelled.into());
//!         }
//!         mailer::send_receipt(event.order_id).await?;
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerResult;
use crate::message::{Command, Event, Query};

/// Handles one command type.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    async fn handle(&self, command: &C, cancel: &CancellationToken) -> HandlerResult;
}

/// Handles one query type and produces its result.
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync + 'static {
    async fn handle(&self, query: &Q, cancel: &CancellationToken) -> HandlerResult<Q::Result>;
}

/// Handles one event type. Any number of event handlers may exist per event.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    async fn handle(&self, event: &E, cancel: &CancellationToken) -> HandlerResult;
}
