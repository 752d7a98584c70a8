//! # Middleman Core
//!
//! The routing engine of the Middleman in-process message router.
//!
//! Application code sends three kinds of messages through a single façade:
//!
//! - **Commands** go to exactly one [`CommandHandler`] ([`CommandBus::send`])
//! - **Queries** go to exactly one [`QueryHandler`] and return its result ([`QueryBus::query`])
//! - **Events** go to every [`EventHandler`], in ascending order ([`EventBus::notify`])
//!
//! Handlers are never constructed here. [`Middleman`] resolves them per call
//! from a [`ServiceLookup`] scope, which is released when the call ends.
//!
//! ## Event Flow
//!
//! ```text
//! ┌──────────┐  notify  ┌───────────┐  scope   ┌───────────────┐
//! │  Caller  │─────────▶│ Middleman │─────────▶│ ServiceLookup │
//! └──────────┘          └─────┬─────┘          └───────────────┘
//!                             │ handlers
//!                             ▼
//!                    ┌─────────────────┐   order_of   ┌──────────────────────┐
//!                    │ EventDispatcher │─────────────▶│ HandlerOrderResolver │
//!                    └────────┬────────┘              └──────────────────────┘
//!                             │ sequential, stop at first failure
//!                             ▼
//!                    500: SendReceipt ─▶ 1000: UpdateInventory
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use middleman_core::prelude::*;
//!
//! struct OrderPlaced { order_id: u64 }
//! impl Event for OrderPlaced {}
//!
//! struct SendReceipt;
//!
//! #[async_trait]
//! impl EventHandler<OrderPlaced> for SendReceipt {
//!     async fn handle(&self, event: &OrderPlaced, _cancel: &CancellationToken) -> HandlerResult {
//!         println!("receipt for order {}", event.order_id);
//!         Ok(())
//!     }
//! }
//!
//! # async fn run(middleman: Middleman) -> MiddlemanResult<()> {
//! middleman.notify(&OrderPlaced { order_id: 1 }, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod dynamic;
pub mod error;
pub mod handler;
pub mod lookup;
pub mod message;
pub mod order;
pub mod router;

pub use dispatcher::{EventDispatcher, PlannedHandler};
pub use dynamic::{AnyOutput, DispatchTable, Route};
pub use error::{Cancelled, HandlerError, HandlerResult, MiddlemanError, MiddlemanResult};
pub use handler::{CommandHandler, EventHandler, QueryHandler};
pub use lookup::{Resolved, ResolvedService, ServiceArc, ServiceLookup, ServiceScope};
pub use message::{AnyMessage, Command, Event, MessageKind, Query, TypeInfo};
pub use order::{DEFAULT_HANDLER_ORDER, HandlerOrder, HandlerOrderResolver, OrderMetadata};
pub use router::{CommandBus, EventBus, Middleman, QueryBus, WeakMiddleman};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Everything needed to declare messages and handlers and to dispatch them.
pub mod prelude {
    pub use crate::{
        AnyMessage, Cancelled, Command, CommandBus, CommandHandler, Event, EventBus, EventHandler,
        HandlerOrder, HandlerResult, Middleman, MiddlemanError, MiddlemanResult, Query, QueryBus,
        QueryHandler, WeakMiddleman,
    };
    pub use async_trait::async_trait;
    pub use tokio_util::sync::CancellationToken;
}
