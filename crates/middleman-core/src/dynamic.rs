//! Routing of messages whose type is only known at runtime.
//!
//! A [`DispatchTable`] maps concrete message types to the typed router
//! entry point for their kind. The dynamic entry points on [`Middleman`]
//! look the runtime type of an [`AnyMessage`] up in the table and forward
//! to exactly the same `send`, `query` or `notify` the static call would
//! use, so ordering, halting and error propagation are identical.
//!
//! Only types registered in the table can be routed. The service
//! collection registers every message type it sees a handler for; events
//! without handlers can be added with [`DispatchTable::register_event`].
//!
//! ```rust,ignore
//! let message = AnyMessage::new(OrderPlaced { order_id: 1 });
//! middleman.notify_dynamic(Some(message), &cancel).await?;
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{MiddlemanError, MiddlemanResult};
use crate::message::{AnyMessage, Command, Event, MessageKind, Query, TypeInfo};
use crate::router::{CommandBus, EventBus, Middleman, QueryBus};

/// Type-erased output of a routed message.
pub type AnyOutput = Box<dyn Any + Send>;

type InvokeFn = for<'a> fn(
    &'a Middleman,
    AnyMessage,
    &'a CancellationToken,
) -> BoxFuture<'a, MiddlemanResult<AnyOutput>>;

/// How one message type is routed.
#[derive(Clone, Copy)]
pub struct Route {
    kind: MessageKind,
    message_type: TypeInfo,
    result_type: Option<TypeInfo>,
    invoke: InvokeFn,
}

impl Route {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn message_type(&self) -> TypeInfo {
        self.message_type
    }

    /// The result type, for query routes.
    pub fn result_type(&self) -> Option<TypeInfo> {
        self.result_type
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("kind", &self.kind)
            .field("message_type", &self.message_type.name())
            .field("result_type", &self.result_type.map(|r| r.name()))
            .finish()
    }
}

/// Routes from runtime message types to typed entry points.
///
/// Keyed by kind and type, so a type implementing both [`Command`] and
/// [`Event`] can be routed as either.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    routes: HashMap<(MessageKind, TypeId), Route>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `C` routable through [`Middleman::send_dynamic`].
    pub fn register_command<C: Command>(&mut self) -> &mut Self {
        self.insert(Route {
            kind: MessageKind::Command,
            message_type: TypeInfo::of::<C>(),
            result_type: None,
            invoke: invoke_command::<C>,
        })
    }

    /// Makes `Q` routable through [`Middleman::query_dynamic`].
    pub fn register_query<Q: Query>(&mut self) -> &mut Self {
        self.insert(Route {
            kind: MessageKind::Query,
            message_type: TypeInfo::of::<Q>(),
            result_type: Some(TypeInfo::of::<Q::Result>()),
            invoke: invoke_query::<Q>,
        })
    }

    /// Makes `E` routable through [`Middleman::notify_dynamic`].
    pub fn register_event<E: Event>(&mut self) -> &mut Self {
        self.insert(Route {
            kind: MessageKind::Event,
            message_type: TypeInfo::of::<E>(),
            result_type: None,
            invoke: invoke_event::<E>,
        })
    }

    fn insert(&mut self, route: Route) -> &mut Self {
        self.routes
            .insert((route.kind, route.message_type.id()), route);
        self
    }

    /// Returns the route of `message_type` as a message of `kind`.
    pub fn route(&self, kind: MessageKind, message_type: TypeId) -> Option<&Route> {
        self.routes.get(&(kind, message_type))
    }

    /// Returns `true` if `message_type` is routable as `kind`.
    pub fn contains(&self, kind: MessageKind, message_type: TypeId) -> bool {
        self.routes.contains_key(&(kind, message_type))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

// ============================================================================
// Typed trampolines
// ============================================================================

fn take<M: Any>(message: AnyMessage, kind: MessageKind) -> MiddlemanResult<M> {
    message
        .downcast::<M>()
        .map_err(|message| MiddlemanError::unsupported(message.message_type().name(), kind.as_str()))
}

fn invoke_command<'a, C: Command>(
    middleman: &'a Middleman,
    message: AnyMessage,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, MiddlemanResult<AnyOutput>> {
    Box::pin(async move {
        let command = take::<C>(message, MessageKind::Command)?;
        middleman.send(&command, cancel).await?;
        Ok(Box::new(()) as AnyOutput)
    })
}

fn invoke_query<'a, Q: Query>(
    middleman: &'a Middleman,
    message: AnyMessage,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, MiddlemanResult<AnyOutput>> {
    Box::pin(async move {
        let query = take::<Q>(message, MessageKind::Query)?;
        let result = middleman.query(&query, cancel).await?;
        Ok(Box::new(result) as AnyOutput)
    })
}

fn invoke_event<'a, E: Event>(
    middleman: &'a Middleman,
    message: AnyMessage,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, MiddlemanResult<AnyOutput>> {
    Box::pin(async move {
        let event = take::<E>(message, MessageKind::Event)?;
        middleman.notify(&event, cancel).await?;
        Ok(Box::new(()) as AnyOutput)
    })
}

// ============================================================================
// Dynamic entry points
// ============================================================================

impl Middleman {
    /// Finds the route for `message` as a `kind`, before any scope is opened.
    fn dynamic_route(
        &self,
        message: &AnyMessage,
        kind: MessageKind,
    ) -> MiddlemanResult<Route> {
        let message_type = message.message_type();
        debug!(
            message_type = message_type.name(),
            kind = kind.as_str(),
            "Routing dynamic message"
        );

        self.routes()
            .route(kind, message_type.id())
            .copied()
            .ok_or_else(|| MiddlemanError::unsupported(message_type.name(), kind.as_str()))
    }

    /// Sends a command whose type is known only at runtime.
    ///
    /// # Errors
    ///
    /// - [`MiddlemanError::ArgumentRequired`] if `command` is `None`
    /// - [`MiddlemanError::UnsupportedMessageKind`] if its type is not a registered command
    /// - anything [`CommandBus::send`] returns
    pub async fn send_dynamic(
        &self,
        command: Option<AnyMessage>,
        cancel: &CancellationToken,
    ) -> MiddlemanResult<()> {
        let command = command.ok_or(MiddlemanError::ArgumentRequired("command"))?;
        let route = self.dynamic_route(&command, MessageKind::Command)?;
        (route.invoke)(self, command, cancel).await.map(drop)
    }

    /// Sends a query whose type is known only at runtime and returns its result as `R`.
    ///
    /// Fails with [`MiddlemanError::UnsupportedMessageKind`] if the query is
    /// not registered, or if its result type is not `R`; in both cases no
    /// handler runs.
    pub async fn query_dynamic<R: Send + 'static>(
        &self,
        query: Option<AnyMessage>,
        cancel: &CancellationToken,
    ) -> MiddlemanResult<R> {
        let query = query.ok_or(MiddlemanError::ArgumentRequired("query"))?;
        let route = self.dynamic_route(&query, MessageKind::Query)?;

        let expected = || format!("query returning `{}`", type_name::<R>());
        if route.result_type().map(|result| result.id()) != Some(TypeId::of::<R>()) {
            return Err(MiddlemanError::unsupported(route.message_type().name(), expected()));
        }

        let output = (route.invoke)(self, query, cancel).await?;
        output
            .downcast::<R>()
            .map(|result| *result)
            .map_err(|_| MiddlemanError::unsupported(route.message_type().name(), expected()))
    }

    /// Publishes an event whose type is known only at runtime.
    ///
    /// Handlers run in the same order, with the same halting behavior, as
    /// [`EventBus::notify`] on the concrete type.
    pub async fn notify_dynamic(
        &self,
        event: Option<AnyMessage>,
        cancel: &CancellationToken,
    ) -> MiddlemanResult<()> {
        let event = event.ok_or(MiddlemanError::ArgumentRequired("event"))?;
        let route = self.dynamic_route(&event, MessageKind::Event)?;
        (route.invoke)(self, event, cancel).await.map(drop)
    }
}
