//! The router façade.
//!
//! [`Middleman`] routes messages to handlers resolved from a
//! [`ServiceLookup`]. Its typed entry points are split across three bus
//! traits so consumers can depend on exactly the capability they use:
//!
//! - [`CommandBus::send`] - resolve one command handler and invoke it
//! - [`QueryBus::query`] - resolve one query handler and return its result
//! - [`EventBus::notify`] - fan the event out through an [`EventDispatcher`]
//!
//! Each call opens one lookup scope and drops it when the call ends, whether
//! the handler succeeded, failed, or the future was dropped.
//!
//! ```rust,ignore
//! let cancel = CancellationToken::new();
//! middleman.send(&PlaceOrder { sku: 42 }, &cancel).await?;
//! let user = middleman.query(&GetUserQuery { id: 7 }, &cancel).await?;
//! middleman.notify(&OrderPlaced { order_id: 1 }, &cancel).await?;
//! ```

use std::any::type_name;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, trace};

use crate::dispatcher::{EventDispatcher, PlannedHandler};
use crate::dynamic::DispatchTable;
use crate::error::{MiddlemanError, MiddlemanResult};
use crate::handler::{CommandHandler, QueryHandler};
use crate::lookup::ServiceLookup;
use crate::message::{Command, Event, MessageKind, Query};
use crate::order::HandlerOrderResolver;

// ============================================================================
// Bus traits
// ============================================================================

/// Sends commands to their single handler.
#[async_trait]
pub trait CommandBus: Send + Sync {
    /// Invokes the handler registered for `C`.
    ///
    /// Fails with [`MiddlemanError::HandlerNotRegistered`] when there is none.
    async fn send<C: Command>(&self, command: &C, cancel: &CancellationToken)
    -> MiddlemanResult<()>;
}

/// Sends queries to their single handler.
#[async_trait]
pub trait QueryBus: Send + Sync {
    /// Invokes the handler registered for `Q` and returns its result.
    ///
    /// Fails with [`MiddlemanError::HandlerNotRegistered`] when there is none.
    async fn query<Q: Query>(
        &self,
        query: &Q,
        cancel: &CancellationToken,
    ) -> MiddlemanResult<Q::Result>;

    /// Builds a `Q` from its default value and dispatches it.
    ///
    /// ```rust,ignore
    /// let users = bus.query_with(|q: &mut ListUsers| q.page = 2, &cancel).await?;
    /// ```
    async fn query_with<Q, F>(&self, build: F, cancel: &CancellationToken) -> MiddlemanResult<Q::Result>
    where
        Q: Query + Default,
        F: FnOnce(&mut Q) + Send,
    {
        let mut query = Q::default();
        build(&mut query);
        self.query(&query, cancel).await
    }
}

/// Publishes events to every handler registered for them.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Invokes all `E` handlers in order, stopping at the first failure.
    ///
    /// An event without handlers is not an error.
    async fn notify<E: Event>(&self, event: &E, cancel: &CancellationToken) -> MiddlemanResult<()>;
}

// ============================================================================
// Middleman
// ============================================================================

/// The message router.
///
/// Cheap to clone; clones share the lookup service, the order cache and the
/// dynamic dispatch table.
#[derive(Clone)]
pub struct Middleman {
    lookup: Arc<dyn ServiceLookup>,
    resolver: Arc<HandlerOrderResolver>,
    routes: Arc<DispatchTable>,
}

impl Middleman {
    /// Creates a router over `lookup` with default ordering and no dynamic routes.
    pub fn new(lookup: Arc<dyn ServiceLookup>) -> Self {
        Self {
            lookup,
            resolver: Arc::new(HandlerOrderResolver::default()),
            routes: Arc::new(DispatchTable::new()),
        }
    }

    /// Replaces the handler order resolver.
    pub fn with_resolver(mut self, resolver: Arc<HandlerOrderResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the dynamic dispatch table.
    pub fn with_routes(mut self, routes: DispatchTable) -> Self {
        self.routes = Arc::new(routes);
        self
    }

    pub fn resolver(&self) -> &HandlerOrderResolver {
        &self.resolver
    }

    pub fn routes(&self) -> &DispatchTable {
        &self.routes
    }

    /// Returns the handlers a notify of `E` would invoke, in invocation order.
    pub fn event_plan<E: Event>(&self) -> Vec<PlannedHandler> {
        let scope = self.lookup.create_scope();
        EventDispatcher::<E>::from_scope(scope.as_ref(), Arc::clone(&self.resolver)).plan()
    }

    /// Returns a handle that does not keep the lookup service alive.
    ///
    /// Handlers owned by the lookup hold this instead of a [`Middleman`] when
    /// they dispatch further messages, so the lookup and its handlers do not
    /// keep each other alive.
    pub fn downgrade(&self) -> WeakMiddleman {
        WeakMiddleman {
            lookup: Arc::downgrade(&self.lookup),
            resolver: Arc::clone(&self.resolver),
            routes: Arc::clone(&self.routes),
        }
    }
}

/// A [`Middleman`] that does not own its lookup service.
#[derive(Clone)]
pub struct WeakMiddleman {
    lookup: Weak<dyn ServiceLookup>,
    resolver: Arc<HandlerOrderResolver>,
    routes: Arc<DispatchTable>,
}

impl WeakMiddleman {
    /// Returns the router, or `None` once its lookup service has been dropped.
    pub fn upgrade(&self) -> Option<Middleman> {
        Some(Middleman {
            lookup: self.lookup.upgrade()?,
            resolver: Arc::clone(&self.resolver),
            routes: Arc::clone(&self.routes),
        })
    }
}

impl std::fmt::Debug for WeakMiddleman {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakMiddleman")
            .field("alive", &(self.lookup.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Middleman {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Middleman")
            .field("default_order", &self.resolver.default_order())
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CommandBus for Middleman {
    async fn send<C: Command>(&self, command: &C, cancel: &CancellationToken) -> MiddlemanResult<()> {
        let message_type = type_name::<C>();
        debug!(command = message_type, "Command was fired");

        let scope = self.lookup.create_scope();
        let handler = scope.get::<dyn CommandHandler<C>>().ok_or(
            MiddlemanError::HandlerNotRegistered {
                kind: MessageKind::Command,
                message_type,
            },
        )?;

        let name = handler.implementation.name();
        trace!(handler = name, "Executing command handler");
        handler
            .instance
            .handle(command, cancel)
            .instrument(debug_span!("send", command = message_type, handler = name))
            .await
            .map_err(MiddlemanError::Handler)
    }
}

#[async_trait]
impl QueryBus for Middleman {
    async fn query<Q: Query>(
        &self,
        query: &Q,
        cancel: &CancellationToken,
    ) -> MiddlemanResult<Q::Result> {
        let message_type = type_name::<Q>();
        debug!(query = message_type, "Query was fired");

        let scope = self.lookup.create_scope();
        let handler = scope.get::<dyn QueryHandler<Q>>().ok_or(
            MiddlemanError::HandlerNotRegistered {
                kind: MessageKind::Query,
                message_type,
            },
        )?;

        let name = handler.implementation.name();
        trace!(handler = name, "Executing query handler");
        handler
            .instance
            .handle(query, cancel)
            .instrument(debug_span!("query", query = message_type, handler = name))
            .await
            .map_err(MiddlemanError::Handler)
    }
}

#[async_trait]
impl EventBus for Middleman {
    async fn notify<E: Event>(&self, event: &E, cancel: &CancellationToken) -> MiddlemanResult<()> {
        let message_type = type_name::<E>();
        debug!(event = message_type, "Event was fired");

        let scope = self.lookup.create_scope();
        let dispatcher = EventDispatcher::<E>::from_scope(scope.as_ref(), Arc::clone(&self.resolver));
        dispatcher
            .dispatch(event, cancel)
            .instrument(debug_span!("notify", event = message_type))
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Cancelled, HandlerResult};
    use crate::handler::EventHandler;
    use crate::lookup::{ResolvedService, ServiceArc, ServiceScope};
    use crate::message::TypeInfo;
    use crate::order::OrderMetadata;
    use parking_lot::Mutex;
    use std::any::TypeId;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A fixed lookup that counts opened and released scopes.
    #[derive(Default)]
    pub(crate) struct TestLookup {
        services: HashMap<TypeId, Vec<ResolvedService>>,
        pub(crate) opened: Arc<AtomicUsize>,
        pub(crate) released: Arc<AtomicUsize>,
    }

    impl TestLookup {
        pub(crate) fn add<T: ?Sized + Send + Sync + 'static, I: 'static>(&mut self, instance: Arc<T>) {
            let erased: ServiceArc = Arc::new(instance);
            self.services
                .entry(TypeId::of::<T>())
                .or_default()
                .push(ResolvedService {
                    implementation: TypeInfo::of::<I>(),
                    instance: erased,
                });
        }
    }

    struct TestScope {
        services: HashMap<TypeId, Vec<ResolvedService>>,
        released: Arc<AtomicUsize>,
    }

    impl ServiceScope for TestScope {
        fn resolve_all(&self, contract: TypeId) -> Vec<ResolvedService> {
            self.services.get(&contract).cloned().unwrap_or_default()
        }
    }

    impl Drop for TestScope {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ServiceLookup for TestLookup {
        fn create_scope(&self) -> Box<dyn ServiceScope> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Box::new(TestScope {
                services: self.services.clone(),
                released: Arc::clone(&self.released),
            })
        }
    }

    // ------------------------------------------------------------------------

    pub(crate) struct PlaceOrder {
        pub(crate) sku: u32,
    }
    impl Command for PlaceOrder {}

    #[derive(Default)]
    pub(crate) struct GetUser {
        pub(crate) id: u64,
    }
    impl Query for GetUser {
        type Result = String;
    }

    pub(crate) struct OrderPlaced;
    impl Event for OrderPlaced {}

    #[derive(Debug, thiserror::Error)]
    #[error("sku {0} is out of stock")]
    pub(crate) struct OutOfStock(pub(crate) u32);

    #[derive(Default)]
    pub(crate) struct PlaceOrderHandler {
        pub(crate) calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandHandler<PlaceOrder> for PlaceOrderHandler {
        async fn handle(&self, command: &PlaceOrder, _cancel: &CancellationToken) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if command.sku == 0 {
                return Err(OutOfStock(command.sku).into());
            }
            Ok(())
        }
    }

    pub(crate) struct GetUserHandler;

    #[async_trait]
    impl QueryHandler<GetUser> for GetUserHandler {
        async fn handle(&self, query: &GetUser, cancel: &CancellationToken) -> HandlerResult<String> {
            if cancel.is_cancelled() {
                return Err(Cancelled.into());
            }
            Ok(format!("user-{}", query.id))
        }
    }

    pub(crate) struct SendReceipt(pub(crate) Arc<Mutex<Vec<&'static str>>>);
    pub(crate) struct UpdateInventory(pub(crate) Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl EventHandler<OrderPlaced> for SendReceipt {
        async fn handle(&self, _event: &OrderPlaced, _cancel: &CancellationToken) -> HandlerResult {
            self.0.lock().push("receipt");
            Ok(())
        }
    }

    #[async_trait]
    impl EventHandler<OrderPlaced> for UpdateInventory {
        async fn handle(&self, _event: &OrderPlaced, _cancel: &CancellationToken) -> HandlerResult {
            self.0.lock().push("inventory");
            Ok(())
        }
    }

    /// Registers inventory first, receipt second, with receipt declared at 500.
    pub(crate) fn shop() -> (Middleman, Arc<TestLookup>, Arc<PlaceOrderHandler>, Arc<Mutex<Vec<&'static str>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let place_order = Arc::new(PlaceOrderHandler::default());

        let mut lookup = TestLookup::default();
        lookup.add::<dyn CommandHandler<PlaceOrder>, PlaceOrderHandler>(place_order.clone());
        lookup.add::<dyn QueryHandler<GetUser>, GetUserHandler>(Arc::new(GetUserHandler));
        lookup.add::<dyn EventHandler<OrderPlaced>, UpdateInventory>(Arc::new(UpdateInventory(log.clone())));
        lookup.add::<dyn EventHandler<OrderPlaced>, SendReceipt>(Arc::new(SendReceipt(log.clone())));
        let lookup = Arc::new(lookup);

        let mut metadata = OrderMetadata::new();
        metadata.declare_for::<SendReceipt>(500);

        let middleman = Middleman::new(lookup.clone())
            .with_resolver(Arc::new(HandlerOrderResolver::new(Arc::new(metadata))));
        (middleman, lookup, place_order, log)
    }

    #[tokio::test]
    async fn send_invokes_the_single_handler_once() {
        let (middleman, lookup, handler, _) = shop();
        middleman
            .send(&PlaceOrder { sku: 42 }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lookup.opened.load(Ordering::SeqCst), 1);
        assert_eq!(lookup.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_propagates_handler_error_and_releases_scope() {
        let (middleman, lookup, _, _) = shop();
        let err = middleman
            .send(&PlaceOrder { sku: 0 }, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "sku 0 is out of stock");
        assert!(err.downcast_handler_ref::<OutOfStock>().is_some());
        assert_eq!(lookup.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_without_handler_fails() {
        struct Unknown;
        impl Command for Unknown {}

        let (middleman, lookup, _, _) = shop();
        let err = middleman.send(&Unknown, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(
            err,
            MiddlemanError::HandlerNotRegistered {
                kind: MessageKind::Command,
                ..
            }
        ));
        assert_eq!(lookup.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn query_returns_handler_result() {
        let (middleman, _, _, _) = shop();
        let cancel = CancellationToken::new();

        assert_eq!(middleman.query(&GetUser { id: 7 }, &cancel).await.unwrap(), "user-7");
        assert_eq!(
            middleman.query_with(|q: &mut GetUser| q.id = 9, &cancel).await.unwrap(),
            "user-9"
        );
    }

    #[tokio::test]
    async fn query_observes_cancellation() {
        let (middleman, _, _, _) = shop();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = middleman.query(&GetUser { id: 1 }, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn notify_runs_handlers_by_order() {
        let (middleman, lookup, _, log) = shop();
        middleman.notify(&OrderPlaced, &CancellationToken::new()).await.unwrap();

        assert_eq!(*log.lock(), ["receipt", "inventory"]);
        assert_eq!(lookup.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn notify_without_handlers_is_a_no_op() {
        struct Nobody;
        impl Event for Nobody {}

        let (middleman, _, _, _) = shop();
        middleman.notify(&Nobody, &CancellationToken::new()).await.unwrap();
        assert!(middleman.event_plan::<Nobody>().is_empty());
    }

    #[test]
    fn event_plan_matches_notify_order() {
        let (middleman, _, _, _) = shop();
        let plan = middleman.event_plan::<OrderPlaced>();
        let names: Vec<_> = plan.iter().map(|p| (p.implementation, p.order)).collect();
        assert_eq!(
            names,
            [
                (TypeInfo::of::<SendReceipt>(), 500),
                (TypeInfo::of::<UpdateInventory>(), 1000),
            ]
        );
    }

    #[tokio::test]
    async fn weak_handle_lives_only_as_long_as_the_lookup() {
        let (middleman, lookup, handler, _) = shop();
        let weak = middleman.downgrade();

        weak.upgrade()
            .unwrap()
            .send(&PlaceOrder { sku: 3 }, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        drop(middleman);
        drop(lookup);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn concurrent_dispatches_share_the_router() {
        let (middleman, lookup, handler, _) = shop();
        let tasks: Vec<_> = (1..=8)
            .map(|sku| {
                let middleman = middleman.clone();
                tokio::spawn(async move {
                    middleman
                        .send(&PlaceOrder { sku }, &CancellationToken::new())
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 8);
        assert_eq!(lookup.released.load(Ordering::SeqCst), 8);
    }
}
