//! Service registration.
//!
//! [`ServiceCollection`] gathers handler registrations and, alongside them,
//! the two pieces of routing metadata that depend on them: declared handler
//! orders and the dynamic dispatch table.
//!
//! ```rust,ignore
//! let mut services = ServiceCollection::new();
//! services
//!     .add_command_handler::<PlaceOrder, _>(Lifetime::Scoped, PlaceOrderHandler::default)
//!     .add_event_handler::<OrderPlaced, _>(Lifetime::Singleton, || SendReceiptHandler)
//!     .add_event_handler::<OrderPlaced, _>(Lifetime::Transient, || UpdateInventoryHandler);
//! let middleman = services.build_middleman();
//! ```

use std::sync::Arc;

use middleman_core::{
    Command, CommandHandler, DEFAULT_HANDLER_ORDER, DispatchTable, Event, EventHandler,
    HandlerOrder, Middleman, OrderMetadata, Query, QueryHandler,
};

use crate::descriptor::{Lifetime, ServiceDescriptor};
use crate::provider::ServiceProvider;

/// Collects service registrations and builds a [`ServiceProvider`].
#[derive(Debug)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    order: OrderMetadata,
    default_order: i32,
    routes: DispatchTable,
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self {
            descriptors: Vec::new(),
            order: OrderMetadata::new(),
            default_order: DEFAULT_HANDLER_ORDER,
            routes: DispatchTable::new(),
        }
    }
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `I` under the contract `T`.
    ///
    /// Handlers should go through the `add_*_handler` methods instead, which
    /// also make their message type routable dynamically.
    pub fn add_service<T, I, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        I: 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.descriptors
            .push(ServiceDescriptor::new::<T, I, F>(lifetime, factory));
        self
    }

    /// Registers `H` as the handler of command `C`.
    ///
    /// Registering a second handler for the same command replaces the first.
    pub fn add_command_handler<C, H>(
        &mut self,
        lifetime: Lifetime,
        factory: impl Fn() -> H + Send + Sync + 'static,
    ) -> &mut Self
    where
        C: Command,
        H: CommandHandler<C>,
    {
        self.routes.register_command::<C>();
        self.add_service::<dyn CommandHandler<C>, H, _>(lifetime, move || {
            Arc::new(factory()) as Arc<dyn CommandHandler<C>>
        })
    }

    /// Registers `H` as the handler of query `Q`.
    ///
    /// Registering a second handler for the same query replaces the first.
    pub fn add_query_handler<Q, H>(
        &mut self,
        lifetime: Lifetime,
        factory: impl Fn() -> H + Send + Sync + 'static,
    ) -> &mut Self
    where
        Q: Query,
        H: QueryHandler<Q>,
    {
        self.routes.register_query::<Q>();
        self.add_service::<dyn QueryHandler<Q>, H, _>(lifetime, move || {
            Arc::new(factory()) as Arc<dyn QueryHandler<Q>>
        })
    }

    /// Adds `H` to the handlers of event `E`.
    ///
    /// `H`'s [`HandlerOrder`] is declared along with it, so the order set by
    /// `#[derive(HandlerOrder)]` always applies.
    pub fn add_event_handler<E, H>(
        &mut self,
        lifetime: Lifetime,
        factory: impl Fn() -> H + Send + Sync + 'static,
    ) -> &mut Self
    where
        E: Event,
        H: EventHandler<E> + HandlerOrder,
    {
        self.order.declare_from::<H>();
        self.routes.register_event::<E>();
        self.add_service::<dyn EventHandler<E>, H, _>(lifetime, move || {
            Arc::new(factory()) as Arc<dyn EventHandler<E>>
        })
    }

    /// Declares `order` for the handler type `H`.
    ///
    /// Only the first declaration of a type takes effect, so this only
    /// changes handlers whose [`HandlerOrder`] declares nothing.
    pub fn declare_order<H: ?Sized + 'static>(&mut self, order: i32) -> &mut Self {
        self.order.declare_for::<H>(order);
        self
    }

    /// Makes `E` routable dynamically even when it has no handlers.
    pub fn register_event<E: Event>(&mut self) -> &mut Self {
        self.routes.register_event::<E>();
        self
    }

    /// Sets the order of handlers that declare none.
    pub fn default_handler_order(&mut self, order: i32) -> &mut Self {
        self.default_order = order;
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Freezes the registrations into a provider.
    pub fn build(self) -> ServiceProvider {
        ServiceProvider::new(self.descriptors, self.order, self.default_order, self.routes)
    }

    /// Builds the provider and a router over it.
    pub fn build_middleman(self) -> Middleman {
        Arc::new(self.build()).middleman()
    }
}
