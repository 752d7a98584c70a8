//! Event handler ordering.
//!
//! Event handlers run in ascending order of an integer priority. A handler
//! type gets its priority from [`OrderMetadata`] declared at registration
//! time, either explicitly or through the [`HandlerOrder`] capability that
//! every registered event handler implements, usually via
//! `#[derive(HandlerOrder)]`:
//!
//! ```rust,ignore
//! #[derive(HandlerOrder)]
//! #[order(500)]
//! struct SendReceiptHandler;
//! ```
//!
//! Types without a declaration run at [`DEFAULT_HANDLER_ORDER`].
//! [`HandlerOrderResolver`] caches the effective order per handler type.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::message::TypeInfo;

/// Order of an event handler type that declares none.
pub const DEFAULT_HANDLER_ORDER: i32 = 1000;

/// Declarative ordering metadata of a handler type.
///
/// Every event handler carries it, since registration reads it from the
/// concrete type. Implemented by `#[derive(HandlerOrder)]`, where each
/// `#[order(N)]` attribute contributes one value and only the first one is
/// used. An empty `ORDERS` means the default order:
///
/// ```rust,ignore
/// impl HandlerOrder for UpdateInventoryHandler {}
/// ```
pub trait HandlerOrder {
    const ORDERS: &'static [i32] = &[];
}

// =============================================================================
// OrderMetadata
// =============================================================================

/// Order values declared per handler type, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct OrderMetadata {
    declared: HashMap<TypeId, Vec<i32>>,
}

impl OrderMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `order` for the handler type `handler`.
    ///
    /// Declarations accumulate; a later declaration does not replace an
    /// earlier one.
    pub fn declare(&mut self, handler: TypeId, order: i32) {
        self.declared.entry(handler).or_default().push(order);
    }

    /// Declares `order` for `H`.
    pub fn declare_for<H: ?Sized + 'static>(&mut self, order: i32) {
        self.declare(TypeId::of::<H>(), order);
    }

    /// Declares every order carried by `H`'s [`HandlerOrder`] implementation.
    pub fn declare_from<H: HandlerOrder + 'static>(&mut self) {
        for &order in H::ORDERS {
            self.declare_for::<H>(order);
        }
    }

    /// Returns every order declared for `handler`.
    pub fn declared(&self, handler: TypeId) -> &[i32] {
        self.declared.get(&handler).map(Vec::as_slice).unwrap_or(&[])
    }
}

// =============================================================================
// HandlerOrderResolver
// =============================================================================

/// Resolves and caches the effective order of handler types.
///
/// The cache is the only state shared between dispatch calls. Racing lookups
/// of the same type compute the same value, and the first insert wins.
#[derive(Debug)]
pub struct HandlerOrderResolver {
    metadata: Arc<OrderMetadata>,
    default_order: i32,
    cache: RwLock<HashMap<TypeId, i32>>,
}

impl Default for HandlerOrderResolver {
    fn default() -> Self {
        Self::new(Arc::new(OrderMetadata::default()))
    }
}

impl HandlerOrderResolver {
    /// Creates a resolver over `metadata` with the standard default order.
    pub fn new(metadata: Arc<OrderMetadata>) -> Self {
        Self::with_default_order(metadata, DEFAULT_HANDLER_ORDER)
    }

    /// Creates a resolver whose undeclared handlers run at `default_order`.
    pub fn with_default_order(metadata: Arc<OrderMetadata>, default_order: i32) -> Self {
        Self {
            metadata,
            default_order,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the order that undeclared handlers run at.
    pub fn default_order(&self) -> i32 {
        self.default_order
    }

    /// Returns the effective order of the handler type `handler`.
    pub fn order_of(&self, handler: &TypeInfo) -> i32 {
        if let Some(&order) = self.cache.read().get(&handler.id()) {
            return order;
        }

        let order = self
            .metadata
            .declared(handler.id())
            .first()
            .copied()
            .unwrap_or(self.default_order);
        trace!(handler = handler.name(), order, "Resolved handler order");

        *self.cache.write().entry(handler.id()).or_insert(order)
    }

    /// Returns the number of handler types cached so far.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SendReceipt;
    struct UpdateInventory;
    struct Audit;

    impl HandlerOrder for UpdateInventory {}

    impl HandlerOrder for Audit {
        const ORDERS: &'static [i32] = &[10, 20];
    }

    #[test]
    fn undeclared_handler_gets_default_order() {
        let mut metadata = OrderMetadata::new();
        metadata.declare_from::<UpdateInventory>();
        assert!(metadata.declared(TypeId::of::<UpdateInventory>()).is_empty());

        let resolver = HandlerOrderResolver::new(Arc::new(metadata));
        assert_eq!(resolver.order_of(&TypeInfo::of::<UpdateInventory>()), 1000);
    }

    #[test]
    fn declared_order_is_used() {
        let mut metadata = OrderMetadata::new();
        metadata.declare_for::<SendReceipt>(500);
        let resolver = HandlerOrderResolver::new(Arc::new(metadata));

        assert_eq!(resolver.order_of(&TypeInfo::of::<SendReceipt>()), 500);
        assert_eq!(resolver.order_of(&TypeInfo::of::<UpdateInventory>()), 1000);
    }

    #[test]
    fn first_declaration_wins() {
        let mut metadata = OrderMetadata::new();
        metadata.declare_for::<SendReceipt>(300);
        metadata.declare_for::<SendReceipt>(100);
        metadata.declare_from::<Audit>();
        assert_eq!(metadata.declared(TypeId::of::<Audit>()), &[10, 20]);

        let resolver = HandlerOrderResolver::new(Arc::new(metadata));
        assert_eq!(resolver.order_of(&TypeInfo::of::<SendReceipt>()), 300);
        assert_eq!(resolver.order_of(&TypeInfo::of::<Audit>()), 10);
    }

    #[test]
    fn results_are_cached_per_type() {
        let resolver = HandlerOrderResolver::with_default_order(Arc::default(), 50);
        assert_eq!(resolver.cached_len(), 0);

        resolver.order_of(&TypeInfo::of::<SendReceipt>());
        resolver.order_of(&TypeInfo::of::<SendReceipt>());
        assert_eq!(resolver.cached_len(), 1);

        assert_eq!(resolver.order_of(&TypeInfo::of::<UpdateInventory>()), 50);
        assert_eq!(resolver.cached_len(), 2);
    }

    #[test]
    fn concurrent_lookups_agree() {
        let mut metadata = OrderMetadata::new();
        metadata.declare_for::<SendReceipt>(500);
        let resolver = Arc::new(HandlerOrderResolver::new(Arc::new(metadata)));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                std::thread::spawn(move || resolver.order_of(&TypeInfo::of::<SendReceipt>()))
            })
            .collect();

        for thread in threads {
            assert_eq!(thread.join().unwrap(), 500);
        }
        assert_eq!(resolver.cached_len(), 1);
    }
}
