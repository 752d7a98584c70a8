//! The built service provider and its scopes.
//!
//! A [`ServiceProvider`] is immutable once built. Instances are created
//! lazily, according to the [`Lifetime`] of their registration:
//!
//! | Lifetime    | Created                        | Released                    |
//! |-------------|--------------------------------|-----------------------------|
//! | `Singleton` | once, on first resolution      | with the provider           |
//! | `Scoped`    | once per [`Scope`]             | when the scope is dropped   |
//! | `Transient` | on every resolution            | when the caller drops it    |

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use middleman_core::{
    DispatchTable, HandlerOrderResolver, Middleman, OrderMetadata, ResolvedService, ServiceArc,
    ServiceLookup, ServiceScope,
};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::descriptor::{Lifetime, ServiceDescriptor};

/// Registrations shared by the provider and all of its scopes.
struct Registry {
    descriptors: Vec<ServiceDescriptor>,
    /// Descriptor indices per contract, in registration order.
    by_contract: HashMap<TypeId, Vec<usize>>,
    singletons: Mutex<HashMap<usize, ServiceArc>>,
    live_scopes: AtomicUsize,
}

impl Registry {
    /// Returns the singleton of descriptor `index`, creating it on first use.
    ///
    /// The factory runs without the lock held, so it may resolve other
    /// singletons. Racing creations are discarded and the first insert wins.
    fn singleton(&self, index: usize) -> ServiceArc {
        if let Some(instance) = self.singletons.lock().get(&index) {
            return Arc::clone(instance);
        }

        let created = self.descriptors[index].create();
        Arc::clone(self.singletons.lock().entry(index).or_insert(created))
    }
}

// =============================================================================
// ServiceProvider
// =============================================================================

/// The default [`ServiceLookup`], built from a
/// [`ServiceCollection`](crate::ServiceCollection).
///
/// Besides the services, it carries the handler order declarations and the
/// dynamic dispatch table collected during registration, which
/// [`middleman`](Self::middleman) wires into a router.
pub struct ServiceProvider {
    registry: Arc<Registry>,
    order: Arc<OrderMetadata>,
    default_order: i32,
    routes: DispatchTable,
}

impl ServiceProvider {
    pub(crate) fn new(
        descriptors: Vec<ServiceDescriptor>,
        order: OrderMetadata,
        default_order: i32,
        routes: DispatchTable,
    ) -> Self {
        let mut by_contract: HashMap<TypeId, Vec<usize>> = HashMap::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            by_contract
                .entry(descriptor.contract().id())
                .or_default()
                .push(index);
        }

        debug!(
            services = descriptors.len(),
            contracts = by_contract.len(),
            routes = routes.len(),
            "Service provider built"
        );

        Self {
            registry: Arc::new(Registry {
                descriptors,
                by_contract,
                singletons: Mutex::new(HashMap::new()),
                live_scopes: AtomicUsize::new(0),
            }),
            order: Arc::new(order),
            default_order,
            routes,
        }
    }

    /// Opens a scope. Prefer [`ServiceLookup::create_scope`] when going
    /// through the router.
    pub fn scope(&self) -> Scope {
        Scope::new(Arc::clone(&self.registry))
    }

    /// Returns the number of scopes that are currently open.
    pub fn live_scopes(&self) -> usize {
        self.registry.live_scopes.load(Ordering::SeqCst)
    }

    /// Returns the number of registered services.
    pub fn len(&self) -> usize {
        self.registry.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.descriptors.is_empty()
    }

    /// Returns the order of event handlers that declare none.
    pub fn default_handler_order(&self) -> i32 {
        self.default_order
    }

    /// Returns every registration, in registration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.registry.descriptors
    }

    /// Creates a router that resolves its handlers from this provider.
    pub fn middleman(self: &Arc<Self>) -> Middleman {
        let resolver = HandlerOrderResolver::with_default_order(
            Arc::clone(&self.order),
            self.default_order,
        );
        let lookup: Arc<dyn ServiceLookup> = self.clone();
        Middleman::new(lookup)
            .with_resolver(Arc::new(resolver))
            .with_routes(self.routes.clone())
    }
}

impl ServiceLookup for ServiceProvider {
    fn create_scope(&self) -> Box<dyn ServiceScope> {
        Box::new(self.scope())
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.len())
            .field("live_scopes", &self.live_scopes())
            .field("default_order", &self.default_order)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Scope
// =============================================================================

/// A resolution scope of a [`ServiceProvider`].
///
/// Dropping the scope releases every scoped instance it created.
pub struct Scope {
    registry: Arc<Registry>,
    scoped: Mutex<HashMap<usize, ServiceArc>>,
}

impl Scope {
    fn new(registry: Arc<Registry>) -> Self {
        let live = registry.live_scopes.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(live, "Scope opened");
        Self {
            registry,
            scoped: Mutex::new(HashMap::new()),
        }
    }

    fn instance(&self, index: usize) -> ResolvedService {
        let descriptor = &self.registry.descriptors[index];
        let instance = match descriptor.lifetime() {
            Lifetime::Singleton => self.registry.singleton(index),
            Lifetime::Scoped => Arc::clone(
                self.scoped
                    .lock()
                    .entry(index)
                    .or_insert_with(|| descriptor.create()),
            ),
            Lifetime::Transient => descriptor.create(),
        };

        ResolvedService {
            implementation: descriptor.implementation(),
            instance,
        }
    }

    fn indices(&self, contract: TypeId) -> &[usize] {
        self.registry
            .by_contract
            .get(&contract)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl ServiceScope for Scope {
    fn resolve_all(&self, contract: TypeId) -> Vec<ResolvedService> {
        self.indices(contract)
            .iter()
            .map(|&index| self.instance(index))
            .collect()
    }

    fn resolve(&self, contract: TypeId) -> Option<ResolvedService> {
        self.indices(contract)
            .last()
            .map(|&index| self.instance(index))
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let live = self.registry.live_scopes.fetch_sub(1, Ordering::SeqCst) - 1;
        trace!(live, scoped = self.scoped.get_mut().len(), "Scope released");
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("scoped", &self.scoped.lock().len())
            .finish_non_exhaustive()
    }
}
