//! Service registrations.

use std::sync::Arc;

use middleman_core::{ServiceArc, TypeInfo};

/// How long a resolved instance is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance per provider, created on first resolution.
    Singleton,
    /// One instance per scope, i.e. per dispatch call.
    Scoped,
    /// A new instance on every resolution.
    Transient,
}

/// Creates one erased instance of a service.
///
/// The returned `dyn Any` holds the `Arc<dyn Contract>`, so
/// [`ServiceScope::get`](middleman_core::ServiceScope) can downcast it back.
pub type ServiceFactory = Arc<dyn Fn() -> ServiceArc + Send + Sync>;

/// One registered service: a contract, its implementation and how to build it.
#[derive(Clone)]
pub struct ServiceDescriptor {
    contract: TypeInfo,
    implementation: TypeInfo,
    lifetime: Lifetime,
    factory: ServiceFactory,
}

impl ServiceDescriptor {
    /// Describes `I` registered under the contract `T`.
    pub fn new<T, I, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        I: 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        Self {
            contract: TypeInfo::of::<T>(),
            implementation: TypeInfo::of::<I>(),
            lifetime,
            factory: Arc::new(move || -> ServiceArc { Arc::new(factory()) }),
        }
    }

    pub fn contract(&self) -> TypeInfo {
        self.contract
    }

    pub fn implementation(&self) -> TypeInfo {
        self.implementation
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub(crate) fn create(&self) -> ServiceArc {
        (self.factory)()
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("contract", &self.contract.name())
            .field("implementation", &self.implementation.name())
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}
