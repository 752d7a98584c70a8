//! Handler lookup contract.
//!
//! The router never constructs handlers itself. It asks a [`ServiceLookup`]
//! for a [`ServiceScope`], resolves handlers from the scope by contract type
//! and drops the scope when the dispatch call ends, on every exit path.
//!
//! Services are stored type-erased as [`ServiceArc`]: an `Arc<dyn Any>` whose
//! concrete value is the `Arc<dyn Contract>` registered for the contract.
//! [`ServiceScope::get`] and [`ServiceScope::get_all`] downcast it back:
//!
//! ```rust,ignore
//! let scope = lookup.create_scope();
//! let handler = scope.get::<dyn CommandHandler<PlaceOrder>>();
//! ```
//!
//! `middleman-services` provides the default implementation.

use std::any::{Any, TypeId};
use std::sync::Arc;

use tracing::warn;

use crate::message::TypeInfo;

/// A type-erased service instance.
///
/// The inner `dyn Any` is an `Arc<dyn Contract>` upcast to `Any`.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// A service resolved from a scope, together with its implementation type.
#[derive(Clone)]
pub struct ResolvedService {
    /// The concrete type registered for the contract.
    pub implementation: TypeInfo,
    /// The erased instance.
    pub instance: ServiceArc,
}

/// A service resolved and downcast to its contract type.
pub struct Resolved<T: ?Sized> {
    /// The concrete type behind `instance`.
    pub implementation: TypeInfo,
    pub instance: Arc<T>,
}

impl<T: ?Sized> Clone for Resolved<T> {
    fn clone(&self) -> Self {
        Self {
            implementation: self.implementation,
            instance: Arc::clone(&self.instance),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for Resolved<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("implementation", &self.implementation.name())
            .finish_non_exhaustive()
    }
}

/// Opens resolution scopes.
pub trait ServiceLookup: Send + Sync {
    /// Opens a new scope. Scoped services live until the scope is dropped.
    fn create_scope(&self) -> Box<dyn ServiceScope>;
}

/// A resolution scope for one dispatch call.
///
/// Dropping the scope releases every scoped instance it created.
pub trait ServiceScope: Send + Sync {
    /// Resolves every service registered for `contract`, in registration order.
    fn resolve_all(&self, contract: TypeId) -> Vec<ResolvedService>;

    /// Resolves a single service for `contract`.
    ///
    /// When several services are registered, the last registration wins.
    /// The default resolves every registration and keeps the last, which
    /// builds instances that are then thrown away; implementations that can
    /// pick the last registration directly should override it.
    fn resolve(&self, contract: TypeId) -> Option<ResolvedService> {
        self.resolve_all(contract).pop()
    }
}

impl<'s> dyn ServiceScope + 's {
    /// Resolves the service registered for contract `T`.
    pub fn get<T: ?Sized + 'static>(&self) -> Option<Resolved<T>> {
        self.resolve(TypeId::of::<T>()).and_then(downcast::<T>)
    }

    /// Resolves every service registered for contract `T`, in registration order.
    pub fn get_all<T: ?Sized + 'static>(&self) -> Vec<Resolved<T>> {
        self.resolve_all(TypeId::of::<T>())
            .into_iter()
            .filter_map(downcast::<T>)
            .collect()
    }
}

fn downcast<T: ?Sized + 'static>(service: ResolvedService) -> Option<Resolved<T>> {
    match service.instance.downcast_ref::<Arc<T>>() {
        Some(instance) => Some(Resolved {
            implementation: service.implementation,
            instance: Arc::clone(instance),
        }),
        None => {
            warn!(
                contract = std::any::type_name::<T>(),
                implementation = service.implementation.name(),
                "Service registered under a contract it does not implement, skipped"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    struct French;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    struct FixedScope(Vec<ResolvedService>);

    impl ServiceScope for FixedScope {
        fn resolve_all(&self, contract: TypeId) -> Vec<ResolvedService> {
            if contract == TypeId::of::<dyn Greeter>() {
                self.0.clone()
            } else {
                Vec::new()
            }
        }
    }

    fn erased<T: Greeter + 'static>(greeter: T) -> ResolvedService {
        let instance: Arc<dyn Greeter> = Arc::new(greeter);
        ResolvedService {
            implementation: TypeInfo::of::<T>(),
            instance: Arc::new(instance),
        }
    }

    #[test]
    fn get_all_keeps_registration_order() {
        let scope: Box<dyn ServiceScope> = Box::new(FixedScope(vec![erased(English), erased(French)]));
        let greeters = scope.get_all::<dyn Greeter>();
        let words: Vec<_> = greeters.iter().map(|g| g.instance.greet()).collect();
        assert_eq!(words, ["hello", "bonjour"]);
        assert_eq!(greeters[1].implementation, TypeInfo::of::<French>());
    }

    #[test]
    fn get_returns_last_registration() {
        let scope: Box<dyn ServiceScope> = Box::new(FixedScope(vec![erased(English), erased(French)]));
        let greeter = scope.get::<dyn Greeter>().unwrap();
        assert_eq!(greeter.instance.greet(), "bonjour");
    }

    #[test]
    fn mismatched_instance_is_skipped() {
        let bogus = ResolvedService {
            implementation: TypeInfo::of::<u8>(),
            instance: Arc::new(5u8),
        };
        let scope: Box<dyn ServiceScope> = Box::new(FixedScope(vec![bogus, erased(English)]));
        assert_eq!(scope.get_all::<dyn Greeter>().len(), 1);
    }

    #[test]
    fn unknown_contract_resolves_nothing() {
        let scope: Box<dyn ServiceScope> = Box::new(FixedScope(vec![erased(English)]));
        assert!(scope.get::<dyn Fn() + Send + Sync>().is_none());
    }
}
