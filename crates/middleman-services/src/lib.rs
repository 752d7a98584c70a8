//! # Middleman Services
//!
//! The default handler lookup for the Middleman router.
//!
//! Handlers are registered on a [`ServiceCollection`] with a [`Lifetime`],
//! then frozen into a [`ServiceProvider`]. The provider implements
//! [`ServiceLookup`](middleman_core::ServiceLookup): the router opens one
//! [`Scope`] per dispatch call and drops it when the call ends.
//!
//! ```rust,ignore
//! use middleman_services::{Lifetime, ServiceCollection};
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .add_query_handler::<GetUserQuery, _>(Lifetime::Scoped, || GetUserHandler)
//!     .add_event_handler::<OrderPlaced, _>(Lifetime::Singleton, || SendReceiptHandler);
//!
//! let middleman = services.build_middleman();
//! ```

pub mod collection;
pub mod descriptor;
pub mod provider;

pub use collection::ServiceCollection;
pub use descriptor::{Lifetime, ServiceDescriptor, ServiceFactory};
pub use provider::{Scope, ServiceProvider};
