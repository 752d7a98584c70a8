//! Message contracts.
//!
//! Every message routed by the [`Middleman`](crate::Middleman) is one of three
//! kinds:
//!
//! - [`Command`] - an intent to perform an action; exactly one handler, no result
//! - [`Query`] - a request for data; exactly one handler, returns [`Query::Result`]
//! - [`Event`] - something that happened; zero or more handlers
//!
//! The traits are plain markers. Use `#[derive(Command)]`, `#[derive(Query)]`
//! or `#[derive(Event)]` from `middleman-macros` to implement them:
//!
//! ```rust,ignore
//! #[derive(Query)]
//! #[query(result = UserDto)]
//! pub struct GetUserQuery {
//!     pub id: u64,
//! }
//! ```
//!
//! [`AnyMessage`] erases the concrete type of a message while remembering it,
//! which is what the dynamic entry points route on.

use std::any::{Any, TypeId};
use std::fmt;

/// A message representing an intent to perform an action.
pub trait Command: Send + Sync + 'static {}

/// A message requesting data.
pub trait Query: Send + Sync + 'static {
    /// The value produced by the query's handler.
    type Result: Send + 'static;
}

/// A message representing something that happened.
pub trait Event: Send + Sync + 'static {}

/// The three kinds of routable messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    Query,
    Event,
}

impl MessageKind {
    /// Returns the lowercase name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query => "query",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Type identity
// ============================================================================

/// Identity of a Rust type: its [`TypeId`] plus a readable name for logs.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Returns the identity of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl std::hash::Hash for TypeInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// AnyMessage
// ============================================================================

/// An owned message whose concrete type is only known at runtime.
///
/// Typical sources are deserialized payloads or queues that carry several
/// message types. The concrete type is recorded at construction, so routing
/// never has to guess it from the erased box.
pub struct AnyMessage {
    inner: Box<dyn Any + Send + Sync>,
    message_type: TypeInfo,
}

impl AnyMessage {
    /// Erases `message`.
    pub fn new<M: Any + Send + Sync>(message: M) -> Self {
        Self {
            inner: Box::new(message),
            message_type: TypeInfo::of::<M>(),
        }
    }

    /// Returns the concrete type of the wrapped message.
    pub fn message_type(&self) -> TypeInfo {
        self.message_type
    }

    /// Returns `true` if the wrapped message is an `M`.
    pub fn is<M: Any>(&self) -> bool {
        self.message_type.id() == TypeId::of::<M>()
    }

    /// Borrows the wrapped message as an `M`.
    pub fn downcast_ref<M: Any>(&self) -> Option<&M> {
        self.inner.downcast_ref()
    }

    /// Takes the wrapped message back as an `M`, or returns `self` unchanged.
    pub fn downcast<M: Any>(self) -> Result<M, Self> {
        let message_type = self.message_type;
        self.inner
            .downcast::<M>()
            .map(|boxed| *boxed)
            .map_err(|inner| Self {
                inner,
                message_type,
            })
    }
}

impl fmt::Debug for AnyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyMessage")
            .field("message_type", &self.message_type.name())
            .finish_non_exhaustive()
    }
}
