//! Error types for the Middleman routing core.
//!
//! Routing failures are reported through [`MiddlemanError`]. Errors raised by
//! handlers travel through the [`MiddlemanError::Handler`] variant untouched,
//! so callers can always get the original error back by downcasting.

use thiserror::Error;

use crate::message::MessageKind;

/// Error type returned by handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by handlers.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// Returned by a handler that observed cancellation of its dispatch.
///
/// The router treats it like any other handler failure: it is propagated to
/// the caller and halts any remaining event fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("dispatch was cancelled")]
pub struct Cancelled;

// =============================================================================
// Routing Errors
// =============================================================================

/// Errors that can occur while routing a message.
#[derive(Debug, Error)]
pub enum MiddlemanError {
    /// A required message argument was absent.
    #[error("argument `{0}` is required")]
    ArgumentRequired(&'static str),

    /// No handler is registered for a command or query type.
    #[error("handler for {kind} type `{message_type}` is not registered")]
    HandlerNotRegistered {
        /// The kind of message that was dispatched.
        kind: MessageKind,
        /// Type name of the message.
        message_type: &'static str,
    },

    /// A dynamically typed message is not registered as the expected kind.
    #[error("`{type_name}` is not a registered {expected}")]
    UnsupportedMessageKind {
        /// Runtime type name of the rejected value.
        type_name: &'static str,
        /// What the entry point expected to receive.
        expected: String,
    },

    /// A handler failed. The original error is kept as is.
    #[error(transparent)]
    Handler(HandlerError),
}

impl MiddlemanError {
    /// Creates an unsupported message kind error.
    pub fn unsupported(type_name: &'static str, expected: impl Into<String>) -> Self {
        Self::UnsupportedMessageKind {
            type_name,
            expected: expected.into(),
        }
    }

    /// Returns the handler error, if this is a handler failure.
    pub fn handler_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Handler(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Downcasts a handler failure to the concrete error type it was raised as.
    pub fn downcast_handler_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        self.handler_error().and_then(|err| err.downcast_ref::<T>())
    }

    /// Unwraps the handler error, giving back `self` for routing failures.
    pub fn into_handler_error(self) -> Result<HandlerError, Self> {
        match self {
            Self::Handler(err) => Ok(err),
            other => Err(other),
        }
    }

    /// Returns `true` if a handler failed with [`Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        self.downcast_handler_ref::<Cancelled>().is_some()
    }
}

/// Result type for routing operations.
pub type MiddlemanResult<T> = Result<T, MiddlemanError>;
