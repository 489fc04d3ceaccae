//! Failure and dispatch error types for the Courier core.
//!
//! Handler-origin failures are carried as a [`Failure`]: a cheaply clonable,
//! reference-counted error whose identity survives every layer it passes
//! through. Callers can check they got back *the* failure a handler raised
//! with [`Failure::ptr_eq`].

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::value::ReturnValue;

// =============================================================================
// Failure
// =============================================================================

/// A shared, identity-preserving error value.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into a `Failure`
/// with `?` or `.into()`. `Failure` deliberately does not implement
/// [`std::error::Error`] itself, so that the blanket conversion can exist.
#[derive(Clone)]
pub struct Failure(Arc<dyn StdError + Send + Sync + 'static>);

impl Failure {
    /// Wraps an error.
    pub fn new<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Self(Arc::new(error))
    }

    /// Creates a failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Wraps an already boxed error.
    pub fn from_boxed(error: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        Self(Arc::from(error))
    }

    /// Returns `true` if both values are the very same failure instance.
    pub fn ptr_eq(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the wrapped error as `E`, if that is its concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Returns the wrapped error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl<E: StdError + Send + Sync + 'static> From<E> for Failure {
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl AsRef<dyn StdError + Send + Sync + 'static> for Failure {
    fn as_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.as_error()
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct MessageError(String);

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors surfaced by handler invocation, the interceptor chain and the
/// unit of work.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No registered handler accepts the payload type.
    #[error("no handler found for payload type '{payload_type}'")]
    HandlerNotFound {
        /// Full name of the payload type.
        payload_type: &'static str,
    },

    /// No resolver strategy produced a value for a handler parameter.
    #[error("unable to resolve parameter #{index} '{parameter}' of handler '{handler}'")]
    UnresolvedParameter {
        /// Handler name.
        handler: String,
        /// Parameter name.
        parameter: String,
        /// Parameter position.
        index: usize,
    },

    /// The handler itself failed. The original failure is preserved.
    #[error("handler execution failed: {0}")]
    HandlerExecution(Failure),

    /// A reset handler failed; the remaining reset handlers were skipped.
    #[error("reset handler '{handler}' failed: {cause}")]
    ResetExecution {
        /// Name of the failing reset handler.
        handler: String,
        /// The failure it raised.
        cause: Failure,
    },

    /// An interceptor failed on its own account.
    #[error("interceptor failed: {0}")]
    Interceptor(Failure),

    /// A prepare-commit callback vetoed the commit.
    #[error("unit of work commit failed: {0}")]
    Commit(Failure),

    /// A unit of work was used outside its lifecycle.
    #[error("illegal unit of work state: {0}")]
    IllegalState(String),
}

impl DispatchError {
    /// Creates an unresolved parameter error.
    pub fn unresolved(handler: impl Into<String>, parameter: impl Into<String>, index: usize) -> Self {
        Self::UnresolvedParameter {
            handler: handler.into(),
            parameter: parameter.into(),
            index,
        }
    }

    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// Returns the failure that caused this error.
    ///
    /// Variants that carry a [`Failure`] return that very instance; the
    /// others wrap a copy of the error itself.
    pub fn cause(&self) -> Failure {
        match self {
            Self::HandlerExecution(failure)
            | Self::Interceptor(failure)
            | Self::Commit(failure)
            | Self::ResetExecution { cause: failure, .. } => failure.clone(),
            other => Failure::new(other.clone()),
        }
    }

    /// Returns the handler's own failure, if this error originated in a handler.
    pub fn handler_failure(&self) -> Option<&Failure> {
        match self {
            Self::HandlerExecution(failure) | Self::ResetExecution { cause: failure, .. } => {
                Some(failure)
            }
            _ => None,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result of handling one message: an optional return value or an error.
pub type DispatchResult = Result<Option<ReturnValue>, DispatchError>;
