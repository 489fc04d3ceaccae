use std::any::Any;
use std::fmt;
use std::sync::Arc;

use courier_core::{Argument, Message};

use crate::error::{ArgumentError, ArgumentResult};
use crate::handler::{HandlerDescriptor, ParameterDescriptor};

// ============================================================================
// Resource scopes
// ============================================================================

/// Keyed resources visible while a message is being handled.
///
/// The unit of work is the usual implementation; it falls back to its parent
/// scope for keys it does not hold itself.
pub trait ResourceScope {
    /// Returns the resource stored under `key`.
    fn resource(&self, key: &str) -> Option<Argument>;
}

/// A scope without any resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

impl ResourceScope for NoResources {
    fn resource(&self, _key: &str) -> Option<Argument> {
        None
    }
}

// ============================================================================
// ResolutionContext
// ============================================================================

/// Everything a [`ParameterResolver`] may read while producing an argument.
///
/// Reset handlers are invoked without a message unless the caller supplies
/// one explicitly.
#[derive(Clone, Copy)]
pub struct ResolutionContext<'a> {
    message: Option<&'a Message>,
    scope: &'a dyn ResourceScope,
}

impl<'a> ResolutionContext<'a> {
    /// Context for handling `message`.
    pub fn new(message: &'a Message, scope: &'a dyn ResourceScope) -> Self {
        Self {
            message: Some(message),
            scope,
        }
    }

    /// Context without a current message.
    pub fn without_message(scope: &'a dyn ResourceScope) -> Self {
        Self {
            message: None,
            scope,
        }
    }

    /// The message being handled, if any.
    pub fn message(&self) -> Option<&'a Message> {
        self.message
    }

    /// The resource scope.
    pub fn scope(&self) -> &'a dyn ResourceScope {
        self.scope
    }
}

impl fmt::Debug for ResolutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Resolver traits
// ============================================================================

/// Produces the value of one handler parameter.
///
/// Returning `None` means the value is not available for this invocation.
pub trait ParameterResolver: Send + Sync {
    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Option<Argument>;
}

/// A boxed resolver, as stored per bound parameter.
pub type BoxedResolver = Box<dyn ParameterResolver>;

/// A strategy that decides whether it can resolve a given parameter.
///
/// Factories are consulted once per parameter when a handler adapter is
/// built. Returning `None` declines the parameter so the next factory in a
/// composition can try.
pub trait ParameterResolverFactory: Send + Sync {
    fn create_resolver(
        &self,
        handler: &HandlerDescriptor,
        parameter: &ParameterDescriptor,
    ) -> Option<BoxedResolver>;
}

impl<T: ParameterResolverFactory + ?Sized> ParameterResolverFactory for Arc<T> {
    fn create_resolver(
        &self,
        handler: &HandlerDescriptor,
        parameter: &ParameterDescriptor,
    ) -> Option<BoxedResolver> {
        (**self).create_resolver(handler, parameter)
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// The resolved arguments of one handler invocation, in parameter order.
#[derive(Clone, Default)]
pub struct Arguments(Vec<Argument>);

impl Arguments {
    pub fn new(values: Vec<Argument>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the erased argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.0.get(index)
    }

    /// Returns the argument at `index` as `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, index: usize) -> ArgumentResult<Arc<T>> {
        let value = self.0.get(index).ok_or(ArgumentError::Missing { index })?;
        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| ArgumentError::mismatch::<T>(index))
    }
}

impl IntoIterator for Arguments {
    type Item = Argument;
    type IntoIter = std::vec::IntoIter<Argument>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Argument> for Arguments {
    fn from_iter<I: IntoIterator<Item = Argument>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.0.len())
            .finish()
    }
}
