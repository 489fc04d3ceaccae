//! Resolvers for injected resources.
//!
//! Two flavours exist: application-wide resources looked up by type through a
//! [`ResourceLookup`], and resources placed in the current unit of work under
//! a string key.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use courier_core::{Argument, TypeKey};

use super::core::{BoxedResolver, ParameterResolver, ParameterResolverFactory, ResolutionContext};
use crate::handler::{HandlerDescriptor, ParameterDescriptor, ParameterRole};

// ============================================================================
// ResourceLookup
// ============================================================================

/// Supplies application-wide resources by type.
pub trait ResourceLookup: Send + Sync {
    fn lookup(&self, ty: &TypeKey) -> Option<Argument>;
}

/// A fixed set of resources, one per type.
///
/// Registering a second value of the same type replaces the first.
#[derive(Clone, Default)]
pub struct SimpleResourceLookup {
    resources: HashMap<TypeKey, Argument>,
}

impl SimpleResourceLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `resource`, keyed by its type.
    pub fn with<T: Any + Send + Sync>(self, resource: T) -> Self {
        self.with_shared(Arc::new(resource))
    }

    /// Adds an already shared resource, keyed by `T`.
    pub fn with_shared<T: Any + Send + Sync>(mut self, resource: Arc<T>) -> Self {
        self.resources.insert(TypeKey::of::<T>(), resource);
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceLookup for SimpleResourceLookup {
    fn lookup(&self, ty: &TypeKey) -> Option<Argument> {
        self.resources.get(ty).cloned()
    }
}

impl fmt::Debug for SimpleResourceLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.resources.keys().map(TypeKey::short_name))
            .finish()
    }
}

// ============================================================================
// ResourceParameterResolverFactory
// ============================================================================

/// Resolves [`ParameterRole::Resource`] parameters from a [`ResourceLookup`].
///
/// A parameter is only accepted if the lookup knows its type when the
/// handler is bound, so that a later factory in a composition gets a chance
/// otherwise.
#[derive(Clone)]
pub struct ResourceParameterResolverFactory {
    lookup: Arc<dyn ResourceLookup>,
}

impl ResourceParameterResolverFactory {
    pub fn new(lookup: impl ResourceLookup + 'static) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    pub fn shared(lookup: Arc<dyn ResourceLookup>) -> Self {
        Self { lookup }
    }
}

impl ParameterResolverFactory for ResourceParameterResolverFactory {
    fn create_resolver(
        &self,
        _handler: &HandlerDescriptor,
        parameter: &ParameterDescriptor,
    ) -> Option<BoxedResolver> {
        if *parameter.role() != ParameterRole::Resource {
            return None;
        }
        let ty = parameter.ty();
        self.lookup.lookup(&ty)?;
        Some(Box::new(LookupResolver {
            ty,
            lookup: Arc::clone(&self.lookup),
        }))
    }
}

impl fmt::Debug for ResourceParameterResolverFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceParameterResolverFactory")
            .finish_non_exhaustive()
    }
}

struct LookupResolver {
    ty: TypeKey,
    lookup: Arc<dyn ResourceLookup>,
}

impl ParameterResolver for LookupResolver {
    fn resolve(&self, _ctx: &ResolutionContext<'_>) -> Option<Argument> {
        self.lookup.lookup(&self.ty)
    }
}

// ============================================================================
// ScopedResourceResolverFactory
// ============================================================================

/// Resolves [`ParameterRole::ScopedResource`] parameters from the resource
/// scope of the current invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopedResourceResolverFactory;

impl ParameterResolverFactory for ScopedResourceResolverFactory {
    fn create_resolver(
        &self,
        _handler: &HandlerDescriptor,
        parameter: &ParameterDescriptor,
    ) -> Option<BoxedResolver> {
        match parameter.role() {
            ParameterRole::ScopedResource(key) => Some(Box::new(ScopedResolver {
                key: key.clone(),
                ty: parameter.ty(),
            })),
            _ => None,
        }
    }
}

struct ScopedResolver {
    key: String,
    ty: TypeKey,
}

impl ParameterResolver for ScopedResolver {
    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Option<Argument> {
        // A value of another type under the same key counts as absent.
        ctx.scope()
            .resource(&self.key)
            .filter(|value| (**value).type_id() == self.ty.id())
    }
}
