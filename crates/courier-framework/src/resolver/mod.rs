//! Parameter resolution.
//!
//! Handler parameters are described by [`ParameterDescriptor`]s. When a
//! handler adapter is built, every parameter is offered to a
//! [`ParameterResolverFactory`] (usually an ordered
//! [`MultiParameterResolverFactory`]); the resolver it returns is kept and
//! reused for every later invocation.
//!
//! [`ParameterDescriptor`]: crate::handler::ParameterDescriptor

mod builtin;
mod core;
mod multi;
mod resource;

pub use self::builtin::DefaultParameterResolverFactory;
pub use self::core::{
    Arguments, BoxedResolver, NoResources, ParameterResolver, ParameterResolverFactory,
    ResolutionContext, ResourceScope,
};
pub use self::multi::{BoundParameters, MultiParameterResolverFactory, bind_parameters};
pub use self::resource::{
    ResourceLookup, ResourceParameterResolverFactory, ScopedResourceResolverFactory,
    SimpleResourceLookup,
};
