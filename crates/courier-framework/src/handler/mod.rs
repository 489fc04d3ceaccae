//! Handler descriptions and lookup.
//!
//! Handlers are either described explicitly through
//! [`HandlerDescriptor::builder`] or derived from closures whose parameters
//! are extractors such as [`Payload`], [`Resource`] and [`Scoped`].

mod descriptor;
mod extractor;
mod outcome;
mod registry;
mod traits;

pub use descriptor::{
    HandlerDescriptor, HandlerDescriptorBuilder, HandlerKind, ParameterDescriptor, ParameterRole,
};
pub use extractor::{Payload, Resource, Scoped};
pub use outcome::{HandlerOutcome, IntoOutcome};
pub use registry::HandlerRegistry;
pub use traits::{Handler, HandlerParameter};
