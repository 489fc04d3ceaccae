//! Handler and parameter metadata.
//!
//! A [`HandlerDescriptor`] is what the discovery collaborator hands to the
//! adapter: a name, a kind, the accepted payload type, one
//! [`ParameterDescriptor`] per parameter, and the invoker that calls the
//! handler with resolved arguments.

use std::fmt;
use std::sync::Arc;

use courier_core::TypeKey;

use super::outcome::{HandlerOutcome, IntoOutcome};
use super::traits::Handler;
use crate::error::ArgumentResult;
use crate::resolver::Arguments;

// ============================================================================
// ParameterDescriptor
// ============================================================================

/// What a handler parameter asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterRole {
    /// The message payload (or a supertype of it).
    Payload,
    /// The whole message envelope.
    Message,
    /// All message metadata.
    MetaData,
    /// One metadata entry.
    MetaDataValue(String),
    /// An application-wide resource, looked up by type.
    Resource,
    /// A resource placed in the unit of work under the given key.
    ScopedResource(String),
}

/// Position, name, declared type and role of one handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    index: usize,
    name: String,
    ty: TypeKey,
    role: ParameterRole,
}

impl ParameterDescriptor {
    /// Creates a descriptor. The index is assigned when it is added to a handler.
    pub fn new(name: impl Into<String>, ty: TypeKey, role: ParameterRole) -> Self {
        Self {
            index: 0,
            name: name.into(),
            ty,
            role,
        }
    }

    pub fn payload<T: ?Sized + 'static>() -> Self {
        Self::new("payload", TypeKey::of::<T>(), ParameterRole::Payload)
    }

    pub fn message() -> Self {
        Self::new(
            "message",
            TypeKey::of::<courier_core::Message>(),
            ParameterRole::Message,
        )
    }

    pub fn metadata() -> Self {
        Self::new(
            "metadata",
            TypeKey::of::<courier_core::MetaData>(),
            ParameterRole::MetaData,
        )
    }

    /// A single metadata entry, resolved as a `serde_json::Value`.
    pub fn metadata_value(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            key.clone(),
            TypeKey::of::<serde_json::Value>(),
            ParameterRole::MetaDataValue(key),
        )
    }

    pub fn resource<T: ?Sized + 'static>() -> Self {
        let ty = TypeKey::of::<T>();
        Self::new(ty.short_name(), ty, ParameterRole::Resource)
    }

    /// A unit-of-work resource stored under the full type name of `T`.
    pub fn scoped<T: ?Sized + 'static>() -> Self {
        Self::scoped_key::<T>(std::any::type_name::<T>())
    }

    /// A unit-of-work resource stored under `key`.
    pub fn scoped_key<T: ?Sized + 'static>(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            key.clone(),
            TypeKey::of::<T>(),
            ParameterRole::ScopedResource(key),
        )
    }

    /// Replaces the parameter name used in errors and logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn role(&self) -> &ParameterRole {
        &self.role
    }
}

// ============================================================================
// HandlerDescriptor
// ============================================================================

/// Whether a handler processes messages or prepares a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Normal,
    Reset,
}

type Invoker = Arc<dyn Fn(Arguments) -> ArgumentResult<HandlerOutcome> + Send + Sync>;

/// A discovered handler.
///
/// Cloning is cheap; the invoker is shared.
///
/// # Example
///
/// ```rust,ignore
/// use courier_framework::{HandlerDescriptor, Payload};
///
/// let on_order = HandlerDescriptor::handler("on_order", |order: Payload<OrderPlaced>| {
///     println!("order {}", order.id);
/// });
/// let on_reset = HandlerDescriptor::reset_handler("on_reset", || ());
/// ```
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: String,
    kind: HandlerKind,
    payload_type: Option<TypeKey>,
    parameters: Vec<ParameterDescriptor>,
    invoker: Invoker,
}

impl HandlerDescriptor {
    /// Starts a descriptor with an untyped invoker.
    pub fn builder(name: impl Into<String>) -> HandlerDescriptorBuilder {
        HandlerDescriptorBuilder {
            name: name.into(),
            kind: HandlerKind::Normal,
            payload_type: None,
            parameters: Vec::new(),
        }
    }

    /// Describes a message handler from a closure whose parameters are extractors.
    pub fn handler<F, T>(name: impl Into<String>, handler: F) -> Self
    where
        F: Handler<T>,
    {
        Self::from_handler(name.into(), HandlerKind::Normal, handler)
    }

    /// Describes a reset handler from a closure whose parameters are extractors.
    pub fn reset_handler<F, T>(name: impl Into<String>, handler: F) -> Self
    where
        F: Handler<T>,
    {
        Self::from_handler(name.into(), HandlerKind::Reset, handler)
    }

    fn from_handler<F, T>(name: String, kind: HandlerKind, handler: F) -> Self
    where
        F: Handler<T>,
    {
        let parameters = index_parameters(F::parameters());
        let payload_type = payload_type_of(&parameters);
        Self {
            name,
            kind,
            payload_type,
            parameters,
            invoker: Arc::new(move |args: Arguments| handler.invoke(args)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn is_reset(&self) -> bool {
        self.kind == HandlerKind::Reset
    }

    /// The payload type this handler accepts.
    ///
    /// A normal handler without one accepts every payload, with the lowest
    /// priority.
    pub fn payload_type(&self) -> Option<TypeKey> {
        self.payload_type
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Calls the handler with already resolved arguments.
    pub fn invoke(&self, args: Arguments) -> ArgumentResult<HandlerOutcome> {
        (self.invoker)(args)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("payload_type", &self.payload_type.map(|t| t.name()))
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Builder for descriptors whose invoker works on raw [`Arguments`].
#[derive(Debug)]
pub struct HandlerDescriptorBuilder {
    name: String,
    kind: HandlerKind,
    payload_type: Option<TypeKey>,
    parameters: Vec<ParameterDescriptor>,
}

impl HandlerDescriptorBuilder {
    pub fn kind(mut self, kind: HandlerKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn reset(self) -> Self {
        self.kind(HandlerKind::Reset)
    }

    /// Sets the accepted payload type explicitly.
    ///
    /// Defaults to the type of the first payload parameter.
    pub fn payload_type(mut self, ty: TypeKey) -> Self {
        self.payload_type = Some(ty);
        self
    }

    /// Appends a parameter.
    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        let index = self.parameters.len();
        self.parameters.push(parameter.at(index));
        self
    }

    /// Finishes the descriptor with the function that runs the handler.
    pub fn invoke_with<F, R>(self, invoker: F) -> HandlerDescriptor
    where
        F: Fn(Arguments) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        let payload_type = self
            .payload_type
            .or_else(|| payload_type_of(&self.parameters));
        HandlerDescriptor {
            name: self.name,
            kind: self.kind,
            payload_type,
            parameters: self.parameters,
            invoker: Arc::new(move |args: Arguments| -> ArgumentResult<HandlerOutcome> {
                Ok(invoker(args).into_outcome())
            }),
        }
    }
}

fn index_parameters(parameters: Vec<ParameterDescriptor>) -> Vec<ParameterDescriptor> {
    parameters
        .into_iter()
        .enumerate()
        .map(|(index, parameter)| parameter.at(index))
        .collect()
}

fn payload_type_of(parameters: &[ParameterDescriptor]) -> Option<TypeKey> {
    parameters
        .iter()
        .find(|p| p.role == ParameterRole::Payload)
        .map(|p| p.ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Payload, Scoped};

    struct Ping;

    #[test]
    fn test_builder_indexes_parameters_and_infers_payload_type() {
        let descriptor = HandlerDescriptor::builder("on_ping")
            .parameter(ParameterDescriptor::metadata())
            .parameter(ParameterDescriptor::payload::<Ping>())
            .invoke_with(|_args| ());

        assert_eq!(descriptor.kind(), HandlerKind::Normal);
        assert_eq!(descriptor.payload_type(), Some(TypeKey::of::<Ping>()));
        let indices: Vec<_> = descriptor.parameters().iter().map(|p| p.index()).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_typed_handler_describes_its_extractors() {
        let descriptor = HandlerDescriptor::reset_handler(
            "reset",
            |_payload: Payload<String>, _counter: Scoped<u32>| {},
        );

        assert!(descriptor.is_reset());
        assert_eq!(descriptor.payload_type(), Some(TypeKey::of::<String>()));
        let params = descriptor.parameters();
        assert_eq!(params[0].role(), &ParameterRole::Payload);
        assert_eq!(
            params[1].role(),
            &ParameterRole::ScopedResource(std::any::type_name::<u32>().to_string())
        );
        assert_eq!(params[1].index(), 1);
    }

    #[test]
    fn test_handler_without_parameters_accepts_any_payload() {
        let descriptor = HandlerDescriptor::handler("catch_all", || ());
        assert_eq!(descriptor.payload_type(), None);
        assert!(descriptor.parameters().is_empty());
    }
}
