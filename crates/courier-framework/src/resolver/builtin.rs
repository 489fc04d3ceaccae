//! Resolvers for parameters that come from the message itself.

use std::sync::Arc;

use courier_core::{Argument, TypeHierarchy, TypeKey};

use super::core::{BoxedResolver, ParameterResolver, ParameterResolverFactory, ResolutionContext};
use crate::handler::{HandlerDescriptor, ParameterDescriptor, ParameterRole};

/// Resolves payload, message, metadata and metadata-value parameters.
///
/// A payload parameter receives the message payload when the payload type
/// equals or (per the [`TypeHierarchy`]) extends the declared type; the
/// payload is upcast along the way.
#[derive(Debug, Clone, Default)]
pub struct DefaultParameterResolverFactory {
    hierarchy: Arc<TypeHierarchy>,
}

impl DefaultParameterResolverFactory {
    pub fn new(hierarchy: Arc<TypeHierarchy>) -> Self {
        Self { hierarchy }
    }
}

impl ParameterResolverFactory for DefaultParameterResolverFactory {
    fn create_resolver(
        &self,
        _handler: &HandlerDescriptor,
        parameter: &ParameterDescriptor,
    ) -> Option<BoxedResolver> {
        match parameter.role() {
            ParameterRole::Payload => Some(Box::new(PayloadResolver {
                declared: parameter.ty(),
                hierarchy: Arc::clone(&self.hierarchy),
            })),
            ParameterRole::Message => Some(Box::new(MessageResolver)),
            ParameterRole::MetaData => Some(Box::new(MetaDataResolver)),
            ParameterRole::MetaDataValue(key) => {
                Some(Box::new(MetaDataValueResolver { key: key.clone() }))
            }
            ParameterRole::Resource | ParameterRole::ScopedResource(_) => None,
        }
    }
}

struct PayloadResolver {
    declared: TypeKey,
    hierarchy: Arc<TypeHierarchy>,
}

impl ParameterResolver for PayloadResolver {
    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Option<Argument> {
        let message = ctx.message()?;
        self.hierarchy
            .upcast(message.payload(), &message.payload_type(), &self.declared)
    }
}

struct MessageResolver;

impl ParameterResolver for MessageResolver {
    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Option<Argument> {
        ctx.message()
            .map(|message| Arc::new(message.clone()) as Argument)
    }
}

struct MetaDataResolver;

impl ParameterResolver for MetaDataResolver {
    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Option<Argument> {
        ctx.message()
            .map(|message| Arc::new(message.metadata().clone()) as Argument)
    }
}

/// Resolves to the `serde_json::Value` stored under `key`.
struct MetaDataValueResolver {
    key: String,
}

impl ParameterResolver for MetaDataValueResolver {
    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Option<Argument> {
        let value = ctx.message()?.metadata().get(&self.key)?;
        Some(Arc::new(value.clone()) as Argument)
    }
}

#[cfg(test)]
mod tests {
    use courier_core::{Message, MetaData};
    use serde_json::{Value, json};

    use super::*;
    use crate::resolver::core::NoResources;

    #[derive(Clone)]
    struct Specific(u8);
    struct General(u8);

    impl From<Specific> for General {
        fn from(s: Specific) -> Self {
            General(s.0)
        }
    }

    fn bind(parameter: ParameterDescriptor) -> Option<BoxedResolver> {
        let handler = HandlerDescriptor::builder("handler")
            .parameter(parameter.clone())
            .invoke_with(|_args| ());
        DefaultParameterResolverFactory::new(Arc::new(
            TypeHierarchy::new().extends::<Specific, General>(),
        ))
        .create_resolver(&handler, &parameter)
    }

    #[test]
    fn test_payload_is_upcast_to_declared_type() {
        let resolver = bind(ParameterDescriptor::payload::<General>()).unwrap();
        let message = Message::new(Specific(4));
        let value = resolver
            .resolve(&ResolutionContext::new(&message, &NoResources))
            .unwrap();
        assert_eq!(value.downcast_ref::<General>().unwrap().0, 4);
    }

    #[test]
    fn test_payload_of_unrelated_type_is_unavailable() {
        let resolver = bind(ParameterDescriptor::payload::<Specific>()).unwrap();
        let message = Message::new(General(1));
        assert!(resolver
            .resolve(&ResolutionContext::new(&message, &NoResources))
            .is_none());
        assert!(resolver
            .resolve(&ResolutionContext::without_message(&NoResources))
            .is_none());
    }

    #[test]
    fn test_metadata_value_lookup() {
        let resolver = bind(ParameterDescriptor::metadata_value("tenant")).unwrap();
        let message = Message::new(()).with_metadata(MetaData::new().with("tenant", "acme"));
        let value = resolver
            .resolve(&ResolutionContext::new(&message, &NoResources))
            .unwrap();
        assert_eq!(value.downcast_ref::<Value>(), Some(&json!("acme")));

        let bare = Message::new(());
        assert!(resolver
            .resolve(&ResolutionContext::new(&bare, &NoResources))
            .is_none());
    }

    #[test]
    fn test_resources_are_declined() {
        assert!(bind(ParameterDescriptor::resource::<String>()).is_none());
        assert!(bind(ParameterDescriptor::scoped::<String>()).is_none());
    }
}
