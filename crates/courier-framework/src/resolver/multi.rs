use std::fmt;
use std::sync::Arc;

use courier_core::{DispatchError, TypeHierarchy};
use tracing::warn;

use super::builtin::DefaultParameterResolverFactory;
use super::core::{
    Arguments, BoxedResolver, ParameterResolverFactory, ResolutionContext,
};
use super::resource::ScopedResourceResolverFactory;
use crate::handler::{HandlerDescriptor, ParameterDescriptor};

// ============================================================================
// MultiParameterResolverFactory
// ============================================================================

/// An ordered composition of resolver factories.
///
/// For each parameter the factories are asked in order; the first one that
/// returns a resolver wins and the remaining factories are never consulted
/// for that parameter.
///
/// # Example
///
/// ```rust,ignore
/// let factory = MultiParameterResolverFactory::ordered([
///     Arc::new(DefaultParameterResolverFactory::new(hierarchy)) as Arc<dyn ParameterResolverFactory>,
///     Arc::new(ResourceParameterResolverFactory::new(resources)),
/// ]);
/// ```
#[derive(Clone, Default)]
pub struct MultiParameterResolverFactory {
    factories: Vec<Arc<dyn ParameterResolverFactory>>,
}

impl MultiParameterResolverFactory {
    /// Creates a composition that consults `factories` in the given order.
    pub fn ordered<I>(factories: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ParameterResolverFactory>>,
    {
        Self {
            factories: factories.into_iter().collect(),
        }
    }

    /// The built-in strategies: payload, message and metadata parameters
    /// first, then unit-of-work scoped resources.
    pub fn defaults(hierarchy: Arc<TypeHierarchy>) -> Self {
        Self::ordered([
            Arc::new(DefaultParameterResolverFactory::new(hierarchy))
                as Arc<dyn ParameterResolverFactory>,
            Arc::new(ScopedResourceResolverFactory),
        ])
    }

    /// Appends a factory with the lowest priority so far.
    pub fn with(mut self, factory: impl ParameterResolverFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Chooses a resolver for every parameter of `handler`.
    pub fn bind(&self, handler: &HandlerDescriptor) -> BoundParameters {
        bind_parameters(self, handler)
    }

    /// Binds and immediately resolves the arguments of `handler`.
    pub fn resolve(
        &self,
        handler: &HandlerDescriptor,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Arguments, DispatchError> {
        self.bind(handler).resolve(ctx)
    }
}

impl ParameterResolverFactory for MultiParameterResolverFactory {
    fn create_resolver(
        &self,
        handler: &HandlerDescriptor,
        parameter: &ParameterDescriptor,
    ) -> Option<BoxedResolver> {
        self.factories
            .iter()
            .find_map(|factory| factory.create_resolver(handler, parameter))
    }
}

impl fmt::Debug for MultiParameterResolverFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiParameterResolverFactory")
            .field("factories", &self.factories.len())
            .finish()
    }
}

// ============================================================================
// BoundParameters
// ============================================================================

/// Asks `factory` for a resolver for every parameter of `handler`.
///
/// Parameters the factory declines stay unbound; resolving them later fails
/// with [`DispatchError::UnresolvedParameter`].
pub fn bind_parameters(
    factory: &dyn ParameterResolverFactory,
    handler: &HandlerDescriptor,
) -> BoundParameters {
    let slots = handler
        .parameters()
        .iter()
        .map(|parameter| {
            let resolver = factory.create_resolver(handler, parameter);
            if resolver.is_none() {
                warn!(
                    handler = handler.name(),
                    parameter = parameter.name(),
                    index = parameter.index(),
                    "No resolver accepts handler parameter"
                );
            }
            BoundSlot {
                index: parameter.index(),
                name: parameter.name().to_string(),
                resolver,
            }
        })
        .collect();

    BoundParameters {
        handler: handler.name().to_string(),
        slots,
    }
}

struct BoundSlot {
    index: usize,
    name: String,
    resolver: Option<BoxedResolver>,
}

/// The resolvers chosen for one handler, one per parameter position.
///
/// Binding happens once; resolving is read-only and may run concurrently.
pub struct BoundParameters {
    handler: String,
    slots: Vec<BoundSlot>,
}

impl BoundParameters {
    /// Produces the arguments for one invocation.
    pub fn resolve(&self, ctx: &ResolutionContext<'_>) -> Result<Arguments, DispatchError> {
        self.slots
            .iter()
            .map(|slot| {
                slot.resolver
                    .as_ref()
                    .and_then(|resolver| resolver.resolve(ctx))
                    .ok_or_else(|| DispatchError::unresolved(&self.handler, &slot.name, slot.index))
            })
            .collect()
    }

    /// Returns `true` if every parameter has a resolver.
    pub fn is_fully_bound(&self) -> bool {
        self.slots.iter().all(|slot| slot.resolver.is_some())
    }

    /// Names of the parameters without a resolver.
    pub fn unbound(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|slot| slot.resolver.is_none())
            .map(|slot| slot.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for BoundParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundParameters")
            .field("handler", &self.handler)
            .field("parameters", &self.slots.len())
            .field("unbound", &self.unbound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use courier_core::{Argument, Message};

    use super::*;
    use crate::resolver::core::{NoResources, ParameterResolver};

    struct Fixed(&'static str);

    impl ParameterResolver for Fixed {
        fn resolve(&self, _ctx: &ResolutionContext<'_>) -> Option<Argument> {
            Some(Arc::new(self.0) as Argument)
        }
    }

    /// Accepts every parameter and counts how often it was asked.
    struct Counting {
        label: &'static str,
        asked: Arc<AtomicUsize>,
    }

    impl ParameterResolverFactory for Counting {
        fn create_resolver(
            &self,
            _handler: &HandlerDescriptor,
            _parameter: &ParameterDescriptor,
        ) -> Option<BoxedResolver> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(Fixed(self.label)))
        }
    }

    struct Declining;

    impl ParameterResolverFactory for Declining {
        fn create_resolver(
            &self,
            _handler: &HandlerDescriptor,
            _parameter: &ParameterDescriptor,
        ) -> Option<BoxedResolver> {
            None
        }
    }

    fn two_resources() -> HandlerDescriptor {
        HandlerDescriptor::builder("handle")
            .parameter(ParameterDescriptor::resource::<&'static str>())
            .parameter(ParameterDescriptor::resource::<&'static str>())
            .invoke_with(|_args| ())
    }

    #[test]
    fn test_first_accepting_factory_wins() {
        let later = Arc::new(AtomicUsize::new(0));
        let factory = MultiParameterResolverFactory::ordered([
            Arc::new(Declining) as Arc<dyn ParameterResolverFactory>,
            Arc::new(Counting {
                label: "first",
                asked: Arc::new(AtomicUsize::new(0)),
            }),
            Arc::new(Counting {
                label: "second",
                asked: Arc::clone(&later),
            }),
        ]);

        let message = Message::new(());
        let ctx = ResolutionContext::new(&message, &NoResources);
        let args = factory.resolve(&two_resources(), &ctx).unwrap();

        assert_eq!(args.len(), 2);
        assert_eq!(*args.get_as::<&'static str>(0).unwrap(), "first");
        assert_eq!(*args.get_as::<&'static str>(1).unwrap(), "first");
        assert_eq!(later.load(Ordering::SeqCst), 0, "later factory consulted");
    }

    #[test]
    fn test_unbound_parameter_fails_at_resolution() {
        let factory = MultiParameterResolverFactory::ordered([
            Arc::new(Declining) as Arc<dyn ParameterResolverFactory>
        ]);
        let bound = factory.bind(&two_resources());
        assert!(!bound.is_fully_bound());
        assert_eq!(bound.unbound().len(), 2);

        let err = bound
            .resolve(&ResolutionContext::without_message(&NoResources))
            .unwrap_err();
        match err {
            DispatchError::UnresolvedParameter { handler, index, .. } => {
                assert_eq!(handler, "handle");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_binding_consults_factories_once_per_parameter() {
        let asked = Arc::new(AtomicUsize::new(0));
        let factory = MultiParameterResolverFactory::default().with(Counting {
            label: "only",
            asked: Arc::clone(&asked),
        });
        let bound = factory.bind(&two_resources());

        let message = Message::new(());
        let ctx = ResolutionContext::new(&message, &NoResources);
        for _ in 0..3 {
            bound.resolve(&ctx).unwrap();
        }
        assert_eq!(asked.load(Ordering::SeqCst), 2);
    }
}
