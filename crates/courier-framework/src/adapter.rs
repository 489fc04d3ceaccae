//! The handler adapter.
//!
//! A [`HandlerAdapter`] wraps the handlers of one target. It is built once:
//! discovery yields the [`HandlerDescriptor`]s, and every parameter is bound
//! to a resolver up front. After that the adapter is immutable and can be
//! shared between threads.

use std::fmt;
use std::sync::Arc;

use courier_core::{DispatchError, DispatchResult, Message, TypeHierarchy, TypeKey};
use tracing::{debug, trace, warn};

use crate::handler::{HandlerDescriptor, HandlerOutcome, HandlerRegistry};
use crate::interceptor::MessageHandler;
use crate::resolver::{
    BoundParameters, MultiParameterResolverFactory, ParameterResolverFactory, ResolutionContext,
    ResourceLookup, ResourceParameterResolverFactory, ResourceScope, bind_parameters,
};
use crate::unit_of_work::UnitOfWork;

/// A target whose handlers can be discovered.
///
/// Implemented by application types to list their handlers, typically as
/// closures capturing a clone of the `Arc`.
///
/// ```rust,ignore
/// impl HandlerSource for Projection {
///     fn handlers(self: Arc<Self>) -> Vec<HandlerDescriptor> {
///         let this = Arc::clone(&self);
///         vec![
///             HandlerDescriptor::handler("on_event", move |e: Payload<Event>| this.apply(&e)),
///             HandlerDescriptor::reset_handler("reset", move || self.clear()),
///         ]
///     }
/// }
/// ```
pub trait HandlerSource: Send + Sync + 'static {
    fn handlers(self: Arc<Self>) -> Vec<HandlerDescriptor>;

    /// The payload type relations the handlers rely on.
    fn type_hierarchy(&self) -> TypeHierarchy {
        TypeHierarchy::new()
    }
}

// ============================================================================
// HandlerAdapter
// ============================================================================

/// Routes messages and reset requests to the handlers of one target.
pub struct HandlerAdapter {
    name: String,
    registry: HandlerRegistry,
    bindings: Vec<BoundParameters>,
}

impl HandlerAdapter {
    pub fn builder() -> HandlerAdapterBuilder {
        HandlerAdapterBuilder::default()
    }

    /// Creates an adapter for `handlers`, binding their parameters with `factory`.
    pub fn new(
        handlers: Vec<HandlerDescriptor>,
        factory: &dyn ParameterResolverFactory,
        hierarchy: Arc<TypeHierarchy>,
    ) -> Self {
        Self::bind("handlers", handlers, factory, hierarchy)
    }

    /// Creates an adapter for the handlers `source` declares.
    pub fn for_source<S: HandlerSource>(source: Arc<S>, factory: &dyn ParameterResolverFactory) -> Self {
        let hierarchy = Arc::new(source.type_hierarchy());
        Self::bind(std::any::type_name::<S>(), source.handlers(), factory, hierarchy)
    }

    fn bind(
        name: impl Into<String>,
        handlers: Vec<HandlerDescriptor>,
        factory: &dyn ParameterResolverFactory,
        hierarchy: Arc<TypeHierarchy>,
    ) -> Self {
        let name = name.into();
        let bindings: Vec<BoundParameters> = handlers
            .iter()
            .map(|handler| bind_parameters(factory, handler))
            .collect();
        let registry = HandlerRegistry::new(handlers, hierarchy);
        debug!(
            target_name = %name,
            handlers = registry.len(),
            reset_handlers = registry.find_reset_handlers().count(),
            "Handler adapter created"
        );
        Self {
            name,
            registry,
            bindings,
        }
    }

    // ========================================================================
    // Message handling
    // ========================================================================

    /// Invokes the handler for `message` and returns its result.
    ///
    /// A handler failure comes back as [`DispatchError::HandlerExecution`]
    /// carrying the very failure the handler raised.
    pub fn invoke(&self, message: &Message, scope: &dyn ResourceScope) -> DispatchResult {
        let payload_type = message.payload_type();
        let index = self
            .registry
            .position_of(&payload_type)
            .ok_or(DispatchError::HandlerNotFound {
                payload_type: payload_type.name(),
            })?;
        let handler = &self.registry.handlers()[index];
        trace!(handler = handler.name(), payload = %message.label(), "Invoking handler");

        let ctx = ResolutionContext::new(message, scope);
        self.call(index, &ctx)?
            .map_err(DispatchError::HandlerExecution)
    }

    /// Resolves the arguments of handler `index` and calls it.
    ///
    /// The outer error is a wiring problem; the inner result is what the
    /// handler itself produced.
    fn call(&self, index: usize, ctx: &ResolutionContext<'_>) -> Result<HandlerOutcome, DispatchError> {
        let handler = &self.registry.handlers()[index];
        let args = self.bindings[index].resolve(ctx)?;
        handler.invoke(args).map_err(|mismatch| {
            let parameter = handler
                .parameters()
                .get(mismatch.index())
                .map_or("?", |p| p.name());
            DispatchError::unresolved(handler.name(), parameter, mismatch.index())
        })
    }

    /// Returns `true` if some handler accepts the payload type of `message`.
    pub fn can_handle(&self, message: &Message) -> bool {
        self.can_handle_type(&message.payload_type())
    }

    pub fn can_handle_type(&self, payload_type: &TypeKey) -> bool {
        self.registry.position_of(payload_type).is_some()
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Runs every reset handler in registration order.
    ///
    /// Stops at the first failure, which is returned as
    /// [`DispatchError::ResetExecution`]; the remaining reset handlers are
    /// not run. Without reset handlers this does nothing.
    pub fn prepare_reset(&self, scope: &dyn ResourceScope) -> Result<(), DispatchError> {
        self.run_reset_handlers(&ResolutionContext::without_message(scope))
    }

    /// Like [`prepare_reset`](Self::prepare_reset), with `context` available
    /// to message, payload and metadata parameters.
    pub fn prepare_reset_with_context(
        &self,
        context: &Message,
        scope: &dyn ResourceScope,
    ) -> Result<(), DispatchError> {
        self.run_reset_handlers(&ResolutionContext::new(context, scope))
    }

    fn run_reset_handlers(&self, ctx: &ResolutionContext<'_>) -> Result<(), DispatchError> {
        for index in self.registry.reset_positions() {
            let handler = &self.registry.handlers()[index];
            trace!(handler = handler.name(), "Running reset handler");
            if let Err(cause) = self.call(index, ctx)? {
                warn!(handler = handler.name(), error = %cause, "Reset handler failed");
                return Err(DispatchError::ResetExecution {
                    handler: handler.name().to_string(),
                    cause,
                });
            }
        }
        Ok(())
    }

    /// Returns `true` if the target declares at least one reset handler.
    pub fn supports_reset(&self) -> bool {
        self.registry.reset_positions().next().is_some()
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }
}

// ============================================================================
// HandlerAdapterBuilder
// ============================================================================

/// Builder for [`HandlerAdapter`].
///
/// Unless a resolver factory is supplied, parameters are bound with the
/// built-in strategies ([`MultiParameterResolverFactory::defaults`]),
/// followed by the resource lookup if one was given.
#[derive(Default)]
pub struct HandlerAdapterBuilder {
    name: Option<String>,
    handlers: Vec<HandlerDescriptor>,
    hierarchy: TypeHierarchy,
    resources: Option<Arc<dyn ResourceLookup>>,
    factory: Option<Arc<dyn ParameterResolverFactory>>,
}

impl HandlerAdapterBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn handler(mut self, handler: HandlerDescriptor) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn handlers(mut self, handlers: impl IntoIterator<Item = HandlerDescriptor>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Adds the handlers and type relations `source` declares.
    pub fn source<S: HandlerSource>(mut self, source: Arc<S>) -> Self {
        if self.name.is_none() {
            self.name = Some(std::any::type_name::<S>().to_string());
        }
        self.hierarchy = self.hierarchy.merged(source.type_hierarchy());
        self.handlers.extend(source.handlers());
        self
    }

    pub fn hierarchy(mut self, hierarchy: TypeHierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Makes application-wide resources available to resource parameters.
    pub fn resources(mut self, lookup: impl ResourceLookup + 'static) -> Self {
        self.resources = Some(Arc::new(lookup));
        self
    }

    /// Replaces the default resolver strategies entirely.
    pub fn resolver_factory(mut self, factory: impl ParameterResolverFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> HandlerAdapter {
        let hierarchy = Arc::new(self.hierarchy);
        let factory = self.factory.unwrap_or_else(|| {
            let mut defaults = MultiParameterResolverFactory::defaults(Arc::clone(&hierarchy));
            if let Some(lookup) = self.resources {
                defaults = defaults.with(ResourceParameterResolverFactory::shared(lookup));
            }
            Arc::new(defaults) as Arc<dyn ParameterResolverFactory>
        });
        let name = self.name.unwrap_or_else(|| "handlers".to_string());
        HandlerAdapter::bind(name, self.handlers, &*factory, hierarchy)
    }
}

impl MessageHandler for HandlerAdapter {
    fn handle(&self, unit_of_work: &mut UnitOfWork<'_>) -> DispatchResult {
        let unit_of_work: &UnitOfWork<'_> = unit_of_work;
        self.invoke(unit_of_work.message(), unit_of_work)
    }
}

impl fmt::Debug for HandlerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerAdapter")
            .field("name", &self.name)
            .field("handlers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use courier_core::{Failure, MetaData};
    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;
    use crate::handler::{Payload, ParameterDescriptor, Resource, Scoped};
    use crate::resolver::{NoResources, SimpleResourceLookup};

    type Journal = Arc<Mutex<Vec<String>>>;

    /// A projection that records what it handles into a shared list.
    struct Recording {
        journal: Journal,
    }

    impl HandlerSource for Recording {
        fn handlers(self: Arc<Self>) -> Vec<HandlerDescriptor> {
            let on_string = Arc::clone(&self);
            let on_reset = Arc::clone(&self);
            vec![
                HandlerDescriptor::handler("on_string", move |text: Payload<String>| {
                    on_string.journal.lock().push((*text).clone());
                }),
                HandlerDescriptor::reset_handler("on_reset", move |marker: Resource<ResetMarker>| {
                    on_reset.journal.lock().push(marker.label.to_string());
                }),
            ]
        }
    }

    struct ResetMarker {
        label: &'static str,
    }

    fn recording_adapter() -> (HandlerAdapter, Journal) {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let adapter = HandlerAdapter::builder()
            .source(Arc::new(Recording {
                journal: Arc::clone(&journal),
            }))
            .resources(SimpleResourceLookup::new().with(ResetMarker { label: "reset" }))
            .build();
        (adapter, journal)
    }

    #[test]
    fn test_handle_then_reset_records_both() {
        let (adapter, journal) = recording_adapter();

        let result = adapter
            .invoke(&Message::new("hello".to_string()), &NoResources)
            .unwrap();
        adapter.prepare_reset(&NoResources).unwrap();

        assert!(result.is_none());
        assert_eq!(*journal.lock(), vec!["hello", "reset"]);
        assert!(adapter.supports_reset());
        assert!(adapter.name().ends_with("Recording"));
    }

    #[test]
    fn test_prepare_reset_is_repeatable() {
        let (adapter, journal) = recording_adapter();

        adapter.prepare_reset(&NoResources).unwrap();
        let first = journal.lock().clone();
        journal.lock().clear();
        adapter.prepare_reset(&NoResources).unwrap();

        assert_eq!(*journal.lock(), first);
        assert_eq!(first, vec!["reset"]);
    }

    #[test]
    fn test_reset_stops_at_first_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let failure = Failure::msg("cannot reset");
        let (first, raised, third) = (Arc::clone(&calls), failure.clone(), Arc::clone(&calls));
        let adapter = HandlerAdapter::builder()
            .handler(HandlerDescriptor::reset_handler("first", move || {
                first.fetch_add(1, Ordering::SeqCst);
            }))
            .handler(HandlerDescriptor::reset_handler("second", move || {
                Err::<(), _>(raised.clone())
            }))
            .handler(HandlerDescriptor::reset_handler("third", move || {
                third.fetch_add(1, Ordering::SeqCst);
            }))
            .build();

        let err = adapter.prepare_reset(&NoResources).unwrap_err();

        match err {
            DispatchError::ResetExecution { handler, cause } => {
                assert_eq!(handler, "second");
                assert!(cause.ptr_eq(&failure));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_without_reset_handlers_does_nothing() {
        let adapter = HandlerAdapter::builder()
            .handler(HandlerDescriptor::handler("on_u8", |_: Payload<u8>| {}))
            .build();
        assert!(!adapter.supports_reset());
        assert!(adapter.prepare_reset(&NoResources).is_ok());
    }

    #[test]
    fn test_reset_with_context_sees_the_message() {
        let seen: Journal = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let adapter = HandlerAdapter::builder()
            .handler(
                HandlerDescriptor::builder("reset_with_token")
                    .reset()
                    .parameter(ParameterDescriptor::metadata_value("token"))
                    .invoke_with(move |args| -> Result<(), Failure> {
                        let token = args.get_as::<Value>(0)?;
                        sink.lock().push(token.to_string());
                        Ok(())
                    }),
            )
            .build();

        let context = Message::new(()).with_metadata(MetaData::new().with("token", 17));
        adapter
            .prepare_reset_with_context(&context, &NoResources)
            .unwrap();
        assert_eq!(*seen.lock(), vec!["17"]);

        let err = adapter.prepare_reset(&NoResources).unwrap_err();
        assert!(matches!(err, DispatchError::UnresolvedParameter { index: 0, .. }));
    }

    #[test]
    fn test_handler_failure_is_returned_unchanged() {
        let failure = Failure::msg("handler exploded");
        let raised = failure.clone();
        let adapter = HandlerAdapter::builder()
            .handler(HandlerDescriptor::handler("explode", move |_: Payload<u32>| {
                Err::<(), _>(raised.clone())
            }))
            .build();

        let err = adapter.invoke(&Message::new(1u32), &NoResources).unwrap_err();
        assert!(err.handler_failure().unwrap().ptr_eq(&failure));
    }

    #[test]
    fn test_unknown_payload_type_is_reported() {
        let adapter = HandlerAdapter::builder()
            .handler(HandlerDescriptor::handler("on_u8", |_: Payload<u8>| {}))
            .build();

        assert!(!adapter.can_handle(&Message::new(1u16)));
        let err = adapter.invoke(&Message::new(1u16), &NoResources).unwrap_err();
        assert!(matches!(err, DispatchError::HandlerNotFound { payload_type: "u16" }));
    }

    #[test]
    fn test_missing_resource_is_an_unresolved_parameter() {
        let adapter = HandlerAdapter::builder()
            .handler(HandlerDescriptor::handler(
                "needs_clock",
                |_: Payload<u8>, _: Resource<std::time::Instant>| {},
            ))
            .build();

        let err = adapter.invoke(&Message::new(1u8), &NoResources).unwrap_err();
        match err {
            DispatchError::UnresolvedParameter { handler, index, .. } => {
                assert_eq!(handler, "needs_clock");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[derive(Clone)]
    struct Deposited(u64);
    struct AccountEvent {
        amount: u64,
    }

    impl From<Deposited> for AccountEvent {
        fn from(d: Deposited) -> Self {
            AccountEvent { amount: d.0 }
        }
    }

    #[test]
    fn test_supertype_handler_receives_upcast_payload() {
        let adapter = HandlerAdapter::builder()
            .hierarchy(TypeHierarchy::new().extends::<Deposited, AccountEvent>())
            .handler(HandlerDescriptor::handler("on_event", |e: Payload<AccountEvent>| e.amount * 2))
            .build();

        let value = adapter
            .invoke(&Message::new(Deposited(21)), &NoResources)
            .unwrap()
            .unwrap();
        assert_eq!(value.downcast_ref::<u64>(), Some(&42));
        assert!(adapter.can_handle_type(&TypeKey::of::<AccountEvent>()));
    }

    #[test]
    fn test_message_handler_uses_unit_of_work_scope() {
        let adapter = HandlerAdapter::builder()
            .handler(HandlerDescriptor::handler(
                "greet",
                |name: Payload<String>, greeting: Scoped<&'static str>| format!("{} {}", *greeting, *name),
            ))
            .build();

        let mut uow = UnitOfWork::start(Message::new("bob".to_string()));
        uow.provide("hi");
        let value = uow
            .execute_with_result(|uow| adapter.handle(uow))
            .unwrap()
            .unwrap();

        assert_eq!(value.downcast_ref::<String>().unwrap(), "hi bob");
    }
}
