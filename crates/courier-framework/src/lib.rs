//! # Courier Framework
//!
//! The message-dispatch machinery built on top of `courier-core`.
//!
//! This layer provides:
//! - Parameter resolution: ordered resolver factories bound once per handler
//! - Handler descriptors, Axum-style typed handlers and a handler registry
//! - The [`HandlerAdapter`], which invokes handlers and prepares resets
//! - Interceptor chains around handlers and dispatch
//! - The [`UnitOfWork`] lifecycle with nesting and scoped resources
//! - A [`LoggingInterceptor`] with pluggable log sinks
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_framework::prelude::*;
//!
//! let adapter = HandlerAdapter::builder()
//!     .handler(HandlerDescriptor::handler("greet", |name: Payload<String>| {
//!         format!("hello {}", *name)
//!     }))
//!     .build();
//! let interceptors = Interceptors::new().with(LoggingInterceptor::new());
//!
//! let mut uow = UnitOfWork::start(Message::new("world".to_string()));
//! let greeting = uow.execute_with_result(|uow| interceptors.execute(uow, &adapter))?;
//! ```

pub mod adapter;
pub mod error;
pub mod handler;
pub mod interceptor;
pub mod logging;
pub mod resolver;
pub mod unit_of_work;

pub use adapter::{HandlerAdapter, HandlerAdapterBuilder, HandlerSource};
pub use error::{ArgumentError, ArgumentResult};
pub use handler::{
    Handler, HandlerDescriptor, HandlerDescriptorBuilder, HandlerKind, HandlerOutcome,
    HandlerParameter, HandlerRegistry, IntoOutcome, ParameterDescriptor, ParameterRole, Payload,
    Resource, Scoped,
};
pub use interceptor::{
    BoxedInterceptor, ChainOutcome, ChainState, DispatchInterceptors, HandlerFn, InterceptorChain,
    InterceptorFn, Interceptors, MessageDispatchInterceptor, MessageHandler,
    MessageHandlerInterceptor, handler_fn, interceptor_fn,
};
pub use logging::{
    DEFAULT_LOGGER, INCOMING_LOGGED, LogRecord, LogSink, LoggingInterceptor, RecordingLogSink,
    TracingLogSink,
};
pub use resolver::{
    Arguments, BoundParameters, BoxedResolver, DefaultParameterResolverFactory,
    MultiParameterResolverFactory, NoResources, ParameterResolver, ParameterResolverFactory,
    ResolutionContext, ResourceLookup, ResourceParameterResolverFactory, ResourceScope,
    ScopedResourceResolverFactory, SimpleResourceLookup, bind_parameters,
};
pub use unit_of_work::{Abandoned, Outcome, Phase, PhaseContext, UnitOfWork};

/// The types most handler code needs.
pub mod prelude {
    pub use crate::{
        HandlerAdapter, HandlerDescriptor, HandlerSource, Interceptors, LoggingInterceptor,
        MessageHandler, MessageHandlerInterceptor, Payload, Resource, Scoped, UnitOfWork,
    };
    pub use courier_core::prelude::*;
}
