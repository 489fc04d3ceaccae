//! # Courier
//!
//! An in-process message dispatch core for event-driven applications.
//!
//! ## Overview
//!
//! A message travels through three layers:
//!
//! ```text
//! ┌──────────────────┐     ┌───────────────────────────┐     ┌────────────────┐
//! │ MessageProcessor │────▶│ Interceptors (outer→inner)│────▶│ HandlerAdapter │──▶ handler
//! │ (unit of work)   │     │ logging, tenancy, ...     │     │ (registry)     │
//! └──────────────────┘     └───────────────────────────┘     └────────────────┘
//! ```
//!
//! - **Messages**: immutable envelopes around any `Send + Sync` payload
//! - **Handlers**: plain closures whose parameters (`Payload<T>`, `Resource<T>`,
//!   `MetaData`, ...) are resolved once, when the adapter is built
//! - **Interceptors**: wrap handling and decide whether to proceed
//! - **Unit of work**: commit/rollback callbacks and scoped resources per message
//! - **Reset**: handlers marked as reset handlers run on `prepare_reset`, e.g.
//!   before a projection is replayed
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! let adapter = HandlerAdapter::builder()
//!     .handler(HandlerDescriptor::handler("greet", |name: Payload<String>| {
//!         format!("hello {}", *name)
//!     }))
//!     .build();
//!
//! let config = load_config()?;
//! let processor = MessageProcessor::from_config(adapter, &config);
//! let greeting = processor.process(Message::new("world".to_string()))?;
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;

/// Everything needed to declare handlers and run messages through them.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    pub use courier_framework::prelude::*;

    // Handler parameters beyond the payload
    pub use courier_framework::{HandlerParameter, ParameterDescriptor, SimpleResourceLookup};

    // Interceptors
    pub use courier_framework::{
        DispatchInterceptors, InterceptorChain, MessageDispatchInterceptor, interceptor_fn,
    };

    // Runtime
    pub use courier_runtime::config::{CourierConfig, load_config, load_config_from_file};
    pub use courier_runtime::logging::{LoggingBuilder, SpanEvents};
    pub use courier_runtime::{MessageProcessor, ProcessorBuilder, ProcessorStats};
}
