//! Courier Runtime - configuration, logging setup and message processing.
//!
//! This crate wires the dispatch machinery of `courier-framework` into
//! something an application can run:
//!
//! - Layered configuration (`courier.toml`, `COURIER_*` variables) via figment
//! - A `tracing-subscriber` setup driven by that configuration
//! - [`MessageProcessor`], which opens a unit of work per message and runs it
//!   through the interceptor chains into a handler adapter
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//!
//! ```rust,ignore
//! use courier_runtime::{MessageProcessor, config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//!
//! let processor = MessageProcessor::from_config(adapter, &config);
//! processor.process(Message::new(OrderPlaced { id: 7 }))?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod processor;

pub use config::{ConfigError, ConfigLoader, ConfigResult, CourierConfig, load_config};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use processor::{MessageProcessor, ProcessorBuilder, ProcessorStats};
