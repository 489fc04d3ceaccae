//! # Courier Core
//!
//! The message model shared by every Courier crate.
//!
//! Courier is the in-process dispatch core of an event-driven messaging
//! framework. This crate holds the types every other layer agrees on:
//!
//! - **Messages**: immutable envelopes around type-erased payloads ([`Message`], [`MetaData`])
//! - **Type identity**: [`TypeKey`] and the declared payload [`TypeHierarchy`]
//! - **Results**: [`ReturnValue`] for handler results, [`Failure`] and
//!   [`DispatchError`] for everything that can go wrong
//!
//! Handler resolution, interceptors and the unit of work live in
//! `courier-framework`; configuration and logging setup in `courier-runtime`.
//!
//! ## Example
//!
//! ```rust
//! use courier_core::{DispatchError, Failure, Message};
//!
//! let message = Message::new(42u64);
//! assert_eq!(message.label(), "u64");
//!
//! let failure = Failure::msg("handler blew up");
//! let error = DispatchError::HandlerExecution(failure.clone());
//! assert!(error.cause().ptr_eq(&failure));
//! ```

pub mod foundation;

pub use foundation::{
    Argument, DispatchError, DispatchResult, Failure, Message, MessageId, MetaData, ReturnValue,
    TypeHierarchy, TypeKey, result_label,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
}
