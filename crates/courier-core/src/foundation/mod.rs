//! Foundation layer - message model and type system.
//!
//! This module contains the fundamental building blocks of Courier:
//! - Runtime type identity and the payload type hierarchy
//! - The immutable message envelope
//! - Return values, failures and the dispatch error taxonomy

pub mod error;
pub mod hierarchy;
pub mod message;
pub mod types;
pub mod value;

pub use error::{DispatchError, DispatchResult, Failure};
pub use hierarchy::TypeHierarchy;
pub use message::{Message, MessageId, MetaData};
pub use types::{Argument, TypeKey};
pub use value::{ReturnValue, result_label};
