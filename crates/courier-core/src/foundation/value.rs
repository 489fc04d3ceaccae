//! Handler return values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::types::{Argument, TypeKey};

/// A type-erased value returned by a handler.
///
/// An absent result (`()` or `None` in the handler) is represented by the
/// absence of a `ReturnValue`, i.e. `Option<ReturnValue>::None`.
#[derive(Clone)]
pub struct ReturnValue {
    value: Argument,
    type_key: TypeKey,
}

impl ReturnValue {
    /// Wraps a concrete value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_key: TypeKey::of::<T>(),
        }
    }

    /// Returns the type of the wrapped value.
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Unqualified type name of the wrapped value.
    pub fn label(&self) -> String {
        self.type_key.short_name()
    }

    /// Returns the erased value.
    pub fn value(&self) -> &Argument {
        &self.value
    }

    /// Returns the value as `T`, if that is its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for ReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnValue")
            .field("type", &self.type_key.name())
            .finish_non_exhaustive()
    }
}

/// Label used when logging an optional result: its type name, or `null`.
pub fn result_label(value: Option<&ReturnValue>) -> String {
    value.map_or_else(|| "null".to_string(), ReturnValue::label)
}
