//! Runtime type identity for payloads, parameters and return values.
//!
//! Rust erases types behind `dyn Any`, which only knows its [`TypeId`]. The
//! dispatch core also needs a human-readable name (for logging labels and
//! error messages), so every erased value travels with a [`TypeKey`].

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A type-erased, shareable value: a payload, a resolved argument or a resource.
pub type Argument = Arc<dyn Any + Send + Sync>;

/// Identity of a Rust type: its [`TypeId`] plus its full type name.
///
/// Equality and hashing only consider the `TypeId`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the underlying [`TypeId`].
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the fully qualified type name, e.g. `alloc::string::String`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the unqualified type name, e.g. `String` or `Vec<String>`.
    ///
    /// This is the label used when a message is logged.
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }

    /// Returns `true` if this key identifies `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Strips module paths from every path segment of a type name.
///
/// ```
/// use courier_core::foundation::types::short_type_name;
///
/// assert_eq!(short_type_name("alloc::string::String"), "String");
/// assert_eq!(
///     short_type_name("alloc::vec::Vec<my_app::events::OrderPlaced>"),
///     "Vec<OrderPlaced>"
/// );
/// ```
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut path = String::new();

    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            path.push(c);
        } else {
            out.push_str(last_segment(&path));
            path.clear();
            out.push(c);
        }
    }
    out.push_str(last_segment(&path));
    out
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubMessage;

    #[test]
    fn test_short_name_of_local_type() {
        assert_eq!(TypeKey::of::<StubMessage>().short_name(), "StubMessage");
    }

    #[test]
    fn test_short_name_of_std_types() {
        assert_eq!(TypeKey::of::<String>().short_name(), "String");
        assert_eq!(TypeKey::of::<u32>().short_name(), "u32");
        assert_eq!(
            TypeKey::of::<Option<Vec<String>>>().short_name(),
            "Option<Vec<String>>"
        );
    }

    #[test]
    fn test_short_name_keeps_tuples_and_references() {
        assert_eq!(
            short_type_name("(alloc::string::String, &core::primitive::str)"),
            "(String, &str)"
        );
        assert_eq!(short_type_name("dyn core::any::Any"), "dyn Any");
    }

    #[test]
    fn test_type_key_equality_uses_type_id() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<&'static str>());
        assert!(TypeKey::of::<StubMessage>().is::<StubMessage>());
    }
}
