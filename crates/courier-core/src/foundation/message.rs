//! The message envelope.
//!
//! A [`Message`] is immutable once created. "Updating" a message produces a
//! new instance that shares the identifier and the payload.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::types::{Argument, TypeKey};

// ============================================================================
// MessageId
// ============================================================================

/// Unique identifier of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generates a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// MetaData
// ============================================================================

/// String-keyed metadata attached to a message.
///
/// Keys are kept sorted so that iteration order is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaData(BTreeMap<String, Value>);

impl MetaData {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns a copy containing the entries of both, `other` winning on conflicts.
    pub fn merged_with(&self, other: &MetaData) -> Self {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MetaData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ============================================================================
// Message
// ============================================================================

struct MessageInner {
    id: MessageId,
    payload: Argument,
    payload_type: TypeKey,
    metadata: MetaData,
}

/// An immutable envelope around a type-erased payload.
///
/// Cloning is cheap: the envelope is reference counted.
///
/// # Example
///
/// ```rust
/// use courier_core::{Message, MetaData};
///
/// let message = Message::new("hello".to_string());
/// assert_eq!(message.payload_as::<String>().unwrap(), "hello");
/// assert_eq!(message.label(), "String");
///
/// let traced = message.and_metadata(MetaData::new().with("traceId", "abc"));
/// assert_eq!(traced.id(), message.id());
/// assert!(message.metadata().is_empty());
/// ```
#[derive(Clone)]
pub struct Message {
    inner: Arc<MessageInner>,
}

impl Message {
    /// Creates a message with a fresh identifier and no metadata.
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self::from_parts(
            MessageId::new(),
            Arc::new(payload),
            TypeKey::of::<T>(),
            MetaData::new(),
        )
    }

    /// Creates a message from an already erased payload.
    ///
    /// `payload_type` must describe the concrete type behind `payload`.
    pub fn from_parts(
        id: MessageId,
        payload: Argument,
        payload_type: TypeKey,
        metadata: MetaData,
    ) -> Self {
        Self {
            inner: Arc::new(MessageInner {
                id,
                payload,
                payload_type,
                metadata,
            }),
        }
    }

    /// Returns the message identifier.
    pub fn id(&self) -> MessageId {
        self.inner.id
    }

    /// Returns the type-erased payload.
    pub fn payload(&self) -> &Argument {
        &self.inner.payload
    }

    /// Returns the payload as `T`, if that is its concrete type.
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.inner.payload.downcast_ref::<T>()
    }

    /// Returns the type of the payload.
    pub fn payload_type(&self) -> TypeKey {
        self.inner.payload_type
    }

    /// Returns the metadata.
    pub fn metadata(&self) -> &MetaData {
        &self.inner.metadata
    }

    /// Short display label: the unqualified payload type name.
    pub fn label(&self) -> String {
        self.inner.payload_type.short_name()
    }

    /// Returns a message with the same id and payload but replaced metadata.
    pub fn with_metadata(&self, metadata: MetaData) -> Self {
        Self::from_parts(
            self.inner.id,
            Arc::clone(&self.inner.payload),
            self.inner.payload_type,
            metadata,
        )
    }

    /// Returns a message with the same id and payload and `metadata` merged in.
    pub fn and_metadata(&self, metadata: MetaData) -> Self {
        self.with_metadata(self.inner.metadata.merged_with(&metadata))
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.inner.id)
            .field("payload_type", &self.inner.payload_type.name())
            .field("metadata", &self.inner.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct StubMessage;

    #[test]
    fn test_new_message_records_payload_type() {
        let message = Message::new(StubMessage);
        assert_eq!(message.payload_type(), TypeKey::of::<StubMessage>());
        assert_eq!(message.payload_as::<StubMessage>(), Some(&StubMessage));
        assert!(message.payload_as::<String>().is_none());
        assert_eq!(message.label(), "StubMessage");
    }

    #[test]
    fn test_metadata_updates_create_new_instances() {
        let original = Message::new(1u32).with_metadata(MetaData::new().with("a", 1));
        let updated = original.and_metadata(MetaData::new().with("b", "two"));

        assert_eq!(updated.id(), original.id());
        assert!(Arc::ptr_eq(updated.payload(), original.payload()));
        assert_eq!(original.metadata().len(), 1);
        assert_eq!(updated.metadata().get("a"), Some(&json!(1)));
        assert_eq!(updated.metadata().get("b"), Some(&json!("two")));
    }

    #[test]
    fn test_merge_prefers_new_values() {
        let base: MetaData = [("k", "old"), ("x", "keep")].into_iter().collect();
        let merged = base.merged_with(&MetaData::new().with("k", "new"));
        assert_eq!(merged.get("k"), Some(&json!("new")));
        assert_eq!(merged.get("x"), Some(&json!("keep")));
    }

    #[test]
    fn test_message_ids_are_unique() {
        assert_ne!(Message::new(()).id(), Message::new(()).id());
    }

    #[test]
    fn test_metadata_serializes_as_map() {
        let metadata = MetaData::new().with("traceId", "abc");
        let encoded = serde_json::to_value(&metadata).unwrap();
        assert_eq!(encoded, json!({ "traceId": "abc" }));
    }
}
