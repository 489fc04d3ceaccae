//! Handler lookup by payload type.

use std::sync::Arc;

use courier_core::{TypeHierarchy, TypeKey};

use super::descriptor::{HandlerDescriptor, HandlerKind};

/// The handlers of one target, in discovery order.
///
/// For a payload type, the normal handler with the most specific accepted
/// type wins: an exact match beats a supertype, a closer supertype beats a
/// more distant one, and handlers without a payload type come last. Among
/// equally specific handlers the first registered one is chosen.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: Vec<HandlerDescriptor>,
    hierarchy: Arc<TypeHierarchy>,
}

impl HandlerRegistry {
    pub fn new(handlers: Vec<HandlerDescriptor>, hierarchy: Arc<TypeHierarchy>) -> Self {
        Self {
            handlers,
            hierarchy,
        }
    }

    /// Returns the handler for `payload_type`, if any accepts it.
    pub fn find_handler(&self, payload_type: &TypeKey) -> Option<&HandlerDescriptor> {
        self.position_of(payload_type).map(|index| &self.handlers[index])
    }

    /// Returns the reset handlers in registration order.
    pub fn find_reset_handlers(&self) -> impl Iterator<Item = &HandlerDescriptor> {
        self.handlers.iter().filter(|h| h.kind() == HandlerKind::Reset)
    }

    pub(crate) fn position_of(&self, payload_type: &TypeKey) -> Option<usize> {
        self.handlers
            .iter()
            .enumerate()
            .filter(|(_, handler)| handler.kind() == HandlerKind::Normal)
            .filter_map(|(index, handler)| {
                let distance = match handler.payload_type() {
                    Some(accepted) => self.hierarchy.distance(payload_type, &accepted)?,
                    None => usize::MAX,
                };
                Some((index, distance))
            })
            .min_by_key(|(_, distance)| *distance)
            .map(|(index, _)| index)
    }

    pub(crate) fn reset_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.handlers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.kind() == HandlerKind::Reset)
            .map(|(index, _)| index)
    }

    pub fn handlers(&self) -> &[HandlerDescriptor] {
        &self.handlers
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
