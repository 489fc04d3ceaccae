//! Payload type hierarchy used for capability-based dispatch.
//!
//! Rust has no runtime subtyping, so "a handler for `DomainEvent` also handles
//! `OrderPlaced`" has to be declared. The discovery collaborator supplies a
//! [`TypeHierarchy`] listing `Sub extends Super` relations, each with the
//! conversion that turns a `Sub` payload into the `Super` value the handler
//! declared.
//!
//! ```rust
//! use courier_core::{Argument, TypeHierarchy, TypeKey};
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct OrderPlaced { id: u32 }
//! struct DomainEvent { aggregate: u32 }
//!
//! impl From<OrderPlaced> for DomainEvent {
//!     fn from(e: OrderPlaced) -> Self {
//!         DomainEvent { aggregate: e.id }
//!     }
//! }
//!
//! let hierarchy = TypeHierarchy::new().extends::<OrderPlaced, DomainEvent>();
//! let from = TypeKey::of::<OrderPlaced>();
//! let to = TypeKey::of::<DomainEvent>();
//! assert_eq!(hierarchy.distance(&from, &to), Some(1));
//!
//! let payload: Argument = Arc::new(OrderPlaced { id: 7 });
//! let upcast = hierarchy.upcast(&payload, &from, &to).unwrap();
//! assert_eq!(upcast.downcast_ref::<DomainEvent>().unwrap().aggregate, 7);
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use super::types::{Argument, TypeKey};

type Upcast = Arc<dyn Fn(&Argument) -> Option<Argument> + Send + Sync>;

#[derive(Clone)]
struct Declaration {
    sub: TypeKey,
    sup: TypeKey,
    upcast: Upcast,
}

/// An ordered set of `Sub extends Super` declarations.
///
/// Declarations are walked breadth-first in declaration order, so the
/// shortest path between two types (and among equally short paths, the one
/// declared first) is always the one chosen.
#[derive(Clone, Default)]
pub struct TypeHierarchy {
    declarations: Vec<Declaration>,
}

impl TypeHierarchy {
    /// Creates an empty hierarchy in which every type only matches itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that `Sub` extends `Sup`, converting with `Into`.
    pub fn extends<Sub, Sup>(self) -> Self
    where
        Sub: Clone + Into<Sup> + Send + Sync + 'static,
        Sup: Send + Sync + 'static,
    {
        self.extends_with::<Sub, Sup, _>(|sub| sub.clone().into())
    }

    /// Declares that `Sub` extends `Sup` with an explicit conversion.
    pub fn extends_with<Sub, Sup, F>(mut self, upcast: F) -> Self
    where
        Sub: Send + Sync + 'static,
        Sup: Send + Sync + 'static,
        F: Fn(&Sub) -> Sup + Send + Sync + 'static,
    {
        self.declarations.push(Declaration {
            sub: TypeKey::of::<Sub>(),
            sup: TypeKey::of::<Sup>(),
            upcast: Arc::new(move |value| {
                value
                    .downcast_ref::<Sub>()
                    .map(|sub| Arc::new(upcast(sub)) as Argument)
            }),
        });
        self
    }

    /// Appends the declarations of `other` after this hierarchy's own.
    pub fn merged(mut self, other: TypeHierarchy) -> Self {
        self.declarations.extend(other.declarations);
        self
    }

    /// Returns the direct supertypes of `ty`, in declaration order.
    pub fn supertypes<'a>(&'a self, ty: &'a TypeKey) -> impl Iterator<Item = TypeKey> + 'a {
        self.declarations
            .iter()
            .filter(move |d| d.sub == *ty)
            .map(|d| d.sup)
    }

    /// Returns the number of `extends` steps from `from` up to `to`.
    ///
    /// `Some(0)` means the same type, `None` means `to` is not a supertype
    /// of `from`.
    pub fn distance(&self, from: &TypeKey, to: &TypeKey) -> Option<usize> {
        self.path(from, to).map(|path| path.len())
    }

    /// Returns `true` if a `from` value can be handed to a `to` parameter.
    pub fn is_assignable(&self, from: &TypeKey, to: &TypeKey) -> bool {
        self.path(from, to).is_some()
    }

    /// Converts a `from` value into a `to` value along the shortest path.
    ///
    /// Returns the value itself when both types are equal.
    pub fn upcast(&self, value: &Argument, from: &TypeKey, to: &TypeKey) -> Option<Argument> {
        let path = self.path(from, to)?;
        path.into_iter().try_fold(Arc::clone(value), |current, index| {
            (self.declarations[index].upcast)(&current)
        })
    }

    /// Returns the number of declarations.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Returns `true` if nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Breadth-first search returning declaration indices from `from` to `to`.
    fn path(&self, from: &TypeKey, to: &TypeKey) -> Option<Vec<usize>> {
        if from == to {
            return Some(Vec::new());
        }

        let mut reached: HashMap<TypeKey, (TypeKey, usize)> = HashMap::new();
        let mut queue = VecDeque::from([*from]);

        while let Some(current) = queue.pop_front() {
            for (index, decl) in self.declarations.iter().enumerate() {
                if decl.sub != current || decl.sup == *from || reached.contains_key(&decl.sup) {
                    continue;
                }
                reached.insert(decl.sup, (current, index));
                if decl.sup == *to {
                    let mut path = vec![index];
                    let mut cursor = current;
                    while cursor != *from {
                        let (prev, step) = reached[&cursor];
                        path.push(step);
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(decl.sup);
            }
        }

        None
    }
}

impl fmt::Debug for TypeHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.declarations
                    .iter()
                    .map(|d| format!("{} extends {}", d.sub.short_name(), d.sup.short_name())),
            )
            .finish()
    }
}
