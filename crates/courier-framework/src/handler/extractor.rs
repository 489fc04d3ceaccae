//! Typed handler parameters.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use courier_core::{Argument, Message, MetaData};

use super::descriptor::ParameterDescriptor;
use super::traits::HandlerParameter;

macro_rules! shared_extractor {
    ($(#[$doc:meta])* $name:ident, $descriptor:expr) => {
        $(#[$doc])*
        pub struct $name<T>(pub Arc<T>);

        impl<T> $name<T> {
            /// Returns the shared value.
            pub fn into_inner(self) -> Arc<T> {
                self.0
            }
        }

        impl<T> Deref for $name<T> {
            type Target = T;

            fn deref(&self) -> &T {
                &self.0
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self(Arc::clone(&self.0))
            }
        }

        impl<T: fmt::Debug> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl<T: Any + Send + Sync> HandlerParameter for $name<T> {
            fn descriptor() -> ParameterDescriptor {
                $descriptor
            }

            fn from_argument(argument: Argument) -> Option<Self> {
                argument.downcast::<T>().ok().map($name)
            }
        }
    };
}

shared_extractor!(
    /// The message payload, upcast to `T` if the payload type extends it.
    Payload,
    ParameterDescriptor::payload::<T>()
);

shared_extractor!(
    /// An application-wide resource of type `T`.
    Resource,
    ParameterDescriptor::resource::<T>()
);

shared_extractor!(
    /// A resource of type `T` placed in the current unit of work with
    /// [`UnitOfWork::provide`](crate::UnitOfWork::provide).
    Scoped,
    ParameterDescriptor::scoped::<T>()
);

impl HandlerParameter for Message {
    fn descriptor() -> ParameterDescriptor {
        ParameterDescriptor::message()
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        argument.downcast::<Message>().ok().map(Arc::unwrap_or_clone)
    }
}

impl HandlerParameter for MetaData {
    fn descriptor() -> ParameterDescriptor {
        ParameterDescriptor::metadata()
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        argument.downcast::<MetaData>().ok().map(Arc::unwrap_or_clone)
    }
}
