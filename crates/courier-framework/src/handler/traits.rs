//! Typed handlers.
//!
//! Plain closures whose parameters implement [`HandlerParameter`] become
//! handlers through blanket implementations for every arity up to 12, in the
//! style of Axum's handler system:
//!
//! ```rust,ignore
//! use courier_framework::{HandlerDescriptor, Payload, Resource};
//!
//! let describe = HandlerDescriptor::handler(
//!     "on_order",
//!     |order: Payload<OrderPlaced>, repo: Resource<OrderRepository>| -> Result<(), Failure> {
//!         repo.save(&order)?;
//!         Ok(())
//!     },
//! );
//! ```

use courier_core::Argument;

use super::descriptor::ParameterDescriptor;
use super::outcome::{HandlerOutcome, IntoOutcome};
use crate::error::{ArgumentError, ArgumentResult};
use crate::resolver::Arguments;

/// A type that can appear as a typed handler parameter.
pub trait HandlerParameter: Sized + 'static {
    /// Describes the parameter to the resolver factories.
    fn descriptor() -> ParameterDescriptor;

    /// Converts the resolved value back into the parameter type.
    ///
    /// Returns `None` if the value has an unexpected type.
    fn from_argument(argument: Argument) -> Option<Self>;
}

/// A callable that can be described and invoked as a handler.
///
/// `T` is a tuple of the parameter types; it only exists to keep the
/// blanket implementations apart.
pub trait Handler<T>: Send + Sync + 'static {
    /// Descriptors of the parameters, in order.
    fn parameters() -> Vec<ParameterDescriptor>;

    /// Converts `args` and calls the handler.
    fn invoke(&self, args: Arguments) -> ArgumentResult<HandlerOutcome>;
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        impl<F, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> R + Send + Sync + 'static,
            R: IntoOutcome,
            $( $ty: HandlerParameter, )*
        {
            fn parameters() -> Vec<ParameterDescriptor> {
                vec![$($ty::descriptor(),)*]
            }

            fn invoke(&self, args: Arguments) -> ArgumentResult<HandlerOutcome> {
                let mut args = args.into_iter().enumerate();
                let mut position = 0;
                $(
                    let $ty = match args.next() {
                        Some((index, value)) => {
                            $ty::from_argument(value).ok_or_else(|| ArgumentError::mismatch::<$ty>(index))?
                        }
                        None => return Err(ArgumentError::Missing { index: position }),
                    };
                    position += 1;
                )*

                Ok((self)($($ty,)*).into_outcome())
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
