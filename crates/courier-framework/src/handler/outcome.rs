//! Conversion of handler return values.

use courier_core::{Failure, ReturnValue};

/// What a handler produced: an optional value, or its own failure.
pub type HandlerOutcome = Result<Option<ReturnValue>, Failure>;

/// Types a handler may return.
///
/// `()` and `None` mean "no value". `Result::Err` becomes the handler's
/// failure and is passed upstream unchanged.
pub trait IntoOutcome {
    fn into_outcome(self) -> HandlerOutcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> HandlerOutcome {
        Ok(None)
    }
}

impl IntoOutcome for ReturnValue {
    fn into_outcome(self) -> HandlerOutcome {
        Ok(Some(self))
    }
}

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> HandlerOutcome {
        match self {
            Some(value) => value.into_outcome(),
            None => Ok(None),
        }
    }
}

impl<T: IntoOutcome, E: Into<Failure>> IntoOutcome for Result<T, E> {
    fn into_outcome(self) -> HandlerOutcome {
        match self {
            Ok(value) => value.into_outcome(),
            Err(error) => Err(error.into()),
        }
    }
}

macro_rules! impl_into_outcome_for_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOutcome for $ty {
                fn into_outcome(self) -> HandlerOutcome {
                    Ok(Some(ReturnValue::new(self)))
                }
            }
        )*
    };
}

impl_into_outcome_for_values!(
    String,
    &'static str,
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    serde_json::Value,
);
