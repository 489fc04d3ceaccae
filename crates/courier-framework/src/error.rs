//! Error types for the Courier framework.

use thiserror::Error;

/// Errors raised while turning resolved arguments into typed handler parameters.
///
/// These indicate a wiring defect (a resolver produced a value of the wrong
/// type, or too few values), never a failure of the handler itself.
#[derive(Debug, Clone, Error)]
pub enum ArgumentError {
    /// The argument at `index` is not of the expected type.
    #[error("argument #{index} is not a '{expected}'")]
    TypeMismatch {
        /// Parameter position.
        index: usize,
        /// Expected type name.
        expected: &'static str,
    },

    /// No argument was supplied for position `index`.
    #[error("argument #{index} is missing")]
    Missing {
        /// Parameter position.
        index: usize,
    },
}

impl ArgumentError {
    /// Creates a type mismatch error for `T`.
    pub fn mismatch<T: ?Sized + 'static>(index: usize) -> Self {
        Self::TypeMismatch {
            index,
            expected: std::any::type_name::<T>(),
        }
    }

    /// Returns the position of the offending argument.
    pub fn index(&self) -> usize {
        match self {
            Self::TypeMismatch { index, .. } | Self::Missing { index } => *index,
        }
    }
}

/// Result type for argument conversion.
pub type ArgumentResult<T> = Result<T, ArgumentError>;
