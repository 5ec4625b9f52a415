//! Error types for arraybridge.

use thiserror::Error;

/// Errors raised by adapted functions, descriptors and namespaces.
///
/// Errors produced by a backend body travel unchanged through every adapter
/// layer; the walker swallows the attribute variants per attribute.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WrapError {
    /// A backend function failed.
    #[error("{function}: {message}")]
    Backend {
        /// Name of the failing function.
        function: String,
        /// Message reported by the backend.
        message: String,
    },

    /// A required positional or keyword argument was not supplied.
    #[error("missing argument `{0}`")]
    MissingArgument(String),

    /// An argument had an unusable value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A value had the wrong kind, e.g. a scalar where an array was required.
    #[error("expected {expected}, got {got}")]
    TypeMismatch {
        /// What was required.
        expected: &'static str,
        /// What was found.
        got: &'static str,
    },

    /// Two arrays could not be combined.
    #[error("incompatible shapes {0:?} and {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// An attribute rejected assignment.
    #[error("attribute `{0}` is read-only")]
    ReadOnlyAttribute(String),

    /// Reading an attribute failed.
    #[error("probing attribute `{name}` failed: {message}")]
    AttributeProbe {
        /// Attribute name.
        name: String,
        /// Failure reported by the getter.
        message: String,
    },

    /// The attribute does not exist.
    #[error("no attribute `{0}`")]
    NoSuchAttribute(String),

    /// The container type has no static method of this name.
    #[error("container has no method `static_{0}`")]
    MissingContainerMethod(String),

    /// A function descriptor failed validation.
    #[error("invalid function descriptor")]
    InvalidDescriptor,
}

impl From<briny::prelude::ValidationError> for WrapError {
    fn from(_: briny::prelude::ValidationError) -> Self {
        Self::InvalidDescriptor
    }
}

impl WrapError {
    /// Shorthand for a [`WrapError::Backend`] failure.
    pub fn backend(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            function: function.into(),
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, WrapError>;
