// Copyright (c) The Strata Project Authors.

//! Error types for cache stack operations.

use std::sync::Arc;

use strata_layer::LayerError;

/// A boxed error returned by value factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error from a cache stack operation.
///
/// The error is cheap to clone: one failed refresh is delivered to every
/// caller waiting on the same key, and each observes an equal error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operation was attempted after the stack was torn down.
    #[error("cache stack has been disposed")]
    Disposed,

    /// A specific layer operation failed.
    #[error("layer {index} {op} failed: {source}")]
    Layer {
        /// Index of the failing layer in the stack's ordering.
        index: usize,
        /// The operation that failed.
        op: &'static str,
        /// The layer's own error.
        #[source]
        source: LayerError,
    },

    /// The user value factory failed.
    #[error("value factory failed: {message}")]
    Factory {
        /// Message captured from the factory's error.
        message: Arc<str>,
    },

    /// An extension hook failed.
    #[error("extension {hook} hook failed: {message}")]
    Extension {
        /// The hook that failed.
        hook: &'static str,
        /// Message captured from the extension's error.
        message: Arc<str>,
    },
}

impl Error {
    pub(crate) fn layer(index: usize, op: &'static str, source: LayerError) -> Self {
        Self::Layer { index, op, source }
    }

    /// Creates a factory failure from any displayable cause.
    pub fn factory(cause: impl std::fmt::Display) -> Self {
        Self::Factory {
            message: cause.to_string().into(),
        }
    }

    /// Creates an extension failure from any displayable cause.
    pub fn extension(hook: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Extension {
            hook,
            message: cause.to_string().into(),
        }
    }
}
