// Copyright (c) The Strata Project Authors.

//! Error type for layer operations.

use std::sync::Arc;

/// An error from a cache layer operation.
///
/// This is an opaque error type that any layer implementation can produce.
/// It captures a message eagerly and is cheap to clone, so a single failure
/// can be reported to several waiting callers.
///
/// # Examples
///
/// ```
/// use strata_layer::LayerError;
///
/// let error = LayerError::new("connection refused");
/// assert_eq!(error.to_string(), "connection refused");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LayerError {
    message: Arc<str>,
}

impl LayerError {
    /// Creates a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into(),
        }
    }

    /// Creates a new error from an underlying cause.
    pub fn caused_by(cause: impl std::fmt::Display) -> Self {
        Self::new(cause.to_string())
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A specialized [`Result`](std::result::Result) type for layer operations.
pub type Result<T> = std::result::Result<T, LayerError>;
