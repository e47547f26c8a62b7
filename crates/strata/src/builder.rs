// Copyright (c) The Strata Project Authors.

//! Cache stack builder.

use std::sync::Arc;

use strata_layer::{CacheLayer, Clock, DynamicLayer};

use crate::{CacheStack, Error, extensions::CacheExtension};

/// Builder for constructing a cache stack.
///
/// Created by [`CacheStack::builder`]. Layers are added in priority order:
/// the first [`layer`](Self::layer) call becomes index 0 (expected fastest
/// and smallest), the last becomes the bottom of the stack. Extensions are
/// registered once, in the order their wrappers should nest.
///
/// # Examples
///
/// ```
/// use strata::{CacheStack, Clock, LoggingExtension, MemoryLayer};
///
/// let clock = Clock::frozen();
/// let stack = CacheStack::<String>::builder(clock.clone())
///     .layer(MemoryLayer::with_capacity(clock.clone(), 10_000))
///     .layer(MemoryLayer::new(clock))
///     .extension(LoggingExtension::new())
///     .build()
///     .unwrap();
///
/// assert_eq!(stack.layers().len(), 2);
/// ```
pub struct CacheStackBuilder<V> {
    clock: Clock,
    layers: Vec<DynamicLayer<V>>,
    extensions: Vec<Arc<dyn CacheExtension<V>>>,
}

impl<V> CacheStackBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            layers: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Appends a layer below the ones already added.
    #[must_use]
    pub fn layer<L>(self, layer: L) -> Self
    where
        L: CacheLayer<V> + 'static,
    {
        self.dynamic_layer(DynamicLayer::new(layer))
    }

    /// Appends an already type-erased layer.
    #[must_use]
    pub fn dynamic_layer(mut self, layer: DynamicLayer<V>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Appends an unbounded in-memory layer sharing the stack's clock.
    #[cfg(feature = "memory")]
    #[must_use]
    pub fn memory(self) -> Self {
        let clock = self.clock.clone();
        self.layer(strata_memory::MemoryLayer::new(clock))
    }

    /// Registers an extension.
    ///
    /// Refresh wrappers nest in registration order (first registered is
    /// outermost); listeners fire in registration order.
    #[must_use]
    pub fn extension<E>(mut self, extension: E) -> Self
    where
        E: CacheExtension<V> + 'static,
    {
        self.extensions.push(Arc::new(extension));
        self
    }

    /// Builds the stack and notifies every extension of its owner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when no layer was added.
    pub fn build(self) -> Result<CacheStack<V>, Error> {
        if self.layers.is_empty() {
            return Err(Error::InvalidArgument("at least one cache layer is required"));
        }
        let stack = CacheStack::new(self.layers, self.extensions, self.clock);
        for extension in stack.extensions() {
            extension.attached(&stack);
        }
        Ok(stack)
    }
}

impl<V> std::fmt::Debug for CacheStackBuilder<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStackBuilder")
            .field("layers", &self.layers.len())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}
