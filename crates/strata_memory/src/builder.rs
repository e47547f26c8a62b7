// Copyright (c) The Strata Project Authors.

use std::marker::PhantomData;

use strata_layer::Clock;

use crate::MemoryLayer;

/// Builder for configuring an in-memory layer.
///
/// Created by [`MemoryLayer::builder`].
///
/// # Examples
///
/// ```
/// use strata_layer::Clock;
/// use strata_memory::MemoryLayer;
///
/// let layer = MemoryLayer::<String>::builder(Clock::system())
///     .max_capacity(10_000)
///     .name("sessions")
///     .build();
/// ```
#[derive(Debug)]
pub struct MemoryLayerBuilder<V> {
    pub(crate) clock: Clock,
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) name: Option<String>,
    _phantom: PhantomData<V>,
}

impl<V> MemoryLayerBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            max_capacity: None,
            initial_capacity: None,
            name: None,
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries the layer may hold.
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = Some(max_capacity);
        self
    }

    /// Pre-sizes the underlying map for the expected number of entries.
    #[must_use]
    pub fn initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = Some(initial_capacity);
        self
    }

    /// Names the layer for diagnostics.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured layer.
    #[must_use]
    pub fn build(self) -> MemoryLayer<V> {
        MemoryLayer::from_builder(&self)
    }
}
