// Copyright (c) The Strata Project Authors.
// Licensed under the MIT License.

//! In-memory layer implementation using moka.
//!
//! This crate provides [`MemoryLayer`], an in-memory cache layer backed by
//! the moka crate, which offers high-performance concurrent caching with
//! capacity-based eviction. It is the usual top layer of a cache stack.

mod builder;
mod layer;

pub use builder::MemoryLayerBuilder;
pub use layer::MemoryLayer;
