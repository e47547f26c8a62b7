// Copyright (c) The Strata Project Authors.
// Licensed under the MIT License.

//! Multi-layer caching with coordinated refresh.
//!
//! This crate provides [`CacheStack`], a cache front for an ordered list of
//! storage layers (fastest first) with:
//!
//! - a get-or-compute protocol with per-key single-flight refresh, so
//!   concurrent callers for a cold key share one factory run,
//! - stale-while-revalidate: entries near expiry are served immediately
//!   while a background refresh replaces them,
//! - automatic back-population of higher layers from lower-layer hits,
//! - an extension pipeline wrapping refreshes and observing writes,
//!   evictions and flushes.
//!
//! Storage layers implement [`CacheLayer`] (see the `strata_layer` crate);
//! an in-memory layer backed by moka ships in `strata_memory` and is
//! re-exported here as [`MemoryLayer`] under the default `memory` feature.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use strata::{CacheSettings, CacheStack, Clock, MemoryLayer};
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::frozen();
//! let stack = CacheStack::builder(clock.clone())
//!     .layer(MemoryLayer::with_capacity(clock.clone(), 10_000))
//!     .layer(MemoryLayer::new(clock))
//!     .build()?;
//!
//! let settings = CacheSettings::new(Duration::from_secs(300))
//!     .with_stale_after(Duration::from_secs(60));
//!
//! let value = stack
//!     .get_or_set("greeting", |_previous| async { Ok("hello".to_string()) }, &settings)
//!     .await?;
//! assert_eq!(value, "hello");
//! # Ok::<(), strata::Error>(())
//! # }).unwrap();
//! ```

mod builder;
mod error;
pub mod extensions;
mod keylock;
mod runtime;
mod stack;

pub use builder::CacheStackBuilder;
pub use error::{BoxError, Error};
#[doc(inline)]
pub use extensions::{CacheExtension, CacheUpdateType, LoggingExtension, RefreshNext};
pub use stack::{CacheEntryStatus, CacheStack};

pub use strata_layer::{CacheEntry, CacheLayer, CacheSettings, Clock, DynamicLayer, DynamicLayerExt, LayerError};

#[cfg(feature = "memory")]
pub use strata_memory::{MemoryLayer, MemoryLayerBuilder};

#[cfg(feature = "test-util")]
pub use strata_layer::testing::{LayerOp, MockLayer};
