// Copyright (c) The Strata Project Authors.

//! Integration tests for the layer contract against the mock layer.

use std::time::{Duration, Instant};

use strata_layer::{
    CacheEntry, CacheLayer, DynamicLayer, DynamicLayerExt,
    testing::{LayerOp, MockLayer},
};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn entry(value: i32) -> CacheEntry<i32> {
    CacheEntry::new(value, Instant::now() + Duration::from_secs(60))
}

#[test]
fn set_then_get_roundtrip() {
    block_on(async {
        let layer = MockLayer::new();

        assert!(layer.get("a").await.unwrap().is_none());
        layer.set("a", entry(1)).await.unwrap();
        assert_eq!(*layer.get("a").await.unwrap().unwrap().value(), 1);
    });
}

#[test]
fn get_returns_expired_entries_raw() {
    block_on(async {
        let layer = MockLayer::new();
        let expired = CacheEntry::new(7, Instant::now() - Duration::from_secs(1));

        layer.set("old", expired.clone()).await.unwrap();

        // Layers do not filter by expiry; the stack does.
        assert_eq!(layer.get("old").await.unwrap(), Some(expired));
    });
}

#[test]
fn evict_and_flush_remove_entries() {
    block_on(async {
        let layer = MockLayer::new();
        layer.set("a", entry(1)).await.unwrap();
        layer.set("b", entry(2)).await.unwrap();

        layer.evict("a").await.unwrap();
        assert!(!layer.contains_key("a"));
        assert!(layer.contains_key("b"));

        layer.flush().await.unwrap();
        assert_eq!(layer.entry_count(), 0);
    });
}

#[test]
fn operations_are_recorded_in_order() {
    block_on(async {
        let layer = MockLayer::new();
        layer.set("k", entry(1)).await.unwrap();
        let _ = layer.get("k").await.unwrap();
        layer.cleanup().await.unwrap();

        let ops = layer.operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], LayerOp::Set { key, .. } if key == "k"));
        assert_eq!(ops[1], LayerOp::Get("k".to_string()));
        assert_eq!(ops[2], LayerOp::Cleanup);
    });
}

#[test]
fn failure_injection_is_selective() {
    block_on(async {
        let layer: MockLayer<i32> = MockLayer::new();
        layer.fail_when(|op| matches!(op, LayerOp::Get(k) if k == "bad"));

        assert!(layer.get("bad").await.is_err());
        assert!(layer.get("good").await.is_ok());

        layer.clear_failures();
        assert!(layer.get("bad").await.is_ok());
    });
}

#[test]
fn availability_flag_is_reported() {
    block_on(async {
        let layer: MockLayer<i32> = MockLayer::new();
        assert!(layer.is_available("k").await);

        layer.set_available(false);
        assert!(!layer.is_available("k").await);
    });
}

#[test]
fn dynamic_layer_delegates_and_shares() {
    block_on(async {
        let mock: MockLayer<i32> = MockLayer::new();
        let dynamic: DynamicLayer<i32> = mock.clone().into_dynamic();
        let clone = dynamic.clone();

        dynamic.set("k", entry(9)).await.unwrap();
        assert_eq!(*clone.get("k").await.unwrap().unwrap().value(), 9);

        // The erased handle drives the same underlying layer.
        assert!(mock.contains_key("k"));
    });
}
