// Copyright (c) The Strata Project Authors.

//! Integration tests for the extension pipeline.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use strata::{
    CacheEntry, CacheExtension, CacheSettings, CacheStack, CacheUpdateType, Clock, Error, MemoryLayer, RefreshNext,
};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

type Events = Arc<Mutex<Vec<String>>>;

/// Records every hook invocation into a shared event log.
struct Recorder {
    name: &'static str,
    events: Events,
}

impl Recorder {
    fn new(name: &'static str, events: &Events) -> Self {
        Self {
            name,
            events: Arc::clone(events),
        }
    }

    fn push(&self, event: impl AsRef<str>) {
        self.events.lock().push(format!("{}:{}", self.name, event.as_ref()));
    }
}

#[async_trait]
impl CacheExtension<i32> for Recorder {
    fn attached(&self, _stack: &CacheStack<i32>) {
        self.push("attached");
    }

    async fn with_refresh(&self, _key: &str, next: RefreshNext<i32>, _settings: &CacheSettings) -> Result<CacheEntry<i32>, Error> {
        self.push("refresh:enter");
        let result = next.run().await;
        self.push("refresh:exit");
        result
    }

    async fn on_update(&self, _key: &str, _expiry: Instant, update: CacheUpdateType) -> Result<(), Error> {
        self.push(format!("update:{update:?}"));
        Ok(())
    }

    async fn on_eviction(&self, key: &str) -> Result<(), Error> {
        self.push(format!("evict:{key}"));
        Ok(())
    }

    async fn on_flush(&self) -> Result<(), Error> {
        self.push("flush");
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.push("close");
        Ok(())
    }
}

fn stack_with(extensions: Vec<Recorder>, clock: &Clock) -> CacheStack<i32> {
    let mut builder = CacheStack::builder(clock.clone()).layer(MemoryLayer::new(clock.clone()));
    for extension in extensions {
        builder = builder.extension(extension);
    }
    builder.build().unwrap()
}

#[test]
fn extensions_are_attached_once_at_build() {
    let events: Events = Events::default();
    let clock = Clock::frozen();
    let stack = stack_with(vec![Recorder::new("a", &events)], &clock);

    assert_eq!(stack.extensions().len(), 1);
    assert_eq!(*events.lock(), vec!["a:attached".to_string()]);
}

#[test]
fn refresh_wrappers_nest_in_registration_order() {
    block_on(async {
        let events: Events = Events::default();
        let clock = Clock::frozen();
        let stack = stack_with(vec![Recorder::new("outer", &events), Recorder::new("inner", &events)], &clock);
        let settings = CacheSettings::new(Duration::from_secs(60));

        events.lock().clear();
        let value = stack.get_or_set("k", |_| async { Ok(1) }, &settings).await.unwrap();
        assert_eq!(value, 1);

        // The first registered extension is outermost; update listeners
        // fire inside the pipeline, in registration order.
        assert_eq!(
            *events.lock(),
            vec![
                "outer:refresh:enter".to_string(),
                "inner:refresh:enter".to_string(),
                "outer:update:AddEntry".to_string(),
                "inner:update:AddEntry".to_string(),
                "inner:refresh:exit".to_string(),
                "outer:refresh:exit".to_string(),
            ]
        );
    });
}

#[test]
fn update_type_distinguishes_misses_from_refreshes() {
    block_on(async {
        let events: Events = Events::default();
        let clock = Clock::frozen();
        let stack = stack_with(vec![Recorder::new("x", &events)], &clock);
        let settings = CacheSettings::new(Duration::from_secs(10));

        // A true miss records AddEntry.
        stack.get_or_set("k", |_| async { Ok(1) }, &settings).await.unwrap();
        assert!(events.lock().contains(&"x:update:AddEntry".to_string()));

        // Refreshing an expired entry records AddOrUpdateEntry.
        clock.advance(Duration::from_secs(20));
        events.lock().clear();
        stack.get_or_set("k", |_| async { Ok(2) }, &settings).await.unwrap();
        assert!(events.lock().contains(&"x:update:AddOrUpdateEntry".to_string()));
        assert!(!events.lock().contains(&"x:update:AddEntry".to_string()));
    });
}

#[test]
fn direct_writes_notify_update_listeners() {
    block_on(async {
        let events: Events = Events::default();
        let clock = Clock::frozen();
        let stack = stack_with(vec![Recorder::new("x", &events)], &clock);

        events.lock().clear();
        stack.set("k", 1, Duration::from_secs(60)).await.unwrap();

        assert_eq!(*events.lock(), vec!["x:update:AddOrUpdateEntry".to_string()]);
    });
}

#[test]
fn eviction_flush_and_close_notify_listeners() {
    block_on(async {
        let events: Events = Events::default();
        let clock = Clock::frozen();
        let stack = stack_with(vec![Recorder::new("x", &events)], &clock);

        stack.set("k", 1, Duration::from_secs(60)).await.unwrap();
        events.lock().clear();

        stack.evict("k").await.unwrap();
        stack.flush().await.unwrap();
        stack.close().await.unwrap();

        assert_eq!(
            *events.lock(),
            vec!["x:evict:k".to_string(), "x:flush".to_string(), "x:close".to_string()]
        );
    });
}

/// Rejects every write.
struct RejectingListener;

#[async_trait]
impl CacheExtension<i32> for RejectingListener {
    async fn on_update(&self, _key: &str, _expiry: Instant, _update: CacheUpdateType) -> Result<(), Error> {
        Err(Error::extension("on_update", "listener rejected write"))
    }
}

#[test]
fn listener_errors_propagate_to_the_caller() {
    block_on(async {
        let clock = Clock::frozen();
        let stack = CacheStack::builder(clock.clone())
            .layer(MemoryLayer::new(clock.clone()))
            .extension(RejectingListener)
            .build()
            .unwrap();

        let error = stack.set("k", 1, Duration::from_secs(60)).await.unwrap_err();
        assert_eq!(error, Error::extension("on_update", "listener rejected write"));

        // The write itself reached the layers before the listener ran.
        assert!(stack.get("k").await.unwrap().is_some());
    });
}

#[test]
fn listener_failures_do_not_starve_later_listeners() {
    block_on(async {
        let events: Events = Events::default();
        let clock = Clock::frozen();
        let stack = CacheStack::builder(clock.clone())
            .layer(MemoryLayer::new(clock.clone()))
            .extension(RejectingListener)
            .extension(Recorder::new("late", &events))
            .build()
            .unwrap();

        let error = stack.set("k", 1, Duration::from_secs(60)).await.unwrap_err();
        assert_eq!(error, Error::extension("on_update", "listener rejected write"));

        // The hook fans out to every registered listener; the failure is
        // reported to the caller only after all of them ran.
        assert!(events.lock().contains(&"late:update:AddOrUpdateEntry".to_string()));
    });
}

/// Serves a fallback entry when the wrapped refresh fails.
struct Fallback {
    clock: Clock,
}

#[async_trait]
impl CacheExtension<i32> for Fallback {
    async fn with_refresh(&self, _key: &str, next: RefreshNext<i32>, settings: &CacheSettings) -> Result<CacheEntry<i32>, Error> {
        match next.run().await {
            Ok(entry) => Ok(entry),
            Err(_) => Ok(CacheEntry::new(0, self.clock.instant() + settings.time_to_live())),
        }
    }
}

#[test]
fn a_wrapper_can_absorb_refresh_failures() {
    block_on(async {
        let clock = Clock::frozen();
        let stack = CacheStack::builder(clock.clone())
            .layer(MemoryLayer::new(clock.clone()))
            .extension(Fallback { clock: clock.clone() })
            .build()
            .unwrap();
        let settings = CacheSettings::new(Duration::from_secs(60));

        let value = stack
            .get_or_set("k", |_| async { Err("upstream down".into()) }, &settings)
            .await
            .unwrap();

        // The caller sees the fallback value, but nothing was cached: the
        // factory failed before the write-through.
        assert_eq!(value, 0);
        assert!(stack.get("k").await.unwrap().is_none());
    });
}

#[test]
fn zero_extensions_degenerate_to_plain_refresh() {
    block_on(async {
        let clock = Clock::frozen();
        let stack = CacheStack::builder(clock.clone())
            .layer(MemoryLayer::new(clock.clone()))
            .build()
            .unwrap();
        let settings = CacheSettings::new(Duration::from_secs(60));

        let value = stack.get_or_set("k", |_| async { Ok(11) }, &settings).await.unwrap();
        assert_eq!(value, 11);
        assert_eq!(*stack.get("k").await.unwrap().unwrap().value(), 11);
    });
}
