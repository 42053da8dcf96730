//! Integration tests for the breaker registry
//!
//! Exercises concurrent get-or-create, sink inheritance, removal semantics
//! (including health-monitor cleanup), and bulk reset across handles.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fusebox::{
    BreakerConfig, BreakerError, BreakerRegistry, CircuitState, EventSink, MemorySink,
};
use tokio::time::sleep;

#[tokio::test]
async fn concurrent_lookups_yield_one_instance_per_name() {
    let registry = Arc::new(BreakerRegistry::new());

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry
                    .get_or_create("shared-dep", BreakerConfig::default())
                    .unwrap()
            })
        })
        .collect();

    let breakers: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(registry.len(), 1);
    let first = &breakers[0];
    for other in &breakers[1..] {
        assert!(first.ptr_eq(other));
    }
}

#[tokio::test]
async fn distinct_names_get_independent_breakers() {
    let registry = BreakerRegistry::new();
    let config = BreakerConfig::default()
        .with_failure_threshold(1)
        .with_failure_rate_threshold(1.0)
        .with_auto_recovery(false);

    let mail = registry.get_or_create("mail", config.clone()).unwrap();
    let db = registry.get_or_create("db", config).unwrap();

    let _ = mail
        .execute(|| async { Err::<(), _>(BreakerError::operation("bounce")) })
        .await;

    assert!(mail.is_open());
    assert!(db.is_closed());
}

#[tokio::test]
async fn registry_sinks_are_inherited_by_created_breakers() {
    let sink = Arc::new(MemorySink::new());
    let registry =
        BreakerRegistry::new().with_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>);

    let config = BreakerConfig::default()
        .with_failure_threshold(1)
        .with_failure_rate_threshold(1.0)
        .with_auto_recovery(false);
    let breaker = registry.get_or_create("mail", config).unwrap();

    let _ = breaker
        .execute(|| async { Err::<(), _>(BreakerError::operation("bounce")) })
        .await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].breaker_name, "mail");
    assert_eq!(records[0].previous, CircuitState::Closed);
    assert_eq!(records[0].next, CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn remove_stops_the_health_monitor() {
    let registry = BreakerRegistry::new();
    let config = BreakerConfig::default()
        .with_failure_threshold(1)
        .with_failure_rate_threshold(1.0)
        .with_reset_timeout(Duration::from_secs(60))
        .with_health_check_interval(Duration::from_millis(50))
        .with_auto_recovery(true);
    let breaker = registry.get_or_create("flaky", config).unwrap();

    let probes = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&probes);
    breaker.set_health_check(move || {
        let probes = Arc::clone(&handle);
        async move {
            probes.fetch_add(1, Ordering::SeqCst);
            false
        }
    });

    let _ = breaker
        .execute(|| async { Err::<(), _>(BreakerError::operation("down")) })
        .await;
    assert!(breaker.is_open());

    // One probe fires, then the breaker is removed.
    sleep(Duration::from_millis(60)).await;
    assert_eq!(probes.load(Ordering::SeqCst), 1);

    registry.remove("flaky").unwrap();

    // No probes after removal: the timer did not outlive the entry.
    sleep(Duration::from_millis(500)).await;
    assert_eq!(probes.load(Ordering::SeqCst), 1);
    assert!(registry.get("flaky").is_none());
}

#[tokio::test]
async fn reset_all_is_visible_through_existing_handles() {
    let registry = Arc::new(BreakerRegistry::new());
    let config = BreakerConfig::default()
        .with_failure_threshold(1)
        .with_failure_rate_threshold(1.0)
        .with_auto_recovery(false);

    let handles: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| registry.get_or_create(name, config.clone()).unwrap())
        .collect();

    for breaker in &handles {
        let _ = breaker
            .execute(|| async { Err::<(), _>(BreakerError::operation("boom")) })
            .await;
        assert!(breaker.is_open());
    }

    registry.reset_all();

    for breaker in &handles {
        assert!(breaker.is_closed());
        let metrics = breaker.metrics();
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.state_changes, 0);
        assert_eq!(metrics.recent_failures, 0);
    }
    assert!(
        registry
            .all_metrics()
            .iter()
            .all(|m| m.state == CircuitState::Closed)
    );
}

#[tokio::test]
async fn names_and_metrics_cover_all_entries() {
    let registry = BreakerRegistry::new()
        .with_breakers([
            ("mail", BreakerConfig::default()),
            ("db", BreakerConfig::default()),
        ])
        .unwrap();

    let mut names = registry.names();
    names.sort();
    assert_eq!(names, vec!["db".to_string(), "mail".to_string()]);

    let metrics = registry.all_metrics();
    assert_eq!(metrics.len(), 2);
    assert!(metrics.iter().all(|m| m.total_requests == 0));
}
