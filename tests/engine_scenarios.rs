//! Engine Scenario Tests
//!
//! End-to-end behaviour of the proximity engine through its public handle:
//! edge-triggered entries, cooldowns, capacity limits, delivery failures,
//! permission changes and history management.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use lotto_alert::config::EngineConfig;
use lotto_alert::proximity::{
    DeliveryError, EngineHandle, EngineParts, EngineStats, NotificationChannel, ProximityEngine,
};
use lotto_alert::storage::{InMemoryHistoryBackend, PersistenceError, RecommendationHistoryStore};
use lotto_alert::types::{
    AuthorizationStatus, Coordinate, LocationSample, NotificationOutcome, NotificationRequest,
    Store, StoreId,
};
use lotto_alert::RecommendationGenerator;

// ============================================================================
// Fixtures
// ============================================================================

const ORIGIN_LAT: f64 = 37.5;
const ORIGIN_LON: f64 = 127.0;
/// Meters per degree of latitude on the haversine sphere.
const METERS_PER_DEG: f64 = 111_195.08;

/// Records submissions; fails any request whose body mentions a listed store name.
#[derive(Default)]
struct ScriptedChannel {
    sent: Mutex<Vec<NotificationRequest>>,
    failing: Mutex<HashSet<String>>,
    hang: Mutex<bool>,
}

impl ScriptedChannel {
    fn fail_for(&self, store_name: &str) {
        self.failing.lock().unwrap().insert(store_name.to_string());
    }

    fn recover(&self, store_name: &str) {
        self.failing.lock().unwrap().remove(store_name);
    }

    fn hang(&self, hang: bool) {
        *self.hang.lock().unwrap() = hang;
    }

    fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for ScriptedChannel {
    async fn submit(&self, request: NotificationRequest) -> Result<(), DeliveryError> {
        let hang = *self.hang.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        let failing = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|name| request.body.starts_with(&format!("{name} is nearby")));
        if failing {
            return Err(DeliveryError::Rejected("permission revoked".to_string()));
        }
        self.sent.lock().unwrap().push(request);
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    handle: EngineHandle,
    outcomes: broadcast::Receiver<NotificationOutcome>,
    channel: Arc<ScriptedChannel>,
    backend: InMemoryHistoryBackend,
    task: tokio::task::JoinHandle<EngineStats>,
}

impl Harness {
    fn start() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        let channel = Arc::new(ScriptedChannel::default());
        let backend = InMemoryHistoryBackend::new();
        let history = RecommendationHistoryStore::open(backend.clone(), config.history.max_size);
        let mut parts = EngineParts::from_config(&config, history, channel.clone());
        parts.generator = RecommendationGenerator::seeded(0.7, 42);
        let (engine, handle) = ProximityEngine::new(parts, &config.engine);
        let outcomes = handle.subscribe();
        let task = engine.spawn();
        Self {
            handle,
            outcomes,
            channel,
            backend,
            task,
        }
    }

    async fn next_outcome(&mut self) -> NotificationOutcome {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.outcomes.recv())
            .await
            .expect("outcome within 5s")
            .expect("outcome channel open")
    }

    async fn at(&self, meters_south: f64, secs: i64) {
        self.handle
            .location_update(sample(meters_south, secs))
            .await
            .unwrap();
    }

    async fn finish(self) -> EngineStats {
        drop(self.handle);
        self.task.await.unwrap()
    }
}

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

/// Position `meters_south` of the origin.
fn sample(meters_south: f64, secs: i64) -> LocationSample {
    LocationSample::new(ORIGIN_LAT - meters_south / METERS_PER_DEG, ORIGIN_LON, t(secs))
}

/// Store `meters_north` of the origin.
fn store(id: &str, meters_north: f64) -> Store {
    Store::new(
        id,
        format!("Store {id}"),
        format!("{id} Lotto-ro"),
        Some(Coordinate::new(ORIGIN_LAT + meters_north / METERS_PER_DEG, ORIGIN_LON).unwrap()),
    )
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn entry_then_cooldown_then_reentry() {
    let mut h = Harness::start();
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();

    // 900 m away, radius 1000 m
    h.at(900.0, 0).await;
    let first = h.next_outcome().await;
    let NotificationOutcome::Delivered {
        store_id,
        recommendation,
    } = first
    else {
        panic!("expected delivery, got {first:?}");
    };
    assert_eq!(store_id, StoreId::from("A"));
    assert_eq!(recommendation.store_name, "Store A");

    // Still inside 10 s later: no new entry event
    h.at(900.0, 10).await;
    let stats = h.handle.stats().await.unwrap();
    assert_eq!(stats.entry_events, 1);
    assert_eq!(stats.delivered, 1);

    // Exit and come back after the cooldown
    h.at(2_000.0, 1_800).await;
    h.at(900.0, 3_601).await;
    assert!(matches!(
        h.next_outcome().await,
        NotificationOutcome::Delivered { .. }
    ));

    let stats = h.finish().await;
    assert_eq!(stats.entry_events, 2);
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.throttled, 0);
}

#[tokio::test]
async fn reentry_inside_cooldown_is_throttled() {
    let mut h = Harness::start();
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();

    h.at(500.0, 0).await;
    assert!(matches!(h.next_outcome().await, NotificationOutcome::Delivered { .. }));

    h.at(1_500.0, 60).await;
    h.at(500.0, 600).await;
    assert_eq!(
        h.next_outcome().await,
        NotificationOutcome::Throttled {
            store_id: StoreId::from("A"),
            retry_after_secs: 3_000,
        }
    );

    let stats = h.finish().await;
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.throttled, 1);
}

#[tokio::test]
async fn twenty_five_candidates_keep_nearest_twenty() {
    let h = Harness::start();
    // Stores 2 km apart so only the first is within the trigger radius
    let stores: Vec<Store> = (0..25)
        .map(|i| store(&format!("S{i:02}"), 2_000.0 * f64::from(i)))
        .collect();
    h.handle.store_set_changed(stores).await.unwrap();
    h.at(0.0, 0).await;

    let watched = h.handle.watched_stores().await.unwrap();
    assert_eq!(watched.len(), 20);
    for far in 20..25 {
        assert!(!watched.contains(&StoreId::new(format!("S{far:02}"))));
    }
    let stats = h.finish().await;
    assert_eq!(stats.entry_events, 1);
}

#[tokio::test]
async fn stores_without_coordinates_never_watched() {
    let h = Harness::start();
    let mut stores = vec![Store::new("X", "No Geo", "nowhere", None)];
    stores.push(store("A", 100.0));
    h.handle.store_set_changed(stores).await.unwrap();
    h.at(0.0, 0).await;

    assert_eq!(h.handle.watched_stores().await.unwrap(), vec![StoreId::from("A")]);
    h.finish().await;
}

#[tokio::test]
async fn failed_delivery_leaves_no_trace_and_retries() {
    let mut h = Harness::start();
    h.channel.fail_for("Store B");
    h.handle.store_set_changed(vec![store("B", 0.0)]).await.unwrap();

    h.at(300.0, 0).await;
    assert!(matches!(
        h.next_outcome().await,
        NotificationOutcome::Failed { ref store_id, .. } if *store_id == StoreId::from("B")
    ));
    assert_eq!(h.handle.throttle_entry(StoreId::from("B")).await.unwrap(), None);
    assert!(h.handle.history().await.unwrap().is_empty());
    assert!(h.backend.raw().is_none());

    // Next qualifying entry retries without waiting for a cooldown
    h.channel.recover("Store B");
    h.at(3_000.0, 30).await;
    h.at(300.0, 60).await;
    assert!(matches!(h.next_outcome().await, NotificationOutcome::Delivered { .. }));
    assert_eq!(
        h.handle.throttle_entry(StoreId::from("B")).await.unwrap(),
        Some(t(60))
    );
    assert_eq!(h.handle.history().await.unwrap().len(), 1);

    let stats = h.finish().await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.delivered, 1);
}

#[tokio::test]
async fn delivery_timeout_counts_as_failure() {
    let mut config = EngineConfig::default();
    config.notification.delivery_timeout_secs = 1;
    let mut h = Harness::with_config(config);
    h.channel.hang(true);
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();

    h.at(100.0, 0).await;
    let outcome = h.next_outcome().await;
    let NotificationOutcome::Failed { reason, .. } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(reason.contains("timed out"));

    let stats = h.handle.stats().await.unwrap();
    assert_eq!(stats.pending_deliveries, 0);
    assert_eq!(stats.history_len, 0);
    h.finish().await;
}

#[tokio::test]
async fn invalid_samples_are_dropped_without_state_change() {
    let h = Harness::start();
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();
    h.at(5_000.0, 0).await;
    let before = h.handle.watched_stores().await.unwrap();

    for (lat, lon) in [(f64::NAN, ORIGIN_LON), (91.0, ORIGIN_LON), (ORIGIN_LAT, 200.0)] {
        h.handle
            .location_update(LocationSample::new(lat, lon, t(10)))
            .await
            .unwrap();
    }

    assert_eq!(h.handle.watched_stores().await.unwrap(), before);
    let stats = h.finish().await;
    assert_eq!(stats.samples_processed, 1);
    assert_eq!(stats.samples_dropped, 3);
    assert_eq!(stats.entry_events, 0);
}

#[tokio::test]
async fn store_set_change_reconciles_at_last_position() {
    let mut h = Harness::start();
    h.at(0.0, 0).await;
    assert!(h.handle.watched_stores().await.unwrap().is_empty());

    h.handle.store_set_changed(vec![store("N", 200.0)]).await.unwrap();
    assert!(matches!(h.next_outcome().await, NotificationOutcome::Delivered { .. }));
    assert_eq!(h.handle.watched_stores().await.unwrap(), vec![StoreId::from("N")]);
    h.finish().await;
}

#[tokio::test]
async fn denied_permission_suspends_monitoring() {
    let mut h = Harness::start();
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();
    h.handle
        .authorization_changed(AuthorizationStatus::Denied)
        .await
        .unwrap();

    h.at(100.0, 0).await;
    let stats = h.handle.stats().await.unwrap();
    assert_eq!(stats.active_regions, 0);
    assert_eq!(stats.entry_events, 0);
    assert_eq!(stats.samples_processed, 1);
    assert_eq!(stats.authorization, AuthorizationStatus::Denied);

    // Granting reconciles immediately against the remembered position
    h.handle
        .authorization_changed(AuthorizationStatus::Granted)
        .await
        .unwrap();
    assert!(matches!(h.next_outcome().await, NotificationOutcome::Delivered { .. }));
    assert_eq!(h.handle.stats().await.unwrap().active_regions, 1);
    h.finish().await;
}

#[tokio::test]
async fn notification_text_names_store_and_numbers() {
    let mut h = Harness::start();
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();
    h.at(420.0, 0).await;
    let NotificationOutcome::Delivered { recommendation, .. } = h.next_outcome().await else {
        panic!("expected delivery");
    };

    let sent = h.channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "🎱 Lotto number recommendation");
    assert!(sent[0].body.starts_with("Store A is nearby! (about 420m)"));
    assert!(sent[0].body.contains("Address: A Lotto-ro"));
    assert!(sent[0]
        .body
        .ends_with(&format!("Numbers: {}", recommendation.formatted_numbers())));
    h.finish().await;
}

#[tokio::test]
async fn reset_throttle_allows_immediate_renotification() {
    let mut h = Harness::start();
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();
    h.at(100.0, 0).await;
    assert!(matches!(h.next_outcome().await, NotificationOutcome::Delivered { .. }));

    h.handle.reset_throttle().await.unwrap();
    h.at(5_000.0, 10).await;
    h.at(100.0, 20).await;
    assert!(matches!(h.next_outcome().await, NotificationOutcome::Delivered { .. }));
    h.finish().await;
}

// ============================================================================
// History management
// ============================================================================

#[tokio::test]
async fn history_is_capped_newest_first() {
    let mut config = EngineConfig::default();
    config.history.max_size = 3;
    config.notification.min_interval_secs = 1;
    let mut h = Harness::with_config(config);
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();

    let mut delivered = Vec::new();
    for i in 0..5 {
        h.at(100.0, i * 100).await;
        if let NotificationOutcome::Delivered { recommendation, .. } = h.next_outcome().await {
            delivered.push(recommendation.id);
        }
        h.at(5_000.0, i * 100 + 50).await;
    }
    assert_eq!(delivered.len(), 5);

    let ids: Vec<_> = h.handle.history().await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![delivered[4], delivered[3], delivered[2]]);
    h.finish().await;
}

#[tokio::test]
async fn regenerate_and_delete_by_id() {
    let mut h = Harness::start();
    h.handle
        .store_set_changed(vec![store("A", 0.0), store("B", 30_000.0)])
        .await
        .unwrap();
    h.at(100.0, 0).await;
    let NotificationOutcome::Delivered { recommendation: a, .. } = h.next_outcome().await else {
        panic!("expected delivery for A");
    };
    h.at(-29_900.0, 100).await;
    let NotificationOutcome::Delivered { recommendation: b, .. } = h.next_outcome().await else {
        panic!("expected delivery for B");
    };

    let fresh = h.handle.regenerate(a.id).await.unwrap();
    assert_eq!(fresh.id, a.id);
    assert_eq!(fresh.store_name, a.store_name);
    fresh.validate().unwrap();
    let history = h.handle.history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1], fresh);

    let groups = h.handle.history_by_store().await.unwrap();
    let names: Vec<_> = groups.iter().map(|g| g.store_name.as_str()).collect();
    assert_eq!(names, vec!["Store A", "Store B"]);

    h.handle.delete(b.id).await.unwrap();
    let groups = h.handle.history_by_store().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].store_name, "Store A");

    let missing = uuid::Uuid::new_v4();
    let err = h.handle.delete(missing).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<PersistenceError>(),
        Some(&PersistenceError::NotFound(missing))
    );
    assert!(h.handle.regenerate(missing).await.is_err());

    h.handle.clear_history().await.unwrap();
    assert!(h.handle.history().await.unwrap().is_empty());
    h.finish().await;
}

#[tokio::test]
async fn storage_failure_keeps_session_history() {
    let mut h = Harness::start();
    h.backend.set_fail_writes(true);
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();
    h.at(100.0, 0).await;
    assert!(matches!(h.next_outcome().await, NotificationOutcome::Delivered { .. }));

    assert_eq!(h.handle.history().await.unwrap().len(), 1);
    assert!(h.backend.raw().is_none());
    let stats = h.finish().await;
    assert_eq!(stats.persistence_failures, 1);
    assert_eq!(stats.delivered, 1);
}

#[tokio::test]
async fn handle_errors_after_engine_stops() {
    let h = Harness::start();
    let handle = h.handle.clone();
    h.task.abort();
    let _ = h.task.await;
    tokio_test::assert_err!(handle.stats().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_from_cloned_handles_fire_once() {
    let mut h = Harness::start();
    h.handle.store_set_changed(vec![store("A", 0.0)]).await.unwrap();

    let senders: Vec<_> = (0..32)
        .map(|_| {
            let handle = h.handle.clone();
            tokio::spawn(async move { handle.location_update(sample(500.0, 0)).await })
        })
        .collect();
    for sender in senders {
        tokio_test::assert_ok!(sender.await.unwrap());
    }

    assert!(matches!(h.next_outcome().await, NotificationOutcome::Delivered { .. }));
    let channel = h.channel.clone();
    let stats = h.finish().await;
    assert_eq!(stats.samples_processed, 32);
    assert_eq!(stats.entry_events, 1);
    assert_eq!(stats.delivered, 1);
    assert_eq!(channel.sent().len(), 1);
}
