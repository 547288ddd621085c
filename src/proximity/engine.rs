//! Proximity Engine - serializes location, store and delivery events
//!
//! The engine is an actor: it owns the registry, throttle, generator and
//! history, and is driven exclusively through an [`EngineHandle`]. Delivery
//! attempts run in spawned tasks and report back on a completion channel, so
//! throttle and history updates only ever happen inside the actor loop.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::delivery::{DeliveryError, NotificationChannel};
use super::registry::{EntryEvent, GeofenceRegistry};
use super::throttle::NotificationThrottle;
use crate::config::defaults::{CLOCK_CORRECTION_SECS, ENGINE_DRAIN_GRACE_MS};
use crate::config::{EngineConfig, EngineRuntimeConfig};
use crate::recommendation::RecommendationGenerator;
use crate::storage::{PersistenceError, RecommendationHistoryStore, StoreGroup};
use crate::types::{
    AuthorizationStatus, Coordinate, LocationSample, NotificationOutcome, NotificationRequest,
    Recommendation, Store, StoreId,
};

// ============================================================================
// Commands
// ============================================================================

/// Commands for ProximityEngine
#[derive(Debug)]
pub enum EngineCommand {
    /// New position from the location provider
    LocationUpdate(LocationSample),
    /// Fresh store directory results
    StoreSetChanged(Vec<Store>),
    /// Location permission changed
    AuthorizationChanged(AuthorizationStatus),
    /// Forget every cooldown
    ResetThrottle,
    GetStats {
        response_tx: oneshot::Sender<EngineStats>,
    },
    GetHistory {
        response_tx: oneshot::Sender<Vec<Recommendation>>,
    },
    GetHistoryByStore {
        response_tx: oneshot::Sender<Vec<StoreGroup>>,
    },
    /// Draw new numbers for a history entry, in place
    Regenerate {
        id: Uuid,
        response_tx: oneshot::Sender<Result<Recommendation, PersistenceError>>,
    },
    Delete {
        id: Uuid,
        response_tx: oneshot::Sender<Result<(), PersistenceError>>,
    },
    ClearHistory {
        response_tx: oneshot::Sender<()>,
    },
    GetWatched {
        response_tx: oneshot::Sender<Vec<StoreId>>,
    },
    GetThrottleEntry {
        store_id: StoreId,
        response_tx: oneshot::Sender<Option<DateTime<Utc>>>,
    },
}

/// Result of one delivery attempt, sent back to the actor.
#[derive(Debug)]
struct DeliveryCompletion {
    store_id: StoreId,
    recommendation: Recommendation,
    attempted_at: DateTime<Utc>,
    result: Result<(), DeliveryError>,
}

// ============================================================================
// Statistics
// ============================================================================

/// Running counters for the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Samples accepted and applied
    pub samples_processed: u64,
    /// Samples rejected as invalid or out of order
    pub samples_dropped: u64,
    /// Outside → inside transitions reported by the registry
    pub entry_events: u64,
    /// Confirmed deliveries (badge count)
    pub delivered: u64,
    pub failed: u64,
    pub throttled: u64,
    /// History writes that failed; in-memory state was kept
    pub persistence_failures: u64,
    pub active_regions: usize,
    pub pending_deliveries: usize,
    pub history_len: usize,
    pub authorization: AuthorizationStatus,
}

// ============================================================================
// Actor Handle
// ============================================================================

/// Handle to interact with ProximityEngine
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    outcome_tx: broadcast::Sender<NotificationOutcome>,
}

impl EngineHandle {
    /// Feed a location sample
    pub async fn location_update(&self, sample: LocationSample) -> Result<()> {
        self.send(EngineCommand::LocationUpdate(sample)).await
    }

    /// Replace the candidate store set and re-reconcile at the last position
    pub async fn store_set_changed(&self, stores: Vec<Store>) -> Result<()> {
        self.send(EngineCommand::StoreSetChanged(stores)).await
    }

    pub async fn authorization_changed(&self, status: AuthorizationStatus) -> Result<()> {
        self.send(EngineCommand::AuthorizationChanged(status)).await
    }

    pub async fn reset_throttle(&self) -> Result<()> {
        self.send(EngineCommand::ResetThrottle).await
    }

    /// Receive every outcome published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationOutcome> {
        self.outcome_tx.subscribe()
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        self.request(|response_tx| EngineCommand::GetStats { response_tx })
            .await
    }

    /// History, newest first
    pub async fn history(&self) -> Result<Vec<Recommendation>> {
        self.request(|response_tx| EngineCommand::GetHistory { response_tx })
            .await
    }

    /// History grouped by store name
    pub async fn history_by_store(&self) -> Result<Vec<StoreGroup>> {
        self.request(|response_tx| EngineCommand::GetHistoryByStore { response_tx })
            .await
    }

    /// New numbers for the entry `id`; fails with `PersistenceError::NotFound` for unknown ids
    pub async fn regenerate(&self, id: Uuid) -> Result<Recommendation> {
        Ok(self
            .request(|response_tx| EngineCommand::Regenerate { id, response_tx })
            .await??)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        Ok(self
            .request(|response_tx| EngineCommand::Delete { id, response_tx })
            .await??)
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.request(|response_tx| EngineCommand::ClearHistory { response_tx })
            .await
    }

    /// Ids of the stores currently under watch, sorted
    pub async fn watched_stores(&self) -> Result<Vec<StoreId>> {
        self.request(|response_tx| EngineCommand::GetWatched { response_tx })
            .await
    }

    /// Last confirmed notification time for `store_id`
    pub async fn throttle_entry(&self, store_id: StoreId) -> Result<Option<DateTime<Utc>>> {
        self.request(|response_tx| EngineCommand::GetThrottleEntry {
            store_id,
            response_tx,
        })
        .await
    }

    async fn send(&self, cmd: EngineCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .context("Proximity engine channel closed")
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(make(response_tx)).await?;
        response_rx.await.context("Response channel closed")
    }
}

// ============================================================================
// Engine Parts
// ============================================================================

/// Components the engine takes ownership of.
pub struct EngineParts {
    pub registry: GeofenceRegistry,
    pub throttle: NotificationThrottle,
    pub generator: RecommendationGenerator,
    pub history: RecommendationHistoryStore,
    pub channel: Arc<dyn NotificationChannel>,
    pub delivery_timeout: Duration,
}

impl EngineParts {
    /// Build registry, throttle and generator from `config`.
    pub fn from_config(
        config: &EngineConfig,
        history: RecommendationHistoryStore,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            registry: GeofenceRegistry::from_config(&config.geofence),
            throttle: NotificationThrottle::new(config.notification.min_interval()),
            generator: RecommendationGenerator::from_config(&config.recommendation),
            history,
            channel,
            delivery_timeout: config.notification.delivery_timeout(),
        }
    }
}

// ============================================================================
// Proximity Engine
// ============================================================================

/// Proximity Engine - owns all proximity state and processes commands one at a time
pub struct ProximityEngine {
    registry: GeofenceRegistry,
    throttle: NotificationThrottle,
    generator: RecommendationGenerator,
    history: RecommendationHistoryStore,
    channel: Arc<dyn NotificationChannel>,
    delivery_timeout: Duration,
    /// Command receiver
    rx: mpsc::Receiver<EngineCommand>,
    completion_tx: mpsc::UnboundedSender<DeliveryCompletion>,
    completion_rx: mpsc::UnboundedReceiver<DeliveryCompletion>,
    outcome_tx: broadcast::Sender<NotificationOutcome>,
    stores: Vec<Store>,
    location: Option<Coordinate>,
    /// Timestamp of the newest accepted sample
    clock: Option<DateTime<Utc>>,
    authorization: AuthorizationStatus,
    /// Set once a backwards sample has been reported, cleared when the clock advances
    clock_regression_warned: bool,
    /// Stores with an unresolved delivery attempt
    in_flight: HashSet<StoreId>,
    stats: EngineStats,
}

impl ProximityEngine {
    /// Create new engine and handle
    pub fn new(parts: EngineParts, runtime: &EngineRuntimeConfig) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(runtime.command_buffer.max(1));
        let (outcome_tx, _) = broadcast::channel(runtime.outcome_buffer.max(1));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let engine = Self {
            registry: parts.registry,
            throttle: parts.throttle,
            generator: parts.generator,
            history: parts.history,
            channel: parts.channel,
            delivery_timeout: parts.delivery_timeout,
            rx,
            completion_tx,
            completion_rx,
            outcome_tx: outcome_tx.clone(),
            stores: Vec::new(),
            location: None,
            clock: None,
            authorization: AuthorizationStatus::default(),
            clock_regression_warned: false,
            in_flight: HashSet::new(),
            stats: EngineStats::default(),
        };

        let handle = EngineHandle { tx, outcome_tx };

        (engine, handle)
    }

    /// Spawn the actor loop on the current runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<EngineStats> {
        tokio::spawn(self.run())
    }

    /// Run the engine loop until every handle is dropped.
    ///
    /// Returns final statistics after outstanding deliveries have resolved.
    pub async fn run(mut self) -> EngineStats {
        info!(
            capacity = self.registry.capacity(),
            radius_m = self.registry.radius_meters(),
            cooldown_s = self.throttle.min_interval().num_seconds(),
            channel = self.channel.channel_name(),
            "ProximityEngine starting"
        );

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(completion) = self.completion_rx.recv() => {
                    self.on_completion(completion);
                }
            }
        }

        self.registry.stop();
        self.drain().await;

        let stats = self.snapshot();
        info!(
            samples = stats.samples_processed,
            dropped = stats.samples_dropped,
            delivered = stats.delivered,
            failed = stats.failed,
            throttled = stats.throttled,
            "ProximityEngine stopped"
        );
        stats
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LocationUpdate(sample) => self.on_location(sample),
            EngineCommand::StoreSetChanged(stores) => self.on_store_set(stores),
            EngineCommand::AuthorizationChanged(status) => self.on_authorization(status),
            EngineCommand::ResetThrottle => {
                info!(cleared = self.throttle.len(), "Notification cooldowns reset");
                self.throttle.reset();
            }
            EngineCommand::GetStats { response_tx } => {
                let _ = response_tx.send(self.snapshot());
            }
            EngineCommand::GetHistory { response_tx } => {
                let _ = response_tx.send(self.history.all().to_vec());
            }
            EngineCommand::GetHistoryByStore { response_tx } => {
                let _ = response_tx.send(self.history.grouped_by_store());
            }
            EngineCommand::Regenerate { id, response_tx } => {
                let _ = response_tx.send(self.regenerate(id));
            }
            EngineCommand::Delete { id, response_tx } => {
                let result = self.history.delete(id);
                let _ = response_tx.send(self.absorb_persistence(result));
            }
            EngineCommand::ClearHistory { response_tx } => {
                let result = self.history.clear();
                let _ = self.absorb_persistence(result);
                info!("Recommendation history cleared");
                let _ = response_tx.send(());
            }
            EngineCommand::GetWatched { response_tx } => {
                let _ = response_tx.send(self.registry.watched_ids());
            }
            EngineCommand::GetThrottleEntry {
                store_id,
                response_tx,
            } => {
                let _ = response_tx.send(self.throttle.last_notified(&store_id));
            }
        }
    }

    fn on_location(&mut self, sample: LocationSample) {
        let coordinate = match sample.coordinate() {
            Ok(c) => c,
            Err(e) => {
                self.stats.samples_dropped += 1;
                warn!(error = %e, "Dropping invalid location sample");
                return;
            }
        };

        match self.clock {
            Some(clock) if sample.timestamp < clock => {
                let behind = clock - sample.timestamp;
                if behind <= chrono::Duration::seconds(CLOCK_CORRECTION_SECS) {
                    self.stats.samples_dropped += 1;
                    if self.clock_regression_warned {
                        debug!(sample_ts = %sample.timestamp, "Dropping out-of-order location sample");
                    } else {
                        self.clock_regression_warned = true;
                        warn!(
                            sample_ts = %sample.timestamp,
                            latest_ts = %clock,
                            "Dropping out-of-order location samples"
                        );
                    }
                    return;
                }
                // Provider clock moved backwards: take the position, keep the clock
                if !self.clock_regression_warned {
                    self.clock_regression_warned = true;
                    warn!(
                        sample_ts = %sample.timestamp,
                        latest_ts = %clock,
                        behind_secs = behind.num_seconds(),
                        "Location clock moved backwards, holding engine clock"
                    );
                }
            }
            _ => {
                self.clock_regression_warned = false;
                self.clock = Some(sample.timestamp);
            }
        }

        self.location = Some(coordinate);
        self.stats.samples_processed += 1;

        if self.authorization.allows_monitoring() {
            self.reconcile();
        } else {
            debug!("Location permission denied, sample stored without reconciling");
        }
    }

    fn on_store_set(&mut self, stores: Vec<Store>) {
        let monitorable = stores.iter().filter(|s| s.is_monitorable()).count();
        info!(
            total = stores.len(),
            monitorable,
            "Store set updated"
        );
        self.stores = stores;
        if self.authorization.allows_monitoring() {
            self.reconcile();
        }
    }

    fn on_authorization(&mut self, status: AuthorizationStatus) {
        let previous = std::mem::replace(&mut self.authorization, status);
        if previous == status {
            return;
        }
        info!(from = %previous, to = %status, "Location authorization changed");

        if !status.allows_monitoring() {
            warn!("Location permission denied, geofence monitoring suspended");
            self.registry.stop();
        } else if !previous.allows_monitoring() {
            self.reconcile();
        }
    }

    fn reconcile(&mut self) {
        let Some(now) = self.clock else {
            return;
        };
        let events = self.registry.reconcile(&self.stores, self.location.as_ref());
        for event in events {
            self.stats.entry_events += 1;
            self.on_entry(event, now);
        }
    }

    fn on_entry(&mut self, event: EntryEvent, now: DateTime<Utc>) {
        let store_id = event.store.id.clone();

        if self.in_flight.contains(&store_id) {
            debug!(store_id = %store_id, "Delivery already in flight, skipping entry");
            self.publish(NotificationOutcome::InFlight { store_id });
            return;
        }

        if let Some(remaining) = self.throttle.remaining(&store_id, now) {
            self.stats.throttled += 1;
            debug!(
                store_id = %store_id,
                retry_after_s = remaining.num_seconds(),
                "Notification throttled"
            );
            self.publish(NotificationOutcome::Throttled {
                store_id,
                retry_after_secs: remaining.num_seconds(),
            });
            return;
        }

        let recommendation = self.generator.generate(&event.store.name, now);
        if let Err(e) = recommendation.validate() {
            error!(store_id = %store_id, error = %e, "Generated recommendation is invalid, not sending");
            return;
        }

        let request =
            NotificationRequest::for_entry(&event.store, event.distance_meters, &recommendation);
        self.in_flight.insert(store_id.clone());
        debug!(
            store_id = %store_id,
            numbers = %recommendation.formatted_numbers(),
            "Submitting notification"
        );

        let channel = Arc::clone(&self.channel);
        let completion_tx = self.completion_tx.clone();
        let timeout = self.delivery_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, channel.submit(request)).await {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::TimedOut(timeout)),
            };
            let _ = completion_tx.send(DeliveryCompletion {
                store_id,
                recommendation,
                attempted_at: now,
                result,
            });
        });
    }

    fn on_completion(&mut self, completion: DeliveryCompletion) {
        let DeliveryCompletion {
            store_id,
            recommendation,
            attempted_at,
            result,
        } = completion;
        self.in_flight.remove(&store_id);

        match result {
            Ok(()) => {
                self.throttle.record_success(&store_id, attempted_at);
                let appended = self.history.append(recommendation.clone());
                let _ = self.absorb_persistence(appended);
                self.stats.delivered += 1;
                info!(
                    store_id = %store_id,
                    store = %recommendation.store_name,
                    numbers = %recommendation.formatted_numbers(),
                    "Notification delivered"
                );
                self.publish(NotificationOutcome::Delivered {
                    store_id,
                    recommendation,
                });
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!(store_id = %store_id, error = %e, "Notification delivery failed");
                self.publish(NotificationOutcome::Failed {
                    store_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn regenerate(&mut self, id: Uuid) -> Result<Recommendation, PersistenceError> {
        let existing = self
            .history
            .get(id)
            .cloned()
            .ok_or(PersistenceError::NotFound(id))?;
        let fresh = self.generator.regenerate(&existing, Utc::now());
        let replaced = self.history.replace(id, fresh.clone());
        self.absorb_persistence(replaced)?;
        info!(id = %id, numbers = %fresh.formatted_numbers(), "Recommendation regenerated");
        Ok(fresh)
    }

    /// Count storage failures and let them through as success; only
    /// `NotFound` is reported to the caller.
    fn absorb_persistence(
        &mut self,
        result: Result<(), PersistenceError>,
    ) -> Result<(), PersistenceError> {
        match result {
            Err(PersistenceError::NotFound(id)) => Err(PersistenceError::NotFound(id)),
            Err(_) => {
                self.stats.persistence_failures += 1;
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    fn publish(&self, outcome: NotificationOutcome) {
        // No subscribers is fine
        let _ = self.outcome_tx.send(outcome);
    }

    async fn drain(&mut self) {
        let grace = self
            .delivery_timeout
            .saturating_add(Duration::from_millis(ENGINE_DRAIN_GRACE_MS));
        while !self.in_flight.is_empty() {
            match tokio::time::timeout(grace, self.completion_rx.recv()).await {
                Ok(Some(completion)) => self.on_completion(completion),
                Ok(None) | Err(_) => {
                    warn!(
                        pending = self.in_flight.len(),
                        "Abandoning unresolved deliveries on shutdown"
                    );
                    break;
                }
            }
        }
    }

    fn snapshot(&self) -> EngineStats {
        EngineStats {
            active_regions: self.registry.active_count(),
            pending_deliveries: self.in_flight.len(),
            history_len: self.history.len(),
            authorization: self.authorization,
            ..self.stats.clone()
        }
    }
}
