//! Capacity-bounded set of watched store regions
//!
//! Each reconciliation ranks candidate stores by distance from the user,
//! keeps the nearest `capacity` of them under watch and reports entry
//! events on the outside → inside edge only.
//!
//! ```text
//! Unmonitored → Monitored(outside) ⇄ Monitored(inside)
//!      ↑                 │                   │
//!      └──── evicted ────┴───────────────────┘
//! ```

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::config::GeofenceConfig;
use crate::types::{Coordinate, Store, StoreId};

/// A circular region currently under watch. Presence in the registry
/// means the region is active.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedRegion {
    pub store_id: StoreId,
    pub center: Coordinate,
    pub radius_meters: f64,
    /// Whether the last reconciliation found the user inside.
    pub inside: bool,
}

/// Per-store monitoring state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Unmonitored,
    Outside,
    Inside,
}

/// The user crossed into a watched store's region.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryEvent {
    pub store: Store,
    pub distance_meters: f64,
}

struct Candidate<'a> {
    store: &'a Store,
    center: Coordinate,
    distance: f64,
    inside: bool,
}

/// Geofence registry with a hard ceiling on active regions.
#[derive(Debug, Clone)]
pub struct GeofenceRegistry {
    capacity: usize,
    radius_meters: f64,
    regions: HashMap<StoreId, WatchedRegion>,
}

impl GeofenceRegistry {
    pub fn new(capacity: usize, radius_meters: f64) -> Self {
        Self {
            capacity,
            radius_meters,
            regions: HashMap::with_capacity(capacity),
        }
    }

    pub fn from_config(config: &GeofenceConfig) -> Self {
        Self::new(config.capacity, config.trigger_radius_meters)
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Re-select watched stores for `location` and report entry events.
    ///
    /// Without a location this is a no-op: regions and inside flags are kept.
    pub fn reconcile(
        &mut self,
        candidates: &[Store],
        location: Option<&Coordinate>,
    ) -> Vec<EntryEvent> {
        let Some(location) = location else {
            debug!("Reconcile skipped: no current location");
            return Vec::new();
        };

        let ranked = self.rank(candidates, location);
        let selected: HashSet<&StoreId> = ranked.iter().map(|c| &c.store.id).collect();

        // Release capacity first so the active count never exceeds the ceiling
        self.regions.retain(|id, region| {
            let keep = selected.contains(id);
            if !keep {
                debug!(store_id = %id, was_inside = region.inside, "Region deactivated");
            }
            keep
        });

        let mut events = Vec::new();
        for candidate in ranked {
            let radius = self.radius_meters;
            let region = self
                .regions
                .entry(candidate.store.id.clone())
                .or_insert_with(|| {
                    debug!(store_id = %candidate.store.id, distance_m = candidate.distance, "Region activated");
                    WatchedRegion {
                        store_id: candidate.store.id.clone(),
                        center: candidate.center,
                        radius_meters: radius,
                        inside: false,
                    }
                });
            region.center = candidate.center;
            region.radius_meters = radius;

            match (region.inside, candidate.inside) {
                (false, true) => {
                    info!(
                        store_id = %candidate.store.id,
                        store = %candidate.store.name,
                        distance_m = candidate.distance.round(),
                        "Entered store region"
                    );
                    events.push(EntryEvent {
                        store: candidate.store.clone(),
                        distance_meters: candidate.distance,
                    });
                }
                (true, false) => {
                    debug!(store_id = %candidate.store.id, distance_m = candidate.distance.round(), "Exited store region");
                }
                _ => {}
            }
            region.inside = candidate.inside;
        }

        events
    }

    /// Rank monitorable candidates: inside the radius first, then nearest,
    /// ties broken by id. Truncated to capacity.
    fn rank<'a>(&self, candidates: &'a [Store], location: &Coordinate) -> Vec<Candidate<'a>> {
        let mut seen: HashSet<&StoreId> = HashSet::new();
        let mut ranked: Vec<Candidate<'a>> = candidates
            .iter()
            .filter_map(|store| store.coordinate.map(|center| (store, center)))
            .filter(|(store, _)| seen.insert(&store.id))
            .map(|(store, center)| {
                let distance = center.distance_to(location);
                Candidate {
                    store,
                    center,
                    distance,
                    inside: distance <= self.radius_meters,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.inside
                .cmp(&a.inside)
                .then_with(|| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal))
                .then_with(|| a.store.id.cmp(&b.store.id))
        });
        ranked.truncate(self.capacity);
        ranked
    }

    /// Stop monitoring everything.
    pub fn stop(&mut self) {
        if !self.regions.is_empty() {
            info!(released = self.regions.len(), "Geofence monitoring stopped");
        }
        self.regions.clear();
    }

    pub fn active_count(&self) -> usize {
        self.regions.len()
    }

    pub fn region(&self, store_id: &StoreId) -> Option<&WatchedRegion> {
        self.regions.get(store_id)
    }

    pub fn state(&self, store_id: &StoreId) -> RegionState {
        match self.regions.get(store_id) {
            None => RegionState::Unmonitored,
            Some(r) if r.inside => RegionState::Inside,
            Some(_) => RegionState::Outside,
        }
    }

    /// Ids of all watched stores, sorted.
    pub fn watched_ids(&self) -> Vec<StoreId> {
        let mut ids: Vec<StoreId> = self.regions.keys().cloned().collect();
        ids.sort();
        ids
    }
}
