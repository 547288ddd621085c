//! Store identity and the raw directory record it is built from

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::Coordinate;

/// Stable store identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for StoreId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// A retail location. Immutable once built; stores without a coordinate
/// are never monitored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

impl Store {
    pub fn new(
        id: impl Into<StoreId>,
        name: impl Into<String>,
        address: impl Into<String>,
        coordinate: Option<Coordinate>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            coordinate,
        }
    }

    pub const fn is_monitorable(&self) -> bool {
        self.coordinate.is_some()
    }
}

/// Store record as served by the directory dataset.
///
/// Coordinates arrive as text and may be missing when geocoding failed.
/// Field aliases accept the public dataset's original column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    #[serde(alias = "번호")]
    pub number: u64,
    #[serde(alias = "상호")]
    pub name: String,
    #[serde(default, alias = "도로명주소")]
    pub road_address: String,
    #[serde(default, alias = "지번주소")]
    pub address: String,
    #[serde(default, alias = "위도")]
    pub latitude: Option<String>,
    #[serde(default, alias = "경도")]
    pub longitude: Option<String>,
}

impl StoreRecord {
    /// Convert into a [`Store`], dropping coordinates that fail validation.
    pub fn into_store(self) -> Store {
        let coordinate = match (&self.latitude, &self.longitude) {
            (Some(lat), Some(lon)) => match Coordinate::parse(lat, lon) {
                Ok(c) => Some(c),
                Err(e) => {
                    debug!(store = self.number, error = %e, "Store coordinate rejected, store is unmonitorable");
                    None
                }
            },
            _ => None,
        };

        let address = if self.road_address.is_empty() {
            self.address
        } else {
            self.road_address
        };

        Store {
            id: StoreId::from(self.number),
            name: self.name,
            address,
            coordinate,
        }
    }
}

/// Stores whose great-circle distance from `location` is within `radius_meters`.
pub fn stores_within<'a>(
    stores: &'a [Store],
    location: &Coordinate,
    radius_meters: f64,
) -> Vec<&'a Store> {
    stores
        .iter()
        .filter(|s| {
            s.coordinate
                .is_some_and(|c| c.distance_to(location) <= radius_meters)
        })
        .collect()
}
