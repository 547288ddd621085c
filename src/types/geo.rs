//! Coordinates, location samples and great-circle distance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Invalid coordinate input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    #[error("latitude {0} is not a finite value in [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is not a finite value in [-180, 180]")]
    Longitude(f64),
    #[error("unparsable coordinate component: {0:?}")]
    Unparsable(String),
}

/// A validated WGS84 position.
///
/// Can only be built through [`Coordinate::new`], so every instance holds
/// finite values inside the valid ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

#[derive(Serialize, Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GeoError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lon)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        Self { lat: c.lat, lon: c.lon }
    }
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::Latitude(lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(GeoError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Parse a coordinate from the textual form used by store directories.
    pub fn parse(lat: &str, lon: &str) -> Result<Self, GeoError> {
        let lat_v: f64 = lat
            .trim()
            .parse()
            .map_err(|_| GeoError::Unparsable(lat.to_string()))?;
        let lon_v: f64 = lon
            .trim()
            .parse()
            .map_err(|_| GeoError::Unparsable(lon.to_string()))?;
        Self::new(lat_v, lon_v)
    }

    pub const fn lat(&self) -> f64 {
        self.lat
    }

    pub const fn lon(&self) -> f64 {
        self.lon
    }

    /// Haversine great-circle distance in meters.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let d_phi = (other.lat - self.lat).to_radians();
        let d_lambda = (other.lon - self.lon).to_radians();

        let a = (d_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_METERS * c
    }
}

/// A position report from the location provider.
///
/// Raw values are kept unvalidated so that malformed samples can be
/// recognised and dropped by the engine instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub lat: f64,
    pub lon: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    pub const fn new(lat: f64, lon: f64, timestamp: DateTime<Utc>) -> Self {
        Self { lat, lon, timestamp }
    }

    /// Validated position, or an error for NaN / out-of-range samples.
    pub fn coordinate(&self) -> Result<Coordinate, GeoError> {
        Coordinate::new(self.lat, self.lon)
    }
}
