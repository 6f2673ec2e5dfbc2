use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GeofenceError {
    #[error("{axis} bounds are inverted: min {min} > max {max}")]
    InvertedBounds {
        axis: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{axis} bound {value} is not a finite number")]
    NonFinite { axis: &'static str, value: f64 },
}

/// Inclusive, axis-aligned lat/lon rectangle. Longitudes are not wrapped, so
/// the area must not straddle the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geofence {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl Geofence {
    /// Trondheim harbour, the deployed operating area. Every signal outside it
    /// is dropped, and every signal inside it is stored.
    pub const TRONDHEIM_HARBOUR: Geofence = Geofence {
        min_lat: 63.428929,
        max_lat: 63.430550,
        min_lon: 10.345295,
        max_lon: 10.444677,
    };

    pub fn new(
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    ) -> Result<Self, GeofenceError> {
        check_axis("latitude", min_lat, max_lat)?;
        check_axis("longitude", min_lon, max_lon)?;
        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.min_lat <= lat && lat <= self.max_lat && self.min_lon <= lon && lon <= self.max_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }
}

impl Default for Geofence {
    fn default() -> Self {
        Self::TRONDHEIM_HARBOUR
    }
}

fn check_axis(axis: &'static str, min: f64, max: f64) -> Result<(), GeofenceError> {
    for value in [min, max] {
        if !value.is_finite() {
            return Err(GeofenceError::NonFinite { axis, value });
        }
    }
    if min > max {
        return Err(GeofenceError::InvertedBounds { axis, min, max });
    }
    Ok(())
}
