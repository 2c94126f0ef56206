// Geographic coordinate value object

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject NaN/infinite values and anything outside [-90, 90] x [-180, 180].
    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lng_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);

        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(DomainError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// Rounded textual form used to build cache keys.
    ///
    /// Two coordinates that agree to `precision` decimal places share a key.
    pub fn cache_key_part(&self, precision: usize) -> String {
        format!(
            "{:.*},{:.*}",
            precision, self.latitude, precision, self.longitude
        )
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}
