// Great-circle fallback estimate

use crate::config::DistanceConfig;
use crate::domain::Coordinate;
use crate::port::{DistanceResult, DistanceStatus};

const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance in miles
pub fn haversine_miles(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

/// Road distance/time approximation used when the mapping service is down
#[derive(Debug, Clone)]
pub struct FallbackEstimator {
    road_inflation_factor: f64,
    speed_mph: f64,
}

impl FallbackEstimator {
    pub fn new(config: &DistanceConfig) -> Self {
        Self {
            road_inflation_factor: config.road_inflation_factor,
            speed_mph: config.fallback_speed_mph,
        }
    }

    pub fn estimate(&self, origin: Coordinate, dest: Coordinate) -> DistanceResult {
        let distance_miles = haversine_miles(origin, dest) * self.road_inflation_factor;
        DistanceResult {
            distance_miles,
            travel_time_minutes: distance_miles / self.speed_mph * 60.0,
            status: DistanceStatus::FallbackUsed,
        }
    }

    pub fn estimate_matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Vec<Vec<DistanceResult>> {
        origins
            .iter()
            .map(|o| destinations.iter().map(|d| self.estimate(*o, *d)).collect())
            .collect()
    }
}
