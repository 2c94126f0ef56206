//! Engine configuration
//!
//! Every tunable the engine uses (weights, TTLs, buffers, retry policy) lives
//! here and is handed to services at construction. Nothing reads ambient state.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scoring & ranking tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub availability_weight: f64,
    pub rating_weight: f64,
    pub distance_weight: f64,

    /// Rating scale maximum (stars)
    pub max_rating: f64,

    /// Normalized rating score used for contractors without reviews.
    /// Midpoint of the scale by default.
    pub neutral_rating_score: f64,

    /// Distances at or beyond this radius score 0
    pub max_service_radius_miles: f64,

    pub default_top_n: usize,
    pub recommendation_timeout_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            availability_weight: 0.4,
            rating_weight: 0.3,
            distance_weight: 0.3,
            max_rating: 5.0,
            neutral_rating_score: 0.5,
            max_service_radius_miles: 50.0,
            default_top_n: 5,
            recommendation_timeout_ms: 5_000,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("availability_weight", self.availability_weight),
            ("rating_weight", self.rating_weight),
            ("distance_weight", self.distance_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if !(self.max_rating > 0.0) {
            return Err(AppError::Config("max_rating must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.neutral_rating_score) {
            return Err(AppError::Config(
                "neutral_rating_score must be within [0, 1]".to_string(),
            ));
        }
        if !(self.max_service_radius_miles > 0.0) {
            return Err(AppError::Config(
                "max_service_radius_miles must be positive".to_string(),
            ));
        }
        if self.default_top_n == 0 {
            return Err(AppError::Config("default_top_n must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn recommendation_timeout(&self) -> Duration {
        Duration::from_millis(self.recommendation_timeout_ms)
    }
}

/// Availability tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Fixed travel buffer appended to every committed block
    pub travel_buffer_minutes: i64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            travel_buffer_minutes: 30,
        }
    }
}

impl AvailabilityConfig {
    pub fn travel_buffer(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.travel_buffer_minutes)
    }
}

/// Distance provider + cache tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Road distances are stable, so entries live for a day
    pub cache_ttl_secs: u64,

    /// Decimal places kept when rounding coordinates into cache keys
    pub coordinate_precision: usize,

    /// Great-circle to road distance multiplier used by the fallback
    pub road_inflation_factor: f64,

    /// Average speed assumed when synthesizing fallback travel time
    pub fallback_speed_mph: f64,

    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 24 * 60 * 60,
            coordinate_precision: 4,
            road_inflation_factor: 1.3,
            fallback_speed_mph: 30.0,
            max_attempts: 3,
            retry_backoff_ms: 200,
            request_timeout_ms: 2_000,
        }
    }
}

impl DistanceConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub availability: AvailabilityConfig,
    pub distance: DistanceConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        if self.availability.travel_buffer_minutes < 0 {
            return Err(AppError::Config(
                "travel_buffer_minutes cannot be negative".to_string(),
            ));
        }
        if !(self.distance.road_inflation_factor >= 1.0) {
            return Err(AppError::Config(
                "road_inflation_factor must be >= 1.0".to_string(),
            ));
        }
        if !(self.distance.fallback_speed_mph > 0.0) {
            return Err(AppError::Config(
                "fallback_speed_mph must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
