// Distance ports: mapping collaborator, distance provider, distance cache

use crate::domain::Coordinate;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// How a distance figure was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceStatus {
    /// Answered by the mapping service (possibly via cache)
    Ok,
    /// Mapping service unavailable; great-circle estimate used instead
    FallbackUsed,
}

impl DistanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceStatus::Ok => "OK",
            DistanceStatus::FallbackUsed => "FALLBACK_USED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(DistanceStatus::Ok),
            "FALLBACK_USED" => Some(DistanceStatus::FallbackUsed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DistanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance and travel time between two coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceResult {
    pub distance_miles: f64,
    pub travel_time_minutes: f64,
    pub status: DistanceStatus,
}

impl DistanceResult {
    pub fn is_fallback(&self) -> bool {
        self.status == DistanceStatus::FallbackUsed
    }
}

/// One cell of a mapping-service answer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub distance_miles: f64,
    pub travel_time_minutes: f64,
}

/// Mapping collaborator failures (never surfaced past the distance provider)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Mapping request timed out after {0}ms")]
    Timeout(u64),

    #[error("Mapping quota exceeded: {0}")]
    Quota(String),

    #[error("Mapping HTTP error: {0}")]
    Http(String),

    #[error("Malformed mapping response: {0}")]
    MalformedResponse(String),

    #[error("Mapping service unavailable: {0}")]
    Unavailable(String),
}

/// External mapping service (outbound)
#[async_trait]
pub trait MappingClient: Send + Sync {
    /// Route estimates for every origin x destination pair.
    ///
    /// The result must have `origins.len()` rows of `destinations.len()` cells,
    /// in input order.
    async fn route_matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> std::result::Result<Vec<Vec<RouteEstimate>>, MappingError>;
}

/// Distance lookup used by the scoring engine
///
/// Only invalid coordinates produce an `Err`; dependency failures degrade to
/// `DistanceStatus::FallbackUsed`.
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    async fn get_distance(&self, origin: Coordinate, dest: Coordinate) -> Result<DistanceResult>;

    /// N origins x M destinations, preserving input order
    async fn get_distance_matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Result<Vec<Vec<DistanceResult>>>;
}

/// Time-bounded key/value store for distance results (outbound)
#[async_trait]
pub trait DistanceCache: Send + Sync {
    /// Fetch an unexpired entry
    async fn get(&self, key: &str) -> Result<Option<DistanceResult>>;

    async fn set(&self, key: &str, value: &DistanceResult, ttl: Duration) -> Result<()>;

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<u64>;
}
