// Mapping-service distance provider with retry and great-circle fallback

use super::fallback::FallbackEstimator;
use super::retry::RetryStrategy;
use super::validate_all;
use crate::config::DistanceConfig;
use crate::domain::Coordinate;
use crate::error::Result;
use crate::port::{
    DistanceProvider, DistanceResult, DistanceStatus, MappingClient, MappingError, RouteEstimate,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Stand-in client for deployments without a mapping service
pub struct UnconfiguredMapping;

#[async_trait]
impl MappingClient for UnconfiguredMapping {
    async fn route_matrix(
        &self,
        _origins: &[Coordinate],
        _destinations: &[Coordinate],
    ) -> std::result::Result<Vec<Vec<RouteEstimate>>, MappingError> {
        Err(MappingError::Unavailable(
            "no mapping service configured".to_string(),
        ))
    }
}

pub struct MappingDistanceProvider {
    client: Arc<dyn MappingClient>,
    retry: Arc<dyn RetryStrategy>,
    fallback: FallbackEstimator,
    request_timeout: Duration,
}

impl MappingDistanceProvider {
    pub fn new(
        client: Arc<dyn MappingClient>,
        retry: Arc<dyn RetryStrategy>,
        config: &DistanceConfig,
    ) -> Self {
        Self {
            client,
            retry,
            fallback: FallbackEstimator::new(config),
            request_timeout: config.request_timeout(),
        }
    }

    /// One mapping call with timeout and shape checks
    async fn attempt(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> std::result::Result<Vec<Vec<RouteEstimate>>, MappingError> {
        let rows = tokio::time::timeout(
            self.request_timeout,
            self.client.route_matrix(origins, destinations),
        )
        .await
        .map_err(|_| MappingError::Timeout(self.request_timeout.as_millis() as u64))??;

        if rows.len() != origins.len() || rows.iter().any(|row| row.len() != destinations.len()) {
            return Err(MappingError::MalformedResponse(format!(
                "expected {}x{} matrix",
                origins.len(),
                destinations.len()
            )));
        }

        let invalid = rows.iter().flatten().any(|cell| {
            !cell.distance_miles.is_finite()
                || !cell.travel_time_minutes.is_finite()
                || cell.distance_miles < 0.0
                || cell.travel_time_minutes < 0.0
        });
        if invalid {
            return Err(MappingError::MalformedResponse(
                "negative or non-finite route estimate".to_string(),
            ));
        }

        Ok(rows)
    }

    /// Retry loop; `None` means every attempt failed and the caller falls back
    async fn lookup(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Option<Vec<Vec<RouteEstimate>>> {
        let max_attempts = self.retry.max_attempts();
        if max_attempts == 0 {
            debug!("Mapping lookups disabled, using great-circle fallback");
            return None;
        }
        let mut last_error: Option<MappingError> = None;

        for attempt in 1..=max_attempts {
            match self.attempt(origins, destinations).await {
                Ok(rows) => {
                    debug!(
                        attempt = attempt,
                        origins = origins.len(),
                        destinations = destinations.len(),
                        "Mapping lookup succeeded"
                    );
                    return Some(rows);
                }
                Err(e) => {
                    let retryable = self.retry.is_retryable(&e);
                    warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        retryable = retryable,
                        error = %e,
                        "Mapping lookup failed"
                    );
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                    }
                }
            }
        }

        warn!(
            origins = origins.len(),
            destinations = destinations.len(),
            last_error = ?last_error,
            "Mapping service unavailable, using great-circle fallback"
        );
        None
    }
}

#[async_trait]
impl DistanceProvider for MappingDistanceProvider {
    async fn get_distance(&self, origin: Coordinate, dest: Coordinate) -> Result<DistanceResult> {
        let matrix = self.get_distance_matrix(&[origin], &[dest]).await?;
        Ok(matrix
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_else(|| self.fallback.estimate(origin, dest)))
    }

    async fn get_distance_matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Result<Vec<Vec<DistanceResult>>> {
        validate_all(origins, destinations)?;

        if origins.is_empty() || destinations.is_empty() {
            return Ok(vec![Vec::new(); origins.len()]);
        }

        match self.lookup(origins, destinations).await {
            Some(rows) => Ok(rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| DistanceResult {
                            distance_miles: cell.distance_miles,
                            travel_time_minutes: cell.travel_time_minutes,
                            status: DistanceStatus::Ok,
                        })
                        .collect()
                })
                .collect()),
            None => Ok(self.fallback.estimate_matrix(origins, destinations)),
        }
    }
}
