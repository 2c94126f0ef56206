// Cache decorator for any DistanceProvider

use super::validate_all;
use crate::config::DistanceConfig;
use crate::domain::Coordinate;
use crate::error::Result;
use crate::port::{DistanceCache, DistanceProvider, DistanceResult, DistanceStatus, TimeProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Memoizes successful lookups keyed by the rounded coordinate pair.
///
/// Fallback estimates are passed through but never stored, so a mapping
/// outage does not leave degraded figures behind for a full TTL.
pub struct CachedDistanceProvider {
    inner: Arc<dyn DistanceProvider>,
    cache: Arc<dyn DistanceCache>,
    ttl: Duration,
    precision: usize,
}

impl CachedDistanceProvider {
    pub fn new(
        inner: Arc<dyn DistanceProvider>,
        cache: Arc<dyn DistanceCache>,
        config: &DistanceConfig,
    ) -> Self {
        Self {
            inner,
            cache,
            ttl: config.cache_ttl(),
            precision: config.coordinate_precision,
        }
    }

    pub fn cache_key(&self, origin: Coordinate, dest: Coordinate) -> String {
        format!(
            "dist:{}->{}",
            origin.cache_key_part(self.precision),
            dest.cache_key_part(self.precision)
        )
    }

    async fn read(&self, key: &str) -> Option<DistanceResult> {
        match self.cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key = %key, error = %e, "Distance cache read failed, calling through");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: &DistanceResult) {
        if value.status != DistanceStatus::Ok {
            return;
        }
        if let Err(e) = self.cache.set(key, value, self.ttl).await {
            warn!(key = %key, error = %e, "Distance cache write failed");
        }
    }
}

#[async_trait]
impl DistanceProvider for CachedDistanceProvider {
    async fn get_distance(&self, origin: Coordinate, dest: Coordinate) -> Result<DistanceResult> {
        origin.validate()?;
        dest.validate()?;

        let key = self.cache_key(origin, dest);
        if let Some(hit) = self.read(&key).await {
            debug!(key = %key, "Distance cache hit");
            return Ok(hit);
        }

        let result = self.inner.get_distance(origin, dest).await?;
        self.write(&key, &result).await;
        Ok(result)
    }

    async fn get_distance_matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Result<Vec<Vec<DistanceResult>>> {
        validate_all(origins, destinations)?;

        let mut matrix: Vec<Vec<Option<DistanceResult>>> =
            vec![vec![None; destinations.len()]; origins.len()];
        let mut miss_origins: Vec<usize> = Vec::new();
        let mut miss_destinations: Vec<usize> = Vec::new();

        for (i, origin) in origins.iter().enumerate() {
            for (j, dest) in destinations.iter().enumerate() {
                let key = self.cache_key(*origin, *dest);
                match self.read(&key).await {
                    Some(hit) => matrix[i][j] = Some(hit),
                    None => {
                        if !miss_origins.contains(&i) {
                            miss_origins.push(i);
                        }
                        if !miss_destinations.contains(&j) {
                            miss_destinations.push(j);
                        }
                    }
                }
            }
        }

        if !miss_origins.is_empty() {
            debug!(
                hits = origins.len() * destinations.len()
                    - matrix.iter().flatten().filter(|c| c.is_none()).count(),
                miss_origins = miss_origins.len(),
                miss_destinations = miss_destinations.len(),
                "Distance cache partial miss, querying provider"
            );

            let sub_origins: Vec<Coordinate> = miss_origins.iter().map(|&i| origins[i]).collect();
            let sub_destinations: Vec<Coordinate> =
                miss_destinations.iter().map(|&j| destinations[j]).collect();
            let fetched = self
                .inner
                .get_distance_matrix(&sub_origins, &sub_destinations)
                .await?;

            for (row, &i) in fetched.iter().zip(&miss_origins) {
                for (cell, &j) in row.iter().zip(&miss_destinations) {
                    if matrix[i][j].is_none() {
                        matrix[i][j] = Some(*cell);
                        let key = self.cache_key(origins[i], destinations[j]);
                        self.write(&key, cell).await;
                    }
                }
            }
        }

        matrix
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        crate::error::AppError::Internal(
                            "distance provider returned an incomplete matrix".to_string(),
                        )
                    })
            })
            .collect()
    }
}

/// Process-local `DistanceCache` with lazy expiry
pub struct InMemoryDistanceCache {
    entries: RwLock<HashMap<String, (DistanceResult, i64)>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl InMemoryDistanceCache {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            time_provider,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DistanceCache for InMemoryDistanceCache {
    async fn get(&self, key: &str) -> Result<Option<DistanceResult>> {
        let now = self.time_provider.now_millis();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| *value))
    }

    async fn set(&self, key: &str, value: &DistanceResult, ttl: Duration) -> Result<()> {
        let expires_at = self.time_provider.now_millis() + ttl.as_millis() as i64;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (*value, expires_at));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}
