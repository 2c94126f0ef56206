// SQLite-backed distance cache
//
// Survives daemon restarts, shared by every connection in the pool.
// Expiry is checked on read; `purge_expired` reclaims the rows.

use crate::error::{corrupt, map_sqlx_error};
use async_trait::async_trait;
use fieldops_core::error::Result;
use fieldops_core::port::{DistanceCache, DistanceResult, DistanceStatus, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

pub struct SqliteDistanceCache {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteDistanceCache {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CacheRow {
    distance_miles: f64,
    travel_time_minutes: f64,
    status: String,
}

#[async_trait]
impl DistanceCache for SqliteDistanceCache {
    async fn get(&self, key: &str) -> Result<Option<DistanceResult>> {
        let now = self.time_provider.now_millis();
        let row: Option<CacheRow> = sqlx::query_as(
            r#"
            SELECT distance_miles, travel_time_minutes, status
            FROM distance_cache
            WHERE cache_key = ? AND expires_at > ?
            "#,
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|r| -> Result<DistanceResult> {
            let status = DistanceStatus::parse(&r.status)
                .ok_or_else(|| corrupt("distance_cache", key, format!("status {}", r.status)))?;
            Ok(DistanceResult {
                distance_miles: r.distance_miles,
                travel_time_minutes: r.travel_time_minutes,
                status,
            })
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: &DistanceResult, ttl: Duration) -> Result<()> {
        let expires_at = self.time_provider.now_millis() + ttl.as_millis() as i64;

        // Concurrent writers store equivalent values; last one wins
        sqlx::query(
            r#"
            INSERT INTO distance_cache
                (cache_key, distance_miles, travel_time_minutes, status, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                distance_miles = excluded.distance_miles,
                travel_time_minutes = excluded.travel_time_minutes,
                status = excluded.status,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value.distance_miles)
        .bind(value.travel_time_minutes)
        .bind(value.status.as_str())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM distance_cache WHERE expires_at <= ?")
            .bind(self.time_provider.now_millis())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
