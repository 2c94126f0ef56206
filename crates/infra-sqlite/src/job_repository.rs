// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use crate::rows::{wall_clock_millis, JobRow, JOB_COLUMNS};
use async_trait::async_trait;
use fieldops_core::domain::{Job, JobId, JobStatus};
use fieldops_core::error::Result;
use fieldops_core::port::JobRepository;
use sqlx::SqlitePool;

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        job.validate()?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, customer_id, trade, latitude, longitude,
                desired_at, estimated_duration_minutes, description,
                status, assigned_contractor_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.customer_id)
        .bind(job.trade.as_str())
        .bind(job.location.latitude)
        .bind(job.location.longitude)
        .bind(wall_clock_millis(job.desired_at))
        .bind(job.estimated_duration_minutes)
        .bind(&job.description)
        .bind(job.status.as_str())
        .bind(&job.assigned_contractor_id)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use chrono::NaiveDate;
    use fieldops_core::domain::{Coordinate, TradeType};
    use fieldops_core::error::AppError;

    async fn repo() -> SqliteJobRepository {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobRepository::new(pool)
    }

    fn job(id: &str) -> Job {
        Job::new(
            id,
            1_700_000_000_000,
            "cust-7",
            TradeType::new("roofing"),
            Coordinate::new(34.05, -118.25),
            NaiveDate::from_ymd_opt(2024, 11, 5)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            120,
            "Replace shingles",
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = repo().await;
        let j = job("job-1");
        repo.insert(&j).await.unwrap();

        let found = repo.find_by_id(&j.id).await.unwrap().unwrap();
        assert_eq!(found.desired_at, j.desired_at);
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(found.trade, TradeType::new("roofing"));
        assert_eq!(found.location, j.location);
        assert_eq!(found.assigned_contractor_id, None);
        assert_eq!(found.created_at, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let repo = repo().await;
        repo.insert(&job("job-1")).await.unwrap();
        repo.insert(&job("job-2")).await.unwrap();

        assert_eq!(repo.count_by_status(JobStatus::Pending).await.unwrap(), 2);
        assert_eq!(repo.count_by_status(JobStatus::Assigned).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_job_is_rejected_before_write() {
        let repo = repo().await;
        let mut bad = job("job-1");
        bad.estimated_duration_minutes = 0;

        let err = repo.insert(&bad).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(repo.find_by_id(&bad.id).await.unwrap().is_none());
    }
}
