// SQLite ContractorRepository Implementation

use crate::error::map_sqlx_error;
use crate::rows::{seconds_of_day, ContractorRow, CONTRACTOR_COLUMNS};
use async_trait::async_trait;
use fieldops_core::domain::{Contractor, ContractorId, TradeType};
use fieldops_core::error::Result;
use fieldops_core::port::ContractorRepository;
use sqlx::SqlitePool;

pub struct SqliteContractorRepository {
    pool: SqlitePool,
}

impl SqliteContractorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContractorRepository for SqliteContractorRepository {
    async fn insert(&self, contractor: &Contractor) -> Result<()> {
        contractor.validate()?;

        sqlx::query(
            r#"
            INSERT INTO contractors (
                id, name, trade, latitude, longitude,
                work_start_secs, work_end_secs, work_days,
                active, rating, completed_jobs
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&contractor.id)
        .bind(&contractor.name)
        .bind(contractor.trade.as_str())
        .bind(contractor.location.latitude)
        .bind(contractor.location.longitude)
        .bind(seconds_of_day(contractor.working_hours.start))
        .bind(seconds_of_day(contractor.working_hours.end))
        .bind(contractor.working_hours.days_mask())
        .bind(contractor.active)
        .bind(contractor.rating)
        .bind(contractor.completed_jobs)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ContractorId) -> Result<Option<Contractor>> {
        let row: Option<ContractorRow> = sqlx::query_as(&format!(
            "SELECT {} FROM contractors WHERE id = ?",
            CONTRACTOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ContractorRow::into_contractor).transpose()
    }

    async fn find_candidates(&self, trade: &TradeType) -> Result<Vec<Contractor>> {
        let rows: Vec<ContractorRow> = sqlx::query_as(&format!(
            "SELECT {} FROM contractors WHERE trade = ? ORDER BY id ASC",
            CONTRACTOR_COLUMNS
        ))
        .bind(trade.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ContractorRow::into_contractor).collect()
    }

}
