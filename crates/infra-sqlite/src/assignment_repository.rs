// SQLite AssignmentRepository + TransactionalAssignmentStore

use crate::error::map_sqlx_error;
use crate::rows::{committed_blocks_query, AssignmentRow, BlockRow, ASSIGNMENT_COLUMNS};
use crate::transaction::SqliteAssignmentTransaction;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use fieldops_core::domain::{
    Assignment, AssignmentId, AssignmentStatus, CommittedTimeBlock, ContractorId, JobId,
};
use fieldops_core::error::Result;
use fieldops_core::port::{
    AssignmentRepository, AssignmentTransaction, TransactionalAssignmentStore,
};
use sqlx::SqlitePool;

pub struct SqliteAssignmentRepository {
    pool: SqlitePool,
}

impl SqliteAssignmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssignmentRepository for SqliteAssignmentRepository {
    async fn find_by_id(&self, id: &AssignmentId) -> Result<Option<Assignment>> {
        let row: Option<AssignmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM assignments WHERE id = ?",
            ASSIGNMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(AssignmentRow::into_assignment).transpose()
    }

    async fn find_by_job(&self, job_id: &JobId) -> Result<Vec<Assignment>> {
        let rows: Vec<AssignmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM assignments WHERE job_id = ? \
             ORDER BY assigned_at DESC, rowid DESC",
            ASSIGNMENT_COLUMNS
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(AssignmentRow::into_assignment).collect()
    }

    async fn committed_blocks(
        &self,
        contractor_ids: &[ContractorId],
        from: NaiveDateTime,
        to: NaiveDateTime,
        travel_buffer_minutes: i64,
    ) -> Result<Vec<(ContractorId, CommittedTimeBlock)>> {
        if contractor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = committed_blocks_query(from, to, travel_buffer_minutes);
        query.push(" AND a.contractor_id IN (");
        let mut separated = query.separated(", ");
        for id in contractor_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") ORDER BY a.contractor_id ASC, j.desired_at ASC");

        let rows: Vec<BlockRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(BlockRow::into_block).collect()
    }

    async fn count_by_status(&self, status: AssignmentStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assignments WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

#[async_trait]
impl TransactionalAssignmentStore for SqliteAssignmentRepository {
    async fn begin_transaction(&self) -> Result<Box<dyn AssignmentTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteAssignmentTransaction::new(tx)))
    }
}
