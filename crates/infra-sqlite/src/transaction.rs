// SQLite Transaction Implementation
//
// Every write is conditional: the guarded insert re-checks overlap and the
// active-assignment rule inside the INSERT itself, updates compare the
// expected status. Lock contention surfaces as `Conflict`.

use crate::error::map_sqlx_error;
use crate::rows::{
    committed_blocks_query, wall_clock_millis, AssignmentRow, BlockRow, ContractorRow, JobRow,
    ASSIGNMENT_COLUMNS, CONTRACTOR_COLUMNS, JOB_COLUMNS, NON_TERMINAL_SQL,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use fieldops_core::domain::{
    Assignment, AssignmentId, AssignmentStatus, CommittedTimeBlock, Contractor, ContractorId, Job,
    JobId, JobStatus,
};
use fieldops_core::error::Result;
use fieldops_core::port::{AssignmentTransaction, Transaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};
use tracing::debug;

pub struct SqliteAssignmentTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
}

impl SqliteAssignmentTransaction {
    pub fn new(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteAssignmentTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl AssignmentTransaction for SqliteAssignmentTransaction {
    async fn find_job(&mut self, id: &JobId) -> Result<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn find_contractor(&mut self, id: &ContractorId) -> Result<Option<Contractor>> {
        let row: Option<ContractorRow> = sqlx::query_as(&format!(
            "SELECT {} FROM contractors WHERE id = ?",
            CONTRACTOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ContractorRow::into_contractor).transpose()
    }

    async fn find_assignment(&mut self, id: &AssignmentId) -> Result<Option<Assignment>> {
        let row: Option<AssignmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM assignments WHERE id = ?",
            ASSIGNMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(AssignmentRow::into_assignment).transpose()
    }

    async fn find_active_assignment_for_job(
        &mut self,
        job_id: &JobId,
    ) -> Result<Option<Assignment>> {
        let row: Option<AssignmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM assignments WHERE job_id = ? AND status IN {} LIMIT 1",
            ASSIGNMENT_COLUMNS, NON_TERMINAL_SQL
        ))
        .bind(job_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(AssignmentRow::into_assignment).transpose()
    }

    async fn committed_blocks(
        &mut self,
        contractor_id: &ContractorId,
        from: NaiveDateTime,
        to: NaiveDateTime,
        travel_buffer_minutes: i64,
    ) -> Result<Vec<CommittedTimeBlock>> {
        let mut query = committed_blocks_query(from, to, travel_buffer_minutes);
        query.push(" AND a.contractor_id = ");
        query.push_bind(contractor_id.clone());
        query.push(" ORDER BY j.desired_at ASC");

        let rows: Vec<BlockRow> = query
            .build_query_as()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| row.into_block().map(|(_, block)| block))
            .collect()
    }

    async fn insert_assignment_guarded(
        &mut self,
        assignment: &Assignment,
        block: &CommittedTimeBlock,
        travel_buffer_minutes: i64,
    ) -> Result<bool> {
        let sql = format!(
            r#"
            INSERT INTO assignments ({columns})
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM assignments a JOIN jobs j ON j.id = a.job_id
                WHERE a.contractor_id = ?
                  AND a.status IN {live}
                  AND j.desired_at < ?
                  AND j.desired_at + (j.estimated_duration_minutes + ?) * 60000 > ?
            )
            AND NOT EXISTS (
                SELECT 1 FROM assignments WHERE job_id = ? AND status IN {live}
            )
            "#,
            columns = ASSIGNMENT_COLUMNS,
            live = NON_TERMINAL_SQL
        );

        let result = sqlx::query(&sql)
            .bind(&assignment.id)
            .bind(&assignment.job_id)
            .bind(&assignment.contractor_id)
            .bind(assignment.status.as_str())
            .bind(assignment.assigned_at)
            .bind(assignment.accepted_at)
            .bind(assignment.declined_at)
            .bind(assignment.started_at)
            .bind(assignment.completed_at)
            .bind(assignment.cancelled_at)
            .bind(&assignment.reason)
            // overlap guard
            .bind(&assignment.contractor_id)
            .bind(wall_clock_millis(block.end))
            .bind(travel_buffer_minutes)
            .bind(wall_clock_millis(block.start))
            // one live assignment per job
            .bind(&assignment.job_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        let inserted = result.rows_affected() == 1;
        debug!(
            assignment_id = %assignment.id,
            contractor_id = %assignment.contractor_id,
            inserted,
            "Guarded assignment insert"
        );
        Ok(inserted)
    }

    async fn update_assignment(
        &mut self,
        assignment: &Assignment,
        expected: AssignmentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET status = ?, accepted_at = ?, declined_at = ?, started_at = ?,
                completed_at = ?, cancelled_at = ?, reason = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(assignment.status.as_str())
        .bind(assignment.accepted_at)
        .bind(assignment.declined_at)
        .bind(assignment.started_at)
        .bind(assignment.completed_at)
        .bind(assignment.cancelled_at)
        .bind(&assignment.reason)
        .bind(&assignment.id)
        .bind(expected.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_job_status(
        &mut self,
        job_id: &JobId,
        expected: JobStatus,
        new_status: JobStatus,
        assigned_contractor_id: Option<&ContractorId>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ?, assigned_contractor_id = ? WHERE id = ? AND status = ?",
        )
        .bind(new_status.as_str())
        .bind(assigned_contractor_id)
        .bind(job_id)
        .bind(expected.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}
