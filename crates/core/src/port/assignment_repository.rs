// Assignment Repository Port (read side)

use crate::domain::{
    Assignment, AssignmentId, AssignmentStatus, CommittedTimeBlock, ContractorId, JobId,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Read-only queries over assignments. Writes go through `AssignmentTransaction`.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Find assignment by ID
    async fn find_by_id(&self, id: &AssignmentId) -> Result<Option<Assignment>>;

    /// Full history of a job, newest first
    async fn find_by_job(&self, job_id: &JobId) -> Result<Vec<Assignment>>;

    /// Committed blocks of non-terminal assignments intersecting `[from, to)`
    ///
    /// Blocks are computed from the joined job: `desired_at` to
    /// `desired_at + duration + travel_buffer_minutes`.
    async fn committed_blocks(
        &self,
        contractor_ids: &[ContractorId],
        from: NaiveDateTime,
        to: NaiveDateTime,
        travel_buffer_minutes: i64,
    ) -> Result<Vec<(ContractorId, CommittedTimeBlock)>>;

    /// Count assignments by status
    async fn count_by_status(&self, status: AssignmentStatus) -> Result<i64>;
}
