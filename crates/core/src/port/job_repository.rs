// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job persistence
///
/// Job status is written only through `AssignmentTransaction`.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;
}
