// Transaction port for atomic assignment lifecycle changes

use crate::domain::{
    Assignment, AssignmentId, AssignmentStatus, CommittedTimeBlock, Contractor, ContractorId,
    Job, JobId, JobStatus,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Transaction trait for atomic multi-step operations
///
/// Dropping a transaction without calling `commit` rolls it back.
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Entry point for transactional assignment writes
#[async_trait]
pub trait TransactionalAssignmentStore: Send + Sync {
    /// Begin a new transaction
    async fn begin_transaction(&self) -> Result<Box<dyn AssignmentTransaction>>;
}

/// Reads and compare-and-swap writes within one transaction
#[async_trait]
pub trait AssignmentTransaction: Transaction {
    async fn find_job(&mut self, id: &JobId) -> Result<Option<Job>>;

    async fn find_contractor(&mut self, id: &ContractorId) -> Result<Option<Contractor>>;

    async fn find_assignment(&mut self, id: &AssignmentId) -> Result<Option<Assignment>>;

    /// The single non-terminal assignment of a job, if any
    async fn find_active_assignment_for_job(&mut self, job_id: &JobId)
        -> Result<Option<Assignment>>;

    /// Committed blocks of one contractor intersecting `[from, to)`
    async fn committed_blocks(
        &mut self,
        contractor_id: &ContractorId,
        from: NaiveDateTime,
        to: NaiveDateTime,
        travel_buffer_minutes: i64,
    ) -> Result<Vec<CommittedTimeBlock>>;

    /// Insert a `Pending` assignment only if, at write time, the contractor has
    /// no non-terminal block overlapping `block` and the job has no active
    /// assignment. Returns `false` when the guard rejected the insert.
    async fn insert_assignment_guarded(
        &mut self,
        assignment: &Assignment,
        block: &CommittedTimeBlock,
        travel_buffer_minutes: i64,
    ) -> Result<bool>;

    /// Persist `assignment` only if its stored status still equals `expected`.
    /// Returns `false` when another writer got there first.
    async fn update_assignment(
        &mut self,
        assignment: &Assignment,
        expected: AssignmentStatus,
    ) -> Result<bool>;

    /// Compare-and-swap on the job's denormalized status and contractor pointer
    async fn update_job_status(
        &mut self,
        job_id: &JobId,
        expected: JobStatus,
        new_status: JobStatus,
        assigned_contractor_id: Option<&ContractorId>,
    ) -> Result<bool>;
}
