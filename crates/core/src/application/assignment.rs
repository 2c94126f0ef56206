//! Assignment state machine
//!
//! Every mutating call runs inside one store transaction: authorization,
//! legality check, compare-and-swap on the assignment, and the mirrored job
//! status either all commit or none do. Events go out after commit.

use crate::application::availability::AvailabilityCalculator;
use crate::config::AvailabilityConfig;
use crate::domain::{
    Actor, ActorRole, Assignment, AssignmentEvent, AssignmentId, AssignmentStatus, ContractorId,
    Job, JobId, JobStatus,
};
use crate::error::{AppError, Result};
use crate::port::{
    AssignmentRepository, AssignmentTransaction, EventPublisher, IdProvider, TimeProvider,
    TransactionalAssignmentStore,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const NOT_PERMITTED: &str = "not permitted to modify this assignment";

/// Job status implied by an assignment in `status`
fn mirrored_job_status(status: AssignmentStatus) -> JobStatus {
    match status {
        AssignmentStatus::Pending | AssignmentStatus::Accepted => JobStatus::Assigned,
        AssignmentStatus::InProgress => JobStatus::InProgress,
        AssignmentStatus::Completed => JobStatus::Completed,
        AssignmentStatus::Declined | AssignmentStatus::Cancelled => JobStatus::Pending,
    }
}

fn require_dispatcher(actor: &Actor) -> Result<()> {
    if actor.is_dispatcher() {
        Ok(())
    } else {
        Err(AppError::Forbidden("dispatcher privilege required".to_string()))
    }
}

fn concurrent_loser(what: &str, id: &str) -> AppError {
    AppError::Conflict(format!("{} {} was modified concurrently", what, id))
}

/// Commit on success, roll back on failure
async fn finish<T>(tx: Box<dyn AssignmentTransaction>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

fn log_failure(
    operation: &'static str,
    subject: &str,
    contractor_id: Option<&str>,
    err: &AppError,
) {
    if err.is_unexpected() {
        error!(
            operation,
            subject,
            contractor_id = contractor_id.unwrap_or("-"),
            error = %err,
            "Assignment operation failed"
        );
    } else {
        debug!(
            operation,
            subject,
            contractor_id = contractor_id.unwrap_or("-"),
            error = %err,
            "Assignment operation rejected"
        );
    }
}

pub struct AssignmentStateMachine {
    store: Arc<dyn TransactionalAssignmentStore>,
    assignments: Arc<dyn AssignmentRepository>,
    publisher: Arc<dyn EventPublisher>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    calculator: AvailabilityCalculator,
}

impl AssignmentStateMachine {
    pub fn new(
        store: Arc<dyn TransactionalAssignmentStore>,
        assignments: Arc<dyn AssignmentRepository>,
        publisher: Arc<dyn EventPublisher>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        config: &AvailabilityConfig,
    ) -> Self {
        Self {
            store,
            assignments,
            publisher,
            time_provider,
            id_provider,
            calculator: AvailabilityCalculator::new(config),
        }
    }

    /// Dispatcher creates a `Pending` assignment for an unassigned job
    pub async fn create_assignment(
        &self,
        job_id: &JobId,
        contractor_id: &ContractorId,
        actor: &Actor,
    ) -> Result<Assignment> {
        require_dispatcher(actor)?;

        let mut tx = self.store.begin_transaction().await?;
        let result = self.create_in(tx.as_mut(), job_id, contractor_id).await;
        let assignment = finish(tx, result)
            .await
            .inspect_err(|e| {
                log_failure("create_assignment", job_id, Some(contractor_id.as_str()), e)
            })?;

        info!(
            assignment_id = %assignment.id,
            job_id = %assignment.job_id,
            contractor_id = %assignment.contractor_id,
            actor_id = %actor.id,
            "Assignment created"
        );
        self.publish(&assignment).await;
        Ok(assignment)
    }

    /// `TransitionAssignment(assignmentId, targetState, actor, reason?)`
    ///
    /// `Cancelled` is the dispatcher path; every other target is a contractor
    /// transition on their own assignment.
    pub async fn transition(
        &self,
        assignment_id: &AssignmentId,
        target: AssignmentStatus,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Assignment> {
        match target {
            AssignmentStatus::Pending => Err(AppError::Validation(
                "assignments enter PENDING only on creation".to_string(),
            )),
            AssignmentStatus::Cancelled => self.cancel(assignment_id, actor, reason).await,
            _ => {
                self.contractor_transition(assignment_id, target, actor, reason)
                    .await
            }
        }
    }

    pub async fn accept(&self, assignment_id: &AssignmentId, actor: &Actor) -> Result<Assignment> {
        self.contractor_transition(assignment_id, AssignmentStatus::Accepted, actor, None)
            .await
    }

    pub async fn decline(
        &self,
        assignment_id: &AssignmentId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Assignment> {
        self.contractor_transition(assignment_id, AssignmentStatus::Declined, actor, reason)
            .await
    }

    pub async fn start(&self, assignment_id: &AssignmentId, actor: &Actor) -> Result<Assignment> {
        self.contractor_transition(assignment_id, AssignmentStatus::InProgress, actor, None)
            .await
    }

    pub async fn complete(
        &self,
        assignment_id: &AssignmentId,
        actor: &Actor,
    ) -> Result<Assignment> {
        self.contractor_transition(assignment_id, AssignmentStatus::Completed, actor, None)
            .await
    }

    /// Dispatcher cancels a non-terminal assignment; the job returns to `Pending`
    pub async fn cancel(
        &self,
        assignment_id: &AssignmentId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Assignment> {
        require_dispatcher(actor)?;

        let mut tx = self.store.begin_transaction().await?;
        let result = self.cancel_in(tx.as_mut(), assignment_id, reason).await;
        let assignment = finish(tx, result)
            .await
            .inspect_err(|e| log_failure("cancel", assignment_id, None, e))?;

        info!(
            assignment_id = %assignment.id,
            job_id = %assignment.job_id,
            actor_id = %actor.id,
            "Assignment cancelled"
        );
        self.publish(&assignment).await;
        Ok(assignment)
    }

    /// Cancel the current assignment and hand the job to another contractor,
    /// atomically. Returns the new `Pending` assignment.
    pub async fn reassign(
        &self,
        assignment_id: &AssignmentId,
        new_contractor_id: &ContractorId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Assignment> {
        require_dispatcher(actor)?;

        let mut tx = self.store.begin_transaction().await?;
        let result = self
            .reassign_in(tx.as_mut(), assignment_id, new_contractor_id, reason)
            .await;
        let (cancelled, created) = finish(tx, result)
            .await
            .inspect_err(|e| {
                log_failure("reassign", assignment_id, Some(new_contractor_id.as_str()), e)
            })?;

        info!(
            job_id = %created.job_id,
            from_contractor = %cancelled.contractor_id,
            to_contractor = %created.contractor_id,
            assignment_id = %created.id,
            actor_id = %actor.id,
            "Job reassigned"
        );
        self.publish(&cancelled).await;
        self.publish(&created).await;
        Ok(created)
    }

    /// Close a job for good, cancelling its active assignment if there is one
    pub async fn cancel_job(
        &self,
        job_id: &JobId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Job> {
        require_dispatcher(actor)?;

        let mut tx = self.store.begin_transaction().await?;
        let result = self.cancel_job_in(tx.as_mut(), job_id, reason).await;
        let (job, cancelled) = finish(tx, result)
            .await
            .inspect_err(|e| log_failure("cancel_job", job_id, None, e))?;

        info!(job_id = %job.id, actor_id = %actor.id, "Job cancelled");
        if let Some(assignment) = cancelled {
            self.publish(&assignment).await;
        }
        Ok(job)
    }

    /// Read one assignment with the same visibility rules as transitions
    pub async fn get_assignment(
        &self,
        assignment_id: &AssignmentId,
        actor: &Actor,
    ) -> Result<Assignment> {
        let found = self.assignments.find_by_id(assignment_id).await?;
        match actor.role {
            ActorRole::Dispatcher => found
                .ok_or_else(|| AppError::NotFound(format!("assignment {}", assignment_id))),
            ActorRole::Contractor => found
                .filter(|a| actor.owns(a))
                .ok_or_else(|| AppError::Forbidden(NOT_PERMITTED.to_string())),
        }
    }

    /// All assignments ever made for a job, newest first
    pub async fn assignment_history(&self, job_id: &JobId) -> Result<Vec<Assignment>> {
        self.assignments.find_by_job(job_id).await
    }

    async fn contractor_transition(
        &self,
        assignment_id: &AssignmentId,
        target: AssignmentStatus,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Assignment> {
        if actor.role != ActorRole::Contractor {
            return Err(AppError::Forbidden(format!(
                "only the assigned contractor can move an assignment to {}",
                target
            )));
        }

        let mut tx = self.store.begin_transaction().await?;
        let result = self
            .contractor_transition_in(tx.as_mut(), assignment_id, target, actor, reason)
            .await;
        let assignment = finish(tx, result)
            .await
            .inspect_err(|e| log_failure("transition", assignment_id, Some(actor.id.as_str()), e))?;

        info!(
            assignment_id = %assignment.id,
            job_id = %assignment.job_id,
            contractor_id = %assignment.contractor_id,
            status = %assignment.status,
            "Assignment transitioned"
        );
        self.publish(&assignment).await;
        Ok(assignment)
    }

    async fn create_in(
        &self,
        tx: &mut dyn AssignmentTransaction,
        job_id: &JobId,
        contractor_id: &ContractorId,
    ) -> Result<Assignment> {
        let job = tx
            .find_job(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;
        if job.status != JobStatus::Pending {
            return Err(AppError::Conflict(format!(
                "job {} is {}, not awaiting assignment",
                job.id, job.status
            )));
        }
        if let Some(active) = tx.find_active_assignment_for_job(&job.id).await? {
            return Err(AppError::Conflict(format!(
                "job {} already has active assignment {}",
                job.id, active.id
            )));
        }

        let contractor = tx
            .find_contractor(contractor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("contractor {}", contractor_id)))?;
        if !contractor.active {
            return Err(AppError::Conflict(format!(
                "contractor {} is inactive",
                contractor.id
            )));
        }
        if contractor.trade != job.trade {
            return Err(AppError::Conflict(format!(
                "contractor {} does not work {} jobs",
                contractor.id, job.trade
            )));
        }
        if !contractor.working_hours.covers(job.desired_at) {
            return Err(AppError::Conflict(format!(
                "job {} starts outside contractor {} working hours",
                job.id, contractor.id
            )));
        }

        let block = self
            .calculator
            .candidate_block(job.desired_at, job.estimated_duration())?;
        let (from, to) = self.calculator.search_window(&block);
        let buffer = self.calculator.travel_buffer_minutes();
        let existing = tx.committed_blocks(&contractor.id, from, to, buffer).await?;
        if let Some(conflict) = self.calculator.first_conflict(&block, &existing) {
            return Err(AppError::Conflict(format!(
                "contractor {} is already committed {} - {}",
                contractor.id, conflict.start, conflict.end
            )));
        }

        let assignment = Assignment::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            job.id.clone(),
            contractor.id.clone(),
        );
        let block = block.with_owner(assignment.id.clone(), job.id.clone());

        if !tx
            .insert_assignment_guarded(&assignment, &block, buffer)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "contractor {} was booked concurrently for job {}",
                contractor.id, job.id
            )));
        }
        if !tx
            .update_job_status(
                &job.id,
                JobStatus::Pending,
                JobStatus::Assigned,
                Some(&contractor.id),
            )
            .await?
        {
            return Err(concurrent_loser("job", &job.id));
        }

        Ok(assignment)
    }

    async fn contractor_transition_in(
        &self,
        tx: &mut dyn AssignmentTransaction,
        assignment_id: &AssignmentId,
        target: AssignmentStatus,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Assignment> {
        // Missing and foreign assignments look identical to a contractor
        let mut assignment = tx
            .find_assignment(assignment_id)
            .await?
            .filter(|a| actor.owns(a))
            .ok_or_else(|| AppError::Forbidden(NOT_PERMITTED.to_string()))?;

        let previous = assignment.status;
        let now = self.time_provider.now_millis();
        match target {
            AssignmentStatus::Accepted => assignment.accept(now)?,
            AssignmentStatus::Declined => assignment.decline(now, reason)?,
            AssignmentStatus::InProgress => assignment.start(now)?,
            AssignmentStatus::Completed => assignment.complete(now)?,
            other => {
                return Err(AppError::Validation(format!(
                    "{} is not a contractor transition",
                    other
                )))
            }
        }

        self.persist(tx, &assignment, previous).await?;
        Ok(assignment)
    }

    async fn cancel_in(
        &self,
        tx: &mut dyn AssignmentTransaction,
        assignment_id: &AssignmentId,
        reason: Option<String>,
    ) -> Result<Assignment> {
        let mut assignment = tx
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("assignment {}", assignment_id)))?;

        let previous = assignment.status;
        assignment.cancel(self.time_provider.now_millis(), reason)?;
        self.persist(tx, &assignment, previous).await?;
        Ok(assignment)
    }

    async fn reassign_in(
        &self,
        tx: &mut dyn AssignmentTransaction,
        assignment_id: &AssignmentId,
        new_contractor_id: &ContractorId,
        reason: Option<String>,
    ) -> Result<(Assignment, Assignment)> {
        let current = tx
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("assignment {}", assignment_id)))?;
        if &current.contractor_id == new_contractor_id {
            return Err(AppError::Validation(format!(
                "assignment {} already belongs to contractor {}",
                current.id, new_contractor_id
            )));
        }

        let cancelled = self.cancel_in(tx, assignment_id, reason).await?;
        let created = self
            .create_in(tx, &cancelled.job_id, new_contractor_id)
            .await?;
        Ok((cancelled, created))
    }

    async fn cancel_job_in(
        &self,
        tx: &mut dyn AssignmentTransaction,
        job_id: &JobId,
        reason: Option<String>,
    ) -> Result<(Job, Option<Assignment>)> {
        let mut job = tx
            .find_job(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;
        if job.status.is_closed() {
            return Err(AppError::Conflict(format!(
                "job {} is already {}",
                job.id, job.status
            )));
        }

        let cancelled = match tx.find_active_assignment_for_job(&job.id).await? {
            Some(mut assignment) => {
                let previous = assignment.status;
                assignment.cancel(self.time_provider.now_millis(), reason)?;
                if !tx.update_assignment(&assignment, previous).await? {
                    return Err(concurrent_loser("assignment", &assignment.id));
                }
                Some(assignment)
            }
            None => None,
        };

        if !tx
            .update_job_status(&job.id, job.status, JobStatus::Cancelled, None)
            .await?
        {
            return Err(concurrent_loser("job", &job.id));
        }
        job.status = JobStatus::Cancelled;
        job.assigned_contractor_id = None;
        Ok((job, cancelled))
    }

    /// CAS the assignment, then keep the job's denormalized status in step
    async fn persist(
        &self,
        tx: &mut dyn AssignmentTransaction,
        assignment: &Assignment,
        previous: AssignmentStatus,
    ) -> Result<()> {
        if !tx.update_assignment(assignment, previous).await? {
            return Err(concurrent_loser("assignment", &assignment.id));
        }

        let expected = mirrored_job_status(previous);
        let next = mirrored_job_status(assignment.status);
        if expected == next {
            return Ok(());
        }
        let pointer = (next != JobStatus::Pending).then_some(&assignment.contractor_id);
        if !tx
            .update_job_status(&assignment.job_id, expected, next, pointer)
            .await?
        {
            return Err(concurrent_loser("job", &assignment.job_id));
        }
        Ok(())
    }

    async fn publish(&self, assignment: &Assignment) {
        let event = AssignmentEvent::from_assignment(assignment, self.time_provider.now_millis());
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(
                event = %event.kind,
                assignment_id = %event.assignment_id,
                job_id = %event.job_id,
                contractor_id = %event.contractor_id,
                error = %e,
                "Event delivery failed"
            );
        }
    }
}
