// Committed time blocks (derived from non-terminal assignments)

use crate::domain::assignment::AssignmentId;
use crate::domain::error::{DomainError, Result};
use crate::domain::job::JobId;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Occupied interval `[start, end)` for one contractor.
///
/// `end` already includes the travel buffer, so two blocks that merely touch
/// still leave a full buffer between the jobs themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedTimeBlock {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub assignment_id: Option<AssignmentId>,
    pub job_id: Option<JobId>,
}

impl CommittedTimeBlock {
    /// Build the block for a job window plus travel buffer.
    pub fn for_window(
        start: NaiveDateTime,
        duration: Duration,
        travel_buffer: Duration,
    ) -> Result<Self> {
        if duration <= Duration::zero() {
            return Err(DomainError::InvalidTimeWindow(format!(
                "duration must be positive, got {} minutes",
                duration.num_minutes()
            )));
        }
        if travel_buffer < Duration::zero() {
            return Err(DomainError::InvalidTimeWindow(
                "travel buffer cannot be negative".to_string(),
            ));
        }
        Ok(Self {
            start,
            end: start + duration + travel_buffer,
            assignment_id: None,
            job_id: None,
        })
    }

    pub fn with_owner(mut self, assignment_id: AssignmentId, job_id: JobId) -> Self {
        self.assignment_id = Some(assignment_id);
        self.job_id = Some(job_id);
        self
    }

    pub fn overlaps(&self, other: &CommittedTimeBlock) -> bool {
        self.start < other.end && other.start < self.end
    }
}
