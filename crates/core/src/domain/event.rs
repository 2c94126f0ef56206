// Assignment lifecycle events (handed to the notification collaborator)

use crate::domain::assignment::{Assignment, AssignmentId, AssignmentStatus};
use crate::domain::contractor::ContractorId;
use crate::domain::job::JobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentEventKind {
    AssignmentCreated,
    AssignmentAccepted,
    AssignmentDeclined,
    AssignmentStarted,
    AssignmentCompleted,
    AssignmentCancelled,
}

impl AssignmentEventKind {
    /// Event emitted when an assignment enters `status`
    pub fn for_status(status: AssignmentStatus) -> Self {
        match status {
            AssignmentStatus::Pending => AssignmentEventKind::AssignmentCreated,
            AssignmentStatus::Accepted => AssignmentEventKind::AssignmentAccepted,
            AssignmentStatus::Declined => AssignmentEventKind::AssignmentDeclined,
            AssignmentStatus::InProgress => AssignmentEventKind::AssignmentStarted,
            AssignmentStatus::Completed => AssignmentEventKind::AssignmentCompleted,
            AssignmentStatus::Cancelled => AssignmentEventKind::AssignmentCancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentEventKind::AssignmentCreated => "AssignmentCreated",
            AssignmentEventKind::AssignmentAccepted => "AssignmentAccepted",
            AssignmentEventKind::AssignmentDeclined => "AssignmentDeclined",
            AssignmentEventKind::AssignmentStarted => "AssignmentStarted",
            AssignmentEventKind::AssignmentCompleted => "AssignmentCompleted",
            AssignmentEventKind::AssignmentCancelled => "AssignmentCancelled",
        }
    }
}

impl std::fmt::Display for AssignmentEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentEvent {
    pub kind: AssignmentEventKind,
    pub assignment_id: AssignmentId,
    pub job_id: JobId,
    pub contractor_id: ContractorId,
    pub status: AssignmentStatus,
    pub reason: Option<String>,
    pub occurred_at: i64, // epoch ms
}

impl AssignmentEvent {
    /// Snapshot an assignment right after a committed transition
    pub fn from_assignment(assignment: &Assignment, occurred_at: i64) -> Self {
        Self {
            kind: AssignmentEventKind::for_status(assignment.status),
            assignment_id: assignment.id.clone(),
            job_id: assignment.job_id.clone(),
            contractor_id: assignment.contractor_id.clone(),
            status: assignment.status,
            reason: assignment.reason.clone(),
            occurred_at,
        }
    }
}
