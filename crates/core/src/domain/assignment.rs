// Assignment Domain Model and lifecycle rules

use crate::domain::contractor::ContractorId;
use crate::domain::error::{DomainError, Result};
use crate::domain::job::JobId;
use serde::{Deserialize, Serialize};

/// Assignment ID (UUID v4)
pub type AssignmentId = String;

/// Assignment State
///
/// ```text
/// Pending -> Accepted -> InProgress -> Completed
/// Pending -> Declined
/// {Pending, Accepted, InProgress} -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    Accepted,
    Declined,
    InProgress,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    pub const NON_TERMINAL: [AssignmentStatus; 3] = [
        AssignmentStatus::Pending,
        AssignmentStatus::Accepted,
        AssignmentStatus::InProgress,
    ];

    pub const ALL: [AssignmentStatus; 6] = [
        AssignmentStatus::Pending,
        AssignmentStatus::Accepted,
        AssignmentStatus::Declined,
        AssignmentStatus::InProgress,
        AssignmentStatus::Completed,
        AssignmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "PENDING",
            AssignmentStatus::Accepted => "ACCEPTED",
            AssignmentStatus::Declined => "DECLINED",
            AssignmentStatus::InProgress => "IN_PROGRESS",
            AssignmentStatus::Completed => "COMPLETED",
            AssignmentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(AssignmentStatus::Pending),
            "ACCEPTED" => Some(AssignmentStatus::Accepted),
            "DECLINED" => Some(AssignmentStatus::Declined),
            "IN_PROGRESS" => Some(AssignmentStatus::InProgress),
            "COMPLETED" => Some(AssignmentStatus::Completed),
            "CANCELLED" => Some(AssignmentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::Completed | AssignmentStatus::Declined | AssignmentStatus::Cancelled
        )
    }

    /// Legal edges of the lifecycle graph
    pub fn can_transition_to(&self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Declined)
                | (Accepted, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Accepted, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is acting on an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Dispatcher,
    Contractor,
}

/// Authenticated caller identity, as asserted by the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn dispatcher(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ActorRole::Dispatcher,
        }
    }

    pub fn contractor(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ActorRole::Contractor,
        }
    }

    pub fn is_dispatcher(&self) -> bool {
        self.role == ActorRole::Dispatcher
    }

    /// True only for the contractor that owns the assignment
    pub fn owns(&self, assignment: &Assignment) -> bool {
        self.role == ActorRole::Contractor && self.id == assignment.contractor_id
    }
}

/// Assignment Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub job_id: JobId,
    pub contractor_id: ContractorId,
    pub status: AssignmentStatus,

    // epoch ms
    pub assigned_at: i64,
    pub accepted_at: Option<i64>,
    pub declined_at: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub cancelled_at: Option<i64>,

    /// Free-text reason given on decline or cancel
    pub reason: Option<String>,
}

impl Assignment {
    /// Create a new `Pending` assignment with injected ID and timestamp
    pub fn new(
        id: impl Into<String>,
        assigned_at: i64,
        job_id: impl Into<String>,
        contractor_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            job_id: job_id.into(),
            contractor_id: contractor_id.into(),
            status: AssignmentStatus::Pending,
            assigned_at,
            accepted_at: None,
            declined_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            reason: None,
        }
    }

    fn guard(&self, next: AssignmentStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn accept(&mut self, now_millis: i64) -> Result<()> {
        self.guard(AssignmentStatus::Accepted)?;
        self.status = AssignmentStatus::Accepted;
        self.accepted_at = Some(now_millis);
        Ok(())
    }

    pub fn decline(&mut self, now_millis: i64, reason: Option<String>) -> Result<()> {
        self.guard(AssignmentStatus::Declined)?;
        self.status = AssignmentStatus::Declined;
        self.declined_at = Some(now_millis);
        self.reason = reason;
        Ok(())
    }

    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        self.guard(AssignmentStatus::InProgress)?;
        self.status = AssignmentStatus::InProgress;
        self.started_at = Some(now_millis);
        Ok(())
    }

    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        self.guard(AssignmentStatus::Completed)?;
        self.status = AssignmentStatus::Completed;
        self.completed_at = Some(now_millis);
        Ok(())
    }

    pub fn cancel(&mut self, now_millis: i64, reason: Option<String>) -> Result<()> {
        self.guard(AssignmentStatus::Cancelled)?;
        self.status = AssignmentStatus::Cancelled;
        self.cancelled_at = Some(now_millis);
        self.reason = reason;
        Ok(())
    }
}
