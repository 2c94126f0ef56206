// Job (work order) Domain Model

use crate::domain::contractor::{ContractorId, TradeType};
use crate::domain::error::{DomainError, Result};
use crate::domain::geo::Coordinate;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Owning customer reference
pub type CustomerId = String;

/// Job lifecycle status
///
/// Mirrors the active assignment. Only the assignment state machine writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Assigned,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Assigned => "ASSIGNED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "ASSIGNED" => Some(JobStatus::Assigned),
            "IN_PROGRESS" => Some(JobStatus::InProgress),
            "COMPLETED" => Some(JobStatus::Completed),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub customer_id: CustomerId,
    pub trade: TradeType,
    pub location: Coordinate,

    /// Wall-clock start in the service area's local time
    pub desired_at: NaiveDateTime,
    pub estimated_duration_minutes: i64,
    pub description: String,

    pub status: JobStatus,

    /// Denormalized pointer, kept consistent with the active assignment
    pub assigned_contractor_id: Option<ContractorId>,

    pub created_at: i64, // epoch ms
}

impl Job {
    /// Create a new Job in `Pending`
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        customer_id: impl Into<String>,
        trade: TradeType,
        location: Coordinate,
        desired_at: NaiveDateTime,
        estimated_duration_minutes: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            trade,
            location,
            desired_at,
            estimated_duration_minutes,
            description: description.into(),
            status: JobStatus::Pending,
            assigned_contractor_id: None,
            created_at,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.location.validate()?;
        if self.estimated_duration_minutes <= 0 {
            return Err(DomainError::InvalidTimeWindow(format!(
                "estimated duration must be positive, got {} minutes",
                self.estimated_duration_minutes
            )));
        }
        Ok(())
    }

    pub fn estimated_duration(&self) -> Duration {
        Duration::minutes(self.estimated_duration_minutes)
    }
}
