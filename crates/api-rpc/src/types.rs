//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results. Status values travel as
//! SCREAMING_SNAKE_CASE strings, roles as `dispatcher` / `contractor`.

use fieldops_core::domain::{
    Actor, ActorRole, Assignment, AssignmentStatus, ContractorId, Job, JobStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// dispatch.recommend.v1
#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub job_id: String,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub restrict_to: Option<Vec<ContractorId>>,
}

/// dispatch.assign.v1
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub job_id: String,
    pub contractor_id: String,
    pub actor_id: String,
    pub actor_role: ActorRole,
}

/// dispatch.transition.v1
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub assignment_id: String,
    pub target_state: AssignmentStatus,
    pub actor_id: String,
    pub actor_role: ActorRole,
    #[serde(default)]
    pub reason: Option<String>,
}

/// dispatch.reassign.v1
#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub assignment_id: String,
    pub new_contractor_id: String,
    pub actor_id: String,
    pub actor_role: ActorRole,
    #[serde(default)]
    pub reason: Option<String>,
}

/// dispatch.cancel_job.v1
#[derive(Debug, Deserialize)]
pub struct CancelJobRequest {
    pub job_id: String,
    pub actor_id: String,
    pub actor_role: ActorRole,
    #[serde(default)]
    pub reason: Option<String>,
}

/// dispatch.history.v1
#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    pub job_id: String,
}

pub fn actor(id: &str, role: ActorRole) -> Actor {
    Actor {
        id: id.to_string(),
        role,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentView {
    pub assignment_id: String,
    pub job_id: String,
    pub contractor_id: String,
    pub status: AssignmentStatus,
    pub assigned_at: i64,
    pub accepted_at: Option<i64>,
    pub declined_at: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub reason: Option<String>,
}

impl From<Assignment> for AssignmentView {
    fn from(a: Assignment) -> Self {
        Self {
            assignment_id: a.id,
            job_id: a.job_id,
            contractor_id: a.contractor_id,
            status: a.status,
            assigned_at: a.assigned_at,
            accepted_at: a.accepted_at,
            declined_at: a.declined_at,
            started_at: a.started_at,
            completed_at: a.completed_at,
            cancelled_at: a.cancelled_at,
            reason: a.reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub trade: String,
    pub desired_at: String,
    pub estimated_duration_minutes: i64,
    pub status: JobStatus,
    pub assigned_contractor_id: Option<String>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            desired_at: job.desired_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            job_id: job.id,
            trade: job.trade.as_str().to_string(),
            estimated_duration_minutes: job.estimated_duration_minutes,
            status: job.status,
            assigned_contractor_id: job.assigned_contractor_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub job_id: String,
    pub assignments: Vec<AssignmentView>,
}

/// admin.stats.v1, counts keyed by status string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub jobs: BTreeMap<String, i64>,
    pub assignments: BTreeMap<String, i64>,
    pub uptime_seconds: u64,
}
