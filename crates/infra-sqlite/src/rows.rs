// Row types shared by repositories and the transaction

use crate::error::corrupt;
use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike};
use fieldops_core::domain::{
    Assignment, AssignmentStatus, CommittedTimeBlock, Contractor, Coordinate, Job, JobStatus,
    TradeType, WorkingHours,
};
use fieldops_core::error::Result;
use sqlx::{QueryBuilder, Sqlite};

pub(crate) const CONTRACTOR_COLUMNS: &str = "id, name, trade, latitude, longitude, \
     work_start_secs, work_end_secs, work_days, active, rating, completed_jobs";

pub(crate) const JOB_COLUMNS: &str = "id, customer_id, trade, latitude, longitude, desired_at, \
     estimated_duration_minutes, description, status, assigned_contractor_id, created_at";

pub(crate) const ASSIGNMENT_COLUMNS: &str = "id, job_id, contractor_id, status, assigned_at, \
     accepted_at, declined_at, started_at, completed_at, cancelled_at, reason";

/// Statuses that hold a committed time block, as a SQL list
pub(crate) const NON_TERMINAL_SQL: &str = "('PENDING', 'ACCEPTED', 'IN_PROGRESS')";

/// Wall-clock time as epoch milliseconds (no zone conversion)
pub(crate) fn wall_clock_millis(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp_millis()
}

pub(crate) fn wall_clock_from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

pub(crate) fn seconds_of_day(t: NaiveTime) -> i64 {
    t.num_seconds_from_midnight() as i64
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ContractorRow {
    pub id: String,
    pub name: String,
    pub trade: String,
    pub latitude: f64,
    pub longitude: f64,
    pub work_start_secs: i64,
    pub work_end_secs: i64,
    pub work_days: i64,
    pub active: i64,
    pub rating: Option<f64>,
    pub completed_jobs: i64,
}

impl ContractorRow {
    pub fn into_contractor(self) -> Result<Contractor> {
        let time = |secs: i64| {
            u32::try_from(secs)
                .ok()
                .and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, 0))
                .ok_or_else(|| corrupt("contractors", &self.id, format!("time of day {}", secs)))
        };
        let working_hours = WorkingHours {
            start: time(self.work_start_secs)?,
            end: time(self.work_end_secs)?,
            days: WorkingHours::days_from_mask(self.work_days),
        };

        Ok(Contractor {
            id: self.id,
            name: self.name,
            trade: TradeType::new(self.trade),
            location: Coordinate::new(self.latitude, self.longitude),
            working_hours,
            active: self.active != 0,
            rating: self.rating,
            completed_jobs: self.completed_jobs,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: String,
    pub customer_id: String,
    pub trade: String,
    pub latitude: f64,
    pub longitude: f64,
    pub desired_at: i64,
    pub estimated_duration_minutes: i64,
    pub description: String,
    pub status: String,
    pub assigned_contractor_id: Option<String>,
    pub created_at: i64,
}

impl JobRow {
    pub fn into_job(self) -> Result<Job> {
        let status = JobStatus::parse(&self.status)
            .ok_or_else(|| corrupt("jobs", &self.id, format!("status {}", self.status)))?;
        let desired_at = wall_clock_from_millis(self.desired_at)
            .ok_or_else(|| corrupt("jobs", &self.id, format!("desired_at {}", self.desired_at)))?;

        Ok(Job {
            id: self.id,
            customer_id: self.customer_id,
            trade: TradeType::new(self.trade),
            location: Coordinate::new(self.latitude, self.longitude),
            desired_at,
            estimated_duration_minutes: self.estimated_duration_minutes,
            description: self.description,
            status,
            assigned_contractor_id: self.assigned_contractor_id,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AssignmentRow {
    pub id: String,
    pub job_id: String,
    pub contractor_id: String,
    pub status: String,
    pub assigned_at: i64,
    pub accepted_at: Option<i64>,
    pub declined_at: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub reason: Option<String>,
}

impl AssignmentRow {
    pub fn into_assignment(self) -> Result<Assignment> {
        let status = AssignmentStatus::parse(&self.status)
            .ok_or_else(|| corrupt("assignments", &self.id, format!("status {}", self.status)))?;

        Ok(Assignment {
            id: self.id,
            job_id: self.job_id,
            contractor_id: self.contractor_id,
            status,
            assigned_at: self.assigned_at,
            accepted_at: self.accepted_at,
            declined_at: self.declined_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            cancelled_at: self.cancelled_at,
            reason: self.reason,
        })
    }
}

/// Committed block joined from an assignment and its job
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BlockRow {
    pub assignment_id: String,
    pub job_id: String,
    pub contractor_id: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl BlockRow {
    pub fn into_block(self) -> Result<(String, CommittedTimeBlock)> {
        let start = wall_clock_from_millis(self.start_ms)
            .ok_or_else(|| corrupt("jobs", &self.job_id, "block start"))?;
        let end = wall_clock_from_millis(self.end_ms)
            .ok_or_else(|| corrupt("jobs", &self.job_id, "block end"))?;
        Ok((
            self.contractor_id,
            CommittedTimeBlock {
                start,
                end,
                assignment_id: Some(self.assignment_id),
                job_id: Some(self.job_id),
            },
        ))
    }
}

/// Start a query for blocks of non-terminal assignments intersecting
/// `[from, to)`. Callers push the contractor filter and ordering.
pub(crate) fn committed_blocks_query(
    from: NaiveDateTime,
    to: NaiveDateTime,
    travel_buffer_minutes: i64,
) -> QueryBuilder<'static, Sqlite> {
    let mut query = QueryBuilder::new(
        "SELECT a.id AS assignment_id, a.job_id AS job_id, a.contractor_id AS contractor_id, \
                j.desired_at AS start_ms, \
                j.desired_at + (j.estimated_duration_minutes + ",
    );
    query.push_bind(travel_buffer_minutes);
    query.push(") * 60000 AS end_ms FROM assignments a JOIN jobs j ON j.id = a.job_id");
    query.push(" WHERE a.status IN ");
    query.push(NON_TERMINAL_SQL);
    query.push(" AND j.desired_at < ");
    query.push_bind(wall_clock_millis(to));
    query.push(" AND j.desired_at + (j.estimated_duration_minutes + ");
    query.push_bind(travel_buffer_minutes);
    query.push(") * 60000 > ");
    query.push_bind(wall_clock_millis(from));
    query
}
