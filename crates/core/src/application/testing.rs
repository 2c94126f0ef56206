//! In-memory adapters shared by application-layer unit tests

use crate::domain::{
    Assignment, AssignmentEvent, AssignmentId, AssignmentStatus, CommittedTimeBlock, Contractor,
    ContractorId, Coordinate, Job, JobId, JobStatus, TradeType, WorkingHours,
};
use crate::error::{AppError, Result};
use crate::port::{
    AssignmentRepository, AssignmentTransaction, ContractorRepository, DistanceProvider,
    DistanceResult, DistanceStatus, EventPublisher, JobRepository, Transaction,
    TransactionalAssignmentStore,
};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Default, Clone)]
pub(crate) struct MemoryState {
    pub jobs: HashMap<JobId, Job>,
    pub contractors: HashMap<ContractorId, Contractor>,
    pub assignments: Vec<Assignment>,
}

impl MemoryState {
    fn blocks_for(
        &self,
        contractor_id: &ContractorId,
        from: NaiveDateTime,
        to: NaiveDateTime,
        travel_buffer_minutes: i64,
    ) -> Vec<CommittedTimeBlock> {
        self.assignments
            .iter()
            .filter(|a| &a.contractor_id == contractor_id && !a.status.is_terminal())
            .filter_map(|a| {
                let job = self.jobs.get(&a.job_id)?;
                let block = CommittedTimeBlock {
                    start: job.desired_at,
                    end: job.desired_at
                        + job.estimated_duration()
                        + Duration::minutes(travel_buffer_minutes),
                    assignment_id: Some(a.id.clone()),
                    job_id: Some(job.id.clone()),
                };
                (block.start < to && block.end > from).then_some(block)
            })
            .collect()
    }
}

/// Serializable store: a transaction holds the only lock until it ends
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<tokio::sync::Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_job(&self, job: Job) {
        self.state.lock().await.jobs.insert(job.id.clone(), job);
    }

    pub async fn put_contractor(&self, contractor: Contractor) {
        self.state
            .lock()
            .await
            .contractors
            .insert(contractor.id.clone(), contractor);
    }

    pub async fn put_assignment(&self, assignment: Assignment) {
        self.state.lock().await.assignments.push(assignment);
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl ContractorRepository for MemoryStore {
    async fn insert(&self, contractor: &Contractor) -> Result<()> {
        self.put_contractor(contractor.clone()).await;
        Ok(())
    }

    async fn find_by_id(&self, id: &ContractorId) -> Result<Option<Contractor>> {
        Ok(self.state.lock().await.contractors.get(id).cloned())
    }

    async fn find_candidates(&self, trade: &TradeType) -> Result<Vec<Contractor>> {
        let state = self.state.lock().await;
        let mut found: Vec<Contractor> = state
            .contractors
            .values()
            .filter(|c| &c.trade == trade)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        self.put_job(job.clone()).await;
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.state.lock().await.jobs.get(id).cloned())
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.jobs.values().filter(|j| j.status == status).count() as i64)
    }
}

#[async_trait]
impl AssignmentRepository for MemoryStore {
    async fn find_by_id(&self, id: &AssignmentId) -> Result<Option<Assignment>> {
        let state = self.state.lock().await;
        Ok(state.assignments.iter().find(|a| &a.id == id).cloned())
    }

    async fn find_by_job(&self, job_id: &JobId) -> Result<Vec<Assignment>> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .rev()
            .filter(|a| &a.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn committed_blocks(
        &self,
        contractor_ids: &[ContractorId],
        from: NaiveDateTime,
        to: NaiveDateTime,
        travel_buffer_minutes: i64,
    ) -> Result<Vec<(ContractorId, CommittedTimeBlock)>> {
        let state = self.state.lock().await;
        Ok(contractor_ids
            .iter()
            .flat_map(|id| {
                state
                    .blocks_for(id, from, to, travel_buffer_minutes)
                    .into_iter()
                    .map(move |block| (id.clone(), block))
            })
            .collect())
    }

    async fn count_by_status(&self, status: AssignmentStatus) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.status == status)
            .count() as i64)
    }
}

#[async_trait]
impl TransactionalAssignmentStore for MemoryStore {
    async fn begin_transaction(&self) -> Result<Box<dyn AssignmentTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl AssignmentTransaction for MemoryTransaction {
    async fn find_job(&mut self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.working.jobs.get(id).cloned())
    }

    async fn find_contractor(&mut self, id: &ContractorId) -> Result<Option<Contractor>> {
        Ok(self.working.contractors.get(id).cloned())
    }

    async fn find_assignment(&mut self, id: &AssignmentId) -> Result<Option<Assignment>> {
        Ok(self.working.assignments.iter().find(|a| &a.id == id).cloned())
    }

    async fn find_active_assignment_for_job(
        &mut self,
        job_id: &JobId,
    ) -> Result<Option<Assignment>> {
        Ok(self
            .working
            .assignments
            .iter()
            .find(|a| &a.job_id == job_id && !a.status.is_terminal())
            .cloned())
    }

    async fn committed_blocks(
        &mut self,
        contractor_id: &ContractorId,
        from: NaiveDateTime,
        to: NaiveDateTime,
        travel_buffer_minutes: i64,
    ) -> Result<Vec<CommittedTimeBlock>> {
        Ok(self
            .working
            .blocks_for(contractor_id, from, to, travel_buffer_minutes))
    }

    async fn insert_assignment_guarded(
        &mut self,
        assignment: &Assignment,
        block: &CommittedTimeBlock,
        travel_buffer_minutes: i64,
    ) -> Result<bool> {
        let clash = self
            .working
            .blocks_for(
                &assignment.contractor_id,
                block.start,
                block.end,
                travel_buffer_minutes,
            )
            .iter()
            .any(|b| b.overlaps(block));
        let job_busy = self
            .working
            .assignments
            .iter()
            .any(|a| a.job_id == assignment.job_id && !a.status.is_terminal());
        if clash || job_busy {
            return Ok(false);
        }
        self.working.assignments.push(assignment.clone());
        Ok(true)
    }

    async fn update_assignment(
        &mut self,
        assignment: &Assignment,
        expected: AssignmentStatus,
    ) -> Result<bool> {
        match self
            .working
            .assignments
            .iter_mut()
            .find(|a| a.id == assignment.id)
        {
            Some(stored) if stored.status == expected => {
                *stored = assignment.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_job_status(
        &mut self,
        job_id: &JobId,
        expected: JobStatus,
        new_status: JobStatus,
        assigned_contractor_id: Option<&ContractorId>,
    ) -> Result<bool> {
        match self.working.jobs.get_mut(job_id) {
            Some(job) if job.status == expected => {
                job.status = new_status;
                job.assigned_contractor_id = assigned_contractor_id.cloned();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Records every event; optionally fails each delivery
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    pub events: Mutex<Vec<AssignmentEvent>>,
    pub fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn kinds(&self) -> Vec<crate::domain::AssignmentEventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &AssignmentEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err(AppError::Internal("notification service down".to_string()));
        }
        Ok(())
    }
}

/// Distance = |dlat| * 100 miles, counting cells asked for
#[derive(Default)]
pub(crate) struct LatitudeDistance {
    pub cells: AtomicUsize,
}

#[async_trait]
impl DistanceProvider for LatitudeDistance {
    async fn get_distance(&self, o: Coordinate, d: Coordinate) -> Result<DistanceResult> {
        let mut m = self.get_distance_matrix(&[o], &[d]).await?;
        Ok(m.remove(0).remove(0))
    }

    async fn get_distance_matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Result<Vec<Vec<DistanceResult>>> {
        self.cells
            .fetch_add(origins.len() * destinations.len(), Ordering::SeqCst);
        Ok(origins
            .iter()
            .map(|o| {
                destinations
                    .iter()
                    .map(|d| {
                        let miles = ((o.latitude - d.latitude).abs() * 100.0).round();
                        DistanceResult {
                            distance_miles: miles,
                            travel_time_minutes: miles * 2.0,
                            status: DistanceStatus::Ok,
                        }
                    })
                    .collect()
            })
            .collect())
    }
}

/// Monday 2024-06-03 at `h:m`
pub(crate) fn monday_at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

pub(crate) fn plumber(id: &str, latitude: f64) -> Contractor {
    Contractor::new(
        id,
        format!("Plumber {}", id),
        TradeType::new("plumbing"),
        Coordinate::new(latitude, -74.0),
        WorkingHours::weekdays(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        )
        .unwrap(),
    )
}

/// Plumbing job at latitude 40.0 on Monday
pub(crate) fn plumbing_job(id: &str, start: NaiveDateTime, minutes: i64) -> Job {
    Job::new(
        id,
        1_000,
        "cust-1",
        TradeType::new("plumbing"),
        Coordinate::new(40.0, -74.0),
        start,
        minutes,
        "Leaking pipe",
    )
}
