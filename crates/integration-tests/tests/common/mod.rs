//! Shared fixtures: a file-backed SQLite database wired to the real services

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use fieldops_core::application::distance::{
    CachedDistanceProvider, FixedBackoff, MappingDistanceProvider, RetryStrategy,
};
use fieldops_core::application::{
    AssignmentStateMachine, AvailabilityService, DispatchService, RecommendationEngine,
};
use fieldops_core::domain::{
    Actor, AssignmentEvent, AssignmentEventKind, Contractor, Coordinate, Job, TradeType,
    WorkingHours,
};
use fieldops_core::error::{AppError, Result};
use fieldops_core::port::time_provider::FixedTimeProvider;
use fieldops_core::port::id_provider::SequentialIdProvider;
use fieldops_core::port::{
    ContractorRepository, EventPublisher, JobRepository, MappingClient, MappingError,
    RouteEstimate,
};
use fieldops_core::EngineConfig;
use fieldops_infra_sqlite::{
    create_pool, run_migrations, SqliteAssignmentRepository, SqliteContractorRepository,
    SqliteDistanceCache, SqliteJobRepository,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 2024-06-03 is a Monday
pub fn monday_at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

pub fn contractor(id: &str, trade: &str, latitude: f64) -> Contractor {
    Contractor::new(
        id,
        format!("Contractor {}", id),
        TradeType::new(trade),
        Coordinate::new(latitude, -74.0),
        WorkingHours::weekdays(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        )
        .unwrap(),
    )
}

pub fn job(id: &str, trade: &str, start: NaiveDateTime, minutes: i64) -> Job {
    Job::new(
        id,
        0,
        "cust-1",
        TradeType::new(trade),
        Coordinate::new(40.0, -74.0),
        start,
        minutes,
        format!("{} job", trade),
    )
}

pub fn dispatcher() -> Actor {
    Actor::dispatcher("disp-1")
}

pub fn as_contractor(id: &str) -> Actor {
    Actor::contractor(id)
}

/// Events handed to the notification collaborator, optionally failing delivery
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<AssignmentEvent>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn fail_deliveries(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn kinds(&self) -> Vec<AssignmentEventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }

    pub fn events(&self) -> Vec<AssignmentEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &AssignmentEvent) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("notification service down".to_string()));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Mapping stub: 1 mile per 0.01 degree of latitude, 2 minutes per mile
#[derive(Default)]
pub struct LatitudeMapping {
    pub calls: AtomicU32,
    pub down: AtomicBool,
}

impl LatitudeMapping {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MappingClient for LatitudeMapping {
    async fn route_matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> std::result::Result<Vec<Vec<RouteEstimate>>, MappingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(MappingError::Unavailable("connection refused".to_string()));
        }
        Ok(origins
            .iter()
            .map(|o| {
                destinations
                    .iter()
                    .map(|d| {
                        let miles = ((o.latitude - d.latitude).abs() * 100.0).round();
                        RouteEstimate {
                            distance_miles: miles,
                            travel_time_minutes: miles * 2.0,
                        }
                    })
                    .collect()
            })
            .collect())
    }
}

pub struct Harness {
    db_path: PathBuf,
    pub config: EngineConfig,
    pub contractors: Arc<SqliteContractorRepository>,
    pub jobs: Arc<SqliteJobRepository>,
    pub assignments: Arc<SqliteAssignmentRepository>,
    pub availability: Arc<AvailabilityService>,
    pub state_machine: Arc<AssignmentStateMachine>,
    pub dispatch: Arc<DispatchService>,
    pub events: Arc<RecordingPublisher>,
    pub mapping: Arc<LatitudeMapping>,
    pub clock: Arc<FixedTimeProvider>,
}

impl Harness {
    pub async fn new() -> Self {
        let db_path =
            std::env::temp_dir().join(format!("fieldops-it-{}.db", uuid::Uuid::new_v4()));
        let pool = create_pool(&format!("sqlite://{}", db_path.display()))
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        let config = EngineConfig::default();
        let clock = Arc::new(FixedTimeProvider::new(1_717_405_200_000));
        let contractors = Arc::new(SqliteContractorRepository::new(pool.clone()));
        let jobs = Arc::new(SqliteJobRepository::new(pool.clone()));
        let assignments = Arc::new(SqliteAssignmentRepository::new(pool.clone()));
        let events = Arc::new(RecordingPublisher::default());
        let mapping = Arc::new(LatitudeMapping::default());

        let retry: Arc<dyn RetryStrategy> =
            Arc::new(FixedBackoff::new(2, Duration::from_millis(1)));
        let distance = Arc::new(CachedDistanceProvider::new(
            Arc::new(MappingDistanceProvider::new(
                mapping.clone(),
                retry,
                &config.distance,
            )),
            Arc::new(SqliteDistanceCache::new(pool.clone(), clock.clone())),
            &config.distance,
        ));
        let availability = Arc::new(AvailabilityService::new(
            assignments.clone(),
            &config.availability,
        ));
        let engine = Arc::new(RecommendationEngine::new(
            availability.clone(),
            distance,
            config.scoring.clone(),
        ));
        let dispatch = Arc::new(DispatchService::new(
            jobs.clone(),
            contractors.clone(),
            engine,
        ));
        let state_machine = Arc::new(AssignmentStateMachine::new(
            assignments.clone(),
            assignments.clone(),
            events.clone(),
            clock.clone(),
            Arc::new(SequentialIdProvider::new("asg")),
            &config.availability,
        ));

        Self {
            db_path,
            config,
            contractors,
            jobs,
            assignments,
            availability,
            state_machine,
            dispatch,
            events,
            mapping,
            clock,
        }
    }

    pub async fn add_contractor(&self, contractor: Contractor) -> Contractor {
        self.contractors.insert(&contractor).await.unwrap();
        contractor
    }

    pub async fn add_job(&self, job: Job) -> Job {
        self.jobs.insert(&job).await.unwrap();
        job
    }

    pub async fn job_of(&self, id: &str) -> Job {
        self.jobs.find_by_id(&id.to_string()).await.unwrap().unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.db_path.clone().into_os_string();
            path.push(suffix);
            std::fs::remove_file(path).ok();
        }
    }
}
