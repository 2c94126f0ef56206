//! RPC Method Handlers
//!
//! Thin translation between wire types and the application services.

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    actor, AssignRequest, AssignmentView, CancelJobRequest, HistoryRequest, HistoryResponse,
    JobView, ReassignRequest, RecommendRequest, StatsResponse, TransitionRequest,
};
use fieldops_core::application::{AssignmentStateMachine, DispatchService, RecommendationSet};
use fieldops_core::domain::{AssignmentStatus, JobStatus};
use fieldops_core::error::AppError;
use fieldops_core::port::{AssignmentRepository, JobRepository};
use jsonrpsee::types::ErrorObjectOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// Identifiers a failed request is logged with
#[derive(Default)]
struct Subject<'a> {
    job_id: Option<&'a str>,
    contractor_id: Option<&'a str>,
    assignment_id: Option<&'a str>,
}

/// Wire error for a failed call. Storage and internal failures are logged
/// with their full detail first, since the caller only sees a generic message.
fn failure(method: &'static str, subject: &Subject<'_>, err: AppError) -> ErrorObjectOwned {
    if err.is_unexpected() {
        error!(
            method,
            job_id = subject.job_id.unwrap_or("-"),
            contractor_id = subject.contractor_id.unwrap_or("-"),
            assignment_id = subject.assignment_id.unwrap_or("-"),
            error = %err,
            "RPC request failed"
        );
    }
    to_rpc_error(err)
}

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    dispatch: Arc<DispatchService>,
    state_machine: Arc<AssignmentStateMachine>,
    jobs: Arc<dyn JobRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    rate_limiter: RateLimiter,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        dispatch: Arc<DispatchService>,
        state_machine: Arc<AssignmentStateMachine>,
        jobs: Arc<dyn JobRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            dispatch,
            state_machine,
            jobs,
            assignments,
            rate_limiter,
            start_time: Instant::now(),
        }
    }

    async fn throttle(&self) -> RpcResult<()> {
        if self.rate_limiter.check().await {
            Ok(())
        } else {
            Err(throttled())
        }
    }

    /// dispatch.recommend.v1
    pub async fn recommend(&self, params: RecommendRequest) -> RpcResult<RecommendationSet> {
        self.throttle().await?;

        let subject = Subject {
            job_id: Some(&params.job_id),
            ..Subject::default()
        };
        self.dispatch
            .request_recommendations(&params.job_id, params.top_n, params.restrict_to)
            .await
            .map_err(|e| failure("dispatch.recommend.v1", &subject, e))
    }

    /// dispatch.assign.v1
    pub async fn assign(&self, params: AssignRequest) -> RpcResult<AssignmentView> {
        self.throttle().await?;

        let actor = actor(&params.actor_id, params.actor_role);
        let subject = Subject {
            job_id: Some(&params.job_id),
            contractor_id: Some(&params.contractor_id),
            ..Subject::default()
        };
        self.state_machine
            .create_assignment(&params.job_id, &params.contractor_id, &actor)
            .await
            .map(AssignmentView::from)
            .map_err(|e| failure("dispatch.assign.v1", &subject, e))
    }

    /// dispatch.transition.v1
    pub async fn transition(&self, params: TransitionRequest) -> RpcResult<AssignmentView> {
        self.throttle().await?;

        let actor = actor(&params.actor_id, params.actor_role);
        let subject = Subject {
            assignment_id: Some(&params.assignment_id),
            ..Subject::default()
        };
        self.state_machine
            .transition(
                &params.assignment_id,
                params.target_state,
                &actor,
                params.reason,
            )
            .await
            .map(AssignmentView::from)
            .map_err(|e| failure("dispatch.transition.v1", &subject, e))
    }

    /// dispatch.reassign.v1
    pub async fn reassign(&self, params: ReassignRequest) -> RpcResult<AssignmentView> {
        self.throttle().await?;

        let actor = actor(&params.actor_id, params.actor_role);
        let subject = Subject {
            contractor_id: Some(&params.new_contractor_id),
            assignment_id: Some(&params.assignment_id),
            ..Subject::default()
        };
        self.state_machine
            .reassign(
                &params.assignment_id,
                &params.new_contractor_id,
                &actor,
                params.reason,
            )
            .await
            .map(AssignmentView::from)
            .map_err(|e| failure("dispatch.reassign.v1", &subject, e))
    }

    /// dispatch.cancel_job.v1
    pub async fn cancel_job(&self, params: CancelJobRequest) -> RpcResult<JobView> {
        self.throttle().await?;

        let actor = actor(&params.actor_id, params.actor_role);
        let subject = Subject {
            job_id: Some(&params.job_id),
            ..Subject::default()
        };
        self.state_machine
            .cancel_job(&params.job_id, &actor, params.reason)
            .await
            .map(JobView::from)
            .map_err(|e| failure("dispatch.cancel_job.v1", &subject, e))
    }

    /// dispatch.history.v1
    pub async fn history(&self, params: HistoryRequest) -> RpcResult<HistoryResponse> {
        self.throttle().await?;

        let subject = Subject {
            job_id: Some(&params.job_id),
            ..Subject::default()
        };
        self.jobs
            .find_by_id(&params.job_id)
            .await
            .map_err(|e| failure("dispatch.history.v1", &subject, e))?
            .ok_or_else(|| to_rpc_error(AppError::NotFound(format!("job {}", params.job_id))))?;

        let assignments = self
            .state_machine
            .assignment_history(&params.job_id)
            .await
            .map_err(|e| failure("dispatch.history.v1", &subject, e))?;

        Ok(HistoryResponse {
            job_id: params.job_id,
            assignments: assignments.into_iter().map(AssignmentView::from).collect(),
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> RpcResult<StatsResponse> {
        let mut jobs = BTreeMap::new();
        for status in JobStatus::ALL {
            let count = self
                .jobs
                .count_by_status(status)
                .await
                .map_err(|e| failure("admin.stats.v1", &Subject::default(), e))?;
            jobs.insert(status.as_str().to_string(), count);
        }

        let mut assignments = BTreeMap::new();
        for status in AssignmentStatus::ALL {
            let count = self
                .assignments
                .count_by_status(status)
                .await
                .map_err(|e| failure("admin.stats.v1", &Subject::default(), e))?;
            assignments.insert(status.as_str().to_string(), count);
        }

        Ok(StatsResponse {
            jobs,
            assignments,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::code;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use fieldops_core::application::distance::{
        AlwaysFallback, MappingDistanceProvider, UnconfiguredMapping,
    };
    use fieldops_core::application::{AvailabilityService, RecommendationEngine};
    use fieldops_core::domain::{ActorRole, Contractor, Coordinate, Job, TradeType, WorkingHours};
    use fieldops_core::port::id_provider::SequentialIdProvider;
    use fieldops_core::port::time_provider::SystemTimeProvider;
    use fieldops_core::port::{ContractorRepository, DistanceStatus, LogEventPublisher};
    use fieldops_core::EngineConfig;
    use fieldops_infra_sqlite::{
        create_pool, run_migrations, SqliteAssignmentRepository, SqliteContractorRepository,
        SqliteJobRepository,
    };
    use sqlx::SqlitePool;
    use std::io::Write;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output for assertions
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn plumber(id: &str, lat: f64) -> Contractor {
        Contractor::new(
            id,
            id,
            TradeType::new("plumbing"),
            Coordinate::new(lat, -74.0),
            WorkingHours::weekdays(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            )
            .unwrap(),
        )
    }

    pub(crate) async fn handler_with(limiter: RateLimiter) -> RpcHandler {
        handler_and_pool(limiter).await.0
    }

    async fn handler_and_pool(limiter: RateLimiter) -> (RpcHandler, SqlitePool) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let config = EngineConfig::default();

        let contractors = Arc::new(SqliteContractorRepository::new(pool.clone()));
        let jobs = Arc::new(SqliteJobRepository::new(pool.clone()));
        let assignments = Arc::new(SqliteAssignmentRepository::new(pool.clone()));

        contractors.insert(&plumber("c-1", 40.0)).await.unwrap();
        contractors.insert(&plumber("c-2", 40.1)).await.unwrap();
        jobs.insert(&Job::new(
            "job-1",
            0,
            "cust-1",
            TradeType::new("plumbing"),
            Coordinate::new(40.0, -74.0),
            monday_at(10, 0),
            60,
            "leaking tap",
        ))
        .await
        .unwrap();

        let distance = Arc::new(MappingDistanceProvider::new(
            Arc::new(UnconfiguredMapping),
            Arc::new(AlwaysFallback),
            &config.distance,
        ));
        let availability = Arc::new(AvailabilityService::new(
            assignments.clone(),
            &config.availability,
        ));
        let engine = Arc::new(RecommendationEngine::new(
            availability,
            distance,
            config.scoring.clone(),
        ));
        let dispatch = Arc::new(DispatchService::new(
            jobs.clone(),
            contractors,
            engine,
        ));
        let state_machine = Arc::new(AssignmentStateMachine::new(
            assignments.clone(),
            assignments.clone(),
            Arc::new(LogEventPublisher),
            Arc::new(SystemTimeProvider),
            Arc::new(SequentialIdProvider::new("asg")),
            &config.availability,
        ));

        (
            RpcHandler::new(dispatch, state_machine, jobs, assignments, limiter),
            pool,
        )
    }

    pub(crate) async fn handler() -> RpcHandler {
        handler_with(RateLimiter::new(1000, 1000)).await
    }

    fn assign_req(contractor: &str) -> AssignRequest {
        AssignRequest {
            job_id: "job-1".to_string(),
            contractor_id: contractor.to_string(),
            actor_id: "disp-1".to_string(),
            actor_role: ActorRole::Dispatcher,
        }
    }

    fn transition_req(id: &str, target: AssignmentStatus, actor_id: &str) -> TransitionRequest {
        TransitionRequest {
            assignment_id: id.to_string(),
            target_state: target,
            actor_id: actor_id.to_string(),
            actor_role: ActorRole::Contractor,
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_recommend_ranks_nearest_first() {
        let handler = handler().await;

        let set = handler
            .recommend(RecommendRequest {
                job_id: "job-1".to_string(),
                top_n: None,
                restrict_to: None,
            })
            .await
            .unwrap();

        assert_eq!(set.recommendations.len(), 2);
        assert_eq!(set.recommendations[0].contractor_id, "c-1");
        assert_eq!(
            set.recommendations[0].breakdown.distance_status,
            DistanceStatus::FallbackUsed
        );
    }

    #[tokio::test]
    async fn test_assign_then_owner_accepts() {
        let handler = handler().await;

        let created = handler.assign(assign_req("c-1")).await.unwrap();
        assert_eq!(created.status, AssignmentStatus::Pending);

        let accepted = handler
            .transition(transition_req(
                &created.assignment_id,
                AssignmentStatus::Accepted,
                "c-1",
            ))
            .await
            .unwrap();
        assert_eq!(accepted.status, AssignmentStatus::Accepted);
        assert!(accepted.accepted_at.is_some());
    }

    #[tokio::test]
    async fn test_other_contractor_gets_forbidden() {
        let handler = handler().await;
        let created = handler.assign(assign_req("c-1")).await.unwrap();

        let err = handler
            .transition(transition_req(
                &created.assignment_id,
                AssignmentStatus::Accepted,
                "c-2",
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);

        let missing = handler
            .transition(transition_req("asg-404", AssignmentStatus::Accepted, "c-2"))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), code::FORBIDDEN);
        assert_eq!(missing.message(), err.message());
    }

    #[tokio::test]
    async fn test_second_assignment_conflicts() {
        let handler = handler().await;
        handler.assign(assign_req("c-1")).await.unwrap();

        let err = handler.assign(assign_req("c-2")).await.unwrap_err();

        assert_eq!(err.code(), code::CONFLICT);
    }

    #[tokio::test]
    async fn test_recommend_on_assigned_job_conflicts() {
        let handler = handler().await;
        handler.assign(assign_req("c-1")).await.unwrap();

        let err = handler
            .recommend(RecommendRequest {
                job_id: "job-1".to_string(),
                top_n: None,
                restrict_to: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), code::CONFLICT);
    }

    #[tokio::test]
    async fn test_reassign_and_history() {
        let handler = handler().await;
        let first = handler.assign(assign_req("c-1")).await.unwrap();

        let second = handler
            .reassign(ReassignRequest {
                assignment_id: first.assignment_id.clone(),
                new_contractor_id: "c-2".to_string(),
                actor_id: "disp-1".to_string(),
                actor_role: ActorRole::Dispatcher,
                reason: Some("customer request".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(second.contractor_id, "c-2");

        let history = handler
            .history(HistoryRequest {
                job_id: "job-1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(history.assignments.len(), 2);
        let statuses: Vec<_> = history.assignments.iter().map(|a| a.status).collect();
        assert!(statuses.contains(&AssignmentStatus::Cancelled));
        assert!(statuses.contains(&AssignmentStatus::Pending));
    }

    #[tokio::test]
    async fn test_history_of_unknown_job() {
        let handler = handler().await;

        let err = handler
            .history(HistoryRequest {
                job_id: "job-404".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), code::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_job_requires_dispatcher() {
        let handler = handler().await;
        handler.assign(assign_req("c-1")).await.unwrap();

        let err = handler
            .cancel_job(CancelJobRequest {
                job_id: "job-1".to_string(),
                actor_id: "c-1".to_string(),
                actor_role: ActorRole::Contractor,
                reason: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);

        let job = handler
            .cancel_job(CancelJobRequest {
                job_id: "job-1".to_string(),
                actor_id: "disp-1".to_string(),
                actor_role: ActorRole::Dispatcher,
                reason: Some("duplicate".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.desired_at, "2024-06-03T10:00:00");
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let handler = handler().await;
        handler.assign(assign_req("c-1")).await.unwrap();

        let stats = handler.stats().await.unwrap();

        assert_eq!(stats.jobs["ASSIGNED"], 1);
        assert_eq!(stats.jobs["PENDING"], 0);
        assert_eq!(stats.assignments["PENDING"], 1);
        assert_eq!(stats.assignments.len(), 6);
    }

    #[tokio::test]
    async fn test_throttled_after_burst() {
        let handler = handler_with(RateLimiter::new(1, 0)).await;
        let req = || HistoryRequest {
            job_id: "job-1".to_string(),
        };

        assert!(handler.history(req()).await.is_ok());
        let err = handler.history(req()).await.unwrap_err();

        assert_eq!(err.code(), code::THROTTLED);
    }

    #[tokio::test]
    async fn test_storage_failure_is_logged_with_detail() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (h, pool) = handler_and_pool(RateLimiter::new(1000, 1000)).await;
        pool.close().await;

        let err = h
            .history(HistoryRequest {
                job_id: "job-1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::DB_ERROR);
        assert_eq!(err.message(), "database error");

        let err = h.assign(assign_req("c-2")).await.unwrap_err();
        assert_eq!(err.code(), code::DB_ERROR);

        let output = logs.contents();
        assert!(output.contains("RPC request failed"), "{}", output);
        assert!(output.contains("dispatch.history.v1"), "{}", output);
        assert!(output.contains("job_id=\"job-1\"") || output.contains("job_id=job-1"));
        assert!(output.contains("contractor_id=\"c-2\"") || output.contains("contractor_id=c-2"));
        assert!(output.contains("closed"), "{}", output);
    }

    #[tokio::test]
    async fn test_rejections_are_not_logged_as_failures() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let h = handler().await;
        let err = h
            .history(HistoryRequest {
                job_id: "job-404".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);

        assert!(!logs.contents().contains("RPC request failed"));
    }
}
