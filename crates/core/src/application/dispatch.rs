//! Inbound recommendation use case

use crate::application::scoring::{RecommendationEngine, RecommendationSet};
use crate::domain::{ContractorId, JobId, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{ContractorRepository, JobRepository};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, warn};

pub struct DispatchService {
    jobs: Arc<dyn JobRepository>,
    contractors: Arc<dyn ContractorRepository>,
    engine: Arc<RecommendationEngine>,
}

impl DispatchService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        contractors: Arc<dyn ContractorRepository>,
        engine: Arc<RecommendationEngine>,
    ) -> Self {
        Self {
            jobs,
            contractors,
            engine,
        }
    }

    /// `RequestRecommendations(jobId, topN, restrictToSet?)`
    ///
    /// Bounded by the configured timeout. On expiry the caller gets
    /// `AppError::Timeout`, never a partial ranking.
    pub async fn request_recommendations(
        &self,
        job_id: &JobId,
        top_n: Option<usize>,
        restrict_to: Option<Vec<ContractorId>>,
    ) -> Result<RecommendationSet> {
        let timeout = self.engine.config().recommendation_timeout();
        let restrict: Option<HashSet<ContractorId>> =
            restrict_to.map(|ids| ids.into_iter().collect());

        match tokio::time::timeout(timeout, self.recommend(job_id, top_n, restrict.as_ref())).await
        {
            Ok(result) => result.inspect_err(|e| {
                if e.is_unexpected() {
                    error!(
                        job_id = %job_id,
                        restricted = restrict.as_ref().map_or(0, |set| set.len()),
                        error = %e,
                        "Recommendation request failed"
                    );
                }
            }),
            Err(_) => {
                warn!(
                    job_id = %job_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Recommendation request timed out"
                );
                Err(AppError::Timeout(format!(
                    "recommendations for job {} exceeded {} ms",
                    job_id,
                    timeout.as_millis()
                )))
            }
        }
    }

    async fn recommend(
        &self,
        job_id: &JobId,
        top_n: Option<usize>,
        restrict_to: Option<&HashSet<ContractorId>>,
    ) -> Result<RecommendationSet> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;

        if job.status != JobStatus::Pending {
            return Err(AppError::Conflict(format!(
                "job {} is {}, recommendations are only made for PENDING jobs",
                job.id, job.status
            )));
        }

        let pool = self.contractors.find_candidates(&job.trade).await?;
        self.engine.recommend(&job, &pool, top_n, restrict_to).await
    }
}
