//! Scoring & ranking of candidate contractors for a job
//!
//! Pipeline per candidate:
//! 1. drop inactive, wrong-trade and (optionally) non-allowlisted contractors
//! 2. drop unavailable contractors (before any distance lookup)
//! 3. rating score: rating / max_rating, neutral default without reviews
//! 4. distance score: 1 - miles / radius, clamped to [0, 1]
//! 5. score = w_a * availability + w_r * rating + w_d * distance
//!
//! Ordering: score desc, completed jobs desc, contractor id asc.

use crate::application::availability::AvailabilityService;
use crate::config::ScoringConfig;
use crate::domain::{Contractor, ContractorId, Job, JobId};
use crate::error::{AppError, Result};
use crate::port::{DistanceProvider, DistanceResult, DistanceStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-factor contribution, kept for transparency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub availability_score: f64,
    pub rating_score: f64,
    pub distance_score: f64,
    pub distance_miles: f64,
    pub travel_time_minutes: f64,
    pub distance_status: DistanceStatus,
    pub rated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub contractor_id: ContractorId,
    pub contractor_name: String,
    pub completed_jobs: i64,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub explanation: String,
}

/// Ranked output for one job
///
/// `no_candidates` is set when filtering left nobody to rank, which is
/// different from a caller asking for nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub job_id: JobId,
    pub recommendations: Vec<Recommendation>,
    pub no_candidates: bool,

    /// Pool size before filtering
    pub considered: usize,
    /// Survivors of the eligibility filter
    pub eligible: usize,
    /// Survivors of the availability filter
    pub available: usize,
}

pub struct RecommendationEngine {
    availability: Arc<AvailabilityService>,
    distance: Arc<dyn DistanceProvider>,
    config: ScoringConfig,
}

impl RecommendationEngine {
    pub fn new(
        availability: Arc<AvailabilityService>,
        distance: Arc<dyn DistanceProvider>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            availability,
            distance,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// `Recommend(job, candidatePool, topN, filterToSet?)`
    pub async fn recommend(
        &self,
        job: &Job,
        pool: &[Contractor],
        top_n: Option<usize>,
        restrict_to: Option<&HashSet<ContractorId>>,
    ) -> Result<RecommendationSet> {
        job.validate()?;
        let top_n = top_n.unwrap_or(self.config.default_top_n);
        if top_n == 0 {
            return Err(AppError::Validation("top_n must be at least 1".to_string()));
        }

        let eligible: Vec<&Contractor> = pool
            .iter()
            .filter(|c| c.active)
            .filter(|c| c.trade == job.trade)
            .filter(|c| restrict_to.map_or(true, |set| set.contains(&c.id)))
            .collect();

        let available = self
            .availability
            .filter_available(&eligible, job.desired_at, job.estimated_duration())
            .await?;

        debug!(
            job_id = %job.id,
            considered = pool.len(),
            eligible = eligible.len(),
            available = available.len(),
            "Candidate filtering complete"
        );

        if available.is_empty() {
            info!(job_id = %job.id, considered = pool.len(), "No candidates for job");
            return Ok(RecommendationSet {
                job_id: job.id.clone(),
                recommendations: Vec::new(),
                no_candidates: true,
                considered: pool.len(),
                eligible: eligible.len(),
                available: 0,
            });
        }

        let origins: Vec<_> = available.iter().map(|c| c.location).collect();
        let matrix = self
            .distance
            .get_distance_matrix(&origins, &[job.location])
            .await?;

        let mut ranked = Vec::with_capacity(available.len());
        for (contractor, row) in available.iter().zip(matrix) {
            let distance = row.into_iter().next().ok_or_else(|| {
                AppError::Internal(format!(
                    "missing distance for contractor {}",
                    contractor.id
                ))
            })?;
            ranked.push(self.score(contractor, &distance));
        }

        rank(&mut ranked);
        let available_count = ranked.len();
        ranked.truncate(top_n);

        info!(
            job_id = %job.id,
            returned = ranked.len(),
            available = available_count,
            top_contractor = ?ranked.first().map(|r| &r.contractor_id),
            "Recommendations computed"
        );

        Ok(RecommendationSet {
            job_id: job.id.clone(),
            recommendations: ranked,
            no_candidates: false,
            considered: pool.len(),
            eligible: eligible.len(),
            available: available_count,
        })
    }

    /// Normalized rating in [0, 1]
    pub fn rating_score(&self, contractor: &Contractor) -> f64 {
        match contractor.rating {
            Some(rating) => (rating / self.config.max_rating).clamp(0.0, 1.0),
            None => self.config.neutral_rating_score,
        }
    }

    /// 1 at the job site, 0 at or beyond the service radius
    pub fn distance_score(&self, distance_miles: f64) -> f64 {
        (1.0 - distance_miles / self.config.max_service_radius_miles).clamp(0.0, 1.0)
    }

    /// Score one available contractor
    fn score(&self, contractor: &Contractor, distance: &DistanceResult) -> Recommendation {
        let availability_score = 1.0;
        let rating_score = self.rating_score(contractor);
        let distance_score = self.distance_score(distance.distance_miles);

        let score = self.config.availability_weight * availability_score
            + self.config.rating_weight * rating_score
            + self.config.distance_weight * distance_score;

        let rating_text = match contractor.rating {
            Some(rating) => format!(
                "rating {:.1}/{:.0} ({:.2})",
                rating, self.config.max_rating, rating_score
            ),
            None => format!("no reviews yet (neutral {:.2})", rating_score),
        };
        let estimate = if distance.is_fallback() {
            ", estimated"
        } else {
            ""
        };
        let explanation = format!(
            "available; {}; {:.1} mi / {:.0} min{} ({:.2})",
            rating_text,
            distance.distance_miles,
            distance.travel_time_minutes,
            estimate,
            distance_score
        );

        Recommendation {
            contractor_id: contractor.id.clone(),
            contractor_name: contractor.name.clone(),
            completed_jobs: contractor.completed_jobs,
            score,
            breakdown: ScoreBreakdown {
                availability_score,
                rating_score,
                distance_score,
                distance_miles: distance.distance_miles,
                travel_time_minutes: distance.travel_time_minutes,
                distance_status: distance.status,
                rated: contractor.rating.is_some(),
            },
            explanation,
        }
    }
}

/// Deterministic ordering: score desc, completed jobs desc, id asc
fn rank(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.completed_jobs.cmp(&a.completed_jobs))
            .then_with(|| a.contractor_id.cmp(&b.contractor_id))
    });
}
