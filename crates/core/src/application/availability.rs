//! Availability - decides whether a contractor can take a time window
//!
//! A request is available when it starts inside the contractor's working
//! hours and its block (duration + travel buffer) overlaps no committed block.
//! Blocks are recomputed from live assignments on every call, never cached.

use crate::config::AvailabilityConfig;
use crate::domain::{CommittedTimeBlock, Contractor, ContractorId};
use crate::error::Result;
use crate::port::AssignmentRepository;
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Pure availability rules over already-fetched blocks
#[derive(Debug, Clone)]
pub struct AvailabilityCalculator {
    travel_buffer: Duration,
}

impl AvailabilityCalculator {
    pub fn new(config: &AvailabilityConfig) -> Self {
        Self {
            travel_buffer: config.travel_buffer(),
        }
    }

    pub fn travel_buffer_minutes(&self) -> i64 {
        self.travel_buffer.num_minutes()
    }

    /// `[start, start + duration + travel_buffer)`
    pub fn candidate_block(
        &self,
        start: NaiveDateTime,
        duration: Duration,
    ) -> Result<CommittedTimeBlock> {
        Ok(CommittedTimeBlock::for_window(
            start,
            duration,
            self.travel_buffer,
        )?)
    }

    /// Range of committed blocks that can matter for `candidate`: the whole
    /// calendar day of its start, stretched to the candidate's end.
    pub fn search_window(&self, candidate: &CommittedTimeBlock) -> (NaiveDateTime, NaiveDateTime) {
        let day_start = candidate.start.date().and_time(chrono::NaiveTime::MIN);
        let day_end = day_start + Duration::days(1);
        (day_start, day_end.max(candidate.end))
    }

    /// First existing block the candidate collides with
    pub fn first_conflict<'a>(
        &self,
        candidate: &CommittedTimeBlock,
        existing: &'a [CommittedTimeBlock],
    ) -> Option<&'a CommittedTimeBlock> {
        existing.iter().find(|block| candidate.overlaps(block))
    }

    /// A non-positive duration is a `Validation` error, not "unavailable"
    pub fn is_available(
        &self,
        contractor: &Contractor,
        requested_start: NaiveDateTime,
        requested_duration: Duration,
        existing: &[CommittedTimeBlock],
    ) -> Result<bool> {
        if !contractor.working_hours.covers(requested_start) {
            debug!(
                contractor_id = %contractor.id,
                requested_start = %requested_start,
                "Outside working hours"
            );
            return Ok(false);
        }

        let candidate = self.candidate_block(requested_start, requested_duration)?;

        match self.first_conflict(&candidate, existing) {
            Some(conflict) => {
                debug!(
                    contractor_id = %contractor.id,
                    conflict_start = %conflict.start,
                    conflict_end = %conflict.end,
                    "Requested window overlaps a committed block"
                );
                Ok(false)
            }
            None => Ok(true),
        }
    }
}

/// Availability backed by the assignment store
pub struct AvailabilityService {
    assignments: Arc<dyn AssignmentRepository>,
    calculator: AvailabilityCalculator,
}

impl AvailabilityService {
    pub fn new(assignments: Arc<dyn AssignmentRepository>, config: &AvailabilityConfig) -> Self {
        Self {
            assignments,
            calculator: AvailabilityCalculator::new(config),
        }
    }

    pub fn calculator(&self) -> &AvailabilityCalculator {
        &self.calculator
    }

    /// `IsAvailable(contractor, requestedStart, requestedDuration)`
    pub async fn is_available(
        &self,
        contractor: &Contractor,
        requested_start: NaiveDateTime,
        requested_duration: Duration,
    ) -> Result<bool> {
        let available = self
            .filter_available(&[contractor], requested_start, requested_duration)
            .await?;
        Ok(!available.is_empty())
    }

    /// Keep only the contractors free for the window, in input order.
    ///
    /// Contractors outside working hours are dropped before the store is
    /// queried; the rest share a single block lookup.
    pub async fn filter_available<'a>(
        &self,
        contractors: &[&'a Contractor],
        requested_start: NaiveDateTime,
        requested_duration: Duration,
    ) -> Result<Vec<&'a Contractor>> {
        let candidate = self
            .calculator
            .candidate_block(requested_start, requested_duration)?;

        let in_hours: Vec<&'a Contractor> = contractors
            .iter()
            .copied()
            .filter(|c| c.working_hours.covers(requested_start))
            .collect();

        if in_hours.is_empty() {
            return Ok(Vec::new());
        }

        let (from, to) = self.calculator.search_window(&candidate);
        let ids: Vec<ContractorId> = in_hours.iter().map(|c| c.id.clone()).collect();
        let rows = self
            .assignments
            .committed_blocks(&ids, from, to, self.calculator.travel_buffer_minutes())
            .await?;

        let mut by_contractor: HashMap<ContractorId, Vec<CommittedTimeBlock>> = HashMap::new();
        for (contractor_id, block) in rows {
            by_contractor.entry(contractor_id).or_default().push(block);
        }

        let mut available = Vec::with_capacity(in_hours.len());
        for contractor in in_hours {
            let existing = by_contractor
                .get(&contractor.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if self.calculator.is_available(
                contractor,
                requested_start,
                requested_duration,
                existing,
            )? {
                available.push(contractor);
            }
        }
        Ok(available)
    }
}
