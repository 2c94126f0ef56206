// Contractor Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::geo::Coordinate;
use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Contractor ID
pub type ContractorId = String;

/// Trade specialization (e.g. "plumbing", "hvac")
///
/// Stored lowercase so "HVAC" and "hvac" match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeType(String);

impl TradeType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Weekly working-hours template
///
/// A shift starts and ends on the same day (`start < end`). Overnight
/// shifts such as 22:00-06:00 are not supported and fail validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub days: Vec<Weekday>,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime, days: Vec<Weekday>) -> Result<Self> {
        let hours = Self { start, end, days };
        hours.validate()?;
        Ok(hours)
    }

    /// Monday-Friday between `start` and `end`
    pub fn weekdays(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        Self::new(
            start,
            end,
            vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(DomainError::InvalidTimeWindow(format!(
                "working hours start {} must be before end {}",
                self.start, self.end
            )));
        }
        if self.days.is_empty() {
            return Err(DomainError::ValidationError(
                "working hours must include at least one day".to_string(),
            ));
        }
        Ok(())
    }

    /// True when `at` falls on a working day within `[start, end)`.
    pub fn covers(&self, at: NaiveDateTime) -> bool {
        if !self.days.contains(&at.weekday()) {
            return false;
        }
        let time = at.time();
        time >= self.start && time < self.end
    }

    /// Days packed into a bitmask (bit 0 = Monday), used by storage adapters.
    pub fn days_mask(&self) -> i64 {
        self.days
            .iter()
            .fold(0, |mask, day| mask | (1 << day.num_days_from_monday()))
    }

    pub fn days_from_mask(mask: i64) -> Vec<Weekday> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .filter(|day| mask & (1 << day.num_days_from_monday()) != 0)
        .collect()
    }
}

/// Contractor Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contractor {
    pub id: ContractorId,
    pub name: String,
    pub trade: TradeType,
    pub location: Coordinate,
    pub working_hours: WorkingHours,

    /// Soft-delete flag; inactive contractors are never ranked
    pub active: bool,

    /// Aggregate star rating, `None` until the first review
    pub rating: Option<f64>,
    pub completed_jobs: i64,
}

impl Contractor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        trade: TradeType,
        location: Coordinate,
        working_hours: WorkingHours,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            trade,
            location,
            working_hours,
            active: true,
            rating: None,
            completed_jobs: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "contractor id cannot be empty".to_string(),
            ));
        }
        self.location.validate()?;
        self.working_hours.validate()?;
        if let Some(rating) = self.rating {
            if !rating.is_finite() || rating < 0.0 {
                return Err(DomainError::ValidationError(format!(
                    "rating must be a non-negative number, got {}",
                    rating
                )));
            }
        }
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}
