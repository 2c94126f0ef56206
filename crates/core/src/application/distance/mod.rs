//! Distance lookup
//!
//! - `MappingDistanceProvider`: mapping service with bounded retry, falling
//!   back to a great-circle estimate (`FALLBACK_USED`) instead of failing
//! - `CachedDistanceProvider`: TTL cache decorator; cache trouble only costs
//!   latency, never correctness

mod cache;
mod fallback;
mod provider;
mod retry;

pub use cache::{CachedDistanceProvider, InMemoryDistanceCache};
pub use fallback::{haversine_miles, FallbackEstimator};
pub use provider::{MappingDistanceProvider, UnconfiguredMapping};
pub use retry::{AlwaysFallback, FixedBackoff, RetryStrategy};

use crate::domain::Coordinate;
use crate::error::Result;

/// Validate every coordinate before any network or cache access
pub(crate) fn validate_all(origins: &[Coordinate], destinations: &[Coordinate]) -> Result<()> {
    for coordinate in origins.iter().chain(destinations) {
        coordinate.validate()?;
    }
    Ok(())
}
