// Application Layer - Use Cases and Business Logic

pub mod assignment;
pub mod availability;
pub mod dispatch;
pub mod distance;
pub mod maintenance;
pub mod scoring;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use assignment::AssignmentStateMachine;
pub use availability::{AvailabilityCalculator, AvailabilityService};
pub use dispatch::DispatchService;
pub use maintenance::CacheMaintenanceScheduler;
pub use scoring::{Recommendation, RecommendationEngine, RecommendationSet, ScoreBreakdown};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
