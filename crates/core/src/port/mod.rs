// Port Layer - Interfaces for external dependencies

pub mod assignment_repository;
pub mod contractor_repository;
pub mod distance;
pub mod event_publisher;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod time_provider;
pub mod transaction;

// Re-exports
pub use assignment_repository::AssignmentRepository;
pub use contractor_repository::ContractorRepository;
pub use distance::{
    DistanceCache, DistanceProvider, DistanceResult, DistanceStatus, MappingClient, MappingError,
    RouteEstimate,
};
pub use event_publisher::{EventPublisher, LogEventPublisher};
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use time_provider::TimeProvider;
pub use transaction::{AssignmentTransaction, Transaction, TransactionalAssignmentStore};
