// Domain Layer - Pure business logic and entities

pub mod assignment;
pub mod contractor;
pub mod error;
pub mod event;
pub mod geo;
pub mod job;
pub mod schedule;

// Re-exports
pub use assignment::{Actor, ActorRole, Assignment, AssignmentId, AssignmentStatus};
pub use contractor::{Contractor, ContractorId, TradeType, WorkingHours};
pub use error::DomainError;
pub use event::{AssignmentEvent, AssignmentEventKind};
pub use geo::Coordinate;
pub use job::{CustomerId, Job, JobId, JobStatus};
pub use schedule::CommittedTimeBlock;
