// FieldOps Infrastructure - SQLite Adapter
// Implements: ContractorRepository, JobRepository, AssignmentRepository,
// TransactionalAssignmentStore, DistanceCache

mod assignment_repository;
mod connection;
mod contractor_repository;
mod distance_cache;
mod error;
mod job_repository;
mod migration;
mod rows;
mod transaction;

pub use assignment_repository::SqliteAssignmentRepository;
pub use connection::create_pool;
pub use contractor_repository::SqliteContractorRepository;
pub use distance_cache::SqliteDistanceCache;
pub use job_repository::SqliteJobRepository;
pub use migration::run_migrations;
pub use transaction::SqliteAssignmentTransaction;

// Note: sqlx::Error conversion is handled by `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
