// Event Publisher Port (notification collaborator boundary)

use crate::domain::AssignmentEvent;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Fire-and-forget delivery of lifecycle events
///
/// Errors are reported to the caller for logging only; they never undo the
/// transition that produced the event.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &AssignmentEvent) -> Result<()>;
}

/// Publisher that only writes events to the log
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: &AssignmentEvent) -> Result<()> {
        info!(
            event = %event.kind,
            assignment_id = %event.assignment_id,
            job_id = %event.job_id,
            contractor_id = %event.contractor_id,
            status = %event.status,
            "Assignment event"
        );
        Ok(())
    }
}
