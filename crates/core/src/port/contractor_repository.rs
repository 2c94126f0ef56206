// Contractor Repository Port (Interface)

use crate::domain::{Contractor, ContractorId, TradeType};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Contractor persistence
#[async_trait]
pub trait ContractorRepository: Send + Sync {
    /// Insert a new contractor
    async fn insert(&self, contractor: &Contractor) -> Result<()>;

    /// Find contractor by ID
    async fn find_by_id(&self, id: &ContractorId) -> Result<Option<Contractor>>;

    /// Candidate pool for a trade, active or not (the engine filters)
    async fn find_candidates(&self, trade: &TradeType) -> Result<Vec<Contractor>>;
}
