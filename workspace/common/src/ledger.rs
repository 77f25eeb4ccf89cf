use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome of ingesting a batch of feed transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IngestSummary {
    /// Rows written to the ledger
    pub inserted: usize,
    /// Rows already present (or repeated within the batch)
    pub skipped: usize,
}

/// Outcome of one sync run against a feed connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SyncResult {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub inserted: usize,
    pub skipped: usize,
    /// Cursor persisted for the next run
    pub cursor: String,
    pub institution_name: Option<String>,
}
