use crate::error::SyncError;
use crate::models::SearchRecord;
use async_trait::async_trait;

/// The external full-text index. Both operations are submitted as one
/// batch and block until the index reports a terminal status for the
/// server-side job; a non-success status is an error, never silently
/// dropped. Both are idempotent, so a failed run can be retried verbatim.
#[async_trait]
pub trait SearchIndex {
    async fn upsert(&self, records: &[SearchRecord]) -> Result<(), SyncError>;

    async fn delete(&self, ids: &[String]) -> Result<(), SyncError>;
}
