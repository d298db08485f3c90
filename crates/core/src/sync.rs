use crate::diff::{partition_changes, RecordChange};
use crate::error::SyncError;
use crate::models::RecordSnapshot;
use crate::traits::SearchIndex;
use std::fs;
use std::path::Path;

pub const SNAPSHOT_FILE: &str = "records_backup.json";

/// Reads the last confirmed snapshot, or an empty one when no sync has
/// succeeded yet.
pub fn load_snapshot(path: &Path) -> Result<RecordSnapshot, SyncError> {
    if !path.is_file() {
        return Ok(RecordSnapshot::new());
    }
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

pub fn store_snapshot(path: &Path, records: &RecordSnapshot) -> Result<(), SyncError> {
    let staged = path.with_extension("tmp");
    fs::write(&staged, serde_json::to_vec_pretty(records)?)?;
    fs::rename(&staged, path)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub upserted: usize,
    pub removed: usize,
}

/// Two-phase apply: the add-or-replace batch, then the delete batch, then
/// the snapshot commit. The new snapshot becomes the baseline only when
/// every submitted batch succeeded; on any failure the previous snapshot
/// stays authoritative and the next run recomputes the same diff.
///
/// The pair of batches is not transactional: a crash after the first batch
/// leaves index and snapshot inconsistent until the next run repairs it.
/// Accepted weak-consistency window; ids across the two batches are
/// disjoint and the operations are idempotent at the index.
pub async fn apply_changes<I>(
    index: &I,
    records: &RecordSnapshot,
    changes: &[RecordChange],
    snapshot_path: &Path,
) -> Result<SyncOutcome, SyncError>
where
    I: SearchIndex + Sync,
{
    let batches = partition_changes(changes, records);

    if !batches.upserts.is_empty() {
        index.upsert(&batches.upserts).await?;
    }
    if !batches.removals.is_empty() {
        index.delete(&batches.removals).await?;
    }

    store_snapshot(snapshot_path, records)?;

    Ok(SyncOutcome {
        upserted: batches.upserts.len(),
        removed: batches.removals.len(),
    })
}
