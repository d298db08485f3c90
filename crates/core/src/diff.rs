use crate::models::{RecordSnapshot, SearchRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Add(String),
    Update(String),
    Remove(String),
}

impl RecordChange {
    pub fn id(&self) -> &str {
        match self {
            RecordChange::Add(id) | RecordChange::Update(id) | RecordChange::Remove(id) => id,
        }
    }
}

/// Minimal mutation set between the previous confirmed snapshot and the
/// current record set. Equality is deep and structural: sequences compare
/// positionally, maps by key set, so a record only produces an `Update`
/// when some field actually changed.
pub fn diff_snapshots(new: &RecordSnapshot, old: &RecordSnapshot) -> Vec<RecordChange> {
    let mut changes = Vec::new();

    for (id, record) in new {
        match old.get(id) {
            None => changes.push(RecordChange::Add(id.clone())),
            Some(previous) if previous != record => changes.push(RecordChange::Update(id.clone())),
            Some(_) => {}
        }
    }

    for id in old.keys() {
        if !new.contains_key(id) {
            changes.push(RecordChange::Remove(id.clone()));
        }
    }

    changes
}

#[derive(Debug, Default)]
pub struct ChangeBatches {
    pub upserts: Vec<SearchRecord>,
    pub removals: Vec<String>,
}

/// Splits changes into the two index calls: one add-or-replace batch and
/// one delete batch. Ids are disjoint across the two.
pub fn partition_changes(changes: &[RecordChange], records: &RecordSnapshot) -> ChangeBatches {
    let mut batches = ChangeBatches::default();

    for change in changes {
        match change {
            RecordChange::Add(id) | RecordChange::Update(id) => {
                if let Some(record) = records.get(id) {
                    batches.upserts.push(record.clone());
                }
            }
            RecordChange::Remove(id) => batches.removals.push(id.clone()),
        }
    }

    batches
}
