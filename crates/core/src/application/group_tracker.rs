//! Group Status Tracker - per-group aggregation of job records
//!
//! Only groups named in the run's group metadata are tracked. Jobs whose
//! group key has no metadata still run; they are simply never aggregated.

use crate::domain::{GroupKey, GroupMeta, GroupState, GroupStatus, JobRecord, JobStatus};
use std::collections::HashMap;

/// Derive a group's status from the records that belong to it
pub fn derive_status<'a>(
    meta: &GroupMeta,
    records: impl IntoIterator<Item = &'a JobRecord>,
) -> GroupStatus {
    let mut total = 0;
    let mut succeeded = 0;
    let mut failed = 0;
    let mut skipped = 0;
    let mut unsettled = 0;
    let mut started = false;

    for record in records {
        if record.group_key() != meta.key {
            continue;
        }
        total += 1;
        match record.status {
            JobStatus::Succeeded => succeeded += 1,
            JobStatus::Failed => failed += 1,
            JobStatus::Skipped => skipped += 1,
            JobStatus::Pending | JobStatus::Running => unsettled += 1,
        }
        if record.status != JobStatus::Pending || record.was_attempted() {
            started = true;
        }
    }

    let status = if total > 0 && succeeded == total {
        GroupState::Succeeded
    } else if failed > 0 && unsettled == 0 {
        GroupState::Failed
    } else if total > 0 && unsettled == 0 && skipped > 0 {
        GroupState::Cancelled
    } else if started {
        GroupState::Running
    } else {
        GroupState::Pending
    };

    GroupStatus {
        key: meta.key.clone(),
        title: meta.title.clone(),
        total,
        succeeded,
        failed,
        skipped,
        status,
    }
}

/// Group statuses for one run, patched per job transition
#[derive(Debug, Default)]
pub struct GroupStatusTracker {
    metas: Vec<GroupMeta>,
    statuses: Vec<GroupStatus>,
    index: HashMap<GroupKey, usize>,
}

impl GroupStatusTracker {
    /// Build the tracker; duplicate group keys keep their first metadata entry
    pub fn new(groups: &[GroupMeta], records: &[JobRecord]) -> Self {
        let mut tracker = Self::default();
        for meta in groups {
            if tracker.index.contains_key(&meta.key) {
                continue;
            }
            tracker.index.insert(meta.key.clone(), tracker.metas.len());
            tracker.statuses.push(derive_status(meta, records));
            tracker.metas.push(meta.clone());
        }
        tracker
    }

    /// Recompute one group; unknown keys are ignored
    pub fn refresh(&mut self, key: &str, records: &[JobRecord]) {
        if let Some(&i) = self.index.get(key) {
            self.statuses[i] = derive_status(&self.metas[i], records);
        }
    }

    pub fn refresh_all(&mut self, records: &[JobRecord]) {
        for (meta, status) in self.metas.iter().zip(self.statuses.iter_mut()) {
            *status = derive_status(meta, records);
        }
    }

    pub fn statuses(&self) -> &[GroupStatus] {
        &self.statuses
    }

    pub fn get(&self, key: &str) -> Option<&GroupStatus> {
        self.index.get(key).map(|&i| &self.statuses[i])
    }
}
