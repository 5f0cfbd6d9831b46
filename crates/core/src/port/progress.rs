// Progress Reporter Port
// Passive observer notified after every run transition

use crate::domain::{ErrorKind, GroupStatus, JobId, OrderKey, RunStats};
use serde::{Deserialize, Serialize};

/// Why a run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Requested,
    FatalError,
}

/// Transition that triggered a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Initialized,
    RunStarted,
    JobStarted {
        job_id: JobId,
        order_key: OrderKey,
        attempt: u32,
    },
    /// Attempt undone: its backoff was interrupted or its start future was dropped
    AttemptWithdrawn { job_id: JobId },
    JobRequeued {
        job_id: JobId,
        attempt: u32,
        delay_ms: u64,
        message: String,
    },
    JobSucceeded { job_id: JobId },
    JobFailed {
        job_id: JobId,
        kind: ErrorKind,
        message: String,
    },
    RunPaused,
    RunResumed,
    RunCancelled { reason: CancelReason, skipped: usize },
    RunFinished,
}

/// Full state handed to reporters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub event: ProgressEvent,
    pub stats: RunStats,
    pub groups: Vec<GroupStatus>,
}

/// Progress reporter
///
/// Called synchronously from the drain loop; implementations must return
/// quickly and must not block on I/O.
pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Reporter that keeps every snapshot
    #[derive(Default)]
    pub struct RecordingReporter {
        snapshots: Mutex<Vec<ProgressSnapshot>>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
            self.snapshots.lock().unwrap().clone()
        }

        pub fn events(&self) -> Vec<ProgressEvent> {
            self.snapshots
                .lock()
                .unwrap()
                .iter()
                .map(|s| s.event.clone())
                .collect()
        }

        /// Job ids of every JobStarted event, in order
        pub fn started_jobs(&self) -> Vec<(JobId, OrderKey)> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    ProgressEvent::JobStarted {
                        job_id, order_key, ..
                    } => Some((job_id, order_key)),
                    _ => None,
                })
                .collect()
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn on_progress(&self, snapshot: &ProgressSnapshot) {
            self.snapshots.lock().unwrap().push(snapshot.clone());
        }
    }
}
