// Progress reporters shipped with the core

use crate::port::{ProgressEvent, ProgressReporter, ProgressSnapshot};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Reporter that discards every snapshot
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
}

/// Reporter that emits one structured log line per transition
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let stats = &snapshot.stats;
        match &snapshot.event {
            ProgressEvent::JobFailed {
                job_id,
                kind,
                message,
            } => warn!(
                job_id = %job_id,
                kind = %kind,
                error = %message,
                succeeded = stats.succeeded,
                failed = stats.failed,
                total = stats.total,
                "Job failed"
            ),
            ProgressEvent::RunCancelled { reason, skipped } => warn!(
                reason = ?reason,
                skipped = skipped,
                never_attempted = stats.never_attempted,
                succeeded = stats.succeeded,
                failed = stats.failed,
                "Run cancelled"
            ),
            ProgressEvent::JobSucceeded { .. }
            | ProgressEvent::RunFinished
            | ProgressEvent::RunPaused
            | ProgressEvent::RunResumed => info!(
                event = ?snapshot.event,
                phase = %stats.phase,
                succeeded = stats.succeeded,
                failed = stats.failed,
                total = stats.total,
                "Run progress"
            ),
            event => debug!(event = ?event, phase = %stats.phase, "Run progress"),
        }
    }
}

/// Reporter that fans snapshots out over a broadcast channel
///
/// Sending never blocks; slow receivers observe `RecvError::Lagged`.
pub struct ChannelReporter {
    tx: broadcast::Sender<ProgressSnapshot>,
}

impl ChannelReporter {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<ProgressSnapshot>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        // No receivers is fine
        let _ = self.tx.send(snapshot.clone());
    }
}
