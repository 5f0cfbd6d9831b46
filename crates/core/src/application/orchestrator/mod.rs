// Orchestrator - sequential drain loop over generation jobs

mod config;
pub mod constants;
mod controller;

pub use config::{OrchestratorConfig, PersistenceFailurePolicy};
pub use controller::RunController;

use crate::application::group_tracker::GroupStatusTracker;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{
    Artifact, ErrorKind, GroupMeta, GroupStatus, JobDescriptor, JobError, JobId, JobRecord,
    JobStatus, RunPhase, RunStats,
};
use crate::error::{AppError, Result};
use crate::port::{
    CancelReason, GenerationPort, PersistencePort, PortError, ProgressEvent, ProgressReporter,
    ProgressSnapshot, TimeProvider,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Mutable state of one run. Only the drain loop writes records.
#[derive(Default)]
struct RunState {
    records: Vec<JobRecord>,
    index: HashMap<JobId, usize>,
    groups: GroupStatusTracker,
    cursor: usize,
    succeeded_count: usize,
    failed_count: usize,
}

impl RunState {
    fn refresh_group(&mut self, index: usize) {
        let key = self.records[index].descriptor.group_key.clone();
        self.groups.refresh(&key, &self.records);
    }

    /// Anything left to run after the cursor
    fn has_remaining(&self) -> bool {
        self.records
            .iter()
            .skip(self.cursor)
            .any(|r| !r.status.is_terminal())
    }
}

/// How one pass over the job at the cursor ended
#[derive(Debug, PartialEq, Eq)]
enum JobOutcome {
    /// Job reached a terminal status and the cursor moved on
    Settled,
    /// Rate limited; the same job runs again after backoff
    Requeued,
    /// Backoff interrupted by pause or cancel before reaching the port
    Interrupted,
    /// Fatal error; the whole run stops
    Aborted,
}

/// Releases the draining flag on drop, including a dropped start future
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Bulk generation orchestrator
///
/// Drives one job at a time through the generation and persistence ports,
/// with pause/resume/cancel, retry with backoff on rate limiting, and
/// per-group progress aggregation.
pub struct Orchestrator {
    config: OrchestratorConfig,
    generator: Arc<dyn GenerationPort>,
    store: Arc<dyn PersistencePort>,
    reporter: Arc<dyn ProgressReporter>,
    time_provider: Arc<dyn TimeProvider>,
    retry_policy: RetryPolicy,
    controller: RunController,
    state: Mutex<RunState>,
    draining: AtomicBool,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// # Errors
    /// - AppError::Config if the configuration fails validation
    pub fn new(
        config: OrchestratorConfig,
        generator: Arc<dyn GenerationPort>,
        store: Arc<dyn PersistencePort>,
        reporter: Arc<dyn ProgressReporter>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let retry_policy = RetryPolicy::from_config(&config);
        Ok(Self {
            config,
            generator,
            store,
            reporter,
            time_provider,
            retry_policy,
            controller: RunController::new(),
            state: Mutex::new(RunState::default()),
            draining: AtomicBool::new(false),
        })
    }

    /// Replace all job records and group statuses with a fresh run
    ///
    /// Records are ordered by ascending `order_key` (ties keep input order).
    /// Descriptors whose group has no metadata still run but are never
    /// aggregated.
    ///
    /// # Errors
    /// - AppError::InvalidState while a drain loop is active
    /// - AppError::Validation on duplicate job ids
    pub fn initialize(&self, descriptors: Vec<JobDescriptor>, groups: Vec<GroupMeta>) -> Result<()> {
        // Held for the whole swap so no drain loop can start underneath it
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::InvalidState(
                "cannot initialize while a run is draining".to_string(),
            ));
        }
        let _guard = DrainGuard(&self.draining);

        let mut descriptors = descriptors;
        descriptors.sort_by_key(|d| d.order_key);

        let mut index = HashMap::with_capacity(descriptors.len());
        for (i, descriptor) in descriptors.iter().enumerate() {
            if index.insert(descriptor.id.clone(), i).is_some() {
                return Err(AppError::Validation(format!(
                    "duplicate job id: {}",
                    descriptor.id
                )));
            }
        }

        let records: Vec<JobRecord> = descriptors.into_iter().map(JobRecord::new).collect();
        let tracker = GroupStatusTracker::new(&groups, &records);
        let untracked = records
            .iter()
            .filter(|r| tracker.get(r.group_key()).is_none())
            .count();
        if untracked > 0 {
            debug!(
                untracked_jobs = untracked,
                "Jobs reference groups without metadata; they are not aggregated"
            );
        }

        {
            let mut state = self.state();
            *state = RunState {
                records,
                index,
                groups: tracker,
                ..RunState::default()
            };
            self.controller.reset();
        }

        info!(
            jobs = self.state().records.len(),
            groups = groups.len(),
            "Run initialized"
        );
        self.report(ProgressEvent::Initialized);
        Ok(())
    }

    /// Drain the queue until the run is finished or cancelled
    ///
    /// Starting an idle run begins at the first job; starting a paused run
    /// resumes it. A no-op while already running. Per-job failures are
    /// recorded on the job records and never returned from here.
    pub async fn start(&self) -> RunStats {
        let phase = self.controller.phase();
        if phase.is_terminal() {
            info!(phase = %phase, "Run already over; start ignored");
            return self.stats();
        }

        if self.draining.swap(true, Ordering::AcqRel) {
            if phase == RunPhase::Paused {
                self.resume();
                return self.wait_until_settled().await;
            }
            debug!("Run already draining; start is a no-op");
            return self.stats();
        }
        let _guard = DrainGuard(&self.draining);

        // A paused run whose previous start future was dropped
        if phase == RunPhase::Paused {
            self.controller.request_resume();
        }
        self.controller.set_phase(RunPhase::Running);
        info!(from = %phase, "Run started");
        self.report(ProgressEvent::RunStarted);

        self.drain().await;
        self.stats()
    }

    /// Ask the drain loop to pause at its next suspension point
    ///
    /// An in-flight generation or persistence call is allowed to complete.
    pub fn pause(&self) -> bool {
        let accepted = self.controller.request_pause();
        if accepted {
            info!("Pause requested");
        } else {
            warn!(phase = %self.controller.phase(), "Pause ignored");
        }
        accepted
    }

    /// Lift a pause; false when the run is neither paused nor pausing
    pub fn resume(&self) -> bool {
        let resumed = self.controller.request_resume();
        if resumed {
            info!("Resume requested");
        } else {
            warn!(phase = %self.controller.phase(), "Resume ignored: run is not paused");
        }
        resumed
    }

    /// Cancel the run; terminal, a new `initialize` is required afterwards
    pub fn cancel(&self) -> bool {
        if !self.controller.request_cancel() {
            warn!(phase = %self.controller.phase(), "Cancel ignored: run already over");
            return false;
        }
        info!("Cancel requested");

        // Nobody is draining, so nobody would observe the flag
        if !self.draining.load(Ordering::Acquire) {
            self.cancel_remaining(CancelReason::Requested);
        }
        true
    }

    pub fn phase(&self) -> RunPhase {
        self.controller.phase()
    }

    /// Receiver for phase changes
    pub fn subscribe_phase(&self) -> watch::Receiver<RunPhase> {
        self.controller.subscribe()
    }

    pub fn stats(&self) -> RunStats {
        let state = self.state();
        self.stats_of(&state)
    }

    pub fn group_statuses(&self) -> Vec<GroupStatus> {
        self.state().groups.statuses().to_vec()
    }

    pub fn job_record(&self, id: &str) -> Option<JobRecord> {
        let state = self.state();
        state.index.get(id).map(|&i| state.records[i].clone())
    }

    /// All records in processing order
    pub fn job_records(&self) -> Vec<JobRecord> {
        self.state().records.clone()
    }

    pub fn snapshot(&self, event: ProgressEvent) -> ProgressSnapshot {
        let state = self.state();
        ProgressSnapshot {
            event,
            stats: self.stats_of(&state),
            groups: state.groups.statuses().to_vec(),
        }
    }

    async fn wait_until_settled(&self) -> RunStats {
        let mut rx = self.controller.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|phase| phase.is_terminal()).await;
        self.stats()
    }

    async fn drain(&self) {
        loop {
            if self.controller.is_cancel_requested() {
                self.cancel_remaining(CancelReason::Requested);
                return;
            }

            if self.controller.is_pause_requested() {
                self.suspend().await;
                continue;
            }

            let Some(index) = self.next_job() else {
                self.finish();
                return;
            };

            match self.run_job(index).await {
                JobOutcome::Settled => {
                    let remaining = self.state().has_remaining();
                    if remaining {
                        self.controller
                            .sleep_unless_interrupted(self.config.inter_job_delay())
                            .await;
                    }
                }
                JobOutcome::Requeued | JobOutcome::Interrupted => {}
                JobOutcome::Aborted => {
                    self.cancel_remaining(CancelReason::FatalError);
                    return;
                }
            }
        }
    }

    /// Advance the cursor past settled jobs and return the next one to run
    fn next_job(&self) -> Option<usize> {
        let mut next = None;
        let mut recovered = None;
        {
            let mut state = self.state();
            while state.cursor < state.records.len() {
                let cursor = state.cursor;
                match state.records[cursor].status {
                    JobStatus::Pending => {
                        next = Some(cursor);
                        break;
                    }
                    JobStatus::Running => {
                        // Left running by a dropped start future; run it again
                        let job_id = state.records[cursor].descriptor.id.clone();
                        warn!(job_id = %job_id, "Recovering interrupted job");
                        if let Err(e) = state.records[cursor].withdraw_attempt() {
                            error!(error = %e, "Failed to recover interrupted job");
                            state.cursor += 1;
                            continue;
                        }
                        state.refresh_group(cursor);
                        next = Some(cursor);
                        recovered = Some(job_id);
                        break;
                    }
                    // Rate-limited retries stay pending, so failed jobs are exhausted
                    JobStatus::Succeeded | JobStatus::Skipped | JobStatus::Failed => {
                        state.cursor += 1;
                    }
                }
            }
        }

        if let Some(job_id) = recovered {
            self.report(ProgressEvent::AttemptWithdrawn { job_id });
        }
        next
    }

    async fn run_job(&self, index: usize) -> JobOutcome {
        let begun = {
            let mut state = self.state();
            let now = self.time_provider.now_millis();
            let record = &mut state.records[index];
            match record.begin_attempt(now) {
                Ok(()) => {
                    let started = (record.descriptor.clone(), record.attempt);
                    state.refresh_group(index);
                    Ok(started)
                }
                Err(e) => {
                    state.cursor = index + 1;
                    Err(e)
                }
            }
        };
        let (descriptor, attempt) = match begun {
            Ok(started) => started,
            Err(e) => {
                error!(error = %e, "Job could not start; moving on");
                return JobOutcome::Settled;
            }
        };

        info!(
            job_id = %descriptor.id,
            group_key = %descriptor.group_key,
            order_key = descriptor.order_key,
            attempt = attempt,
            "Processing job"
        );
        self.report(ProgressEvent::JobStarted {
            job_id: descriptor.id.clone(),
            order_key: descriptor.order_key,
            attempt,
        });

        if attempt > 1 {
            let delay = self.retry_policy.backoff_for(attempt);
            debug!(
                job_id = %descriptor.id,
                delay_ms = delay.as_millis() as u64,
                "Waiting before retry"
            );
            if !self.controller.sleep_unless_interrupted(delay).await {
                self.withdraw(index);
                return JobOutcome::Interrupted;
            }
        }

        match self.execute(&descriptor).await {
            Ok(artifact) => {
                self.complete(index, artifact);
                JobOutcome::Settled
            }
            Err(err) => self.handle_failure(index, err),
        }
    }

    /// Generate then persist; both failures share the port error taxonomy
    async fn execute(&self, descriptor: &JobDescriptor) -> std::result::Result<Artifact, PortError> {
        let artifact = self.generator.generate(&descriptor.payload).await?;

        if let Err(err) = self.store.persist(descriptor, &artifact).await {
            warn!(job_id = %descriptor.id, error = %err, "Persisting artifact failed");
            return Err(match self.config.persistence_failure {
                PersistenceFailurePolicy::Classified => err,
                PersistenceFailurePolicy::Terminal => {
                    PortError::Transient(format!("persistence failed: {}", err.message()))
                }
            });
        }

        Ok(artifact)
    }

    fn complete(&self, index: usize, artifact: Artifact) {
        let job_id = {
            let mut state = self.state();
            let now = self.time_provider.now_millis();
            let record = &mut state.records[index];
            if let Err(e) = record.succeed(artifact, now) {
                error!(job_id = %record.id(), error = %e, "Rejected job transition");
            } else {
                state.succeeded_count += 1;
            }
            state.cursor = index + 1;
            state.refresh_group(index);
            state.records[index].descriptor.id.clone()
        };

        info!(job_id = %job_id, "Job completed");
        self.report(ProgressEvent::JobSucceeded { job_id });
    }

    fn handle_failure(&self, index: usize, err: PortError) -> JobOutcome {
        let job_error = JobError::from(&err);
        let (outcome, event) = {
            let mut state = self.state();
            let now = self.time_provider.now_millis();
            let decision = match err.kind() {
                ErrorKind::RateLimited => self.retry_policy.should_retry(&state.records[index]),
                ErrorKind::Fatal | ErrorKind::Transient => RetryDecision::Exhausted,
            };

            let record = &mut state.records[index];
            let job_id = record.descriptor.id.clone();
            let result = match decision {
                RetryDecision::Retry(delay) => {
                    if let Err(e) = record.requeue(job_error.clone()) {
                        error!(job_id = %job_id, error = %e, "Rejected job transition");
                    }
                    let event = ProgressEvent::JobRequeued {
                        job_id,
                        attempt: record.attempt,
                        delay_ms: delay.as_millis() as u64,
                        message: job_error.message.clone(),
                    };
                    (JobOutcome::Requeued, event)
                }
                RetryDecision::Exhausted => {
                    if let Err(e) = record.fail(job_error.clone(), now) {
                        error!(job_id = %job_id, error = %e, "Rejected job transition");
                    }
                    state.failed_count += 1;
                    state.cursor = index + 1;
                    let outcome = match err.kind() {
                        ErrorKind::Fatal => JobOutcome::Aborted,
                        ErrorKind::RateLimited | ErrorKind::Transient => JobOutcome::Settled,
                    };
                    let event = ProgressEvent::JobFailed {
                        job_id,
                        kind: job_error.kind,
                        message: job_error.message.clone(),
                    };
                    (outcome, event)
                }
            };
            state.refresh_group(index);
            result
        };

        match &event {
            ProgressEvent::JobRequeued { job_id, .. } => {
                warn!(job_id = %job_id, error = %err, "Job rate limited; will retry")
            }
            ProgressEvent::JobFailed { job_id, .. } => {
                error!(job_id = %job_id, error = %err, "Job failed")
            }
            _ => {}
        }
        self.report(event);
        outcome
    }

    /// Undo an attempt whose backoff was interrupted
    fn withdraw(&self, index: usize) {
        let job_id = {
            let mut state = self.state();
            let record = &mut state.records[index];
            if let Err(e) = record.withdraw_attempt() {
                error!(job_id = %record.id(), error = %e, "Rejected job transition");
            }
            state.refresh_group(index);
            state.records[index].descriptor.id.clone()
        };

        debug!(job_id = %job_id, "Retry backoff interrupted");
        self.report(ProgressEvent::AttemptWithdrawn { job_id });
    }

    /// Paused wait; the phase flips only once the loop is actually suspended
    async fn suspend(&self) {
        self.controller.set_phase(RunPhase::Paused);
        info!(cursor = self.state().cursor, "Run paused");
        self.report(ProgressEvent::RunPaused);

        self.controller
            .wait_until_resumed(self.config.pause_poll_interval())
            .await;

        if self.controller.is_cancel_requested() {
            return;
        }
        self.controller.set_phase(RunPhase::Running);
        info!("Run resumed");
        self.report(ProgressEvent::RunResumed);
    }

    /// Skip every pending job in one pass and mark the run cancelled
    fn cancel_remaining(&self, reason: CancelReason) {
        let skipped = {
            let mut state = self.state();
            let now = self.time_provider.now_millis();
            let mut skipped = 0;
            for record in state.records.iter_mut() {
                // Only a dropped start future can leave a job running here
                if record.status == JobStatus::Running {
                    let _ = record.withdraw_attempt();
                }
                if record.status == JobStatus::Pending && record.skip(now).is_ok() {
                    skipped += 1;
                }
            }
            let RunState {
                groups, records, ..
            } = &mut *state;
            groups.refresh_all(records);
            self.controller.set_phase(RunPhase::Cancelled);
            skipped
        };

        warn!(reason = ?reason, skipped = skipped, "Run cancelled");
        self.report(ProgressEvent::RunCancelled { reason, skipped });
    }

    fn finish(&self) {
        self.controller.set_phase(RunPhase::Finished);
        let stats = self.stats();
        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "Run finished"
        );
        self.report(ProgressEvent::RunFinished);
    }

    fn stats_of(&self, state: &RunState) -> RunStats {
        let mut stats = RunStats {
            phase: self.controller.phase(),
            cursor: state.cursor,
            total: state.records.len(),
            pending: 0,
            running: 0,
            succeeded: state.succeeded_count,
            failed: state.failed_count,
            skipped: 0,
            never_attempted: 0,
            current_job: None,
        };
        for record in &state.records {
            match record.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => {
                    stats.running += 1;
                    stats.current_job = Some(record.descriptor.id.clone());
                }
                JobStatus::Skipped => {
                    stats.skipped += 1;
                    if !record.was_attempted() {
                        stats.never_attempted += 1;
                    }
                }
                JobStatus::Succeeded | JobStatus::Failed => {}
            }
        }
        stats
    }

    /// Fire-and-forget notification with a consistent snapshot
    fn report(&self, event: ProgressEvent) {
        let snapshot = self.snapshot(event);
        self.reporter.on_progress(&snapshot);
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
