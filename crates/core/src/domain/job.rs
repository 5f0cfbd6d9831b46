// Job Domain Model

use super::error::{DomainError, Result};
use super::group::GroupKey;
use serde::{Deserialize, Serialize};

/// Job ID (opaque, unique within a run)
pub type JobId = String;

/// Processing order within a run (ascending)
pub type OrderKey = i64;

/// Job Payload, forwarded verbatim to the generation port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Generated content returned by the generation port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact(serde_json::Value);

impl Artifact {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// Error class as seen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    Fatal,
    Transient,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::RateLimited => write!(f, "rate_limited"),
            ErrorKind::Fatal => write!(f, "fatal"),
            ErrorKind::Transient => write!(f, "transient"),
        }
    }
}

/// Classified error recorded on a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Immutable description of one unit of generation work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub group_key: GroupKey,
    pub order_key: OrderKey,
    pub payload: JobPayload,
}

impl JobDescriptor {
    pub fn new(
        id: impl Into<String>,
        group_key: impl Into<String>,
        order_key: OrderKey,
        payload: JobPayload,
    ) -> Self {
        Self {
            id: id.into(),
            group_key: group_key.into(),
            order_key,
            payload,
        }
    }
}

/// Job Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Skipped
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Job Record: a descriptor plus its mutable run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub descriptor: JobDescriptor,
    pub status: JobStatus,
    pub attempt: u32,
    pub last_error: Option<JobError>,
    pub artifact: Option<Artifact>,

    pub started_at: Option<i64>, // epoch ms, first attempt
    pub finished_at: Option<i64>,
}

impl JobRecord {
    pub fn new(descriptor: JobDescriptor) -> Self {
        Self {
            descriptor,
            status: JobStatus::Pending,
            attempt: 0,
            last_error: None,
            artifact: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn group_key(&self) -> &str {
        &self.descriptor.group_key
    }

    /// True once the job has been handed to the generation port at least once
    pub fn was_attempted(&self) -> bool {
        self.attempt > 0
    }

    /// PENDING -> RUNNING, counting a new attempt
    pub fn begin_attempt(&mut self, now_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Pending, JobStatus::Running)?;
        self.status = JobStatus::Running;
        self.attempt += 1;
        self.started_at.get_or_insert(now_millis);
        Ok(())
    }

    /// RUNNING -> PENDING, undoing an attempt that never reached the port
    pub fn withdraw_attempt(&mut self) -> Result<()> {
        self.expect_status(JobStatus::Running, JobStatus::Pending)?;
        self.status = JobStatus::Pending;
        self.attempt = self.attempt.saturating_sub(1);
        if self.attempt == 0 {
            self.started_at = None;
        }
        Ok(())
    }

    /// RUNNING -> PENDING, keeping the attempt so the retry bound holds
    pub fn requeue(&mut self, error: JobError) -> Result<()> {
        self.expect_status(JobStatus::Running, JobStatus::Pending)?;
        self.status = JobStatus::Pending;
        self.last_error = Some(error);
        Ok(())
    }

    /// RUNNING -> SUCCEEDED
    pub fn succeed(&mut self, artifact: Artifact, now_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Running, JobStatus::Succeeded)?;
        self.status = JobStatus::Succeeded;
        self.artifact = Some(artifact);
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// RUNNING -> FAILED
    pub fn fail(&mut self, error: JobError, now_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Running, JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.last_error = Some(error);
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// PENDING -> SKIPPED
    pub fn skip(&mut self, now_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Pending, JobStatus::Skipped)?;
        self.status = JobStatus::Skipped;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    fn expect_status(&self, expected: JobStatus, to: JobStatus) -> Result<()> {
        if self.status != expected {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
