// Port Error Taxonomy
// Adapters classify transport failures before they reach the orchestrator

use crate::domain::{ErrorKind, JobError};
use thiserror::Error;

/// Classified failure surfaced by a remote port
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The remote service signaled throttling; retryable with backoff
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Unrecoverable at the run level (billing, authorization)
    #[error("Fatal: {0}")]
    Fatal(String),

    /// Anything else; fails only the current job
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl PortError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortError::RateLimited(_) => ErrorKind::RateLimited,
            PortError::Fatal(_) => ErrorKind::Fatal,
            PortError::Transient(_) => ErrorKind::Transient,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PortError::RateLimited(msg) | PortError::Fatal(msg) | PortError::Transient(msg) => msg,
        }
    }
}

impl From<&PortError> for JobError {
    fn from(err: &PortError) -> Self {
        JobError::new(err.kind(), err.message())
    }
}
