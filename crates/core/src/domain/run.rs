// Run Domain Model

use super::job::JobId;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Running,
    Paused,
    Cancelled,
    Finished,
}

impl RunPhase {
    /// Cancelled and finished runs never drain again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Cancelled | RunPhase::Finished)
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Running => write!(f, "running"),
            RunPhase::Paused => write!(f, "paused"),
            RunPhase::Cancelled => write!(f, "cancelled"),
            RunPhase::Finished => write!(f, "finished"),
        }
    }
}

/// Point-in-time run statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub phase: RunPhase,
    pub cursor: usize,
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Skipped jobs that never reached the generation port
    pub never_attempted: usize,
    pub current_job: Option<JobId>,
}
