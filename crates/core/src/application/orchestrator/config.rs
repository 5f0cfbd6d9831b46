// Orchestrator configuration

use super::constants::*;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a persistence failure does to the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceFailurePolicy {
    /// The persistence error's class drives the same retry policy as generation
    #[default]
    Classified,
    /// Any persistence failure fails the job on first occurrence
    Terminal,
}

/// Orchestrator configuration (supplied at construction)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub inter_job_delay_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub backoff_factor: f64,
    pub max_backoff_ms: Option<u64>,
    pub pause_poll_interval_ms: u64,
    pub persistence_failure: PersistenceFailurePolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            inter_job_delay_ms: DEFAULT_INTER_JOB_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_backoff_ms: None,
            pause_poll_interval_ms: DEFAULT_PAUSE_POLL_INTERVAL_MS,
            persistence_failure: PersistenceFailurePolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Reject values the drain loop cannot honor
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(AppError::Config(format!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            )));
        }

        if self.pause_poll_interval_ms == 0 {
            return Err(AppError::Config(
                "pause_poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        let max_ms = MAX_CONFIGURED_DELAY.as_millis() as u64;
        for (name, value) in [
            ("inter_job_delay_ms", Some(self.inter_job_delay_ms)),
            ("retry_backoff_ms", Some(self.retry_backoff_ms)),
            ("max_backoff_ms", self.max_backoff_ms),
        ] {
            if let Some(ms) = value {
                if ms > max_ms {
                    return Err(AppError::Config(format!(
                        "{} must be at most {}ms, got {}",
                        name, max_ms, ms
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn inter_job_delay(&self) -> Duration {
        Duration::from_millis(self.inter_job_delay_ms)
    }

    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms)
    }
}
