// Retry logic for rate-limited generation attempts
use crate::application::orchestrator::OrchestratorConfig;
use crate::domain::JobRecord;
use std::time::Duration;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the job back to pending; the next attempt waits this long
    Retry(Duration),
    /// Retries exhausted, job has failed permanently
    Exhausted,
}

/// Retry policy
///
/// `max_retries` counts retries after the first attempt, so a job that is
/// only ever rate limited is attempted `max_retries + 1` times.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    backoff_factor: f64,
    max_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_retries` - Retries allowed after the first attempt
    /// * `base_delay` - Delay before the first retry
    /// * `backoff_factor` - Multiplier applied per further retry (1.0 = fixed delay)
    pub fn new(max_retries: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_factor,
            max_delay: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let policy = Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
            config.backoff_factor,
        );
        match config.max_backoff_ms {
            Some(max) => policy.with_max_delay(Duration::from_millis(max)),
            None => policy,
        }
    }

    /// Decide what happens to a job whose latest attempt was rate limited
    pub fn should_retry(&self, record: &JobRecord) -> RetryDecision {
        let retries_used = record.attempt.saturating_sub(1);
        if retries_used >= self.max_retries {
            warn!(
                job_id = %record.id(),
                attempt = record.attempt,
                max_retries = self.max_retries,
                "Max retry attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        let delay = self.backoff_for(record.attempt + 1);
        info!(
            job_id = %record.id(),
            attempt = record.attempt,
            max_retries = self.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Scheduling retry"
        );
        RetryDecision::Retry(delay)
    }

    /// Backoff to wait before the given attempt number
    ///
    /// delay = base_delay * (backoff_factor ^ (attempt - 2)), zero for the first attempt
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 2).min(i32::MAX as u32) as i32;
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let millis = (self.base_delay.as_millis() as f64 * factor).min(u64::MAX as f64) as u64;
        let delay = Duration::from_millis(millis);

        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobDescriptor, JobPayload};

    fn record_with_attempts(attempts: u32) -> JobRecord {
        let mut record = JobRecord::new(JobDescriptor::new(
            "j1",
            "unit-1",
            1,
            JobPayload::new(serde_json::json!({})),
        ));
        record.attempt = attempts;
        record
    }

    #[test]
    fn test_retry_until_max_retries_used() {
        let policy = RetryPolicy::new(2, Duration::from_millis(30_000), 1.0);

        assert_eq!(
            policy.should_retry(&record_with_attempts(1)),
            RetryDecision::Retry(Duration::from_millis(30_000))
        );
        assert_eq!(
            policy.should_retry(&record_with_attempts(2)),
            RetryDecision::Retry(Duration::from_millis(30_000))
        );
        assert_eq!(
            policy.should_retry(&record_with_attempts(3)),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn test_zero_retries_exhausts_immediately() {
        let policy = RetryPolicy::new(0, Duration::from_millis(100), 1.0);
        assert_eq!(
            policy.should_retry(&record_with_attempts(1)),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn test_first_attempt_has_no_backoff() {
        let policy = RetryPolicy::new(2, Duration::from_millis(500), 2.0);
        assert_eq!(policy.backoff_for(0), Duration::ZERO);
        assert_eq!(policy.backoff_for(1), Duration::ZERO);
    }

    #[test]
    fn test_exponential_backoff_with_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1000), 2.0)
            .with_max_delay(Duration::from_millis(3000));

        assert_eq!(policy.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(3000));
        assert_eq!(policy.backoff_for(10), Duration::from_millis(3000));
    }

    #[test]
    fn test_from_config_uses_fixed_backoff_by_default() {
        let policy = RetryPolicy::from_config(&OrchestratorConfig::default());
        assert_eq!(
            policy.should_retry(&record_with_attempts(3)),
            RetryDecision::Exhausted
        );
        assert_eq!(policy.backoff_for(2), Duration::from_millis(30_000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(30_000));
    }
}
