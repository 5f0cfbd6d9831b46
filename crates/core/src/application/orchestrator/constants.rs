// Orchestrator constants (No magic values)
use std::time::Duration;

/// Pacing delay between jobs, keeps the generator under its rate limit (5s)
pub const DEFAULT_INTER_JOB_DELAY_MS: u64 = 5000;

/// Retries after the first attempt for rate-limited jobs
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Delay before a retried attempt (30s)
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 30_000;

/// Backoff multiplier per further retry (1.0 = fixed backoff)
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;

/// Poll interval of the paused wait (250ms)
pub const DEFAULT_PAUSE_POLL_INTERVAL_MS: u64 = 250;

/// Upper bound accepted for any configured delay (1 hour)
pub const MAX_CONFIGURED_DELAY: Duration = Duration::from_secs(60 * 60);
