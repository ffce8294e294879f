//! # Retry Policy
//!
//! Maps a send outcome to a retry-or-fail decision and computes the linear
//! backoff between attempts.
//!
//! Attempts are counted from zero: the first run of a job is attempt 0.
//!
//! | Outcome                  | attempt < max | attempt >= max |
//! |--------------------------|---------------|----------------|
//! | HTTP 200                 | Success       | Success        |
//! | HTTP 500-599             | Retry         | Retry          |
//! | other status / any error | Retry         | Failure        |

use std::time::Duration;

/// Default number of retries after the first run
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Longest delay the backoff will ever produce
pub const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60 * 60);

const HTTP_OK: u16 = 200;

/// Outcome of one job run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkResult {
    Success,
    Retry,
    Failure,
}

/// Decision for an error or unexpected response
pub fn handle_error(run_attempt_count: u32, max_retry_attempts: u32) -> WorkResult {
    if run_attempt_count < max_retry_attempts {
        WorkResult::Retry
    } else {
        WorkResult::Failure
    }
}

/// Decision for an HTTP status code
pub fn classify_response(
    status: u16,
    run_attempt_count: u32,
    max_retry_attempts: u32,
) -> WorkResult {
    match status {
        HTTP_OK => WorkResult::Success,
        500..=599 => WorkResult::Retry,
        _ => handle_error(run_attempt_count, max_retry_attempts),
    }
}

/// Linear backoff: the n-th retry waits `n * delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    delay: Duration,
}

impl LinearBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delay before running attempt `run_attempt_count`, capped at [`MAX_BACKOFF`]
    pub fn delay_for(&self, run_attempt_count: u32) -> Duration {
        self.delay
            .checked_mul(run_attempt_count)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}
