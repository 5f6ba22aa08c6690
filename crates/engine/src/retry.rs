use std::time::Duration;

use crate::outcome::FailureReason;

/// How many times to try a batch and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `max_retries` counts attempts, including the first. Zero still allows
    /// one attempt.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_retries.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Retry immediately; for tests and local endpoints.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound of the wait after failed attempt `attempt` (1-based):
    /// `base * 2^(attempt-1)`, capped at the max delay.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Full jitter: a `jitter` fraction (0..1) of the ceiling. A server's
    /// `Retry-After` raises the wait, still capped at the max delay.
    pub fn delay(&self, attempt: u32, jitter: f64, retry_after: Option<Duration>) -> Duration {
        let jittered = self.ceiling(attempt).mul_f64(jitter.clamp(0.0, 1.0));
        match retry_after {
            Some(hint) => jittered.max(hint).min(self.max_delay),
            None => jittered,
        }
    }
}

/// What one attempt produced, as far as retrying is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    Delivered,
    Transient {
        error: String,
        retry_after: Option<Duration>,
    },
    Permanent(FailureReason),
}

/// Per-batch retry state.
///
/// ```text
/// Attempting(n) --Delivered--> Delivered
/// Attempting(n) --Permanent--> GaveUp
/// Attempting(n) --Transient, n < max--> Backoff(n) --resume--> Attempting(n+1)
/// Attempting(n) --Transient, n = max--> GaveUp(RetriesExhausted)
/// Backoff(n) --cancel--> GaveUp(Cancelled)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    Attempting {
        attempt: u32,
    },
    Backoff {
        attempt: u32,
        delay: Duration,
        last_error: String,
    },
    Delivered {
        attempts: u32,
    },
    GaveUp {
        attempts: u32,
        reason: FailureReason,
    },
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting { attempt: 1 }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Delivered { .. } | RetryState::GaveUp { .. })
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryState::Attempting { attempt } => attempt - 1,
            RetryState::Backoff { attempt, .. } => *attempt,
            RetryState::Delivered { attempts } | RetryState::GaveUp { attempts, .. } => *attempts,
        }
    }

    /// Feed the result of the current attempt. Only meaningful while
    /// `Attempting`; other states are returned unchanged.
    pub fn on_event(self, event: AttemptEvent, policy: &RetryPolicy, jitter: f64) -> Self {
        let RetryState::Attempting { attempt } = self else {
            debug_assert!(false, "attempt result fed to {self:?}");
            return self;
        };

        match event {
            AttemptEvent::Delivered => RetryState::Delivered { attempts: attempt },
            AttemptEvent::Permanent(reason) => RetryState::GaveUp {
                attempts: attempt,
                reason,
            },
            AttemptEvent::Transient { error, .. } if attempt >= policy.max_attempts() => {
                RetryState::GaveUp {
                    attempts: attempt,
                    reason: FailureReason::RetriesExhausted {
                        attempts: attempt,
                        last_error: error,
                    },
                }
            }
            AttemptEvent::Transient { error, retry_after } => RetryState::Backoff {
                attempt,
                delay: policy.delay(attempt, jitter, retry_after),
                last_error: error,
            },
        }
    }

    /// Leave backoff for the next attempt.
    pub fn resume(self) -> Self {
        match self {
            RetryState::Backoff { attempt, .. } => RetryState::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    /// Stop retrying. Terminal states are kept.
    pub fn cancel(self) -> Self {
        if self.is_terminal() {
            return self;
        }
        RetryState::GaveUp {
            attempts: self.attempts(),
            reason: FailureReason::Cancelled,
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
