use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay function of a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    Fixed { delay_ms: u64 },
    Exponential { initial_ms: u64, max_ms: u64 },
}

/// Bounded retry policy: at most `max_attempts` retries, spaced by `backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed {
                delay_ms: delay.as_millis() as u64,
            },
        }
    }

    pub const fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                initial_ms: initial.as_millis() as u64,
                max_ms: max.as_millis() as u64,
            },
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` once the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let ms = match self.backoff {
            Backoff::Fixed { delay_ms } => delay_ms,
            Backoff::Exponential { initial_ms, max_ms } => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                initial_ms.saturating_mul(factor).min(max_ms)
            }
        };
        Some(Duration::from_millis(ms))
    }

    pub fn start(self) -> RetryState {
        RetryState {
            policy: self,
            attempts: 0,
        }
    }
}

/// Attempt counter over a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    /// Consumes one attempt and returns its delay, or `None` when exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.policy.delay_for(self.attempts + 1)?;
        self.attempts += 1;
        Some(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
