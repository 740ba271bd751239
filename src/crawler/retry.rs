//! Retry and backoff decisions for failed fetches
//!
//! The policy is pure: given how many attempts a task has made and how the
//! last one failed, it says whether to try again and after what delay.
//!
//! | Failure | Attempts | Decision |
//! |---------|----------|----------|
//! | Permanent | any | Abandon |
//! | Retryable | `< max_attempts` | Retry after `min(cap, base * 2^(attempts-1))` |
//! | Retryable | `>= max_attempts` | Abandon (retries exhausted) |

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::FailureReason;
use std::fmt;
use std::time::Duration;

/// Why a task ended up abandoned, or how a fetch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    MalformedIdentifier,
    RetryableFetch,
    PermanentFetch,
    RetryExhausted,
    Persistence,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MalformedIdentifier => "malformed identifier",
            Self::RetryableFetch => "retryable fetch failure",
            Self::PermanentFetch => "permanent fetch failure",
            Self::RetryExhausted => "retries exhausted",
            Self::Persistence => "persistence failure",
        };
        f.write_str(s)
    }
}

/// A classified fetch failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Retryable(FailureReason),
    Permanent(FailureReason),
}

impl Failure {
    pub fn reason(&self) -> &FailureReason {
        match self {
            Self::Retryable(reason) | Self::Permanent(reason) => reason,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Retryable(_) => FailureKind::RetryableFetch,
            Self::Permanent(FailureReason::MalformedIdentifier(_)) => {
                FailureKind::MalformedIdentifier
            }
            Self::Permanent(_) => FailureKind::PermanentFetch,
        }
    }
}

impl From<FailureReason> for Failure {
    fn from(reason: FailureReason) -> Self {
        if reason.is_retryable() {
            Self::Retryable(reason)
        } else {
            Self::Permanent(reason)
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason(), self.kind())
    }
}

/// What to do with a task after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-admit the task after the delay
    Retry(Duration),

    /// Give up, counting the task under this kind
    Abandon(FailureKind),
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_cap: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base,
            backoff_cap,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_base(),
            config.backoff_cap(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the attempt that follows attempt number `attempts`
    ///
    /// Grows as `base * 2^(attempts-1)` and saturates at the cap.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;

        self.backoff_base
            .checked_mul(factor)
            .map_or(self.backoff_cap, |delay| delay.min(self.backoff_cap))
    }

    /// Decides the fate of a task whose attempt number `attempts` just failed
    pub fn next_action(&self, attempts: u32, failure: &Failure) -> RetryDecision {
        match failure {
            Failure::Permanent(_) => RetryDecision::Abandon(failure.kind()),
            Failure::Retryable(_) if attempts >= self.max_attempts => {
                RetryDecision::Abandon(FailureKind::RetryExhausted)
            }
            Failure::Retryable(_) => RetryDecision::Retry(self.delay_for(attempts)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}
