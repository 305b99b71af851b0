//! What happens to a job that fit no node.

use std::time::Duration;

use loadgrid_core::{GridConfig, RejectReason};

/// Outcome of a failed placement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue the job after `backoff`. `attempt` counts failed attempts
    /// so far, starting at 1.
    Retry { attempt: u32, backoff: Duration },
    Reject(RejectReason),
}

/// Backoff and termination rules for unplaceable jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: Duration,
    max_attempts: Option<u32>,
    reject_oversized: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(300),
            max_attempts: None,
            reject_oversized: true,
        }
    }
}

impl RetryPolicy {
    /// Retry forever with a fixed `backoff`, whatever the demand.
    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            backoff,
            max_attempts: None,
            reject_oversized: false,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self {
            backoff: config.backoff(),
            max_attempts: config.retry.max_attempts,
            reject_oversized: config.retry.reject_oversized,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_reject_oversized(mut self, reject: bool) -> Self {
        self.reject_oversized = reject;
        self
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Decide the fate of a job of `demand` that has now failed placement
    /// `attempt` times in a cluster whose largest node is `max_capacity`.
    pub fn decide(&self, demand: u32, attempt: u32, max_capacity: u32) -> RetryDecision {
        if self.reject_oversized && demand > max_capacity {
            return RetryDecision::Reject(RejectReason::ExceedsClusterCapacity {
                demand,
                max_capacity,
            });
        }
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return RetryDecision::Reject(RejectReason::RetriesExhausted { attempts: attempt });
            }
        }
        RetryDecision::Retry {
            attempt,
            backoff: self.backoff,
        }
    }
}
