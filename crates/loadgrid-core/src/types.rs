//! Domain types shared across the grid.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Unique identifier for a job.
pub type JobId = u64;

/// Unique identifier for a node in the cluster.
pub type NodeId = u32;

// ── Job ────────────────────────────────────────────────────────────

/// A unit of work with a CPU demand and a declared runtime.
///
/// Jobs are immutable once created. A job that cannot be placed is
/// re-queued unchanged; retry bookkeeping lives in the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: JobId,
    cpu_demand: u32,
    duration: Duration,
}

impl Job {
    /// Create a job. The CPU demand must be strictly positive.
    pub fn new(id: JobId, cpu_demand: u32, duration: Duration) -> Result<Self, JobError> {
        if cpu_demand == 0 {
            return Err(JobError::ZeroDemand(id));
        }
        Ok(Self {
            id,
            cpu_demand,
            duration,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn cpu_demand(&self) -> u32 {
        self.cpu_demand
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

// ── Node ───────────────────────────────────────────────────────────

/// Static description of a node: its identifier and fixed CPU capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub capacity: u32,
}

impl NodeSpec {
    pub fn new(id: NodeId, capacity: u32) -> Self {
        Self { id, capacity }
    }
}

// ── Metrics ────────────────────────────────────────────────────────

/// A single occupancy observation for a node.
///
/// Produced by sampling and consumed once by the load window update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSample {
    pub node_id: NodeId,
    pub used: u32,
    pub capacity: u32,
    /// Unix timestamp (milliseconds) of the observation.
    pub observed_at: u64,
}

impl MetricSample {
    /// A sample stamped with the current wall-clock time.
    pub fn now(node_id: NodeId, used: u32, capacity: u32) -> Self {
        Self {
            node_id,
            used,
            capacity,
            observed_at: epoch_millis(),
        }
    }
}

/// Current Unix epoch in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_rejects_zero_demand() {
        let err = Job::new(7, 0, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, JobError::ZeroDemand(7)));
    }

    #[test]
    fn job_accessors() {
        let job = Job::new(1, 3, Duration::from_millis(250)).unwrap();
        assert_eq!(job.id(), 1);
        assert_eq!(job.cpu_demand(), 3);
        assert_eq!(job.duration(), Duration::from_millis(250));
    }

    #[test]
    fn sample_is_timestamped() {
        let sample = MetricSample::now(2, 4, 8);
        // Should be after 2024-01-01.
        assert!(sample.observed_at > 1_704_067_200_000);
        assert_eq!(sample.node_id, 2);
    }
}
