//! Placement events and the broadcast bus that carries them.
//!
//! Conditions the engine handles locally (a retry, a rejected job, a job
//! discarded at shutdown) are published here so callers, counters and
//! tests can observe them without scraping logs.

use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::types::{JobId, NodeId};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Why a job reached a terminal rejection instead of being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The demand exceeds the capacity of every node in the cluster.
    ExceedsClusterCapacity { demand: u32, max_capacity: u32 },
    /// The job failed placement `attempts` times.
    RetriesExhausted { attempts: u32 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExceedsClusterCapacity {
                demand,
                max_capacity,
            } => write!(
                f,
                "demand {demand} exceeds largest node capacity {max_capacity}"
            ),
            Self::RetriesExhausted { attempts } => {
                write!(f, "no feasible node after {attempts} attempts")
            }
        }
    }
}

/// Something that happened to a job on its way through the grid.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// The scheduler chose `node_id` for the job.
    Assigned {
        job_id: JobId,
        node_id: NodeId,
        score: f64,
    },
    /// No node was feasible; the job goes back to the arrival queue.
    RetryScheduled {
        job_id: JobId,
        attempt: u32,
        backoff: Duration,
    },
    /// The job will never be placed.
    Rejected { job_id: JobId, reason: RejectReason },
    /// A node dequeued the job and began executing it.
    Started { job_id: JobId, node_id: NodeId },
    /// The job finished executing and its demand was released.
    Completed { job_id: JobId, node_id: NodeId },
    /// The executor returned an error; the demand was still released.
    ExecutionFailed {
        job_id: JobId,
        node_id: NodeId,
        error: String,
    },
    /// The job was discarded at shutdown, either from a node queue or from
    /// the arrival queue (`node_id` is `None`).
    Dropped {
        job_id: JobId,
        node_id: Option<NodeId>,
    },
}

impl GridEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Assigned { job_id, .. }
            | Self::RetryScheduled { job_id, .. }
            | Self::Rejected { job_id, .. }
            | Self::Started { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::ExecutionFailed { job_id, .. }
            | Self::Dropped { job_id, .. } => *job_id,
        }
    }
}

/// Cloneable publisher for [`GridEvent`]s.
///
/// Publishing never blocks and never fails: with no subscribers the event
/// is discarded, and slow subscribers observe a lag instead of stalling
/// the scheduler.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GridEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: GridEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(GridEvent::Started {
            job_id: 4,
            node_id: 2,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id(), 4);
        assert!(matches!(event, GridEvent::Started { node_id: 2, .. }));
    }

    #[test]
    fn emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.emit(GridEvent::Dropped {
            job_id: 1,
            node_id: None,
        });
    }

    #[test]
    fn reject_reason_display() {
        let reason = RejectReason::ExceedsClusterCapacity {
            demand: 5,
            max_capacity: 4,
        };
        assert_eq!(reason.to_string(), "demand 5 exceeds largest node capacity 4");
        assert_eq!(
            RejectReason::RetriesExhausted { attempts: 3 }.to_string(),
            "no feasible node after 3 attempts"
        );
    }
}
