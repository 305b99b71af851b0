//! Placement counters fed from the grid event stream.
//!
//! Lock-free atomics; the tracking task is the only writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use loadgrid_core::GridEvent;

/// Running totals of placement outcomes.
#[derive(Debug, Default)]
pub struct PlacementCounters {
    assigned: AtomicU64,
    retried: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Plain copy of the counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub assigned: u64,
    pub retried: u64,
    pub rejected: u64,
    pub dropped: u64,
    pub completed: u64,
    pub failed: u64,
}

impl PlacementCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one event.
    pub fn observe(&self, event: &GridEvent) {
        let counter = match event {
            GridEvent::Assigned { .. } => &self.assigned,
            GridEvent::RetryScheduled { .. } => &self.retried,
            GridEvent::Rejected { .. } => &self.rejected,
            GridEvent::Dropped { .. } => &self.dropped,
            GridEvent::Completed { .. } => &self.completed,
            GridEvent::ExecutionFailed { .. } => &self.failed,
            GridEvent::Started { .. } => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            assigned: self.assigned.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Count events from `events` until shutdown signal or until the bus
    /// closes. Events still buffered when the signal fires are counted.
    pub async fn track(
        self: Arc<Self>,
        mut events: broadcast::Receiver<GridEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                received = events.recv() => match received {
                    Ok(event) => self.observe(&event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "placement counters lagged behind event stream");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.changed() => {
                    self.drain(&mut events);
                    break;
                }
            }
        }
        debug!("placement counter tracking stopped");
    }

    /// Count whatever is still buffered, skipping past any lag.
    fn drain(&self, events: &mut broadcast::Receiver<GridEvent>) {
        loop {
            match events.try_recv() {
                Ok(event) => self.observe(&event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "placement counters lagged behind event stream");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use loadgrid_core::{EventBus, RejectReason};

    use super::*;

    #[test]
    fn observe_counts_by_kind() {
        let counters = PlacementCounters::new();
        counters.observe(&GridEvent::Assigned {
            job_id: 1,
            node_id: 1,
            score: 5.0,
        });
        counters.observe(&GridEvent::RetryScheduled {
            job_id: 2,
            attempt: 1,
            backoff: Duration::from_millis(300),
        });
        counters.observe(&GridEvent::Rejected {
            job_id: 3,
            reason: RejectReason::RetriesExhausted { attempts: 2 },
        });
        counters.observe(&GridEvent::Started { job_id: 1, node_id: 1 });
        counters.observe(&GridEvent::Completed { job_id: 1, node_id: 1 });

        assert_eq!(
            counters.snapshot(),
            CounterSnapshot {
                assigned: 1,
                retried: 1,
                rejected: 1,
                dropped: 0,
                completed: 1,
                failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn track_counts_until_shutdown() {
        let bus = EventBus::new();
        let counters = Arc::new(PlacementCounters::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(counters.clone().track(bus.subscribe(), shutdown_rx));

        for job_id in 0..3 {
            bus.emit(GridEvent::Dropped {
                job_id,
                node_id: None,
            });
        }
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(counters.snapshot().dropped, 3);
    }

    #[test]
    fn drain_counts_events_buffered_after_lag() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for job_id in 0..5 {
            bus.emit(GridEvent::Dropped {
                job_id,
                node_id: None,
            });
        }

        let counters = PlacementCounters::new();
        counters.drain(&mut rx);

        assert_eq!(counters.snapshot().dropped, 2);
    }
}
