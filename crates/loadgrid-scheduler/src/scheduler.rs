//! Scheduler: the placement loop.
//!
//! A single task consumes the arrival queue. For each job it reads every
//! node's occupancy (one node lock at a time), predicts load from the
//! node's window, and picks the best feasible node. The hand-off to the
//! node's queue and the retry backoff both run on short-lived tasks so a
//! full node queue or a sleeping retry never stalls dispatch of other jobs.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use loadgrid_core::{AdmissionMode, EventBus, GridConfig, GridEvent, Job};
use loadgrid_metrics::LoadWindows;
use loadgrid_node::Node;
use loadgrid_placement::{NodeLoad, NodeScore, ScoringWeights, predict_load, select_best};

use crate::error::{SchedulerError, SchedulerResult};
use crate::retry::{RetryDecision, RetryPolicy};

/// A job in the arrival queue with the number of placements it has failed.
#[derive(Debug)]
struct PendingJob {
    job: Job,
    attempts: u32,
}

/// Cloneable handle for feeding jobs to the scheduler.
#[derive(Debug, Clone)]
pub struct JobSubmitter {
    tx: mpsc::Sender<PendingJob>,
}

impl JobSubmitter {
    /// Queue a job for placement, waiting while the arrival queue is full.
    pub async fn submit(&self, job: Job) -> SchedulerResult<()> {
        self.tx
            .send(PendingJob { job, attempts: 0 })
            .await
            .map_err(|e| SchedulerError::Closed(e.0.job))
    }

    /// Queue a job without waiting.
    pub fn try_submit(&self, job: Job) -> SchedulerResult<()> {
        self.tx
            .try_send(PendingJob { job, attempts: 0 })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(p) => SchedulerError::QueueFull(p.job),
                mpsc::error::TrySendError::Closed(p) => SchedulerError::Closed(p.job),
            })
    }
}

/// Places arriving jobs on nodes.
pub struct Scheduler {
    nodes: Vec<Arc<Node>>,
    windows: LoadWindows,
    weights: ScoringWeights,
    retry: RetryPolicy,
    admission: AdmissionMode,
    events: EventBus,
    max_capacity: u32,
    arrivals_tx: mpsc::Sender<PendingJob>,
    arrivals_rx: mpsc::Receiver<PendingJob>,
}

impl Scheduler {
    /// Create a scheduler over `nodes`, visited in the given order.
    ///
    /// Defaults: reserve admission, 0.7/0.3 weights, the default
    /// [`RetryPolicy`].
    pub fn new(
        nodes: Vec<Arc<Node>>,
        windows: LoadWindows,
        events: EventBus,
        queue_depth: usize,
    ) -> Self {
        let (arrivals_tx, arrivals_rx) = mpsc::channel(queue_depth.max(1));
        let max_capacity = nodes.iter().map(|n| n.capacity()).max().unwrap_or(0);
        Self {
            nodes,
            windows,
            weights: ScoringWeights::default(),
            retry: RetryPolicy::default(),
            admission: AdmissionMode::default(),
            events,
            max_capacity,
            arrivals_tx,
            arrivals_rx,
        }
    }

    pub fn from_config(
        config: &GridConfig,
        nodes: Vec<Arc<Node>>,
        windows: LoadWindows,
        events: EventBus,
    ) -> Self {
        Self::new(nodes, windows, events, config.queues.arrival)
            .with_weights(ScoringWeights::from(&config.scoring))
            .with_retry(RetryPolicy::from_config(config))
            .with_admission(config.admission)
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_admission(mut self, admission: AdmissionMode) -> Self {
        self.admission = admission;
        self
    }

    pub fn submitter(&self) -> JobSubmitter {
        JobSubmitter {
            tx: self.arrivals_tx.clone(),
        }
    }

    /// Score every feasible node for `job` and return the winner, without
    /// reserving or enqueueing anything.
    pub async fn evaluate(&self, job: &Job) -> Option<NodeScore> {
        let mut loads = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            // The snapshot lock is released before the window is read.
            let snap = node.snapshot().await;
            let committed = match self.admission {
                AdmissionMode::Reserve => snap.committed(),
                AdmissionMode::Advisory => snap.used,
            };
            let window = self.windows.window(snap.id).await;
            loads.push(NodeLoad {
                node_id: snap.id,
                capacity: snap.capacity,
                committed,
                predicted_load: predict_load(&window),
            });
        }
        select_best(&loads, job.cpu_demand(), &self.weights)
    }

    /// Run the placement loop until shutdown signal.
    ///
    /// On exit, jobs still waiting in the arrival queue and jobs parked in
    /// a retry backoff are discarded with a `Dropped` event. In-flight
    /// hand-offs are awaited.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            nodes = self.nodes.len(),
            admission = ?self.admission,
            backoff_ms = self.retry.backoff().as_millis() as u64,
            "scheduler started"
        );

        let task_shutdown = shutdown.clone();
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                Some(pending) = self.arrivals_rx.recv() => {
                    self.dispatch(pending, &mut tasks, &task_shutdown).await;
                }
            }
        }

        self.arrivals_rx.close();
        let mut dropped = 0u32;
        while let Ok(pending) = self.arrivals_rx.try_recv() {
            self.events.emit(GridEvent::Dropped {
                job_id: pending.job.id(),
                node_id: None,
            });
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "discarded unplaced jobs on shutdown");
        }

        while tasks.join_next().await.is_some() {}
        debug!("scheduler stopped");
    }

    async fn dispatch(
        &self,
        pending: PendingJob,
        tasks: &mut JoinSet<()>,
        shutdown: &watch::Receiver<bool>,
    ) {
        let job_id = pending.job.id();
        let demand = pending.job.cpu_demand();

        let Some(best) = self.evaluate(&pending.job).await else {
            self.defer(pending, tasks, shutdown);
            return;
        };
        let Some(node) = self.nodes.iter().find(|n| n.id() == best.node_id) else {
            self.defer(pending, tasks, shutdown);
            return;
        };

        let reserved = self.admission == AdmissionMode::Reserve;
        if reserved && !node.try_reserve(demand).await {
            debug!(job_id, node_id = best.node_id, "reservation lost after evaluation");
            self.defer(pending, tasks, shutdown);
            return;
        }

        info!(
            job_id,
            node_id = best.node_id,
            demand,
            score = best.score,
            "job assigned"
        );
        self.events.emit(GridEvent::Assigned {
            job_id,
            node_id: best.node_id,
            score: best.score,
        });

        let node = Arc::clone(node);
        let events = self.events.clone();
        let job = pending.job;
        tasks.spawn(async move {
            let result = if reserved {
                node.submit_reserved(job).await
            } else {
                node.submit(job).await
            };
            if let Err(e) = result {
                warn!(job_id, node_id = node.id(), error = %e, "hand-off failed, job dropped");
                events.emit(GridEvent::Dropped {
                    job_id,
                    node_id: Some(node.id()),
                });
            }
        });
    }

    /// Apply the retry policy to a job that fit nowhere.
    fn defer(&self, pending: PendingJob, tasks: &mut JoinSet<()>, shutdown: &watch::Receiver<bool>) {
        let job_id = pending.job.id();
        let demand = pending.job.cpu_demand();

        match self
            .retry
            .decide(demand, pending.attempts + 1, self.max_capacity)
        {
            RetryDecision::Reject(reason) => {
                warn!(job_id, demand, %reason, "job rejected");
                self.events.emit(GridEvent::Rejected { job_id, reason });
            }
            RetryDecision::Retry { attempt, backoff } => {
                debug!(
                    job_id,
                    demand,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "no feasible node, retrying after backoff"
                );
                self.events.emit(GridEvent::RetryScheduled {
                    job_id,
                    attempt,
                    backoff,
                });

                let tx = self.arrivals_tx.clone();
                let events = self.events.clone();
                let mut shutdown = shutdown.clone();
                let pending = PendingJob {
                    job: pending.job,
                    attempts: attempt,
                };
                tasks.spawn(async move {
                    tokio::select! {
                        _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                            events.emit(GridEvent::Dropped { job_id, node_id: None });
                        }
                        _ = tokio::time::sleep(backoff) => {
                            if tx.send(pending).await.is_err() {
                                events.emit(GridEvent::Dropped { job_id, node_id: None });
                            }
                        }
                    }
                });
            }
        }
    }
}
