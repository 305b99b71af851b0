//! Node: occupancy state plus a private job queue and execution loop.
//!
//! A [`Node`] is shared (`Arc`) between the scheduler, the metrics
//! collector and the reporter. Its [`NodeWorker`] is the only code that
//! changes `used`; everyone else reads occupancy through [`Node::snapshot`]
//! or commits capacity ahead of time through [`Node::try_reserve`].

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use loadgrid_core::{EventBus, GridEvent, Job, NodeId, NodeSpec, ShutdownPolicy};

use crate::error::{NodeError, NodeResult};
use crate::executor::JobExecutor;

/// Point-in-time view of a node's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub capacity: u32,
    /// Demand of the jobs currently executing.
    pub used: u32,
    /// Demand admitted to the queue but not yet executing.
    pub reserved: u32,
}

impl NodeSnapshot {
    /// Capacity already spoken for: executing plus reserved.
    pub fn committed(&self) -> u32 {
        self.used.saturating_add(self.reserved)
    }

    /// Executing demand as a percentage of capacity.
    pub fn utilization_percent(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        f64::from(self.used) / f64::from(self.capacity) * 100.0
    }
}

#[derive(Debug, Default)]
struct Occupancy {
    used: u32,
    reserved: u32,
}

/// A job waiting in a node queue.
#[derive(Debug)]
struct QueuedJob {
    job: Job,
    /// Whether the job's demand was reserved when it was admitted.
    reserved: bool,
}

/// A capacity-bounded compute node.
pub struct Node {
    spec: NodeSpec,
    occupancy: Mutex<Occupancy>,
    queue: mpsc::Sender<QueuedJob>,
    stop_tx: watch::Sender<bool>,
}

impl Node {
    /// Create a node and the worker that executes its jobs.
    ///
    /// The worker does nothing until [`NodeWorker::run`] is awaited or
    /// spawned. Most callers want [`Node::spawn`].
    pub fn new(
        spec: NodeSpec,
        queue_depth: usize,
        executor: Arc<dyn JobExecutor>,
        policy: ShutdownPolicy,
        events: EventBus,
    ) -> (Arc<Self>, NodeWorker) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);

        let node = Arc::new(Self {
            spec,
            occupancy: Mutex::new(Occupancy::default()),
            queue: tx,
            stop_tx,
        });

        let worker = NodeWorker {
            node: Arc::clone(&node),
            queue: rx,
            stop: stop_rx,
            executor,
            policy,
            events,
        };

        (node, worker)
    }

    /// Create a node and spawn its worker onto the tokio runtime.
    pub fn spawn(
        spec: NodeSpec,
        queue_depth: usize,
        executor: Arc<dyn JobExecutor>,
        policy: ShutdownPolicy,
        events: EventBus,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (node, worker) = Self::new(spec, queue_depth, executor, policy, events);
        let handle = tokio::spawn(worker.run());
        (node, handle)
    }

    pub fn id(&self) -> NodeId {
        self.spec.id
    }

    pub fn capacity(&self) -> u32 {
        self.spec.capacity
    }

    pub fn spec(&self) -> NodeSpec {
        self.spec
    }

    /// Enqueue a job, waiting while the queue is full.
    pub async fn submit(&self, job: Job) -> NodeResult<()> {
        self.enqueue(QueuedJob {
            job,
            reserved: false,
        })
        .await
    }

    /// Enqueue a job whose demand was reserved with [`Node::try_reserve`].
    ///
    /// If the node has stopped, the reservation is released before the job
    /// is handed back.
    pub async fn submit_reserved(&self, job: Job) -> NodeResult<()> {
        let demand = job.cpu_demand();
        let result = self.enqueue(QueuedJob { job, reserved: true }).await;
        if result.is_err() {
            self.release_reservation(demand).await;
        }
        result
    }

    /// Enqueue a job without waiting.
    pub fn try_submit(&self, job: Job) -> NodeResult<()> {
        let node_id = self.id();
        self.queue
            .try_send(QueuedJob {
                job,
                reserved: false,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(q) => NodeError::QueueFull { node_id, job: q.job },
                mpsc::error::TrySendError::Closed(q) => NodeError::Stopped { node_id, job: q.job },
            })
    }

    async fn enqueue(&self, queued: QueuedJob) -> NodeResult<()> {
        self.queue
            .send(queued)
            .await
            .map_err(|e| NodeError::Stopped {
                node_id: self.id(),
                job: e.0.job,
            })
    }

    /// Reserve `demand` if it fits next to what is already committed.
    pub async fn try_reserve(&self, demand: u32) -> bool {
        let mut occ = self.occupancy.lock().await;
        let committed = u64::from(occ.used) + u64::from(occ.reserved);
        if committed + u64::from(demand) <= u64::from(self.spec.capacity) {
            occ.reserved += demand;
            true
        } else {
            false
        }
    }

    /// Give back a reservation for a job that will not run here.
    pub async fn release_reservation(&self, demand: u32) {
        let mut occ = self.occupancy.lock().await;
        occ.reserved = occ.reserved.saturating_sub(demand);
    }

    pub async fn snapshot(&self) -> NodeSnapshot {
        let occ = self.occupancy.lock().await;
        NodeSnapshot {
            id: self.spec.id,
            capacity: self.spec.capacity,
            used: occ.used,
            reserved: occ.reserved,
        }
    }

    /// Number of jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.max_capacity() - self.queue.capacity()
    }

    /// Raise this node's stop signal. The worker finishes the job it is
    /// executing, then applies its shutdown policy to the queue.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopping(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.spec.id)
            .field("capacity", &self.spec.capacity)
            .finish_non_exhaustive()
    }
}

/// The execution loop of a single node.
///
/// Jobs run one at a time in queue order.
pub struct NodeWorker {
    node: Arc<Node>,
    queue: mpsc::Receiver<QueuedJob>,
    stop: watch::Receiver<bool>,
    executor: Arc<dyn JobExecutor>,
    policy: ShutdownPolicy,
    events: EventBus,
}

impl NodeWorker {
    /// Run until the node's stop signal is observed.
    pub async fn run(mut self) {
        let node_id = self.node.id();
        debug!(node_id, capacity = self.node.capacity(), "node worker started");

        loop {
            if *self.stop.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                changed = self.stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                next = self.queue.recv() => match next {
                    Some(queued) => self.execute(queued).await,
                    None => break,
                },
            }
        }

        self.shutdown().await;
        info!(node_id, "node worker stopped");
    }

    async fn execute(&self, queued: QueuedJob) {
        let node_id = self.node.id();
        let job = queued.job;
        let demand = job.cpu_demand();

        {
            let mut occ = self.node.occupancy.lock().await;
            occ.used = occ.used.saturating_add(demand);
            if queued.reserved {
                occ.reserved = occ.reserved.saturating_sub(demand);
            }
        }
        debug!(node_id, job_id = job.id(), demand, "job started");
        self.events.emit(GridEvent::Started {
            job_id: job.id(),
            node_id,
        });

        let result = self.executor.execute(&job).await;

        {
            let mut occ = self.node.occupancy.lock().await;
            occ.used = occ.used.saturating_sub(demand);
        }

        match result {
            Ok(()) => {
                debug!(node_id, job_id = job.id(), "job completed");
                self.events.emit(GridEvent::Completed {
                    job_id: job.id(),
                    node_id,
                });
            }
            Err(e) => {
                warn!(node_id, job_id = job.id(), error = %e, "job execution failed");
                self.events.emit(GridEvent::ExecutionFailed {
                    job_id: job.id(),
                    node_id,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Apply the shutdown policy to whatever is still queued.
    async fn shutdown(&mut self) {
        let node_id = self.node.id();
        self.queue.close();

        match self.policy {
            ShutdownPolicy::Drain => {
                let mut drained = 0usize;
                while let Some(queued) = self.queue.recv().await {
                    self.execute(queued).await;
                    drained += 1;
                }
                if drained > 0 {
                    info!(node_id, drained, "drained queued jobs before stopping");
                }
            }
            ShutdownPolicy::Drop => {
                let mut dropped = 0usize;
                while let Some(queued) = self.queue.recv().await {
                    if queued.reserved {
                        self.node.release_reservation(queued.job.cpu_demand()).await;
                    }
                    self.events.emit(GridEvent::Dropped {
                        job_id: queued.job.id(),
                        node_id: Some(node_id),
                    });
                    dropped += 1;
                }
                if dropped > 0 {
                    warn!(node_id, dropped, "discarded queued jobs on shutdown");
                }
            }
        }
    }
}
