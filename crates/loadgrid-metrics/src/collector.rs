//! Metrics collector: keeps every node's load window current.
//!
//! Two sources feed the windows: a periodic pass that samples every node,
//! and samples pushed from outside through a [`MetricsSender`]. Both are
//! applied by the single collector loop, one at a time, so window state
//! is never torn.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use loadgrid_core::{MAX_DURATION, MetricSample};
use loadgrid_node::Node;

use crate::window::LoadWindows;

/// Cloneable handle for pushing samples into the collector.
#[derive(Debug, Clone)]
pub struct MetricsSender {
    tx: mpsc::Sender<MetricSample>,
}

impl MetricsSender {
    /// Push a sample, waiting while the sample queue is full.
    ///
    /// Fails only when the collector has shut down.
    pub async fn push(&self, sample: MetricSample) -> Result<(), mpsc::error::SendError<MetricSample>> {
        self.tx.send(sample).await
    }

    /// Push a sample without waiting.
    pub fn try_push(&self, sample: MetricSample) -> Result<(), mpsc::error::TrySendError<MetricSample>> {
        self.tx.try_send(sample)
    }
}

/// Samples node occupancy and maintains the per-node load windows.
pub struct MetricsCollector {
    nodes: Vec<Arc<Node>>,
    windows: LoadWindows,
    samples_tx: mpsc::Sender<MetricSample>,
    samples_rx: mpsc::Receiver<MetricSample>,
    interval: Duration,
}

impl MetricsCollector {
    /// Create a collector for `nodes` with empty windows. `interval` is
    /// clamped to between 1ms and [`MAX_DURATION`].
    pub fn new(
        nodes: Vec<Arc<Node>>,
        window_size: usize,
        interval: Duration,
        queue_depth: usize,
    ) -> Self {
        let windows = LoadWindows::new(window_size, nodes.iter().map(|n| n.id()));
        let (samples_tx, samples_rx) = mpsc::channel(queue_depth.max(1));
        Self {
            nodes,
            windows,
            samples_tx,
            samples_rx,
            interval: interval.clamp(Duration::from_millis(1), MAX_DURATION),
        }
    }

    /// Read handle to the windows this collector maintains.
    pub fn windows(&self) -> LoadWindows {
        self.windows.clone()
    }

    pub fn sender(&self) -> MetricsSender {
        MetricsSender {
            tx: self.samples_tx.clone(),
        }
    }

    /// Sample every node once and record the observations.
    pub async fn sample_all(&self) -> Vec<MetricSample> {
        let mut samples = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let snap = node.snapshot().await;
            let sample = MetricSample::now(snap.id, snap.used, snap.capacity);
            self.windows.record(&sample).await;
            samples.push(sample);
        }
        samples
    }

    /// Run the collection loop until shutdown signal.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            window_size = self.windows.window_size(),
            nodes = self.nodes.len(),
            "metrics collector started"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("metrics collector shutting down");
                    break;
                }
                Some(sample) = self.samples_rx.recv() => {
                    self.windows.record(&sample).await;
                }
                _ = ticker.tick() => {
                    let samples = self.sample_all().await;
                    debug!(nodes = samples.len(), "sampled node occupancy");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use loadgrid_core::{EventBus, Job, NodeSpec, ShutdownPolicy};
    use loadgrid_node::SleepExecutor;

    use super::*;

    fn spawn_node(id: u32, capacity: u32) -> Arc<Node> {
        let (node, _handle) = Node::spawn(
            NodeSpec::new(id, capacity),
            8,
            Arc::new(SleepExecutor),
            ShutdownPolicy::Drop,
            EventBus::new(),
        );
        node
    }

    #[tokio::test]
    async fn sample_all_records_current_usage() {
        let nodes = vec![spawn_node(1, 8), spawn_node(2, 4)];
        let collector = MetricsCollector::new(nodes, 10, Duration::from_secs(1), 16);

        let samples = collector.sample_all().await;

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].capacity, 4);
        assert_eq!(collector.windows().window(1).await, vec![0]);
        assert_eq!(collector.windows().window(2).await, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_sampling_fills_window() {
        let collector = MetricsCollector::new(vec![spawn_node(1, 8)], 10, Duration::from_secs(1), 16);
        let windows = collector.windows();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(collector.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(windows.len(1).await, 3);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(windows.len(1).await, 10);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sampling_observes_running_job() {
        let node = spawn_node(1, 8);
        let collector = MetricsCollector::new(vec![node.clone()], 10, Duration::from_secs(1), 16);
        let windows = collector.windows();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(collector.run(shutdown_rx));

        let job = Job::new(1, 5, Duration::from_millis(1500)).unwrap();
        node.submit(job).await.unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(windows.window(1).await, vec![5, 0]);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn pushed_samples_are_recorded() {
        let collector = MetricsCollector::new(vec![spawn_node(1, 8)], 10, Duration::from_secs(3600), 16);
        let windows = collector.windows();
        let sender = collector.sender();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(collector.run(shutdown_rx));

        for used in [3, 6] {
            sender.push(MetricSample::now(1, used, 8)).await.unwrap();
        }

        while windows.len(1).await < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(windows.window(1).await, vec![3, 6]);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(sender.try_push(MetricSample::now(1, 1, 8)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_interval_is_clamped() {
        let collector = MetricsCollector::new(vec![spawn_node(1, 8)], 10, Duration::MAX, 16);
        let sender = collector.sender();
        let windows = collector.windows();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(collector.run(shutdown_rx));

        sender.push(MetricSample::now(1, 2, 8)).await.unwrap();
        while windows.len(1).await < 1 {
            tokio::task::yield_now().await;
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let collector = MetricsCollector::new(vec![spawn_node(2, 8)], 10, Duration::ZERO, 16);
        let windows = collector.windows();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(collector.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(windows.len(2).await >= 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
