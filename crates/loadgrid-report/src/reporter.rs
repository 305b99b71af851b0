//! Reporter: background task that snapshots node utilization.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use loadgrid_core::{MAX_DURATION, epoch_millis};
use loadgrid_node::Node;

use crate::observer::UtilizationObserver;
use crate::report::{NodeUtilization, UtilizationReport};

/// Periodically reports every node's utilization to its observers.
pub struct Reporter {
    nodes: Vec<Arc<Node>>,
    interval: Duration,
    observers: Vec<Arc<dyn UtilizationObserver>>,
}

impl Reporter {
    /// `interval` is clamped to between 1ms and [`MAX_DURATION`].
    pub fn new(nodes: Vec<Arc<Node>>, interval: Duration) -> Self {
        Self {
            nodes,
            interval: interval.clamp(Duration::from_millis(1), MAX_DURATION),
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn UtilizationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_observers(
        mut self,
        observers: impl IntoIterator<Item = Arc<dyn UtilizationObserver>>,
    ) -> Self {
        self.observers.extend(observers);
        self
    }

    /// Read every node's occupancy, one lock at a time.
    pub async fn snapshot(&self) -> UtilizationReport {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let snap = node.snapshot().await;
            nodes.push(NodeUtilization::new(snap.id, snap.used, snap.capacity));
        }
        UtilizationReport {
            taken_at: epoch_millis(),
            nodes,
        }
    }

    /// Take one snapshot and hand it to every observer.
    pub async fn report_once(&self) -> UtilizationReport {
        let report = self.snapshot().await;
        for (index, observer) in self.observers.iter().enumerate() {
            if let Err(e) = observer.observe(&report) {
                warn!(observer = index, error = %e, "utilization observer failed");
            }
        }
        report
    }

    /// Report every interval until shutdown signal. The first report is
    /// taken one interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            observers = self.observers.len(),
            "reporter started"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.report_once().await;
                    debug!(nodes = report.nodes.len(), "utilization reported");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use loadgrid_core::{EventBus, Job, NodeSpec, ShutdownPolicy};
    use loadgrid_node::SleepExecutor;

    use super::*;
    use crate::observer::tests::SharedBuf;
    use crate::observer::{ReportFormat, WriterObserver};

    struct CountingObserver {
        calls: AtomicUsize,
    }

    impl UtilizationObserver for CountingObserver {
        fn observe(&self, _report: &UtilizationReport) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenObserver;

    impl UtilizationObserver for BrokenObserver {
        fn observe(&self, _report: &UtilizationReport) -> anyhow::Result<()> {
            anyhow::bail!("sink unavailable")
        }
    }

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

    #[tokio::test(start_paused = true)]
    async fn snapshot_reflects_running_job() {
        let node = spawn_node(1, 8);
        let reporter = Reporter::new(vec![node.clone(), spawn_node(2, 4)], Duration::from_secs(5));

        node.submit(Job::new(1, 2, Duration::from_secs(10)).unwrap())
            .await
            .unwrap();
        while node.snapshot().await.used == 0 {
            tokio::task::yield_now().await;
        }

        let report = reporter.snapshot().await;
        assert_eq!(report.nodes.len(), 2);
        assert_eq!(report.nodes[0], NodeUtilization::new(1, 2, 8));
        assert_eq!(report.nodes[1].percent, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_every_interval_despite_failing_observer() {
        let counter = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
        });
        let reporter = Reporter::new(vec![spawn_node(1, 8)], Duration::from_secs(5))
            .with_observer(Arc::new(BrokenObserver))
            .with_observer(counter.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(reporter.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10_200)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn report_once_writes_to_observers() {
        let buf = SharedBuf::default();
        let reporter = Reporter::new(vec![spawn_node(3, 8)], Duration::from_secs(5))
            .with_observers([Arc::new(WriterObserver::new(ReportFormat::Text, Box::new(buf.clone())))
                as Arc<dyn UtilizationObserver>]);

        reporter.report_once().await;

        assert!(buf.contents().contains("node-3: 0/8 (0.0%)"));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_interval_does_not_overflow_timer() {
        let counter = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
        });
        let reporter =
            Reporter::new(vec![spawn_node(1, 8)], Duration::MAX).with_observer(counter.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(reporter.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
