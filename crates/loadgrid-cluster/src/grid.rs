//! Grid assembly and orderly shutdown.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use loadgrid_core::{ConfigResult, EventBus, GridConfig, GridEvent};
use loadgrid_metrics::{
    CounterSnapshot, LoadWindows, MetricsCollector, MetricsSender, NodeGauge, PlacementCounters,
    render_prometheus,
};
use loadgrid_node::{JobExecutor, Node};
use loadgrid_placement::predict_load;
use loadgrid_report::{Reporter, UtilizationObserver};
use loadgrid_scheduler::{JobSubmitter, Scheduler};

/// A running grid: every node worker plus the collector, scheduler,
/// reporter and counter loops.
pub struct Grid {
    config: GridConfig,
    nodes: Vec<Arc<Node>>,
    windows: LoadWindows,
    submitter: JobSubmitter,
    metrics: MetricsSender,
    events: EventBus,
    counters: Arc<PlacementCounters>,
    shutdown_tx: watch::Sender<bool>,
    counters_stop: watch::Sender<bool>,
    counters_handle: JoinHandle<()>,
    node_handles: Vec<JoinHandle<()>>,
    loop_handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Grid {
    /// Validate `config` and spawn every component onto the current tokio
    /// runtime.
    pub fn start(
        config: GridConfig,
        executor: Arc<dyn JobExecutor>,
        observers: Vec<Arc<dyn UtilizationObserver>>,
    ) -> ConfigResult<Self> {
        config.validate()?;

        let events = EventBus::new();
        let counters = Arc::new(PlacementCounters::new());
        let (counters_stop, counters_rx) = watch::channel(false);
        let counters_handle = tokio::spawn(counters.clone().track(events.subscribe(), counters_rx));

        let mut nodes = Vec::with_capacity(config.nodes.len());
        let mut node_handles = Vec::with_capacity(config.nodes.len());
        for spec in &config.nodes {
            let (node, handle) = Node::spawn(
                *spec,
                config.queues.node,
                executor.clone(),
                config.shutdown,
                events.clone(),
            );
            nodes.push(node);
            node_handles.push(handle);
        }

        let collector = MetricsCollector::new(
            nodes.clone(),
            config.metrics.window_size,
            config.sample_interval(),
            config.queues.metrics,
        );
        let windows = collector.windows();
        let metrics = collector.sender();

        let scheduler = Scheduler::from_config(&config, nodes.clone(), windows.clone(), events.clone());
        let submitter = scheduler.submitter();

        let reporter =
            Reporter::new(nodes.clone(), config.report_interval()).with_observers(observers);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let loop_handles = vec![
            ("scheduler", tokio::spawn(scheduler.run(shutdown_rx.clone()))),
            ("collector", tokio::spawn(collector.run(shutdown_rx.clone()))),
            ("reporter", tokio::spawn(reporter.run(shutdown_rx))),
        ];

        info!(
            nodes = nodes.len(),
            admission = ?config.admission,
            shutdown = ?config.shutdown,
            "grid started"
        );

        Ok(Self {
            config,
            nodes,
            windows,
            submitter,
            metrics,
            events,
            counters,
            shutdown_tx,
            counters_stop,
            counters_handle,
            node_handles,
            loop_handles,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Handle for feeding jobs into the arrival queue.
    pub fn submitter(&self) -> JobSubmitter {
        self.submitter.clone()
    }

    /// Handle for pushing externally observed load samples.
    pub fn metrics_sender(&self) -> MetricsSender {
        self.metrics.clone()
    }

    /// Subscribe to placement events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.events.subscribe()
    }

    pub fn windows(&self) -> LoadWindows {
        self.windows.clone()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Current per-node load figures.
    pub async fn gauges(&self) -> Vec<NodeGauge> {
        let mut gauges = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let snap = node.snapshot().await;
            let window = self.windows.window(snap.id).await;
            gauges.push(NodeGauge {
                node_id: snap.id,
                used: snap.used,
                reserved: snap.reserved,
                capacity: snap.capacity,
                predicted_load: predict_load(&window),
            });
        }
        gauges
    }

    /// Node gauges and placement counters in Prometheus text format.
    pub async fn render_metrics(&self) -> String {
        render_prometheus(&self.gauges().await, &self.counters.snapshot())
    }

    /// Stop the grid and wait for every task to exit.
    ///
    /// The scheduler, collector and reporter stop first, then every node
    /// applies its shutdown policy, and finally the counters absorb the
    /// events those steps produced. Returns the final counter values.
    pub async fn shutdown(self) -> CounterSnapshot {
        info!("grid shutting down");
        self.shutdown_tx.send_replace(true);
        for node in &self.nodes {
            node.stop();
        }

        for (name, handle) in self.loop_handles {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "grid task ended abnormally");
            }
        }
        for handle in self.node_handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "node worker ended abnormally");
            }
        }

        self.counters_stop.send_replace(true);
        if let Err(e) = self.counters_handle.await {
            warn!(task = "counters", error = %e, "grid task ended abnormally");
        }

        let totals = self.counters.snapshot();
        info!(
            assigned = totals.assigned,
            completed = totals.completed,
            retried = totals.retried,
            rejected = totals.rejected,
            dropped = totals.dropped,
            failed = totals.failed,
            "grid stopped"
        );
        totals
    }
}
