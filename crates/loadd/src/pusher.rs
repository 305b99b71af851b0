//! External load reporting: each node pushes its own occupancy into the
//! collector's sample queue, alongside the collector's periodic pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info};

use loadgrid_core::MetricSample;
use loadgrid_metrics::MetricsSender;
use loadgrid_node::Node;

/// Push one sample per node every `interval` until `stop` fires or the
/// collector goes away. Returns the number of samples pushed.
pub async fn push_samples(
    nodes: Vec<Arc<Node>>,
    sender: MetricsSender,
    interval: Duration,
    stop: watch::Receiver<bool>,
) -> usize {
    let mut pushers = JoinSet::new();
    for node in nodes {
        pushers.spawn(push_node(node, sender.clone(), interval, stop.clone()));
    }

    let mut pushed = 0;
    while let Some(result) = pushers.join_next().await {
        pushed += result.unwrap_or(0);
    }
    info!(pushed, "sample pushers stopped");
    pushed
}

async fn push_node(
    node: Arc<Node>,
    sender: MetricsSender,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> usize {
    let mut pushed = 0;
    loop {
        tokio::select! {
            _ = stop.wait_for(|s| *s) => break,
            _ = tokio::time::sleep(interval) => {}
        }
        let snap = node.snapshot().await;
        if sender
            .push(MetricSample::now(snap.id, snap.used, snap.capacity))
            .await
            .is_err()
        {
            debug!(node_id = snap.id, "collector gone, pusher exiting");
            break;
        }
        pushed += 1;
    }
    pushed
}
