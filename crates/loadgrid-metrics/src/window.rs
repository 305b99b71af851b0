//! Bounded per-node load history.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use loadgrid_core::{MetricSample, NodeId};

/// The most recent observed `used` values of one node, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWindow {
    samples: VecDeque<u32>,
    limit: usize,
}

impl LoadWindow {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            samples: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Append a value, evicting the oldest when the window is full.
    pub fn push(&mut self, used: u32) {
        if self.samples.len() == self.limit {
            self.samples.pop_front();
        }
        self.samples.push_back(used);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.samples.iter().copied().collect()
    }
}

/// Shared handle to every node's [`LoadWindow`].
///
/// Writes come from the collector loop only; readers (the scheduler, the
/// exposition code) get copies. The map sits behind its own lock, never
/// taken while a node lock is held.
#[derive(Debug, Clone)]
pub struct LoadWindows {
    inner: Arc<RwLock<HashMap<NodeId, LoadWindow>>>,
    window_size: usize,
}

impl LoadWindows {
    /// Create empty windows for the given nodes.
    pub fn new(window_size: usize, node_ids: impl IntoIterator<Item = NodeId>) -> Self {
        let windows = node_ids
            .into_iter()
            .map(|id| (id, LoadWindow::new(window_size)))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(windows)),
            window_size: window_size.max(1),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Append a sample's `used` value to its node's window.
    ///
    /// Samples for nodes that are not part of the grid are ignored.
    pub async fn record(&self, sample: &MetricSample) {
        let mut windows = self.inner.write().await;
        match windows.get_mut(&sample.node_id) {
            Some(window) => window.push(sample.used),
            None => debug!(node_id = sample.node_id, "sample for unknown node ignored"),
        }
    }

    /// Pre-fill a node's window, e.g. with history carried over from a
    /// previous run. Values pass through the same eviction as live samples.
    pub async fn seed(&self, node_id: NodeId, values: &[u32]) {
        let mut windows = self.inner.write().await;
        if let Some(window) = windows.get_mut(&node_id) {
            for &v in values {
                window.push(v);
            }
        }
    }

    /// Copy of a node's window, oldest first. Empty for unknown nodes.
    pub async fn window(&self, node_id: NodeId) -> Vec<u32> {
        let windows = self.inner.read().await;
        windows.get(&node_id).map(LoadWindow::to_vec).unwrap_or_default()
    }

    pub async fn len(&self, node_id: NodeId) -> usize {
        let windows = self.inner.read().await;
        windows.get(&node_id).map(LoadWindow::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_never_exceeds_limit() {
        let mut window = LoadWindow::new(10);
        for v in 0..25 {
            window.push(v);
            assert!(window.len() <= 10);
        }
        assert_eq!(window.to_vec(), (15..25).collect::<Vec<_>>());
    }

    #[test]
    fn window_keeps_insertion_order_below_limit() {
        let mut window = LoadWindow::new(10);
        assert!(window.is_empty());
        window.push(2);
        window.push(4);
        window.push(6);
        assert_eq!(window.to_vec(), vec![2, 4, 6]);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let mut window = LoadWindow::new(0);
        window.push(1);
        window.push(2);
        assert_eq!(window.limit(), 1);
        assert_eq!(window.to_vec(), vec![2]);
    }

    #[tokio::test]
    async fn record_appends_to_matching_node() {
        let windows = LoadWindows::new(3, [1, 2]);

        for used in [1, 2, 3, 4] {
            windows.record(&MetricSample::now(1, used, 8)).await;
        }
        windows.record(&MetricSample::now(2, 7, 8)).await;

        assert_eq!(windows.window(1).await, vec![2, 3, 4]);
        assert_eq!(windows.window(2).await, vec![7]);
    }

    #[tokio::test]
    async fn unknown_node_is_ignored() {
        let windows = LoadWindows::new(10, [1]);
        windows.record(&MetricSample::now(99, 5, 8)).await;

        assert!(windows.window(99).await.is_empty());
        assert_eq!(windows.len(1).await, 0);
    }

    #[tokio::test]
    async fn seed_respects_window_size() {
        let windows = LoadWindows::new(4, [1]);
        windows.seed(1, &[1, 2, 3, 4, 5, 6]).await;
        assert_eq!(windows.window(1).await, vec![3, 4, 5, 6]);
    }
}
