//! Utilization report types.

use std::fmt;

use serde::{Deserialize, Serialize};

use loadgrid_core::NodeId;

/// Occupancy of one node when the report was taken.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NodeUtilization {
    pub node_id: NodeId,
    pub used: u32,
    pub capacity: u32,
    pub percent: f64,
}

impl NodeUtilization {
    pub fn new(node_id: NodeId, used: u32, capacity: u32) -> Self {
        let percent = if capacity == 0 {
            0.0
        } else {
            f64::from(used) / f64::from(capacity) * 100.0
        };
        Self {
            node_id,
            used,
            capacity,
            percent,
        }
    }
}

/// One utilization snapshot of the whole cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UtilizationReport {
    /// Epoch milliseconds.
    pub taken_at: u64,
    pub nodes: Vec<NodeUtilization>,
}

impl fmt::Display for UtilizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---- utilization ----")?;
        for n in &self.nodes {
            writeln!(
                f,
                "node-{}: {}/{} ({:.1}%)",
                n.node_id, n.used, n.capacity, n.percent
            )?;
        }
        write!(f, "---------------------")
    }
}
