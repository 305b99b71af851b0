//! Prometheus text exposition format.
//!
//! Renders per-node gauges and placement counters for scraping by a
//! Prometheus server or compatible agent.

use loadgrid_core::NodeId;

use crate::counters::CounterSnapshot;

/// Load figures for one node at render time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeGauge {
    pub node_id: NodeId,
    pub used: u32,
    pub reserved: u32,
    pub capacity: u32,
    pub predicted_load: f64,
}

/// Render node gauges and placement counters into Prometheus text format.
pub fn render_prometheus(nodes: &[NodeGauge], counters: &CounterSnapshot) -> String {
    let mut out = String::new();

    out.push_str("# HELP loadgrid_node_used_cpu CPU demand of jobs currently executing.\n");
    out.push_str("# TYPE loadgrid_node_used_cpu gauge\n");
    for n in nodes {
        out.push_str(&format!(
            "loadgrid_node_used_cpu{{node=\"{}\"}} {}\n",
            n.node_id, n.used
        ));
    }

    out.push_str("# HELP loadgrid_node_reserved_cpu CPU demand admitted but not yet executing.\n");
    out.push_str("# TYPE loadgrid_node_reserved_cpu gauge\n");
    for n in nodes {
        out.push_str(&format!(
            "loadgrid_node_reserved_cpu{{node=\"{}\"}} {}\n",
            n.node_id, n.reserved
        ));
    }

    out.push_str("# HELP loadgrid_node_capacity_cpu Total CPU capacity.\n");
    out.push_str("# TYPE loadgrid_node_capacity_cpu gauge\n");
    for n in nodes {
        out.push_str(&format!(
            "loadgrid_node_capacity_cpu{{node=\"{}\"}} {}\n",
            n.node_id, n.capacity
        ));
    }

    out.push_str("# HELP loadgrid_node_predicted_load Mean of the recent load window.\n");
    out.push_str("# TYPE loadgrid_node_predicted_load gauge\n");
    for n in nodes {
        out.push_str(&format!(
            "loadgrid_node_predicted_load{{node=\"{}\"}} {:.2}\n",
            n.node_id, n.predicted_load
        ));
    }

    for (name, help, value) in [
        ("assigned", "Jobs assigned to a node.", counters.assigned),
        ("retried", "Placement attempts deferred by backoff.", counters.retried),
        ("rejected", "Jobs rejected without placement.", counters.rejected),
        ("dropped", "Jobs discarded at shutdown.", counters.dropped),
        ("completed", "Jobs that finished executing.", counters.completed),
        ("failed", "Jobs whose execution returned an error.", counters.failed),
    ] {
        out.push_str(&format!("# HELP loadgrid_jobs_{name}_total {help}\n"));
        out.push_str(&format!("# TYPE loadgrid_jobs_{name}_total counter\n"));
        out.push_str(&format!("loadgrid_jobs_{name}_total {value}\n"));
    }

    out
}
