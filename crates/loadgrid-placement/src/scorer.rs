//! Node scoring for placement decisions.
//!
//! Evaluates candidate nodes using a weighted combination of:
//! - **Headroom**: capacity left once the predicted load is subtracted
//! - **Trend**: how far from saturation the node has been recently,
//!   scaled by capacity
//!
//! Both terms grow with capacity, so at equal predicted load a larger node
//! scores higher.

use loadgrid_core::{NodeId, ScoringConfig};
use tracing::trace;

/// Weights for the scoring components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub headroom: f64,
    pub trend: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            headroom: 0.7,
            trend: 0.3,
        }
    }
}

impl From<&ScoringConfig> for ScoringWeights {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            headroom: config.headroom_weight,
            trend: config.trend_weight,
        }
    }
}

/// What the scheduler knows about a node when it evaluates a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeLoad {
    pub node_id: NodeId,
    pub capacity: u32,
    /// Capacity already committed at decision time.
    pub committed: u32,
    /// Mean of the node's recent load window.
    pub predicted_load: f64,
}

/// Individual score components for debugging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// `max(capacity - predicted, 0)`.
    pub available: f64,
    /// `1 - min(predicted / capacity, 1)`, in `0.0..=1.0`.
    pub latency_factor: f64,
}

/// Scored placement result for a single node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeScore {
    pub node_id: NodeId,
    /// Composite score (higher = better).
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Whether `demand` fits next to `committed` without exceeding `capacity`.
pub fn is_feasible(committed: u32, demand: u32, capacity: u32) -> bool {
    u64::from(committed) + u64::from(demand) <= u64::from(capacity)
}

/// Score a node of `capacity` whose recent load is `predicted`.
pub fn score(capacity: u32, predicted: f64, weights: &ScoringWeights) -> (f64, ScoreBreakdown) {
    let capacity = f64::from(capacity);
    let available = (capacity - predicted).max(0.0);
    let latency_factor = if capacity > 0.0 {
        1.0 - (predicted / capacity).min(1.0)
    } else {
        0.0
    };

    let score = weights.headroom * available + weights.trend * latency_factor * capacity;
    (
        score,
        ScoreBreakdown {
            available,
            latency_factor,
        },
    )
}

/// Score a node for a job of `demand`, or `None` if the job does not fit.
pub fn score_node(node: &NodeLoad, demand: u32, weights: &ScoringWeights) -> Option<NodeScore> {
    if !is_feasible(node.committed, demand, node.capacity) {
        return None;
    }

    let (score, breakdown) = score(node.capacity, node.predicted_load, weights);
    Some(NodeScore {
        node_id: node.node_id,
        score,
        breakdown,
    })
}

/// Pick the highest-scoring feasible node.
///
/// Nodes are visited in slice order and a later node must score strictly
/// higher to win, so ties go to the earliest node.
pub fn select_best(nodes: &[NodeLoad], demand: u32, weights: &ScoringWeights) -> Option<NodeScore> {
    let mut best: Option<NodeScore> = None;

    for node in nodes {
        let Some(candidate) = score_node(node, demand, weights) else {
            trace!(node_id = node.node_id, demand, committed = node.committed, "node infeasible");
            continue;
        };
        trace!(node_id = node.node_id, score = candidate.score, "node scored");

        match best {
            Some(current) if candidate.score <= current.score => {}
            _ => best = Some(candidate),
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_node(id: NodeId, capacity: u32, committed: u32, predicted: f64) -> NodeLoad {
        NodeLoad {
            node_id: id,
            capacity,
            committed,
            predicted_load: predicted,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn idle_node_scores_full_capacity() {
        let (s, breakdown) = score(8, 0.0, &ScoringWeights::default());
        assert!(approx(s, 8.0), "score was {s}");
        assert!(approx(breakdown.available, 8.0));
        assert!(approx(breakdown.latency_factor, 1.0));
    }

    #[test]
    fn near_saturated_node_scores_low() {
        let (s, breakdown) = score(8, 7.0, &ScoringWeights::default());
        assert!(approx(s, 1.0), "score was {s}");
        assert!(approx(breakdown.latency_factor, 0.125));
    }

    #[test]
    fn overloaded_prediction_floors_at_zero() {
        let (s, breakdown) = score(4, 6.0, &ScoringWeights::default());
        assert_eq!(s, 0.0);
        assert_eq!(breakdown.available, 0.0);
        assert_eq!(breakdown.latency_factor, 0.0);
    }

    #[test]
    fn zero_capacity_has_no_latency_credit() {
        let (s, breakdown) = score(0, 0.0, &ScoringWeights::default());
        assert_eq!(s, 0.0);
        assert_eq!(breakdown.latency_factor, 0.0);
    }

    #[test]
    fn score_is_monotone_in_predicted_load() {
        let weights = ScoringWeights::default();
        for capacity in [1, 4, 8, 32] {
            let mut previous = f64::INFINITY;
            for tenths in 0..=(capacity * 15) {
                let predicted = f64::from(tenths) / 10.0;
                let (s, _) = score(capacity, predicted, &weights);
                assert!(
                    s <= previous,
                    "capacity {capacity}: score rose from {previous} to {s} at load {predicted}"
                );
                previous = s;
            }
        }
    }

    #[test]
    fn larger_node_wins_at_equal_load() {
        let weights = ScoringWeights::default();
        let (small, _) = score(4, 2.0, &weights);
        let (large, _) = score(16, 2.0, &weights);
        assert!(large > small);
    }

    #[test]
    fn feasibility_boundary() {
        assert!(is_feasible(5, 3, 8));
        assert!(!is_feasible(6, 3, 8));
        assert!(!is_feasible(0, 5, 4));
        assert!(!is_feasible(u32::MAX, u32::MAX, u32::MAX));
    }

    #[test]
    fn score_node_rejects_infeasible() {
        let node = make_node(1, 8, 7, 0.0);
        assert!(score_node(&node, 2, &ScoringWeights::default()).is_none());
        assert!(score_node(&node, 1, &ScoringWeights::default()).is_some());
    }

    #[test]
    fn equal_scores_pick_first_node() {
        let nodes = vec![
            make_node(1, 8, 0, 0.0),
            make_node(2, 8, 0, 0.0),
            make_node(3, 8, 0, 0.0),
        ];
        let best = select_best(&nodes, 3, &ScoringWeights::default()).unwrap();
        assert_eq!(best.node_id, 1);
    }

    #[test]
    fn lower_trended_load_wins() {
        let nodes = vec![make_node(1, 8, 0, 7.0), make_node(2, 8, 0, 1.0)];
        let best = select_best(&nodes, 2, &ScoringWeights::default()).unwrap();
        assert_eq!(best.node_id, 2);
        assert!(approx(best.score, 7.0), "score was {}", best.score);
    }

    #[test]
    fn infeasible_best_scorer_is_skipped() {
        // Node 2 has the better history but no room right now.
        let nodes = vec![make_node(1, 8, 4, 6.0), make_node(2, 8, 7, 0.0)];
        let best = select_best(&nodes, 3, &ScoringWeights::default()).unwrap();
        assert_eq!(best.node_id, 1);
    }

    #[test]
    fn no_feasible_node_returns_none() {
        let nodes = vec![make_node(1, 4, 0, 0.0)];
        assert!(select_best(&nodes, 5, &ScoringWeights::default()).is_none());
        assert!(select_best(&[], 1, &ScoringWeights::default()).is_none());
    }

    #[test]
    fn weights_follow_config() {
        let config = ScoringConfig {
            headroom_weight: 1.0,
            trend_weight: 0.0,
        };
        let weights = ScoringWeights::from(&config);
        let (s, _) = score(8, 2.0, &weights);
        assert!(approx(s, 6.0));
    }
}
