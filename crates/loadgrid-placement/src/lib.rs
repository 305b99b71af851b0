//! loadgrid-placement: placement math, free of I/O and locking.
//!
//! Callers gather a [`NodeLoad`] per node (occupancy read under the node's
//! lock, predicted load from its history window) and ask this crate which
//! node should take a job.
//!
//! # Components
//!
//! - **`predictor`**: predicted load from a load window (mean)
//! - **`scorer`**: feasibility, weighted node score, best-node selection

pub mod predictor;
pub mod scorer;

pub use predictor::predict_load;
pub use scorer::{
    NodeLoad, NodeScore, ScoreBreakdown, ScoringWeights, is_feasible, score, score_node,
    select_best,
};
