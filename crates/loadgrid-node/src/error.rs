//! Node error types.

use thiserror::Error;

use loadgrid_core::{Job, NodeId};

/// Errors returned when handing a job to a node.
///
/// Both variants give the job back so the caller can re-route it.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node {node_id} has stopped accepting jobs")]
    Stopped { node_id: NodeId, job: Job },

    #[error("node {node_id} queue is full")]
    QueueFull { node_id: NodeId, job: Job },
}

impl NodeError {
    pub fn into_job(self) -> Job {
        match self {
            Self::Stopped { job, .. } | Self::QueueFull { job, .. } => job,
        }
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
