//! Execution seam: how a node actually runs a job.
//!
//! The node loop only needs "hold this job for its duration, then let me
//! release its demand". [`SleepExecutor`] simulates that with a timer; a
//! subprocess or remote dispatcher can be plugged in behind the same trait
//! without touching placement logic.

use std::future::Future;
use std::pin::Pin;

use loadgrid_core::Job;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs a job to completion.
///
/// The returned future is awaited by the node's execution loop and is
/// never cancelled, even when the node is asked to stop.
pub trait JobExecutor: Send + Sync {
    fn execute<'a>(&'a self, job: &'a Job) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Holds for the job's declared duration and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepExecutor;

impl JobExecutor for SleepExecutor {
    fn execute<'a>(&'a self, job: &'a Job) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            tokio::time::sleep(job.duration()).await;
            anyhow::Ok(())
        })
    }
}
