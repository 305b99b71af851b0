//! Scheduler error types.

use thiserror::Error;

use loadgrid_core::Job;

/// Errors returned when submitting a job to the scheduler.
///
/// The job is handed back in every case.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler has shut down")]
    Closed(Job),

    #[error("arrival queue is full")]
    QueueFull(Job),
}

impl SchedulerError {
    pub fn into_job(self) -> Job {
        match self {
            Self::Closed(job) | Self::QueueFull(job) => job,
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
