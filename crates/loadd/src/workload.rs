//! Synthetic workload: randomly sized jobs arriving at a fixed pace.

use std::ops::{Range, RangeInclusive};
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{info, warn};

use loadgrid_core::Job;
use loadgrid_scheduler::JobSubmitter;

/// Shape of a generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub jobs: usize,
    pub demand: RangeInclusive<u32>,
    pub duration_ms: Range<u64>,
}

impl Default for WorkloadSpec {
    fn default() -> Self {
        Self {
            jobs: 60,
            demand: 1..=3,
            duration_ms: 200..1000,
        }
    }
}

/// Draw `spec.jobs` jobs with ids `1..=jobs`.
pub fn generate(spec: &WorkloadSpec, rng: &mut impl Rng) -> anyhow::Result<Vec<Job>> {
    let mut jobs = Vec::with_capacity(spec.jobs);
    for id in 1..=spec.jobs as u64 {
        let demand = rng.gen_range(spec.demand.clone());
        let duration = Duration::from_millis(rng.gen_range(spec.duration_ms.clone()));
        jobs.push(Job::new(id, demand, duration)?);
    }
    Ok(jobs)
}

/// Submit `jobs` one every `interval` until done or until `stop` fires.
///
/// Returns how many jobs were submitted.
pub async fn feed(
    submitter: JobSubmitter,
    jobs: Vec<Job>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> usize {
    let total = jobs.len();
    let mut submitted = 0;

    for job in jobs {
        if *stop.borrow() {
            break;
        }
        let job_id = job.id();
        if let Err(e) = submitter.submit(job).await {
            warn!(job_id, error = %e, "workload stopped early");
            break;
        }
        submitted += 1;
        if submitted == total {
            break;
        }

        tokio::select! {
            _ = stop.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(submitted, total, "workload finished");
    submitted
}
