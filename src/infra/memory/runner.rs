use apalis::prelude::{Data, Error as ApalisError};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::application::jobs::{
    FanoutJobContext, job_failed, process_fanout_batch_job, process_fanout_main_job,
};
use crate::application::repos::RepoError;
use crate::domain::types::JobType;

use super::{MemoryRepositories, QueuedJob};

/// Counts from one [`drain_jobs`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub main_jobs: usize,
    pub batch_jobs: usize,
    pub failed: usize,
}

/// Run queued fanout jobs in process until both queues are empty.
///
/// Each job gets up to its `max_attempts` tries; a job that keeps failing is
/// dropped and counted in [`DrainReport::failed`].
pub async fn drain_jobs(repos: &MemoryRepositories, context: &FanoutJobContext) -> DrainReport {
    let mut report = DrainReport::default();
    loop {
        let main = repos.take_jobs(JobType::FanoutMain);
        let batches = repos.take_jobs(JobType::FanoutBatch);
        if main.is_empty() && batches.is_empty() {
            return report;
        }

        for job in main {
            report.main_jobs += 1;
            if !run_with_attempts(&job, context, process_fanout_main_job).await {
                report.failed += 1;
            }
        }
        for job in batches {
            report.batch_jobs += 1;
            if !run_with_attempts(&job, context, process_fanout_batch_job).await {
                report.failed += 1;
            }
        }
    }
}

async fn run_with_attempts<P, F, Fut>(job: &QueuedJob, context: &FanoutJobContext, run: F) -> bool
where
    P: DeserializeOwned + Clone,
    F: Fn(P, Data<FanoutJobContext>) -> Fut,
    Fut: Future<Output = Result<(), ApalisError>>,
{
    let payload: P = match decode(job) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(
                target = "feedline::infra::memory::runner",
                job_id = %job.id,
                error = %err,
                "dropping undecodable job"
            );
            return false;
        }
    };

    let attempts = job.record.max_attempts.max(1);
    for attempt in 1..=attempts {
        match run(payload.clone(), Data::new(context.clone())).await {
            Ok(()) => return true,
            Err(err) => {
                debug!(
                    target = "feedline::infra::memory::runner",
                    job_id = %job.id,
                    job_type = job.record.job_type.as_str(),
                    attempt,
                    error = %err,
                    "job attempt failed"
                );
            }
        }
    }
    false
}

fn decode<P: DeserializeOwned>(job: &QueuedJob) -> Result<P, ApalisError> {
    serde_json::from_value(job.record.payload.clone()).map_err(|err| {
        job_failed(RepoError::InvalidInput {
            message: format!("job payload: {err}"),
        })
    })
}
