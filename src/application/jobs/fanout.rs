use apalis::prelude::{Data, Error as ApalisError};
use metrics::counter;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, info};

use crate::{
    application::fanout::{FanoutError, METRIC_FANOUT_BATCHES},
    application::repos::{JobsRepo, RepoError},
    domain::types::{Backend, JobType},
};

use super::{
    context::{FanoutJobContext, job_failed},
    queue::enqueue_job,
};

const FANOUT_MAIN_PRIORITY: i32 = 10;
const FANOUT_BATCH_PRIORITY: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutMainJobPayload {
    pub content_id: i64,
    pub publisher_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub backend: Backend,
}

/// One chunk of subscribers receiving the same entry.
///
/// `created_at` is the publication time, not the time the batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutBatchJobPayload {
    pub content_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub backend: Backend,
    pub owner_ids: Vec<i64>,
}

pub async fn enqueue_fanout_main_job<J: JobsRepo + ?Sized>(
    repo: &J,
    payload: &FanoutMainJobPayload,
    max_attempts: i32,
) -> Result<String, RepoError> {
    enqueue_job(
        repo,
        JobType::FanoutMain,
        payload,
        None,
        max_attempts,
        FANOUT_MAIN_PRIORITY,
    )
    .await
}

pub async fn enqueue_fanout_batch_job<J: JobsRepo + ?Sized>(
    repo: &J,
    payload: &FanoutBatchJobPayload,
    max_attempts: i32,
) -> Result<String, RepoError> {
    enqueue_job(
        repo,
        JobType::FanoutBatch,
        payload,
        None,
        max_attempts,
        FANOUT_BATCH_PRIORITY,
    )
    .await
}

pub async fn process_fanout_main_job(
    payload: FanoutMainJobPayload,
    context: Data<FanoutJobContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;
    match ctx.coordinator.schedule_batches(&payload).await {
        Ok(job_ids) => {
            info!(
                target = "feedline::application::jobs::process_fanout_main_job",
                content_id = payload.content_id,
                batches = job_ids.len(),
                "fanout main job finished"
            );
            Ok(())
        }
        Err(err) => {
            error!(
                target = "feedline::application::jobs::process_fanout_main_job",
                content_id = payload.content_id,
                publisher_id = payload.publisher_id,
                error = %err,
                "fanout main job failed"
            );
            Err(job_failed(err))
        }
    }
}

/// Run one batch under the configured execution budget.
///
/// Overrunning the budget fails the attempt; the queue's retry policy
/// decides whether it runs again.
pub async fn process_fanout_batch_job(
    payload: FanoutBatchJobPayload,
    context: Data<FanoutJobContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;
    let budget = ctx.batch_time_limit;

    let err = match tokio::time::timeout(budget, ctx.worker.run(&payload)).await {
        Ok(Ok(_)) => return Ok(()),
        Ok(Err(err)) => err,
        Err(_) => {
            counter!(METRIC_FANOUT_BATCHES, "outcome" => "timed_out").increment(1);
            FanoutError::TimedOut {
                content_id: payload.content_id,
                budget_secs: budget.as_secs(),
            }
        }
    };

    error!(
        target = "feedline::application::jobs::process_fanout_batch_job",
        content_id = payload.content_id,
        owners = payload.owner_ids.len(),
        backend = payload.backend.as_str(),
        error = %err,
        "fanout batch failed"
    );
    Err(job_failed(err))
}
