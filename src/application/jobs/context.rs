use std::{sync::Arc, time::Duration};

use apalis::prelude::Error as ApalisError;

use crate::application::fanout::{BatchWorker, FanoutCoordinator};

/// Shared context passed to fanout workers.
#[derive(Clone)]
pub struct FanoutJobContext {
    pub coordinator: Arc<FanoutCoordinator>,
    pub worker: Arc<BatchWorker>,
    /// Execution budget for one batch attempt.
    pub batch_time_limit: Duration,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
