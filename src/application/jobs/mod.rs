mod context;
mod fanout;
mod queue;

pub use context::{FanoutJobContext, job_failed};
pub use fanout::{
    FanoutBatchJobPayload, FanoutMainJobPayload, enqueue_fanout_batch_job,
    enqueue_fanout_main_job, process_fanout_batch_job, process_fanout_main_job,
};
pub use queue::enqueue_job;
