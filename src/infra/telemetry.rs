use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::Telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "feedline_cache_hit_total",
            Unit::Count,
            "Feed list reads served from the list store."
        );
        describe_counter!(
            "feedline_cache_miss_total",
            Unit::Count,
            "Feed list reads that reloaded from the store of record."
        );
        describe_counter!(
            "feedline_cache_error_total",
            Unit::Count,
            "List store operations that failed and fell back."
        );
        describe_counter!(
            "feedline_feed_pages_total",
            Unit::Count,
            "Feed pages served, labelled by the source that answered."
        );
        describe_counter!(
            "feedline_fanout_batches_total",
            Unit::Count,
            "Fanout batch jobs finished, labelled by outcome."
        );
        describe_counter!(
            "feedline_fanout_entries_written_total",
            Unit::Count,
            "Feed entries newly created by fanout batches."
        );
        describe_histogram!(
            "feedline_fanout_batch_ms",
            Unit::Milliseconds,
            "Fanout batch execution latency in milliseconds."
        );
    });
}
