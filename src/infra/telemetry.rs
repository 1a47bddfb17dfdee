use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
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
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Install the process-wide Prometheus recorder and describe every metric.
///
/// Descriptions only reach a recorder that is already installed, so this is
/// the single place they are registered.
pub fn install_metrics_exporter() -> Result<PrometheusHandle, InfraError> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|err| {
        InfraError::telemetry(format!("failed to install metrics recorder: {err}"))
    })?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "scorecast_cache_hit_total",
            Unit::Count,
            "Prediction lookups answered from the cache."
        );
        describe_counter!(
            "scorecast_cache_miss_total",
            Unit::Count,
            "Prediction lookups that had to be computed."
        );
        describe_counter!(
            "scorecast_cache_error_total",
            Unit::Count,
            "Cache operations that failed or timed out and were absorbed."
        );
        describe_counter!(
            "scorecast_predict_items_total",
            Unit::Count,
            "Feature vectors evaluated by a model."
        );
        describe_histogram!(
            "scorecast_batch_size",
            Unit::Count,
            "Number of students per batch request."
        );
        describe_histogram!(
            "scorecast_predict_ms",
            Unit::Milliseconds,
            "Model evaluation latency for the cache misses of one request."
        );
    });
}
