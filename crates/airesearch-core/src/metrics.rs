use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

use crate::model::AgentRole;

struct PipelineMetrics {
    stage_runs: Counter<u64>,
    stage_duration_ms: Histogram<f64>,
    pipeline_runs: Counter<u64>,
}

static METRICS: OnceCell<PipelineMetrics> = OnceCell::new();

fn handles() -> &'static PipelineMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("airesearch.pipeline");
        PipelineMetrics {
            stage_runs: meter
                .u64_counter("stage_runs_total")
                .with_description("Stage executions by stage and status")
                .init(),
            stage_duration_ms: meter
                .f64_histogram("stage_duration_ms")
                .with_description("Stage runtime in milliseconds")
                .init(),
            pipeline_runs: meter
                .u64_counter("pipeline_runs_total")
                .with_description("Completed pipeline runs by status")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) {
    if std::env::var("AIRESEARCH_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "AIRESEARCH_OTEL_METRICS_ENDPOINT detected for {service_name}. Configure an OTLP meter provider in your deployment to export pipeline metrics."
        );
    }
}

/// Record one stage execution (no-op if no provider installed).
pub fn record_stage_metrics(stage: AgentRole, status: &str, duration_ms: u64) {
    let metrics = handles();
    let attrs = [
        KeyValue::new("stage", stage.as_str()),
        KeyValue::new("status", status.to_string()),
    ];

    metrics.stage_runs.add(1, &attrs);
    metrics.stage_duration_ms.record(duration_ms as f64, &attrs);
}

/// Record the end of a pipeline run.
pub fn record_run_metrics(status: &str) {
    handles()
        .pipeline_runs
        .add(1, &[KeyValue::new("status", status.to_string())]);
}
