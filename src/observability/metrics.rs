//! Prometheus metrics for source calls and pipeline steps.
//!
//! Recording is always safe: without an installed recorder the `metrics`
//! macros are no-ops, so library code and tests never need to call [`init`].

use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    SourcesRequestsSuccess,
    SourcesRequestsError,
    SourcesRequestDuration,
    PipelineRuns,
    PipelineStepOutcomes,
    PipelineDuration,
    ReportsGenerated,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourcesRequestsSuccess => "genre_pulse_sources_requests_success_total",
            MetricName::SourcesRequestsError => "genre_pulse_sources_requests_error_total",
            MetricName::SourcesRequestDuration => "genre_pulse_sources_request_duration_seconds",
            MetricName::PipelineRuns => "genre_pulse_pipeline_runs_total",
            MetricName::PipelineStepOutcomes => "genre_pulse_pipeline_step_outcomes_total",
            MetricName::PipelineDuration => "genre_pulse_pipeline_duration_seconds",
            MetricName::ReportsGenerated => "genre_pulse_reports_generated_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Render the current metrics in the Prometheus text format.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|h| h.render())
}

pub mod sources {
    use super::MetricName;

    pub fn request_success(source: &'static str) {
        ::metrics::counter!(MetricName::SourcesRequestsSuccess.as_str(), "source" => source).increment(1);
    }

    pub fn request_error(source: &'static str) {
        ::metrics::counter!(MetricName::SourcesRequestsError.as_str(), "source" => source).increment(1);
    }

    pub fn request_duration(source: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::SourcesRequestDuration.as_str(), "source" => source).record(secs);
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn run_started() {
        ::metrics::counter!(MetricName::PipelineRuns.as_str()).increment(1);
    }

    pub fn step_outcome(step: &'static str, outcome: &'static str) {
        ::metrics::counter!(
            MetricName::PipelineStepOutcomes.as_str(),
            "step" => step,
            "outcome" => outcome
        )
        .increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(secs);
    }

    pub fn report_generated() {
        ::metrics::counter!(MetricName::ReportsGenerated.as_str()).increment(1);
    }
}
