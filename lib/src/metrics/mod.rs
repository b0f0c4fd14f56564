// lib/src/metrics/mod.rs

pub mod metrics_recorder;
pub mod metrics_report;

pub use metrics_recorder::{MetricSample, MetricSeries, MetricsRecorder};
pub use metrics_report::MetricsReport;

pub const PINATA_UPLOAD_MS: &str = "pinata_upload_ms";
pub const DRAFT_CREATION_MS: &str = "draft_creation_ms";
pub const FINALIZATION_MS: &str = "finalization_ms";
pub const GAS_FINALIZE: &str = "gas_finalize";
pub const API_LATENCY_PREFIX: &str = "api_latency:";

pub fn api_latency_metric(method: &str, path: &str) -> String {
    format!("{}{} {}", API_LATENCY_PREFIX, method, path)
}
