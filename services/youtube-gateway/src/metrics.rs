//! Prometheus metrics exposition
//!
//! - `gateway_requests_total` (counter): labels `route`, `status`
//! - `gateway_request_duration_seconds` (histogram): label `route`
//! - `gateway_upstream_errors_total` (counter): label `kind`
//! - `gateway_token_refreshes_total` (counter): label `outcome`, recorded by
//!   the credential store
//! - `gateway_audit_dropped_total` (counter): audit records lost to a full queue

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const REQUEST_DURATION: &str = "gateway_request_duration_seconds";

/// 5ms to 60s. Upstream calls have no timeout of their own, so the tail is long.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)
}

/// Install the global Prometheus recorder and return its render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Handle backed by a recorder that is not installed globally.
#[cfg(test)]
pub fn isolated_recorder() -> (metrics_exporter_prometheus::PrometheusRecorder, PrometheusHandle) {
    let recorder = builder()
        .expect("valid histogram buckets")
        .build_recorder();
    let handle = recorder.handle();
    (recorder, handle)
}

/// Record a completed request against its matched route.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "route" => route.to_string()).record(duration_secs);
}

/// Record a failed upstream operation with its classification.
pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("gateway_upstream_errors_total", "kind" => kind).increment(1);
}

/// Record an audit record dropped because the writer fell behind.
pub fn record_audit_dropped() {
    metrics::counter!("gateway_audit_dropped_total").increment(1);
}
