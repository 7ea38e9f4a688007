//! API call metrics
//!
//! - `ccb_api_requests_total` (counter): labels `method`, `status`
//! - `ccb_api_transport_errors_total` (counter): label `method`
//!
//! Calls are no-ops unless the host application installs a recorder.

pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "ccb_api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_transport_error(method: &str) {
    metrics::counter!("ccb_api_transport_errors_total", "method" => method.to_string())
        .increment(1);
}
