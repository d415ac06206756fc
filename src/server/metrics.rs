use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Metric name prefix for all mirror metrics
const PREFIX: &str = "registry_mirror";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        prometheus::HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Mirror Engine Metrics
    pub static ref PACKAGES_PROCESSED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_packages_processed_total"),
        "Change records fully processed and emitted"
    ).expect("Failed to create packages_processed_total metric");

    pub static ref TARBALLS_DOWNLOADED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_tarballs_downloaded_total"),
        "Tarballs downloaded into the store"
    ).expect("Failed to create tarballs_downloaded_total metric");

    pub static ref DOWNLOAD_FAILURES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_download_failures_total"),
        "Per-version tarball download failures"
    ).expect("Failed to create download_failures_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PACKAGES_PROCESSED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TARBALLS_DOWNLOADED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DOWNLOAD_FAILURES_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method])
        .observe(duration.as_secs_f64());
}

/// Handler for the metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        init_metrics();

        PACKAGES_PROCESSED_TOTAL.inc();
        let families = REGISTRY.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == format!("{PREFIX}_packages_processed_total")));
    }
}
