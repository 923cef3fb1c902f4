//! Prometheus metrics for story-service.
//!
//! Provides HTTP and generation-specific metrics for observability.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{Once, OnceLock};

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Generation metrics
pub static GENERATION_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GENERATION_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Session log metrics
pub static SESSION_LOG_APPENDS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

static INIT: Once = Once::new();

/// Initialize all metrics. Safe to call more than once; later calls are no-ops.
pub fn init_metrics() {
    INIT.call_once(register_metrics);
}

fn register_metrics() {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("Failed to create http_requests_total metric");

    let http_request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["method", "path"],
    )
    .expect("Failed to create http_request_duration_seconds metric");

    // outcome: success or a GenerationError kind
    let generation_requests = IntCounterVec::new(
        Opts::new("generation_requests_total", "Total generation requests"),
        &["mode", "outcome"],
    )
    .expect("Failed to create generation_requests_total metric");

    let generation_latency = HistogramVec::new(
        HistogramOpts::new(
            "generation_latency_seconds",
            "Generation API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["mode"],
    )
    .expect("Failed to create generation_latency_seconds metric");

    let session_log_appends = IntCounter::new(
        "session_log_appends_total",
        "Total entries appended to session logs",
    )
    .expect("Failed to create session_log_appends_total metric");

    registry
        .register(Box::new(http_requests_total.clone()))
        .expect("Failed to register http_requests_total");
    registry
        .register(Box::new(http_request_duration.clone()))
        .expect("Failed to register http_request_duration_seconds");
    registry
        .register(Box::new(generation_requests.clone()))
        .expect("Failed to register generation_requests_total");
    registry
        .register(Box::new(generation_latency.clone()))
        .expect("Failed to register generation_latency_seconds");
    registry
        .register(Box::new(session_log_appends.clone()))
        .expect("Failed to register session_log_appends_total");

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(http_request_duration);
    let _ = GENERATION_REQUESTS_TOTAL.set(generation_requests);
    let _ = GENERATION_LATENCY_SECONDS.set(generation_latency);
    let _ = SESSION_LOG_APPENDS_TOTAL.set(session_log_appends);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

/// Record a completed HTTP request.
pub fn record_http_request(method: &str, path: &str, status: &str, duration_secs: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

/// Record a finished generation call.
pub fn record_generation(mode: &str, outcome: &str, duration_secs: f64) {
    if let Some(counter) = GENERATION_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[mode, outcome]).inc();
    }
    if let Some(histogram) = GENERATION_LATENCY_SECONDS.get() {
        histogram.with_label_values(&[mode]).observe(duration_secs);
    }
}

/// Record an entry appended to a session log.
pub fn record_log_append() {
    if let Some(counter) = SESSION_LOG_APPENDS_TOTAL.get() {
        counter.inc();
    }
}
