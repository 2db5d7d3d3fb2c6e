//! Prometheus metrics for the refresh pipeline.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it. The
//! metrics expose only aggregate job and request counts; restrict the endpoint at
//! the network level if those are sensitive in your deployment.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Import job lifecycle
pub static IMPORT_JOBS_STARTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "dircache_import_jobs_started_total",
        "Total number of import jobs started",
    )
    .expect("metric creation failed")
});

pub static IMPORT_JOBS_FINISHED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dircache_import_jobs_finished_total",
            "Total number of import jobs finished by final status",
        ),
        &["status"],
    )
    .expect("metric creation failed")
});

pub static IMPORT_JOBS_ACTIVE: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "dircache_import_jobs_active",
        "Number of import jobs currently running in this process",
    )
    .expect("metric creation failed")
});

pub static IMPORT_JOB_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dircache_import_job_duration_seconds",
            "Import job duration by final status",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["status"],
    )
    .expect("metric creation failed")
});

pub static IMPORT_JOBS_PANICKED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "dircache_import_jobs_panicked_total",
        "Total number of import tasks that panicked",
    )
    .expect("metric creation failed")
});

// Ingestion
pub static IMPORT_PAGES_FETCHED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dircache_import_pages_fetched_total",
            "Directory pages requested by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static IMPORT_RECORDS_INGESTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "dircache_import_records_ingested_total",
        "Normalized franchise records written to the cache",
    )
    .expect("metric creation failed")
});

pub static IMPORT_RECORDS_DROPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "dircache_import_records_dropped_total",
        "Directory rows dropped because no field was recognized",
    )
    .expect("metric creation failed")
});

// HTTP
pub static HTTP_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dircache_http_requests_total",
            "HTTP requests served by response status class",
        ),
        &["status"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests and embedded routers may call it freely.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(IMPORT_JOBS_STARTED.clone()),
            Box::new(IMPORT_JOBS_FINISHED.clone()),
            Box::new(IMPORT_JOBS_ACTIVE.clone()),
            Box::new(IMPORT_JOB_DURATION.clone()),
            Box::new(IMPORT_JOBS_PANICKED.clone()),
            Box::new(IMPORT_PAGES_FETCHED.clone()),
            Box::new(IMPORT_RECORDS_INGESTED.clone()),
            Box::new(IMPORT_RECORDS_DROPPED.clone()),
            Box::new(HTTP_REQUESTS.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Count a served request under its status class (`2xx`, `4xx`, ...).
pub fn record_http_request(status: StatusCode) {
    let class = match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    };
    HTTP_REQUESTS.with_label_values(&[class]).inc();
}
