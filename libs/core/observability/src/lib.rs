//! Observability utilities for the MongoDB client test harness.
//!
//! This crate provides:
//! - Prometheus recorder setup with the static driver labels and bucket layout
//! - Task and driver event metrics
//! - Axum middleware for automatic request metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, MetricsLabels, TaskMetrics};
//!
//! init_metrics(&MetricsLabels::new("3.4.1"))?;
//!
//! TaskMetrics::started("Get documents");
//!
//! let app = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

pub mod driver;
pub mod middleware;
pub mod tasks;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use driver::DriverMetrics;
pub use tasks::TaskMetrics;

use axum::http::header;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Prefix shared by every harness metric
pub const METRICS_PREFIX: &str = "mongodb_client_test_";

/// Histogram buckets in seconds for task and reconnect durations
pub const DURATION_BUCKETS: [f64; 12] = [
    0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 45.0, 60.0, 90.0, 120.0,
];

/// Buckets for `http_request_duration_seconds`
const HTTP_BUCKETS: [f64; 8] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

/// Content type of the text exposition format
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Static labels attached to every series
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricsLabels {
    pub runtime: String,
    pub driver: String,
    pub driver_version: String,
}

impl MetricsLabels {
    pub fn new(driver_version: impl Into<String>) -> Self {
        Self {
            runtime: "rust".to_string(),
            driver: "mongodb".to_string(),
            driver_version: driver_version.into(),
        }
    }

    /// `<driver>-<version>`, e.g. `mongodb-3.4.1`
    pub fn driver_with_version(&self) -> String {
        format!("{}-{}", self.driver, self.driver_version)
    }
}

/// Exporter builder with the global labels and histogram buckets applied.
///
/// Used by [`init_metrics`]; tests build a local recorder from it.
pub fn prometheus_builder(labels: &MetricsLabels) -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .add_global_label("runtime", labels.runtime.clone())
        .add_global_label("driver", labels.driver.clone())
        .add_global_label("driverVersion", labels.driver_version.clone())
        .add_global_label("driverWithVersion", labels.driver_with_version())
        .set_buckets_for_metric(Matcher::Prefix(METRICS_PREFIX.to_string()), &DURATION_BUCKETS)?
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &HTTP_BUCKETS,
        )
}

/// Initialize the Prometheus metrics recorder.
///
/// Installs the global recorder on the first call; later calls return the
/// existing handle.
pub fn init_metrics(labels: &MetricsLabels) -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = prometheus_builder(labels)?.install_recorder()?;

        info!(
            driver = %labels.driver_with_version(),
            "Prometheus metrics recorder initialized"
        );

        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render the global registry, or a comment line before initialization
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Axum handler for /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        render_metrics(),
    )
}

/// Drain histogram buffers periodically so rendering stays cheap
pub fn spawn_upkeep(handle: &'static PrometheusHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            handle.run_upkeep();
        }
    })
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    // Task metrics
    describe_histogram!(tasks::TASK_DURATION, "duration of the task, in seconds");
    describe_counter!(
        tasks::TASKS_TOTAL,
        "counter for tracking the number of executed tasks"
    );
    describe_counter!(
        tasks::STARTED_TASKS_TOTAL,
        "counter for tracking the number of tasks that have been started"
    );
    describe_histogram!(
        tasks::TIME_TO_FIRST_QUERY_DURATION,
        "duration of the interval between a disconnection and the completion of the first task, in seconds"
    );

    // Driver metrics
    describe_counter!(
        driver::DRIVER_EVENTS_TOTAL,
        "counter for tracking MongoDB driver events"
    );
    describe_counter!(
        driver::CONNECTION_EVENTS_TOTAL,
        "counter for tracking MongoDB connection events"
    );
    describe_counter!(
        driver::PRIMARY_CHANGE_TOTAL,
        "counter for tracking when MongoDB's primary node changes"
    );
    describe_gauge!(
        driver::HAS_PRIMARY_NODE,
        "gauge for tracking if the mongo cluster has elected a primary or not (0=No, 1=Yes)"
    );
    describe_histogram!(
        driver::RECONNECT_DURATION,
        "duration of the reconnection to the mongo cluster, in seconds"
    );

    // HTTP metrics
    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );
}
