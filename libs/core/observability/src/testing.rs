//! Helpers for asserting on rendered metrics without a global recorder.
//!
//! ```rust,ignore
//! let recorder = observability::testing::local_recorder();
//! metrics::with_local_recorder(&recorder, || TaskMetrics::started("Get documents"));
//! let rendered = recorder.handle().render();
//! assert_eq!(sample_value(&rendered, "mongodb_client_test_started_tasks_total", &[]), Some(1.0));
//! ```

use metrics_exporter_prometheus::PrometheusRecorder;

use crate::{MetricsLabels, prometheus_builder};

/// Recorder configured like the global one, for use with `metrics::with_local_recorder`
pub fn local_recorder() -> PrometheusRecorder {
    prometheus_builder(&MetricsLabels::new("3.4.1"))
        .expect("valid bucket layout")
        .build_recorder()
}

/// Value of the first sample of `name` whose labels contain all of `labels`
pub fn sample_value(rendered: &str, name: &str, labels: &[&str]) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.split(['{', ' ']).next() == Some(name)
                && labels.iter().all(|label| line.contains(label))
        })
        .find_map(|line| line.rsplit(' ').next()?.parse().ok())
}
