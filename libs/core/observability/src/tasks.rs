//! Metrics for the polling tasks.

use metrics::{counter, histogram};
use std::time::Duration;

pub const TASK_DURATION: &str = "mongodb_client_test_task_duration";
pub const TASKS_TOTAL: &str = "mongodb_client_test_tasks_total";
pub const STARTED_TASKS_TOTAL: &str = "mongodb_client_test_started_tasks_total";
pub const TIME_TO_FIRST_QUERY_DURATION: &str = "mongodb_client_test_time_to_first_query_duration";

/// Task metrics recorder
pub struct TaskMetrics;

impl TaskMetrics {
    /// Record a task about to run
    pub fn started(title: &str) {
        counter!(STARTED_TASKS_TOTAL, "title" => title.to_string()).increment(1);
    }

    /// Record a completed task
    pub fn succeeded(title: &str, elapsed: Duration) {
        Self::finished(title, "success", elapsed);
    }

    /// Record a failed task
    pub fn failed(title: &str, elapsed: Duration) {
        Self::finished(title, "failure", elapsed);
    }

    /// Time from a disconnect to the first task that succeeded after it
    pub fn first_query_after(outage: Duration) {
        histogram!(TIME_TO_FIRST_QUERY_DURATION).record(outage.as_secs_f64());
    }

    fn finished(title: &str, result: &'static str, elapsed: Duration) {
        histogram!(TASK_DURATION).record(elapsed.as_secs_f64());
        counter!(TASKS_TOTAL, "result" => result, "title" => title.to_string()).increment(1);
    }
}
