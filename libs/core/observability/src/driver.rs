//! Driver lifecycle metrics.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

pub const DRIVER_EVENTS_TOTAL: &str = "mongodb_client_test_driver_events_total";
pub const CONNECTION_EVENTS_TOTAL: &str = "mongodb_client_test_connection_events_total";
pub const PRIMARY_CHANGE_TOTAL: &str = "mongodb_client_test_primary_change_total";
pub const HAS_PRIMARY_NODE: &str = "mongodb_client_test_has_primary_node";
pub const RECONNECT_DURATION: &str = "mongodb_client_test_reconnect_duration";

/// Driver metrics recorder
pub struct DriverMetrics;

impl DriverMetrics {
    /// Count a driver event; `value` is a node name or empty
    pub fn event(event_name: &'static str, value: &str) {
        counter!(
            DRIVER_EVENTS_TOTAL,
            "eventName" => event_name,
            "value" => value.to_string()
        )
        .increment(1);
    }

    /// Count a connection state transition (`connected`, `disconnected`, `reconnected`)
    pub fn connection_event(event_name: &'static str) {
        counter!(CONNECTION_EVENTS_TOTAL, "eventName" => event_name).increment(1);
    }

    pub fn primary_changed(node_name: &str) {
        counter!(PRIMARY_CHANGE_TOTAL, "nodeName" => node_name.to_string()).increment(1);
    }

    pub fn set_has_primary(has_primary: bool) {
        gauge!(HAS_PRIMARY_NODE).set(if has_primary { 1.0 } else { 0.0 });
    }

    /// Time spent disconnected before the latest reconnect
    pub fn reconnected_after(elapsed: Duration) {
        histogram!(RECONNECT_DURATION).record(elapsed.as_secs_f64());
    }
}
