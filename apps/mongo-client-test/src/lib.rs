//! MongoDB client test harness.
//!
//! Polls a collection on a fixed cadence and exports task latency, task
//! results and driver lifecycle events as Prometheus metrics:
//!
//! - [`events`]: driver event listeners and the shared connection state
//! - [`samples`]: the placeholder collection, its repository and seeding
//! - [`poller`]: the query / sleep loop
//! - [`server`]: `/metrics` endpoint
//! - [`shutdown`]: SIGINT / SIGTERM handling

pub mod config;
pub mod events;
pub mod poller;
pub mod samples;
pub mod server;
pub mod shutdown;

/// Version of the `mongodb` crate this harness is built against, reported
/// in the `driverVersion` label. Keep in sync with the workspace manifest.
pub const DRIVER_VERSION: &str = "3.4.1";
