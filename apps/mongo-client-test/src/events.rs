//! Driver event listeners.
//!
//! Each listener logs its share of the driver lifecycle and bumps
//! `driver_events_total{eventName, value}`. [`ConnectionStateListener`]
//! additionally derives connect / disconnect transitions from topology
//! changes and publishes them through [`ConnectionState`].

use database::mongodb::{DriverEvent, DriverEventListener, TopologyKind, node_name};
use observability::DriverMetrics;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Server opening / closed / description changed
#[derive(Debug, Default)]
pub struct ServerListener;

impl DriverEventListener for ServerListener {
    fn on_event(&self, event: &DriverEvent) {
        match event {
            DriverEvent::ServerOpening { address, topology_id } => {
                let node = node_name(address);
                info!(node = %node, topology_id = %topology_id, "Server opening");
                DriverMetrics::event(event.name(), &node);
            }
            DriverEvent::ServerClosed { address, topology_id } => {
                let node = node_name(address);
                warn!(node = %node, topology_id = %topology_id, "Server closed");
                DriverMetrics::event(event.name(), &node);
            }
            DriverEvent::ServerDescriptionChanged {
                address,
                previous_type,
                new_type,
            } => {
                if previous_type != new_type {
                    info!(
                        node = %node_name(address),
                        "Server description changed: {previous_type} --> {new_type}"
                    );
                } else {
                    debug!(node = %node_name(address), "Server description changed: {new_type}");
                }
                DriverMetrics::event(event.name(), "");
            }
            _ => {}
        }
    }
}

/// Heartbeat started / succeeded / failed
#[derive(Debug, Default)]
pub struct HeartbeatListener;

impl DriverEventListener for HeartbeatListener {
    fn on_event(&self, event: &DriverEvent) {
        match event {
            DriverEvent::HeartbeatStarted { address } => {
                let node = node_name(address);
                debug!(node = %node, "Heartbeat started");
                DriverMetrics::event(event.name(), &node);
            }
            DriverEvent::HeartbeatSucceeded { address, duration } => {
                let node = node_name(address);
                debug!(node = %node, duration_ms = duration.as_millis() as u64, "Heartbeat succeeded");
                DriverMetrics::event(event.name(), &node);
            }
            DriverEvent::HeartbeatFailed {
                address,
                duration,
                failure,
            } => {
                let node = node_name(address);
                error!(
                    node = %node,
                    duration_ms = duration.as_millis() as u64,
                    error = %failure,
                    "Heartbeat failed"
                );
                DriverMetrics::event(event.name(), &node);
            }
            _ => {}
        }
    }
}

/// Topology opening / closed / description changed; tracks the primary
#[derive(Debug, Default)]
pub struct TopologyListener {
    primary: Mutex<Option<String>>,
}

impl TopologyListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node name of the last primary seen
    pub fn primary(&self) -> Option<String> {
        lock(&self.primary).clone()
    }

    fn track_primary(&self, new: TopologyKind, primary: Option<&str>) {
        match new {
            TopologyKind::ReplicaSetWithPrimary => {
                DriverMetrics::set_has_primary(true);

                let Some(address) = primary else {
                    return;
                };
                let node = node_name(address);
                let mut current = lock(&self.primary);
                if current.as_deref() != Some(node.as_str()) {
                    info!(
                        previous = current.as_deref().unwrap_or("none"),
                        primary = %node,
                        "Primary changed"
                    );
                    DriverMetrics::primary_changed(&node);
                    *current = Some(node);
                }
            }
            TopologyKind::ReplicaSetNoPrimary => {
                warn!("Replica set has no primary");
                DriverMetrics::set_has_primary(false);
            }
            _ => {}
        }
    }
}

impl DriverEventListener for TopologyListener {
    fn on_event(&self, event: &DriverEvent) {
        match event {
            DriverEvent::TopologyOpening { topology_id } => {
                info!(topology_id = %topology_id, "Topology opening");
                DriverMetrics::event(event.name(), "");
            }
            DriverEvent::TopologyClosed { topology_id } => {
                warn!(topology_id = %topology_id, "Topology closed");
                DriverMetrics::event(event.name(), "");
            }
            DriverEvent::TopologyDescriptionChanged {
                topology_id,
                previous,
                new,
                primary,
            } => {
                if previous != new {
                    info!(
                        topology_id = %topology_id,
                        "Topology description changed: {previous} --> {new}"
                    );
                } else {
                    debug!(topology_id = %topology_id, "Topology description changed: {new}");
                }
                self.track_primary(*new, primary.as_deref());
                DriverMetrics::event(event.name(), "");
            }
            _ => {}
        }
    }
}

/// Connection status shared by the state listener and the poller
#[derive(Debug, Default)]
pub struct ConnectionState {
    connected: AtomicBool,
    ever_connected: AtomicBool,
    disconnected_at: Mutex<Option<Instant>>,
    /// Set by a disconnect, cleared by the first successful task after it
    first_query_since: Mutex<Option<Instant>>,
    /// Tasks started while disconnected, reported once connected again
    disconnected_executions: AtomicU64,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Time since the last disconnect, once per disconnect
    pub fn take_first_query_wait(&self) -> Option<Duration> {
        lock(&self.first_query_since)
            .take()
            .map(|since| since.elapsed())
    }

    pub fn count_disconnected_execution(&self) {
        self.disconnected_executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks started while disconnected since the last call
    pub fn take_disconnected_executions(&self) -> u64 {
        self.disconnected_executions.swap(0, Ordering::Relaxed)
    }

    /// Mark connected. `None` when already connected; a reconnect carries
    /// the time spent disconnected.
    pub(crate) fn connect(&self) -> Option<Transition> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return None;
        }
        if !self.ever_connected.swap(true, Ordering::SeqCst) {
            return Some(Transition::Connected);
        }
        let outage = lock(&self.disconnected_at)
            .take()
            .map(|since| since.elapsed())
            .unwrap_or_default();
        Some(Transition::Reconnected(outage))
    }

    /// Mark disconnected. Returns false when already disconnected.
    pub(crate) fn disconnect(&self) -> bool {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        *lock(&self.disconnected_at) = Some(now);
        lock(&self.first_query_since).get_or_insert(now);
        true
    }
}

pub(crate) enum Transition {
    Connected,
    Reconnected(Duration),
}

/// Turns topology changes into connected / disconnected / reconnected
#[derive(Debug)]
pub struct ConnectionStateListener {
    state: Arc<ConnectionState>,
}

impl ConnectionStateListener {
    pub fn new(state: Arc<ConnectionState>) -> Self {
        Self { state }
    }

    fn connected(&self) {
        match self.state.connect() {
            None => {}
            Some(Transition::Connected) => {
                info!("Connected to MongoDB");
                DriverMetrics::connection_event("connected");
            }
            Some(Transition::Reconnected(outage)) => {
                info!(
                    outage_ms = outage.as_millis() as u64,
                    "Reconnected to MongoDB"
                );
                DriverMetrics::connection_event("connected");
                DriverMetrics::connection_event("reconnected");
                DriverMetrics::reconnected_after(outage);
            }
        }
    }

    fn disconnected(&self) {
        if self.state.disconnect() {
            warn!("Disconnected from MongoDB");
            DriverMetrics::connection_event("disconnected");
        }
    }
}

impl DriverEventListener for ConnectionStateListener {
    fn on_event(&self, event: &DriverEvent) {
        match event {
            DriverEvent::TopologyDescriptionChanged { new, .. } => {
                if new.is_usable() {
                    self.connected();
                } else {
                    self.disconnected();
                }
            }
            DriverEvent::TopologyClosed { .. } => self.disconnected(),
            _ => {}
        }
    }
}
