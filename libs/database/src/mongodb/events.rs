//! Driver lifecycle events
//!
//! The driver reports server, heartbeat and topology changes through a
//! single SDAM callback. [`EventDispatcher`] converts each callback into a
//! [`DriverEvent`] and fans it out to every registered
//! [`DriverEventListener`], so listeners never depend on driver types.

use mongodb::{
    ServerType, TopologyType,
    event::{EventHandler, sdam::SdamEvent},
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Topology type as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyKind {
    Single,
    ReplicaSetNoPrimary,
    ReplicaSetWithPrimary,
    Sharded,
    LoadBalanced,
    Unknown,
}

impl TopologyKind {
    /// Whether queries can be served in this topology
    pub fn is_usable(self) -> bool {
        matches!(
            self,
            Self::Single | Self::ReplicaSetWithPrimary | Self::Sharded | Self::LoadBalanced
        )
    }
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "Single",
            Self::ReplicaSetNoPrimary => "ReplicaSetNoPrimary",
            Self::ReplicaSetWithPrimary => "ReplicaSetWithPrimary",
            Self::Sharded => "Sharded",
            Self::LoadBalanced => "LoadBalanced",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

impl From<TopologyType> for TopologyKind {
    fn from(value: TopologyType) -> Self {
        match value {
            TopologyType::Single => Self::Single,
            TopologyType::ReplicaSetNoPrimary => Self::ReplicaSetNoPrimary,
            TopologyType::ReplicaSetWithPrimary => Self::ReplicaSetWithPrimary,
            TopologyType::Sharded => Self::Sharded,
            TopologyType::LoadBalanced => Self::LoadBalanced,
            _ => Self::Unknown,
        }
    }
}

/// A driver lifecycle notification, stripped down to what listeners log and count
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    ServerOpening {
        address: String,
        topology_id: String,
    },
    ServerClosed {
        address: String,
        topology_id: String,
    },
    ServerDescriptionChanged {
        address: String,
        previous_type: String,
        new_type: String,
    },
    HeartbeatStarted {
        address: String,
    },
    HeartbeatSucceeded {
        address: String,
        duration: Duration,
    },
    HeartbeatFailed {
        address: String,
        duration: Duration,
        failure: String,
    },
    TopologyOpening {
        topology_id: String,
    },
    TopologyClosed {
        topology_id: String,
    },
    TopologyDescriptionChanged {
        topology_id: String,
        previous: TopologyKind,
        new: TopologyKind,
        /// Address of the primary in the new description, if any
        primary: Option<String>,
    },
}

impl DriverEvent {
    /// Event name used in logs and as the `eventName` metric label
    pub fn name(&self) -> &'static str {
        match self {
            Self::ServerOpening { .. } => "serverOpening",
            Self::ServerClosed { .. } => "serverClosed",
            Self::ServerDescriptionChanged { .. } => "serverDescriptionChanged",
            Self::HeartbeatStarted { .. } => "serverHeartbeatStarted",
            Self::HeartbeatSucceeded { .. } => "serverHeartbeatSucceeded",
            Self::HeartbeatFailed { .. } => "serverHeartbeatFailed",
            Self::TopologyOpening { .. } => "topologyOpening",
            Self::TopologyClosed { .. } => "topologyClosed",
            Self::TopologyDescriptionChanged { .. } => "topologyDescriptionChanged",
        }
    }

    /// Convert a driver callback. Returns `None` for event kinds this
    /// crate does not know about.
    pub fn from_sdam(event: SdamEvent) -> Option<Self> {
        let converted = match event {
            SdamEvent::ServerOpening(e) => Self::ServerOpening {
                address: e.address.to_string(),
                topology_id: e.topology_id.to_hex(),
            },
            SdamEvent::ServerClosed(e) => Self::ServerClosed {
                address: e.address.to_string(),
                topology_id: e.topology_id.to_hex(),
            },
            SdamEvent::ServerDescriptionChanged(e) => Self::ServerDescriptionChanged {
                address: e.address.to_string(),
                previous_type: format!("{:?}", e.previous_description.server_type()),
                new_type: format!("{:?}", e.new_description.server_type()),
            },
            SdamEvent::ServerHeartbeatStarted(e) => Self::HeartbeatStarted {
                address: e.server_address.to_string(),
            },
            SdamEvent::ServerHeartbeatSucceeded(e) => Self::HeartbeatSucceeded {
                address: e.server_address.to_string(),
                duration: e.duration,
            },
            SdamEvent::ServerHeartbeatFailed(e) => Self::HeartbeatFailed {
                address: e.server_address.to_string(),
                duration: e.duration,
                failure: e.failure.to_string(),
            },
            SdamEvent::TopologyOpening(e) => Self::TopologyOpening {
                topology_id: e.topology_id.to_hex(),
            },
            SdamEvent::TopologyClosed(e) => Self::TopologyClosed {
                topology_id: e.topology_id.to_hex(),
            },
            SdamEvent::TopologyDescriptionChanged(e) => {
                let primary = e
                    .new_description
                    .servers()
                    .into_iter()
                    .find(|(_, info)| info.server_type() == ServerType::RsPrimary)
                    .map(|(address, _)| address.to_string());

                Self::TopologyDescriptionChanged {
                    topology_id: e.topology_id.to_hex(),
                    previous: e.previous_description.topology_type().into(),
                    new: e.new_description.topology_type().into(),
                    primary,
                }
            }
            _ => return None,
        };
        Some(converted)
    }
}

/// Short name of a server: host without port, cut at the first dot.
///
/// `db-0.cluster.example.net:27017` becomes `db-0`. IP literals are kept
/// whole since their dots are not DNS labels.
pub fn node_name(address: &str) -> String {
    let host = match address.strip_prefix('[') {
        // [::1]:27017
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => address.rsplit_once(':').map_or(address, |(host, _)| host),
    };

    if host.parse::<std::net::IpAddr>().is_ok() {
        return host.to_string();
    }

    host.split('.').next().unwrap_or(host).to_string()
}

/// Receives every driver event, in emission order
pub trait DriverEventListener: Send + Sync {
    fn on_event(&self, event: &DriverEvent);
}

/// Fans driver events out to a fixed set of listeners
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn DriverEventListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener owned by the dispatcher
    pub fn with_listener(self, listener: impl DriverEventListener + 'static) -> Self {
        self.with_shared_listener(Arc::new(listener))
    }

    /// Register a listener that is also held elsewhere
    pub fn with_shared_listener(mut self, listener: Arc<dyn DriverEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&self, event: &DriverEvent) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }

    /// Driver callback that converts and dispatches every SDAM event
    pub fn into_handler(self) -> EventHandler<SdamEvent> {
        EventHandler::callback(move |event: SdamEvent| {
            if let Some(event) = DriverEvent::from_sdam(event) {
                self.dispatch(&event);
            }
        })
    }
}
