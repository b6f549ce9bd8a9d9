//! Concrete events carried by the crate's dispatchers.
use std::sync::Arc;

use crate::connection::ConnectionState;
use crate::event::Event;
use crate::plugin_system::DevicePlugin;

/// Events fanned out by the plugin manager to its `DevicePluginEventListener`s
#[derive(Debug, Clone)]
pub enum PluginEvent {
    DeviceFound(Arc<DevicePlugin>),
    DeviceLost(Arc<DevicePlugin>),
    ConnectionStateChanged {
        plugin: Arc<DevicePlugin>,
        state: ConnectionState,
    },
    /// A rediscovered plugin replaced an existing registry entry with the same id
    PluginOverwritten {
        previous: Arc<DevicePlugin>,
        current: Arc<DevicePlugin>,
    },
}

impl PluginEvent {
    /// Id of the plugin the event is about (the new entry for overwrites)
    pub fn plugin_id(&self) -> &str {
        match self {
            PluginEvent::DeviceFound(plugin)
            | PluginEvent::DeviceLost(plugin)
            | PluginEvent::ConnectionStateChanged { plugin, .. }
            | PluginEvent::PluginOverwritten { current: plugin, .. } => plugin.plugin_id(),
        }
    }
}

impl Event for PluginEvent {
    fn name(&self) -> &'static str {
        match self {
            PluginEvent::DeviceFound(_) => "plugin.device_found",
            PluginEvent::DeviceLost(_) => "plugin.device_lost",
            PluginEvent::ConnectionStateChanged { .. } => "plugin.connection_state_changed",
            PluginEvent::PluginOverwritten { .. } => "plugin.overwritten",
        }
    }
}

/// A state transition of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStateEvent {
    pub plugin_id: String,
    pub state: ConnectionState,
}

impl Event for ConnectionStateEvent {
    fn name(&self) -> &'static str {
        "connection.state_changed"
    }
}
