use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::ConnectionState;
use crate::event::{BoxFuture, Listens, PluginEvent};
use crate::plugin_system::device_plugin::DevicePlugin;

/// Observer of the plugin manager. Every callback has an empty default.
///
/// Callbacks run one at a time on the manager's event worker, in the order the
/// manager produced them.
#[async_trait]
pub trait DevicePluginEventListener: Send + Sync {
    async fn on_device_found(&self, _plugin: Arc<DevicePlugin>) {}

    async fn on_device_lost(&self, _plugin: Arc<DevicePlugin>) {}

    async fn on_connection_state_changed(&self, _plugin: Arc<DevicePlugin>, _state: ConnectionState) {}

    async fn on_plugin_overwritten(&self, _previous: Arc<DevicePlugin>, _current: Arc<DevicePlugin>) {}
}

impl Listens<PluginEvent> for dyn DevicePluginEventListener {
    fn deliver<'a>(&'a self, event: &'a PluginEvent) -> BoxFuture<'a> {
        match event {
            PluginEvent::DeviceFound(plugin) => self.on_device_found(plugin.clone()),
            PluginEvent::DeviceLost(plugin) => self.on_device_lost(plugin.clone()),
            PluginEvent::ConnectionStateChanged { plugin, state } => {
                self.on_connection_state_changed(plugin.clone(), *state)
            }
            PluginEvent::PluginOverwritten { previous, current } => {
                self.on_plugin_overwritten(previous.clone(), current.clone())
            }
        }
    }
}
