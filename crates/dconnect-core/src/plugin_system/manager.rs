use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;

use crate::connection::{
    BoundServiceConnection, BroadcastConnection, Connection, ConnectionState, ConnectionStateListener,
    ConnectionType, InProcessConnection,
};
use crate::event::{EventDispatcher, EventSystemError, PluginEvent};
use crate::history::CommunicationRecord;
use crate::kernel::component::KernelComponent;
use crate::kernel::config::CoreConfig;
use crate::kernel::error::Result as KernelResult;
use crate::message::Message;
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::device_plugin::DevicePlugin;
use crate::plugin_system::error::{PluginDetectionError, PluginSystemError};
use crate::plugin_system::host::{ComponentCandidate, ComponentKind, ComponentName, HostBridge};
use crate::plugin_system::listener::DevicePluginEventListener;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::routing::AddressCodec;
use crate::storage::{PluginSettings, SettingsStore};

type PluginEvents = EventDispatcher<PluginEvent, dyn DevicePluginEventListener>;

/// A request sent to a plugin and not yet answered
#[derive(Debug, Clone)]
struct PendingRequest {
    plugin_id: String,
    /// Plugin-local service id the request was sent with
    service_id: Option<String>,
    path: String,
    start: i64,
    /// Request code chosen by the application
    original_code: Option<u32>,
}

/// An event from a plugin, readdressed for the application
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedEvent {
    pub plugin_id: String,
    /// Flattened component name of the application that registered for the event
    pub receiver: Option<String>,
    pub message: Message,
}

/// Forwards connection transitions into the manager's own event queue
struct StateRelay {
    registry: Weak<PluginRegistry>,
    events: PluginEvents,
}

#[async_trait]
impl ConnectionStateListener for StateRelay {
    async fn on_connection_state_changed(&self, plugin_id: &str, state: ConnectionState) {
        let Some(plugin) = self.registry.upgrade().and_then(|r| r.get(plugin_id)) else {
            return;
        };
        let event = PluginEvent::ConnectionStateChanged { plugin, state };
        if let Err(e) = self.events.publish(event).await {
            log::warn!("Dropped state change of plugin {}: {}", plugin_id, e);
        }
    }
}

/// Discovers device plugins, owns their registry entries and routes traffic to them
pub struct DevicePluginManager {
    name: &'static str,
    host: Arc<dyn HostBridge>,
    store: Arc<dyn SettingsStore>,
    registry: Arc<PluginRegistry>,
    config: CoreConfig,
    codec: AddressCodec,
    events: PluginEvents,
    relay: Arc<dyn ConnectionStateListener>,
    pending: Mutex<HashMap<u32, PendingRequest>>,
    next_request_code: AtomicU32,
}

impl fmt::Debug for DevicePluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevicePluginManager")
            .field("name", &self.name)
            .field("host_package", &self.host.host_package())
            .field("plugins", &self.registry.len())
            .field("domain", &self.codec.domain())
            .finish()
    }
}

impl DevicePluginManager {
    /// Needs a running Tokio runtime: spawns the manager's event worker.
    pub fn new(
        host: Arc<dyn HostBridge>,
        store: Arc<dyn SettingsStore>,
        registry: Arc<PluginRegistry>,
        config: CoreConfig,
    ) -> Self {
        let events = PluginEvents::new("plugin-manager", config.event_queue_capacity);
        let relay: Arc<dyn ConnectionStateListener> = Arc::new(StateRelay {
            registry: Arc::downgrade(&registry),
            events: events.clone(),
        });
        Self {
            name: "DevicePluginManager",
            host,
            store,
            registry,
            codec: AddressCodec::new(config.domain.clone()),
            config,
            events,
            relay,
            pending: Mutex::new(HashMap::new()),
            next_request_code: AtomicU32::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn codec(&self) -> &AddressCodec {
        &self.codec
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn add_event_listener(&self, listener: Arc<dyn DevicePluginEventListener>) -> bool {
        self.events.add_listener(listener)
    }

    pub fn remove_event_listener(&self, listener: &Arc<dyn DevicePluginEventListener>) -> bool {
        self.events.remove_listener(listener)
    }

    /// Wait until every pending connection and manager notification has been delivered
    pub async fn flush_events(&self) -> Result<(), EventSystemError> {
        for plugin in self.registry.all() {
            plugin.connection().flush_events().await?;
        }
        self.events.flush().await
    }

    // ---- discovery ----

    /// Scan every installed package and register the plugins found.
    ///
    /// Additive: a rediscovered plugin overwrites its old entry, plugins that
    /// disappeared stay until [`remove_plugin`](Self::remove_plugin). On a host
    /// error the plugins registered before it are kept.
    pub async fn discover_plugins(&self) -> Result<Vec<Arc<DevicePlugin>>, PluginSystemError> {
        let packages = self.host.installed_packages().await?;
        let mut found = Vec::new();
        for package in &packages {
            for plugin in self.create_plugins(package).await? {
                self.register(plugin.clone()).await;
                found.push(plugin);
            }
        }
        log::info!(
            "Discovered {} device plugin(s) in {} package(s)",
            found.len(),
            packages.len()
        );
        Ok(found)
    }

    /// A package was installed or updated: register and connect its plugins
    pub async fn add_plugin(&self, package: &str) -> Result<Vec<Arc<DevicePlugin>>, PluginSystemError> {
        let plugins = self.create_plugins(package).await?;
        for plugin in &plugins {
            self.register(plugin.clone()).await;
            if let Err(e) = plugin.apply().await {
                log::warn!("Plugin {} added but not connected: {}", plugin.plugin_id(), e);
            }
        }
        Ok(plugins)
    }

    /// A package was uninstalled: dispose of its plugins and forget their unanswered requests
    pub async fn remove_plugin(&self, package: &str) -> Vec<Arc<DevicePlugin>> {
        let doomed = self.registry.filter(|p| p.descriptor().package() == package);
        for plugin in &doomed {
            self.registry.remove(plugin.plugin_id());
            self.lock_pending().retain(|_, request| request.plugin_id != plugin.plugin_id());
            plugin.connection().remove_connection_state_listener(&self.relay);
            plugin.dispose().await;
            log::info!("Device plugin {} ({}) lost", plugin.plugin_id(), plugin.descriptor().component);
            self.publish(PluginEvent::DeviceLost(plugin.clone())).await;
        }
        doomed
    }

    async fn create_plugins(&self, package: &str) -> Result<Vec<Arc<DevicePlugin>>, PluginDetectionError> {
        let candidates = self.host.components(package).await?;
        Ok(candidates
            .into_iter()
            .filter_map(|candidate| self.create_plugin(candidate))
            .collect())
    }

    fn create_plugin(&self, candidate: ComponentCandidate) -> Option<Arc<DevicePlugin>> {
        let key = self.config.plugin_metadata_key.as_str();
        if !candidate.metadata.contains_key(key) {
            return None;
        }
        let own_package = candidate.name.package == self.host.host_package();
        if !candidate.exported && !own_package {
            log::debug!("Skipping unexported component {}", candidate.name);
            return None;
        }

        let local = if own_package {
            self.host.local_endpoint(&candidate.name)
        } else {
            None
        };
        let connection_type = match (&local, candidate.kind) {
            (Some(_), _) => ConnectionType::InProcess,
            (None, ComponentKind::Service) => ConnectionType::BoundService,
            (None, ComponentKind::Receiver) => ConnectionType::Broadcast,
        };

        let descriptor = match PluginDescriptor::from_candidate(&candidate, key, connection_type) {
            Ok(descriptor) => descriptor?,
            Err(e) => {
                log::warn!("Ignoring component {}: {}", candidate.name, e);
                return None;
            }
        };

        let plugin_id = descriptor.plugin_id.clone();
        let capacity = self.config.event_queue_capacity;
        let connection: Arc<dyn Connection> = match local {
            Some(endpoint) => Arc::new(InProcessConnection::new(plugin_id.clone(), endpoint, capacity)),
            None => match candidate.kind {
                ComponentKind::Service => Arc::new(BoundServiceConnection::new(
                    plugin_id.clone(),
                    candidate.name.clone(),
                    self.host.service_binder(),
                    capacity,
                )),
                ComponentKind::Receiver => Arc::new(BroadcastConnection::new(
                    plugin_id.clone(),
                    self.host.broadcast_endpoint(&candidate.name),
                    capacity,
                )),
            },
        };

        let settings = PluginSettings::new(plugin_id, self.store.clone());
        Some(Arc::new(DevicePlugin::new(
            descriptor,
            connection,
            settings,
            self.config.history_capacity,
            self.config.baud_rate_capacity,
            self.config.max_connect_attempts,
        )))
    }

    async fn register(&self, plugin: Arc<DevicePlugin>) {
        // Let the old entry's pending transitions reach the relay while its id still maps to it
        if let Some(existing) = self.registry.get(plugin.plugin_id()) {
            if let Err(e) = existing.connection().flush_events().await {
                log::debug!("Plugin {}: {}", existing.plugin_id(), e);
            }
        }
        plugin.connection().add_connection_state_listener(self.relay.clone());
        match self.registry.insert(plugin.clone()) {
            Some(previous) => {
                previous.connection().remove_connection_state_listener(&self.relay);
                previous.connection().disconnect().await;
                log::warn!(
                    "Device plugin {} ({}) overwritten: version {} replaced by {}",
                    plugin.plugin_id(),
                    plugin.descriptor().component,
                    previous.descriptor().version,
                    plugin.descriptor().version
                );
                self.publish(PluginEvent::PluginOverwritten {
                    previous,
                    current: plugin,
                })
                .await;
            }
            None => {
                log::info!(
                    "Device plugin {} found: {} ({}, {})",
                    plugin.plugin_id(),
                    plugin.descriptor().name,
                    plugin.descriptor().component,
                    plugin.descriptor().connection_type
                );
                self.publish(PluginEvent::DeviceFound(plugin)).await;
            }
        }
    }

    async fn publish(&self, event: PluginEvent) {
        if let Err(e) = self.events.publish(event).await {
            log::warn!("{}: {}", self.name, e);
        }
    }

    // ---- queries ----

    /// Plugins addressed by an application-facing service id.
    ///
    /// `None` when the id lacks the domain suffix or names no known plugin.
    pub fn get_device_plugins(&self, service_id: &str) -> Option<Vec<Arc<DevicePlugin>>> {
        let plugin_id = self.codec.plugin_id_from_service_id(service_id)?;
        self.registry.get(plugin_id).map(|plugin| vec![plugin])
    }

    pub fn device_plugin(&self, plugin_id: &str) -> Option<Arc<DevicePlugin>> {
        self.registry.get(plugin_id)
    }

    pub fn device_plugins(&self) -> Vec<Arc<DevicePlugin>> {
        self.registry.all()
    }

    pub fn enabled_device_plugins(&self) -> Vec<Arc<DevicePlugin>> {
        self.registry.filter(|p| p.is_enabled())
    }

    pub fn device_plugins_by_profile(&self, profile: &str) -> Vec<Arc<DevicePlugin>> {
        self.registry.filter(|p| p.supports_profile(profile))
    }

    // ---- routing ----

    /// Route an application request by its service id.
    ///
    /// Returns the readdressed response when the transport answered inline.
    pub async fn send(&self, message: &Message) -> Result<Option<Message>, PluginSystemError> {
        let Some(service_id) = message.service_id.as_deref() else {
            return Err(PluginSystemError::MissingServiceId {
                path: message.path.clone(),
            });
        };
        let plugin_id = self
            .codec
            .plugin_id_from_service_id(service_id)
            .ok_or_else(|| PluginSystemError::UnknownServiceId(service_id.to_string()))?;
        let plugin = self
            .registry
            .get(plugin_id)
            .ok_or_else(|| PluginSystemError::PluginNotFound(plugin_id.to_string()))?;

        let mut outgoing = message.clone();
        outgoing.service_id = self.codec.split_plugin_id_to_service_id(plugin_id, service_id);
        self.dispatch(&plugin, outgoing).await
    }

    /// Route a request addressed to a plugin rather than one of its services
    pub async fn send_to_plugin(
        &self,
        plugin_id: &str,
        message: &Message,
    ) -> Result<Option<Message>, PluginSystemError> {
        let plugin = self
            .registry
            .get(plugin_id)
            .ok_or_else(|| PluginSystemError::PluginNotFound(plugin_id.to_string()))?;
        let mut outgoing = message.clone();
        outgoing.service_id = None;
        self.dispatch(&plugin, outgoing).await
    }

    async fn dispatch(
        &self,
        plugin: &Arc<DevicePlugin>,
        mut outgoing: Message,
    ) -> Result<Option<Message>, PluginSystemError> {
        let plugin_id = plugin.plugin_id();
        if let Some(session_key) = outgoing.session_key.take() {
            // Only a component name can be read back out of the key
            let receiver = match outgoing.origin.as_deref() {
                Some(origin) if ComponentName::unflatten(origin).is_none() => {
                    log::warn!(
                        "Plugin {}: origin '{}' is not a component name, events will carry no receiver",
                        plugin_id,
                        origin
                    );
                    None
                }
                origin => origin,
            };
            outgoing.session_key = Some(AddressCodec::append_session_key(&session_key, plugin_id, receiver));
        }

        let code = self.next_request_code.fetch_add(1, Ordering::Relaxed);
        let request = PendingRequest {
            plugin_id: plugin_id.to_string(),
            service_id: outgoing.service_id.clone(),
            path: outgoing.path.clone(),
            start: now_millis(),
            original_code: outgoing.request_code,
        };
        if let Some(dropped) = self.track(code, request) {
            log::warn!("Plugin {}: too many unanswered requests, dropping {}", dropped.plugin_id, dropped.path);
            self.record_timeout(&dropped);
        }
        outgoing.request_code = Some(code);

        match plugin.send(&outgoing).await {
            Ok(Some(mut response)) => {
                response.request_code.get_or_insert(code);
                self.deliver_response(plugin_id, response).map(Some)
            }
            Ok(None) => Ok(None),
            Err(source) => {
                self.lock_pending().remove(&code);
                Err(PluginSystemError::Messaging {
                    plugin_id: plugin_id.to_string(),
                    source,
                })
            }
        }
    }

    /// Match a plugin's response to its request, record the round trip and
    /// readdress the response for the application
    pub fn deliver_response(&self, plugin_id: &str, mut response: Message) -> Result<Message, PluginSystemError> {
        let code = response.request_code.ok_or_else(|| PluginSystemError::MissingRequestCode {
            path: response.path.clone(),
        })?;
        let pending = {
            let mut pending = self.lock_pending();
            let ours = pending.get(&code).is_some_and(|request| request.plugin_id == plugin_id);
            if ours { pending.remove(&code) } else { None }
        }
        .ok_or(PluginSystemError::UnknownRequest(code))?;

        let end = now_millis();
        if let Some(plugin) = self.registry.get(plugin_id) {
            let record = CommunicationRecord::new(pending.service_id.clone(), pending.path.clone(), pending.start, end);
            plugin
                .history()
                .record_response(record, end.saturating_sub(pending.start).max(0) as u64);
        }

        let local_id = response.service_id.take().or(pending.service_id);
        response.service_id = Some(self.codec.append_service_id(plugin_id, local_id.as_deref()));
        response.request_code = pending.original_code;
        Ok(response)
    }

    /// Give up on requests older than `timeout`, recording each as not responded.
    /// Returns how many expired.
    pub fn expire_requests(&self, timeout: Duration) -> usize {
        let now = now_millis();
        let limit = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        let mut expired = Vec::new();
        self.lock_pending().retain(|_, request| {
            if now.saturating_sub(request.start) >= limit {
                expired.push(request.clone());
                false
            } else {
                true
            }
        });

        for request in &expired {
            log::warn!("Plugin {}: request {} timed out", request.plugin_id, request.path);
            self.record_timeout(request);
        }
        expired.len()
    }

    /// Remember a request, returning the oldest one when the table was full
    fn track(&self, code: u32, request: PendingRequest) -> Option<PendingRequest> {
        let mut pending = self.lock_pending();
        let oldest = if pending.len() >= self.config.max_pending_requests {
            pending
                .iter()
                .min_by_key(|(tracked, request)| (request.start, **tracked))
                .map(|(tracked, _)| *tracked)
        } else {
            None
        };
        let dropped = oldest.and_then(|oldest| pending.remove(&oldest));
        pending.insert(code, request);
        dropped
    }

    fn record_timeout(&self, request: &PendingRequest) {
        if let Some(plugin) = self.registry.get(&request.plugin_id) {
            plugin.history().add(CommunicationRecord::timed_out(
                request.service_id.clone(),
                request.path.clone(),
                request.start,
            ));
        }
    }

    pub fn pending_request_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Readdress an event published by a plugin: restore the application's
    /// session key and service id, and tell who should receive it
    pub fn deliver_event(&self, mut event: Message) -> Result<RoutedEvent, PluginSystemError> {
        let Some(raw) = event.session_key.take() else {
            return Err(PluginSystemError::MissingSessionKey { path: event.path });
        };
        let mut candidates = AddressCodec::parse_session_key_candidates(&raw);
        if candidates.is_empty() {
            return Err(PluginSystemError::InvalidSessionKey(raw));
        }
        let parts = match candidates.iter().position(|parts| self.registry.contains(&parts.plugin_id)) {
            Some(index) => candidates.swap_remove(index),
            None => return Err(PluginSystemError::PluginNotFound(candidates.swap_remove(0).plugin_id)),
        };

        event.session_key = Some(parts.session_key);
        event.service_id = Some(
            self.codec
                .append_service_id(&parts.plugin_id, event.service_id.as_deref()),
        );
        event.origin = parts.receiver.clone();
        Ok(RoutedEvent {
            plugin_id: parts.plugin_id,
            receiver: parts.receiver,
            message: event,
        })
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<u32, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KernelComponent for DevicePluginManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> KernelResult<()> {
        self.discover_plugins().await?;
        Ok(())
    }

    async fn start(&self) -> KernelResult<()> {
        for plugin in self.registry.all() {
            if let Err(e) = plugin.apply().await {
                log::warn!("Plugin {} did not connect: {}", plugin.plugin_id(), e);
            }
        }
        Ok(())
    }

    async fn stop(&self) -> KernelResult<()> {
        for plugin in self.registry.all() {
            plugin.connection().disconnect().await;
        }
        self.flush_events().await?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
