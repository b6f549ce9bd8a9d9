use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::connection::{
    ConnectingError, ConnectionError, Connection, ConnectionState, MessagingError, MessagingReason,
};
use crate::history::{CommunicationHistory, CommunicationReport};
use crate::message::{Message, MessageAction};
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::storage::PluginSettings;

/// Path of the notification telling a plugin it was enabled or disabled
pub const PLUGIN_STATE_PATH: &str = "/plugin/state";

/// Registry entry for one discovered plugin.
///
/// Owns its connection exclusively. `enable`, `disable`, `apply`, `send` and
/// `dispose` are serialized per plugin; different plugins never wait on each other.
pub struct DevicePlugin {
    descriptor: PluginDescriptor,
    connection: Arc<dyn Connection>,
    settings: PluginSettings,
    history: CommunicationHistory,
    enabled: AtomicBool,
    max_connect_attempts: u32,
    op_lock: Mutex<()>,
}

impl fmt::Debug for DevicePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevicePlugin")
            .field("plugin_id", &self.descriptor.plugin_id)
            .field("component", &self.descriptor.component)
            .field("version", &self.descriptor.version)
            .field("enabled", &self.is_enabled())
            .field("state", &self.connection.state())
            .finish()
    }
}

impl DevicePlugin {
    pub fn new(
        descriptor: PluginDescriptor,
        connection: Arc<dyn Connection>,
        settings: PluginSettings,
        history_capacity: usize,
        baud_rate_capacity: usize,
        max_connect_attempts: u32,
    ) -> Self {
        let enabled = settings.is_enabled().unwrap_or_else(|e| {
            log::warn!("Plugin {}: cannot read enabled flag, assuming enabled: {}", descriptor.plugin_id, e);
            true
        });
        let history = CommunicationHistory::new(settings.clone(), history_capacity, baud_rate_capacity);
        Self {
            descriptor,
            connection,
            settings,
            history,
            enabled: AtomicBool::new(enabled),
            max_connect_attempts: max_connect_attempts.max(1),
            op_lock: Mutex::new(()),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.descriptor.plugin_id
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    pub fn history(&self) -> &CommunicationHistory {
        &self.history
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn supports_profile(&self, profile: &str) -> bool {
        self.descriptor.supports_profile(profile)
    }

    /// Enable the plugin and connect it
    pub async fn enable(&self) -> Result<(), ConnectingError> {
        let _guard = self.op_lock.lock().await;
        let changed = self.store_enabled(true);
        let result = self.apply_locked().await;
        if changed && self.connection.state() == ConnectionState::Connected {
            self.notify(MessageAction::PluginEnabled).await;
        }
        result
    }

    /// Disable the plugin and disconnect it. The plugin is told before the transport goes down.
    pub async fn disable(&self) {
        let _guard = self.op_lock.lock().await;
        if self.is_enabled() && self.connection.state() == ConnectionState::Connected {
            self.notify(MessageAction::PluginDisabled).await;
        }
        self.store_enabled(false);
        // Disconnecting cannot fail
        let _ = self.apply_locked().await;
    }

    /// Bring the connection in line with the enabled flag
    pub async fn apply(&self) -> Result<(), ConnectingError> {
        let _guard = self.op_lock.lock().await;
        self.apply_locked().await
    }

    pub async fn send(&self, message: &Message) -> Result<Option<Message>, MessagingError> {
        let _guard = self.op_lock.lock().await;
        if !self.is_enabled() {
            return Err(MessagingError::new(MessagingReason::NotEnabled));
        }
        if self.connection.state() == ConnectionState::Suspended {
            if let Err(e) = self.connect_with_retry().await {
                log::debug!("Plugin {}: still suspended: {}", self.plugin_id(), e);
                return Err(MessagingError::new(MessagingReason::ConnectionSuspended));
            }
        }
        self.connection.send(message).await
    }

    pub fn add_baud_rate(&self, request: &str, latency: u64) {
        self.history.add_baud_rate(request, latency);
    }

    pub fn report(&self) -> CommunicationReport {
        self.history.report()
    }

    /// Disconnect and forget every persisted setting
    pub async fn dispose(&self) {
        let _guard = self.op_lock.lock().await;
        self.connection.disconnect().await;
        if let Err(e) = self.settings.clear() {
            log::warn!("Plugin {}: failed to clear settings: {}", self.plugin_id(), e);
        }
    }

    async fn apply_locked(&self) -> Result<(), ConnectingError> {
        let state = self.connection.state();
        if self.is_enabled() {
            if state == ConnectionState::Disconnected {
                return self.connect_with_retry().await;
            }
        } else if matches!(state, ConnectionState::Connected | ConnectionState::Suspended) {
            self.connection.disconnect().await;
        }
        Ok(())
    }

    async fn connect_with_retry(&self) -> Result<(), ConnectingError> {
        let mut last_error = ConnectingError::new(ConnectionError::InternalError, "no connect attempt made");
        for attempt in 1..=self.max_connect_attempts {
            match self.connection.connect().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::debug!(
                        "Plugin {}: connect attempt {}/{} failed: {}",
                        self.plugin_id(),
                        attempt,
                        self.max_connect_attempts,
                        e
                    );
                    last_error = e;
                }
            }
        }
        log::warn!(
            "Plugin {}: giving up after {} connect attempts: {}",
            self.plugin_id(),
            self.max_connect_attempts,
            last_error
        );
        Err(last_error)
    }

    /// Returns whether the flag changed
    fn store_enabled(&self, enabled: bool) -> bool {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if let Err(e) = self.settings.set_enabled(enabled) {
            log::warn!("Plugin {}: failed to persist enabled={}: {}", self.plugin_id(), enabled, e);
        }
        previous != enabled
    }

    async fn notify(&self, action: MessageAction) {
        let message = Message::new(action, PLUGIN_STATE_PATH);
        if let Err(e) = self.connection.send(&message).await {
            log::warn!("Plugin {}: {:?} notification not delivered: {}", self.plugin_id(), action, e);
        }
    }
}
