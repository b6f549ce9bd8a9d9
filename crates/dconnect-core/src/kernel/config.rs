//! Runtime configuration of the plugin core.
use std::path::Path;

use crate::kernel::constants;
use crate::storage::{ConfigData, StorageProvider, StorageResult, load_config_file};

/// Tunables of the plugin core. Every field has a default, so an empty
/// configuration document yields [`CoreConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Trailing domain of every application-facing service id
    pub domain: String,
    /// Connect attempts per retry sequence, at least one
    pub max_connect_attempts: u32,
    /// Size of each responded / not-responded history bucket
    pub history_capacity: usize,
    /// Number of recent latency samples kept per plugin
    pub baud_rate_capacity: usize,
    /// Bound of every event queue
    pub event_queue_capacity: usize,
    /// Component metadata key marking a component as a device plugin
    pub plugin_metadata_key: String,
    /// Unanswered requests tracked at once, at least one
    pub max_pending_requests: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            domain: constants::DEFAULT_DOMAIN.to_string(),
            max_connect_attempts: constants::DEFAULT_MAX_CONNECT_ATTEMPTS,
            history_capacity: constants::DEFAULT_HISTORY_CAPACITY,
            baud_rate_capacity: constants::DEFAULT_BAUD_RATE_CAPACITY,
            event_queue_capacity: constants::DEFAULT_EVENT_QUEUE_CAPACITY,
            plugin_metadata_key: constants::PLUGIN_METADATA_KEY.to_string(),
            max_pending_requests: constants::DEFAULT_MAX_PENDING_REQUESTS,
        }
    }
}

impl CoreConfig {
    pub const KEY_DOMAIN: &'static str = "domain";
    pub const KEY_MAX_CONNECT_ATTEMPTS: &'static str = "maxConnectAttempts";
    pub const KEY_HISTORY_CAPACITY: &'static str = "historyCapacity";
    pub const KEY_BAUD_RATE_CAPACITY: &'static str = "baudRateCapacity";
    pub const KEY_EVENT_QUEUE_CAPACITY: &'static str = "eventQueueCapacity";
    pub const KEY_PLUGIN_METADATA_KEY: &'static str = "pluginMetadataKey";
    pub const KEY_MAX_PENDING_REQUESTS: &'static str = "maxPendingRequests";

    /// Missing or mistyped keys fall back to defaults; unknown keys are ignored
    pub fn from_config_data(data: &ConfigData) -> Self {
        let defaults = Self::default();
        Self {
            domain: data.get_or(Self::KEY_DOMAIN, defaults.domain),
            max_connect_attempts: data
                .get_or(Self::KEY_MAX_CONNECT_ATTEMPTS, defaults.max_connect_attempts)
                .max(1),
            history_capacity: data.get_or(Self::KEY_HISTORY_CAPACITY, defaults.history_capacity),
            baud_rate_capacity: data.get_or(Self::KEY_BAUD_RATE_CAPACITY, defaults.baud_rate_capacity),
            event_queue_capacity: data
                .get_or(Self::KEY_EVENT_QUEUE_CAPACITY, defaults.event_queue_capacity)
                .max(1),
            plugin_metadata_key: data.get_or(Self::KEY_PLUGIN_METADATA_KEY, defaults.plugin_metadata_key),
            max_pending_requests: data
                .get_or(Self::KEY_MAX_PENDING_REQUESTS, defaults.max_pending_requests)
                .max(1),
        }
    }

    pub fn to_config_data(&self) -> StorageResult<ConfigData> {
        let mut data = ConfigData::new();
        data.set(Self::KEY_DOMAIN, &self.domain)?;
        data.set(Self::KEY_MAX_CONNECT_ATTEMPTS, self.max_connect_attempts)?;
        data.set(Self::KEY_HISTORY_CAPACITY, self.history_capacity)?;
        data.set(Self::KEY_BAUD_RATE_CAPACITY, self.baud_rate_capacity)?;
        data.set(Self::KEY_EVENT_QUEUE_CAPACITY, self.event_queue_capacity)?;
        data.set(Self::KEY_PLUGIN_METADATA_KEY, &self.plugin_metadata_key)?;
        data.set(Self::KEY_MAX_PENDING_REQUESTS, self.max_pending_requests)?;
        Ok(data)
    }

    /// Load from a `.json`, `.toml` or `.yaml` file relative to the provider root
    pub fn load<P: StorageProvider + ?Sized>(provider: &P, path: &Path) -> StorageResult<Self> {
        let data = load_config_file(provider, path)?;
        Ok(Self::from_config_data(&data))
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts.max(1);
        self
    }

    pub fn with_max_pending_requests(mut self, requests: usize) -> Self {
        self.max_pending_requests = requests.max(1);
        self
    }
}
