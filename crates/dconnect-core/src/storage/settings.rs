//! Per-plugin persisted settings.
//!
//! A [`SettingsStore`] keeps one [`ConfigData`] document per plugin id. The
//! store is synchronous and every [`update`](SettingsStore::update) is applied
//! as one unit: either all of the closure's changes land or none do.
//! [`PluginSettings`] is the typed view a single plugin works through.
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

use crate::storage::config::{ConfigData, ConfigFormat};
use crate::storage::provider::{StorageProvider, StorageResult};

pub const KEY_ENABLED: &str = "enabled";
pub const KEY_AVERAGE_BAUD_RATE: &str = "averageBaudRate";
pub const KEY_WORST_BAUD_RATE: &str = "worstBaudRate";
pub const KEY_WORST_BAUD_RATE_REQUEST: &str = "worstBaudRateRequest";
pub const KEY_RESPONDED_HISTORY: &str = "respondedHistory";
pub const KEY_NOT_RESPONDED_HISTORY: &str = "notRespondedHistory";

/// Durable key-value storage, partitioned by plugin id
pub trait SettingsStore: Send + Sync + Debug {
    /// Load the document for a plugin; an unknown plugin yields an empty document
    fn load(&self, plugin_id: &str) -> StorageResult<ConfigData>;

    /// Read-modify-write the document for a plugin as one unit
    fn update(
        &self,
        plugin_id: &str,
        apply: &mut dyn FnMut(&mut ConfigData) -> StorageResult<()>,
    ) -> StorageResult<()>;

    /// Drop everything stored for a plugin
    fn clear(&self, plugin_id: &str) -> StorageResult<()>;
}

/// Volatile store, used by tests and by hosts without durable storage
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    documents: Mutex<HashMap<String, ConfigData>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every plugin with a stored document
    pub fn plugin_ids(&self) -> Vec<String> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.keys().cloned().collect()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self, plugin_id: &str) -> StorageResult<ConfigData> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(plugin_id).cloned().unwrap_or_default())
    }

    fn update(
        &self,
        plugin_id: &str,
        apply: &mut dyn FnMut(&mut ConfigData) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working = documents.get(plugin_id).cloned().unwrap_or_default();
        apply(&mut working)?;
        documents.insert(plugin_id.to_string(), working);
        Ok(())
    }

    fn clear(&self, plugin_id: &str) -> StorageResult<()> {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.remove(plugin_id);
        Ok(())
    }
}

/// Store writing one JSON document per plugin through a [`StorageProvider`]
#[derive(Debug)]
pub struct FileSettingsStore<P: StorageProvider + ?Sized> {
    provider: Arc<P>,
    directory: PathBuf,
    // Serializes read-modify-write cycles against the same directory
    write_lock: Mutex<()>,
}

impl<P: StorageProvider + ?Sized> FileSettingsStore<P> {
    /// `directory` is relative to the provider root
    pub fn new(provider: Arc<P>, directory: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            directory: directory.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn document_path(&self, plugin_id: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", plugin_id, ConfigFormat::Json.extension()))
    }

    fn read_document(&self, path: &Path) -> StorageResult<ConfigData> {
        if !self.provider.is_file(path) {
            return Ok(ConfigData::new());
        }
        let content = self.provider.read_to_string(path)?;
        ConfigData::deserialize(&content, ConfigFormat::Json)
    }
}

impl<P: StorageProvider + ?Sized> SettingsStore for FileSettingsStore<P> {
    fn load(&self, plugin_id: &str) -> StorageResult<ConfigData> {
        self.read_document(&self.document_path(plugin_id))
    }

    fn update(
        &self,
        plugin_id: &str,
        apply: &mut dyn FnMut(&mut ConfigData) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.document_path(plugin_id);
        let mut working = self.read_document(&path)?;
        apply(&mut working)?;
        let content = working.serialize(ConfigFormat::Json)?;
        self.provider.write_string(&path, &content)
    }

    fn clear(&self, plugin_id: &str) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.document_path(plugin_id);
        if self.provider.exists(&path) {
            self.provider.remove_file(&path)?;
        }
        Ok(())
    }
}

/// Persisted latency statistics of one plugin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedBaudRates {
    pub average: Option<u64>,
    pub worst: Option<u64>,
    pub worst_request: Option<String>,
}

/// Typed handle onto the settings of a single plugin
#[derive(Debug, Clone)]
pub struct PluginSettings {
    plugin_id: String,
    store: Arc<dyn SettingsStore>,
}

impl PluginSettings {
    pub fn new(plugin_id: impl Into<String>, store: Arc<dyn SettingsStore>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            store,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// Read a single value, `None` when absent or unreadable
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> StorageResult<Option<T>> {
        Ok(self.store.load(&self.plugin_id)?.get(key))
    }

    /// Plugins are enabled until someone says otherwise
    pub fn is_enabled(&self) -> StorageResult<bool> {
        Ok(self.get(KEY_ENABLED)?.unwrap_or(true))
    }

    pub fn set_enabled(&self, enabled: bool) -> StorageResult<()> {
        self.update(|data| data.set(KEY_ENABLED, enabled))
    }

    pub fn baud_rates(&self) -> StorageResult<PersistedBaudRates> {
        let data = self.store.load(&self.plugin_id)?;
        Ok(PersistedBaudRates {
            average: data.get(KEY_AVERAGE_BAUD_RATE),
            worst: data.get(KEY_WORST_BAUD_RATE),
            worst_request: data.get(KEY_WORST_BAUD_RATE_REQUEST),
        })
    }

    pub fn set_baud_rates(&self, rates: &PersistedBaudRates) -> StorageResult<()> {
        self.update(|data| write_baud_rates(data, rates))
    }

    /// Apply several changes to this plugin's document as one write
    pub fn update<F>(&self, mut apply: F) -> StorageResult<()>
    where
        F: FnMut(&mut ConfigData) -> StorageResult<()>,
    {
        self.store.update(&self.plugin_id, &mut apply)
    }

    /// Remove every persisted setting of this plugin
    pub fn clear(&self) -> StorageResult<()> {
        self.store.clear(&self.plugin_id)
    }
}

/// Write (or remove, for `None`) the three statistics keys on a document
pub fn write_baud_rates(data: &mut ConfigData, rates: &PersistedBaudRates) -> StorageResult<()> {
    match rates.average {
        Some(average) => data.set(KEY_AVERAGE_BAUD_RATE, average)?,
        None => {
            data.remove(KEY_AVERAGE_BAUD_RATE);
        }
    }
    match rates.worst {
        Some(worst) => data.set(KEY_WORST_BAUD_RATE, worst)?,
        None => {
            data.remove(KEY_WORST_BAUD_RATE);
        }
    }
    match &rates.worst_request {
        Some(request) => data.set(KEY_WORST_BAUD_RATE_REQUEST, request)?,
        None => {
            data.remove(KEY_WORST_BAUD_RATE_REQUEST);
        }
    }
    Ok(())
}
