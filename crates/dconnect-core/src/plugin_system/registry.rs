use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::plugin_system::device_plugin::DevicePlugin;

/// Concurrent id → plugin map. Internally locked; share it by `Arc`.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<DevicePlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the entry that was replaced
    pub fn insert(&self, plugin: Arc<DevicePlugin>) -> Option<Arc<DevicePlugin>> {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        plugins.insert(plugin.plugin_id().to_string(), plugin)
    }

    pub fn remove(&self, plugin_id: &str) -> Option<Arc<DevicePlugin>> {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        plugins.remove(plugin_id)
    }

    pub fn get(&self, plugin_id: &str) -> Option<Arc<DevicePlugin>> {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        plugins.get(plugin_id).cloned()
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        plugins.contains_key(plugin_id)
    }

    /// Every plugin, ordered by id
    pub fn all(&self) -> Vec<Arc<DevicePlugin>> {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = plugins.values().cloned().collect();
        all.sort_by(|a, b| a.plugin_id().cmp(b.plugin_id()));
        all
    }

    /// Plugins matching `predicate`, ordered by id
    pub fn filter<F>(&self, predicate: F) -> Vec<Arc<DevicePlugin>>
    where
        F: Fn(&DevicePlugin) -> bool,
    {
        self.all().into_iter().filter(|p| predicate(p)).collect()
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        self.all().iter().map(|p| p.plugin_id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
