//! # Storage
//!
//! Filesystem access ([`StorageProvider`], [`LocalStorageProvider`]),
//! configuration documents ([`ConfigData`], [`ConfigFormat`]) and the
//! per-plugin settings store the plugin manager persists through
//! ([`SettingsStore`], [`PluginSettings`]).
pub mod provider;
pub mod local;
pub mod config;
pub mod settings;
pub mod error;

/// Re-export key types
pub use provider::{StorageProvider, StorageResult};
pub use local::LocalStorageProvider;
pub use config::{ConfigData, ConfigFormat, load_config_file};
pub use settings::{
    FileSettingsStore, MemorySettingsStore, PersistedBaudRates, PluginSettings, SettingsStore,
};
pub use error::StorageSystemError;
