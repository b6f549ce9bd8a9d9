//! # Device Plugin System
//!
//! Discovery and bookkeeping of device plugins.
//!
//! - [`DevicePluginManager`] scans the host through a [`HostBridge`], builds one
//!   [`DevicePlugin`] per plugin component and keeps them in a [`PluginRegistry`].
//! - [`DevicePlugin`] pairs the immutable [`PluginDescriptor`] with a connection,
//!   the persisted enabled flag and the plugin's communication history.
//! - [`AddressCodec`] rewrites service ids and session keys between their
//!   application-facing and plugin-local forms.
//! - [`DevicePluginEventListener`] observes discovery and connection changes.
pub mod descriptor;
pub mod device_plugin;
pub mod error;
pub mod host;
pub mod listener;
pub mod manager;
pub mod registry;
pub mod routing;

pub use descriptor::{CapabilityDescriptor, PluginDescriptor, plugin_id};
pub use device_plugin::DevicePlugin;
pub use error::{DetectionReason, PluginDetectionError, PluginSystemError};
pub use host::{ComponentCandidate, ComponentKind, ComponentName, HostBridge};
pub use listener::DevicePluginEventListener;
pub use manager::{DevicePluginManager, RoutedEvent};
pub use registry::PluginRegistry;
pub use routing::{AddressCodec, SessionKeyParts};
