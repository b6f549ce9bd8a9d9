//! # dconnect-core
//!
//! Host-agnostic device plugin manager: discovery of device plugins through an
//! injected host, a connection state machine per plugin with in-process,
//! bound-service and broadcast transports, request/response routing with
//! service-id and session-key rewriting, and per-plugin communication history.
pub mod connection;
pub mod event;
pub mod history;
pub mod kernel;
pub mod message;
pub mod plugin_system;
pub mod storage;

pub use connection::{Connection, ConnectionState, ConnectionType};
pub use event::{Event, EventDispatcher};
pub use kernel::error::Error as KernelError;
pub use kernel::{Application, CoreConfig};
pub use message::{Message, MessageAction};
pub use plugin_system::{DevicePlugin, DevicePluginManager, HostBridge, PluginRegistry};
pub use storage::{SettingsStore, StorageProvider};
