//! # Plugin System Errors
//!
//! [`PluginSystemError`] covers discovery, descriptor parsing, addressing and
//! routing failures of the plugin manager. [`PluginDetectionError`] is what a
//! host reports when it cannot enumerate packages or components.
use std::fmt;

use crate::connection::MessagingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionReason {
    /// The host refused to list that many packages at once
    TooManyPackages,
    Other,
}

impl fmt::Display for DetectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionReason::TooManyPackages => f.write_str("too many packages"),
            DetectionReason::Other => f.write_str("detection failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Plugin detection failed ({reason}): {message}")]
pub struct PluginDetectionError {
    pub reason: DetectionReason,
    pub message: String,
}

impl PluginDetectionError {
    pub fn new(reason: DetectionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error(transparent)]
    Detection(#[from] PluginDetectionError),

    #[error("Invalid plugin descriptor for '{component}': {message}")]
    InvalidDescriptor { component: String, message: String },

    #[error("No plugin with id '{0}'")]
    PluginNotFound(String),

    #[error("Service id '{0}' does not address any plugin")]
    UnknownServiceId(String),

    #[error("Message for '{path}' carries no service id")]
    MissingServiceId { path: String },

    #[error("Event for '{path}' carries no session key")]
    MissingSessionKey { path: String },

    #[error("Invalid session key '{0}'")]
    InvalidSessionKey(String),

    #[error("Message for '{path}' carries no request code")]
    MissingRequestCode { path: String },

    #[error("No pending request with code {0}")]
    UnknownRequest(u32),

    #[error("Plugin '{plugin_id}' rejected a message: {source}")]
    Messaging {
        plugin_id: String,
        #[source]
        source: MessagingError,
    },
}
