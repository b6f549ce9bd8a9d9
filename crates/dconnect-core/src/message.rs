//! The message envelope exchanged between the manager and plugins.
use serde::{Deserialize, Serialize};

/// What a [`Message`] carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAction {
    Request,
    Response,
    Event,
    /// Tells a plugin it has been enabled by the user
    PluginEnabled,
    /// Tells a plugin it has been disabled by the user
    PluginDisabled,
}

/// Opaque request, response or event routed through the plugin manager.
///
/// Only the addressing fields are interpreted by this crate; `payload` is handed
/// to the transport untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub action: MessageAction,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_code: Option<u32>,
    /// Flattened component name of the application expecting events for this session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Message {
    pub fn new(action: MessageAction, path: impl Into<String>) -> Self {
        Self {
            action,
            path: path.into(),
            service_id: None,
            session_key: None,
            request_code: None,
            origin: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn request(path: impl Into<String>) -> Self {
        Self::new(MessageAction::Request, path)
    }

    pub fn response(path: impl Into<String>) -> Self {
        Self::new(MessageAction::Response, path)
    }

    pub fn event(path: impl Into<String>) -> Self {
        Self::new(MessageAction::Event, path)
    }

    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }

    pub fn with_request_code(mut self, request_code: u32) -> Self {
        self.request_code = Some(request_code);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
