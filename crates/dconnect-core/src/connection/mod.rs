//! # Connections
//!
//! A [`Connection`] is the live transport between the manager and one plugin.
//! Every variant runs the same small state machine:
//!
//! ```text
//! DISCONNECTED --connect--> CONNECTING --ok--> CONNECTED --disconnect--> DISCONNECTED
//!                               |                  |
//!                               +--error--> SUSPENDED <--transport death
//!                                               |
//!                                               +--connect (retry)--> CONNECTING
//! ```
//!
//! Transitions are published to the connection's own event queue, so state
//! listeners never run on the caller's task.
pub mod bound_service;
pub mod broadcast;
pub mod state;
pub mod error;
pub mod in_process;
pub mod transport;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::event::{BoxFuture, ConnectionStateEvent, EventSystemError, Listens};
use crate::message::Message;

pub use state::ConnectionCore;
pub use bound_service::{BoundServiceConnection, ServiceMonitor};
pub use broadcast::BroadcastConnection;
pub use error::{ConnectingError, ConnectionError, MessagingError, MessagingReason, TransportError};
pub use in_process::InProcessConnection;
pub use transport::{MessageEndpoint, ServiceBinder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Suspended,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Suspended => "SUSPENDED",
        };
        f.write_str(text)
    }
}

/// Transport strategy of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Direct call into an endpoint living in the host process
    InProcess,
    /// Asynchronously bound service
    BoundService,
    /// Fire-and-forget broadcast to a receiver
    Broadcast,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionType::InProcess => "in-process",
            ConnectionType::BoundService => "bound-service",
            ConnectionType::Broadcast => "broadcast",
        };
        f.write_str(text)
    }
}

/// Receives state transitions of one or more connections
#[async_trait]
pub trait ConnectionStateListener: Send + Sync {
    async fn on_connection_state_changed(&self, plugin_id: &str, state: ConnectionState);
}

impl Listens<ConnectionStateEvent> for dyn ConnectionStateListener {
    fn deliver<'a>(&'a self, event: &'a ConnectionStateEvent) -> BoxFuture<'a> {
        self.on_connection_state_changed(&event.plugin_id, event.state)
    }
}

/// Transport binding to a single plugin.
///
/// State, last error and listener bookkeeping are provided by [`ConnectionCore`];
/// implementors supply the handshake, the teardown and the actual delivery.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Shared state machine of this connection
    fn core(&self) -> &ConnectionCore;

    fn connection_type(&self) -> ConnectionType;

    /// Bring the transport up. A no-op success when already connected.
    async fn connect(&self) -> Result<(), ConnectingError>;

    /// Tear the transport down. Idempotent.
    async fn disconnect(&self);

    /// Deliver a message, returning the plugin's immediate response if the
    /// transport has one.
    async fn send(&self, message: &Message) -> Result<Option<Message>, MessagingError>;

    fn plugin_id(&self) -> &str {
        self.core().plugin_id()
    }

    fn state(&self) -> ConnectionState {
        self.core().state()
    }

    /// Error that caused the most recent suspension, if still current
    fn current_connection_error(&self) -> Option<ConnectionError> {
        self.core().current_error()
    }

    fn add_connection_state_listener(&self, listener: Arc<dyn ConnectionStateListener>) -> bool {
        self.core().add_listener(listener)
    }

    fn remove_connection_state_listener(&self, listener: &Arc<dyn ConnectionStateListener>) -> bool {
        self.core().remove_listener(listener)
    }

    /// Wait until all queued state notifications have been delivered
    async fn flush_events(&self) -> Result<(), EventSystemError> {
        self.core().flush().await
    }
}
