use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::error::{ConnectingError, MessagingError};
use crate::connection::transport::MessageEndpoint;
use crate::connection::{Connection, ConnectionCore, ConnectionState, ConnectionType};
use crate::message::Message;

/// Fire-and-forget connection to a broadcast receiver.
///
/// There is no session to establish, so the connection reports CONNECTED for
/// its whole life and `connect`/`disconnect` do nothing.
#[derive(Debug)]
pub struct BroadcastConnection {
    core: ConnectionCore,
    endpoint: Arc<dyn MessageEndpoint>,
}

impl BroadcastConnection {
    pub fn new(plugin_id: impl Into<String>, endpoint: Arc<dyn MessageEndpoint>, queue_capacity: usize) -> Self {
        Self {
            core: ConnectionCore::new(plugin_id, ConnectionState::Connected, queue_capacity),
            endpoint,
        }
    }
}

#[async_trait]
impl Connection for BroadcastConnection {
    fn core(&self) -> &ConnectionCore {
        &self.core
    }

    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Broadcast
    }

    async fn connect(&self) -> Result<(), ConnectingError> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn send(&self, message: &Message) -> Result<Option<Message>, MessagingError> {
        // Receivers never answer inline
        self.endpoint
            .deliver(message)
            .await
            .map(|_| None)
            .map_err(MessagingError::transport)
    }
}
