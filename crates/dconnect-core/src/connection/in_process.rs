use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::connection::error::{ConnectingError, MessagingError};
use crate::connection::transport::MessageEndpoint;
use crate::connection::{Connection, ConnectionCore, ConnectionState, ConnectionType};
use crate::message::Message;

/// Connection to a plugin living in the host's own process
#[derive(Debug)]
pub struct InProcessConnection {
    core: ConnectionCore,
    endpoint: Arc<dyn MessageEndpoint>,
    handshake: Mutex<()>,
}

impl InProcessConnection {
    pub fn new(plugin_id: impl Into<String>, endpoint: Arc<dyn MessageEndpoint>, queue_capacity: usize) -> Self {
        Self {
            core: ConnectionCore::new(plugin_id, ConnectionState::Disconnected, queue_capacity),
            endpoint,
            handshake: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Connection for InProcessConnection {
    fn core(&self) -> &ConnectionCore {
        &self.core
    }

    fn connection_type(&self) -> ConnectionType {
        ConnectionType::InProcess
    }

    async fn connect(&self) -> Result<(), ConnectingError> {
        let _guard = self.handshake.lock().await;
        if self.core.state() == ConnectionState::Connected {
            return Ok(());
        }
        self.core.transition(ConnectionState::Connecting).await;
        match self.endpoint.handshake().await {
            Ok(()) => {
                self.core.transition(ConnectionState::Connected).await;
                Ok(())
            }
            Err(e) => {
                let kind = e.classify();
                self.core.suspend(kind).await;
                Err(ConnectingError::new(kind, e.to_string()))
            }
        }
    }

    async fn disconnect(&self) {
        let _guard = self.handshake.lock().await;
        self.core.transition(ConnectionState::Disconnected).await;
    }

    async fn send(&self, message: &Message) -> Result<Option<Message>, MessagingError> {
        self.core.check_sendable()?;
        self.endpoint.deliver(message).await.map_err(MessagingError::transport)
    }
}
