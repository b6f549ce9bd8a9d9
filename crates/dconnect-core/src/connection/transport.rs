//! Host-provided transport handles.
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::bound_service::ServiceMonitor;
use crate::connection::error::TransportError;
use crate::message::Message;
use crate::plugin_system::host::ComponentName;

/// Opaque "deliver a message to plugin X"
#[async_trait]
pub trait MessageEndpoint: Send + Sync + Debug {
    /// Deliver `message`; an endpoint that answers synchronously returns the response
    async fn deliver(&self, message: &Message) -> Result<Option<Message>, TransportError>;

    /// Check that the endpoint can take traffic. Used as the in-process handshake.
    async fn handshake(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Binds services exposed by plugin packages
#[async_trait]
pub trait ServiceBinder: Send + Sync + Debug {
    /// Bind to `component`. The host reports a later loss of the service through `monitor`.
    async fn bind(
        &self,
        component: &ComponentName,
        monitor: ServiceMonitor,
    ) -> Result<Arc<dyn MessageEndpoint>, TransportError>;

    async fn unbind(&self, component: &ComponentName);
}
