use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;

use crate::connection::error::{ConnectingError, ConnectionError, MessagingError, MessagingReason};
use crate::connection::transport::{MessageEndpoint, ServiceBinder};
use crate::connection::{Connection, ConnectionCore, ConnectionState, ConnectionType};
use crate::message::Message;
use crate::plugin_system::host::ComponentName;

#[derive(Debug)]
struct Shared {
    core: ConnectionCore,
    component: ComponentName,
    binder: Arc<dyn ServiceBinder>,
    endpoint: Mutex<Option<Arc<dyn MessageEndpoint>>>,
    handshake: tokio::sync::Mutex<()>,
}

impl Shared {
    fn take_endpoint(&self) -> Option<Arc<dyn MessageEndpoint>> {
        self.endpoint.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn current_endpoint(&self) -> Option<Arc<dyn MessageEndpoint>> {
        self.endpoint.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Connection to a service the host binds asynchronously
#[derive(Debug)]
pub struct BoundServiceConnection {
    shared: Arc<Shared>,
}

impl BoundServiceConnection {
    pub fn new(
        plugin_id: impl Into<String>,
        component: ComponentName,
        binder: Arc<dyn ServiceBinder>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                core: ConnectionCore::new(plugin_id, ConnectionState::Disconnected, queue_capacity),
                component,
                binder,
                endpoint: Mutex::new(None),
                handshake: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn component(&self) -> &ComponentName {
        &self.shared.component
    }
}

#[async_trait]
impl Connection for BoundServiceConnection {
    fn core(&self) -> &ConnectionCore {
        &self.shared.core
    }

    fn connection_type(&self) -> ConnectionType {
        ConnectionType::BoundService
    }

    async fn connect(&self) -> Result<(), ConnectingError> {
        let shared = &self.shared;
        let _guard = shared.handshake.lock().await;
        if shared.core.state() == ConnectionState::Connected {
            return Ok(());
        }
        shared.core.transition(ConnectionState::Connecting).await;

        let monitor = ServiceMonitor {
            shared: Arc::downgrade(shared),
        };
        match shared.binder.bind(&shared.component, monitor).await {
            Ok(endpoint) => {
                *shared.endpoint.lock().unwrap_or_else(PoisonError::into_inner) = Some(endpoint);
                shared.core.transition(ConnectionState::Connected).await;
                Ok(())
            }
            Err(e) => {
                let kind = e.classify();
                shared.core.suspend(kind).await;
                Err(ConnectingError::new(
                    kind,
                    format!("binding {} failed: {}", shared.component, e),
                ))
            }
        }
    }

    async fn disconnect(&self) {
        let shared = &self.shared;
        let _guard = shared.handshake.lock().await;
        if shared.take_endpoint().is_some() {
            shared.binder.unbind(&shared.component).await;
        }
        shared.core.transition(ConnectionState::Disconnected).await;
    }

    async fn send(&self, message: &Message) -> Result<Option<Message>, MessagingError> {
        let shared = &self.shared;
        shared.core.check_sendable()?;
        let Some(endpoint) = shared.current_endpoint() else {
            return Err(MessagingError::new(MessagingReason::NotConnected));
        };
        match endpoint.deliver(message).await {
            Ok(response) => Ok(response),
            Err(e) => {
                if e.classify() == ConnectionError::Terminated {
                    // Release the binding so a later connect binds afresh
                    if shared.take_endpoint().is_some() {
                        shared.binder.unbind(&shared.component).await;
                    }
                    shared.core.suspend(ConnectionError::Terminated).await;
                }
                Err(MessagingError::transport(e))
            }
        }
    }
}

/// Handle the host uses to report that a bound service went away
#[derive(Clone)]
pub struct ServiceMonitor {
    shared: Weak<Shared>,
}

impl fmt::Debug for ServiceMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMonitor")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl ServiceMonitor {
    /// The service disconnected on its own; the connection drops to DISCONNECTED.
    /// Does nothing once the connection itself is gone.
    pub async fn on_service_disconnected(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        shared.take_endpoint();
        log::info!("Service {} disconnected by host", shared.component);
        shared.core.transition(ConnectionState::Disconnected).await;
    }
}
