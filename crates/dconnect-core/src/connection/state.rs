use std::sync::{Arc, Mutex, PoisonError};

use crate::connection::error::{ConnectionError, MessagingError, MessagingReason};
use crate::connection::{ConnectionState, ConnectionStateListener};
use crate::event::{ConnectionStateEvent, EventDispatcher, EventSystemError};

#[derive(Debug)]
struct Status {
    state: ConnectionState,
    error: Option<ConnectionError>,
}

/// State machine and listener fan-out shared by every connection variant
#[derive(Debug)]
pub struct ConnectionCore {
    plugin_id: String,
    status: Mutex<Status>,
    events: EventDispatcher<ConnectionStateEvent, dyn ConnectionStateListener>,
}

impl ConnectionCore {
    /// Needs a running Tokio runtime: spawns the connection's event worker.
    pub fn new(plugin_id: impl Into<String>, initial: ConnectionState, queue_capacity: usize) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            status: Mutex::new(Status {
                state: initial,
                error: None,
            }),
            events: EventDispatcher::new("connection", queue_capacity),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn state(&self) -> ConnectionState {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).state
    }

    pub fn current_error(&self) -> Option<ConnectionError> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).error
    }

    /// Move to `state`, clearing the retained error unless suspending.
    /// Listeners are notified only when the state actually changes.
    pub async fn transition(&self, state: ConnectionState) {
        self.apply(state, None).await;
    }

    /// Move to SUSPENDED and retain `error`
    pub async fn suspend(&self, error: ConnectionError) {
        self.apply(ConnectionState::Suspended, Some(error)).await;
    }

    async fn apply(&self, state: ConnectionState, error: Option<ConnectionError>) {
        let previous = {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = status.state;
            status.state = state;
            status.error = error;
            previous
        };
        if previous == state {
            return;
        }
        log::debug!("Connection {}: {} -> {}", self.plugin_id, previous, state);
        let event = ConnectionStateEvent {
            plugin_id: self.plugin_id.clone(),
            state,
        };
        if let Err(e) = self.events.publish(event).await {
            log::warn!("Connection {}: state notification dropped: {}", self.plugin_id, e);
        }
    }

    /// Whether traffic may be sent in the current state
    pub fn check_sendable(&self) -> Result<(), MessagingError> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Suspended => Err(MessagingError::new(MessagingReason::ConnectionSuspended)),
            ConnectionState::Connecting | ConnectionState::Disconnected => {
                Err(MessagingError::new(MessagingReason::NotConnected))
            }
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ConnectionStateListener>) -> bool {
        self.events.add_listener(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ConnectionStateListener>) -> bool {
        self.events.remove_listener(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }

    pub async fn flush(&self) -> Result<(), EventSystemError> {
        self.events.flush().await
    }
}
