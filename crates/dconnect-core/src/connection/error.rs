//! # Connection Errors
//!
//! [`ConnectionError`] classifies why a connection is unusable and is retained by
//! the connection until the next successful connect or disconnect.
//! [`ConnectingError`] and [`MessagingError`] are what `connect()` and `send()`
//! return. [`TransportError`] is what hosts report; it is reclassified at the
//! connection boundary and never escapes on its own.
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ConnectionError {
    #[error("not permitted")]
    NotPermitted,
    #[error("not responded")]
    NotResponded,
    #[error("terminated")]
    Terminated,
    #[error("canceled")]
    Canceled,
    #[error("internal error")]
    InternalError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to connect ({kind}): {message}")]
pub struct ConnectingError {
    pub kind: ConnectionError,
    pub message: String,
}

impl ConnectingError {
    pub fn new(kind: ConnectionError, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessagingReason {
    /// The plugin has been disabled by the user
    NotEnabled,
    /// The last connection attempt failed and retrying did not help
    ConnectionSuspended,
    /// The transport is not connected or refused the message
    NotConnected,
}

impl std::fmt::Display for MessagingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            MessagingReason::NotEnabled => "plugin is not enabled",
            MessagingReason::ConnectionSuspended => "connection is suspended",
            MessagingReason::NotConnected => "not connected",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot send message: {reason}")]
pub struct MessagingError {
    pub reason: MessagingReason,
    #[source]
    pub source: Option<TransportError>,
}

impl MessagingError {
    pub fn new(reason: MessagingReason) -> Self {
        Self { reason, source: None }
    }

    /// A transport failure while the connection looked usable
    pub fn transport(source: TransportError) -> Self {
        Self {
            reason: MessagingReason::NotConnected,
            source: Some(source),
        }
    }
}

/// Failures reported by a host transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport timed out")]
    Timeout,
    #[error("permission denied by the host")]
    PermissionDenied,
    #[error("remote process died")]
    RemoteDied,
    #[error("operation interrupted")]
    Interrupted,
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    pub fn classify(&self) -> ConnectionError {
        match self {
            TransportError::Timeout | TransportError::Unavailable(_) => ConnectionError::NotResponded,
            TransportError::PermissionDenied => ConnectionError::NotPermitted,
            TransportError::RemoteDied => ConnectionError::Terminated,
            TransportError::Interrupted => ConnectionError::Canceled,
            TransportError::Other(_) => ConnectionError::InternalError,
        }
    }
}
