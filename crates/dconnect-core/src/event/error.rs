//! # Event System Errors
//!
//! Defines [`EventSystemError`], raised when an event cannot be queued or a
//! queue flush cannot be acknowledged because the dispatcher's worker is gone.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventSystemError {
    #[error("Event queue '{dispatcher}' is closed; event '{event_name}' was dropped")]
    QueueClosed {
        dispatcher: String,
        event_name: String,
    },

    #[error("Event queue '{dispatcher}' stopped before acknowledging a flush")]
    FlushFailed { dispatcher: String },
}
