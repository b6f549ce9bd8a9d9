//! # Event System
//!
//! Single-consumer event queues used for every callback fan-out in the crate.
//!
//! Each event source (one per plugin manager, one per connection) owns an
//! [`EventDispatcher`]: a bounded queue drained by one worker task that hands
//! every event to every registered listener, one listener at a time. A listener
//! therefore observes events in the order they were published and is never
//! called concurrently with itself; no ordering is promised between different
//! listeners of the same event.
pub mod dispatcher;
pub mod error;
pub mod types;

use std::fmt;

/// Core event trait
pub trait Event: fmt::Debug + Send + Sync + 'static {
    /// Get the name of this event
    fn name(&self) -> &'static str;
}

/// Re-export important types
pub use dispatcher::{BoxFuture, EventDispatcher, Listens};
pub use error::EventSystemError;
pub use types::{ConnectionStateEvent, PluginEvent};
