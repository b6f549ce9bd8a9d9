//! # Communication History
//!
//! Per-plugin diagnostics: bounded lists of answered and unanswered requests,
//! and rolling round-trip latency ("baud rate") statistics. Both are persisted
//! through the plugin's [`PluginSettings`](crate::storage::PluginSettings).
pub mod record;
pub mod history;
pub mod report;

pub use history::CommunicationHistory;
pub use record::{BaudRate, CommunicationRecord, TIMEOUT_SENTINEL};
pub use report::CommunicationReport;
