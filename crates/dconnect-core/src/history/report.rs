use serde::Serialize;

use crate::history::record::{BaudRate, CommunicationRecord};

/// Point-in-time snapshot of a plugin's communication diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationReport {
    pub plugin_id: String,
    pub average_baud_rate: Option<u64>,
    pub worst_baud_rate: Option<u64>,
    pub worst_baud_rate_request: Option<String>,
    /// Most recent last
    pub baud_rates: Vec<BaudRate>,
    pub responded: Vec<CommunicationRecord>,
    pub not_responded: Vec<CommunicationRecord>,
}

impl CommunicationReport {
    pub fn request_count(&self) -> usize {
        self.responded.len() + self.not_responded.len()
    }
}
