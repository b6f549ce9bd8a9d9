use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

/// `end` value of a request that never got an answer
pub const TIMEOUT_SENTINEL: i64 = -1;

const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One request/response exchange. Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationRecord {
    /// `None` when the request was addressed to the plugin itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    pub path: String,
    pub start: i64,
    pub end: i64,
}

impl CommunicationRecord {
    pub fn new(service_id: Option<String>, path: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            service_id,
            path: path.into(),
            start,
            end,
        }
    }

    /// A request that was given up on
    pub fn timed_out(service_id: Option<String>, path: impl Into<String>, start: i64) -> Self {
        Self::new(service_id, path, start, TIMEOUT_SENTINEL)
    }

    pub fn is_timeout(&self) -> bool {
        self.end < 0
    }

    /// Milliseconds between request and response, `None` for a timeout
    pub fn round_trip_time(&self) -> Option<u64> {
        if self.is_timeout() {
            return None;
        }
        Some(self.end.saturating_sub(self.start).max(0) as u64)
    }

    /// Local wall-clock time the request was sent, `yyyy/MM/dd HH:mm:ss`
    pub fn date_string(&self) -> String {
        match Local.timestamp_millis_opt(self.start).single() {
            Some(time) => time.format(DATE_FORMAT).to_string(),
            None => String::new(),
        }
    }
}

/// One latency sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaudRate {
    pub request: String,
    pub latency: u64,
    pub timestamp: i64,
}
