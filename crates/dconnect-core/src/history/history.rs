use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::history::record::{BaudRate, CommunicationRecord};
use crate::history::report::CommunicationReport;
use crate::storage::settings::{
    KEY_AVERAGE_BAUD_RATE, KEY_NOT_RESPONDED_HISTORY, KEY_RESPONDED_HISTORY, KEY_WORST_BAUD_RATE,
    KEY_WORST_BAUD_RATE_REQUEST, PersistedBaudRates, write_baud_rates,
};
use crate::storage::{ConfigData, PluginSettings, StorageResult};

#[derive(Debug, Default)]
struct HistoryState {
    responded: VecDeque<CommunicationRecord>,
    not_responded: VecDeque<CommunicationRecord>,
    rates: PersistedBaudRates,
    samples: VecDeque<BaudRate>,
}

/// Bounded communication history of one plugin.
///
/// All mutation happens under one lock so a report never observes half an update.
/// Persisting is best effort: a failing store is logged and the in-memory state
/// stays authoritative.
#[derive(Debug)]
pub struct CommunicationHistory {
    settings: PluginSettings,
    capacity: usize,
    sample_capacity: usize,
    state: Mutex<HistoryState>,
}

impl CommunicationHistory {
    /// Restore persisted statistics and records for the plugin `settings` belongs to
    pub fn new(settings: PluginSettings, capacity: usize, sample_capacity: usize) -> Self {
        let mut state = HistoryState::default();
        match settings.baud_rates() {
            Ok(rates) => state.rates = rates,
            Err(e) => log::warn!("Plugin {}: cannot load baud rates: {}", settings.plugin_id(), e),
        }
        let load = |key: &str| -> VecDeque<CommunicationRecord> {
            match settings.get::<Vec<CommunicationRecord>>(key) {
                Ok(records) => {
                    let mut records: VecDeque<_> = records.unwrap_or_default().into();
                    while records.len() > capacity {
                        records.pop_front();
                    }
                    records
                }
                Err(e) => {
                    log::warn!("Plugin {}: cannot load {}: {}", settings.plugin_id(), key, e);
                    VecDeque::new()
                }
            }
        };
        state.responded = load(KEY_RESPONDED_HISTORY);
        state.not_responded = load(KEY_NOT_RESPONDED_HISTORY);

        Self {
            settings,
            capacity,
            sample_capacity,
            state: Mutex::new(state),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// File a record under responded or not-responded, evicting the oldest entry when full
    pub fn add(&self, record: CommunicationRecord) {
        let mut state = self.lock();
        let (key, snapshot) = self.file_record(&mut state, record);
        self.persist(key, |data| data.set(key, &snapshot));
    }

    /// Fold one latency sample into the running statistics
    pub fn add_baud_rate(&self, request: &str, latency: u64) {
        let mut state = self.lock();
        self.fold_latency(&mut state, request, latency);
        let rates = state.rates.clone();
        self.persist("baud rates", |data| write_baud_rates(data, &rates));
    }

    /// File an answered request and fold its latency in, with a single store update
    pub fn record_response(&self, record: CommunicationRecord, latency: u64) {
        let mut state = self.lock();
        let request = record.path.clone();
        let (key, snapshot) = self.file_record(&mut state, record);
        self.fold_latency(&mut state, &request, latency);
        let rates = state.rates.clone();
        self.persist("response", |data| {
            data.set(key, &snapshot)?;
            write_baud_rates(data, &rates)
        });
    }

    pub fn average_baud_rate(&self) -> Option<u64> {
        self.lock().rates.average
    }

    pub fn worst_baud_rate(&self) -> Option<u64> {
        self.lock().rates.worst
    }

    pub fn worst_baud_rate_request(&self) -> Option<String> {
        self.lock().rates.worst_request.clone()
    }

    pub fn baud_rates(&self) -> Vec<BaudRate> {
        self.lock().samples.iter().cloned().collect()
    }

    /// Oldest first
    pub fn responded(&self) -> Vec<CommunicationRecord> {
        self.lock().responded.iter().cloned().collect()
    }

    /// Oldest first
    pub fn not_responded(&self) -> Vec<CommunicationRecord> {
        self.lock().not_responded.iter().cloned().collect()
    }

    /// Forget everything, in memory and in the store, in a single store update
    pub fn clear(&self) {
        let mut state = self.lock();
        *state = HistoryState::default();
        self.persist("history reset", |data| {
            for key in [
                KEY_AVERAGE_BAUD_RATE,
                KEY_WORST_BAUD_RATE,
                KEY_WORST_BAUD_RATE_REQUEST,
                KEY_RESPONDED_HISTORY,
                KEY_NOT_RESPONDED_HISTORY,
            ] {
                data.remove(key);
            }
            Ok(())
        });
    }

    pub fn report(&self) -> CommunicationReport {
        let state = self.lock();
        CommunicationReport {
            plugin_id: self.settings.plugin_id().to_string(),
            average_baud_rate: state.rates.average,
            worst_baud_rate: state.rates.worst,
            worst_baud_rate_request: state.rates.worst_request.clone(),
            baud_rates: state.samples.iter().cloned().collect(),
            responded: state.responded.iter().cloned().collect(),
            not_responded: state.not_responded.iter().cloned().collect(),
        }
    }

    fn file_record(
        &self,
        state: &mut HistoryState,
        record: CommunicationRecord,
    ) -> (&'static str, Vec<CommunicationRecord>) {
        let (key, bucket) = if record.is_timeout() {
            (KEY_NOT_RESPONDED_HISTORY, &mut state.not_responded)
        } else {
            (KEY_RESPONDED_HISTORY, &mut state.responded)
        };
        push_bounded(bucket, record, self.capacity);
        (key, bucket.iter().cloned().collect())
    }

    fn fold_latency(&self, state: &mut HistoryState, request: &str, latency: u64) {
        let average = match state.rates.average {
            Some(previous) => midpoint(previous, latency),
            None => latency,
        };
        state.rates.average = Some(average);
        if state.rates.worst.is_none_or(|worst| latency > worst) {
            state.rates.worst = Some(latency);
            state.rates.worst_request = Some(request.to_string());
        }
        let sample = BaudRate {
            request: request.to_string(),
            latency,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        push_bounded(&mut state.samples, sample, self.sample_capacity);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist<F>(&self, what: &str, apply: F)
    where
        F: FnMut(&mut ConfigData) -> StorageResult<()>,
    {
        if let Err(e) = self.settings.update(apply) {
            log::warn!("Plugin {}: failed to persist {}: {}", self.settings.plugin_id(), what, e);
        }
    }
}

/// Floor of the mean of `a` and `b`, without overflowing
fn midpoint(a: u64, b: u64) -> u64 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while queue.len() >= capacity {
        queue.pop_front();
    }
    queue.push_back(item);
}
