//! Per-greenhouse [`RingHistory`] keyed by greenhouse id. Same
//! `RwLock<HashMap<..>>` shape as [`crate::config_registry::ConfigRegistry`].

use crate::history::RingHistory;
use crate::models::SensorReading;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct HistoryRegistry {
    histories: RwLock<HashMap<String, RingHistory>>,
}

impl HistoryRegistry {
    pub fn new() -> Self {
        Self {
            histories: RwLock::new(HashMap::new()),
        }
    }

    pub async fn push(&self, greenhouse_id: &str, reading: SensorReading) {
        let mut histories = self.histories.write().await;
        histories
            .entry(greenhouse_id.to_string())
            .or_insert_with(RingHistory::new)
            .push(reading);
    }

    /// Warm-fills a greenhouse's history from a backend bootstrap window
    /// (§4.2), only when no history is held yet — a reload must not
    /// discard readings observed since cold start.
    pub async fn warm_fill_if_empty(&self, greenhouse_id: &str, readings: Vec<SensorReading>) {
        let mut histories = self.histories.write().await;
        let entry = histories.entry(greenhouse_id.to_string()).or_insert_with(RingHistory::new);
        if entry.is_empty() {
            entry.load(readings);
        }
    }

    pub async fn last_n(&self, greenhouse_id: &str, n: usize) -> Vec<SensorReading> {
        let histories = self.histories.read().await;
        histories
            .get(greenhouse_id)
            .map(|history| history.last_n(n))
            .unwrap_or_default()
    }

    pub async fn len(&self, greenhouse_id: &str) -> usize {
        let histories = self.histories.read().await;
        histories.get(greenhouse_id).map(RingHistory::len).unwrap_or(0)
    }

    pub async fn remove(&self, greenhouse_id: &str) {
        let mut histories = self.histories.write().await;
        histories.remove(greenhouse_id);
    }
}
