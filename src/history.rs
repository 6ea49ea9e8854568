//! Per-greenhouse bounded FIFO of sensor readings (C2). Capacity 100;
//! inserts drop the oldest. Does not sort — callers push in arrival order.

use crate::models::SensorReading;
use std::collections::VecDeque;

pub const CAPACITY: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct RingHistory {
    readings: VecDeque<SensorReading>,
}

impl RingHistory {
    pub fn new() -> Self {
        Self {
            readings: VecDeque::with_capacity(CAPACITY),
        }
    }

    /// O(1) amortized. Evicts the oldest reading once at capacity.
    pub fn push(&mut self, reading: SensorReading) {
        if self.readings.len() >= CAPACITY {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    /// Seeds the store from a backend bootstrap window. Readings are
    /// expected oldest-first; only the most recent `CAPACITY` are kept.
    pub fn load(&mut self, readings: impl IntoIterator<Item = SensorReading>) {
        for reading in readings {
            self.push(reading);
        }
    }

    /// Last `n` readings, oldest first, `n` saturating at the stored length.
    pub fn last_n(&self, n: usize) -> Vec<SensorReading> {
        let len = self.readings.len();
        let skip = len.saturating_sub(n);
        self.readings.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
