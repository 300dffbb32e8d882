//! Bounded level-reading history
//!
//! Fixed capacity, oldest evicted first. Timestamps inside the window never
//! go backwards: a reading stamped earlier than the newest retained one is
//! stored with the newest timestamp instead.

use shared_types::LevelReading;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LevelHistory {
    readings: VecDeque<LevelReading>,
    capacity: usize,
}

impl LevelHistory {
    /// `capacity` must be non-zero; callers validate it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest one when full.
    ///
    /// Returns the reading as stored.
    pub fn push(&mut self, mut reading: LevelReading) -> LevelReading {
        if let Some(newest) = self.readings.back() {
            if reading.timestamp < newest.timestamp {
                debug!(
                    received = %reading.timestamp,
                    newest = %newest.timestamp,
                    "Out-of-order reading, clamping timestamp"
                );
                reading.timestamp = newest.timestamp;
            }
        }
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
        reading
    }

    pub fn latest(&self) -> Option<&LevelReading> {
        self.readings.back()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn to_vec(&self) -> Vec<LevelReading> {
        self.readings.iter().copied().collect()
    }
}
