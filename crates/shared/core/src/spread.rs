//! Rolling spread history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of spread samples retained
pub const SPREAD_HISTORY_CAPACITY: usize = 60;

/// One spread observation, stamped when its update was published
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadSample {
    pub time: DateTime<Utc>,
    pub spread: f64,
}

impl SpreadSample {
    pub fn new(time: DateTime<Utc>, spread: f64) -> Self {
        SpreadSample { time, spread }
    }
}

/// FIFO window of the most recent spread samples, oldest first
#[derive(Debug, Clone)]
pub struct SpreadHistory {
    samples: VecDeque<SpreadSample>,
    capacity: usize,
}

impl Default for SpreadHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl SpreadHistory {
    pub fn new() -> Self {
        Self::with_capacity(SPREAD_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SpreadHistory {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample, evicting from the oldest end once the window is full
    pub fn push(&mut self, sample: SpreadSample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Samples in insertion order, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &SpreadSample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<SpreadSample> {
        self.samples.iter().copied().collect()
    }

    #[inline]
    pub fn last(&self) -> Option<&SpreadSample> {
        self.samples.back()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
