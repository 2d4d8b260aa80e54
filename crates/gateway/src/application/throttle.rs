//! Publish throttling and input flood detection
//!
//! Both gates take the current time as an argument, which keeps the tests
//! free of sleeps and the pipeline in control of what "now" means.

use std::time::{Duration, Instant};

/// Minimum-interval gate on published updates
#[derive(Debug)]
pub struct UpdateThrottle {
    min_interval: Duration,
    last_admitted: Option<Instant>,
}

impl UpdateThrottle {
    pub fn new(min_interval: Duration) -> Self {
        UpdateThrottle {
            min_interval,
            last_admitted: None,
        }
    }

    /// Admit or reject a publish at `now`; the first call always admits
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_admitted {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_admitted = None;
    }
}

/// Verdict after observing one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodVerdict {
    Normal,
    /// The burst limit was crossed; the connection should be cycled
    Overloaded,
}

/// Detects runaway message bursts.
///
/// Counts consecutive messages arriving faster than `gap`; a slower arrival
/// resets the count. Crossing `limit` yields `Overloaded` once and restarts
/// the count.
#[derive(Debug)]
pub struct FloodGuard {
    gap: Duration,
    limit: u32,
    count: u32,
    last_seen: Option<Instant>,
}

impl FloodGuard {
    pub fn new(gap: Duration, limit: u32) -> Self {
        FloodGuard {
            gap,
            limit,
            count: 0,
            last_seen: None,
        }
    }

    /// Record one inbound message at `now`
    pub fn observe(&mut self, now: Instant) -> FloodVerdict {
        let fast = match self.last_seen {
            Some(last) => now.duration_since(last) < self.gap,
            None => false,
        };
        self.last_seen = Some(now);

        if fast {
            self.count += 1;
        } else {
            self.count = 0;
        }

        if self.count > self.limit {
            self.count = 0;
            FloodVerdict::Overloaded
        } else {
            FloodVerdict::Normal
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_seen = None;
    }
}
