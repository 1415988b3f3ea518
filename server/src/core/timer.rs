// world_server_core/server/src/core/timer.rs
use std::time::{SystemTime, UNIX_EPOCH};

/// Countdown in milliseconds. Passed once it reaches zero or below.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeTracker {
    expiry: i32,
}

impl TimeTracker {
    pub fn new(expiry: i32) -> Self {
        TimeTracker { expiry }
    }

    pub fn update(&mut self, diff: u32) {
        self.expiry = self.expiry.saturating_sub(diff.min(i32::MAX as u32) as i32);
    }

    pub fn passed(&self) -> bool {
        self.expiry <= 0
    }

    pub fn reset(&mut self, expiry: i32) {
        self.expiry = expiry;
    }

    pub fn expiry(&self) -> i32 {
        self.expiry
    }
}

/// Accumulating interval used by the map manager tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntervalTimer {
    interval: u32,
    current: u32,
}

impl IntervalTimer {
    pub fn new(interval: u32) -> Self {
        IntervalTimer { interval, current: 0 }
    }

    pub fn update(&mut self, diff: u32) {
        self.current = self.current.saturating_add(diff);
    }

    pub fn passed(&self) -> bool {
        self.current >= self.interval
    }

    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval;
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn set_current(&mut self, current: u32) {
        self.current = current;
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts_down() {
        let mut t = TimeTracker::new(250);
        t.update(100);
        assert!(!t.passed());
        t.update(150);
        assert!(t.passed());
        t.reset(10);
        assert!(!t.passed());
    }

    #[test]
    fn interval_accumulates_partial_ticks() {
        let mut t = IntervalTimer::new(100);
        t.update(40);
        assert!(!t.passed());
        t.update(70);
        assert!(t.passed());
        assert_eq!(t.current(), 110);
    }
}
