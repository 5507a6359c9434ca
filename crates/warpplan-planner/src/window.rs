//! Rolling record of recent "low latency" windows.

use std::collections::VecDeque;

/// Number of trailing windows remembered.
pub const WINDOW_CAPACITY: usize = 3;

/// Whether p95 was under the downscale threshold, for the last few windows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LowWindowHistory {
    entries: VecDeque<bool>,
}

impl LowWindowHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(WINDOW_CAPACITY),
        }
    }

    /// Append one observation, evicting the oldest when full.
    pub fn record(&mut self, is_low: bool) {
        if self.entries.len() == WINDOW_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(is_low);
    }

    /// True only once a full history has been seen and every entry is low.
    pub fn all_low(&self) -> bool {
        self.entries.len() == WINDOW_CAPACITY && self.entries.iter().all(|low| *low)
    }

    /// Oldest-first copy of the history.
    pub fn snapshot(&self) -> Vec<bool> {
        self.entries.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_three_entries_before_all_low() {
        let mut h = LowWindowHistory::new();
        h.record(true);
        assert!(!h.all_low());
        h.record(true);
        assert!(!h.all_low());
        h.record(true);
        assert!(h.all_low());
    }

    #[test]
    fn one_high_window_breaks_the_streak() {
        let mut h = LowWindowHistory::new();
        for low in [true, false, true] {
            h.record(low);
        }
        assert!(!h.all_low());

        // The high window ages out after two more lows.
        h.record(true);
        h.record(true);
        assert!(h.all_low());
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut h = LowWindowHistory::new();
        for i in 0..100 {
            h.record(i % 3 != 0);
            assert!(h.len() <= WINDOW_CAPACITY);
        }
        assert_eq!(h.len(), WINDOW_CAPACITY);
    }

    #[test]
    fn snapshot_is_oldest_first() {
        let mut h = LowWindowHistory::new();
        for low in [false, true, true, false] {
            h.record(low);
        }
        assert_eq!(h.snapshot(), vec![true, true, false]);
    }
}
