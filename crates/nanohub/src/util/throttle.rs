// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Windowed rate limiter used to bound warning storms.

use std::time::Duration;

/// Allows at most `max_count` hits per `interval`.
///
/// The window starts at the first hit and restarts with the first hit that
/// lands after it expired.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    max_count: u32,
    window_start: Option<Duration>,
    count: u32,
}

impl Throttle {
    pub fn new(interval: Duration, max_count: u32) -> Self {
        Self {
            interval,
            max_count,
            window_start: None,
            count: 0,
        }
    }

    /// Record a hit at `now`; returns true if the caller may proceed.
    pub fn allow(&mut self, now: Duration) -> bool {
        match self.window_start {
            Some(start) if now.saturating_sub(start) < self.interval => {}
            _ => {
                self.window_start = Some(now);
                self.count = 0;
            }
        }

        if self.count < self.max_count {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_hits_within_window() {
        let mut t = Throttle::new(Duration::from_secs(1), 3);
        let now = Duration::from_millis(10);
        assert!(t.allow(now));
        assert!(t.allow(now));
        assert!(t.allow(now + Duration::from_millis(500)));
        assert!(!t.allow(now + Duration::from_millis(900)));
    }

    #[test]
    fn test_window_resets_after_interval() {
        let mut t = Throttle::new(Duration::from_secs(1), 1);
        assert!(t.allow(Duration::ZERO));
        assert!(!t.allow(Duration::from_millis(999)));
        assert!(t.allow(Duration::from_millis(1000)));
        assert!(!t.allow(Duration::from_millis(1500)));
    }

    #[test]
    fn test_zero_count_blocks_everything() {
        let mut t = Throttle::new(Duration::from_secs(1), 0);
        assert!(!t.allow(Duration::ZERO));
    }
}
