// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monotonic time source.
//!
//! All runtime timestamps are offsets from a process-wide epoch captured on
//! first use. Events only carry the low 16 bits of the millisecond counter,
//! so latency math has to tolerate exactly one wraparound.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Time elapsed since the runtime epoch.
pub fn monotonic() -> Duration {
    EPOCH.get_or_init(Instant::now).elapsed()
}

/// Current time truncated to a wrapping 16-bit millisecond counter.
pub fn event_time_millis() -> u16 {
    (monotonic().as_millis() & 0xFFFF) as u16
}

/// Milliseconds between `enqueued` and `now`, assuming at most one wrap of
/// the 16-bit counter in between.
pub fn latency_millis(now: u16, enqueued: u16) -> u32 {
    let mut now = u32::from(now);
    let enqueued = u32::from(enqueued);
    if now < enqueued {
        now += u32::from(u16::MAX) + 1;
    }
    now - enqueued
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_without_wrap() {
        assert_eq!(latency_millis(1500, 500), 1000);
        assert_eq!(latency_millis(42, 42), 0);
    }

    #[test]
    fn test_latency_across_wrap() {
        // enqueued 100ms before the counter wrapped, dispatched 50ms after
        assert_eq!(latency_millis(50, 65_436), 150);
        assert_eq!(latency_millis(0, u16::MAX), 1);
    }

    #[test]
    fn test_monotonic_never_goes_backwards() {
        let a = monotonic();
        let b = monotonic();
        assert!(b >= a);
    }
}
