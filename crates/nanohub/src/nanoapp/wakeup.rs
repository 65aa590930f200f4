// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host wakeup accounting.
//!
//! Each nanoapp keeps a short ring of counters. The newest bucket collects
//! host wakeups blamed on the app; the event loop rolls every app's ring
//! forward once per bucket interval.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct WakeupBuckets {
    buckets: VecDeque<u16>,
    max_buckets: usize,
}

impl WakeupBuckets {
    pub fn new(max_buckets: usize) -> Self {
        let max_buckets = max_buckets.max(1);
        let mut buckets = VecDeque::with_capacity(max_buckets);
        buckets.push_back(0);
        Self {
            buckets,
            max_buckets,
        }
    }

    pub fn blame(&mut self) {
        if let Some(newest) = self.buckets.back_mut() {
            *newest = newest.saturating_add(1);
        }
    }

    /// Open a fresh bucket, forgetting the oldest one when the ring is full.
    pub fn cycle(&mut self) {
        if self.buckets.len() == self.max_buckets {
            self.buckets.pop_front();
        }
        self.buckets.push_back(0);
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.buckets.iter().copied()
    }

    pub fn total(&self) -> u32 {
        self.buckets.iter().map(|&c| u32::from(c)).sum()
    }
}

impl Default for WakeupBuckets {
    fn default() -> Self {
        Self::new(4)
    }
}
