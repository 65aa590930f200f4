// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

/// Statistics container that only remembers the largest sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxStat<T> {
    max: T,
}

impl<T: Copy + PartialOrd + Default> MaxStat<T> {
    pub fn new() -> Self {
        Self { max: T::default() }
    }

    pub fn add_value(&mut self, value: T) {
        if value > self.max {
            self.max = value;
        }
    }

    pub fn max(&self) -> T {
        self.max
    }
}
