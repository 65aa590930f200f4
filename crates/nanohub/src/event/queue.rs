// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-producer, single-consumer FIFO of pooled events.
//!
//! # Architecture
//! - `Mutex<VecDeque>` sized to the pool capacity up front, so pushes never
//!   reallocate (every queued handle owns a pool slot)
//! - `Condvar` wakes the loop thread blocked in [`EventQueue::pop`]
//!
//! Lock order: queue lock before any pool slot lock.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

use super::pool::EventHandle;

#[derive(Debug)]
pub struct EventQueue {
    entries: Mutex<VecDeque<EventHandle>>,
    not_empty: Condvar,
}

impl EventQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
        }
    }

    pub fn push(&self, handle: EventHandle) {
        self.entries.lock().push_back(handle);
        self.not_empty.notify_one();
    }

    /// Block until a handle is available.
    pub fn pop(&self) -> EventHandle {
        let mut entries = self.entries.lock();
        loop {
            if let Some(handle) = entries.pop_front() {
                return handle;
            }
            self.not_empty.wait(&mut entries);
        }
    }

    pub fn try_pop(&self) -> Option<EventHandle> {
        self.entries.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove up to `max` entries accepted by `matches`, scanning from the
    /// tail. Survivors keep their relative order.
    ///
    /// Returned handles are youngest first.
    pub fn remove_matched_from_back<F>(&self, max: usize, mut matches: F) -> Vec<EventHandle>
    where
        F: FnMut(EventHandle) -> bool,
    {
        let mut removed = Vec::with_capacity(max);
        let mut entries = self.entries.lock();
        let mut index = entries.len();
        while index > 0 && removed.len() < max {
            index -= 1;
            if matches(entries[index]) {
                if let Some(handle) = entries.remove(index) {
                    removed.push(handle);
                }
            }
        }
        removed
    }
}
