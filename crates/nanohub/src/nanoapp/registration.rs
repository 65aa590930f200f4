// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::event::Event;

/// Broadcast subscriptions of one nanoapp as `(event_type, group_mask)`.
///
/// Registering a type twice widens its mask; unregistering narrows it and
/// drops the entry once the mask is empty.
#[derive(Debug, Clone, Default)]
pub struct BroadcastRegistrations {
    entries: Vec<(u16, u32)>,
}

impl BroadcastRegistrations {
    /// Returns false for an empty mask.
    pub fn register(&mut self, event_type: u16, group_mask: u32) -> bool {
        if group_mask == 0 {
            return false;
        }
        match self.entries.iter_mut().find(|(ty, _)| *ty == event_type) {
            Some((_, mask)) => *mask |= group_mask,
            None => self.entries.push((event_type, group_mask)),
        }
        true
    }

    /// Returns false if the type was not registered.
    pub fn unregister(&mut self, event_type: u16, group_mask: u32) -> bool {
        let Some(pos) = self.entries.iter().position(|(ty, _)| *ty == event_type) else {
            return false;
        };
        self.entries[pos].1 &= !group_mask;
        if self.entries[pos].1 == 0 {
            self.entries.remove(pos);
        }
        true
    }

    pub fn accepts(&self, event: &Event) -> bool {
        self.entries
            .iter()
            .any(|&(ty, mask)| ty == event.event_type() && mask & event.target_group_mask() != 0)
    }

    pub fn is_registered(&self, event_type: u16) -> bool {
        self.entries.iter().any(|(ty, _)| *ty == event_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
