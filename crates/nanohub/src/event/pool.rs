// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity event arena.
//!
//! Storage is split into blocks of `events_per_block` slots. Blocks are
//! materialized on demand, up to `max_blocks`, and never released. Free slots
//! live on a lock-free freelist so posting threads never contend with the
//! loop thread beyond a single slot lock.
//!
//! # Memory Budget
//! - 4 blocks x 24 events = 96 in-flight events (default config)

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;

use super::types::Event;

/// Handle to a pooled event
///
/// Encoded as: upper 16 bits = block index, lower 16 bits = slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(u32);

impl EventHandle {
    fn new(block: u16, slot: u16) -> Self {
        Self((u32::from(block) << 16) | u32::from(slot))
    }

    fn block(self) -> usize {
        (self.0 >> 16) as usize
    }

    fn slot(self) -> usize {
        (self.0 & 0xFFFF) as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

struct Block {
    slots: Box<[Mutex<Option<Event>>]>,
}

impl Block {
    fn new(events_per_block: usize) -> Self {
        Self {
            slots: (0..events_per_block).map(|_| Mutex::new(None)).collect(),
        }
    }
}

pub struct EventPool {
    blocks: Box<[OnceLock<Block>]>,
    events_per_block: usize,
    /// Number of materialized blocks; guards expansion.
    grown: Mutex<usize>,
    freelist: ArrayQueue<EventHandle>,
    allocated: AtomicUsize,
    /// Count of failed allocations (diagnostic)
    exhausted_count: AtomicU64,
}

impl EventPool {
    /// Create an empty pool able to hold `max_blocks * events_per_block`
    /// events. Both factors must be non-zero and the product fit in 16 bits;
    /// `EventLoopConfig::validate` enforces this.
    pub fn new(max_blocks: usize, events_per_block: usize) -> Self {
        let capacity = (max_blocks * events_per_block).max(1);
        Self {
            blocks: (0..max_blocks).map(|_| OnceLock::new()).collect(),
            events_per_block,
            grown: Mutex::new(0),
            freelist: ArrayQueue::new(capacity),
            allocated: AtomicUsize::new(0),
            exhausted_count: AtomicU64::new(0),
        }
    }

    /// Move `event` into a free slot.
    ///
    /// Returns the event back when the pool is at capacity.
    pub fn allocate(&self, event: Event) -> Result<EventHandle, Event> {
        let handle = loop {
            if let Some(handle) = self.freelist.pop() {
                break handle;
            }
            if !self.grow() {
                self.exhausted_count.fetch_add(1, Ordering::Relaxed);
                return Err(event);
            }
        };

        match self.slot(handle) {
            Some(slot) => {
                *slot.lock() = Some(event);
                self.allocated.fetch_add(1, Ordering::AcqRel);
                Ok(handle)
            }
            None => {
                log::error!("[EventPool] freelist yielded unmapped handle {:#010x}", handle.0);
                Err(event)
            }
        }
    }

    /// Inspect the event stored at `handle` without removing it.
    pub fn inspect<R>(&self, handle: EventHandle, f: impl FnOnce(&Event) -> R) -> Option<R> {
        self.slot(handle)?.lock().as_ref().map(f)
    }

    /// Remove the event from its slot. The slot stays allocated until
    /// [`release`](Self::release).
    pub fn take(&self, handle: EventHandle) -> Option<Event> {
        self.slot(handle)?.lock().take()
    }

    /// Return a slot to the freelist, dropping anything still stored in it.
    pub fn release(&self, handle: EventHandle) {
        let Some(slot) = self.slot(handle) else {
            log::error!("[EventPool] release of unknown handle {:#010x}", handle.0);
            return;
        };
        let leftover = slot.lock().take();
        drop(leftover);

        self.allocated.fetch_sub(1, Ordering::AcqRel);
        if self.freelist.push(handle).is_err() {
            log::error!("[EventPool] freelist overflow on handle {:#010x}", handle.0);
        }
    }

    pub fn is_full(&self) -> bool {
        self.allocated() >= self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len() * self.events_per_block
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn block_count(&self) -> usize {
        *self.grown.lock()
    }

    pub fn exhausted_count(&self) -> u64 {
        self.exhausted_count.load(Ordering::Relaxed)
    }

    fn slot(&self, handle: EventHandle) -> Option<&Mutex<Option<Event>>> {
        self.blocks
            .get(handle.block())?
            .get()?
            .slots
            .get(handle.slot())
    }

    /// Materialize the next block. Returns false once every block exists and
    /// no slot was freed in the meantime.
    fn grow(&self) -> bool {
        let mut grown = self.grown.lock();
        if !self.freelist.is_empty() {
            return true;
        }
        if *grown >= self.blocks.len() {
            return false;
        }

        let index = *grown;
        let block = self.blocks[index].get_or_init(|| Block::new(self.events_per_block));
        for slot in 0..block.slots.len() {
            // Indices fit in u16: capacity is validated to be <= 65535.
            let handle = EventHandle::new(index as u16, slot as u16);
            if self.freelist.push(handle).is_err() {
                log::error!("[EventPool] freelist overflow while growing block {}", index);
                break;
            }
        }
        *grown += 1;
        log::debug!(
            "[EventPool] grew to {} block(s) ({} events)",
            *grown,
            *grown * self.events_per_block
        );
        true
    }
}

impl std::fmt::Debug for EventPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPool")
            .field("capacity", &self.capacity())
            .field("allocated", &self.allocated())
            .field("blocks", &self.block_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_encoding() {
        let h = EventHandle::new(3, 17);
        assert_eq!(h.block(), 3);
        assert_eq!(h.slot(), 17);
        assert_eq!(h.raw(), (3 << 16) | 17);
    }

    #[test]
    fn test_allocate_until_full() {
        let pool = EventPool::new(2, 3);
        assert_eq!(pool.capacity(), 6);
        assert_eq!(pool.block_count(), 0);

        let handles: Vec<_> = (0..6)
            .map(|i| pool.allocate(Event::new(i)).expect("slot available"))
            .collect();
        assert!(pool.is_full());
        assert_eq!(pool.block_count(), 2);

        let rejected = pool.allocate(Event::new(99)).expect_err("pool is full");
        assert_eq!(rejected.event_type(), 99);
        assert_eq!(pool.exhausted_count(), 1);

        for h in handles {
            pool.release(h);
        }
        assert_eq!(pool.allocated(), 0);
    }

    #[test]
    fn test_blocks_grow_lazily() {
        let pool = EventPool::new(4, 2);
        let a = pool.allocate(Event::new(1)).expect("alloc");
        assert_eq!(pool.block_count(), 1);
        let _b = pool.allocate(Event::new(2)).expect("alloc");
        assert_eq!(pool.block_count(), 1);
        let _c = pool.allocate(Event::new(3)).expect("alloc");
        assert_eq!(pool.block_count(), 2);

        // A freed slot is reused before another block is materialized.
        pool.release(a);
        let _d = pool.allocate(Event::new(4)).expect("alloc");
        let _e = pool.allocate(Event::new(5)).expect("alloc");
        assert_eq!(pool.block_count(), 2);
    }

    #[test]
    fn test_take_and_inspect() {
        let pool = EventPool::new(1, 2);
        let h = pool.allocate(Event::new(7).with_payload(5u8)).expect("alloc");
        assert_eq!(pool.inspect(h, |ev| ev.event_type()), Some(7));

        let ev = pool.take(h).expect("stored");
        assert_eq!(ev.payload_as::<u8>(), Some(&5));
        assert!(pool.inspect(h, |_| ()).is_none());
        assert_eq!(pool.allocated(), 1);

        pool.release(h);
        assert_eq!(pool.allocated(), 0);
    }
}
