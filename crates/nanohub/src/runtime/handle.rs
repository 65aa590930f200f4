// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Thread-safe side of the event loop: admission control and locked lookups.
//!
//! # Admission policy
//! - High-priority events (system events, status notifications) are never
//!   dropped. With a full pool, up to `low_priority_evict_target`
//!   low-priority system events are evicted from the queue tail first; if
//!   none can be evicted the runtime stops with a fatal error.
//! - Low-priority events are dropped when the pool is full: their free
//!   callback runs right away and the dropped counter increments.
//! - Events sent by the nanoapp being unloaded are refused and freed on
//!   the spot, whichever handle they are posted through.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;

use super::EventLoop;
use crate::config::EventLoopConfig;
use crate::event::{
    Event, EventPool, EventQueue, SystemCallbackType, SYSTEM_INSTANCE_ID,
};
use crate::nanoapp::{Nanoapp, NanoappInfo};
use crate::util::time;

pub(crate) struct Shared {
    pub(crate) config: EventLoopConfig,
    pub(crate) pool: EventPool,
    pub(crate) queue: EventQueue,
    pub(crate) running: AtomicBool,
    /// Mirror of the registry for off-thread lookups. Mutated only by the
    /// loop thread, and never locked while nanoapp code runs.
    pub(crate) directory: Mutex<Vec<NanoappInfo>>,
    pub(crate) dropped_low_priority: AtomicU32,
    /// Loop-thread app context, `SYSTEM_INSTANCE_ID` when none.
    pub(crate) current_app: AtomicU16,
    pub(crate) stopping_app: AtomicU16,
}

/// Cloneable handle for posting events and querying loaded nanoapps from
/// any thread.
#[derive(Clone)]
pub struct EventLoopHandle {
    pub(crate) shared: Arc<Shared>,
}

impl EventLoopHandle {
    pub(crate) fn new(config: EventLoopConfig) -> Self {
        let pool = EventPool::new(config.event_blocks, config.events_per_block);
        let queue = EventQueue::with_capacity(pool.capacity());
        Self {
            shared: Arc::new(Shared {
                config,
                pool,
                queue,
                running: AtomicBool::new(true),
                directory: Mutex::new(Vec::new()),
                dropped_low_priority: AtomicU32::new(0),
                current_app: AtomicU16::new(SYSTEM_INSTANCE_ID),
                stopping_app: AtomicU16::new(SYSTEM_INSTANCE_ID),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &EventLoopConfig {
        &self.shared.config
    }

    /// Events waiting in the queue.
    pub fn pending_event_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Pool slots currently holding an event (queued or being dispatched).
    pub fn in_flight_event_count(&self) -> usize {
        self.shared.pool.allocated()
    }

    pub fn event_capacity(&self) -> usize {
        self.shared.pool.capacity()
    }

    pub fn dropped_low_priority_count(&self) -> u32 {
        self.shared.dropped_low_priority.load(Ordering::Relaxed)
    }

    /// Instance id of the nanoapp the loop thread is running code for:
    /// entry points, free callbacks of its events, resource cleanup.
    pub fn current_app_instance_id(&self) -> Option<u16> {
        match self.shared.current_app.load(Ordering::Acquire) {
            SYSTEM_INSTANCE_ID => None,
            instance_id => Some(instance_id),
        }
    }

    /// Instance id of the nanoapp being unloaded, if any.
    pub fn stopping_instance_id(&self) -> Option<u16> {
        match self.shared.stopping_app.load(Ordering::Acquire) {
            SYSTEM_INSTANCE_ID => None,
            instance_id => Some(instance_id),
        }
    }

    /// Post a high-priority event from the system.
    ///
    /// Once the loop has stopped the event is not queued and its free
    /// callback runs immediately.
    ///
    /// # Panics
    /// Fatal error if no pool slot can be freed for the event.
    pub fn post_event_or_die(&self, event: Event) {
        let event = event.from_sender(SYSTEM_INSTANCE_ID).into_high_priority();
        if !self.is_running() {
            event.release_detached();
            return;
        }

        let event_type = event.event_type();
        if self.has_no_space_for_high_priority_event() {
            fatal_error!("Failed to post critical system event 0x{:04x}: no space", event_type);
        }
        if self.allocate_and_post(event).is_err() {
            fatal_error!("Failed to post critical system event 0x{:04x}", event_type);
        }
    }

    /// Queue `callback` to run on the loop thread with full access to the
    /// [`EventLoop`]. Returns false once the loop has stopped.
    ///
    /// # Panics
    /// Fatal error if no pool slot can be freed for the event.
    pub fn post_system_event<F>(&self, kind: SystemCallbackType, callback: F) -> bool
    where
        F: FnOnce(&mut EventLoop) + Send + 'static,
    {
        if !self.is_running() {
            return false;
        }

        if self.has_no_space_for_high_priority_event() {
            fatal_error!(
                "Failed to post critical system event 0x{:04x}: no space",
                kind.event_type()
            );
        }
        let event = Event::system_callback(kind, Box::new(callback));
        if self.allocate_and_post(event).is_err() {
            fatal_error!("Failed to post critical system event 0x{:04x}", kind.event_type());
        }
        true
    }

    /// Post a droppable event. Returns whether it was queued; if not, its
    /// free callback has already run.
    ///
    /// Events whose sender is the nanoapp being unloaded are refused.
    pub fn post_low_priority_event_or_free(&self, event: Event) -> bool {
        let event = event.into_low_priority();
        if !self.is_running() {
            event.release_detached();
            return false;
        }

        let sender = event.sender_instance_id();
        if sender != SYSTEM_INSTANCE_ID && self.stopping_instance_id() == Some(sender) {
            log::warn!(
                "[EventLoop] rejecting event 0x{:04x} from app instance {} because it's stopping",
                event.event_type(),
                sender
            );
            event.release_detached();
            return false;
        }

        match self.allocate_and_post(event) {
            Ok(()) => true,
            Err(event) => {
                self.shared.dropped_low_priority.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "[EventLoop] dropped low priority event 0x{:04x} for instance {}",
                    event.event_type(),
                    event.target_instance_id()
                );
                event.release_detached();
                false
            }
        }
    }

    /// Ask the loop to stop once everything queued so far is dispatched.
    /// Returns false if it is already stopping.
    pub fn stop(&self) -> bool {
        self.post_system_event(SystemCallbackType::Shutdown, |event_loop| {
            event_loop.on_stop_complete();
        })
    }

    /// Load and start `nanoapp` on the loop thread. A request still queued
    /// when the loop stops is dropped without starting the app.
    pub fn request_nanoapp_load(&self, nanoapp: Nanoapp) -> bool {
        self.post_system_event(SystemCallbackType::NanoappLoad, move |event_loop| {
            let app_id = nanoapp.app_id();
            if !event_loop.is_running() {
                log::debug!("[EventLoop] skipping deferred load of app 0x{:016x}: loop stopped", app_id);
                return;
            }
            if let Err(e) = event_loop.start_nanoapp(nanoapp) {
                log::error!("[EventLoop] deferred load of app 0x{:016x} failed: {}", app_id, e);
            }
        })
    }

    /// Unload a nanoapp on the loop thread.
    pub fn request_nanoapp_unload(&self, instance_id: u16, allow_system_unload: bool) -> bool {
        self.post_system_event(SystemCallbackType::NanoappUnload, move |event_loop| {
            if let Err(e) = event_loop.unload_nanoapp(instance_id, allow_system_unload) {
                log::error!("[EventLoop] deferred unload failed: {}", e);
            }
        })
    }

    pub fn find_instance_id_by_app_id(&self, app_id: u64) -> Option<u16> {
        self.shared
            .directory
            .lock()
            .iter()
            .find(|info| info.app_id == app_id)
            .map(|info| info.instance_id)
    }

    pub fn nanoapp_info_for_app_id(&self, app_id: u64) -> Option<NanoappInfo> {
        self.shared
            .directory
            .lock()
            .iter()
            .find(|info| info.app_id == app_id)
            .cloned()
    }

    pub fn nanoapp_info_for_instance_id(&self, instance_id: u16) -> Option<NanoappInfo> {
        self.shared
            .directory
            .lock()
            .iter()
            .find(|info| info.instance_id == instance_id)
            .cloned()
    }

    /// Visit every loaded nanoapp in registry order. The directory lock is
    /// held during the walk: `f` must not call back into lookups.
    pub fn for_each_nanoapp(&self, mut f: impl FnMut(&NanoappInfo)) {
        for info in self.shared.directory.lock().iter() {
            f(info);
        }
    }

    pub fn nanoapp_count(&self) -> usize {
        self.shared.directory.lock().len()
    }

    fn allocate_and_post(&self, mut event: Event) -> Result<(), Event> {
        event.stamp(time::event_time_millis());
        match self.shared.pool.allocate(event) {
            Ok(handle) => {
                self.shared.queue.push(handle);
                Ok(())
            }
            Err(event) => {
                log::error!(
                    "[EventLoop] failed to allocate event 0x{:04x} to instance {}",
                    event.event_type(),
                    event.target_instance_id()
                );
                Err(event)
            }
        }
    }

    fn has_no_space_for_high_priority_event(&self) -> bool {
        self.shared.pool.is_full()
            && !self
                .remove_non_nanoapp_low_priority_events_from_back(self.shared.config.low_priority_evict_target)
    }

    /// Evict up to `count` low-priority events sent by the system, youngest
    /// first. Their free callbacks run on the calling thread.
    fn remove_non_nanoapp_low_priority_events_from_back(&self, count: usize) -> bool {
        if count == 0 {
            return true;
        }

        let pool = &self.shared.pool;
        let removed = self.shared.queue.remove_matched_from_back(count, |handle| {
            pool.inspect(handle, |event| {
                event.is_low_priority() && event.sender_instance_id() == SYSTEM_INSTANCE_ID
            })
            .unwrap_or(false)
        });
        if removed.is_empty() {
            log::warn!("[EventLoop] cannot remove any low priority event");
            return false;
        }

        self.shared
            .dropped_low_priority
            .fetch_add(removed.len() as u32, Ordering::Relaxed);
        for handle in removed {
            if let Some(event) = pool.take(handle) {
                event.release_detached();
            }
            pool.release(handle);
        }
        true
    }
}

impl std::fmt::Debug for EventLoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoopHandle")
            .field("running", &self.is_running())
            .field("pending", &self.pending_event_count())
            .field("pool", &self.shared.pool)
            .finish()
    }
}
