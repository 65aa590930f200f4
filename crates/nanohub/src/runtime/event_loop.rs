// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Loop-thread side: dispatch, draining and unlocked registry access.

use std::sync::atomic::Ordering;
use std::time::Duration;

use super::EventLoopHandle;
use crate::collaborators::Collaborators;
use crate::config::{ConfigError, EventLoopConfig};
use crate::event::{
    Completion, Event, EventHandle, EventPayload, BROADCAST_INSTANCE_ID, SYSTEM_INSTANCE_ID,
};
use crate::nanoapp::{Nanoapp, NanoappInfo};
use crate::util::{time, DebugDump, MaxStat, Throttle};

/// Single-threaded dispatcher owning every loaded nanoapp.
///
/// The loop starts out accepting events, so work can be queued before
/// [`run`](Self::run) is entered. Once stopped it stays stopped.
pub struct EventLoop {
    pub(super) events: EventLoopHandle,
    pub(super) nanoapps: Vec<Nanoapp>,
    pub(super) collaborators: Collaborators,
    /// Instance id of the nanoapp whose code is running, if any.
    pub(super) current_app: Option<u16>,
    /// Instance id of the nanoapp being unloaded, if any.
    pub(super) stopping_app: Option<u16>,
    pub(super) next_instance_id: u16,
    event_pool_usage: MaxStat<usize>,
    undelivered_unicast: u32,
    latency_throttle: Throttle,
    last_wakeup_bucket_cycle: Duration,
}

impl EventLoop {
    pub fn new(config: EventLoopConfig) -> Result<Self, ConfigError> {
        Self::with_collaborators(config, Collaborators::default())
    }

    pub fn with_collaborators(
        config: EventLoopConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let latency_throttle = Throttle::new(config.throttle_interval(), config.throttle_count);
        Ok(Self {
            events: EventLoopHandle::new(config),
            nanoapps: Vec::new(),
            collaborators,
            current_app: None,
            stopping_app: None,
            next_instance_id: 1,
            event_pool_usage: MaxStat::new(),
            undelivered_unicast: 0,
            latency_throttle,
            last_wakeup_bucket_cycle: time::monotonic(),
        })
    }

    /// Handle for producer threads and collaborators.
    pub fn handle(&self) -> EventLoopHandle {
        self.events.clone()
    }

    pub fn config(&self) -> &EventLoopConfig {
        &self.events.shared.config
    }

    pub fn is_running(&self) -> bool {
        self.events.is_running()
    }

    /// Dispatch events until a stop request is processed, then free every
    /// event still queued and unload all nanoapps, newest first.
    ///
    /// On return the queue and the registry are empty.
    pub fn run(&mut self) {
        log::info!("[EventLoop] running with {} event slots", self.events.event_capacity());

        while self.is_running() {
            self.event_pool_usage.add_value(self.events.shared.pool.allocated());
            let handle = self.events.shared.queue.pop();
            self.dispatch_cycle(handle);
        }

        self.drain();
        log::info!("[EventLoop] exiting");
    }

    /// Dispatch whatever is queued without blocking. Returns the number of
    /// events processed. Stops early when a stop request is processed;
    /// [`run`](Self::run) then only drains.
    pub fn run_until_idle(&mut self) -> usize {
        let mut processed = 0;
        while self.is_running() {
            self.event_pool_usage.add_value(self.events.shared.pool.allocated());
            let Some(handle) = self.events.shared.queue.try_pop() else {
                break;
            };
            self.dispatch_cycle(handle);
            processed += 1;
        }
        processed
    }

    fn dispatch_cycle(&mut self, handle: EventHandle) {
        let pending = self.events.shared.queue.len();
        self.collaborators.power.pre_event_loop_process(pending + 1);

        self.handle_nanoapp_wakeup_buckets();
        self.dispatch_handle(handle);

        let pending = self.events.shared.queue.len();
        self.collaborators.power.post_event_loop_process(pending);
    }

    fn drain(&mut self) {
        // Pending events are released, not delivered.
        while let Some(handle) = self.events.shared.queue.try_pop() {
            self.free_handle(handle);
        }

        while let Some(index) = self.nanoapps.len().checked_sub(1) {
            self.unload_nanoapp_at_index(index, true);
        }

        // Anything a racing producer slipped in after the stop.
        while let Some(handle) = self.events.shared.queue.try_pop() {
            self.free_handle(handle);
        }
    }

    pub(super) fn on_stop_complete(&mut self) {
        log::debug!("[EventLoop] stop requested");
        self.events.shared.running.store(false, Ordering::Release);
    }

    fn dispatch_handle(&mut self, handle: EventHandle) {
        match self.events.shared.pool.take(handle) {
            Some(event) => self.distribute_event(event),
            None => log::error!("[EventLoop] queued handle {:#010x} is empty", handle.raw()),
        }
        self.events.shared.pool.release(handle);
    }

    fn free_handle(&mut self, handle: EventHandle) {
        if let Some(event) = self.events.shared.pool.take(handle) {
            self.free_event(event);
        }
        self.events.shared.pool.release(handle);
    }

    /// Dispatch every event currently queued, bypassing power hooks.
    pub(super) fn flush_inbound_event_queue(&mut self) {
        while let Some(handle) = self.events.shared.queue.try_pop() {
            self.dispatch_handle(handle);
        }
    }

    /// Deliver `event` to every matching nanoapp, then complete it.
    fn distribute_event(&mut self, event: Event) {
        let mut delivered = false;
        for index in 0..self.nanoapps.len() {
            let app = &self.nanoapps[index];
            let wanted = if event.is_broadcast() {
                app.is_registered_for_broadcast(&event)
            } else {
                event.target_instance_id() == app.instance_id()
            };
            if wanted {
                delivered = true;
                self.deliver_next_event(index, &event);
            }
        }

        if !delivered
            && event.target_instance_id() != BROADCAST_INSTANCE_ID
            && event.target_instance_id() != SYSTEM_INSTANCE_ID
        {
            self.undelivered_unicast = self.undelivered_unicast.saturating_add(1);
            log::warn!(
                "[EventLoop] dropping event 0x{:04x} from instance {}: target instance {} not loaded",
                event.event_type(),
                event.sender_instance_id(),
                event.target_instance_id()
            );
        }

        self.free_event(event);
    }

    fn deliver_next_event(&mut self, index: usize, event: &Event) {
        let instance_id = self.nanoapps[index].instance_id();
        let latency = time::latency_millis(time::event_time_millis(), event.enqueue_time_ms());
        if latency >= self.config().latency_warn_threshold_ms
            && self.latency_throttle.allow(time::monotonic())
        {
            log::warn!(
                "[EventLoop] delayed event 0x{:04x} from instance {} to instance {} took {}ms to deliver",
                event.event_type(),
                event.sender_instance_id(),
                instance_id,
                latency
            );
        }

        let stopping = self.is_instance_stopping(instance_id);
        self.set_current_app(Some(instance_id));
        self.nanoapps[index].handle_event(&self.events, stopping, event);
        self.set_current_app(None);
    }

    /// Run the event's completion: free callbacks under the sender's app
    /// context, system callbacks with the loop itself.
    fn free_event(&mut self, event: Event) {
        let sender = event.sender_instance_id();
        let (event_type, payload, completion) = event.into_parts();
        match completion {
            Completion::None => drop(payload),
            Completion::Free(callback) => {
                let previous = self.set_current_app(self.index_of(sender).map(|_| sender));
                callback(event_type, payload);
                self.set_current_app(previous);
            }
            Completion::System(callback) => callback(self),
        }
    }

    /// Deliver an event straight to one nanoapp, skipping the queue.
    /// Must be called on the loop thread. Returns false if no such app.
    pub fn deliver_event_sync(
        &mut self,
        instance_id: u16,
        event_type: u16,
        payload: Option<EventPayload>,
    ) -> bool {
        let Some(index) = self.index_of(instance_id) else {
            return false;
        };

        let mut event = Event::new(event_type).to_instance(instance_id);
        if let Some(payload) = payload {
            event = event.with_boxed_payload(payload);
        }
        event.stamp(time::event_time_millis());
        self.deliver_next_event(index, &event);
        true
    }

    /// Roll every nanoapp's wakeup buckets once the bucket interval elapsed.
    pub fn handle_nanoapp_wakeup_buckets(&mut self) {
        self.cycle_wakeup_buckets_if_due(time::monotonic());
    }

    fn cycle_wakeup_buckets_if_due(&mut self, now: Duration) {
        if now.saturating_sub(self.last_wakeup_bucket_cycle) > self.config().wakeup_bucket_interval() {
            self.last_wakeup_bucket_cycle = now;
            for app in &mut self.nanoapps {
                app.cycle_wakeup_buckets();
            }
        }
    }

    pub(super) fn index_of(&self, instance_id: u16) -> Option<usize> {
        self.nanoapps
            .iter()
            .position(|app| app.instance_id() == instance_id)
    }

    pub fn find_instance_id_by_app_id(&self, app_id: u64) -> Option<u16> {
        self.find_nanoapp_by_app_id(app_id).map(Nanoapp::instance_id)
    }

    pub fn find_nanoapp_by_app_id(&self, app_id: u64) -> Option<&Nanoapp> {
        self.nanoapps.iter().find(|app| app.app_id() == app_id)
    }

    pub fn find_nanoapp_by_instance_id(&self, instance_id: u16) -> Option<&Nanoapp> {
        self.nanoapps
            .iter()
            .find(|app| app.instance_id() == instance_id)
    }

    pub fn nanoapp_info_for_app_id(&self, app_id: u64) -> Option<NanoappInfo> {
        self.find_nanoapp_by_app_id(app_id).map(|app| app.info().clone())
    }

    pub fn nanoapp_info_for_instance_id(&self, instance_id: u16) -> Option<NanoappInfo> {
        self.find_nanoapp_by_instance_id(instance_id)
            .map(|app| app.info().clone())
    }

    pub fn for_each_nanoapp(&self, f: impl FnMut(&Nanoapp)) {
        self.nanoapps.iter().for_each(f);
    }

    pub fn nanoapp_count(&self) -> usize {
        self.nanoapps.len()
    }

    /// Nanoapp whose code is currently running on the loop thread.
    pub fn current_app(&self) -> Option<&Nanoapp> {
        self.current_app
            .and_then(|id| self.find_nanoapp_by_instance_id(id))
    }

    pub fn stopping_instance_id(&self) -> Option<u16> {
        self.stopping_app
    }

    /// Swap the current app context, returning the previous one.
    pub(super) fn set_current_app(&mut self, instance_id: Option<u16>) -> Option<u16> {
        self.events
            .shared
            .current_app
            .store(instance_id.unwrap_or(SYSTEM_INSTANCE_ID), Ordering::Release);
        std::mem::replace(&mut self.current_app, instance_id)
    }

    pub(super) fn set_stopping_app(&mut self, instance_id: Option<u16>) -> Option<u16> {
        self.events
            .shared
            .stopping_app
            .store(instance_id.unwrap_or(SYSTEM_INSTANCE_ID), Ordering::Release);
        std::mem::replace(&mut self.stopping_app, instance_id)
    }

    pub fn max_event_pool_usage(&self) -> usize {
        self.event_pool_usage.max()
    }

    pub fn dropped_low_priority_count(&self) -> u32 {
        self.events.dropped_low_priority_count()
    }

    pub fn undelivered_unicast_count(&self) -> u32 {
        self.undelivered_unicast
    }

    /// Append loop statistics and per-nanoapp state to `dump`.
    pub fn log_state_to_buffer<D: DebugDump + ?Sized>(&self, dump: &mut D) {
        dump.print(format_args!("\nEvent Loop:\n"));
        dump.print(format_args!(
            "  Max event pool usage: {}/{}\n",
            self.event_pool_usage.max(),
            self.events.event_capacity()
        ));
        dump.print(format_args!(
            "  Number of low priority events dropped: {}\n",
            self.dropped_low_priority_count()
        ));
        dump.print(format_args!(
            "  Number of undelivered unicast events: {}\n",
            self.undelivered_unicast
        ));

        let since_cycle = time::monotonic().saturating_sub(self.last_wakeup_bucket_cycle);
        dump.print(format_args!(
            "  Nanoapp host wakeup tracking: cycled {} mins ago, bucketDuration={} mins\n",
            since_cycle.as_secs() / 60,
            self.config().wakeup_bucket_interval_secs / 60
        ));

        dump.print(format_args!("\nNanoapps:\n"));
        for app in &self.nanoapps {
            app.log_state_to_buffer(dump);
        }

        if !self.nanoapps.is_empty() {
            Nanoapp::log_wakeup_header(dump);
            for app in &self.nanoapps {
                app.log_wakeup_entry(dump);
            }
        }
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("running", &self.is_running())
            .field("nanoapps", &self.nanoapps)
            .field("current_app", &self.current_app)
            .field("stopping_app", &self.stopping_app)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::nanoapp::{AppContext, NanoappHandler};

    struct Blamer;

    impl NanoappHandler for Blamer {
        fn handle_event(&mut self, ctx: &mut AppContext<'_>, _event: &Event) {
            ctx.blame_host_wakeup();
        }
    }

    fn buckets(el: &EventLoop, instance_id: u16) -> Vec<u16> {
        el.find_nanoapp_by_instance_id(instance_id)
            .map(|app| app.wakeup_buckets().iter().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_wakeup_buckets_cycle_after_interval() {
        let mut config = EventLoopConfig::default();
        config.wakeup_bucket_count = 2;
        let mut el = EventLoop::new(config).expect("config");
        let id = el.start_nanoapp(Nanoapp::new(1, 1, Blamer)).expect("start");

        assert!(el.deliver_event_sync(id, 0x8001, None));
        let start = el.last_wakeup_bucket_cycle;
        let interval = el.config().wakeup_bucket_interval();

        el.cycle_wakeup_buckets_if_due(start + interval);
        assert_eq!(buckets(&el, id), vec![1]);

        el.cycle_wakeup_buckets_if_due(start + interval + Duration::from_millis(1));
        assert!(el.deliver_event_sync(id, 0x8001, None));
        assert!(el.deliver_event_sync(id, 0x8001, None));
        assert_eq!(buckets(&el, id), vec![1, 2]);

        let later = el.last_wakeup_bucket_cycle + interval * 2;
        el.cycle_wakeup_buckets_if_due(later);
        assert_eq!(buckets(&el, id), vec![2, 0]);
    }

    #[test]
    fn test_stopping_guard_follows_running_flag() {
        let mut el = EventLoop::new(EventLoopConfig::default()).expect("config");
        assert!(!el.current_nanoapp_is_stopping());
        el.on_stop_complete();
        assert!(el.current_nanoapp_is_stopping());
        assert!(el.is_instance_stopping(1));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EventLoopConfig::default().with_pool(0, 4);
        assert!(matches!(EventLoop::new(config), Err(ConfigError::Invalid(_))));
    }
}
