// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::info::NanoappInfo;
use super::registration::BroadcastRegistrations;
use super::wakeup::WakeupBuckets;
use crate::runtime::EventLoopHandle;
use crate::event::Event;

/// What a nanoapp can reach while one of its entry points runs.
///
/// Apps only post through [`AppContext::send_event`], which stamps their
/// instance id as sender; the raw loop handle is not exposed.
pub struct AppContext<'a> {
    info: &'a NanoappInfo,
    registrations: &'a mut BroadcastRegistrations,
    wakeups: &'a mut WakeupBuckets,
    events: &'a EventLoopHandle,
    stopping: bool,
}

impl<'a> AppContext<'a> {
    pub(crate) fn new(
        info: &'a NanoappInfo,
        registrations: &'a mut BroadcastRegistrations,
        wakeups: &'a mut WakeupBuckets,
        events: &'a EventLoopHandle,
        stopping: bool,
    ) -> Self {
        Self {
            info,
            registrations,
            wakeups,
            events,
            stopping,
        }
    }

    pub fn info(&self) -> &NanoappInfo {
        self.info
    }

    pub fn instance_id(&self) -> u16 {
        self.info.instance_id
    }

    pub fn app_id(&self) -> u64 {
        self.info.app_id
    }

    /// True while the app is being unloaded or the loop is shutting down.
    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Post a low-priority event from this app.
    ///
    /// The free callback runs immediately when the event is refused, either
    /// because the app is stopping or because the pool is full.
    pub fn send_event(&mut self, event: Event) -> bool {
        self.events
            .post_low_priority_event_or_free(event.from_sender(self.info.instance_id))
    }

    pub fn register_broadcast(&mut self, event_type: u16, group_mask: u32) -> bool {
        self.registrations.register(event_type, group_mask)
    }

    pub fn unregister_broadcast(&mut self, event_type: u16, group_mask: u32) -> bool {
        self.registrations.unregister(event_type, group_mask)
    }

    pub fn is_registered_for(&self, event_type: u16) -> bool {
        self.registrations.is_registered(event_type)
    }

    /// Attribute one host wakeup to this app.
    pub fn blame_host_wakeup(&mut self) {
        self.wakeups.blame();
    }

    pub fn find_instance_id_by_app_id(&self, app_id: u64) -> Option<u16> {
        self.events.find_instance_id_by_app_id(app_id)
    }

    pub fn nanoapp_info_for_instance_id(&self, instance_id: u16) -> Option<NanoappInfo> {
        self.events.nanoapp_info_for_instance_id(instance_id)
    }
}
