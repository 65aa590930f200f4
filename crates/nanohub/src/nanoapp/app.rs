// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nanoapp record owned by the event loop registry.

use std::fmt;

use super::context::AppContext;
use super::info::{NanoappInfo, CURRENT_API_VERSION};
use super::registration::BroadcastRegistrations;
use super::wakeup::WakeupBuckets;
use crate::runtime::EventLoopHandle;
use crate::event::Event;
use crate::util::DebugDump;

/// Application logic of a nanoapp.
///
/// All three entry points run on the loop thread, to completion, with the
/// nanoapp set as the current app.
pub trait NanoappHandler: Send {
    /// Called once after the app was added to the registry. Returning false
    /// aborts the load; `end` is then never called.
    fn start(&mut self, ctx: &mut AppContext<'_>) -> bool {
        let _ = ctx;
        true
    }

    fn handle_event(&mut self, ctx: &mut AppContext<'_>, event: &Event);

    /// Called once during unload of a started app. Events sent from here are
    /// refused.
    fn end(&mut self, ctx: &mut AppContext<'_>) {
        let _ = ctx;
    }
}

pub struct Nanoapp {
    info: NanoappInfo,
    registrations: BroadcastRegistrations,
    wakeups: WakeupBuckets,
    events_processed: u64,
    handler: Box<dyn NanoappHandler>,
}

impl Nanoapp {
    pub fn new<H>(app_id: u64, version: u32, handler: H) -> Self
    where
        H: NanoappHandler + 'static,
    {
        Self {
            info: NanoappInfo {
                app_id,
                version,
                instance_id: 0,
                target_api_version: CURRENT_API_VERSION,
                is_system: false,
            },
            registrations: BroadcastRegistrations::default(),
            wakeups: WakeupBuckets::default(),
            events_processed: 0,
            handler: Box::new(handler),
        }
    }

    pub fn with_target_api_version(mut self, target_api_version: u32) -> Self {
        self.info.target_api_version = target_api_version;
        self
    }

    /// Mark as a system nanoapp, protected from regular unload requests.
    pub fn system(mut self) -> Self {
        self.info.is_system = true;
        self
    }

    pub fn info(&self) -> &NanoappInfo {
        &self.info
    }

    pub fn app_id(&self) -> u64 {
        self.info.app_id
    }

    pub fn instance_id(&self) -> u16 {
        self.info.instance_id
    }

    pub fn version(&self) -> u32 {
        self.info.version
    }

    pub fn target_api_version(&self) -> u32 {
        self.info.target_api_version
    }

    pub fn is_system(&self) -> bool {
        self.info.is_system
    }

    pub fn registrations(&self) -> &BroadcastRegistrations {
        &self.registrations
    }

    pub fn wakeup_buckets(&self) -> &WakeupBuckets {
        &self.wakeups
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn is_registered_for_broadcast(&self, event: &Event) -> bool {
        self.registrations.accepts(event)
    }

    pub(crate) fn prepare_for_load(&mut self, instance_id: u16, wakeup_bucket_count: usize) {
        self.info.instance_id = instance_id;
        self.wakeups = WakeupBuckets::new(wakeup_bucket_count);
    }

    pub(crate) fn start(&mut self, events: &EventLoopHandle, stopping: bool) -> bool {
        self.with_context(events, stopping, |handler, ctx| handler.start(ctx))
    }

    pub(crate) fn handle_event(&mut self, events: &EventLoopHandle, stopping: bool, event: &Event) {
        self.with_context(events, stopping, |handler, ctx| handler.handle_event(ctx, event));
        self.events_processed += 1;
    }

    pub(crate) fn end(&mut self, events: &EventLoopHandle) {
        self.with_context(events, true, |handler, ctx| handler.end(ctx));
    }

    pub(crate) fn cycle_wakeup_buckets(&mut self) {
        self.wakeups.cycle();
    }

    pub(crate) fn log_state_to_buffer<D: DebugDump + ?Sized>(&self, dump: &mut D) {
        dump.print(format_args!(
            "  Id={} appId=0x{:016x} ver=0x{:08x} targetAPI=0x{:08x} system={} events={} broadcastRegs={}\n",
            self.info.instance_id,
            self.info.app_id,
            self.info.version,
            self.info.target_api_version,
            self.info.is_system,
            self.events_processed,
            self.registrations.len(),
        ));
    }

    pub(crate) fn log_wakeup_header<D: DebugDump + ?Sized>(dump: &mut D) {
        dump.print(format_args!("\nHost wakeups per bucket (oldest first):\n"));
    }

    pub(crate) fn log_wakeup_entry<D: DebugDump + ?Sized>(&self, dump: &mut D) {
        let buckets: Vec<String> = self.wakeups.iter().map(|c| c.to_string()).collect();
        dump.print(format_args!(
            "  Id={} [{}] total={}\n",
            self.info.instance_id,
            buckets.join(", "),
            self.wakeups.total()
        ));
    }

    fn with_context<R>(
        &mut self,
        events: &EventLoopHandle,
        stopping: bool,
        f: impl FnOnce(&mut dyn NanoappHandler, &mut AppContext<'_>) -> R,
    ) -> R {
        let mut ctx = AppContext::new(
            &self.info,
            &mut self.registrations,
            &mut self.wakeups,
            events,
            stopping,
        );
        f(self.handler.as_mut(), &mut ctx)
    }
}

impl fmt::Debug for Nanoapp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nanoapp")
            .field("info", &self.info)
            .field("registrations", &self.registrations)
            .field("events_processed", &self.events_processed)
            .finish_non_exhaustive()
    }
}
