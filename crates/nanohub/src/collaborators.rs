// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Platform services the event loop calls into.
//!
//! The loop only needs a narrow slice of each subsystem: power hints around
//! every dispatch cycle, a flush of host-bound messages when an app goes
//! away, and per-domain release of whatever an app still owns at unload.
//! Each concern is a trait so platforms (and tests) plug in their own.

use std::fmt;

use crate::runtime::EventLoopHandle;
use crate::nanoapp::NanoappInfo;

/// Power management hooks, called once per dispatch cycle.
pub trait PowerControl: Send {
    /// `pending` includes the event about to be dispatched.
    fn pre_event_loop_process(&mut self, pending: usize);

    fn post_event_loop_process(&mut self, pending: usize);
}

/// Host messaging subsystem.
pub trait HostComms: Send {
    /// Drop or complete every host message the app still has in flight.
    /// Completions may be posted back through `events`.
    fn flush_nanoapp_messages(&mut self, app: &NanoappInfo, events: &EventLoopHandle);
}

/// Resource domains released at unload, in release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Wifi,
    Gnss,
    Sensor,
    Audio,
    Ble,
    Timer,
    Heap,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Wifi,
        ResourceKind::Gnss,
        ResourceKind::Sensor,
        ResourceKind::Audio,
        ResourceKind::Ble,
        ResourceKind::Timer,
        ResourceKind::Heap,
    ];

    /// Noun used when reporting leftovers.
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Wifi => "WIFI subscriptions",
            ResourceKind::Gnss => "GNSS subscriptions",
            ResourceKind::Sensor => "sensor subscriptions",
            ResourceKind::Audio => "audio requests",
            ResourceKind::Ble => "BLE scan requests",
            ResourceKind::Timer => "timers",
            ResourceKind::Heap => "heap blocks",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One resource manager.
pub trait ResourceReleaser: Send {
    fn kind(&self) -> ResourceKind;

    /// Release everything `app` still holds; returns how many were released.
    fn release_all(&mut self, app: &NanoappInfo) -> u32;
}

#[derive(Debug, Default)]
pub struct NullPowerControl;

impl PowerControl for NullPowerControl {
    fn pre_event_loop_process(&mut self, _pending: usize) {}

    fn post_event_loop_process(&mut self, _pending: usize) {}
}

#[derive(Debug, Default)]
pub struct NullHostComms;

impl HostComms for NullHostComms {
    fn flush_nanoapp_messages(&mut self, _app: &NanoappInfo, _events: &EventLoopHandle) {}
}

/// Services handed to the event loop at construction.
pub struct Collaborators {
    pub(crate) power: Box<dyn PowerControl>,
    pub(crate) host_comms: Box<dyn HostComms>,
    pub(crate) resources: Vec<Box<dyn ResourceReleaser>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self {
            power: Box::new(NullPowerControl),
            host_comms: Box::new(NullHostComms),
            resources: Vec::new(),
        }
    }

    pub fn with_power(mut self, power: impl PowerControl + 'static) -> Self {
        self.power = Box::new(power);
        self
    }

    pub fn with_host_comms(mut self, host_comms: impl HostComms + 'static) -> Self {
        self.host_comms = Box::new(host_comms);
        self
    }

    /// Add a resource manager. Several managers may share a kind.
    pub fn with_resource(mut self, releaser: impl ResourceReleaser + 'static) -> Self {
        self.resources.push(Box::new(releaser));
        self
    }

    /// Run every resource manager for `app`, domain by domain in
    /// [`ResourceKind::ALL`] order, logging leftovers.
    pub(crate) fn release_resources(&mut self, app: &NanoappInfo) {
        for kind in ResourceKind::ALL {
            for releaser in self.resources.iter_mut().filter(|r| r.kind() == kind) {
                let count = releaser.release_all(app);
                if count > 0 {
                    log::warn!(
                        "[EventLoop::unload] App 0x{:016x} had {} remaining {} at unload",
                        app.app_id,
                        count,
                        kind
                    );
                }
            }
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<ResourceKind> = self.resources.iter().map(|r| r.kind()).collect();
        f.debug_struct("Collaborators")
            .field("resources", &kinds)
            .finish_non_exhaustive()
    }
}
