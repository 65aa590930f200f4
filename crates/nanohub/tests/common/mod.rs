// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Test nanoapps and collaborators shared by the integration tests.

#![allow(dead_code)]

use nanohub::{
    AppContext, Event, EventPayload, NanoappHandler, NanoappInfo, PowerControl, ResourceKind,
    ResourceReleaser, DEFAULT_TARGET_GROUP_MASK,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TEST_EVENT: u16 = 0x8001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start(u16),
    Event {
        instance: u16,
        event_type: u16,
        sender: u16,
        payload: Option<u32>,
    },
    End(u16),
    EndSend { accepted: bool },
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records every entry point it sees.
pub struct Recorder {
    log: CallLog,
    subscriptions: Vec<(u16, u32)>,
    start_ok: bool,
    blame_wakeups: bool,
    send_on_end: Option<Arc<AtomicUsize>>,
}

impl Recorder {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            subscriptions: Vec::new(),
            start_ok: true,
            blame_wakeups: false,
            send_on_end: None,
        }
    }

    pub fn subscribe(self, event_type: u16) -> Self {
        self.subscribe_masked(event_type, DEFAULT_TARGET_GROUP_MASK)
    }

    pub fn subscribe_masked(mut self, event_type: u16, mask: u32) -> Self {
        self.subscriptions.push((event_type, mask));
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.start_ok = false;
        self
    }

    pub fn blaming_wakeups(mut self) -> Self {
        self.blame_wakeups = true;
        self
    }

    /// Try to send an event from `end()`; `freed` counts its free callback.
    pub fn sending_on_end(mut self, freed: &Arc<AtomicUsize>) -> Self {
        self.send_on_end = Some(freed.clone());
        self
    }
}

impl NanoappHandler for Recorder {
    fn start(&mut self, ctx: &mut AppContext<'_>) -> bool {
        self.log.lock().push(Call::Start(ctx.instance_id()));
        for &(event_type, mask) in &self.subscriptions {
            ctx.register_broadcast(event_type, mask);
        }
        self.start_ok
    }

    fn handle_event(&mut self, ctx: &mut AppContext<'_>, event: &Event) {
        if self.blame_wakeups {
            ctx.blame_host_wakeup();
        }
        self.log.lock().push(Call::Event {
            instance: ctx.instance_id(),
            event_type: event.event_type(),
            sender: event.sender_instance_id(),
            payload: event.payload_as::<u32>().copied(),
        });
    }

    fn end(&mut self, ctx: &mut AppContext<'_>) {
        self.log.lock().push(Call::End(ctx.instance_id()));
        if let Some(freed) = self.send_on_end.clone() {
            let accepted = ctx.send_event(Event::new(0x8100).with_free_callback(counting(&freed)));
            self.log.lock().push(Call::EndSend { accepted });
        }
    }
}

/// Deliveries in the log, as `(instance, event_type)`.
pub fn deliveries(log: &CallLog) -> Vec<(u16, u16)> {
    log.lock()
        .iter()
        .filter_map(|call| match call {
            Call::Event {
                instance,
                event_type,
                ..
            } => Some((*instance, *event_type)),
            _ => None,
        })
        .collect()
}

/// Free callback that bumps `counter`.
pub fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce(u16, Option<EventPayload>) + Send + 'static {
    let counter = counter.clone();
    move |_: u16, _: Option<EventPayload>| {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Free callback that appends the event type to `order`.
pub fn recording(order: &Arc<Mutex<Vec<u16>>>) -> impl FnOnce(u16, Option<EventPayload>) + Send + 'static {
    let order = order.clone();
    move |event_type: u16, _: Option<EventPayload>| order.lock().push(event_type)
}

pub fn count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Resource manager that reports `leaked` leftovers per app.
pub struct LeakyReleaser {
    pub kind: ResourceKind,
    pub leaked: u32,
    pub log: Arc<Mutex<Vec<(ResourceKind, u16)>>>,
}

impl ResourceReleaser for LeakyReleaser {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn release_all(&mut self, app: &NanoappInfo) -> u32 {
        self.log.lock().push((self.kind, app.instance_id));
        self.leaked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCall {
    Pre(usize),
    Post(usize),
}

pub struct PowerRecorder {
    pub log: Arc<Mutex<Vec<PowerCall>>>,
}

impl PowerControl for PowerRecorder {
    fn pre_event_loop_process(&mut self, pending: usize) {
        self.log.lock().push(PowerCall::Pre(pending));
    }

    fn post_event_loop_process(&mut self, pending: usize) {
        self.log.lock().push(PowerCall::Post(pending));
    }
}
