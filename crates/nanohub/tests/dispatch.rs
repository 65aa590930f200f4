// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event dispatch integration tests
//!
//! Validates routing, ordering, completion and diagnostics.

mod common;

use common::*;
use nanohub::{
    AppContext, Collaborators, Event, EventLoop, EventLoopConfig, EventLoopHandle, EventPayload,
    Nanoapp, NanoappHandler, SYSTEM_INSTANCE_ID,
};
use parking_lot::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

fn event_loop() -> EventLoop {
    EventLoop::new(EventLoopConfig::default()).expect("default config is valid")
}

#[test]
fn test_fifo_delivery_order() {
    let mut el = event_loop();
    let log = call_log();
    el.start_nanoapp(Nanoapp::new(1, 1, Recorder::new(&log).subscribe(TEST_EVENT)))
        .expect("start");

    let handle = el.handle();
    for i in 0..20u32 {
        handle.post_event_or_die(Event::new(TEST_EVENT).with_payload(i));
    }
    el.run_until_idle();

    let payloads: Vec<u32> = log
        .lock()
        .iter()
        .filter_map(|c| match c {
            Call::Event { payload, .. } => *payload,
            _ => None,
        })
        .collect();
    assert_eq!(payloads, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_broadcast_follows_registry_order() {
    let mut el = event_loop();
    let log = call_log();
    let a = el
        .start_nanoapp(Nanoapp::new(1, 1, Recorder::new(&log).subscribe(TEST_EVENT)))
        .expect("a");
    let _quiet = el.start_nanoapp(Nanoapp::new(2, 1, Recorder::new(&log))).expect("quiet");
    let c = el
        .start_nanoapp(Nanoapp::new(3, 1, Recorder::new(&log).subscribe(TEST_EVENT)))
        .expect("c");

    el.handle().post_event_or_die(Event::new(TEST_EVENT));
    el.run_until_idle();

    assert_eq!(deliveries(&log), vec![(a, TEST_EVENT), (c, TEST_EVENT)]);
}

#[test]
fn test_unicast_reaches_only_target() {
    let mut el = event_loop();
    let log = call_log();
    let _a = el
        .start_nanoapp(Nanoapp::new(1, 1, Recorder::new(&log).subscribe(TEST_EVENT)))
        .expect("a");
    // Not registered for the type: unicast ignores registrations.
    let b = el.start_nanoapp(Nanoapp::new(2, 1, Recorder::new(&log))).expect("b");

    el.handle().post_event_or_die(Event::new(TEST_EVENT).to_instance(b));
    el.run_until_idle();

    assert_eq!(deliveries(&log), vec![(b, TEST_EVENT)]);
    assert_eq!(el.undelivered_unicast_count(), 0);
}

#[test]
fn test_group_masks_filter_broadcasts() {
    let mut el = event_loop();
    let log = call_log();
    let id = el
        .start_nanoapp(Nanoapp::new(1, 1, Recorder::new(&log).subscribe_masked(TEST_EVENT, 0b01)))
        .expect("start");

    let handle = el.handle();
    handle.post_event_or_die(Event::new(TEST_EVENT).with_group_mask(0b10).with_payload(1u32));
    handle.post_event_or_die(Event::new(TEST_EVENT).with_group_mask(0b11).with_payload(2u32));
    el.run_until_idle();

    assert_eq!(
        log.lock().last(),
        Some(&Call::Event {
            instance: id,
            event_type: TEST_EVENT,
            sender: SYSTEM_INSTANCE_ID,
            payload: Some(2),
        })
    );
    assert_eq!(deliveries(&log).len(), 1);
}

#[test]
fn test_unicast_to_unloaded_target_still_frees() {
    let mut el = event_loop();
    let log = call_log();
    let id = el.start_nanoapp(Nanoapp::new(1, 1, Recorder::new(&log))).expect("start");
    el.unload_nanoapp(id, false).expect("unload");

    let freed = Arc::new(AtomicUsize::new(0));
    assert!(el
        .handle()
        .post_low_priority_event_or_free(Event::new(TEST_EVENT).to_instance(id).with_free_callback(counting(&freed))));
    el.run_until_idle();

    assert_eq!(count(&freed), 1);
    assert_eq!(el.undelivered_unicast_count(), 1);
    assert!(deliveries(&log).is_empty());
    assert_eq!(el.handle().in_flight_event_count(), 0);
}

#[test]
fn test_free_callback_runs_after_every_delivery() {
    let mut el = event_loop();
    let log = call_log();
    for app_id in 1..=3 {
        el.start_nanoapp(Nanoapp::new(app_id, 1, Recorder::new(&log).subscribe(TEST_EVENT)))
            .expect("start");
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    let log_at_free = log.clone();
    let order_at_free = order.clone();
    el.handle().post_event_or_die(
        Event::new(TEST_EVENT)
            .with_payload(9u32)
            .with_free_callback(move |event_type, payload| {
                let payload = payload.and_then(|p| p.downcast::<u32>().ok());
                assert_eq!(payload.as_deref(), Some(&9));
                order_at_free
                    .lock()
                    .push((event_type, deliveries(&log_at_free).len()));
            }),
    );
    el.run_until_idle();

    assert_eq!(*order.lock(), vec![(TEST_EVENT, 3)]);
}

#[test]
fn test_system_targeted_event_is_silent() {
    let mut el = event_loop();
    let freed = Arc::new(AtomicUsize::new(0));
    el.handle().post_event_or_die(
        Event::new(TEST_EVENT)
            .to_instance(SYSTEM_INSTANCE_ID)
            .with_free_callback(counting(&freed)),
    );
    el.run_until_idle();
    assert_eq!(count(&freed), 1);
    assert_eq!(el.undelivered_unicast_count(), 0);
}

#[test]
fn test_deliver_event_sync() {
    let mut el = event_loop();
    let log = call_log();
    let id = el.start_nanoapp(Nanoapp::new(1, 1, Recorder::new(&log))).expect("start");
    let queued = el.handle().pending_event_count();

    assert!(el.deliver_event_sync(id, 0x8005, Some(Box::new(7u32))));
    assert!(!el.deliver_event_sync(99, 0x8005, None));

    assert_eq!(
        log.lock().last(),
        Some(&Call::Event {
            instance: id,
            event_type: 0x8005,
            sender: SYSTEM_INSTANCE_ID,
            payload: Some(7),
        })
    );
    assert_eq!(el.handle().pending_event_count(), queued);
}

#[test]
fn test_power_hooks_bracket_each_cycle() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let collab = Collaborators::new().with_power(PowerRecorder { log: calls.clone() });
    let mut el = EventLoop::with_collaborators(EventLoopConfig::default(), collab).expect("config");

    let handle = el.handle();
    for _ in 0..3 {
        handle.post_event_or_die(Event::new(TEST_EVENT));
    }
    assert_eq!(el.run_until_idle(), 3);

    assert_eq!(
        *calls.lock(),
        vec![
            PowerCall::Pre(3),
            PowerCall::Post(2),
            PowerCall::Pre(2),
            PowerCall::Post(1),
            PowerCall::Pre(1),
            PowerCall::Post(0),
        ]
    );
}

#[test]
fn test_debug_dump_reports_loop_and_apps() {
    let mut el = event_loop();
    let log = call_log();
    el.start_nanoapp(Nanoapp::new(0xAA, 0x0102_0003, Recorder::new(&log).subscribe(TEST_EVENT).blaming_wakeups()))
        .expect("start");

    let handle = el.handle();
    handle.post_event_or_die(Event::new(TEST_EVENT));
    handle.post_event_or_die(Event::new(TEST_EVENT));
    el.run_until_idle();

    let mut dump = String::new();
    el.log_state_to_buffer(&mut dump);

    assert!(dump.contains("Max event pool usage: 3/96"), "{dump}");
    assert!(dump.contains("Number of low priority events dropped: 0"), "{dump}");
    assert!(dump.contains("Number of undelivered unicast events: 0"), "{dump}");
    assert!(dump.contains("bucketDuration=5 mins"), "{dump}");
    assert!(
        dump.contains("Id=1 appId=0x00000000000000aa ver=0x01020003"),
        "{dump}"
    );
    assert!(dump.contains("events=2"), "{dump}");
    assert!(dump.contains("Id=1 [2] total=2"), "{dump}");
}

/// Sends one event from `start()` whose free callback records the app
/// context it runs under.
struct ContextRecorder {
    events: EventLoopHandle,
    seen: Arc<Mutex<Vec<Option<u16>>>>,
}

impl NanoappHandler for ContextRecorder {
    fn start(&mut self, ctx: &mut AppContext<'_>) -> bool {
        let events = self.events.clone();
        let seen = self.seen.clone();
        ctx.send_event(Event::new(TEST_EVENT).with_free_callback(
            move |_: u16, _: Option<EventPayload>| {
                seen.lock().push(events.current_app_instance_id());
            },
        ))
    }

    fn handle_event(&mut self, _ctx: &mut AppContext<'_>, _event: &Event) {}
}

#[test]
fn test_free_callback_runs_in_sender_context() {
    let mut el = event_loop();
    let handle = el.handle();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let id = el
        .start_nanoapp(Nanoapp::new(
            0x90,
            1,
            ContextRecorder {
                events: handle.clone(),
                seen: seen.clone(),
            },
        ))
        .expect("start");
    assert!(handle.current_app_instance_id().is_none());

    el.run_until_idle();

    assert_eq!(*seen.lock(), vec![Some(id)]);
    assert!(handle.current_app_instance_id().is_none());
}
