// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simulation driver: one loop thread, N producer threads.

use anyhow::Context;
use nanohub::{
    Collaborators, Event, EventLoop, EventLoopConfig, Nanoapp, SystemCallbackType,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::apps::{
    Echo, QueueDepthMonitor, ReadingCounter, SensorSampler, SimTimers, COUNTER_APP_ID,
    ECHO_APP_ID, EVENT_PING, EVENT_SAMPLE_TICK, SAMPLER_APP_ID,
};

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub producers: usize,
    pub events_per_producer: u32,
    /// Every n-th event a producer posts is a ping to the echo app.
    pub ping_every: u32,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            producers: 4,
            events_per_producer: 500,
            ping_every: 10,
        }
    }
}

#[derive(Debug, Default)]
pub struct SimReport {
    pub ticks_posted: u64,
    pub ticks_rejected: u64,
    pub readings_received: u64,
    pub pongs_received: u64,
    pub dropped_low_priority: u32,
    pub max_pending: usize,
    pub dump: String,
}

pub fn run(config: EventLoopConfig, options: &SimOptions) -> anyhow::Result<SimReport> {
    let max_pending = Arc::new(AtomicUsize::new(0));
    let collaborators = Collaborators::new()
        .with_power(QueueDepthMonitor::new(max_pending.clone()))
        .with_resource(SimTimers);
    let mut event_loop = EventLoop::with_collaborators(config, collaborators)
        .context("invalid event loop configuration")?;

    let readings = Arc::new(AtomicU64::new(0));
    let pongs = Arc::new(AtomicU64::new(0));
    event_loop.start_nanoapp(Nanoapp::new(SAMPLER_APP_ID, 0x0100_0000, SensorSampler::new()))?;
    let counter_id = event_loop.start_nanoapp(Nanoapp::new(
        COUNTER_APP_ID,
        0x0100_0000,
        ReadingCounter::new(readings.clone(), pongs.clone()),
    ))?;
    let echo_id = event_loop.start_nanoapp(Nanoapp::new(ECHO_APP_ID, 0x0100_0000, Echo))?;

    let handle = event_loop.handle();
    let looper = thread::Builder::new()
        .name("nanohub-loop".into())
        .spawn(move || event_loop.run())
        .context("failed to spawn event loop thread")?;
    tracing::info!(producers = options.producers, "event loop started");

    let posted = Arc::new(AtomicU64::new(0));
    let rejected = Arc::new(AtomicU64::new(0));
    let mut producers = Vec::with_capacity(options.producers);
    for p in 0..options.producers {
        let handle = handle.clone();
        let posted = posted.clone();
        let rejected = rejected.clone();
        let options = options.clone();
        let producer = thread::Builder::new()
            .name(format!("producer-{p}"))
            .spawn(move || {
                for seq in 0..options.events_per_producer {
                    let queued = if options.ping_every > 0 && seq % options.ping_every == 0 {
                        handle.post_low_priority_event_or_free(
                            Event::new(EVENT_PING).to_instance(echo_id).with_payload(counter_id),
                        )
                    } else {
                        handle.post_low_priority_event_or_free(
                            Event::new(EVENT_SAMPLE_TICK).with_payload(seq.wrapping_mul(31) % 1000),
                        )
                    };
                    let tally = if queued { &posted } else { &rejected };
                    tally.fetch_add(1, Ordering::Relaxed);
                }
            })
            .context("failed to spawn producer thread")?;
        producers.push(producer);
    }
    for producer in producers {
        if producer.join().is_err() {
            anyhow::bail!("producer thread panicked");
        }
    }

    // Replies are posted during dispatch; let them land before stopping.
    let deadline = Instant::now() + IDLE_TIMEOUT;
    while handle.in_flight_event_count() > 0 {
        if Instant::now() >= deadline {
            tracing::warn!(
                in_flight = handle.in_flight_event_count(),
                "event loop did not go idle, stopping anyway"
            );
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }

    // Snapshot loop state on the loop thread before tearing it down.
    let dump = Arc::new(Mutex::new(String::new()));
    let sink = dump.clone();
    handle.post_system_event(SystemCallbackType::Deferred, move |event_loop| {
        event_loop.log_state_to_buffer(&mut *sink.lock());
    });

    handle.stop();
    if looper.join().is_err() {
        anyhow::bail!("event loop thread panicked");
    }
    tracing::info!("event loop stopped");

    let dump = dump.lock().clone();
    Ok(SimReport {
        ticks_posted: posted.load(Ordering::Relaxed),
        ticks_rejected: rejected.load(Ordering::Relaxed),
        readings_received: readings.load(Ordering::Relaxed),
        pongs_received: pongs.load(Ordering::Relaxed),
        dropped_low_priority: handle.dropped_low_priority_count(),
        max_pending: max_pending.load(Ordering::Relaxed),
        dump,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_simulation_accounts_for_every_event() {
        let options = SimOptions {
            producers: 2,
            events_per_producer: 50,
            ping_every: 5,
        };
        let report = run(EventLoopConfig::default().with_pool(16, 64), &options).expect("sim");

        assert_eq!(report.ticks_posted + report.ticks_rejected, 100);
        assert_eq!(report.ticks_rejected, 0);
        assert_eq!(report.pongs_received, 20);
        assert!(report.dump.contains("Event Loop:"));
        assert!(report.dump.contains("Nanoapps:"));
    }
}
