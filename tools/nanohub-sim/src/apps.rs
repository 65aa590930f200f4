// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Demo nanoapps and platform stand-ins for the simulator.

use nanohub::{
    AppContext, Event, NanoappHandler, NanoappInfo, PowerControl, ResourceKind, ResourceReleaser,
    DEFAULT_TARGET_GROUP_MASK, FIRST_USER_EVENT_TYPE,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Raw sample posted by producer threads; payload `u32`.
pub const EVENT_SAMPLE_TICK: u16 = FIRST_USER_EVENT_TYPE + 1;
/// Filtered reading broadcast by the sampler; payload `f32`.
pub const EVENT_READING: u16 = FIRST_USER_EVENT_TYPE + 2;
/// Unicast request to the echo app; payload is the reply-to instance id.
pub const EVENT_PING: u16 = FIRST_USER_EVENT_TYPE + 3;
/// Echo reply.
pub const EVENT_PONG: u16 = FIRST_USER_EVENT_TYPE + 4;

pub const SAMPLER_APP_ID: u64 = 0x4e48_0000_0000_0001;
pub const COUNTER_APP_ID: u64 = 0x4e48_0000_0000_0002;
pub const ECHO_APP_ID: u64 = 0x4e48_0000_0000_0003;

/// Turns raw ticks into smoothed readings.
pub struct SensorSampler {
    average: f32,
    samples: u32,
}

impl SensorSampler {
    pub fn new() -> Self {
        Self {
            average: 0.0,
            samples: 0,
        }
    }
}

impl NanoappHandler for SensorSampler {
    fn start(&mut self, ctx: &mut AppContext<'_>) -> bool {
        ctx.register_broadcast(EVENT_SAMPLE_TICK, DEFAULT_TARGET_GROUP_MASK)
    }

    fn handle_event(&mut self, ctx: &mut AppContext<'_>, event: &Event) {
        let Some(&raw) = event.payload_as::<u32>() else {
            return;
        };
        self.samples += 1;
        self.average += (raw as f32 - self.average) / self.samples.min(16) as f32;

        // Every 32nd reading would wake the host in a real deployment.
        if self.samples % 32 == 0 {
            ctx.blame_host_wakeup();
        }
        ctx.send_event(Event::new(EVENT_READING).with_payload(self.average));
    }
}

/// Counts readings and pongs.
pub struct ReadingCounter {
    readings: Arc<AtomicU64>,
    pongs: Arc<AtomicU64>,
}

impl ReadingCounter {
    pub fn new(readings: Arc<AtomicU64>, pongs: Arc<AtomicU64>) -> Self {
        Self { readings, pongs }
    }
}

impl NanoappHandler for ReadingCounter {
    fn start(&mut self, ctx: &mut AppContext<'_>) -> bool {
        ctx.register_broadcast(EVENT_READING, DEFAULT_TARGET_GROUP_MASK)
    }

    fn handle_event(&mut self, _ctx: &mut AppContext<'_>, event: &Event) {
        match event.event_type() {
            EVENT_READING => self.readings.fetch_add(1, Ordering::Relaxed),
            EVENT_PONG => self.pongs.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
    }

    fn end(&mut self, ctx: &mut AppContext<'_>) {
        tracing::debug!(
            instance = ctx.instance_id(),
            readings = self.readings.load(Ordering::Relaxed),
            "counter stopping"
        );
    }
}

/// Answers pings with a unicast pong.
pub struct Echo;

impl NanoappHandler for Echo {
    fn handle_event(&mut self, ctx: &mut AppContext<'_>, event: &Event) {
        if event.event_type() != EVENT_PING {
            return;
        }
        if let Some(&reply_to) = event.payload_as::<u16>() {
            ctx.send_event(Event::new(EVENT_PONG).to_instance(reply_to));
        }
    }
}

/// Tracks the deepest queue seen at dispatch time.
pub struct QueueDepthMonitor {
    max_pending: Arc<AtomicUsize>,
}

impl QueueDepthMonitor {
    pub fn new(max_pending: Arc<AtomicUsize>) -> Self {
        Self { max_pending }
    }
}

impl PowerControl for QueueDepthMonitor {
    fn pre_event_loop_process(&mut self, pending: usize) {
        self.max_pending.fetch_max(pending, Ordering::Relaxed);
    }

    fn post_event_loop_process(&mut self, _pending: usize) {}
}

/// Timer service stand-in: the sampler "forgets" one periodic timer.
pub struct SimTimers;

impl ResourceReleaser for SimTimers {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Timer
    }

    fn release_all(&mut self, app: &NanoappInfo) -> u32 {
        u32::from(app.app_id == SAMPLER_APP_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types_are_user_range() {
        for ty in [EVENT_SAMPLE_TICK, EVENT_READING, EVENT_PING, EVENT_PONG] {
            assert!(ty >= FIRST_USER_EVENT_TYPE);
        }
    }

    #[test]
    fn test_sim_timers_only_blame_sampler() {
        let mut timers = SimTimers;
        let mut info = NanoappInfo {
            app_id: SAMPLER_APP_ID,
            version: 1,
            instance_id: 1,
            target_api_version: nanohub::CURRENT_API_VERSION,
            is_system: false,
        };
        assert_eq!(timers.release_all(&info), 1);
        info.app_id = ECHO_APP_ID;
        assert_eq!(timers.release_all(&info), 0);
    }
}
