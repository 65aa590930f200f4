// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # nanohub - embedded nanoapp runtime
//!
//! Hosts small event-driven modules ("nanoapps") on a single dispatch
//! thread. Producers on any thread post events into a bounded pool; the
//! event loop delivers them in FIFO order and manages nanoapp load and
//! unload.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanohub::{
//!     AppContext, Event, EventLoop, EventLoopConfig, Nanoapp, NanoappHandler,
//!     DEFAULT_TARGET_GROUP_MASK,
//! };
//!
//! struct Printer;
//!
//! impl NanoappHandler for Printer {
//!     fn start(&mut self, ctx: &mut AppContext<'_>) -> bool {
//!         ctx.register_broadcast(0x8001, DEFAULT_TARGET_GROUP_MASK)
//!     }
//!
//!     fn handle_event(&mut self, _ctx: &mut AppContext<'_>, event: &Event) {
//!         println!("got {:?}", event.payload_as::<u32>());
//!     }
//! }
//!
//! let mut event_loop = EventLoop::new(EventLoopConfig::default()).expect("valid config");
//! event_loop
//!     .start_nanoapp(Nanoapp::new(0x1234, 1, Printer))
//!     .expect("nanoapp started");
//!
//! let handle = event_loop.handle();
//! let worker = std::thread::spawn(move || event_loop.run());
//!
//! handle.post_event_or_die(Event::new(0x8001).with_payload(42u32));
//! handle.stop();
//! worker.join().expect("event loop thread");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |  producers / collaborators / nanoapps  ->  EventLoopHandle    |
//! +---------------------------------------------------------------+
//! |  EventPool (block arena + freelist)  |  EventQueue (FIFO)     |
//! +---------------------------------------------------------------+
//! |  EventLoop: dispatch, admission, nanoapp lifecycle            |
//! +---------------------------------------------------------------+
//! |  Collaborators: power, host comms, resource managers          |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`runtime`] - event loop and its thread-safe handle
//! - [`event`] - events, pool and queue
//! - [`nanoapp`] - nanoapp records, handler trait, app context
//! - [`collaborators`] - platform service traits
//! - [`config`] - TOML configuration
//! - [`util`] - clock, throttling, statistics, debug dump sinks

#[macro_use]
mod macros;

pub mod collaborators;
pub mod config;
pub mod runtime;
pub mod error;
pub mod event;
pub mod nanoapp;
pub mod util;

pub use collaborators::{
    Collaborators, HostComms, NullHostComms, NullPowerControl, PowerControl, ResourceKind,
    ResourceReleaser,
};
pub use config::{ConfigError, EventLoopConfig};
pub use runtime::{EventLoop, EventLoopHandle};
pub use error::NanoappError;
pub use event::{
    Event, EventHandle, EventPayload, FreeCallback, SystemCallbackType, BROADCAST_INSTANCE_ID,
    DEFAULT_TARGET_GROUP_MASK, EVENT_NANOAPP_STARTED, EVENT_NANOAPP_STOPPED,
    FIRST_USER_EVENT_TYPE, SYSTEM_INSTANCE_ID,
};
pub use nanoapp::{
    AppContext, Nanoapp, NanoappHandler, NanoappInfo, API_VERSION_1_0, API_VERSION_1_1,
    CURRENT_API_VERSION,
};
pub use util::{DebugDump, DebugDumpBuffer};
