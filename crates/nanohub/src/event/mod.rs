// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Events and their storage.
//!
//! - [`Event`]: typed envelope with an owned payload and completion callback
//! - [`EventPool`]: fixed-capacity slot arena handing out [`EventHandle`]s
//! - [`EventQueue`]: FIFO of handles with tail eviction

mod pool;
mod queue;
mod types;

pub use pool::{EventHandle, EventPool};
pub use queue::EventQueue;
pub(crate) use types::Completion;
pub use types::{
    Event, EventPayload, FreeCallback, SystemCallback, SystemCallbackType, BROADCAST_INSTANCE_ID,
    DEFAULT_TARGET_GROUP_MASK, EVENT_NANOAPP_STARTED, EVENT_NANOAPP_STOPPED, FIRST_USER_EVENT_TYPE,
    SYSTEM_INSTANCE_ID,
};
