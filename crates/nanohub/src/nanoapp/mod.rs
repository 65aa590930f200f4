// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nanoapps: the units of application logic hosted by the event loop.

mod app;
mod context;
mod info;
mod registration;
mod wakeup;

pub use app::{Nanoapp, NanoappHandler};
pub use context::AppContext;
pub use info::{NanoappInfo, API_VERSION_1_0, API_VERSION_1_1, CURRENT_API_VERSION};
pub use registration::BroadcastRegistrations;
pub use wakeup::WakeupBuckets;
