// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Small runtime helpers shared by the event loop.
//!
//! - [`time`]: monotonic clock and wrapping 16-bit event timestamps
//! - [`throttle`]: rate limiter for repetitive warnings
//! - [`stats`]: max-only statistics container
//! - [`debug_dump`]: text sink for diagnostic state dumps

pub mod debug_dump;
pub mod stats;
pub mod throttle;
pub mod time;

pub use debug_dump::{DebugDump, DebugDumpBuffer};
pub use stats::MaxStat;
pub use throttle::Throttle;
