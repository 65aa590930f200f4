// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The event loop.
//!
//! # Architecture
//!
//! ```text
//! producer threads ──┐
//! collaborators  ────┼─> EventLoopHandle ──> EventPool + EventQueue
//! nanoapps (ctx) ────┘                              │
//!                                                   v
//!                                 EventLoop::run (single loop thread)
//!                                   ├─ distribute_event ─> Nanoapp handlers
//!                                   └─ free_event ───────> free / system callbacks
//! ```
//!
//! [`EventLoop`] is owned by the loop thread and holds the nanoapp registry;
//! its lookup methods take no lock. [`EventLoopHandle`] is the cloneable,
//! thread-safe side: posting APIs plus locked lookups over a mirrored
//! directory of [`NanoappInfo`](crate::NanoappInfo).

mod event_loop;
mod handle;
mod lifecycle;

pub use event_loop::EventLoop;
pub use handle::EventLoopHandle;
