// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event envelope.
//!
//! An [`Event`] owns its payload from the moment it is posted. The payload is
//! handed back exactly once, to the free callback, after every delivery
//! attempt is over. Events without a free callback simply drop the payload.

use std::any::Any;
use std::fmt;

use crate::runtime::EventLoop;

/// Sender id of framework-originated events. Never matches a nanoapp.
pub const SYSTEM_INSTANCE_ID: u16 = 0;

/// Target id meaning "every nanoapp registered for this event type".
pub const BROADCAST_INSTANCE_ID: u16 = u16::MAX;

/// Group mask accepted by every registration.
pub const DEFAULT_TARGET_GROUP_MASK: u32 = u32::MAX;

/// Broadcast after a nanoapp started; payload is its [`NanoappInfo`](crate::NanoappInfo).
pub const EVENT_NANOAPP_STARTED: u16 = 0x0003;

/// Broadcast after a nanoapp was stopped; payload is its [`NanoappInfo`](crate::NanoappInfo).
pub const EVENT_NANOAPP_STOPPED: u16 = 0x0004;

/// First event type value free for nanoapp-defined events.
pub const FIRST_USER_EVENT_TYPE: u16 = 0x8000;

/// Type-erased event payload.
pub type EventPayload = Box<dyn Any + Send>;

/// Completion hook invoked once with the event type and payload.
pub type FreeCallback = Box<dyn FnOnce(u16, Option<EventPayload>) + Send>;

/// Deferred work executed on the loop thread.
pub type SystemCallback = Box<dyn FnOnce(&mut EventLoop) + Send>;

/// Event types used for framework deferred callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SystemCallbackType {
    Shutdown = 0x0100,
    NanoappLoad = 0x0101,
    NanoappUnload = 0x0102,
    MessageFree = 0x0103,
    Deferred = 0x0104,
}

impl SystemCallbackType {
    pub fn event_type(self) -> u16 {
        self as u16
    }
}

pub(crate) enum Completion {
    None,
    Free(FreeCallback),
    System(SystemCallback),
}

/// A single event travelling through the loop.
pub struct Event {
    event_type: u16,
    payload: Option<EventPayload>,
    completion: Completion,
    low_priority: bool,
    sender_instance_id: u16,
    target_instance_id: u16,
    target_group_mask: u32,
    enqueue_time_ms: u16,
}

impl Event {
    /// Broadcast event from the system with no payload.
    pub fn new(event_type: u16) -> Self {
        Self {
            event_type,
            payload: None,
            completion: Completion::None,
            low_priority: false,
            sender_instance_id: SYSTEM_INSTANCE_ID,
            target_instance_id: BROADCAST_INSTANCE_ID,
            target_group_mask: DEFAULT_TARGET_GROUP_MASK,
            enqueue_time_ms: 0,
        }
    }

    pub fn with_payload<T: Any + Send>(self, payload: T) -> Self {
        self.with_boxed_payload(Box::new(payload))
    }

    pub fn with_boxed_payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach the hook that receives the payload back once the event is done.
    pub fn with_free_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(u16, Option<EventPayload>) + Send + 'static,
    {
        self.completion = Completion::Free(Box::new(callback));
        self
    }

    pub fn from_sender(mut self, instance_id: u16) -> Self {
        self.sender_instance_id = instance_id;
        self
    }

    pub fn to_instance(mut self, instance_id: u16) -> Self {
        self.target_instance_id = instance_id;
        self
    }

    pub fn with_group_mask(mut self, mask: u32) -> Self {
        self.target_group_mask = mask;
        self
    }

    pub(crate) fn system_callback(kind: SystemCallbackType, callback: SystemCallback) -> Self {
        let mut event = Self::new(kind.event_type()).to_instance(SYSTEM_INSTANCE_ID);
        event.completion = Completion::System(callback);
        event
    }

    pub(crate) fn into_low_priority(mut self) -> Self {
        self.low_priority = true;
        self
    }

    pub(crate) fn into_high_priority(mut self) -> Self {
        self.low_priority = false;
        self
    }

    pub(crate) fn stamp(&mut self, now_ms: u16) {
        self.enqueue_time_ms = now_ms;
    }

    pub fn event_type(&self) -> u16 {
        self.event_type
    }

    pub fn payload(&self) -> Option<&(dyn Any + Send)> {
        self.payload.as_deref()
    }

    /// Borrow the payload as `T`, if it is one.
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }

    pub fn is_low_priority(&self) -> bool {
        self.low_priority
    }

    pub fn sender_instance_id(&self) -> u16 {
        self.sender_instance_id
    }

    pub fn target_instance_id(&self) -> u16 {
        self.target_instance_id
    }

    pub fn target_group_mask(&self) -> u32 {
        self.target_group_mask
    }

    pub fn enqueue_time_ms(&self) -> u16 {
        self.enqueue_time_ms
    }

    pub fn is_broadcast(&self) -> bool {
        self.target_instance_id == BROADCAST_INSTANCE_ID
    }

    pub fn has_free_callback(&self) -> bool {
        matches!(self.completion, Completion::Free(_))
    }

    pub(crate) fn into_parts(self) -> (u16, Option<EventPayload>, Completion) {
        (self.event_type, self.payload, self.completion)
    }

    /// Finish an event that will never reach the loop thread.
    ///
    /// Runs the free callback on the calling thread. A pending system
    /// callback cannot run without the loop and is discarded.
    pub(crate) fn release_detached(self) {
        let (event_type, payload, completion) = self.into_parts();
        match completion {
            Completion::None => {}
            Completion::Free(callback) => callback(event_type, payload),
            Completion::System(_) => {
                log::warn!(
                    "[Event] discarding system callback 0x{:04x} outside the event loop",
                    event_type
                );
            }
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &format_args!("0x{:04x}", self.event_type))
            .field("has_payload", &self.payload.is_some())
            .field("low_priority", &self.low_priority)
            .field("sender", &self.sender_instance_id)
            .field("target", &self.target_instance_id)
            .field("group_mask", &format_args!("0x{:08x}", self.target_group_mask))
            .field("enqueue_time_ms", &self.enqueue_time_ms)
            .finish_non_exhaustive()
    }
}
