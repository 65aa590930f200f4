// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nanoapp load and unload.
//!
//! Unload teardown order:
//! 1. flush the app's host messages
//! 2. mark it stopping, so its sends are refused
//! 3. if it started: dispatch everything queued, announce the stop
//! 4. `end()` (started apps only)
//! 5. release every resource domain it still holds
//! 6. erase it from the registry

use super::EventLoop;
use crate::error::{NanoappError, Result};
use crate::event::{Event, BROADCAST_INSTANCE_ID, EVENT_NANOAPP_STARTED, EVENT_NANOAPP_STOPPED, SYSTEM_INSTANCE_ID};
use crate::nanoapp::{Nanoapp, NanoappInfo};

impl EventLoop {
    /// Add `nanoapp` to the registry and start it.
    ///
    /// On success every nanoapp registered for [`EVENT_NANOAPP_STARTED`] is
    /// told, and the new instance id is returned. A start failure unloads
    /// the app again without calling `end()`.
    pub fn start_nanoapp(&mut self, mut nanoapp: Nanoapp) -> Result<u16> {
        let first_supported = self.config().first_supported_api_version;
        if nanoapp.target_api_version() < first_supported {
            let err = NanoappError::IncompatibleApiVersion {
                app_id: nanoapp.app_id(),
                target_api_version: nanoapp.target_api_version(),
                first_supported,
            };
            log::error!("[EventLoop::start] {}", err);
            return Err(err);
        }

        if let Some(instance_id) = self.find_instance_id_by_app_id(nanoapp.app_id()) {
            let err = NanoappError::DuplicateAppId {
                app_id: nanoapp.app_id(),
                instance_id,
            };
            log::error!("[EventLoop::start] {}", err);
            return Err(err);
        }

        let Some(instance_id) = self.allocate_instance_id() else {
            let err = NanoappError::InstanceIdsExhausted {
                app_id: nanoapp.app_id(),
            };
            log::error!("[EventLoop::start] {}", err);
            return Err(err);
        };

        nanoapp.prepare_for_load(instance_id, self.config().wakeup_bucket_count);
        let info = nanoapp.info().clone();
        {
            let mut directory = self.events.shared.directory.lock();
            directory.push(info.clone());
            self.nanoapps.push(nanoapp);
        }

        let index = self.nanoapps.len() - 1;
        let stopping = self.is_instance_stopping(instance_id);
        self.set_current_app(Some(instance_id));
        let started = self.nanoapps[index].start(&self.events, stopping);
        self.set_current_app(None);

        if !started {
            log::error!("[EventLoop::start] nanoapp {} failed to start", info);
            if let Err(e) = self.unload_nanoapp_internal(instance_id, true, false) {
                log::error!("[EventLoop::start] cleanup after failed start: {}", e);
            }
            return Err(NanoappError::StartFailed {
                app_id: info.app_id,
                instance_id,
            });
        }

        log::info!("[EventLoop::start] started nanoapp {}", info);
        self.notify_app_status_change(EVENT_NANOAPP_STARTED, &info);
        Ok(instance_id)
    }

    /// Stop and remove a started nanoapp. Must run on the loop thread.
    ///
    /// System nanoapps are only removed when `allow_system_unload` is set.
    pub fn unload_nanoapp(&mut self, instance_id: u16, allow_system_unload: bool) -> Result<()> {
        self.unload_nanoapp_internal(instance_id, allow_system_unload, true)
    }

    fn unload_nanoapp_internal(
        &mut self,
        instance_id: u16,
        allow_system_unload: bool,
        started: bool,
    ) -> Result<()> {
        let Some(index) = self.index_of(instance_id) else {
            log::warn!("[EventLoop::unload] no nanoapp with instance ID {}", instance_id);
            return Err(NanoappError::NotFound { instance_id });
        };
        if !allow_system_unload && self.nanoapps[index].is_system() {
            log::error!("[EventLoop::unload] refusing to unload system nanoapp {}", instance_id);
            return Err(NanoappError::SystemNanoapp { instance_id });
        }

        let info = self.nanoapps[index].info().clone();
        self.collaborators
            .host_comms
            .flush_nanoapp_messages(&info, &self.events);

        let previous_stopping = self.set_stopping_app(Some(instance_id));

        if started {
            self.flush_inbound_event_queue();
        }

        // A flushed deferred request may already have removed it.
        let Some(index) = self.index_of(instance_id) else {
            log::debug!("[EventLoop::unload] instance {} went away during flush", instance_id);
            self.set_stopping_app(previous_stopping);
            return Ok(());
        };

        if started {
            self.notify_app_status_change(EVENT_NANOAPP_STOPPED, &info);
        }

        self.unload_nanoapp_at_index(index, started);
        self.set_stopping_app(previous_stopping);

        log::debug!("[EventLoop::unload] unloaded nanoapp {}", info);
        Ok(())
    }

    /// Final stage of unload: `end()`, resource release and registry erase,
    /// all under the app's context.
    pub(super) fn unload_nanoapp_at_index(&mut self, index: usize, started: bool) {
        let info = self.nanoapps[index].info().clone();
        self.set_current_app(Some(info.instance_id));

        if started {
            self.nanoapps[index].end(&self.events);
        }

        self.collaborators.release_resources(&info);

        let removed = {
            let mut directory = self.events.shared.directory.lock();
            directory.retain(|entry| entry.instance_id != info.instance_id);
            self.nanoapps.remove(index)
        };
        self.set_current_app(None);
        // Handler teardown runs outside the registry lock.
        drop(removed);
    }

    /// Run `free_fn` attributed to the nanoapp `app_id`, restoring the
    /// previous context afterwards. Returns false, without running it, if
    /// the app is not loaded.
    pub fn invoke_message_free_function<F: FnOnce()>(&mut self, app_id: u64, free_fn: F) -> bool {
        let Some(instance_id) = self.find_instance_id_by_app_id(app_id) else {
            log::error!(
                "[EventLoop] couldn't find app 0x{:016x} for message free callback",
                app_id
            );
            return false;
        };

        let previous = self.set_current_app(Some(instance_id));
        free_fn();
        self.set_current_app(previous);
        true
    }

    /// True when code running on behalf of the current nanoapp must not
    /// start new work: the app is being unloaded, or the loop is stopping.
    pub fn current_nanoapp_is_stopping(&self) -> bool {
        match self.current_app {
            Some(instance_id) => self.is_instance_stopping(instance_id),
            None => !self.is_running(),
        }
    }

    pub(super) fn is_instance_stopping(&self, instance_id: u16) -> bool {
        self.stopping_app == Some(instance_id) || !self.is_running()
    }

    /// Next free instance id, skipping reserved ids and ids in use.
    fn allocate_instance_id(&mut self) -> Option<u16> {
        for _ in 0..=u16::MAX {
            let candidate = self.next_instance_id;
            self.next_instance_id = self.next_instance_id.wrapping_add(1);
            if candidate == SYSTEM_INSTANCE_ID || candidate == BROADCAST_INSTANCE_ID {
                continue;
            }
            if self.index_of(candidate).is_none() {
                return Some(candidate);
            }
        }
        None
    }

    fn notify_app_status_change(&self, event_type: u16, info: &NanoappInfo) {
        self.events
            .post_event_or_die(Event::new(event_type).with_payload(info.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventLoopConfig;
    use crate::nanoapp::{AppContext, NanoappHandler};

    struct Idle;

    impl NanoappHandler for Idle {
        fn handle_event(&mut self, _ctx: &mut AppContext<'_>, _event: &Event) {}
    }

    #[test]
    fn test_instance_ids_skip_reserved_and_used() {
        let mut el = EventLoop::new(EventLoopConfig::default()).expect("config");
        el.next_instance_id = u16::MAX - 1;

        assert_eq!(el.start_nanoapp(Nanoapp::new(1, 1, Idle)), Ok(u16::MAX - 1));
        // 0xFFFF is broadcast and 0 is system.
        assert_eq!(el.start_nanoapp(Nanoapp::new(2, 1, Idle)), Ok(1));

        el.next_instance_id = u16::MAX - 1;
        assert_eq!(el.start_nanoapp(Nanoapp::new(3, 1, Idle)), Ok(2));
    }

    #[test]
    fn test_current_app_cleared_after_start() {
        let mut el = EventLoop::new(EventLoopConfig::default()).expect("config");
        el.start_nanoapp(Nanoapp::new(7, 1, Idle)).expect("start");
        assert!(el.current_app().is_none());
        assert!(!el.current_nanoapp_is_stopping());
    }

    #[test]
    fn test_message_free_function_restores_context() {
        let mut el = EventLoop::new(EventLoopConfig::default()).expect("config");
        let id = el.start_nanoapp(Nanoapp::new(7, 1, Idle)).expect("start");

        let mut ran = false;
        assert!(el.invoke_message_free_function(7, || ran = true));
        assert!(ran);
        assert!(el.current_app().is_none());

        assert!(!el.invoke_message_free_function(8, || panic!("must not run")));
        assert_eq!(el.find_instance_id_by_app_id(7), Some(id));
    }
}
