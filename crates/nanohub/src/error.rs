// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nanoapp lifecycle errors.

use thiserror::Error;

/// Reasons a load or unload request was refused.
///
/// Every rejection leaves the registry untouched, except
/// [`NanoappError::StartFailed`] where the app was already torn down again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NanoappError {
    #[error(
        "Incompatible nanoapp 0x{app_id:016x} (target API 0x{target_api_version:08x}, \
         first supported 0x{first_supported:08x})"
    )]
    IncompatibleApiVersion {
        app_id: u64,
        target_api_version: u32,
        first_supported: u32,
    },

    #[error("App with ID 0x{app_id:016x} already exists as instance ID {instance_id}")]
    DuplicateAppId { app_id: u64, instance_id: u16 },

    #[error("No free instance ID for app 0x{app_id:016x}")]
    InstanceIdsExhausted { app_id: u64 },

    #[error("Nanoapp 0x{app_id:016x} (instance {instance_id}) failed to start")]
    StartFailed { app_id: u64, instance_id: u16 },

    #[error("No nanoapp with instance ID {instance_id}")]
    NotFound { instance_id: u16 },

    #[error("Refusing to unload system nanoapp (instance {instance_id})")]
    SystemNanoapp { instance_id: u16 },
}

pub type Result<T> = std::result::Result<T, NanoappError>;
