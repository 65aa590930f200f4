// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::fmt;

/// API version encoding: major in bits 24..32, minor in bits 16..24.
pub const API_VERSION_1_0: u32 = 0x0100_0000;
pub const API_VERSION_1_1: u32 = 0x0101_0000;
pub const CURRENT_API_VERSION: u32 = 0x0109_0000;

/// Identity of a loaded nanoapp, safe to copy out of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NanoappInfo {
    pub app_id: u64,
    pub version: u32,
    /// Assigned at load; 0 until then.
    pub instance_id: u16,
    pub target_api_version: u32,
    pub is_system: bool,
}

impl fmt::Display for NanoappInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id {} app 0x{:016x} v{}.{}.{} api 0x{:08x}{}",
            self.instance_id,
            self.app_id,
            self.version >> 24,
            (self.version >> 16) & 0xFF,
            self.version & 0xFFFF,
            self.target_api_version,
            if self.is_system { " (system)" } else { "" }
        )
    }
}
