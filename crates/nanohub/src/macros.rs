// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

/// Log an unrecoverable runtime error and abort the current thread.
///
/// Release builds use `panic = "abort"`, so this terminates the process.
macro_rules! fatal_error {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        log::error!("FATAL: {}", msg);
        panic!("{}", msg)
    }};
}
