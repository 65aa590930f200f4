// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Diagnostic text sinks.
//!
//! The event loop and nanoapps append human readable state through
//! [`DebugDump`]. A plain `String` works for tests and CLIs;
//! [`DebugDumpBuffer`] splits output into bounded chunks, the shape a host
//! transport wants when it ships the dump in fixed-size messages.

use std::fmt::{self, Write};

/// Append-only text sink.
pub trait DebugDump {
    fn print(&mut self, args: fmt::Arguments<'_>);
}

impl DebugDump for String {
    fn print(&mut self, args: fmt::Arguments<'_>) {
        // Writing into a String cannot fail.
        let _ = self.write_fmt(args);
    }
}

/// Dump sink that never lets a chunk grow past `chunk_size` bytes.
///
/// A single record longer than `chunk_size` gets a chunk of its own.
#[derive(Debug)]
pub struct DebugDumpBuffer {
    chunk_size: usize,
    chunks: Vec<String>,
    scratch: String,
}

impl DebugDumpBuffer {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunks: Vec::new(),
            scratch: String::new(),
        }
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<String> {
        self.chunks
    }
}

impl DebugDump for DebugDumpBuffer {
    fn print(&mut self, args: fmt::Arguments<'_>) {
        self.scratch.clear();
        let _ = self.scratch.write_fmt(args);
        if self.scratch.is_empty() {
            return;
        }

        match self.chunks.last_mut() {
            Some(last) if last.len() + self.scratch.len() <= self.chunk_size => {
                last.push_str(&self.scratch);
            }
            _ => self.chunks.push(self.scratch.clone()),
        }
    }
}
