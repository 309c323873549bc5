//! Informational progress channel handed to every tool call.
//!
//! Messages sent through a sink are for humans only; no tool reads them
//! back or branches on them.

use std::sync::Mutex;
use tracing::info;

/// Sink accepting informational text from a running tool
pub trait ProgressSink: Send + Sync {
    /// Report an informational message
    fn info(&self, message: &str);
}

/// Sink that forwards messages to the `tracing` log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn info(&self, message: &str) {
        info!(target: "ncbi_fetcher::progress", "{}", message);
    }
}

/// Sink that drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn info(&self, _message: &str) {}
}

/// Sink that keeps messages until they are drained
#[derive(Debug, Default)]
pub struct BufferedSink {
    messages: Mutex<Vec<String>>,
}

impl BufferedSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all buffered messages, oldest first
    pub fn drain(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(mut messages) => std::mem::take(&mut *messages),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl ProgressSink for BufferedSink {
    fn info(&self, message: &str) {
        match self.messages.lock() {
            Ok(mut messages) => messages.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }
}
