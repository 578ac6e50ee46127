//! Tick state (§6.1 glossary "Tick state") — per-tick context threaded
//! through components and effects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-tick context passed to components and effects: tick number,
/// queued external messages, stop control, and error context.
///
/// Owned by the host application, shared (not copied) with the
/// compiler for the duration of one tick.
#[derive(Clone)]
pub struct TickState {
    /// Monotonically increasing tick counter.
    pub tick_number: u64,
    /// Messages delivered mid-execution, queued for `on_message` hooks.
    pub queued_messages: Arc<Vec<serde_json::Value>>,
    /// Set by the host to request cancellation (§5 "Cancellation and timeouts").
    cancelled: Arc<AtomicBool>,
    /// Free-form error context a previous failed tick left behind.
    pub error_context: Option<String>,
}

impl TickState {
    /// Construct a fresh tick state for `tick_number` with no queued
    /// messages and no error context.
    pub fn new(tick_number: u64) -> Self {
        Self {
            tick_number,
            queued_messages: Arc::new(Vec::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
            error_context: None,
        }
    }

    /// Attach queued messages.
    pub fn with_messages(mut self, messages: Vec<serde_json::Value>) -> Self {
        self.queued_messages = Arc::new(messages);
        self
    }

    /// Attach error context carried over from a prior failed tick.
    pub fn with_error_context(mut self, context: impl Into<String>) -> Self {
        self.error_context = Some(context.into());
        self
    }

    /// A handle the host can use to cancel this tick from another task.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}
