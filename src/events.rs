//! Interrupt-safe trigger signalling.
//!
//! Triggers are produced by:
//! - GPIO ISRs (button key edge)
//! - Timer expiry (announce indicator)
//! - Software (shell-equivalent entry points, boot sequence)
//!
//! and consumed by the [`EventLoop`](crate::event_loop::EventLoop), which
//! dispatches each pending trigger to its registered handler.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ GPIO ISR    │────▶│                  │     │              │
//! │ Timer       │────▶│  Pending bitmask │────▶│  Event Loop  │
//! │ Software    │────▶│  (AtomicU32)     │     │  (consumer)  │
//! └─────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! Signalling is a single `fetch_or`: no allocation, no lock, no
//! blocking. A second signal before the loop takes the first is
//! coalesced into the same bit, so each trigger is pending at most once.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::Thread;

/// Maximum number of registered triggers (one bit each).
pub const MAX_TRIGGERS: usize = 32;

/// Shared pending-trigger state between signalling contexts and the loop.
pub struct PendingTriggers {
    bits: AtomicU32,
    /// Loop thread, recorded on the first `run()`; used to cut the idle wait short.
    waiter: OnceLock<Thread>,
}

impl PendingTriggers {
    pub fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
            waiter: OnceLock::new(),
        }
    }

    /// Mark `index` pending. Safe from interrupt context.
    #[inline]
    pub fn mark(&self, index: u8) {
        self.bits.fetch_or(1 << index, Ordering::Release);
    }

    /// Take every pending bit at once, clearing them.
    /// Called from the loop thread only.
    pub fn take(&self) -> u32 {
        self.bits.swap(0, Ordering::Acquire)
    }

    /// Whether any trigger is pending.
    pub fn any(&self) -> bool {
        self.bits.load(Ordering::Acquire) != 0
    }

    /// Record the thread that consumes the pending set.
    pub fn bind_waiter(&self, thread: Thread) {
        let _ = self.waiter.set(thread);
    }

    fn wake(&self) {
        if let Some(t) = self.waiter.get() {
            t.unpark();
        }
    }
}

impl Default for PendingTriggers {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by
/// [`EventLoop::register_trigger`](crate::event_loop::EventLoop::register_trigger).
///
/// Cheap to clone; clones refer to the same pending slot.
#[derive(Clone)]
pub struct TriggerHandle {
    index: u8,
    name: &'static str,
    pending: Arc<PendingTriggers>,
}

impl TriggerHandle {
    pub(crate) fn new(index: u8, name: &'static str, pending: Arc<PendingTriggers>) -> Self {
        Self {
            index,
            name,
            pending,
        }
    }

    /// Mark the trigger pending and wake the loop thread.
    /// For task context (timer tasks, shell, other threads).
    pub fn signal(&self) {
        self.pending.mark(self.index);
        self.pending.wake();
    }

    /// Mark the trigger pending without touching the scheduler.
    /// The only call allowed from interrupt context; the loop picks the
    /// bit up on its next wake.
    #[inline]
    pub fn signal_from_isr(&self) {
        self.pending.mark(self.index);
    }

    /// Slot index in the trigger table.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Name given at registration, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl core::fmt::Debug for TriggerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TriggerHandle")
            .field("index", &self.index)
            .field("name", &self.name)
            .finish()
    }
}
