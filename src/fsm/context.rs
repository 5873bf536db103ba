//! Shared mutable context threaded through every connection handler.
//!
//! Handlers never touch the transport directly: they queue
//! [`ConnEffect`]s here and the owning service applies them after the
//! transition, in order.

/// Side effects requested by the connection machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnEffect {
    /// Ask the transport to establish a session.
    StartLink,
    /// Ask the transport to tear the session down.
    StopLink,
    /// Session established; first point at which a request may be submitted.
    NotifyConnected,
    /// Session gone.
    NotifyDisconnected,
}

/// Most effects a single input can queue.
pub const MAX_EFFECTS: usize = 4;

pub type Effects = heapless::Vec<ConnEffect, MAX_EFFECTS>;

pub struct ConnectionContext {
    effects: Effects,

    // -- Counters --
    pub connect_attempts: u32,
    pub sessions_established: u32,
    pub disconnects: u32,
    /// Transport notifications that did not apply to the current state.
    pub ignored_inputs: u32,
}

impl ConnectionContext {
    pub fn new() -> Self {
        Self {
            effects: Effects::new(),
            connect_attempts: 0,
            sessions_established: 0,
            disconnects: 0,
            ignored_inputs: 0,
        }
    }

    pub(crate) fn queue(&mut self, effect: ConnEffect) {
        if self.effects.push(effect).is_err() {
            log::error!("Conn: effect queue full, {:?} dropped", effect);
        }
    }

    /// Drain queued effects in the order they were raised.
    pub fn take_effects(&mut self) -> Effects {
        core::mem::take(&mut self.effects)
    }
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self::new()
    }
}
