//! Function-pointer finite state machine for the connection lifecycle.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌─────────────┬───────────┬──────────┬────────────────────────┐ │
//! │  │ StateId     │ on_enter  │ on_exit  │ on_input               │ │
//! │  ├─────────────┼───────────┼──────────┼────────────────────────┤ │
//! │  │ Idle        │ fn(ctx)   │ -        │ fn(ctx, in) -> Result  │ │
//! │  │ Connecting  │ fn(ctx)   │ -        │ fn(ctx, in) -> Result  │ │
//! │  │ Connected   │ fn(ctx)   │ fn(ctx)  │ fn(ctx, in) -> Result  │ │
//! │  │ Terminating │ fn(ctx)   │ -        │ fn(ctx, in) -> Result  │ │
//! │  └─────────────┴───────────┴──────────┴────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The machine is event-driven rather than ticked: every call to
//! [`Fsm::handle`] feeds one [`ConnInput`] to the current state's
//! `on_input`. `Ok(Some(next))` runs `on_exit` → pointer update →
//! `on_enter`; `Ok(None)` stays; `Err(_)` is a guard violation and must
//! leave the context untouched. Side effects are queued as
//! [`ConnEffect`]s in the context for the owner to apply.

pub mod context;
pub mod states;

use context::ConnectionContext;
use log::{info, warn};

use crate::error::ConnectionError;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Connection states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    Terminating = 3,
}

impl StateId {
    pub const COUNT: usize = 4;

    /// Convert a table index back to `StateId`. Out-of-range falls back to
    /// `Idle` in release builds.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Terminating,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything that can drive the connection machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnInput {
    /// Caller asks for a session.
    Initiate,
    /// Caller asks to tear the session down.
    Terminate,
    /// Transport: session established.
    LinkUp,
    /// Transport: session gone (also confirms a teardown).
    LinkDown,
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit`.
pub type StateActionFn = fn(&mut ConnectionContext);

/// Signature for the input handler.
pub type StateInputFn = fn(&mut ConnectionContext, ConnInput) -> Result<Option<StateId>, ConnectionError>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_input: StateInputFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    /// Transitions taken since construction.
    transitions: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter`. Call once after construction.
    pub fn start(&mut self, ctx: &mut ConnectionContext) {
        info!("Conn: starting in {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Feed one input. Returns the state after handling it.
    pub fn handle(&mut self, input: ConnInput, ctx: &mut ConnectionContext) -> Result<StateId, ConnectionError> {
        match (self.table[self.current].on_input)(ctx, input) {
            Ok(Some(next)) => {
                self.transition(next, ctx);
                Ok(next)
            }
            Ok(None) => Ok(self.current_state()),
            Err(e) => {
                warn!(
                    "Conn: {:?} rejected in {}: {}",
                    input, self.table[self.current].name, e
                );
                Err(e)
            }
        }
    }

    /// Jump to `next` regardless of inputs (used to roll back when the
    /// transport refuses a call synchronously).
    pub fn force_transition(&mut self, next: StateId, ctx: &mut ConnectionContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut ConnectionContext) {
        let next_idx = next_id as usize;

        info!(
            "Conn: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions += 1;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
