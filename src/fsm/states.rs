//! Concrete state handler functions and table builder.
//!
//! ```text
//!  IDLE ──[initiate]──▶ CONNECTING ──[link up]──▶ CONNECTED
//!    ▲                      │                          │
//!    │                 [terminate]                [terminate]
//!    │                      ▼                          │
//!    └────[link down]── TERMINATING ◀──────────────────┘
//!
//!  CONNECTING / CONNECTED ──[link down]──▶ IDLE
//! ```
//!
//! Guard violations return `Err` before queuing anything.

use super::context::{ConnEffect, ConnectionContext};
use super::{ConnInput, StateDescriptor, StateId};
use crate::error::ConnectionError;
use log::{debug, info};

type Outcome = Result<Option<StateId>, ConnectionError>;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_input: idle_input,
        },
        StateDescriptor {
            id: StateId::Connecting,
            name: "Connecting",
            on_enter: Some(connecting_enter),
            on_exit: None,
            on_input: connecting_input,
        },
        StateDescriptor {
            id: StateId::Connected,
            name: "Connected",
            on_enter: Some(connected_enter),
            on_exit: Some(connected_exit),
            on_input: connected_input,
        },
        StateDescriptor {
            id: StateId::Terminating,
            name: "Terminating",
            on_enter: Some(terminating_enter),
            on_exit: None,
            on_input: terminating_input,
        },
    ]
}

fn ignore(ctx: &mut ConnectionContext, input: ConnInput, state: &str) -> Outcome {
    ctx.ignored_inputs += 1;
    debug!("Conn: {:?} ignored in {}", input, state);
    Ok(None)
}

fn link_lost(ctx: &mut ConnectionContext) -> Outcome {
    ctx.disconnects += 1;
    ctx.queue(ConnEffect::NotifyDisconnected);
    Ok(Some(StateId::Idle))
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(_ctx: &mut ConnectionContext) {
    info!("Conn: idle");
}

fn idle_input(ctx: &mut ConnectionContext, input: ConnInput) -> Outcome {
    match input {
        ConnInput::Initiate => {
            ctx.connect_attempts += 1;
            ctx.queue(ConnEffect::StartLink);
            Ok(Some(StateId::Connecting))
        }
        ConnInput::Terminate => Err(ConnectionError::NotConnected),
        ConnInput::LinkUp | ConnInput::LinkDown => ignore(ctx, input, "Idle"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING: waiting for the transport
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut ConnectionContext) {
    info!("Conn: connecting (attempt {})", ctx.connect_attempts);
}

fn connecting_input(ctx: &mut ConnectionContext, input: ConnInput) -> Outcome {
    match input {
        ConnInput::Initiate => Err(ConnectionError::AlreadyConnecting),
        ConnInput::Terminate => {
            ctx.queue(ConnEffect::StopLink);
            Ok(Some(StateId::Terminating))
        }
        ConnInput::LinkUp => {
            ctx.sessions_established += 1;
            ctx.queue(ConnEffect::NotifyConnected);
            Ok(Some(StateId::Connected))
        }
        ConnInput::LinkDown => link_lost(ctx),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTED
// ═══════════════════════════════════════════════════════════════════════════

fn connected_enter(ctx: &mut ConnectionContext) {
    info!("Conn: connected (session {})", ctx.sessions_established);
}

fn connected_exit(_ctx: &mut ConnectionContext) {
    debug!("Conn: leaving connected");
}

fn connected_input(ctx: &mut ConnectionContext, input: ConnInput) -> Outcome {
    match input {
        ConnInput::Initiate => Err(ConnectionError::AlreadyConnected),
        ConnInput::Terminate => {
            ctx.queue(ConnEffect::StopLink);
            Ok(Some(StateId::Terminating))
        }
        ConnInput::LinkUp => ignore(ctx, input, "Connected"),
        ConnInput::LinkDown => link_lost(ctx),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  TERMINATING: teardown requested, waiting for confirmation
// ═══════════════════════════════════════════════════════════════════════════

fn terminating_enter(_ctx: &mut ConnectionContext) {
    info!("Conn: terminating");
}

fn terminating_input(ctx: &mut ConnectionContext, input: ConnInput) -> Outcome {
    match input {
        ConnInput::Initiate | ConnInput::Terminate => Err(ConnectionError::TerminationPending),
        ConnInput::LinkUp => ignore(ctx, input, "Terminating"),
        ConnInput::LinkDown => link_lost(ctx),
    }
}
