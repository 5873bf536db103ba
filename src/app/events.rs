//! Outbound application events.
//!
//! The [`SessionService`](super::service::SessionService) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on
//! the other side decide what to do with them: log to serial, record in
//! a test, forward to a host shell.

use crate::fsm::StateId;
use crate::request::{RequestId, RequestStatus};

use super::ports::IdentityUrl;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Boot sequence finished; carries the device identity URL.
    Started { identity: IdentityUrl },

    /// The connection machine moved between states.
    StateChanged { from: StateId, to: StateId },

    /// Session established.
    Connected,

    /// Session gone.
    Disconnected,

    /// A request was handed to the transport.
    RequestSubmitted { id: RequestId, bytes: usize },

    /// The send operation finished.
    DataSent { id: RequestId, ok: bool, bytes: usize },

    /// One response chunk was delivered.
    ChunkReceived { id: RequestId, len: usize, finished: bool },

    /// The response outgrew the accumulator; `dropped` bytes were lost.
    /// Emitted just before the matching `RequestClosed`.
    ResponseTruncated { id: RequestId, dropped: usize },

    /// The request reached `Closed`.
    RequestClosed { id: RequestId, status: RequestStatus },

    /// Network time was synchronised.
    TimeUpdated { utc_secs: u64 },

    /// Announce started (indicator blinking).
    Announcing,

    /// Announce indicator period elapsed.
    AnnounceEnded,
}
