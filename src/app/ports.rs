//! Port traits: the hexagonal boundary between the orchestrator and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SessionService (domain)
//! ```
//!
//! The connectivity stack, the status indicator and the event sink are
//! driven adapters behind these traits. The
//! [`SessionService`](super::service::SessionService) owns one of each via
//! generics, so the domain core never touches the radio or GPIO directly.
//!
//! ## Transport contract
//!
//! - Calls return synchronously; outcomes arrive later through [`TransportPort::poll`].
//! - Every request-level event carries the [`RequestId`] given at submission.
//! - Connection and request timeouts are the transport's business; they
//!   surface as ordinary `Disconnected` / `RequestFailed` events.

use crate::request::{RequestId, RequestStatus, Submission};

/// Identity URL returned by the transport (`https://…/<device-id>`).
pub type IdentityUrl = heapless::String<96>;

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ connectivity stack)
// ───────────────────────────────────────────────────────────────

/// The external connectivity stack.
pub trait TransportPort {
    /// Bring the stack up. Called once at boot.
    fn setup(&mut self) -> Result<(), TransportError>;

    /// Start establishing a session; completion is `TransportEvent::Connected`.
    fn initiate(&mut self) -> Result<(), TransportError>;

    /// Tear the session down; confirmation is `TransportEvent::Disconnected`.
    fn terminate(&mut self) -> Result<(), TransportError>;

    /// Broadcast the device's presence. Orthogonal to the session state.
    fn announce(&mut self) -> Result<(), TransportError>;

    /// Start an exchange. The payload must be copied or fully consumed
    /// before `DataSent` is reported for this id.
    fn submit(&mut self, submission: &Submission<'_>) -> Result<(), TransportError>;

    /// Drop all pending work for `id`. No further events carry it.
    fn cancel(&mut self, id: RequestId);

    /// URL identifying this device to the peer's service.
    fn identity_url(&self) -> Result<IdentityUrl, TransportError>;

    /// Next pending notification, if any. Never blocks.
    fn poll(&mut self) -> Option<TransportEvent>;

    /// Copy the chunk announced by the last `ChunkReady` into `buf`.
    /// Returns the number of bytes written.
    fn read_chunk(&mut self, id: RequestId, buf: &mut [u8]) -> usize;
}

/// Notifications delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// Wall-clock time was synchronised from the network.
    TimeUpdated { utc_secs: u64 },
    /// Outcome of a link-level ping. Informational only.
    PingResult { ok: bool },
    /// The send operation of `id` finished.
    DataSent { id: RequestId, ok: bool },
    /// A chunk of `len` bytes is ready for `read_chunk`.
    ChunkReady { id: RequestId, len: usize, finished: bool },
    /// The incoming stream of `id` broke.
    ReceiveFailed { id: RequestId },
    /// The exchange ended with a transport-level status (timeout, rejection…).
    RequestFailed { id: RequestId, status: RequestStatus },
}

// ───────────────────────────────────────────────────────────────
// Indicator port (driven adapter: domain → LED)
// ───────────────────────────────────────────────────────────────

/// A single status indicator. Purely observability.
pub trait IndicatorPort {
    /// Whether the underlying device is usable. Checked once at boot.
    fn is_ready(&self) -> bool {
        true
    }

    /// Blink with the given on / off phase lengths.
    fn set_blinking(&mut self, on_ms: u32, off_ms: u32);

    /// Turn the indicator off.
    fn set_off(&mut self);

    /// Advance any blink pattern. Called from the event loop on every turn.
    fn refresh(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`TransportPort`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The stack has not been set up, or is not in a state to accept the call.
    NotReady,
    /// The stack refused the call.
    Rejected,
    /// The stack has no room for another exchange.
    Busy,
    /// Generic failure from the radio / driver.
    Io,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotReady => write!(f, "transport not ready"),
            Self::Rejected => write!(f, "transport rejected the call"),
            Self::Busy => write!(f, "transport busy"),
            Self::Io => write!(f, "transport I/O error"),
        }
    }
}
