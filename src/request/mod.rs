//! The single request exchanged over an established connection.
//!
//! Flow: init → attach send + attach receive → submit → (sent ∥ chunks…) → Closed → cleanup
//!
//! ```text
//!  Uninitialized ──init──▶ Ready ──submit──▶ InFlight ──▶ Closed
//!                            ▲                  │           │
//!                            └────cleanup───────┴───────────┘
//! ```
//!
//! Send and receive progress independently. The request closes exactly
//! once: with `Ok` when the send succeeded and the finished chunk was
//! delivered (either order), or with the first failure status. Every
//! transport completion carries the [`RequestId`] of the submission it
//! belongs to; completions for any other id are dropped.

pub mod ops;

use core::fmt;

use log::{debug, info, warn};

use crate::config::{RequestConfig, SEND_BUFFER_LEN, Tag};
use crate::error::{Error, Result, SubmissionError, TransferError};
use crate::fsm::StateId;

pub use ops::{ChunkAllocFn, ReceiveOp, ReceivedChunk, SendOp, alloc_exact};

/// Upper bound on events produced by one request call.
pub const MAX_REQUEST_EVENTS: usize = 4;

/// Events produced by one request call, in delivery order.
pub type RequestEvents = heapless::Vec<RequestEvent, MAX_REQUEST_EVENTS>;

// ── Identity ──────────────────────────────────────────────────

/// Identifies one submission. Fresh for every `submit()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u32);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Parameters ────────────────────────────────────────────────

/// Static request parameters, set by `init()`. Passed through to the
/// transport untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParameters {
    pub namespace: Tag,
    pub method: Tag,
    pub oneway: bool,
    pub request_content_type: Tag,
    pub response_content_type: Tag,
    pub response_mtu: u16,
}

impl From<&RequestConfig> for RequestParameters {
    fn from(c: &RequestConfig) -> Self {
        Self {
            namespace: c.namespace.clone(),
            method: c.method.clone(),
            oneway: c.oneway,
            request_content_type: c.request_content_type.clone(),
            response_content_type: c.response_content_type.clone(),
            response_mtu: c.response_mtu,
        }
    }
}

// ── Status ────────────────────────────────────────────────────

/// Terminal status of a closed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Ok,
    /// The connection dropped while the request was in flight.
    ConnectionLost,
    Timeout,
    /// The peer or the transport refused the request.
    Rejected,
    SendFailed,
    ReceiveFailed,
    /// Cancelled by the transport before completion. Only ever arrives
    /// through `RequestFailed`; the session never closes with it itself.
    Aborted,
}

impl RequestStatus {
    /// Numeric code used in logs and on the wire to the host shell.
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::ConnectionLost => 1,
            Self::Timeout => 2,
            Self::Rejected => 3,
            Self::SendFailed => 4,
            Self::ReceiveFailed => 5,
            Self::Aborted => 6,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::Timeout => write!(f, "timeout"),
            Self::Rejected => write!(f, "rejected"),
            Self::SendFailed => write!(f, "send failed"),
            Self::ReceiveFailed => write!(f, "receive failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

// ── State / events ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Uninitialized,
    Ready,
    InFlight,
    Closed,
}

/// Completion notifications produced by the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    /// The send operation finished; the payload buffer is handed back.
    DataSent { ok: bool, payload: Vec<u8> },
    /// One received chunk.
    DataReceived(ReceivedChunk),
    /// Emitted exactly once per submission.
    Closed(RequestStatus),
}

/// What the transport needs to start an exchange. Borrows the payload
/// from the send operation, which keeps owning it.
#[derive(Debug)]
pub struct Submission<'a> {
    pub id: RequestId,
    pub params: &'a RequestParameters,
    pub payload: &'a [u8],
    pub is_final: bool,
}

// ── Request ───────────────────────────────────────────────────

pub struct Request {
    state: RequestState,
    params: Option<RequestParameters>,
    send: Option<SendOp>,
    receive: Option<ReceiveOp>,
    status: Option<RequestStatus>,
    current: Option<RequestId>,
    next_id: u32,
}

impl Request {
    pub fn new() -> Self {
        Self {
            state: RequestState::Uninitialized,
            params: None,
            send: None,
            receive: None,
            status: None,
            current: None,
            next_id: 1,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Terminal status; `None` until closed.
    pub fn status(&self) -> Option<RequestStatus> {
        self.status
    }

    /// Outcome of a closed request: `Ok(())` on success, the closing
    /// status as an error otherwise. `None` until the request closes.
    pub fn outcome(&self) -> Option<Result<()>> {
        let status = self.status?;
        Some(match status {
            RequestStatus::Ok => Ok(()),
            RequestStatus::SendFailed => Err(TransferError::SendFailed.into()),
            RequestStatus::ReceiveFailed => Err(TransferError::ReceiveFailed.into()),
            other => Err(Error::ClosedWithError(other)),
        })
    }

    /// Id of the current (or last closed) submission.
    pub fn id(&self) -> Option<RequestId> {
        self.current
    }

    pub fn params(&self) -> Option<&RequestParameters> {
        self.params.as_ref()
    }

    pub fn send_op(&self) -> Option<&SendOp> {
        self.send.as_ref()
    }

    pub fn receive_op(&self) -> Option<&ReceiveOp> {
        self.receive.as_ref()
    }

    /// Set the static parameters. Allowed once, or again on a clean `Ready`
    /// request.
    pub fn init(&mut self, params: RequestParameters) -> Result<()> {
        match self.state {
            RequestState::Uninitialized => {}
            RequestState::Ready if self.send.is_none() && self.receive.is_none() => {}
            _ => return Err(SubmissionError::Busy.into()),
        }
        info!("Req: init {}/{}", params.namespace, params.method);
        self.params = Some(params);
        self.state = RequestState::Ready;
        Ok(())
    }

    pub fn attach_send(&mut self, payload: Vec<u8>, is_final: bool) -> Result<()> {
        self.check_attachable(self.send.is_some())?;
        if payload.len() > SEND_BUFFER_LEN {
            return Err(SubmissionError::PayloadTooLarge.into());
        }
        self.send = Some(SendOp::new(payload, is_final));
        Ok(())
    }

    pub fn attach_receive(&mut self, alloc: ChunkAllocFn) -> Result<()> {
        self.check_attachable(self.receive.is_some())?;
        self.receive = Some(ReceiveOp::new(alloc));
        Ok(())
    }

    fn check_attachable(&self, occupied: bool) -> Result<()> {
        match self.state {
            RequestState::Uninitialized => Err(SubmissionError::NotInitialized.into()),
            RequestState::InFlight | RequestState::Closed => Err(SubmissionError::Busy.into()),
            RequestState::Ready if occupied => Err(SubmissionError::OperationAlreadyAttached.into()),
            RequestState::Ready => Ok(()),
        }
    }

    /// Move to `InFlight` and describe the exchange for the transport.
    /// A failed guard leaves the request unchanged.
    pub fn submit(&mut self, connection: StateId) -> Result<Submission<'_>> {
        if connection != StateId::Connected {
            return Err(SubmissionError::ConnectionNotEstablished.into());
        }
        match self.state {
            RequestState::Uninitialized => return Err(SubmissionError::NotInitialized.into()),
            RequestState::InFlight | RequestState::Closed => {
                return Err(SubmissionError::Busy.into());
            }
            RequestState::Ready => {}
        }
        let (Some(params), Some(send), Some(receive)) =
            (self.params.as_ref(), self.send.as_ref(), self.receive.as_mut())
        else {
            return Err(SubmissionError::NotReady.into());
        };

        receive.reset();
        let id = RequestId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.current = Some(id);
        self.status = None;
        self.state = RequestState::InFlight;

        info!(
            "Req: submit {} {}/{} ({} bytes)",
            id,
            params.namespace,
            params.method,
            send.payload().len()
        );
        Ok(Submission {
            id,
            params,
            payload: send.payload(),
            is_final: send.is_final(),
        })
    }

    /// The transport reported the outcome of the send operation.
    pub fn on_data_sent(&mut self, id: RequestId, ok: bool) -> RequestEvents {
        let mut events = RequestEvents::new();
        if !self.accepts(id, "data sent") {
            return events;
        }
        let Some(payload) = self.send.as_mut().and_then(|op| op.complete(ok)) else {
            debug!("Req: duplicate send completion for {} dropped", id);
            return events;
        };
        push(&mut events, RequestEvent::DataSent { ok, payload });

        if !ok {
            warn!("Req: {} {}", id, TransferError::SendFailed);
            self.close(RequestStatus::SendFailed, &mut events);
        } else if self.receive.as_ref().is_some_and(ReceiveOp::is_finished) {
            self.close(RequestStatus::Ok, &mut events);
        }
        events
    }

    /// A chunk of `requested` bytes is ready. The receive operation
    /// allocates storage, `read` fills it and returns the byte count.
    pub fn on_chunk_ready(
        &mut self,
        id: RequestId,
        requested: usize,
        finished: bool,
        read: impl FnOnce(&mut [u8]) -> usize,
    ) -> RequestEvents {
        let mut events = RequestEvents::new();
        if !self.accepts(id, "chunk") {
            return events;
        }
        let mtu = self.params.as_ref().map_or(0, |p| p.response_mtu as usize);
        let Some(receive) = self.receive.as_mut() else {
            return events;
        };
        if receive.is_finished() {
            debug!("Req: chunk for {} after finished dropped", id);
            return events;
        }
        if requested > mtu {
            warn!("Req: {} {} ({} > {})", id, TransferError::ChunkExceedsMtu, requested, mtu);
            self.close(RequestStatus::ReceiveFailed, &mut events);
            return events;
        }

        let mut buf = receive.allocate(requested);
        if buf.len() < requested {
            warn!("Req: {} {} ({} < {})", id, TransferError::BufferTooSmall, buf.len(), requested);
            self.close(RequestStatus::ReceiveFailed, &mut events);
            return events;
        }
        let written = read(&mut buf[..requested]).min(requested);
        buf.truncate(written);
        receive.record(written, finished);
        debug!("Req: {} chunk {} bytes (finished={})", id, written, finished);
        push(
            &mut events,
            RequestEvent::DataReceived(ReceivedChunk {
                data: buf,
                finished,
            }),
        );

        if finished && self.send.as_ref().is_some_and(SendOp::succeeded) {
            self.close(RequestStatus::Ok, &mut events);
        }
        events
    }

    /// The transport reported the incoming stream as broken.
    pub fn on_receive_failed(&mut self, id: RequestId) -> RequestEvents {
        self.fail(id, RequestStatus::ReceiveFailed)
    }

    /// The transport closed the exchange with a terminal status.
    ///
    /// `Ok` is not a failure: only both operations completing close a
    /// request `Ok`, so a transport reporting it here closes `Rejected`.
    pub fn fail(&mut self, id: RequestId, status: RequestStatus) -> RequestEvents {
        let mut events = RequestEvents::new();
        if self.accepts(id, "failure") {
            let status = if status.is_ok() {
                warn!("Req: {} transport reported failure with status ok, closing rejected", id);
                RequestStatus::Rejected
            } else {
                status
            };
            warn!("Req: {} failed: {} (code {})", id, status, status.code());
            self.close(status, &mut events);
        }
        events
    }

    /// The connection dropped. Closes an in-flight request with
    /// `ConnectionLost`; no-op otherwise.
    pub fn connection_lost(&mut self) -> RequestEvents {
        let mut events = RequestEvents::new();
        if self.state == RequestState::InFlight {
            warn!("Req: connection lost with {:?} in flight", self.current);
            self.close(RequestStatus::ConnectionLost, &mut events);
        }
        events
    }

    /// Release both operations and the status, returning to `Ready`.
    ///
    /// On an in-flight request the operations are aborted without a
    /// `Closed` event; the returned id must be cancelled at the transport.
    pub fn cleanup(&mut self) -> Option<RequestId> {
        let aborted = match self.state {
            RequestState::Uninitialized => return None,
            RequestState::Ready => None,
            RequestState::InFlight => {
                info!("Req: {:?} aborted by cleanup", self.current);
                self.current
            }
            RequestState::Closed => None,
        };
        self.send = None;
        self.receive = None;
        self.status = None;
        self.state = RequestState::Ready;
        aborted
    }

    // ── Internal ──────────────────────────────────────────────

    fn accepts(&self, id: RequestId, what: &str) -> bool {
        if self.state != RequestState::InFlight || self.current != Some(id) {
            debug!(
                "Req: stale {} for {} dropped (state {:?}, current {:?})",
                what, id, self.state, self.current
            );
            return false;
        }
        true
    }

    fn close(&mut self, status: RequestStatus, events: &mut RequestEvents) {
        if self.state != RequestState::InFlight {
            return;
        }
        self.state = RequestState::Closed;
        self.status = Some(status);
        push(events, RequestEvent::Closed(status));
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

fn push(events: &mut RequestEvents, event: RequestEvent) {
    // At most two events per call.
    let _ = events.push(event);
}
