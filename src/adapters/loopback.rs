//! Loopback connectivity stack.
//!
//! Implements [`TransportPort`] without a radio: every submitted payload
//! is echoed back as the response, split into chunks of at most
//! `min(chunk_size, response_mtu)` bytes. Used by the firmware binary in
//! place of a real link layer and by the host tests.
//!
//! ## Event order for one exchange
//!
//! ```text
//! submit(id, "Hello blecon!")  (chunk_size = 8)
//!   → DataSent   { id, ok }
//!   → ChunkReady { id, len: 8, finished: false }
//!   → ChunkReady { id, len: 5, finished: true  }
//! ```
//!
//! With [`LoopbackFaults::respond_before_send`] the chunks are queued
//! ahead of `DataSent`. Each `ChunkReady` makes exactly that chunk
//! readable through `read_chunk` until the next `poll`.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::app::ports::{IdentityUrl, TransportError, TransportEvent, TransportPort};
use crate::request::{RequestId, Submission};

use super::device_id::{self, MacAddress};
use super::time::MonotonicClock;

/// Default largest chunk the loopback emits.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

// ── Fault injection ──────────────────────────────────────────

/// Failures the loopback can be told to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopbackFaults {
    /// `setup()` fails.
    pub setup_fails: bool,
    /// `initiate()` is refused synchronously.
    pub reject_initiate: bool,
    /// `initiate()` is accepted but the link never comes up.
    pub stall_connect: bool,
    /// `submit()` is refused synchronously.
    pub reject_submit: bool,
    /// `DataSent` reports failure.
    pub fail_send: bool,
    /// The response stream breaks after the first chunk.
    pub fail_receive: bool,
    /// The exchange ends with `RequestFailed { Timeout }` instead of a response.
    pub time_out: bool,
    /// `announce()` fails.
    pub fail_announce: bool,
    /// Queue the response chunks before `DataSent`.
    pub respond_before_send: bool,
}

// ── Link state ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Connecting,
    Up,
}

// ── Transport ────────────────────────────────────────────────

pub struct LoopbackTransport {
    faults: LoopbackFaults,
    chunk_size: usize,
    mac: MacAddress,
    clock: MonotonicClock,
    ready: bool,
    link: LinkState,
    events: VecDeque<TransportEvent>,
    /// Chunk payloads in the same order as their `ChunkReady` events.
    chunks: VecDeque<(RequestId, Vec<u8>)>,
    /// The chunk announced by the last polled `ChunkReady`.
    readable: Option<(RequestId, Vec<u8>)>,
    current: Option<RequestId>,
    submissions: u32,
}

impl LoopbackTransport {
    pub fn new(mac: MacAddress) -> Self {
        Self {
            faults: LoopbackFaults::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            mac,
            clock: MonotonicClock::new(),
            ready: false,
            link: LinkState::Down,
            events: VecDeque::new(),
            chunks: VecDeque::new(),
            readable: None,
            current: None,
            submissions: 0,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_faults(mut self, faults: LoopbackFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn set_faults(&mut self, faults: LoopbackFaults) {
        self.faults = faults;
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    /// Submissions accepted since construction.
    pub fn submissions(&self) -> u32 {
        self.submissions
    }

    /// Events not yet polled.
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Simulate the link dropping: pending request events are discarded
    /// and `Disconnected` is queued.
    pub fn drop_link(&mut self) {
        info!("Loopback: link dropped");
        if let Some(id) = self.current.take() {
            self.discard(id);
        }
        self.link = LinkState::Down;
        self.push(TransportEvent::Disconnected);
    }

    /// Queue an arbitrary notification (tests, host shell).
    pub fn inject(&mut self, event: TransportEvent) {
        self.push(event);
    }

    fn push(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    fn discard(&mut self, id: RequestId) {
        self.events.retain(|e| event_id(e) != Some(id));
        self.chunks.retain(|(cid, _)| *cid != id);
        if self.readable.as_ref().is_some_and(|(rid, _)| *rid == id) {
            self.readable = None;
        }
    }

    fn queue_response(&mut self, id: RequestId, payload: &[u8], mtu: usize) {
        let size = self.chunk_size.min(mtu).max(1);
        let mut parts: Vec<&[u8]> = payload.chunks(size).collect();
        if parts.is_empty() {
            parts.push(&[]);
        }

        if self.faults.fail_receive {
            let first = parts[0];
            self.chunks.push_back((id, first.to_vec()));
            self.push(TransportEvent::ChunkReady {
                id,
                len: first.len(),
                finished: false,
            });
            self.push(TransportEvent::ReceiveFailed { id });
            return;
        }

        let last = parts.len() - 1;
        for (i, part) in parts.into_iter().enumerate() {
            self.chunks.push_back((id, part.to_vec()));
            self.push(TransportEvent::ChunkReady {
                id,
                len: part.len(),
                finished: i == last,
            });
        }
    }
}

fn event_id(event: &TransportEvent) -> Option<RequestId> {
    match *event {
        TransportEvent::DataSent { id, .. }
        | TransportEvent::ChunkReady { id, .. }
        | TransportEvent::ReceiveFailed { id }
        | TransportEvent::RequestFailed { id, .. } => Some(id),
        _ => None,
    }
}

impl TransportPort for LoopbackTransport {
    fn setup(&mut self) -> Result<(), TransportError> {
        if self.faults.setup_fails {
            return Err(TransportError::Io);
        }
        self.ready = true;
        info!("Loopback: ready ({})", device_id::device_id(&self.mac));
        if let Some(utc_secs) = self.clock.utc_secs() {
            self.push(TransportEvent::TimeUpdated { utc_secs });
        }
        Ok(())
    }

    fn initiate(&mut self) -> Result<(), TransportError> {
        if !self.ready {
            return Err(TransportError::NotReady);
        }
        if self.faults.reject_initiate {
            return Err(TransportError::Rejected);
        }
        self.link = LinkState::Connecting;
        if !self.faults.stall_connect {
            self.link = LinkState::Up;
            self.push(TransportEvent::Connected);
        }
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), TransportError> {
        if !self.ready {
            return Err(TransportError::NotReady);
        }
        if let Some(id) = self.current.take() {
            self.discard(id);
        }
        self.link = LinkState::Down;
        self.push(TransportEvent::Disconnected);
        Ok(())
    }

    fn announce(&mut self) -> Result<(), TransportError> {
        if !self.ready {
            return Err(TransportError::NotReady);
        }
        if self.faults.fail_announce {
            return Err(TransportError::Io);
        }
        self.push(TransportEvent::PingResult { ok: true });
        Ok(())
    }

    fn submit(&mut self, submission: &Submission<'_>) -> Result<(), TransportError> {
        if self.link != LinkState::Up {
            return Err(TransportError::NotReady);
        }
        if self.current.is_some() {
            return Err(TransportError::Busy);
        }
        if self.faults.reject_submit {
            return Err(TransportError::Rejected);
        }

        let id = submission.id;
        debug!(
            "Loopback: {} {}/{} {} bytes",
            id,
            submission.params.namespace,
            submission.params.method,
            submission.payload.len()
        );
        self.current = Some(id);
        self.submissions += 1;

        if self.faults.time_out {
            self.push(TransportEvent::RequestFailed {
                id,
                status: crate::request::RequestStatus::Timeout,
            });
            return Ok(());
        }

        let sent = TransportEvent::DataSent {
            id,
            ok: !self.faults.fail_send,
        };
        if !self.faults.respond_before_send {
            self.push(sent);
        }
        if !self.faults.fail_send || self.faults.respond_before_send {
            let mtu = submission.params.response_mtu as usize;
            self.queue_response(id, submission.payload, mtu);
        }
        if self.faults.respond_before_send {
            self.push(sent);
        }
        Ok(())
    }

    fn cancel(&mut self, id: RequestId) {
        debug!("Loopback: cancel {}", id);
        self.discard(id);
        if self.current == Some(id) {
            self.current = None;
        }
    }

    fn identity_url(&self) -> Result<IdentityUrl, TransportError> {
        if !self.ready {
            return Err(TransportError::NotReady);
        }
        Ok(device_id::identity_url(&self.mac))
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        let event = self.events.pop_front()?;
        if let TransportEvent::ChunkReady { .. } = event {
            self.readable = self.chunks.pop_front();
        }
        if let Some(id) = event_id(&event) {
            self.finish(id);
        }
        Some(event)
    }

    fn read_chunk(&mut self, id: RequestId, buf: &mut [u8]) -> usize {
        match self.readable.take() {
            Some((rid, data)) if rid == id => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                n
            }
            other => {
                warn!("Loopback: no readable chunk for {}", id);
                self.readable = other;
                0
            }
        }
    }
}

impl LoopbackTransport {
    /// The exchange `id` produced its last event; a new submission may start.
    fn finish(&mut self, id: RequestId) {
        let pending = self.events.iter().any(|e| event_id(e) == Some(id));
        if !pending && self.current == Some(id) {
            self.current = None;
        }
    }
}
