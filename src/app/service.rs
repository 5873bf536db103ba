//! Application service: the hexagonal core.
//!
//! [`SessionService`] owns the connection FSM, the single [`Request`] and
//! the three driven adapters. It is the owning context the
//! [`EventLoop`](crate::event_loop::EventLoop) hands to every trigger and
//! timer handler, and it drains transport notifications on every loop
//! turn through [`LoopContext::poll_io`].
//!
//! ```text
//!  TransportPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                    │      SessionService      │
//!  IndicatorPort ◀── │  Conn FSM · Request      │
//!                    └──────────────────────────┘
//! ```

use std::time::Duration;

use log::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::{ConnectionError, Error, Result, SetupError, SubmissionError};
use crate::event_loop::{LoopContext, LoopControl};
use crate::fsm::context::{ConnEffect, ConnectionContext};
use crate::fsm::states::build_state_table;
use crate::fsm::{ConnInput, Fsm, StateId};
use crate::request::{
    ReceivedChunk, Request, RequestEvent, RequestEvents, RequestId, RequestParameters, RequestStatus,
    alloc_exact,
};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{EventSink, IndicatorPort, TransportEvent, TransportPort};

/// Transport notifications handled per loop turn before yielding.
const MAX_EVENTS_PER_TURN: usize = 16;

/// Upper bound on the accumulated response body.
pub const MAX_RESPONSE_LEN: usize = 1024;

// ───────────────────────────────────────────────────────────────
// Response accumulator
// ───────────────────────────────────────────────────────────────

/// Collects the chunks of one response. Reset before every submission.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    data: Vec<u8>,
    chunks: u32,
    complete: bool,
    dropped: usize,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.data.clear();
        self.chunks = 0;
        self.complete = false;
        self.dropped = 0;
    }

    /// Appends a chunk and returns how many of its bytes did not fit.
    pub fn push(&mut self, chunk: &ReceivedChunk) -> usize {
        let room = MAX_RESPONSE_LEN - self.data.len();
        let kept = chunk.len().min(room);
        self.data.extend_from_slice(&chunk.data[..kept]);
        self.chunks += 1;
        self.complete = chunk.finished;
        let dropped = chunk.len() - kept;
        self.dropped += dropped;
        dropped
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn chunks(&self) -> u32 {
        self.chunks
    }

    /// The finished chunk has been accumulated.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Bytes past [`MAX_RESPONSE_LEN`] were discarded.
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }

    /// Total bytes discarded since the last reset.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

// ───────────────────────────────────────────────────────────────
// Stats
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub connect_attempts: u32,
    pub sessions_established: u32,
    pub disconnects: u32,
    pub requests_submitted: u32,
    pub requests_completed: u32,
    pub requests_failed: u32,
    pub chunks_received: u32,
    pub bytes_received: u64,
    pub responses_truncated: u32,
    pub bytes_dropped: u64,
}

// ───────────────────────────────────────────────────────────────
// SessionService
// ───────────────────────────────────────────────────────────────

pub struct SessionService<T, I, S> {
    config: SessionConfig,
    fsm: Fsm,
    conn: ConnectionContext,
    request: Request,
    response: ResponseAccumulator,
    stats: SessionStats,
    transport: T,
    indicator: I,
    sink: S,
}

impl<T: TransportPort, I: IndicatorPort, S: EventSink> SessionService<T, I, S> {
    /// Construct the service. Nothing touches the adapters until [`start`](Self::start).
    pub fn new(config: SessionConfig, transport: T, indicator: I, sink: S) -> Self {
        Self {
            config,
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            conn: ConnectionContext::new(),
            request: Request::new(),
            response: ResponseAccumulator::new(),
            stats: SessionStats::default(),
            transport,
            indicator,
            sink,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Boot sequence: indicator check, transport setup, request init,
    /// identity, then (optionally) the first connection attempt.
    pub fn start(&mut self) -> Result<()> {
        if !self.indicator.is_ready() {
            error!("Boot: indicator device not ready");
            return Err(SetupError::IndicatorNotReady.into());
        }
        if let Err(e) = self.transport.setup() {
            error!("Boot: transport setup failed: {}", e);
            return Err(SetupError::TransportInit.into());
        }
        self.request.init(RequestParameters::from(&self.config.request))?;

        let identity = self.transport.identity_url().map_err(|e| {
            error!("Boot: identity URL unavailable: {}", e);
            Error::from(SetupError::IdentityUnavailable)
        })?;
        info!("Boot: device URL {}", identity);

        self.fsm.start(&mut self.conn);
        self.sink.emit(&AppEvent::Started { identity });

        if self.config.auto_connect {
            if let Err(e) = self.initiate() {
                warn!("Boot: initial connect failed: {}", e);
            }
        }
        Ok(())
    }

    // ── Commands ──────────────────────────────────────────────

    pub fn handle_command(&mut self, cmd: AppCommand) -> Result<()> {
        match cmd {
            AppCommand::Initiate => self.initiate(),
            AppCommand::Terminate => self.terminate(),
            AppCommand::Announce => self.announce(),
            AppCommand::EndAnnounce => {
                self.indicator.set_off();
                self.sink.emit(&AppEvent::AnnounceEnded);
                Ok(())
            }
        }
    }

    pub fn initiate(&mut self) -> Result<()> {
        self.drive(ConnInput::Initiate).map(|_| ())
    }

    pub fn terminate(&mut self) -> Result<()> {
        self.drive(ConnInput::Terminate).map(|_| ())
    }

    /// Fast-blink the indicator and broadcast presence. A failed announce
    /// turns the indicator off again.
    pub fn announce(&mut self) -> Result<()> {
        let (on_ms, off_ms) = self.config.indicator.blink_phases_ms();
        self.indicator.set_blinking(on_ms, off_ms);
        if let Err(e) = self.transport.announce() {
            warn!("Announce: failed: {}", e);
            self.indicator.set_off();
            return Err(ConnectionError::TransportRejected.into());
        }
        info!("Announce: started");
        self.sink.emit(&AppEvent::Announcing);
        Ok(())
    }

    /// How long the announce indicator stays on.
    pub fn announce_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.indicator.announce_duration_secs))
    }

    // ── Transport notifications ───────────────────────────────

    /// Drain up to a bounded number of transport notifications.
    pub fn poll_transport(&mut self) -> usize {
        let mut handled = 0;
        while handled < MAX_EVENTS_PER_TURN {
            let Some(event) = self.transport.poll() else {
                break;
            };
            debug!("Transport: {:?}", event);
            self.handle_transport_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                let _ = self.drive(ConnInput::LinkUp);
            }
            TransportEvent::Disconnected => {
                // The request closes before the connection reports Idle.
                if self.fsm.current_state() != StateId::Idle {
                    let events = self.request.connection_lost();
                    self.dispatch_request_events(events);
                }
                let _ = self.drive(ConnInput::LinkDown);
            }
            TransportEvent::TimeUpdated { utc_secs } => {
                info!("Time updated ({} s UTC)", utc_secs);
                self.sink.emit(&AppEvent::TimeUpdated { utc_secs });
            }
            TransportEvent::PingResult { ok } => {
                debug!("Ping result: {}", if ok { "ok" } else { "failed" });
            }
            TransportEvent::DataSent { id, ok } => {
                let events = self.request.on_data_sent(id, ok);
                self.dispatch_request_events(events);
            }
            TransportEvent::ChunkReady { id, len, finished } => {
                let transport = &mut self.transport;
                let events = self
                    .request
                    .on_chunk_ready(id, len, finished, |buf| transport.read_chunk(id, buf));
                self.dispatch_request_events(events);
            }
            TransportEvent::ReceiveFailed { id } => {
                let events = self.request.on_receive_failed(id);
                self.dispatch_request_events(events);
            }
            TransportEvent::RequestFailed { id, status } => {
                let events = self.request.fail(id, status);
                self.dispatch_request_events(events);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current connection state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &ResponseAccumulator {
        &self.response
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            connect_attempts: self.conn.connect_attempts,
            sessions_established: self.conn.sessions_established,
            disconnects: self.conn.disconnects,
            ..self.stats
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    // ── Internal ──────────────────────────────────────────────

    /// Feed one input to the connection FSM and apply the queued effects.
    fn drive(&mut self, input: ConnInput) -> Result<StateId> {
        let from = self.fsm.current_state();
        let to = self.fsm.handle(input, &mut self.conn)?;
        self.note_transition(from, to);

        for effect in self.conn.take_effects() {
            match effect {
                ConnEffect::StartLink => {
                    if let Err(e) = self.transport.initiate() {
                        warn!("Conn: transport refused initiate: {}", e);
                        self.rollback(from);
                        return Err(ConnectionError::TransportRejected.into());
                    }
                }
                ConnEffect::StopLink => {
                    if let Err(e) = self.transport.terminate() {
                        warn!("Conn: transport refused terminate: {}", e);
                        self.rollback(from);
                        return Err(ConnectionError::TransportRejected.into());
                    }
                }
                ConnEffect::NotifyConnected => {
                    info!("Connected");
                    self.sink.emit(&AppEvent::Connected);
                    self.on_connected();
                }
                ConnEffect::NotifyDisconnected => {
                    info!("Disconnected");
                    self.sink.emit(&AppEvent::Disconnected);
                }
            }
        }
        Ok(self.fsm.current_state())
    }

    fn rollback(&mut self, to: StateId) {
        let from = self.fsm.current_state();
        self.fsm.force_transition(to, &mut self.conn);
        self.note_transition(from, to);
    }

    fn note_transition(&mut self, from: StateId, to: StateId) {
        if from != to {
            self.sink.emit(&AppEvent::StateChanged { from, to });
        }
    }

    /// Session is up: send the greeting and listen for the response.
    fn on_connected(&mut self) {
        self.abort_request();
        self.response.reset();

        let payload = self.config.greeting.as_bytes().to_vec();
        if let Err(e) = self.submit(payload) {
            warn!("Req: could not submit: {}", e);
            self.abort_request();
        }
    }

    fn submit(&mut self, payload: Vec<u8>) -> Result<()> {
        self.request.attach_send(payload, true)?;
        self.request.attach_receive(alloc_exact)?;

        let submission = self.request.submit(self.fsm.current_state())?;
        let id = submission.id;
        let bytes = submission.payload.len();
        if let Err(e) = self.transport.submit(&submission) {
            warn!("Req: transport refused {}: {}", id, e);
            let events = self.request.fail(id, RequestStatus::Rejected);
            self.dispatch_request_events(events);
            return Err(SubmissionError::TransportRejected.into());
        }

        self.stats.requests_submitted += 1;
        self.sink.emit(&AppEvent::RequestSubmitted { id, bytes });
        Ok(())
    }

    /// Clean the request up, cancelling it at the transport if it was in flight.
    fn abort_request(&mut self) {
        if let Some(id) = self.request.cleanup() {
            self.transport.cancel(id);
        }
    }

    fn dispatch_request_events(&mut self, events: RequestEvents) {
        let Some(id) = self.request.id() else {
            return;
        };
        for event in events {
            match event {
                RequestEvent::DataSent { ok, payload } => self.on_data_sent(id, ok, &payload),
                RequestEvent::DataReceived(chunk) => self.on_chunk(id, &chunk),
                RequestEvent::Closed(status) => self.on_closed(id, status),
            }
        }
    }

    fn on_data_sent(&mut self, id: RequestId, ok: bool, payload: &[u8]) {
        if ok {
            info!("Data sent");
        } else {
            warn!("Failed to send data");
        }
        self.sink.emit(&AppEvent::DataSent {
            id,
            ok,
            bytes: payload.len(),
        });
    }

    fn on_chunk(&mut self, id: RequestId, chunk: &ReceivedChunk) {
        self.stats.chunks_received += 1;
        self.stats.bytes_received += chunk.len() as u64;
        let first_loss = !self.response.is_truncated();
        let dropped = self.response.push(chunk);
        if dropped > 0 && first_loss {
            warn!(
                "Response to request {} exceeds {} bytes, dropped {} bytes",
                id, MAX_RESPONSE_LEN, dropped
            );
        }

        info!("Frame: {}", String::from_utf8_lossy(&chunk.data));
        if chunk.finished {
            info!("All received");
        }
        self.sink.emit(&AppEvent::ChunkReceived {
            id,
            len: chunk.len(),
            finished: chunk.finished,
        });
    }

    fn on_closed(&mut self, id: RequestId, status: RequestStatus) {
        match self.request.outcome() {
            Some(Err(e)) => {
                self.stats.requests_failed += 1;
                warn!("Request failed with code {} ({})", status.code(), e);
            }
            _ => {
                self.stats.requests_completed += 1;
                info!("Request successful");
            }
        }
        if self.response.is_truncated() {
            let dropped = self.response.dropped();
            self.stats.responses_truncated += 1;
            self.stats.bytes_dropped += dropped as u64;
            warn!("Request {} closed with a truncated response ({} bytes dropped)", id, dropped);
            self.sink.emit(&AppEvent::ResponseTruncated { id, dropped });
        }
        self.sink.emit(&AppEvent::RequestClosed { id, status });

        let s = self.stats();
        info!(
            "Stats: sessions={} submitted={} ok={} failed={}",
            s.sessions_established, s.requests_submitted, s.requests_completed, s.requests_failed
        );

        // Nothing left to tear down once the link is gone.
        if status != RequestStatus::ConnectionLost {
            if let Err(e) = self.terminate() {
                warn!("Conn: terminate after close failed: {}", e);
            }
        }
    }
}

impl<T: TransportPort, I: IndicatorPort, S: EventSink> LoopContext for SessionService<T, I, S> {
    fn poll_io(&mut self, _ctl: &mut LoopControl<Self>) -> usize {
        self.indicator.refresh();
        self.poll_transport()
    }
}
