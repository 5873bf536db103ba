//! Mock adapters for integration tests.
//!
//! The scripted transport records every call and only produces the
//! notifications a test queues, so each test decides exactly when the
//! link comes up, when data is sent and how the response is chunked.

use std::collections::VecDeque;

use hellolink::app::events::AppEvent;
use hellolink::app::ports::{
    EventSink, IdentityUrl, IndicatorPort, TransportError, TransportEvent, TransportPort,
};
use hellolink::app::service::SessionService;
use hellolink::config::SessionConfig;
use hellolink::request::{RequestId, RequestStatus, Submission};

// ── Transport call record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Setup,
    Initiate,
    Terminate,
    Announce,
    Submit { id: RequestId, payload: Vec<u8>, is_final: bool },
    Cancel(RequestId),
}

// ── ScriptedTransport ─────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedTransport {
    pub calls: Vec<TransportCall>,
    pub events: VecDeque<TransportEvent>,
    /// Chunk bodies, consumed by `read_chunk` in queue order.
    pub chunks: VecDeque<Vec<u8>>,

    pub fail_setup: bool,
    pub reject_initiate: bool,
    pub reject_terminate: bool,
    pub reject_submit: bool,
    pub fail_announce: bool,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    /// Queue a `ChunkReady` whose body `read_chunk` will hand out.
    pub fn queue_chunk(&mut self, id: RequestId, data: &[u8], finished: bool) {
        self.chunks.push_back(data.to_vec());
        self.queue(TransportEvent::ChunkReady {
            id,
            len: data.len(),
            finished,
        });
    }

    pub fn last_submit(&self) -> Option<(RequestId, Vec<u8>)> {
        self.calls.iter().rev().find_map(|c| match c {
            TransportCall::Submit { id, payload, .. } => Some((*id, payload.clone())),
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl TransportPort for ScriptedTransport {
    fn setup(&mut self) -> Result<(), TransportError> {
        self.calls.push(TransportCall::Setup);
        if self.fail_setup {
            return Err(TransportError::Io);
        }
        Ok(())
    }

    fn initiate(&mut self) -> Result<(), TransportError> {
        self.calls.push(TransportCall::Initiate);
        if self.reject_initiate {
            return Err(TransportError::Rejected);
        }
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), TransportError> {
        self.calls.push(TransportCall::Terminate);
        if self.reject_terminate {
            return Err(TransportError::Rejected);
        }
        Ok(())
    }

    fn announce(&mut self) -> Result<(), TransportError> {
        self.calls.push(TransportCall::Announce);
        if self.fail_announce {
            return Err(TransportError::Io);
        }
        Ok(())
    }

    fn submit(&mut self, submission: &Submission<'_>) -> Result<(), TransportError> {
        self.calls.push(TransportCall::Submit {
            id: submission.id,
            payload: submission.payload.to_vec(),
            is_final: submission.is_final,
        });
        if self.reject_submit {
            return Err(TransportError::Rejected);
        }
        Ok(())
    }

    fn cancel(&mut self, id: RequestId) {
        self.calls.push(TransportCall::Cancel(id));
    }

    fn identity_url(&self) -> Result<IdentityUrl, TransportError> {
        let mut url = IdentityUrl::new();
        let _ = url.push_str("https://blecon.dev/hl-test01");
        Ok(url)
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    fn read_chunk(&mut self, _id: RequestId, buf: &mut [u8]) -> usize {
        let Some(data) = self.chunks.pop_front() else {
            return 0;
        };
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        n
    }
}

// ── MockIndicator ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCall {
    Blinking { on_ms: u32, off_ms: u32 },
    Off,
}

pub struct MockIndicator {
    pub ready: bool,
    pub calls: Vec<IndicatorCall>,
    pub refreshes: u32,
}

#[allow(dead_code)]
impl MockIndicator {
    pub fn new() -> Self {
        Self {
            ready: true,
            calls: Vec::new(),
            refreshes: 0,
        }
    }

    pub fn is_blinking(&self) -> bool {
        matches!(self.calls.last(), Some(IndicatorCall::Blinking { .. }))
    }
}

impl Default for MockIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorPort for MockIndicator {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn set_blinking(&mut self, on_ms: u32, off_ms: u32) {
        self.calls.push(IndicatorCall::Blinking { on_ms, off_ms });
    }

    fn set_off(&mut self) {
        self.calls.push(IndicatorCall::Off);
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn position(&self, event: &AppEvent) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }

    pub fn closed(&self) -> Vec<RequestStatus> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::RequestClosed { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Service fixtures ──────────────────────────────────────────

pub type TestService = SessionService<ScriptedTransport, MockIndicator, RecordingSink>;

pub fn service(config: SessionConfig) -> TestService {
    service_with(config, ScriptedTransport::new(), MockIndicator::new())
}

pub fn service_with(config: SessionConfig, transport: ScriptedTransport, indicator: MockIndicator) -> TestService {
    SessionService::new(config, transport, indicator, RecordingSink::default())
}

/// Started and connecting (default config auto-connects).
#[allow(dead_code)]
pub fn connecting() -> TestService {
    let mut svc = service(SessionConfig::default());
    svc.start().expect("start");
    svc
}

/// Connected with the greeting request in flight. Returns its id.
#[allow(dead_code)]
pub fn connected() -> (TestService, RequestId) {
    let mut svc = connecting();
    svc.transport_mut().queue(TransportEvent::Connected);
    svc.poll_transport();
    let (id, _) = svc.transport().last_submit().expect("greeting submitted");
    (svc, id)
}
