//! Data transfer operations bound to a [`Request`](super::Request).
//!
//! A [`SendOp`] owns the outgoing payload for as long as the transport may
//! read it and hands the buffer back on completion. A [`ReceiveOp`] asks
//! its allocator for storage once per incoming chunk; each filled buffer
//! is returned to the caller as a [`ReceivedChunk`].

/// Allocates storage for one incoming chunk of `requested` bytes.
/// Must return a buffer at least `requested` bytes long.
pub type ChunkAllocFn = fn(requested: usize) -> Vec<u8>;

/// Zero-filled allocation of exactly the requested size.
pub fn alloc_exact(requested: usize) -> Vec<u8> {
    vec![0; requested]
}

// ---------------------------------------------------------------------------
// Send
// ---------------------------------------------------------------------------

/// One outgoing transfer.
#[derive(Debug)]
pub struct SendOp {
    payload: Vec<u8>,
    is_final: bool,
    /// `Some(ok)` once the transport reported the outcome.
    outcome: Option<bool>,
}

impl SendOp {
    pub fn new(payload: Vec<u8>, is_final: bool) -> Self {
        Self {
            payload,
            is_final,
            outcome: None,
        }
    }

    /// Bytes the transport is reading. Empty once completed.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    /// `true` only after a successful completion.
    pub fn succeeded(&self) -> bool {
        self.outcome == Some(true)
    }

    /// Record the transport outcome and give the buffer back.
    /// Returns `None` if the operation already completed.
    pub(crate) fn complete(&mut self, ok: bool) -> Option<Vec<u8>> {
        if self.outcome.is_some() {
            return None;
        }
        self.outcome = Some(ok);
        Some(core::mem::take(&mut self.payload))
    }
}

// ---------------------------------------------------------------------------
// Receive
// ---------------------------------------------------------------------------

/// One incoming, chunked transfer.
#[derive(Debug)]
pub struct ReceiveOp {
    alloc: ChunkAllocFn,
    chunks: u32,
    bytes: usize,
    finished: bool,
}

impl ReceiveOp {
    pub fn new(alloc: ChunkAllocFn) -> Self {
        Self {
            alloc,
            chunks: 0,
            bytes: 0,
            finished: false,
        }
    }

    /// Clear progress before the first chunk of a new exchange.
    pub(crate) fn reset(&mut self) {
        self.chunks = 0;
        self.bytes = 0;
        self.finished = false;
    }

    pub(crate) fn allocate(&self, requested: usize) -> Vec<u8> {
        (self.alloc)(requested)
    }

    pub(crate) fn record(&mut self, len: usize, finished: bool) {
        self.chunks += 1;
        self.bytes += len;
        self.finished = finished;
    }

    /// Chunks delivered so far.
    pub fn chunks(&self) -> u32 {
        self.chunks
    }

    /// Payload bytes delivered so far.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// The chunk marked `finished` has been delivered.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// A filled chunk buffer, handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedChunk {
    pub data: Vec<u8>,
    /// Last chunk of the stream.
    pub finished: bool,
}

impl ReceivedChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
