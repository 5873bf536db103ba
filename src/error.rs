//! Unified error types for the session orchestrator.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! trigger handlers and the boot sequence handle failures uniformly.
//! All variants are `Copy`: they are returned synchronously from guard
//! checks and carried through log lines without allocation.

use core::fmt;

use crate::request::RequestStatus;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible orchestrator operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The transport or the event loop could not be brought up.
    Setup(SetupError),
    /// `initiate()` / `terminate()` rejected for the current connection state.
    Connection(ConnectionError),
    /// The request could not be prepared or submitted.
    Submission(SubmissionError),
    /// A send or receive operation failed.
    Transfer(TransferError),
    /// The request closed with a non-`Ok` status.
    ClosedWithError(RequestStatus),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(e) => write!(f, "setup: {e}"),
            Self::Connection(e) => write!(f, "connection: {e}"),
            Self::Submission(e) => write!(f, "submission: {e}"),
            Self::Transfer(e) => write!(f, "transfer: {e}"),
            Self::ClosedWithError(status) => {
                write!(f, "request closed with status {} ({status})", status.code())
            }
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Setup errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    /// The connectivity stack refused to initialise.
    TransportInit,
    /// The device identity URL could not be read.
    IdentityUnavailable,
    /// The trigger table has no free slot.
    TriggerTableFull,
    /// Every one-shot timer slot is armed.
    TimerTableFull,
    /// The status indicator device is not ready.
    IndicatorNotReady,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportInit => write!(f, "transport initialisation failed"),
            Self::IdentityUnavailable => write!(f, "device identity unavailable"),
            Self::TriggerTableFull => write!(f, "trigger table full"),
            Self::TimerTableFull => write!(f, "timer table full"),
            Self::IndicatorNotReady => write!(f, "indicator not ready"),
        }
    }
}

impl From<SetupError> for Error {
    fn from(e: SetupError) -> Self {
        Self::Setup(e)
    }
}

// ---------------------------------------------------------------------------
// Connection errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// `initiate()` while a connect is already outstanding.
    AlreadyConnecting,
    /// `initiate()` while a session is established.
    AlreadyConnected,
    /// `terminate()` with no session or connect attempt.
    NotConnected,
    /// Any call while a teardown is awaiting confirmation.
    TerminationPending,
    /// The transport refused the initiate/terminate call.
    TransportRejected,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyConnecting => write!(f, "connection attempt already in progress"),
            Self::AlreadyConnected => write!(f, "already connected"),
            Self::NotConnected => write!(f, "not connected"),
            Self::TerminationPending => write!(f, "termination pending"),
            Self::TransportRejected => write!(f, "transport rejected the call"),
        }
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

// ---------------------------------------------------------------------------
// Submission errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionError {
    /// `init()` has not been called.
    NotInitialized,
    /// A send or a receive operation is missing.
    NotReady,
    /// The connection is not in the `Connected` state.
    ConnectionNotEstablished,
    /// The operation slot is already occupied.
    OperationAlreadyAttached,
    /// The request is in flight or closed; `cleanup()` first.
    Busy,
    /// The payload does not fit the configured send buffer.
    PayloadTooLarge,
    /// The transport refused the submission.
    TransportRejected,
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "request not initialised"),
            Self::NotReady => write!(f, "send and receive operations must both be attached"),
            Self::ConnectionNotEstablished => write!(f, "connection not established"),
            Self::OperationAlreadyAttached => write!(f, "operation already attached"),
            Self::Busy => write!(f, "request busy, cleanup required"),
            Self::PayloadTooLarge => write!(f, "payload too large"),
            Self::TransportRejected => write!(f, "transport rejected the request"),
        }
    }
}

impl From<SubmissionError> for Error {
    fn from(e: SubmissionError) -> Self {
        Self::Submission(e)
    }
}

// ---------------------------------------------------------------------------
// Transfer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// The transport reported the outgoing payload as not sent.
    SendFailed,
    /// The transport reported the incoming stream as broken.
    ReceiveFailed,
    /// The allocated chunk buffer is shorter than the requested size.
    BufferTooSmall,
    /// The transport announced a chunk larger than the response MTU.
    ChunkExceedsMtu,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailed => write!(f, "send failed"),
            Self::ReceiveFailed => write!(f, "receive failed"),
            Self::BufferTooSmall => write!(f, "chunk buffer too small"),
            Self::ChunkExceedsMtu => write!(f, "chunk exceeds response MTU"),
        }
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Self::Transfer(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
