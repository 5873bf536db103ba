//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production, stderr on host).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events written since construction.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted += 1;
        match event {
            AppEvent::Started { identity } => info!("START | url={}", identity),
            AppEvent::StateChanged { from, to } => info!("CONN  | {:?} -> {:?}", from, to),
            AppEvent::Connected => info!("CONN  | up"),
            AppEvent::Disconnected => info!("CONN  | down"),
            AppEvent::RequestSubmitted { id, bytes } => {
                info!("REQ   | {} submitted ({} bytes)", id, bytes);
            }
            AppEvent::DataSent { id, ok, bytes } => {
                info!("REQ   | {} sent {} bytes ok={}", id, bytes, ok);
            }
            AppEvent::ChunkReceived { id, len, finished } => {
                info!("REQ   | {} chunk {} bytes{}", id, len, if *finished { " (last)" } else { "" });
            }
            AppEvent::ResponseTruncated { id, dropped } => {
                warn!("REQ   | {} response truncated, {} bytes dropped", id, dropped);
            }
            AppEvent::RequestClosed { id, status } if status.is_ok() => {
                info!("REQ   | {} closed ok", id);
            }
            AppEvent::RequestClosed { id, status } => {
                warn!("REQ   | {} closed: {} (code {})", id, status, status.code());
            }
            AppEvent::TimeUpdated { utc_secs } => info!("TIME  | utc={}", utc_secs),
            AppEvent::Announcing => info!("ANNCE | blinking"),
            AppEvent::AnnounceEnded => info!("ANNCE | done"),
        }
    }
}
