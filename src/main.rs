//! HelloLink Firmware: Main Entry Point
//!
//! Hexagonal architecture driven by a single-threaded event loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  LoopbackTransport   StatusLed        LogEventSink             │
//! │  (TransportPort)     (IndicatorPort)  (EventSink)              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           SessionService (pure logic)                  │    │
//! │  │  Connection FSM · Request FSM · Response buffer        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  EventLoop (triggers + timers) · ButtonDriver (GPIO ISR)       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{info, warn};

use hellolink::adapters::device_id;
use hellolink::adapters::log_sink::LogEventSink;
use hellolink::adapters::loopback::LoopbackTransport;
use hellolink::app::service::SessionService;
use hellolink::config::SessionConfig;
use hellolink::drivers::button::{ANNOUNCE_KEY, ButtonDriver};
use hellolink::drivers::status_led::StatusLed;
use hellolink::event_loop::EventLoop;
use hellolink::pins;
use hellolink::triggers::Triggers;

/// Build-time JSON override of the default session configuration.
const CONFIG_OVERRIDE: Option<&str> = option_env!("HELLOLINK_CONFIG");

fn load_config() -> SessionConfig {
    let Some(raw) = CONFIG_OVERRIDE else {
        return SessionConfig::default();
    };
    match SessionConfig::from_json(raw) {
        Ok(cfg) => {
            info!("Config: build-time override applied");
            cfg
        }
        Err(e) => {
            warn!("Config: override rejected ({}), using defaults", e);
            SessionConfig::default()
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  HelloLink v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config();
    let idle_wait = Duration::from_millis(u64::from(config.event_loop.idle_poll_ms));

    // ── 3. Construct adapters ─────────────────────────────────
    // Claim the singleton; pins are then addressed by number from `pins`.
    let _peripherals = Peripherals::take()?;
    // SAFETY: STATUS_LED_GPIO is wired to the LED only and no other driver
    // in this binary touches it.
    let led_pin = PinDriver::output(unsafe { AnyOutputPin::new(pins::STATUS_LED_GPIO) })?;

    let mac = device_id::read_mac();
    info!("Device ID: {}", device_id::device_id(&mac));

    let transport = LoopbackTransport::new(mac);
    let indicator = StatusLed::new(led_pin);
    let sink = LogEventSink::new();

    let mut svc = SessionService::new(config, transport, indicator, sink);

    // ── 4. Event loop + triggers ──────────────────────────────
    let mut ev = EventLoop::new(idle_wait);
    let triggers = Triggers::register(&mut ev)?;

    let button = ButtonDriver::new(ANNOUNCE_KEY, triggers.announce.clone());
    if let Err(e) = button.install(pins::BUTTON_GPIO) {
        warn!("Boot: button unavailable ({}), announce only via trigger", e);
    }

    // ── 5. Start the session ──────────────────────────────────
    svc.start()?;
    info!("Boot: entering event loop (status LED on GPIO{})", pins::STATUS_LED_GPIO);

    ev.run(&mut svc);

    let stats = svc.stats();
    info!(
        "Loop exited: {} sessions, {} requests completed, {} failed",
        stats.sessions_established, stats.requests_completed, stats.requests_failed
    );
    Ok(())
}
