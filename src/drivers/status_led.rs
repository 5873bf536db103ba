//! Single-colour status LED driver.
//!
//! Drives one GPIO through the `embedded-hal` [`OutputPin`] trait, so the
//! same driver runs on an ESP-IDF `PinDriver` and on an in-memory pin in
//! tests. Blinking is generated in software: [`IndicatorPort::refresh`]
//! is called on every event-loop turn and flips the pin when the phase
//! changes.
//!
//! ```text
//!  lit ┌──on──┐      ┌──on──┐
//!      │      │      │      │
//!  off ┘      └─off──┘      └─off──
//!      ^ since_ms
//! ```

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::adapters::time::MonotonicClock;
use crate::app::ports::IndicatorPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    Off,
    Blinking { on_ms: u32, off_ms: u32, since_ms: u64 },
}

/// Whether the LED is lit `elapsed_ms` into a blink.
pub fn blink_lit(elapsed_ms: u64, on_ms: u32, off_ms: u32) -> bool {
    let period = u64::from(on_ms) + u64::from(off_ms);
    if period == 0 {
        return true;
    }
    elapsed_ms % period < u64::from(on_ms)
}

pub struct StatusLed<P> {
    pin: P,
    clock: MonotonicClock,
    mode: LedMode,
    lit: bool,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P) -> Self {
        let mut led = Self {
            pin,
            clock: MonotonicClock::new(),
            mode: LedMode::Off,
            lit: true,
        };
        led.drive(false);
        led
    }

    pub fn mode(&self) -> LedMode {
        self.mode
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Advance the blink pattern to `now_ms` on the LED's clock.
    pub fn refresh_at(&mut self, now_ms: u64) {
        if let LedMode::Blinking { on_ms, off_ms, since_ms } = self.mode {
            let lit = blink_lit(now_ms.saturating_sub(since_ms), on_ms, off_ms);
            self.drive(lit);
        }
    }

    fn drive(&mut self, lit: bool) {
        if lit == self.lit {
            return;
        }
        let res = if lit { self.pin.set_high() } else { self.pin.set_low() };
        if res.is_err() {
            warn!("LED: pin write failed");
            return;
        }
        self.lit = lit;
    }
}

impl<P: OutputPin> IndicatorPort for StatusLed<P> {
    fn set_blinking(&mut self, on_ms: u32, off_ms: u32) {
        self.mode = LedMode::Blinking {
            on_ms,
            off_ms,
            since_ms: self.clock.uptime_ms(),
        };
        self.drive(on_ms > 0);
    }

    fn set_off(&mut self) {
        self.mode = LedMode::Off;
        self.drive(false);
    }

    fn refresh(&mut self) {
        let now = self.clock.uptime_ms();
        self.refresh_at(now);
    }
}
