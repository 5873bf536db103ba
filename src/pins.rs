//! GPIO assignments for the ESP32-S3 DevKitC modem board.
//!
//! Single source of truth: drivers take their pin numbers from here.

// ---------------------------------------------------------------------------
// User input
// ---------------------------------------------------------------------------

/// BOOT key (active LOW, internal pull-up). Key 0: announce.
pub const BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// Status LED, active HIGH. Blinks while the device announces itself.
pub const STATUS_LED_GPIO: i32 = 2;
