//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the session rules: connection lifecycle, the
//! greeting request, and the response it collects.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
