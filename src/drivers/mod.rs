//! Device-level I/O glue: the announce button and the status LED.

pub mod button;
pub mod status_led;
