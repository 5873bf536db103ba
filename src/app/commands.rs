//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (button, host
//! shell, boot sequence, timers) that the
//! [`SessionService`](super::service::SessionService) interprets.

/// Commands that external trigger sources can send into the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Open a session (no-op error if one is already up or pending).
    Initiate,

    /// Tear the current session down.
    Terminate,

    /// Blink the indicator and broadcast presence.
    Announce,

    /// The announce indicator period elapsed; turn the indicator off.
    EndAnnounce,
}
