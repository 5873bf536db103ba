//! Session configuration parameters
//!
//! All tunable parameters for the orchestrator: the static request
//! parameters, the greeting payload, the announce indicator timing and
//! the event-loop idle poll. Defaults match the shipped device; a JSON
//! override can be supplied at boot (see [`SessionConfig::from_json`]).

use serde::{Deserialize, Serialize};

/// Upper bound for namespace / method / content-type strings.
pub const MAX_TAG_LEN: usize = 32;

/// Capacity of the outgoing payload buffer.
pub const SEND_BUFFER_LEN: usize = 64;

/// Largest response MTU the receive path accepts.
pub const MAX_RESPONSE_MTU: u16 = 512;

/// Fixed-size tag string (namespace, method, content types).
pub type Tag = heapless::String<MAX_TAG_LEN>;

/// Core session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Static parameters of the single request issued per session.
    pub request: RequestConfig,
    /// Payload sent as soon as the connection is established.
    pub greeting: heapless::String<SEND_BUFFER_LEN>,
    /// Announce indicator timing.
    pub indicator: IndicatorConfig,
    /// Event loop tuning.
    pub event_loop: LoopConfig,
    /// Initiate a connection right after boot.
    pub auto_connect: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub namespace: Tag,
    pub method: Tag,
    /// No response expected by the peer.
    pub oneway: bool,
    pub request_content_type: Tag,
    pub response_content_type: Tag,
    /// Largest incoming chunk the device accepts per allocation.
    pub response_mtu: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Full blink period while announcing (split evenly on/off).
    pub announce_blink_period_ms: u32,
    /// How long the indicator keeps blinking after an announce.
    pub announce_duration_secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Upper bound on how long the loop sleeps with nothing pending.
    pub idle_poll_ms: u32,
}

/// Reasons a configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The override is not valid JSON for this schema.
    Parse,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Parse => write!(f, "config parse error"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

fn tag(s: &str) -> Tag {
    let mut t = Tag::new();
    // Defaults are compile-time literals well under MAX_TAG_LEN.
    let _ = t.push_str(s);
    t
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            namespace: tag("aura"),
            method: tag("hello"),
            oneway: false,
            request_content_type: tag("text/plain"),
            response_content_type: tag("text/plain"),
            response_mtu: SEND_BUFFER_LEN as u16,
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            announce_blink_period_ms: 200, // fast blink, 100 on / 100 off
            announce_duration_secs: 5,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { idle_poll_ms: 50 }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut greeting = heapless::String::new();
        let _ = greeting.push_str("Hello blecon!");
        Self {
            request: RequestConfig::default(),
            greeting,
            indicator: IndicatorConfig::default(),
            event_loop: LoopConfig::default(),
            auto_connect: true,
        }
    }
}

impl IndicatorConfig {
    /// On / off phase lengths for the announce blink.
    pub fn blink_phases_ms(&self) -> (u32, u32) {
        let half = self.announce_blink_period_ms / 2;
        (half, self.announce_blink_period_ms - half)
    }
}

impl SessionConfig {
    /// Parse a (possibly partial) JSON override; missing fields keep their
    /// defaults. The result is validated before it is returned.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw).map_err(|_| ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request.namespace.is_empty() {
            return Err(ConfigError::ValidationFailed("request.namespace is empty"));
        }
        if self.request.method.is_empty() {
            return Err(ConfigError::ValidationFailed("request.method is empty"));
        }
        if self.request.response_mtu == 0 {
            return Err(ConfigError::ValidationFailed("request.response_mtu must be > 0"));
        }
        if self.request.response_mtu > MAX_RESPONSE_MTU {
            return Err(ConfigError::ValidationFailed("request.response_mtu above 512"));
        }
        if self.greeting.is_empty() {
            return Err(ConfigError::ValidationFailed("greeting is empty"));
        }
        if self.indicator.announce_blink_period_ms < 2 {
            return Err(ConfigError::ValidationFailed("indicator blink period too short"));
        }
        if self.indicator.announce_duration_secs == 0 {
            return Err(ConfigError::ValidationFailed("indicator duration must be > 0"));
        }
        if self.event_loop.idle_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed("event_loop.idle_poll_ms must be > 0"));
        }
        Ok(())
    }
}
