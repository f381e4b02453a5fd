//! Session configuration surface: everything the teacher library would
//! expose through its `client`/`server` builder modules, collapsed into
//! one config type since this crate is client-only (see `Non-goals`).

use std::time::Duration;

use crate::proto::{WindowSize, DEFAULT_SESSION_INITIAL_WINDOW_SIZE, DEFAULT_STREAM_INITIAL_WINDOW_SIZE};

/// Wire-protocol version, fixed at session init from the negotiated
/// ALPN/NPN token. Versions below v2 are out of scope for this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V2,
    V3,
    V3_1,
    V4A2,
}

impl Version {
    pub fn from_alpn_token(token: &str) -> Option<Version> {
        match token {
            "spdy/2" => Some(Version::V2),
            "spdy/3" => Some(Version::V3),
            "spdy/3.1" => Some(Version::V3_1),
            "spdy/4a2" => Some(Version::V4A2),
            _ => None,
        }
    }

    pub fn wire_version(self) -> u16 {
        match self {
            Version::V2 => 2,
            Version::V3 | Version::V3_1 => 3,
            Version::V4A2 => 4,
        }
    }

    pub fn supports_credential_frames(self) -> bool {
        !matches!(self, Version::V2)
    }

    pub fn supports_session_flow_control(self) -> bool {
        matches!(self, Version::V3 | Version::V3_1 | Version::V4A2)
    }
}

/// Which axes of flow control are active. v2 has none; v3/3.1 default to
/// stream-only but may negotiate session-level via SETTINGS; this
/// implementation treats the choice as a static per-session config since
/// renegotiating the axis mid-connection is not part of the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControlMode {
    None,
    StreamOnly,
    StreamAndSession,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub version: Version,
    pub flow_control_mode: FlowControlMode,
    pub stream_initial_window_size: WindowSize,
    pub session_initial_window_size: WindowSize,
    /// Cap on concurrent streams we accept from the peer (server-initiated
    /// pushes + any future server-role use); `None` means unbounded.
    pub max_concurrent_streams: Option<usize>,
    /// Cap on concurrent pushes we advertise to the peer via our own
    /// SETTINGS frame.
    pub max_concurrent_pushes: usize,
    pub enable_ping: bool,
    pub connection_at_risk_of_loss: Duration,
    pub hung_interval: Duration,
    /// Minimum time an unclaimed pushed stream is kept before the sweep
    /// may evict it.
    pub pushed_stream_min_lifetime: Duration,
    pub read_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            version: Version::V3_1,
            flow_control_mode: FlowControlMode::StreamAndSession,
            stream_initial_window_size: DEFAULT_STREAM_INITIAL_WINDOW_SIZE,
            session_initial_window_size: DEFAULT_SESSION_INITIAL_WINDOW_SIZE,
            max_concurrent_streams: None,
            max_concurrent_pushes: 32,
            enable_ping: true,
            connection_at_risk_of_loss: Duration::from_secs(10),
            hung_interval: Duration::from_secs(10),
            pushed_stream_min_lifetime: Duration::from_secs(300),
            read_buffer_size: 8 * 1024,
        }
    }
}

/// Builder for `SessionConfig`, mirroring the teacher's `client::Builder`
/// shape (fluent setters over a struct with sane defaults).
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: SessionConfig,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn version(mut self, version: Version) -> Self {
        self.config.version = version;
        if !version.supports_session_flow_control() && self.config.flow_control_mode == FlowControlMode::StreamAndSession {
            self.config.flow_control_mode = FlowControlMode::StreamOnly;
        }
        self
    }

    pub fn flow_control_mode(mut self, mode: FlowControlMode) -> Self {
        self.config.flow_control_mode = mode;
        self
    }

    pub fn stream_initial_window_size(mut self, size: WindowSize) -> Self {
        self.config.stream_initial_window_size = size;
        self
    }

    pub fn session_initial_window_size(mut self, size: WindowSize) -> Self {
        self.config.session_initial_window_size = size;
        self
    }

    pub fn max_concurrent_streams(mut self, max: Option<usize>) -> Self {
        self.config.max_concurrent_streams = max;
        self
    }

    pub fn max_concurrent_pushes(mut self, max: usize) -> Self {
        self.config.max_concurrent_pushes = max;
        self
    }

    pub fn enable_ping(mut self, enable: bool) -> Self {
        self.config.enable_ping = enable;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}
