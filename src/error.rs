//! Error taxonomy for the session runtime.
//!
//! Mirrors the split the teacher library uses between an outward-facing
//! error and the narrower errors internal plumbing deals in: `RecvError` is
//! what a frame handler can fail with while parsing or dispatching a frame,
//! `SendError` is what enqueueing an outbound producer can fail with, and
//! `Error` is the union surfaced at the public boundary (`Session`,
//! `StreamHandle`, `CreateStreamRequest`'s completion).

use std::fmt;

/// RST_STREAM status codes and GOAWAY statuses share one wire-level code
/// space in this codec; not every `Reason` is valid on every frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Ok,
    ProtocolError,
    InvalidStream,
    RefusedStream,
    Unsupported,
    Cancel,
    InternalError,
    FlowControlError,
    StreamInUse,
    StreamAlreadyClosed,
    InvalidCredentials,
    FrameTooLarge,
}

impl Reason {
    pub fn from_wire(code: u32) -> Option<Reason> {
        use Reason::*;
        Some(match code {
            0 => Ok,
            1 => ProtocolError,
            2 => InvalidStream,
            3 => RefusedStream,
            4 => Unsupported,
            5 => Cancel,
            6 => InternalError,
            7 => FlowControlError,
            8 => StreamInUse,
            9 => StreamAlreadyClosed,
            10 => InvalidCredentials,
            11 => FrameTooLarge,
            _ => return None,
        })
    }

    pub fn into_wire(self) -> u32 {
        use Reason::*;
        match self {
            Ok => 0,
            ProtocolError => 1,
            InvalidStream => 2,
            RefusedStream => 3,
            Unsupported => 4,
            Cancel => 5,
            InternalError => 6,
            FlowControlError => 7,
            StreamInUse => 8,
            StreamAlreadyClosed => 9,
            InvalidCredentials => 10,
            FrameTooLarge => 11,
        }
    }

    /// REFUSED_STREAM is special-cased by the session as retryable; see
    /// the frame dispatch rules for RST_STREAM.
    pub fn is_retryable(self) -> bool {
        matches!(self, Reason::RefusedStream)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// GOAWAY status codes (a strict subset of `Reason`'s wire space is valid
/// here: OK, PROTOCOL_ERROR, INTERNAL_ERROR).
pub type GoAwayStatus = Reason;

/// Errors raised while decoding bytes into frames or while dispatching a
/// parsed frame against session/stream state. Never surfaced directly to
/// callers; folded into `Error` at the session boundary.
#[derive(Debug)]
pub enum RecvError {
    /// Malformed frame; the whole connection is compromised.
    Connection(Reason),
    /// Only the named stream is compromised; emit RST_STREAM and move on.
    Stream { id: crate::frame::StreamId, reason: Reason },
    /// The underlying transport returned an unrecoverable error or EOF.
    Io(std::io::Error),
}

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecvError::Connection(r) => write!(f, "connection error: {}", r),
            RecvError::Stream { id, reason } => {
                write!(f, "stream {} error: {}", id.as_u32(), reason)
            }
            RecvError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for RecvError {}

impl From<std::io::Error> for RecvError {
    fn from(e: std::io::Error) -> Self {
        RecvError::Io(e)
    }
}

/// Errors raised while a caller tries to enqueue an outbound frame.
#[derive(Debug)]
pub enum SendError {
    /// Caller misuse: e.g. `send_data` after the stream's local half
    /// already carried an end-of-stream flag.
    User(UserError),
    /// The connection can no longer accept writes.
    Connection(Reason),
    Io(std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserError {
    /// `send_data` called with more bytes than the caller has claimed
    /// capacity for via the stream's send window.
    SendWindowExceeded,
    /// A frame was sent on a stream after its local half was already
    /// marked end-of-stream.
    StreamAlreadyClosed { local: bool },
    /// `WINDOW_UPDATE` with delta 0, which is a no-op and therefore
    /// forbidden by the wire format this codec implements.
    ZeroWindowUpdateDelta,
    /// Increasing the window would exceed `i32::MAX`.
    WindowOverflow,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::User(e) => write!(f, "user error: {:?}", e),
            SendError::Connection(r) => write!(f, "connection error: {}", r),
            SendError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for SendError {}

impl From<std::io::Error> for SendError {
    fn from(e: std::io::Error) -> Self {
        SendError::Io(e)
    }
}

/// The error surfaced at the public API boundary. Every stream-visible
/// failure reaches `Stream::on_close` as one of these; `create_stream`
/// callers observe the same taxonomy through their completion channel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Peer violated the framing/flow-control protocol. Session-fatal.
    #[error("protocol error: {0}")]
    Protocol(Reason),

    /// The transport returned a non-recoverable error or closed.
    #[error("transport closed: {0}")]
    Transport(std::io::Error),

    /// Only a single stream was affected; the session remains open.
    #[error("stream error: {0}")]
    Stream(Reason),

    /// PING-based liveness check failed.
    #[error("ping liveness check failed")]
    PingFailed,

    /// The session was already closed when the operation was attempted.
    #[error("connection closed")]
    ConnectionClosed,

    /// The session is in GOING_AWAY and no longer accepts new streams.
    #[error("aborted: session going away")]
    Aborted,

    /// Requesting a secure-scheme stream over a session whose certificate
    /// chain failed validation at handshake time.
    #[error("certificate error: {0}")]
    CertificateError(u32),

    #[error("misuse: {0:?}")]
    User(UserError),
}

impl From<RecvError> for Error {
    fn from(e: RecvError) -> Self {
        match e {
            RecvError::Connection(r) => Error::Protocol(r),
            RecvError::Stream { reason, .. } => Error::Stream(reason),
            RecvError::Io(e) => Error::Transport(e),
        }
    }
}

impl From<SendError> for Error {
    fn from(e: SendError) -> Self {
        match e {
            SendError::User(u) => Error::User(u),
            SendError::Connection(r) => Error::Protocol(r),
            SendError::Io(e) => Error::Transport(e),
        }
    }
}
