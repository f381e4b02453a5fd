//! Protocol-runtime types shared between the write queue, flow control and
//! the session core: window accounting, write-side constants and the
//! write queue itself.

mod write_queue;

pub use write_queue::{WriteItem, WriteQueue};

/// Flow-control windows are modeled as signed so that a negative window
/// (the legitimate result of a SETTINGS-driven shrink, see §8 boundary
/// behaviors) is representable without a separate "debt" field.
pub type WindowSize = i64;

/// The protocol's stream-initial-window default.
pub const DEFAULT_STREAM_INITIAL_WINDOW_SIZE: WindowSize = 64 * 1024 - 1;

/// The session-level default, only meaningful in `StreamAndSession` mode;
/// larger than the per-stream default so a session isn't immediately the
/// bottleneck for a single active stream.
pub const DEFAULT_SESSION_INITIAL_WINDOW_SIZE: WindowSize = 10 * 1024 * 1024;

/// A window increment that would push any window past this value is a
/// protocol error (`int32` overflow on the wire).
pub const MAX_WINDOW_SIZE: WindowSize = i32::MAX as WindowSize;

/// Number of distinct write priorities; SYN_STREAM carries a 3-bit
/// priority field in v2/v3 (8 levels) and an 8-bit field in v3.1+, but a
/// small fixed bucket count is sufficient to preserve the ordering
/// guarantee in §5 without per-version branching in the write queue.
pub const PRIORITY_LEVELS: usize = 8;

pub type Priority = u8;

/// Clamp an arbitrary caller-supplied priority into the bucket range the
/// write queue actually maintains.
pub fn clamp_priority(priority: Priority) -> usize {
    (priority as usize).min(PRIORITY_LEVELS - 1)
}
