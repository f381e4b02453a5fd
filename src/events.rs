//! Structured lifecycle events a session emits for callers that want
//! more than log lines — a metrics exporter, a debugging UI, a test
//! harness asserting on ordering. Distinct from `tracing`, which is this
//! crate's own ambient logging: an `EventSink` is an explicit collaborator
//! the caller supplies, `tracing` is unconditional.

use std::sync::Arc;

use crate::error::Reason;
use crate::frame::StreamId;

#[derive(Debug, Clone)]
pub enum Event {
    StreamCreated { id: StreamId, url: Arc<str> },
    StreamClosed { id: StreamId, reason: Option<Reason> },
    PushClaimed { url: Arc<str>, id: StreamId },
    PushExpired { url: Arc<str>, id: StreamId },
    SessionGoingAway { last_good_stream_id: StreamId },
    SessionClosed { error: Option<Reason> },
    PingRoundTrip { millis: u64 },
}

pub trait EventSink: Send + Sync {
    fn on_event(&self, event: Event);
}

/// Drops every event. The default for a session that only cares about
/// `tracing` output.
#[derive(Debug, Default)]
pub struct NoEvents;

impl EventSink for NoEvents {
    fn on_event(&self, _event: Event) {}
}
