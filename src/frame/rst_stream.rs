use super::StreamId;
use crate::error::Reason;

/// Aborts a stream. The source this codec is modeled on treats status `Ok`
/// (wire value 0) as "deliver an empty frame then close the stream
/// normally" rather than as a protocol violation; that behavior is
/// preserved here even though it is not obviously the cleanest semantic,
/// per the open question this spec flags rather than resolves.
#[derive(Debug)]
pub struct RstStream {
    stream_id: StreamId,
    reason: Reason,
}

impl RstStream {
    pub fn new(stream_id: StreamId, reason: Reason) -> RstStream {
        RstStream { stream_id, reason }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn load(stream_id: StreamId, code: u32) -> Option<RstStream> {
        Reason::from_wire(code).map(|reason| RstStream { stream_id, reason })
    }
}
