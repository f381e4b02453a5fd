use bytes::Bytes;

use super::StreamId;

/// v4a2-only: announces a pushed stream id ahead of the header block that
/// used to ride along on SYN_STREAM in earlier versions. This codec keeps
/// push claiming keyed by URL regardless of which wire shape announced the
/// push (see `crate::streams::registry`), so v4a2 sessions funnel this
/// into the same dispatch path as a v2/v3 pushed SYN_STREAM.
#[derive(Debug)]
pub struct PushPromise {
    stream_id: StreamId,
    promised_stream_id: StreamId,
    header_block: Bytes,
}

impl PushPromise {
    pub fn new(stream_id: StreamId, promised_stream_id: StreamId, header_block: Bytes) -> PushPromise {
        PushPromise {
            stream_id,
            promised_stream_id,
            header_block,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn promised_stream_id(&self) -> StreamId {
        self.promised_stream_id
    }

    pub fn header_block(&self) -> &Bytes {
        &self.header_block
    }
}
