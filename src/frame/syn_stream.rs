use bytes::Bytes;

use super::StreamId;

const FLAG_FIN: u8 = 0x01;
const FLAG_UNIDIRECTIONAL: u8 = 0x02;

/// Opens a stream. Client-initiated requests set `associated_stream_id` to
/// zero; server-initiated pushes set it to the stream the push is
/// associated with and carry the pushed resource's URL inside the header
/// block (`:path`/`:host`/`:scheme` pseudo-headers, opaque to this layer).
#[derive(Debug)]
pub struct SynStream {
    stream_id: StreamId,
    associated_stream_id: StreamId,
    priority: u8,
    end_of_stream: bool,
    unidirectional: bool,
    header_block: Bytes,
}

impl SynStream {
    pub fn new(
        stream_id: StreamId,
        associated_stream_id: StreamId,
        priority: u8,
        end_of_stream: bool,
        header_block: Bytes,
    ) -> SynStream {
        SynStream {
            stream_id,
            associated_stream_id,
            priority,
            end_of_stream,
            unidirectional: false,
            header_block,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn associated_stream_id(&self) -> StreamId {
        self.associated_stream_id
    }

    pub fn is_push(&self) -> bool {
        !self.associated_stream_id.is_zero()
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_of_stream
    }

    pub fn header_block(&self) -> &Bytes {
        &self.header_block
    }

    pub fn into_header_block(self) -> Bytes {
        self.header_block
    }

    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.end_of_stream {
            flags |= FLAG_FIN;
        }
        if self.unidirectional {
            flags |= FLAG_UNIDIRECTIONAL;
        }
        flags
    }

    pub fn load(
        stream_id: StreamId,
        flags: u8,
        associated_stream_id: StreamId,
        priority: u8,
        header_block: Bytes,
    ) -> SynStream {
        SynStream {
            stream_id,
            associated_stream_id,
            priority,
            end_of_stream: flags & FLAG_FIN != 0,
            unidirectional: flags & FLAG_UNIDIRECTIONAL != 0,
            header_block,
        }
    }
}
