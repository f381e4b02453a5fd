use bytes::Bytes;

use super::StreamId;

const FLAG_FIN: u8 = 0x01;

/// Acknowledges a client-initiated SYN_STREAM with response headers.
#[derive(Debug)]
pub struct SynReply {
    stream_id: StreamId,
    end_of_stream: bool,
    header_block: Bytes,
}

impl SynReply {
    pub fn new(stream_id: StreamId, end_of_stream: bool, header_block: Bytes) -> SynReply {
        SynReply {
            stream_id,
            end_of_stream,
            header_block,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
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
        if self.end_of_stream {
            FLAG_FIN
        } else {
            0
        }
    }

    pub fn load(stream_id: StreamId, flags: u8, header_block: Bytes) -> SynReply {
        SynReply {
            stream_id,
            end_of_stream: flags & FLAG_FIN != 0,
            header_block,
        }
    }
}
