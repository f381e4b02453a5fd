use bytes::Bytes;

use super::StreamId;

const FLAG_FIN: u8 = 0x01;

/// A chunk of stream payload. Frames are capped at [`super::MAX_DATA_CHUNK`]
/// bytes by the producer that builds them; the codec never re-splits a
/// frame it is handed.
#[derive(Debug)]
pub struct Data {
    stream_id: StreamId,
    payload: Bytes,
    end_of_stream: bool,
}

impl Data {
    pub fn new(stream_id: StreamId, payload: Bytes, end_of_stream: bool) -> Data {
        Data {
            stream_id,
            payload,
            end_of_stream,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_of_stream
    }

    pub fn flags(&self) -> u8 {
        if self.end_of_stream {
            FLAG_FIN
        } else {
            0
        }
    }

    pub fn load(stream_id: StreamId, flags: u8, payload: Bytes) -> Data {
        Data {
            stream_id,
            payload,
            end_of_stream: flags & FLAG_FIN != 0,
        }
    }
}
