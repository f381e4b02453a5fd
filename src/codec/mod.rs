//! The framing codec: turns a byte stream into [`Frame`]s and back,
//! maintaining the one deflate context per direction that header-block
//! bearing frames are compressed against.

mod compression;
mod dictionary;
pub mod header_block;

pub use compression::{DecompressionError, HeaderCompressor, HeaderDecompressor};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::Version;
use crate::error::{GoAwayStatus, Reason, RecvError, SendError};
use crate::frame::{
    self, Credential, Data, Frame, GoAway, Head, Headers, Kind, Ping, PushPromise, RstStream, Settings, StreamId,
    SynReply, SynStream, WindowUpdate, HEADER_LEN,
};

/// One codec instance per session, holding the two independent deflate
/// contexts (inbound headers we decompress, outbound headers we compress)
/// that must persist across frames for the dictionary scheme to work.
pub struct FrameCodec {
    version: Version,
    compressor: HeaderCompressor,
    decompressor: HeaderDecompressor,
}

impl FrameCodec {
    pub fn new(version: Version) -> FrameCodec {
        FrameCodec {
            version,
            compressor: HeaderCompressor::new(version),
            decompressor: HeaderDecompressor::new(version),
        }
    }

    fn decompress(&mut self, block: &[u8]) -> Result<Bytes, RecvError> {
        self.decompressor
            .decompress(block)
            .map_err(|_| RecvError::Connection(Reason::ProtocolError))
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = RecvError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, RecvError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let head = Head::parse(self.version.wire_version(), &src[..HEADER_LEN])
            .map_err(|_| RecvError::Connection(Reason::ProtocolError))?;

        let total = HEADER_LEN + head.length() as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame_bytes = src.split_to(total).freeze();
        let payload = frame_bytes.slice(HEADER_LEN..);

        if !head.is_control() {
            return Ok(Some(Frame::Data(Data::load(head.stream_id(), head.flags(), payload))));
        }

        let frame = match head.kind() {
            Kind::Data => unreachable!("DATA is never a control frame"),
            Kind::SynStream => self.decode_syn_stream(head.flags(), &payload)?,
            Kind::SynReply => self.decode_syn_reply(head.flags(), &payload)?,
            Kind::RstStream => self.decode_rst_stream(&payload)?,
            Kind::Settings => Frame::Settings(
                Settings::load(head.flags(), &payload).map_err(|_| RecvError::Connection(Reason::ProtocolError))?,
            ),
            Kind::Ping => self.decode_ping(&payload)?,
            Kind::GoAway => self.decode_goaway(&payload)?,
            Kind::Headers => self.decode_headers(head.flags(), &payload)?,
            Kind::WindowUpdate => self.decode_window_update(&payload)?,
            Kind::Credential => self.decode_credential(&payload)?,
            Kind::PushPromise => self.decode_push_promise(&payload)?,
        };

        Ok(Some(frame))
    }
}

impl FrameCodec {
    fn decode_syn_stream(&mut self, flags: u8, payload: &Bytes) -> Result<Frame, RecvError> {
        if payload.len() < 10 {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        let stream_id = StreamId::from_wire((&payload[0..4]).get_u32());
        let associated_stream_id = StreamId::from_wire((&payload[4..8]).get_u32());
        let priority = payload[8] >> 5;
        let header_block = self.decompress(&payload[10..])?;
        Ok(Frame::SynStream(SynStream::load(
            stream_id,
            flags,
            associated_stream_id,
            priority,
            header_block,
        )))
    }

    fn decode_syn_reply(&mut self, flags: u8, payload: &Bytes) -> Result<Frame, RecvError> {
        if payload.len() < 4 {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        let stream_id = StreamId::from_wire((&payload[0..4]).get_u32());
        let header_block = self.decompress(&payload[4..])?;
        Ok(Frame::SynReply(SynReply::load(stream_id, flags, header_block)))
    }

    fn decode_headers(&mut self, flags: u8, payload: &Bytes) -> Result<Frame, RecvError> {
        if payload.len() < 4 {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        let stream_id = StreamId::from_wire((&payload[0..4]).get_u32());
        let header_block = self.decompress(&payload[4..])?;
        Ok(Frame::Headers(Headers::load(stream_id, flags, header_block)))
    }

    fn decode_push_promise(&mut self, payload: &Bytes) -> Result<Frame, RecvError> {
        if payload.len() < 8 {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        let stream_id = StreamId::from_wire((&payload[0..4]).get_u32());
        let promised_stream_id = StreamId::from_wire((&payload[4..8]).get_u32());
        let header_block = self.decompress(&payload[8..])?;
        Ok(Frame::PushPromise(PushPromise::new(stream_id, promised_stream_id, header_block)))
    }

    fn decode_rst_stream(&self, payload: &Bytes) -> Result<Frame, RecvError> {
        if payload.len() != 8 {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        let stream_id = StreamId::from_wire((&payload[0..4]).get_u32());
        let code = (&payload[4..8]).get_u32();
        RstStream::load(stream_id, code)
            .map(Frame::RstStream)
            .ok_or(RecvError::Connection(Reason::ProtocolError))
    }

    fn decode_ping(&self, payload: &Bytes) -> Result<Frame, RecvError> {
        if payload.len() != 4 {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        Ok(Frame::Ping(Ping::new((&payload[0..4]).get_u32())))
    }

    fn decode_goaway(&self, payload: &Bytes) -> Result<Frame, RecvError> {
        if payload.len() != 8 {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        let last_good = (&payload[0..4]).get_u32();
        let status = (&payload[4..8]).get_u32();
        GoAway::load(last_good, status)
            .map(Frame::GoAway)
            .ok_or(RecvError::Connection(Reason::ProtocolError))
    }

    fn decode_window_update(&self, payload: &Bytes) -> Result<Frame, RecvError> {
        if payload.len() != 8 {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        let stream_id = StreamId::from_wire((&payload[0..4]).get_u32());
        let delta = (&payload[4..8]).get_u32();
        Ok(Frame::WindowUpdate(WindowUpdate::load(stream_id, delta)))
    }

    fn decode_credential(&self, payload: &Bytes) -> Result<Frame, RecvError> {
        if payload.len() < 6 {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        let slot = (&payload[0..2]).get_u16();
        let proof_len = (&payload[2..6]).get_u32() as usize;
        let proof_end = 6 + proof_len;
        if payload.len() < proof_end {
            return Err(RecvError::Connection(Reason::ProtocolError));
        }
        let proof = payload.slice(6..proof_end);

        let mut certs = Vec::new();
        let mut offset = proof_end;
        while offset + 4 <= payload.len() {
            let len = (&payload[offset..offset + 4]).get_u32() as usize;
            offset += 4;
            if offset + len > payload.len() {
                return Err(RecvError::Connection(Reason::ProtocolError));
            }
            certs.push(payload.slice(offset..offset + len));
            offset += len;
        }

        Ok(Frame::Credential(Credential::new(slot, proof, certs)))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = SendError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), SendError> {
        match frame {
            Frame::Data(f) => {
                let payload = f.payload().clone();
                if payload.len() > frame::MAX_DATA_CHUNK {
                    return Err(SendError::Connection(Reason::FrameTooLarge));
                }
                Head::encode_data(f.stream_id(), f.flags(), payload.len() as u32, dst);
                dst.extend_from_slice(&payload);
            }
            Frame::SynStream(f) => {
                let compressed = self.compressor.compress(f.header_block());
                let len = 10 + compressed.len();
                Head::encode_control(self.version.wire_version(), Kind::SynStream, f.flags(), len as u32, dst);
                dst.put_u32(f.stream_id().as_u32());
                dst.put_u32(f.associated_stream_id().as_u32());
                dst.put_u8(f.priority() << 5);
                dst.put_u8(0);
                dst.extend_from_slice(&compressed);
            }
            Frame::SynReply(f) => {
                let compressed = self.compressor.compress(f.header_block());
                let len = 4 + compressed.len();
                Head::encode_control(self.version.wire_version(), Kind::SynReply, f.flags(), len as u32, dst);
                dst.put_u32(f.stream_id().as_u32());
                dst.extend_from_slice(&compressed);
            }
            Frame::Headers(f) => {
                let compressed = self.compressor.compress(f.header_block());
                let len = 4 + compressed.len();
                Head::encode_control(self.version.wire_version(), Kind::Headers, f.flags(), len as u32, dst);
                dst.put_u32(f.stream_id().as_u32());
                dst.extend_from_slice(&compressed);
            }
            Frame::PushPromise(f) => {
                let compressed = self.compressor.compress(f.header_block());
                let len = 8 + compressed.len();
                Head::encode_control(self.version.wire_version(), Kind::PushPromise, 0, len as u32, dst);
                dst.put_u32(f.stream_id().as_u32());
                dst.put_u32(f.promised_stream_id().as_u32());
                dst.extend_from_slice(&compressed);
            }
            Frame::RstStream(f) => {
                Head::encode_control(self.version.wire_version(), Kind::RstStream, 0, 8, dst);
                dst.put_u32(f.stream_id().as_u32());
                dst.put_u32(f.reason().into_wire());
            }
            Frame::Settings(f) => {
                let body_len = if f.is_ack() { 0 } else { 4 + 8 * f.entries().len() };
                Head::encode_control(self.version.wire_version(), Kind::Settings, f.flags(), body_len as u32, dst);
                if !f.is_ack() {
                    dst.put_u32(f.entries().len() as u32);
                    for setting in f.entries() {
                        let flag_byte = (setting.persist_value as u8) | ((setting.persisted as u8) << 1);
                        dst.put_u8(flag_byte);
                        dst.put_uint(setting.id.into_wire() as u64, 3);
                        dst.put_u32(setting.value);
                    }
                }
            }
            Frame::Ping(f) => {
                Head::encode_control(self.version.wire_version(), Kind::Ping, 0, 4, dst);
                dst.put_u32(f.id());
            }
            Frame::GoAway(f) => {
                Head::encode_control(self.version.wire_version(), Kind::GoAway, 0, 8, dst);
                dst.put_u32(f.last_good_stream_id().as_u32());
                dst.put_u32(GoAwayStatus::into_wire(f.status()));
            }
            Frame::WindowUpdate(f) => {
                Head::encode_control(self.version.wire_version(), Kind::WindowUpdate, 0, 8, dst);
                dst.put_u32(f.stream_id().as_u32());
                dst.put_u32(f.size_increment());
            }
            Frame::Credential(f) => {
                let len = 2 + 4 + f.proof().len() + f.certs().iter().map(|c| 4 + c.len()).sum::<usize>();
                Head::encode_control(self.version.wire_version(), Kind::Credential, 0, len as u32, dst);
                dst.put_u16(f.slot());
                dst.put_u32(f.proof().len() as u32);
                dst.extend_from_slice(f.proof());
                for cert in f.certs() {
                    dst.put_u32(cert.len() as u32);
                    dst.extend_from_slice(cert);
                }
            }
        }
        Ok(())
    }
}
