use bytes::{Buf, BufMut};

/// A 31-bit stream identifier. Client-initiated streams use odd values,
/// server-initiated (pushed) streams use even values; 0 is reserved for
/// session-scoped frames (SETTINGS, PING, GOAWAY, session WINDOW_UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(u32);

/// Stream ids are 31 bits; the high bit of the 32-bit field is reserved as
/// the control-frame marker on the wire and must never leak into the id
/// itself.
const STREAM_ID_MASK: u32 = 0x7fff_ffff;

/// Once a session's own id counter reaches this value, it must refuse to
/// create any further client-initiated streams rather than wrap. The wire
/// format has 31 bits of headroom, but this cap is carried forward as-is
/// from the original implementation's `stream_hi_water_mark_` bound —
/// unlike that implementation, which wraps back to 1 past this point, this
/// session refuses instead of reusing ids.
pub const MAX_STREAM_ID: u32 = 0x7fff;

impl StreamId {
    pub fn zero() -> StreamId {
        StreamId(0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn from_wire(raw: u32) -> StreamId {
        StreamId(raw & STREAM_ID_MASK)
    }

    pub fn is_client_initiated(self) -> bool {
        self.0 % 2 == 1
    }

    pub fn is_server_initiated(self) -> bool {
        self.0 != 0 && self.0 % 2 == 0
    }

    /// Next odd id after this one; `None` once `MAX_STREAM_ID` is reached.
    pub fn next_client(self) -> Option<StreamId> {
        let next = self.0 + 2;
        if next > MAX_STREAM_ID {
            None
        } else {
            Some(StreamId(next))
        }
    }

    pub fn next_server(self) -> Option<StreamId> {
        let next = self.0 + 2;
        if next > MAX_STREAM_ID {
            None
        } else {
            Some(StreamId(next))
        }
    }
}

impl From<u32> for StreamId {
    fn from(raw: u32) -> StreamId {
        StreamId::from_wire(raw)
    }
}

/// Control-frame type codes. DATA frames are distinguished by the high bit
/// of the first 32 bits being clear rather than by a `Kind` value; `Kind`
/// is only meaningful once that bit has already routed us to the control
/// frame path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Data,
    SynStream,
    SynReply,
    RstStream,
    Settings,
    Ping,
    GoAway,
    Headers,
    WindowUpdate,
    Credential,
    PushPromise,
}

impl Kind {
    pub fn from_wire(ty: u16) -> Option<Kind> {
        Some(match ty {
            1 => Kind::SynStream,
            2 => Kind::SynReply,
            3 => Kind::RstStream,
            4 => Kind::Settings,
            6 => Kind::Ping,
            7 => Kind::GoAway,
            8 => Kind::Headers,
            9 => Kind::WindowUpdate,
            10 => Kind::Credential,
            11 => Kind::PushPromise,
            _ => return None,
        })
    }

    pub fn into_wire(self) -> u16 {
        match self {
            Kind::Data => 0,
            Kind::SynStream => 1,
            Kind::SynReply => 2,
            Kind::RstStream => 3,
            Kind::Settings => 4,
            Kind::Ping => 6,
            Kind::GoAway => 7,
            Kind::Headers => 8,
            Kind::WindowUpdate => 9,
            Kind::Credential => 10,
            Kind::PushPromise => 11,
        }
    }
}

/// The fixed 8-byte prefix common to every frame, decoded far enough to
/// dispatch but without touching the payload.
#[derive(Debug, Clone, Copy)]
pub struct Head {
    control: bool,
    version: u16,
    kind: Option<Kind>,
    stream_id: StreamId,
    flags: u8,
    length: u32,
}

impl Head {
    pub fn parse(version: u16, src: &[u8]) -> Result<Head, super::Error> {
        if src.len() < super::HEADER_LEN {
            return Err(super::Error::Short);
        }

        let first = (&src[0..4]).get_u32();
        let control = first & 0x8000_0000 != 0;

        if control {
            let wire_version = ((first >> 16) & 0x7fff) as u16;
            let ty = (first & 0xffff) as u16;
            let kind = Kind::from_wire(ty).ok_or(super::Error::BadKind)?;
            let flags = src[4];
            let length = (&src[4..8]).get_u32() & 0x00ff_ffff;

            Ok(Head {
                control: true,
                version: wire_version,
                kind: Some(kind),
                stream_id: StreamId::zero(),
                flags,
                length,
            })
        } else {
            let stream_id = StreamId::from_wire(first);
            let flags = src[4];
            let length = (&src[4..8]).get_u32() & 0x00ff_ffff;

            Ok(Head {
                control: false,
                version,
                kind: Some(Kind::Data),
                stream_id,
                flags,
                length,
            })
        }
    }

    pub fn is_control(&self) -> bool {
        self.control
    }

    pub fn kind(&self) -> Kind {
        self.kind.expect("head always carries a resolved kind")
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn encode_control(version: u16, kind: Kind, flags: u8, length: u32, dst: &mut impl BufMut) {
        let first = 0x8000_0000u32 | ((version as u32 & 0x7fff) << 16) | kind.into_wire() as u32;
        dst.put_u32(first);
        dst.put_u8(flags);
        dst.put_uint(length as u64, 3);
    }

    pub fn encode_data(stream_id: StreamId, flags: u8, length: u32, dst: &mut impl BufMut) {
        dst.put_u32(stream_id.as_u32() & STREAM_ID_MASK);
        dst.put_u8(flags);
        dst.put_uint(length as u64, 3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_id_parity() {
        assert!(StreamId::from(1).is_client_initiated());
        assert!(StreamId::from(2).is_server_initiated());
        assert!(!StreamId::zero().is_server_initiated());
    }

    #[test]
    fn stream_id_wraps_at_max() {
        let near_max = StreamId::from(MAX_STREAM_ID - 2);
        assert_eq!(near_max.next_client(), Some(StreamId::from(MAX_STREAM_ID)));
        assert_eq!(StreamId::from(MAX_STREAM_ID).next_client(), None);
    }

    #[test]
    fn parses_data_head() {
        let mut buf = vec![];
        Head::encode_data(StreamId::from(3), 0x01, 5, &mut buf);
        let head = Head::parse(3, &buf).unwrap();
        assert!(!head.is_control());
        assert_eq!(head.stream_id(), StreamId::from(3));
        assert_eq!(head.length(), 5);
    }
}
