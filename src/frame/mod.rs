//! Binary frame types for the SPDY framing layer.
//!
//! Every frame shares an 8-byte header (see [`head`]); control frames carry
//! a control bit + version + type in the first four bytes, DATA frames
//! carry a plain 31-bit stream id there instead. Header-block bearing
//! frames (SYN_STREAM, SYN_REPLY, HEADERS, PUSH_PROMISE) hold their header
//! block pre/post compression depending on which side of the codec last
//! touched them; see `codec` for the deflate plumbing.

mod credential;
mod data;
mod goaway;
mod head;
mod headers;
mod ping;
mod push_promise;
mod rst_stream;
mod settings;
mod syn_reply;
mod syn_stream;
mod window_update;

pub use credential::Credential;
pub use data::Data;
pub use goaway::GoAway;
pub use head::{Head, Kind, StreamId};
pub use headers::Headers;
pub use ping::Ping;
pub use push_promise::PushPromise;
pub use rst_stream::RstStream;
pub use settings::{Setting, SettingId, Settings};
pub use syn_reply::SynReply;
pub use syn_stream::SynStream;
pub use window_update::WindowUpdate;

/// Every frame is preceded by this many bytes of header.
pub const HEADER_LEN: usize = 8;

/// Maximum payload bytes carried by a single DATA frame. Larger writes are
/// split across multiple frames by the stream before being handed to the
/// write queue.
pub const MAX_DATA_CHUNK: usize = 16 * 1024;

/// A parsed/about-to-be-encoded frame of any type.
#[derive(Debug)]
pub enum Frame {
    Data(Data),
    SynStream(SynStream),
    SynReply(SynReply),
    RstStream(RstStream),
    Settings(Settings),
    Ping(Ping),
    GoAway(GoAway),
    Headers(Headers),
    WindowUpdate(WindowUpdate),
    Credential(Credential),
    PushPromise(PushPromise),
}

impl Frame {
    pub fn stream_id(&self) -> StreamId {
        match self {
            Frame::Data(f) => f.stream_id(),
            Frame::SynStream(f) => f.stream_id(),
            Frame::SynReply(f) => f.stream_id(),
            Frame::RstStream(f) => f.stream_id(),
            Frame::Settings(_) => StreamId::zero(),
            Frame::Ping(_) => StreamId::zero(),
            Frame::GoAway(_) => StreamId::zero(),
            Frame::Headers(f) => f.stream_id(),
            Frame::WindowUpdate(f) => f.stream_id(),
            Frame::Credential(_) => StreamId::zero(),
            Frame::PushPromise(f) => f.stream_id(),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Frame::Data(_) => Kind::Data,
            Frame::SynStream(_) => Kind::SynStream,
            Frame::SynReply(_) => Kind::SynReply,
            Frame::RstStream(_) => Kind::RstStream,
            Frame::Settings(_) => Kind::Settings,
            Frame::Ping(_) => Kind::Ping,
            Frame::GoAway(_) => Kind::GoAway,
            Frame::Headers(_) => Kind::Headers,
            Frame::WindowUpdate(_) => Kind::WindowUpdate,
            Frame::Credential(_) => Kind::Credential,
            Frame::PushPromise(_) => Kind::PushPromise,
        }
    }
}

/// Parse errors specific to a single frame's fixed fields, raised before
/// the frame is even attributed to a stream. Codec-level glue turns these
/// into `RecvError::Connection(Reason::ProtocolError)` except where noted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Short,
    BadFlag,
    BadKind,
    BadFrameSize,
    InvalidStreamId,
    InvalidPayloadLength,
}
