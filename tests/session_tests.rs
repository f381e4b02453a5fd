//! End-to-end tests driving a `Session` against a hand-built peer over
//! an in-memory duplex transport. The peer speaks raw `Frame`s through
//! its own `FrameCodec`, exercising the same wire format the session
//! itself uses rather than mocking at the session boundary.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

use spdy_session::config::{Builder, FlowControlMode, SessionConfig, Version};
use spdy_session::events::NoEvents;
use spdy_session::frame::{
    Frame, GoAway, Ping, PushPromise, RstStream, StreamId, SynReply, SynStream, WindowUpdate,
};
use spdy_session::pool::NoPool;
use spdy_session::properties::NoProperties;
use spdy_session::session::{self, CreateStreamRequest, StreamEvent};
use spdy_session::ssl::PlaintextSsl;
use spdy_session::streams::StreamKind;
use spdy_session::codec::{header_block, FrameCodec};
use spdy_session::error::Reason;

const HOST: &str = "example.com";

struct Peer {
    framed: Framed<DuplexStream, FrameCodec>,
}

impl Peer {
    async fn recv(&mut self) -> Frame {
        self.framed
            .next()
            .await
            .expect("peer side closed unexpectedly")
            .expect("peer received a malformed frame")
    }

    async fn send(&mut self, frame: Frame) {
        self.framed.send(frame).await.expect("peer write failed");
    }

    /// Drains the SETTINGS frame (and, in `StreamAndSession` mode, the
    /// session WINDOW_UPDATE) every session sends immediately on `run`.
    async fn drain_handshake(&mut self, config: &SessionConfig) {
        match self.recv().await {
            Frame::Settings(_) => {}
            other => panic!("expected initial SETTINGS, got {:?}", other),
        }
        if config.flow_control_mode == FlowControlMode::StreamAndSession {
            match self.recv().await {
                Frame::WindowUpdate(w) => assert!(w.stream_id().is_zero()),
                other => panic!("expected session WINDOW_UPDATE, got {:?}", other),
            }
        }
    }

    /// Forces a full round trip through the session's single-threaded
    /// select loop: a peer-originated PING is always dispatched strictly
    /// after any frame sent ahead of it, and its echo is only written
    /// once that dispatch has completed, so seeing the echo back proves
    /// every earlier `send` has already been processed.
    async fn barrier(&mut self, id: u32) {
        self.send(Frame::Ping(Ping::new(id))).await;
        loop {
            match self.recv().await {
                Frame::Ping(p) if p.id() == id => break,
                _ => continue,
            }
        }
    }
}

fn test_config() -> SessionConfig {
    Builder::new().version(Version::V3_1).build()
}

fn open_session(
    config: SessionConfig,
) -> (session::SessionHandle, tokio::task::JoinHandle<Result<(), spdy_session::Error>>, Peer) {
    let (client_side, peer_side) = tokio::io::duplex(64 * 1024);
    let (handle, session) = session::open(
        client_side,
        HOST,
        config,
        Arc::new(NoPool),
        Arc::new(NoProperties),
        Arc::new(NoEvents),
        Arc::new(PlaintextSsl { host: HOST.to_string() }),
    );
    let join = tokio::spawn(session.run());
    let peer = Peer { framed: Framed::new(peer_side, FrameCodec::new(Version::V3_1)) };
    (handle, join, peer)
}

fn url(path: &str) -> String {
    format!("https://{}{}", HOST, path)
}

#[tokio::test]
async fn basic_request_reply_and_data() {
    let config = test_config();
    let (handle, _join, mut peer) = open_session(config.clone());
    peer.drain_handshake(&config).await;

    let mut stream = handle
        .create_stream(CreateStreamRequest { url: url("/index"), priority: 0, kind: StreamKind::Bidirectional })
        .await
        .expect("create_stream should succeed");

    let syn = match peer.recv().await {
        Frame::SynStream(f) => f,
        other => panic!("expected SYN_STREAM, got {:?}", other),
    };
    assert_eq!(syn.stream_id(), StreamId::from(1));
    assert!(!syn.is_push());
    let pairs = header_block::decode(syn.header_block()).unwrap();
    assert_eq!(header_block::find(&pairs, ":path").map(|v| v.as_ref()), Some(&b"/index"[..]));

    let reply_headers = header_block::encode(&[(b":status", b"200"), (b":version", b"HTTP/1.1")]);
    peer.send(Frame::SynReply(SynReply::new(syn.stream_id(), false, reply_headers))).await;

    match stream.recv_event().await {
        Some(StreamEvent::Reply { headers }) => {
            assert_eq!(header_block::find(&headers, ":status").map(|v| v.as_ref()), Some(&b"200"[..]));
        }
        other => panic!("expected Reply event, got {:?}", other),
    }

    peer.send(Frame::Data(spdy_session::frame::Data::new(syn.stream_id(), Bytes::from_static(b"hello"), true)))
        .await;

    match stream.recv_event().await {
        Some(StreamEvent::Data { chunk, end_of_stream }) => {
            assert_eq!(chunk, Bytes::from_static(b"hello"));
            assert!(end_of_stream);
        }
        other => panic!("expected Data event, got {:?}", other),
    }
}

#[tokio::test]
async fn send_stalls_on_exhausted_window_and_resumes_on_window_update() {
    let config = Builder::new()
        .version(Version::V3_1)
        .flow_control_mode(FlowControlMode::StreamOnly)
        .stream_initial_window_size(8)
        .build();
    let (handle, _join, mut peer) = open_session(config.clone());
    peer.drain_handshake(&config).await;

    let stream = handle
        .create_stream(CreateStreamRequest { url: url("/upload"), priority: 0, kind: StreamKind::Bidirectional })
        .await
        .unwrap();

    let syn = match peer.recv().await {
        Frame::SynStream(f) => f,
        other => panic!("expected SYN_STREAM, got {:?}", other),
    };
    let id = syn.stream_id();

    stream.send_data(Bytes::from(vec![b'a'; 20]), true).await.unwrap();

    let first = match peer.recv().await {
        Frame::Data(f) => f,
        other => panic!("expected DATA, got {:?}", other),
    };
    assert_eq!(first.payload().len(), 8);
    assert!(!first.is_end_stream(), "only part of the body fit in the window");

    peer.send(Frame::WindowUpdate(WindowUpdate::new(id, 100))).await;

    let second = match peer.recv().await {
        Frame::Data(f) => f,
        other => panic!("expected DATA after WINDOW_UPDATE, got {:?}", other),
    };
    assert_eq!(second.payload().len(), 12);
    assert!(second.is_end_stream());
}

#[tokio::test]
async fn claims_a_push_associated_with_an_active_stream() {
    let config = test_config();
    let (handle, _join, mut peer) = open_session(config.clone());
    peer.drain_handshake(&config).await;

    let _primary = handle
        .create_stream(CreateStreamRequest { url: url("/"), priority: 0, kind: StreamKind::Bidirectional })
        .await
        .unwrap();
    let primary_id = match peer.recv().await {
        Frame::SynStream(f) => f.stream_id(),
        other => panic!("expected SYN_STREAM, got {:?}", other),
    };

    let push_headers = header_block::encode(&[
        (b":scheme", b"https"),
        (b":host", HOST.as_bytes()),
        (b":path", b"/style.css"),
    ]);
    peer.send(Frame::SynStream(SynStream::new(StreamId::from(2), primary_id, 0, false, push_headers)))
        .await;

    peer.barrier(2).await;

    let claimed = handle.claim_pushed(url("/style.css")).await;
    assert!(claimed.is_some(), "push should be claimable once its SYN_STREAM has been processed");
    assert_eq!(claimed.unwrap().id(), StreamId::from(2));

    assert!(handle.claim_pushed(url("/style.css")).await.is_none(), "a claimed push cannot be claimed twice");
}

#[tokio::test]
async fn cross_origin_push_is_refused() {
    let config = test_config();
    let (handle, _join, mut peer) = open_session(config.clone());
    peer.drain_handshake(&config).await;

    let _primary = handle
        .create_stream(CreateStreamRequest { url: url("/"), priority: 0, kind: StreamKind::Bidirectional })
        .await
        .unwrap();
    let primary_id = match peer.recv().await {
        Frame::SynStream(f) => f.stream_id(),
        other => panic!("expected SYN_STREAM, got {:?}", other),
    };

    let push_headers = header_block::encode(&[
        (b":scheme", b"https"),
        (b":host", b"attacker.example"),
        (b":path", b"/evil.js"),
    ]);
    peer.send(Frame::SynStream(SynStream::new(StreamId::from(2), primary_id, 0, false, push_headers)))
        .await;

    match peer.recv().await {
        Frame::RstStream(f) => {
            assert_eq!(f.stream_id(), StreamId::from(2));
            assert_eq!(f.reason(), Reason::RefusedStream);
        }
        other => panic!("expected RST_STREAM(REFUSED_STREAM), got {:?}", other),
    }
}

#[tokio::test]
async fn push_promise_for_a_different_origin_is_also_refused() {
    let config = test_config();
    let (handle, _join, mut peer) = open_session(config.clone());
    peer.drain_handshake(&config).await;

    let _primary = handle
        .create_stream(CreateStreamRequest { url: url("/"), priority: 0, kind: StreamKind::Bidirectional })
        .await
        .unwrap();
    let primary_id = match peer.recv().await {
        Frame::SynStream(f) => f.stream_id(),
        other => panic!("expected SYN_STREAM, got {:?}", other),
    };

    let push_headers = header_block::encode(&[
        (b":scheme", b"https"),
        (b":host", b"attacker.example"),
        (b":path", b"/evil.js"),
    ]);
    peer.send(Frame::PushPromise(PushPromise::new(primary_id, StreamId::from(2), push_headers))).await;

    match peer.recv().await {
        Frame::RstStream(f) => {
            assert_eq!(f.stream_id(), StreamId::from(2));
            assert_eq!(f.reason(), Reason::RefusedStream);
        }
        other => panic!("expected RST_STREAM(REFUSED_STREAM), got {:?}", other),
    }
}

#[tokio::test]
async fn session_level_window_gates_data_across_streams() {
    let config = Builder::new()
        .version(Version::V3_1)
        .flow_control_mode(FlowControlMode::StreamAndSession)
        .session_initial_window_size(8)
        .stream_initial_window_size(1024)
        .build();
    let (handle, _join, mut peer) = open_session(config.clone());
    peer.drain_handshake(&config).await;

    let stream = handle
        .create_stream(CreateStreamRequest { url: url("/big"), priority: 0, kind: StreamKind::Bidirectional })
        .await
        .unwrap();
    let id = match peer.recv().await {
        Frame::SynStream(f) => f.stream_id(),
        other => panic!("expected SYN_STREAM, got {:?}", other),
    };

    stream.send_data(Bytes::from(vec![b'b'; 30]), true).await.unwrap();

    let first = match peer.recv().await {
        Frame::Data(f) => f,
        other => panic!("expected DATA, got {:?}", other),
    };
    assert_eq!(first.payload().len(), 8, "session window should cap the first write even though the stream window is large");

    peer.send(Frame::WindowUpdate(WindowUpdate::new(StreamId::zero(), 100))).await;

    let second = match peer.recv().await {
        Frame::Data(f) => f,
        other => panic!("expected DATA after session WINDOW_UPDATE, got {:?}", other),
    };
    assert_eq!(second.payload().len(), 22);
    assert!(second.is_end_stream());
    let _ = id;
}

#[tokio::test]
async fn goaway_aborts_streams_above_last_good_id_only() {
    let config = test_config();
    let (handle, _join, mut peer) = open_session(config.clone());
    peer.drain_handshake(&config).await;

    let mut survivor = handle
        .create_stream(CreateStreamRequest { url: url("/keep"), priority: 0, kind: StreamKind::Bidirectional })
        .await
        .unwrap();
    let survivor_id = match peer.recv().await {
        Frame::SynStream(f) => f.stream_id(),
        other => panic!("expected SYN_STREAM, got {:?}", other),
    };

    let mut doomed = handle
        .create_stream(CreateStreamRequest { url: url("/drop"), priority: 0, kind: StreamKind::Bidirectional })
        .await
        .unwrap();
    let _doomed_id = match peer.recv().await {
        Frame::SynStream(f) => f.stream_id(),
        other => panic!("expected SYN_STREAM, got {:?}", other),
    };

    peer.send(Frame::GoAway(GoAway::new(survivor_id, Reason::Ok))).await;
    peer.barrier(2).await;

    match doomed.recv_event().await {
        Some(StreamEvent::Closed { .. }) => {}
        other => panic!("expected the stream above last_good_stream_id to close, got {:?}", other),
    }

    let reply_headers = header_block::encode(&[(b":status", b"200")]);
    peer.send(Frame::SynReply(SynReply::new(survivor_id, true, reply_headers))).await;
    match survivor.recv_event().await {
        Some(StreamEvent::Reply { .. }) => {}
        other => panic!("surviving stream should still receive events after GOAWAY, got {:?}", other),
    }
}

#[tokio::test]
async fn rst_stream_closes_the_stream_and_delivers_the_reason() {
    let config = test_config();
    let (handle, _join, mut peer) = open_session(config.clone());
    peer.drain_handshake(&config).await;

    let mut stream = handle
        .create_stream(CreateStreamRequest { url: url("/canceled"), priority: 0, kind: StreamKind::Bidirectional })
        .await
        .unwrap();
    let id = match peer.recv().await {
        Frame::SynStream(f) => f.stream_id(),
        other => panic!("expected SYN_STREAM, got {:?}", other),
    };

    peer.send(Frame::RstStream(RstStream::new(id, Reason::RefusedStream))).await;

    match stream.recv_event().await {
        Some(StreamEvent::Closed { reason: Some(Reason::RefusedStream), retryable: true }) => {}
        other => panic!("expected Closed{{RefusedStream}}, got {:?}", other),
    }
}
