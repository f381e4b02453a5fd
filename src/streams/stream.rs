//! The stream state machine described in §4.4: one bidirectional request,
//! a request-only stream, or a server push, each owning its own windows,
//! outbound queue and terminal status.

use std::collections::VecDeque;
use std::time::Instant;

use bytes::Bytes;

use crate::error::{Error, Reason, SendError};
use crate::frame::StreamId;
use crate::proto::WindowSize;

use super::flow_control::{RecvWindow, SendWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Bidirectional,
    RequestOnly,
    Push,
}

/// Which side has already sent its end-of-stream marker while the other
/// side may still be sending. `HalfClosed(Local)` means we sent FIN and
/// are waiting on the peer; `HalfClosed(Remote)` means the peer sent FIN
/// and we may still be sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    OpenWaitingReply,
    Open,
    HalfClosed(Direction),
    Closed,
}

/// What a stream has ready to emit once it is dequeued from the write
/// queue. `Stream::produce` materializes exactly one of these per call —
/// never more, so the session can account for exactly one frame's worth
/// of window/priority bookkeeping per dequeue.
#[derive(Debug)]
pub enum Produce {
    SynStream { header_block: Bytes, end_of_stream: bool },
    Data { chunk: Bytes, end_of_stream: bool },
}

#[derive(Debug)]
struct PendingData {
    chunk: Bytes,
    end_of_stream: bool,
}

#[derive(Debug)]
pub struct Stream {
    kind: StreamKind,
    id: StreamId,
    activated: bool,
    priority: u8,
    url: String,
    state: State,
    send_window: SendWindow,
    recv_window: RecvWindow,
    waiting_for_syn_reply: bool,
    send_stalled: bool,
    queued_for_unstall: bool,
    pending_headers: Option<(Bytes, bool)>,
    pending_data: VecDeque<PendingData>,
    close_status: Option<Reason>,
    created_at: Instant,
}

impl Stream {
    pub fn new_local(kind: StreamKind, priority: u8, url: String, send_init: WindowSize, recv_init: WindowSize) -> Stream {
        Stream {
            kind,
            id: StreamId::zero(),
            activated: false,
            priority,
            url,
            state: State::Created,
            send_window: SendWindow::new(send_init),
            recv_window: RecvWindow::new(recv_init),
            waiting_for_syn_reply: false,
            send_stalled: false,
            queued_for_unstall: false,
            pending_headers: None,
            pending_data: VecDeque::new(),
            close_status: None,
            created_at: Instant::now(),
        }
    }

    /// Pushed streams arrive with their id already assigned by the peer.
    pub fn new_push(id: StreamId, url: String, send_init: WindowSize, recv_init: WindowSize) -> Stream {
        Stream {
            kind: StreamKind::Push,
            id,
            activated: true,
            priority: 0,
            url,
            state: State::Open,
            send_window: SendWindow::new(send_init),
            recv_window: RecvWindow::new(recv_init),
            waiting_for_syn_reply: false,
            send_stalled: false,
            queued_for_unstall: false,
            pending_headers: None,
            pending_data: VecDeque::new(),
            close_status: None,
            created_at: Instant::now(),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn id_if_activated(&self) -> Option<StreamId> {
        if self.activated {
            Some(self.id)
        } else {
            None
        }
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn close_status(&self) -> Option<Reason> {
        self.close_status
    }

    pub fn is_send_stalled(&self) -> bool {
        self.send_stalled
    }

    pub fn is_queued_for_unstall(&self) -> bool {
        self.queued_for_unstall
    }

    pub fn set_queued_for_unstall(&mut self, val: bool) {
        self.queued_for_unstall = val;
    }

    pub fn send_window(&self) -> WindowSize {
        self.send_window.window()
    }

    pub fn recv_window(&self) -> WindowSize {
        self.recv_window.window()
    }

    /// Called by the session once a SYN_STREAM it dequeued for this stream
    /// has been assigned a wire id; moves the stream out of its
    /// CREATED-with-id-0 phase.
    pub fn activate(&mut self, id: StreamId) {
        self.id = id;
        self.activated = true;
    }

    /// Queues the request headers to be sent as this stream's SYN_STREAM.
    /// `end_of_stream` is true for header-only (bodyless) requests.
    pub fn queue_headers(&mut self, header_block: Bytes, end_of_stream: bool) {
        self.pending_headers = Some((header_block, end_of_stream));
        self.waiting_for_syn_reply = true;
    }

    /// Queues a body chunk to be split into ≤`MAX_DATA_CHUNK` DATA frames
    /// as window capacity allows. `Err` if the local half is already
    /// marked end-of-stream — sending after FIN is caller misuse.
    pub fn send_data(&mut self, data: Bytes, end_of_stream: bool) -> Result<(), SendError> {
        if matches!(self.state, State::HalfClosed(Direction::Local) | State::Closed) {
            return Err(SendError::User(crate::error::UserError::StreamAlreadyClosed { local: true }));
        }

        const CHUNK: usize = crate::frame::MAX_DATA_CHUNK;
        if data.is_empty() {
            self.pending_data.push_back(PendingData {
                chunk: data,
                end_of_stream,
            });
            return Ok(());
        }

        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + CHUNK).min(data.len());
            let is_last = end == data.len();
            self.pending_data.push_back(PendingData {
                chunk: data.slice(offset..end),
                end_of_stream: end_of_stream && is_last,
            });
            offset = end;
        }
        Ok(())
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending_headers.is_some() || !self.pending_data.is_empty()
    }

    /// Materializes the next outbound frame for this stream, if any,
    /// honoring both the stream's own send window and an optional
    /// session-level budget (only present in `StreamAndSession` mode).
    /// Returns the number of bytes actually consumed from each window so
    /// the caller can update its own session-level accounting — the
    /// stream only ever updates its own window.
    pub fn produce(&mut self, session_budget: Option<WindowSize>) -> Option<Produce> {
        if let Some((header_block, end_of_stream)) = self.pending_headers.take() {
            self.state = State::OpenWaitingReply;
            return Some(Produce::SynStream {
                header_block,
                end_of_stream,
            });
        }

        let budget = match session_budget {
            Some(b) => self.send_window.window().min(b),
            None => self.send_window.window(),
        };

        if budget <= 0 {
            self.send_stalled = !self.pending_data.is_empty();
            return None;
        }

        let front = self.pending_data.front()?;
        let take = (front.chunk.len() as WindowSize).min(budget) as usize;

        if take == front.chunk.len() {
            let item = self.pending_data.pop_front().unwrap();
            self.send_window.send_data(item.chunk.len() as WindowSize);
            self.send_stalled = false;
            if item.end_of_stream {
                self.mark_local_fin();
            }
            Some(Produce::Data {
                chunk: item.chunk,
                end_of_stream: item.end_of_stream,
            })
        } else {
            let item = self.pending_data.front_mut().unwrap();
            let chunk = item.chunk.slice(0..take);
            item.chunk = item.chunk.slice(take..);
            self.send_window.send_data(take as WindowSize);
            self.send_stalled = true;
            Some(Produce::Data {
                chunk,
                end_of_stream: false,
            })
        }
    }

    fn mark_local_fin(&mut self) {
        self.state = match self.state {
            State::Open => State::HalfClosed(Direction::Local),
            State::HalfClosed(Direction::Remote) => State::Closed,
            other => other,
        };
    }

    pub fn mark_remote_fin(&mut self) {
        self.state = match self.state {
            State::Open => State::HalfClosed(Direction::Remote),
            State::OpenWaitingReply => State::HalfClosed(Direction::Remote),
            State::HalfClosed(Direction::Local) => State::Closed,
            other => other,
        };
    }

    pub fn is_waiting_for_syn_reply(&self) -> bool {
        self.waiting_for_syn_reply
    }

    pub fn clear_waiting_for_syn_reply(&mut self) {
        self.waiting_for_syn_reply = false;
        if self.state == State::OpenWaitingReply {
            self.state = State::Open;
        }
    }

    pub fn increase_send_window(&mut self, delta: WindowSize) -> Result<(), SendError> {
        self.send_window.increase(delta)
    }

    pub fn apply_initial_window_delta(&mut self, delta: i64) {
        self.send_window.apply_settings_delta(delta);
        if self.send_window.is_positive() {
            self.send_stalled = false;
        }
    }

    pub fn on_data_received(&mut self, size: WindowSize) -> Result<(), Reason> {
        self.recv_window.receive(size)
    }

    pub fn take_recv_window_update(&mut self, initial: WindowSize) -> Option<WindowSize> {
        self.recv_window.take_update(initial)
    }

    /// Terminal transition. Idempotent: calling this on an already-closed
    /// stream is a no-op so `on_close` semantics (invoked exactly once,
    /// §4.4) hold even if both a local cancel and an inbound RST race.
    pub fn close(&mut self, reason: Reason) -> bool {
        if self.state == State::Closed {
            return false;
        }
        self.state = State::Closed;
        self.close_status = Some(reason);
        true
    }

    pub fn to_error(&self) -> Option<Error> {
        self.close_status.map(Error::Stream)
    }
}
