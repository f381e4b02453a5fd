use std::collections::VecDeque;

use crate::frame::Frame;
use crate::streams::store::Key as StreamKey;

use super::{Priority, PRIORITY_LEVELS};

/// An entry in the write queue. `Ready` frames (SETTINGS, PING, GOAWAY,
/// session-level WINDOW_UPDATE, RST_STREAM) need no further state to
/// materialize and are emitted as-is. `Stream` entries are the "lazy
/// producer" idiom from the design notes: only a handle is enqueued, and
/// the owning stream is asked to produce its next frame (SYN_STREAM or a
/// DATA chunk) once it is actually dequeued, so the produced frame
/// reflects flow-control state at write time rather than enqueue time.
pub enum WriteItem {
    Ready(Frame),
    Stream(StreamKey),
}

/// A multi-priority FIFO. Dequeue always drains the highest non-empty
/// priority bucket first; within a bucket, FIFO order is preserved, which
/// is what gives the ordering guarantee in §5 ("for any single stream,
/// outbound frames are emitted in enqueue order").
pub struct WriteQueue {
    buckets: Vec<VecDeque<WriteItem>>,
    len: usize,
}

impl WriteQueue {
    pub fn new() -> WriteQueue {
        let mut buckets = Vec::with_capacity(PRIORITY_LEVELS);
        for _ in 0..PRIORITY_LEVELS {
            buckets.push(VecDeque::new());
        }
        WriteQueue { buckets, len: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Enqueues `item` at `priority`. Returns `true` if this was an
    /// empty-to-non-empty transition, the signal the session core uses to
    /// decide whether the write loop needs waking up.
    pub fn push(&mut self, priority: Priority, item: WriteItem) -> bool {
        let was_empty = self.is_empty();
        let idx = super::clamp_priority(priority);
        self.buckets[idx].push_back(item);
        self.len += 1;
        was_empty
    }

    /// Highest priority first, oldest-enqueued first within a priority.
    pub fn pop(&mut self) -> Option<WriteItem> {
        for bucket in self.buckets.iter_mut().rev() {
            if let Some(item) = bucket.pop_front() {
                self.len -= 1;
                return Some(item);
            }
        }
        None
    }

    /// Drops every queued write belonging to `stream`. Used when a stream
    /// closes locally (cancellation) so no stale producer is dequeued
    /// against a stream the registry no longer has.
    pub fn remove_stream(&mut self, stream: StreamKey) {
        for bucket in &mut self.buckets {
            let before = bucket.len();
            bucket.retain(|item| !matches!(item, WriteItem::Stream(k) if *k == stream));
            self.len -= before - bucket.len();
        }
    }

    /// Drops every queued write whose stream satisfies `pred`. Used by the
    /// session on GOAWAY to remove writes for every stream with an id
    /// greater than the peer's last-accepted id; the session (not this
    /// queue, which has no notion of stream ids) resolves the predicate
    /// against its registry.
    pub fn remove_streams_matching(&mut self, mut pred: impl FnMut(StreamKey) -> bool) {
        for bucket in &mut self.buckets {
            let before = bucket.len();
            bucket.retain(|item| match item {
                WriteItem::Stream(k) => !pred(*k),
                WriteItem::Ready(_) => true,
            });
            self.len -= before - bucket.len();
        }
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        WriteQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Ping, Frame as F};

    fn ready(id: u32) -> WriteItem {
        WriteItem::Ready(F::Ping(Ping::new(id)))
    }

    #[test]
    fn dequeues_high_priority_first() {
        let mut q = WriteQueue::new();
        q.push(1, ready(1));
        q.push(7, ready(2));
        q.push(1, ready(3));

        match q.pop().unwrap() {
            WriteItem::Ready(F::Ping(p)) => assert_eq!(p.id(), 2),
            _ => panic!("wrong order"),
        }
        match q.pop().unwrap() {
            WriteItem::Ready(F::Ping(p)) => assert_eq!(p.id(), 1),
            _ => panic!("fifo within a priority violated"),
        }
    }

    #[test]
    fn empty_to_non_empty_transition_is_reported() {
        let mut q = WriteQueue::new();
        assert!(q.push(0, ready(1)));
        assert!(!q.push(0, ready(2)));
    }

    #[test]
    fn priority_out_of_range_is_clamped() {
        let mut q = WriteQueue::new();
        q.push(255, ready(1));
        assert_eq!(q.len(), 1);
    }
}
