//! The registry described in §4.5: the session's single source of truth
//! for every stream, keyed the several ways the session core needs to
//! find them — by arena handle, by wire id, by unclaimed push URL, and by
//! pending-create priority.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::error::Error;
use crate::frame::StreamId;
use crate::proto::{clamp_priority, Priority, PRIORITY_LEVELS};
use crate::session::StreamHandle;

use super::store::{Key, Store};
use super::stream::Stream;

/// A request to open a stream that could not be satisfied immediately
/// because the session is already at `max_concurrent_streams`. Queued by
/// priority and drained as capacity frees up (§4.6 `process_pending_stream_requests`).
/// Owns the caller's completion channel directly, so it is the one that
/// resolves it — whether by draining into a real stream or by failing it
/// on close, nobody else can complete this request out from under it.
pub struct PendingRequest {
    pub priority: Priority,
    pub url: String,
    pub kind: super::stream::StreamKind,
    pub respond: oneshot::Sender<Result<StreamHandle, Error>>,
}

struct PushedEntry {
    id: StreamId,
    created_at: Instant,
}

/// Owns the arena (`Store`) plus every auxiliary index §4.5 names:
/// unclaimed pushed streams by URL, pending create-stream requests by
/// priority, and the set of posted-but-undelivered completions.
pub struct Registry {
    store: Store,
    unclaimed_pushed: HashMap<String, PushedEntry>,
    pending: Vec<VecDeque<PendingRequest>>,
    stream_send_unstall_queue: Vec<VecDeque<Key>>,
}

impl Registry {
    pub fn new() -> Registry {
        let mut pending = Vec::with_capacity(PRIORITY_LEVELS);
        let mut unstall = Vec::with_capacity(PRIORITY_LEVELS);
        for _ in 0..PRIORITY_LEVELS {
            pending.push(VecDeque::new());
            unstall.push(VecDeque::new());
        }
        Registry {
            store: Store::new(),
            unclaimed_pushed: HashMap::new(),
            pending,
            stream_send_unstall_queue: unstall,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn insert_local(&mut self, stream: Stream) -> Key {
        self.store.insert_unidentified(stream)
    }

    /// Activates a locally-created stream once its SYN_STREAM has been
    /// dequeued and assigned `id`; the stream moves conceptually from
    /// `created_streams` to `active_streams`.
    pub fn activate(&mut self, key: Key, id: StreamId) {
        self.store.activate(key, id);
        if let Some(stream) = self.store.get_mut(key) {
            stream.activate(id);
        }
    }

    /// Inserts a server-initiated push stream, keyed both by its
    /// already-assigned id and by URL in the unclaimed map, per §4.3's
    /// invariant that every unclaimed entry names a live active stream.
    pub fn insert_push(&mut self, stream: Stream) -> Key {
        let id = stream.id();
        let url = stream.url().to_string();
        let key = self.store.insert_with_id(id, stream);
        self.unclaimed_pushed.insert(url, PushedEntry { id, created_at: Instant::now() });
        key
    }

    pub fn find_by_id(&self, id: StreamId) -> Option<Key> {
        self.store.find_by_id(id)
    }

    /// Claims a pushed stream for `url`, per §4.5: remove the unclaimed
    /// entry and return the live stream's key, or `None` if the maps have
    /// fallen out of sync (the entry named an id no longer in the arena —
    /// treated as a protocol bug rather than a panic, since it reaches
    /// across network input).
    pub fn claim_pushed(&mut self, url: &str) -> Option<Key> {
        let entry = self.unclaimed_pushed.remove(url)?;
        self.store.find_by_id(entry.id)
    }

    pub fn is_unclaimed(&self, url: &str) -> bool {
        self.unclaimed_pushed.contains_key(url)
    }

    /// Evicts unclaimed pushed streams older than `min_lifetime`, closing
    /// each one. Returns the keys closed so the caller can also drop them
    /// from the write queue and any other bookkeeping.
    pub fn sweep_expired_pushes(&mut self, min_lifetime: Duration) -> Vec<Key> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .unclaimed_pushed
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.created_at) >= min_lifetime)
            .map(|(url, _)| url.clone())
            .collect();

        let mut closed = Vec::new();
        for url in expired {
            if let Some(entry) = self.unclaimed_pushed.remove(&url) {
                if let Some(key) = self.store.find_by_id(entry.id) {
                    closed.push(key);
                }
            }
        }
        closed
    }

    /// Removes every trace of `key`: arena entry, id index (handled by
    /// `Store::remove`), and unclaimed-push entry if it is still present.
    pub fn remove(&mut self, key: Key) -> Option<Stream> {
        let stream = self.store.remove(key)?;
        if stream.kind() == super::stream::StreamKind::Push {
            self.unclaimed_pushed.retain(|_, entry| entry.id != stream.id());
        }
        for bucket in &mut self.stream_send_unstall_queue {
            bucket.retain(|k| *k != key);
        }
        Some(stream)
    }

    pub fn active_count(&self) -> usize {
        self.store.len()
    }

    pub fn push_pending(&mut self, req: PendingRequest) {
        let idx = clamp_priority(req.priority);
        self.pending[idx].push_back(req);
    }

    /// Drains pending requests highest-priority-first, invoking `accept`
    /// for each until it returns `false` (no more capacity) or the queues
    /// are dry. Mirrors `process_pending_stream_requests`: never called
    /// synchronously from within a stream-close callback by the session,
    /// only from the session's own post-close bookkeeping.
    pub fn drain_pending(&mut self, mut accept: impl FnMut(PendingRequest) -> bool) {
        'outer: for bucket in self.pending.iter_mut().rev() {
            while let Some(req) = bucket.pop_front() {
                if !accept(req) {
                    break 'outer;
                }
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.iter().map(VecDeque::len).sum()
    }

    /// Drains every pending create-stream request across all priorities,
    /// for a session-ending event (connection close, GOAWAY) that must
    /// fail every outstanding request rather than let it wait forever.
    pub fn take_all_pending(&mut self) -> Vec<PendingRequest> {
        self.pending.iter_mut().flat_map(|bucket| bucket.drain(..)).collect()
    }

    /// Clears `key`'s queued-for-unstall bookkeeping. Used when a stream is
    /// resumed by a path other than `drain_unstall_queue` (a direct
    /// WINDOW_UPDATE rather than a SETTINGS-wide raise), so a later sweep
    /// doesn't re-push a key that's already been handled.
    pub fn clear_unstall(&mut self, key: Key) {
        for bucket in &mut self.stream_send_unstall_queue {
            bucket.retain(|k| *k != key);
        }
        if let Some(stream) = self.store.get_mut(key) {
            stream.set_queued_for_unstall(false);
        }
    }

    /// Appends `key` to its priority's unstall queue, per §4.3: called
    /// when a stream's producer yields nothing because its send window is
    /// exhausted. No-op if already queued, so a stream stalled on
    /// multiple dequeues in a row isn't queued twice.
    pub fn queue_for_unstall(&mut self, priority: Priority, key: Key) {
        if let Some(stream) = self.store.get(key) {
            if stream.is_queued_for_unstall() {
                return;
            }
        }
        let idx = clamp_priority(priority);
        self.stream_send_unstall_queue[idx].push_back(key);
        if let Some(stream) = self.store.get_mut(key) {
            stream.set_queued_for_unstall(true);
        }
    }

    /// Drains the unstall queues highest-priority-first, per §4.3: called
    /// when the send window increases (a WINDOW_UPDATE or a SETTINGS
    /// initial-window raise). The caller re-enqueues each returned key
    /// into the write queue; whether it actually has anything to produce
    /// is decided at the next dequeue, not here.
    pub fn drain_unstall_queue(&mut self) -> Vec<Key> {
        let mut drained = Vec::new();
        for bucket in self.stream_send_unstall_queue.iter_mut().rev() {
            while let Some(key) = bucket.pop_front() {
                drained.push(key);
            }
        }
        for key in &drained {
            if let Some(stream) = self.store.get_mut(*key) {
                stream.set_queued_for_unstall(false);
            }
        }
        drained
    }

    pub fn iter_active_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.store.iter_keys()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::stream::{Stream, StreamKind};

    #[test]
    fn claiming_a_pushed_stream_removes_it_from_the_unclaimed_map() {
        let mut reg = Registry::new();
        let stream = Stream::new_push(StreamId::from(2), "https://h/x".into(), 0, 0);
        reg.insert_push(stream);

        assert!(reg.is_unclaimed("https://h/x"));
        let key = reg.claim_pushed("https://h/x").expect("should be claimable");
        assert!(!reg.is_unclaimed("https://h/x"));
        assert!(reg.store().get(key).is_some());
    }

    #[test]
    fn claiming_an_unknown_url_returns_none() {
        let mut reg = Registry::new();
        assert!(reg.claim_pushed("https://h/missing").is_none());
    }

    #[test]
    fn pending_requests_drain_high_priority_first() {
        let mut reg = Registry::new();
        let (low_tx, _low_rx) = oneshot::channel();
        let (high_tx, _high_rx) = oneshot::channel();
        reg.push_pending(PendingRequest { priority: 1, url: "/low".into(), kind: StreamKind::Bidirectional, respond: low_tx });
        reg.push_pending(PendingRequest { priority: 7, url: "/high".into(), kind: StreamKind::Bidirectional, respond: high_tx });

        let mut order = Vec::new();
        reg.drain_pending(|req| {
            order.push(req.url);
            true
        });
        assert_eq!(order, vec!["/high".to_string(), "/low".to_string()]);
    }

    #[test]
    fn removing_a_push_stream_clears_any_remaining_unclaimed_entry() {
        let mut reg = Registry::new();
        let stream = Stream::new_push(StreamId::from(2), "https://h/x".into(), 0, 0);
        let key = reg.insert_push(stream);
        reg.remove(key);
        assert!(!reg.is_unclaimed("https://h/x"));
    }
}
