//! Arena storage for active streams.
//!
//! The design notes call for replacing the source's weak self-references
//! and scoped reference counting with "an arena with integer handles for
//! streams plus a single owner for the session itself; all intra-session
//! references become handle lookups that return `None` when the stream
//! has been closed." `slab::Slab` plus this thin `Key` wrapper is exactly
//! that: a `Key` is Copy, cheap to stash in a priority bucket or a
//! `HashMap<StreamId, Key>`, and a lookup against a closed/removed stream
//! is just `None` rather than a dangling pointer.

use std::collections::HashMap;
use std::ops;

use slab::Slab;

use crate::frame::StreamId;

use super::stream::Stream;

/// A handle into the arena. Stable across insertions/removals of other
/// entries; invalidated only when the entry it names is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(usize);

/// Holds every stream the session currently knows about, indexed both by
/// arena slot (`Key`, O(1), used by priority buckets and push registries)
/// and by wire id (`StreamId`, used by frame dispatch). Streams with id 0
/// (not yet activated — see `Stream::CREATED`) live in the arena but are
/// absent from the id index; the registry tracks those separately.
#[derive(Debug, Default)]
pub struct Store {
    slab: Slab<Stream>,
    ids: HashMap<StreamId, Key>,
}

impl Store {
    pub fn new() -> Store {
        Store {
            slab: Slab::new(),
            ids: HashMap::new(),
        }
    }

    /// Inserts a stream that has not yet been assigned a wire id (the
    /// `created_streams` phase). Use `activate` once an id is assigned.
    pub fn insert_unidentified(&mut self, stream: Stream) -> Key {
        Key(self.slab.insert(stream))
    }

    /// Inserts a stream that already has a wire id (pushed streams, which
    /// are server-initiated and arrive with their id already set).
    pub fn insert_with_id(&mut self, id: StreamId, stream: Stream) -> Key {
        let key = Key(self.slab.insert(stream));
        self.ids.insert(id, key);
        key
    }

    /// Records that a previously-unidentified stream has been assigned
    /// `id` (first SYN_STREAM dequeued). The stream itself is not moved in
    /// the arena, only indexed.
    pub fn activate(&mut self, key: Key, id: StreamId) {
        self.ids.insert(id, key);
    }

    pub fn get(&self, key: Key) -> Option<&Stream> {
        self.slab.get(key.0)
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut Stream> {
        self.slab.get_mut(key.0)
    }

    pub fn find_by_id(&self, id: StreamId) -> Option<Key> {
        self.ids.get(&id).copied()
    }

    /// Removes a stream from the arena and the id index. Safe to call even
    /// if the stream was never assigned an id.
    pub fn remove(&mut self, key: Key) -> Option<Stream> {
        if !self.slab.contains(key.0) {
            return None;
        }
        let stream = self.slab.remove(key.0);
        if let Some(id) = stream.id_if_activated() {
            self.ids.remove(&id);
        }
        Some(stream)
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }

    pub fn iter_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.slab.iter().map(|(idx, _)| Key(idx))
    }
}

impl ops::Index<Key> for Store {
    type Output = Stream;

    fn index(&self, key: Key) -> &Stream {
        &self.slab[key.0]
    }
}

impl ops::IndexMut<Key> for Store {
    fn index_mut(&mut self, key: Key) -> &mut Stream {
        &mut self.slab[key.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::stream::{Stream, StreamKind};

    #[test]
    fn lookup_by_id_after_activation() {
        let mut store = Store::new();
        let key = store.insert_unidentified(Stream::new_local(StreamKind::Bidirectional, 3, "/x".into(), 0, 0));
        store.activate(key, StreamId::from(1));

        assert_eq!(store.find_by_id(StreamId::from(1)), Some(key));
        assert!(store.find_by_id(StreamId::from(3)).is_none());
    }

    #[test]
    fn removed_key_is_gone_from_both_indices() {
        let mut store = Store::new();
        let key = store.insert_with_id(StreamId::from(2), Stream::new_push(StreamId::from(2), "/y".into(), 0, 0));
        store.remove(key);

        assert!(store.get(key).is_none());
        assert!(store.find_by_id(StreamId::from(2)).is_none());
    }
}
