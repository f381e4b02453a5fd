//! The name/value block format carried (post-decompression) inside
//! SYN_STREAM, SYN_REPLY, HEADERS and PUSH_PROMISE payloads: a 32-bit
//! count followed by that many `(len, bytes, len, bytes)` name/value
//! pairs. Opaque to the framing layer proper; only the session interprets
//! specific names like `:path`/`:host`/`:scheme`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error;

pub fn encode(pairs: &[(&[u8], &[u8])]) -> Bytes {
    let mut out = BytesMut::with_capacity(4 + pairs.iter().map(|(n, v)| 8 + n.len() + v.len()).sum::<usize>());
    out.put_u32(pairs.len() as u32);
    for (name, value) in pairs {
        out.put_u32(name.len() as u32);
        out.extend_from_slice(name);
        out.put_u32(value.len() as u32);
        out.extend_from_slice(value);
    }
    out.freeze()
}

pub fn decode(block: &Bytes) -> Result<Vec<(Bytes, Bytes)>, Error> {
    if block.len() < 4 {
        return Err(Error);
    }
    let mut cursor = &block[..];
    let count = cursor.get_u32() as usize;
    let mut offset = 4;
    let mut pairs = Vec::with_capacity(count.min(256));

    for _ in 0..count {
        if offset + 4 > block.len() {
            return Err(Error);
        }
        let name_len = (&block[offset..offset + 4]).get_u32() as usize;
        offset += 4;
        if offset + name_len > block.len() {
            return Err(Error);
        }
        let name = block.slice(offset..offset + name_len);
        offset += name_len;

        if offset + 4 > block.len() {
            return Err(Error);
        }
        let value_len = (&block[offset..offset + 4]).get_u32() as usize;
        offset += 4;
        if offset + value_len > block.len() {
            return Err(Error);
        }
        let value = block.slice(offset..offset + value_len);
        offset += value_len;

        pairs.push((name, value));
    }

    Ok(pairs)
}

/// Looks up a single pseudo-header (`:path`, `:host`, `:scheme`, ...) by
/// exact name match. Used sparingly — the session only ever needs a
/// handful of named fields out of an inbound block, never the whole map.
pub fn find<'a>(pairs: &'a [(Bytes, Bytes)], name: &str) -> Option<&'a Bytes> {
    pairs.iter().find(|(n, _)| n.as_ref() == name.as_bytes()).map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_pairs() {
        let block = encode(&[(b":method", b"GET"), (b":path", b"/x")]);
        let pairs = decode(&block).unwrap();
        assert_eq!(find(&pairs, ":path").map(|v| v.as_ref()), Some(&b"/x"[..]));
    }

    #[test]
    fn truncated_block_is_rejected() {
        assert!(decode(&Bytes::from_static(&[0, 0, 0, 1])).is_err());
    }
}
