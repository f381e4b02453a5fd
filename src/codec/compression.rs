//! Streaming deflate contexts for header-block (de)compression. Each
//! direction of a session keeps exactly one context for its lifetime;
//! blocks are compressed/decompressed incrementally against the shared
//! dictionary, never fresh per frame (that is what makes the compression
//! effective across many small header blocks).

use bytes::{Bytes, BytesMut};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::config::Version;

use super::dictionary;

pub struct HeaderCompressor {
    inner: Compress,
}

impl HeaderCompressor {
    pub fn new(version: Version) -> HeaderCompressor {
        let mut inner = Compress::new(Compression::default(), true);
        let _ = inner.set_dictionary(dictionary::for_version(version));
        HeaderCompressor { inner }
    }

    pub fn compress(&mut self, input: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity(input.len() + 32);
        out.resize(out.capacity(), 0);

        let before_out = self.inner.total_out();
        let status = self
            .inner
            .compress(input, &mut out, FlushCompress::Sync)
            .expect("deflate compression is infallible for well-formed input");
        debug_assert_ne!(status, Status::BufError, "output buffer undersized");

        let produced = (self.inner.total_out() - before_out) as usize;
        out.truncate(produced);
        out.freeze()
    }
}

pub struct HeaderDecompressor {
    inner: Decompress,
    version: Version,
}

impl HeaderDecompressor {
    pub fn new(version: Version) -> HeaderDecompressor {
        HeaderDecompressor {
            inner: Decompress::new(true),
            version,
        }
    }

    /// Decompresses one header block. Failure here is session-fatal: the
    /// two deflate contexts have diverged and every subsequent header
    /// block on this connection would also fail.
    pub fn decompress(&mut self, input: &[u8]) -> Result<Bytes, DecompressionError> {
        let mut out = BytesMut::with_capacity(input.len() * 4 + 64);
        out.resize(out.capacity(), 0);

        loop {
            let before_in = self.inner.total_in() as usize;
            let before_out = self.inner.total_out() as usize;

            let status = self
                .inner
                .decompress(&input[before_in..], &mut out[before_out..], FlushDecompress::Sync);

            let status = match status {
                Ok(status) => status,
                Err(_) => {
                    // zlib asks for the preset dictionary on the first
                    // block of a dictionary-seeded stream; anything else is
                    // a genuine decoding failure.
                    if self.inner.set_dictionary(dictionary::for_version(self.version)).is_err() {
                        return Err(DecompressionError);
                    }
                    continue;
                }
            };

            let consumed_all = self.inner.total_in() as usize == input.len();

            match status {
                Status::StreamEnd => {
                    out.truncate(self.inner.total_out() as usize);
                    return Ok(out.freeze());
                }
                Status::Ok if consumed_all => {
                    out.truncate(self.inner.total_out() as usize);
                    return Ok(out.freeze());
                }
                Status::Ok | Status::BufError => {
                    let grow = out.len().max(256);
                    out.resize(out.len() + grow, 0);
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct DecompressionError;

impl std::fmt::Display for DecompressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "header block decompression failed")
    }
}

impl std::error::Error for DecompressionError {}
