// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persistent zlib inflate streams for Tight and ZRLE decoding.
//!
//! Per RFC 6143 both encodings rely on long-lived zlib streams whose
//! dictionaries span rectangles and update messages: Tight maintains four
//! independent streams selected per rectangle, ZRLE a single stream for
//! the whole connection. Streams are initialized lazily, survive until the
//! session resets, and a Tight stream is reinitialized only when a Tight
//! control byte sets its reset flag.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{Result, VncError};

/// The pool of inflate contexts owned by a session.
#[derive(Debug, Default)]
pub struct InflateStreams {
    /// Four Tight streams, indexed by the control byte's stream id.
    tight: [Option<Decompress>; 4],
    /// The single ZRLE stream.
    zrle: Option<Decompress>,
}

impl InflateStreams {
    /// Create a pool with no streams initialized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down every stream. Called when the session resets.
    pub fn reset(&mut self) {
        self.tight = [None, None, None, None];
        self.zrle = None;
    }

    /// Reinitialize one Tight stream (control-byte reset flag).
    pub fn reset_tight(&mut self, stream_id: usize) {
        self.tight[stream_id] = None;
    }

    /// The Tight stream for `stream_id` (0-3), initialized on first use.
    ///
    /// The dictionary state persists across calls; resetting it mid-stream
    /// would desynchronize decompression of subsequent rectangles.
    pub fn tight(&mut self, stream_id: usize) -> &mut Decompress {
        self.tight[stream_id].get_or_insert_with(|| Decompress::new(true))
    }

    /// The ZRLE stream, initialized on first use.
    pub fn zrle(&mut self) -> &mut Decompress {
        self.zrle.get_or_insert_with(|| Decompress::new(true))
    }
}

/// Inflate `input` expecting exactly `expected` bytes of output.
///
/// Used by Tight, where the uncompressed body size is known from the
/// rectangle geometry. The stream's dictionary is left intact for the next
/// rectangle.
pub fn inflate_exact(z: &mut Decompress, input: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; expected];
    let mut written = 0usize;
    let mut remaining = input;

    while written < expected {
        let before_in = z.total_in();
        let before_out = z.total_out();
        let status = z
            .decompress(remaining, &mut out[written..], FlushDecompress::Sync)
            .map_err(|e| VncError::Decompression(e.to_string()))?;
        let consumed = (z.total_in() - before_in) as usize;
        let produced = (z.total_out() - before_out) as usize;
        remaining = &remaining[consumed..];
        written += produced;

        match status {
            Status::Ok | Status::StreamEnd => {
                if consumed == 0 && produced == 0 {
                    return Err(VncError::Decompression("inflate made no progress".into()));
                }
            }
            Status::BufError => {
                return Err(VncError::Decompression(format!(
                    "inflate produced {written} of {expected} expected bytes"
                )));
            }
        }
    }
    Ok(out)
}

/// Inflate one ZRLE chunk, producing however many bytes it decodes to.
///
/// ZRLE rectangles carry a compressed length but not an uncompressed one,
/// so output grows as needed. A `BufError` here simply means the stream
/// needs input that belongs to a later rectangle; what was produced so far
/// is returned.
pub fn inflate_chunk(z: &mut Decompress, input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut remaining = input;

    while !remaining.is_empty() {
        let before_in = z.total_in();
        let before_out = z.total_out();
        let status = z
            .decompress(remaining, &mut chunk, FlushDecompress::Sync)
            .map_err(|e| VncError::Decompression(e.to_string()))?;
        let consumed = (z.total_in() - before_in) as usize;
        let produced = (z.total_out() - before_out) as usize;
        out.extend_from_slice(&chunk[..produced]);
        remaining = &remaining[consumed..];

        if consumed == 0 && produced == 0 {
            match status {
                Status::BufError => break,
                _ => return Err(VncError::Decompression("inflate made no progress".into())),
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compress, Compression, FlushCompress};

    fn deflate(c: &mut Compress, data: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; data.len() + 128];
        let before = c.total_out();
        c.compress(data, &mut out, FlushCompress::Sync).unwrap();
        out.truncate((c.total_out() - before) as usize);
        out
    }

    #[test]
    fn inflate_exact_round_trip() {
        let mut c = Compress::new(Compression::default(), true);
        let data = vec![7u8; 1000];
        let compressed = deflate(&mut c, &data);

        let mut z = Decompress::new(true);
        let out = inflate_exact(&mut z, &compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn dictionary_persists_across_chunks() {
        // Two sync-flushed chunks from one deflate stream only decode if the
        // inflate side keeps its dictionary between them.
        let mut c = Compress::new(Compression::default(), true);
        let first = deflate(&mut c, b"the quick brown fox jumps over the lazy dog");
        let second = deflate(&mut c, b"the quick brown fox again");

        let mut z = Decompress::new(true);
        let a = inflate_chunk(&mut z, &first).unwrap();
        let b = inflate_chunk(&mut z, &second).unwrap();
        assert_eq!(a, b"the quick brown fox jumps over the lazy dog");
        assert_eq!(b, b"the quick brown fox again");
    }

    #[test]
    fn fresh_stream_rejects_continuation_data() {
        let mut c = Compress::new(Compression::default(), true);
        let _first = deflate(&mut c, b"aaaaaaaaaaaaaaaaaaaaaaaa");
        let second = deflate(&mut c, b"aaaaaaaabbbbbbbb");

        // A brand-new inflate stream sees continuation data without the
        // first chunk's header and dictionary; it must not reproduce the
        // original bytes.
        let mut z = Decompress::new(true);
        match inflate_chunk(&mut z, &second) {
            Ok(out) => assert_ne!(out, b"aaaaaaaabbbbbbbb"),
            Err(_) => {}
        }
    }

    #[test]
    fn pool_reset_discards_streams() {
        let mut pool = InflateStreams::new();
        let mut c = Compress::new(Compression::default(), true);
        let chunk = deflate(&mut c, b"hello hello hello");
        inflate_chunk(pool.zrle(), &chunk).unwrap();
        pool.reset();
        assert!(pool.zrle.is_none());
    }
}
