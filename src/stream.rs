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

//! Receive-side byte buffering with peek-then-consume semantics.
//!
//! Every parser in this crate follows one discipline: inspect the buffer
//! with [`StreamBuffer::available`] and [`StreamBuffer::peek`] until the
//! entire next logical unit is present, and only then consume it with the
//! `get_*` methods. A parser that cannot see its whole unit returns a
//! "need more" indication without touching the buffer, so that it can be
//! re-run verbatim when more bytes arrive.

use bytes::{Buf, BytesMut};

/// Buffered bytes received from the transport.
///
/// The transport adapter appends incoming data with [`extend`]; the
/// protocol state machine and the rectangle decoders consume it. Consuming
/// methods assume the caller has already checked [`available`]; they will
/// panic on underflow, which under the peek-then-consume discipline is a
/// programming error rather than a recoverable condition.
///
/// [`extend`]: StreamBuffer::extend
/// [`available`]: StreamBuffer::available
#[derive(Debug, Default)]
pub struct StreamBuffer {
    buf: BytesMut,
}

impl StreamBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Append bytes received from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed.
    pub fn available(&self) -> usize {
        self.buf.len()
    }

    /// Look at up to `n` buffered bytes without consuming them.
    pub fn peek(&self, n: usize) -> &[u8] {
        &self.buf[..n.min(self.buf.len())]
    }

    /// Peek a single byte at `offset`, if buffered.
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.buf.get(offset).copied()
    }

    /// Peek a big-endian u32 starting at `offset`, if fully buffered.
    pub fn peek_u32_at(&self, offset: usize) -> Option<u32> {
        let bytes = self.buf.get(offset..offset + 4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Consume one byte.
    pub fn get_u8(&mut self) -> u8 {
        self.buf.get_u8()
    }

    /// Consume a big-endian u16.
    pub fn get_u16(&mut self) -> u16 {
        self.buf.get_u16()
    }

    /// Consume a big-endian u32.
    pub fn get_u32(&mut self) -> u32 {
        self.buf.get_u32()
    }

    /// Consume a big-endian i32.
    pub fn get_i32(&mut self) -> i32 {
        self.buf.get_i32()
    }

    /// Consume exactly `out.len()` bytes into `out`.
    pub fn copy_to_slice(&mut self, out: &mut [u8]) {
        self.buf.copy_to_slice(out);
    }

    /// Consume `n` bytes into a fresh vector.
    pub fn take_vec(&mut self, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n];
        self.buf.copy_to_slice(&mut out);
        out
    }

    /// Discard `n` buffered bytes.
    pub fn skip(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Discard everything in the buffer.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let mut stream = StreamBuffer::new();
        stream.extend(&[1, 2, 3]);
        assert_eq!(stream.peek(2), &[1, 2]);
        assert_eq!(stream.peek(10), &[1, 2, 3]);
        assert_eq!(stream.available(), 3);
        assert_eq!(stream.peek_at(2), Some(3));
        assert_eq!(stream.peek_at(3), None);
    }

    #[test]
    fn peek_u32_at_offset() {
        let mut stream = StreamBuffer::new();
        stream.extend(&[0xff, 0x00, 0x00, 0x01, 0x02]);
        assert_eq!(stream.peek_u32_at(1), Some(0x0000_0102));
        assert_eq!(stream.peek_u32_at(2), None);
    }

    #[test]
    fn consuming_reads() {
        let mut stream = StreamBuffer::new();
        stream.extend(&[0x01, 0x00, 0x02, 0xff, 0xff, 0xff, 0xfc, 9, 9]);
        assert_eq!(stream.get_u8(), 1);
        assert_eq!(stream.get_u16(), 2);
        assert_eq!(stream.get_i32(), -4);
        assert_eq!(stream.take_vec(2), vec![9, 9]);
        assert_eq!(stream.available(), 0);
    }

    #[test]
    fn extend_accumulates_across_chunks() {
        let mut stream = StreamBuffer::new();
        stream.extend(&[0x12]);
        stream.extend(&[0x34]);
        assert_eq!(stream.get_u16(), 0x1234);
    }
}
