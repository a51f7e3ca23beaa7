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

//! Pixel format parsing and conversion for the RFB protocol.
//!
//! The RFB spec encodes pixel format as a fixed 16-byte structure sent by
//! the server in `ServerInit` and echoed back by the client in
//! `SetPixelFormat`. This module handles the wire codec plus the conversion
//! from packed integer pixels to canonical RGB triples, which every
//! rectangle decoder goes through.

use bytes::{BufMut, BytesMut};

use crate::stream::StreamBuffer;

/// Size of a pixel format on the wire (including 3 padding bytes).
pub const PIXEL_FORMAT_LEN: usize = 16;

/// RFB pixel format (16 bytes on the wire).
///
/// Invariant: the per-channel maxima are power-of-two-minus-one masks, so a
/// channel value is `(pixel >> shift) & max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    /// Bits per pixel on the wire (8, 16, 24 or 32).
    pub bits_per_pixel: u8,
    /// Colour depth in significant bits.
    pub depth: u8,
    /// True if multi-byte pixels arrive big-endian.
    pub big_endian: bool,
    /// True for true-colour formats (the only kind this client supports).
    pub true_colour: bool,
    /// Maximum red value (mask).
    pub red_max: u16,
    /// Maximum green value (mask).
    pub green_max: u16,
    /// Maximum blue value (mask).
    pub blue_max: u16,
    /// Bit shift of the red channel within a pixel.
    pub red_shift: u8,
    /// Bit shift of the green channel within a pixel.
    pub green_shift: u8,
    /// Bit shift of the blue channel within a pixel.
    pub blue_shift: u8,
}

impl PixelFormat {
    /// 32-bit little-endian RGB888, a common server default.
    pub const RGB888: Self = Self {
        bits_per_pixel: 32,
        depth: 24,
        big_endian: false,
        true_colour: true,
        red_max: 255,
        green_max: 255,
        blue_max: 255,
        red_shift: 16,
        green_shift: 8,
        blue_shift: 0,
    };

    /// Consume a 16-byte pixel format from the stream.
    ///
    /// The caller must have verified that [`PIXEL_FORMAT_LEN`] bytes are
    /// available.
    pub fn read_from(stream: &mut StreamBuffer) -> Self {
        let bits_per_pixel = stream.get_u8();
        let depth = stream.get_u8();
        let big_endian = stream.get_u8() != 0;
        let true_colour = stream.get_u8() != 0;
        let red_max = stream.get_u16();
        let green_max = stream.get_u16();
        let blue_max = stream.get_u16();
        let red_shift = stream.get_u8();
        let green_shift = stream.get_u8();
        let blue_shift = stream.get_u8();
        stream.skip(3); // padding

        Self {
            bits_per_pixel,
            depth,
            big_endian,
            true_colour,
            red_max,
            green_max,
            blue_max,
            red_shift,
            green_shift,
            blue_shift,
        }
    }

    /// Append the 16-byte wire form to a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.bits_per_pixel);
        buf.put_u8(self.depth);
        buf.put_u8(u8::from(self.big_endian));
        buf.put_u8(u8::from(self.true_colour));
        buf.put_u16(self.red_max);
        buf.put_u16(self.green_max);
        buf.put_u16(self.blue_max);
        buf.put_u8(self.red_shift);
        buf.put_u8(self.green_shift);
        buf.put_u8(self.blue_shift);
        buf.put_bytes(0, 3); // padding
    }

    /// Bytes per pixel on the wire.
    pub const fn bytes_per_pixel(&self) -> usize {
        (self.bits_per_pixel as usize + 7) / 8
    }

    /// Assemble a raw pixel value from `bytes_per_pixel()` wire bytes,
    /// honouring the declared endianness.
    pub fn read_pixel(&self, bytes: &[u8]) -> u32 {
        match self.bytes_per_pixel() {
            1 => u32::from(bytes[0]),
            2 => {
                if self.big_endian {
                    u32::from(u16::from_be_bytes([bytes[0], bytes[1]]))
                } else {
                    u32::from(u16::from_le_bytes([bytes[0], bytes[1]]))
                }
            }
            3 => {
                if self.big_endian {
                    (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2])
                } else {
                    u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16)
                }
            }
            _ => {
                if self.big_endian {
                    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                } else {
                    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                }
            }
        }
    }

    /// Extract the raw (unscaled) channel values from a packed pixel.
    pub fn split_pixel(&self, pixel: u32) -> (u16, u16, u16) {
        let r = ((pixel >> self.red_shift) & u32::from(self.red_max)) as u16;
        let g = ((pixel >> self.green_shift) & u32::from(self.green_max)) as u16;
        let b = ((pixel >> self.blue_shift) & u32::from(self.blue_max)) as u16;
        (r, g, b)
    }

    /// Convert a packed pixel to 8-bit-per-channel RGB, scaling each channel
    /// up by its maximum.
    #[allow(clippy::cast_possible_truncation)] // scaled values are <= 255 by construction
    pub fn rgb8(&self, pixel: u32) -> (u8, u8, u8) {
        let (r, g, b) = self.split_pixel(pixel);
        let scale = |value: u16, max: u16| -> u8 {
            if max == 0 {
                0
            } else {
                (u32::from(value) * 255 / u32::from(max)) as u8
            }
        };
        (
            scale(r, self.red_max),
            scale(g, self.green_max),
            scale(b, self.blue_max),
        )
    }

    /// Byte length of a CPIXEL/TPIXEL (the compact pixel form used by ZRLE
    /// and Tight).
    ///
    /// Three bytes when the format is 32bpp true-colour with all channel
    /// maxima fitting a byte; otherwise the natural `bits_per_pixel / 8`.
    pub fn compact_pixel_len(&self) -> usize {
        if self.bits_per_pixel == 32
            && self.true_colour
            && self.red_max <= 255
            && self.green_max <= 255
            && self.blue_max <= 255
        {
            3
        } else {
            self.bytes_per_pixel()
        }
    }

    /// Assemble a pixel value from a compact (CPIXEL/TPIXEL) byte sequence.
    ///
    /// For the 3-byte form the bytes are the non-padding lanes of the
    /// 32-bit pixel in the format's byte order; whether those are the low
    /// or high three bytes depends on where the channel shifts place them.
    pub fn compact_pixel(&self, bytes: &[u8]) -> u32 {
        if bytes.len() != 3 {
            return self.read_pixel(bytes);
        }
        let fits_low = self.red_shift <= 16 && self.green_shift <= 16 && self.blue_shift <= 16;
        let (b0, b1, b2) = (u32::from(bytes[0]), u32::from(bytes[1]), u32::from(bytes[2]));
        match (self.big_endian, fits_low) {
            (true, true) => (b0 << 16) | (b1 << 8) | b2,
            (true, false) => (b0 << 24) | (b1 << 16) | (b2 << 8),
            (false, true) => b0 | (b1 << 8) | (b2 << 16),
            (false, false) => (b0 << 8) | (b1 << 16) | (b2 << 24),
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::RGB888
    }
}
