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

//! ZRLE encoding decoder.
//!
//! A ZRLE rectangle is a u32 length followed by that many bytes of zlib
//! data, inflated through the connection's single persistent ZRLE stream
//! (the dictionary spans rectangles and updates). The decompressed output
//! is a sequence of 64x64 tiles in row-major order, each starting with a
//! subencoding byte:
//!
//! - `0`: raw CPIXELs in scan order
//! - `1`: solid tile, one CPIXEL
//! - `2..=16`: packed palette, indices at 1/2/4 bits, rows byte-padded
//! - `128`: plain RLE of (CPIXEL, run) pairs
//! - `130..=255`: palette RLE over `subencoding - 128` entries
//! - `17..=127`, `129`: reserved, never sent by a correct server
//!
//! The decode unit is the whole compressed blob; nothing is consumed until
//! the complete rectangle payload is buffered.

use log::warn;

use crate::decoding::zstream::{inflate_chunk, InflateStreams};
use crate::decoding::Progress;
use crate::error::{Result, VncError};
use crate::framebuffer::Framebuffer;
use crate::pixel_format::PixelFormat;
use crate::protocol::Rectangle;
use crate::stream::StreamBuffer;

/// ZRLE tile edge length.
const TILE_SIZE: usize = 64;

/// Reader over the decompressed tile data.
struct TileReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TileReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8> {
        let byte = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| VncError::Decompression("truncated ZRLE tile data".into()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let slice = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or_else(|| VncError::Decompression("truncated ZRLE tile data".into()))?;
        self.pos += n;
        Ok(slice)
    }

    /// RLE run length: a chain of bytes each adding its value, terminated
    /// by the first byte below 255; the run is the sum plus one.
    fn run_length(&mut self) -> Result<usize> {
        let mut length = 0usize;
        loop {
            let byte = self.u8()?;
            length += usize::from(byte);
            if byte != 255 {
                break;
            }
        }
        Ok(length + 1)
    }

    fn cpixel(&mut self, format: &PixelFormat) -> Result<u32> {
        let bytes = self.take(format.compact_pixel_len())?;
        Ok(format.compact_pixel(bytes))
    }
}

/// Decode one ZRLE rectangle into the framebuffer.
pub fn decode(
    stream: &mut StreamBuffer,
    rect: &Rectangle,
    format: &PixelFormat,
    fb: &mut Framebuffer,
    streams: &mut InflateStreams,
) -> Result<Progress> {
    let compressed_len = match stream.peek_u32_at(0) {
        Some(len) => len as usize,
        None => return Ok(Progress::NeedMore),
    };
    if stream.available() < 4 + compressed_len {
        return Ok(Progress::NeedMore);
    }
    stream.skip(4);
    if compressed_len == 0 {
        return Ok(Progress::Complete);
    }
    let compressed = stream.take_vec(compressed_len);

    let data = inflate_chunk(streams.zrle(), &compressed)?;
    decode_tiles(&data, rect, format, fb)?;
    Ok(Progress::Complete)
}

/// Walk the decompressed payload tile by tile.
fn decode_tiles(
    data: &[u8],
    rect: &Rectangle,
    format: &PixelFormat,
    fb: &mut Framebuffer,
) -> Result<()> {
    let w = usize::from(rect.width);
    let h = usize::from(rect.height);
    let mut reader = TileReader::new(data);

    let mut ty = 0;
    while ty < h {
        let th = TILE_SIZE.min(h - ty);
        let mut tx = 0;
        while tx < w {
            let tw = TILE_SIZE.min(w - tx);
            let origin_x = usize::from(rect.x) + tx;
            let origin_y = usize::from(rect.y) + ty;

            let sub = reader.u8()?;
            match sub {
                0 => {
                    for y in 0..th {
                        for x in 0..tw {
                            let pixel = reader.cpixel(format)?;
                            fb.set_pixel(origin_x + x, origin_y + y, format.rgb8(pixel));
                        }
                    }
                }
                1 => {
                    let pixel = reader.cpixel(format)?;
                    fb.fill_rect(origin_x, origin_y, tw, th, format.rgb8(pixel));
                }
                2..=16 => {
                    let palette = read_palette(&mut reader, format, usize::from(sub))?;
                    decode_packed(&mut reader, &palette, tw, th, origin_x, origin_y, fb)?;
                }
                128 => {
                    let total = tw * th;
                    let mut count = 0;
                    while count < total {
                        let pixel = reader.cpixel(format)?;
                        let rgb = format.rgb8(pixel);
                        let run = reader.run_length()?.min(total - count);
                        for _ in 0..run {
                            fb.set_pixel(origin_x + count % tw, origin_y + count / tw, rgb);
                            count += 1;
                        }
                    }
                }
                130..=255 => {
                    let palette = read_palette(&mut reader, format, usize::from(sub) - 128)?;
                    let total = tw * th;
                    let mut count = 0;
                    while count < total {
                        let index_byte = reader.u8()?;
                        let run = if index_byte & 0x80 != 0 {
                            reader.run_length()?.min(total - count)
                        } else {
                            1
                        };
                        let rgb = palette
                            .get(usize::from(index_byte & 0x7F))
                            .copied()
                            .unwrap_or((0, 0, 0));
                        for _ in 0..run {
                            fb.set_pixel(origin_x + count % tw, origin_y + count / tw, rgb);
                            count += 1;
                        }
                    }
                }
                reserved => {
                    // 17..=127 and 129 are reserved; a well-formed stream
                    // never contains them and there is no way to resync.
                    warn!("reserved ZRLE subencoding {reserved}, skipping tile");
                }
            }

            tx += TILE_SIZE;
        }
        ty += TILE_SIZE;
    }
    Ok(())
}

/// Read a palette of `size` CPIXELs, pre-converted to RGB.
fn read_palette(
    reader: &mut TileReader<'_>,
    format: &PixelFormat,
    size: usize,
) -> Result<Vec<(u8, u8, u8)>> {
    let mut palette = Vec::with_capacity(size);
    for _ in 0..size {
        let pixel = reader.cpixel(format)?;
        palette.push(format.rgb8(pixel));
    }
    Ok(palette)
}

/// Decode a packed-palette tile: indices at 1, 2 or 4 bits, packed
/// MSB-first, each row padded to a whole byte.
fn decode_packed(
    reader: &mut TileReader<'_>,
    palette: &[(u8, u8, u8)],
    tw: usize,
    th: usize,
    origin_x: usize,
    origin_y: usize,
    fb: &mut Framebuffer,
) -> Result<()> {
    let bits: u32 = match palette.len() {
        2 => 1,
        3..=4 => 2,
        _ => 4,
    };

    for y in 0..th {
        let mut byte = 0u8;
        let mut bits_left = 0u32;
        for x in 0..tw {
            if bits_left == 0 {
                byte = reader.u8()?;
                bits_left = 8;
            }
            let index = usize::from(byte >> (8 - bits));
            byte <<= bits;
            bits_left -= bits;
            let rgb = palette.get(index).copied().unwrap_or((0, 0, 0));
            fb.set_pixel(origin_x + x, origin_y + y, rgb);
        }
    }
    Ok(())
}
