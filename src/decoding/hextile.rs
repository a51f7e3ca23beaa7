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

//! Hextile encoding decoder.
//!
//! Hextile divides a rectangle into 16x16 tiles (smaller at the edges),
//! processed in row-major order. Each tile starts with a subencoding
//! bitmask followed by an optional background pixel, foreground pixel and
//! subrectangle list. Background and foreground persist across tiles and
//! across rectangles within one update message.
//!
//! The decode unit is a whole tile: the subencoding byte (and the subrect
//! count behind it) is peeked first to compute the exact tile length, and
//! nothing is consumed until the full tile is buffered. On suspension the
//! tile coordinates are preserved in [`HextileState`].

use crate::decoding::Progress;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::pixel_format::PixelFormat;
use crate::protocol::Rectangle;
use crate::stream::StreamBuffer;

/// Subencoding bit: tile is raw pixel data; all other bits are ignored.
const RAW: u8 = 1;
/// Subencoding bit: a new background pixel precedes the tile body.
const BACKGROUND_SPECIFIED: u8 = 2;
/// Subencoding bit: a new foreground pixel follows the background.
const FOREGROUND_SPECIFIED: u8 = 4;
/// Subencoding bit: a subrect count and subrect list follow.
const ANY_SUBRECTS: u8 = 8;
/// Subencoding bit: each subrect carries its own pixel.
const SUBRECTS_COLOURED: u8 = 16;

/// Hextile tile edge length.
const TILE_SIZE: usize = 16;

/// Resumable Hextile decode state, held in the update cursor.
///
/// `tx`/`ty` are the pixel offsets of the next tile within the current
/// rectangle; the colours persist for the whole update message.
#[derive(Debug, Default, Clone, Copy)]
pub struct HextileState {
    /// X offset of the next tile within the rectangle.
    pub tx: usize,
    /// Y offset of the next tile within the rectangle.
    pub ty: usize,
    /// Current background pixel (raw, packed).
    pub background: u32,
    /// Current foreground pixel (raw, packed).
    pub foreground: u32,
}

impl HextileState {
    /// Rewind to the first tile of a new rectangle; colours carry over.
    pub fn start_rectangle(&mut self) {
        self.tx = 0;
        self.ty = 0;
    }

    /// Reset colours at the start of a new update message.
    pub fn start_update(&mut self) {
        *self = Self::default();
    }
}

/// Compute the exact byte length of the next tile, or `None` when not
/// enough bytes are buffered to determine it.
fn tile_len(stream: &StreamBuffer, tw: usize, th: usize, bpp: usize) -> Option<usize> {
    let sub = stream.peek_at(0)?;
    if sub & RAW != 0 {
        return Some(1 + tw * th * bpp);
    }
    let mut len = 1;
    if sub & BACKGROUND_SPECIFIED != 0 {
        len += bpp;
    }
    if sub & FOREGROUND_SPECIFIED != 0 {
        len += bpp;
    }
    if sub & ANY_SUBRECTS != 0 {
        let count = usize::from(stream.peek_at(len)?);
        let per_subrect = if sub & SUBRECTS_COLOURED != 0 { bpp + 2 } else { 2 };
        len += 1 + count * per_subrect;
    }
    Some(len)
}

/// Decode as much of a Hextile rectangle as the buffer allows.
pub fn decode(
    stream: &mut StreamBuffer,
    rect: &Rectangle,
    format: &PixelFormat,
    fb: &mut Framebuffer,
    state: &mut HextileState,
) -> Result<Progress> {
    let bpp = format.bytes_per_pixel();
    let w = usize::from(rect.width);
    let h = usize::from(rect.height);
    let mut bytes = [0u8; 4];

    while state.ty < h {
        let th = TILE_SIZE.min(h - state.ty);
        while state.tx < w {
            let tw = TILE_SIZE.min(w - state.tx);

            let needed = match tile_len(stream, tw, th, bpp) {
                Some(n) => n,
                None => return Ok(Progress::NeedMore),
            };
            if stream.available() < needed {
                return Ok(Progress::NeedMore);
            }

            let origin_x = usize::from(rect.x) + state.tx;
            let origin_y = usize::from(rect.y) + state.ty;
            let sub = stream.get_u8();

            if sub & RAW != 0 {
                for y in 0..th {
                    for x in 0..tw {
                        stream.copy_to_slice(&mut bytes[..bpp]);
                        let pixel = format.read_pixel(&bytes[..bpp]);
                        fb.set_pixel(origin_x + x, origin_y + y, format.rgb8(pixel));
                    }
                }
            } else {
                if sub & BACKGROUND_SPECIFIED != 0 {
                    stream.copy_to_slice(&mut bytes[..bpp]);
                    state.background = format.read_pixel(&bytes[..bpp]);
                }
                if sub & FOREGROUND_SPECIFIED != 0 {
                    stream.copy_to_slice(&mut bytes[..bpp]);
                    state.foreground = format.read_pixel(&bytes[..bpp]);
                }

                fb.fill_rect(origin_x, origin_y, tw, th, format.rgb8(state.background));

                if sub & ANY_SUBRECTS != 0 {
                    let count = stream.get_u8();
                    for _ in 0..count {
                        let pixel = if sub & SUBRECTS_COLOURED != 0 {
                            stream.copy_to_slice(&mut bytes[..bpp]);
                            format.read_pixel(&bytes[..bpp])
                        } else {
                            state.foreground
                        };
                        let xy = stream.get_u8();
                        let wh = stream.get_u8();
                        let sx = usize::from(xy >> 4);
                        let sy = usize::from(xy & 0x0F);
                        let sw = usize::from(wh >> 4) + 1;
                        let sh = usize::from(wh & 0x0F) + 1;

                        let rgb = format.rgb8(pixel);
                        for y in sy..(sy + sh).min(th) {
                            for x in sx..(sx + sw).min(tw) {
                                fb.set_pixel(origin_x + x, origin_y + y, rgb);
                            }
                        }
                    }
                }
            }

            state.tx += TILE_SIZE;
        }
        state.tx = 0;
        state.ty += TILE_SIZE;
    }
    Ok(Progress::Complete)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: u16, h: u16) -> Rectangle {
        Rectangle {
            x: 0,
            y: 0,
            width: w,
            height: h,
            encoding: 5,
        }
    }

    #[test]
    fn background_persists_into_flagless_tile() {
        // 32x16 rectangle: tile 0 sets a blue background, tile 1 has no
        // flags and must stay blue.
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(32, 16);
        let mut stream = StreamBuffer::new();
        stream.extend(&[BACKGROUND_SPECIFIED]);
        stream.extend(&[0xFF, 0x00, 0x00, 0x00]); // blue in little-endian RGB888
        stream.extend(&[0]); // tile 1: no flags

        let mut state = HextileState::default();
        state.start_update();
        let progress = decode(&mut stream, &rect(32, 16), &format, &mut fb, &mut state).unwrap();
        assert_eq!(progress, Progress::Complete);
        assert_eq!(fb.pixel(0, 0), Some(0xFF00_00FF));
        assert_eq!(fb.pixel(31, 15), Some(0xFF00_00FF));
    }

    #[test]
    fn suspends_between_tiles_and_resumes() {
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(32, 16);
        let mut stream = StreamBuffer::new();
        let mut state = HextileState::default();

        // Only tile 0 arrives.
        stream.extend(&[BACKGROUND_SPECIFIED, 0x00, 0xFF, 0x00, 0x00]);
        let progress = decode(&mut stream, &rect(32, 16), &format, &mut fb, &mut state).unwrap();
        assert_eq!(progress, Progress::NeedMore);
        assert_eq!((state.tx, state.ty), (16, 0));
        assert_eq!(stream.available(), 0);

        // Tile 1 arrives; decode resumes where it left off.
        stream.extend(&[0]);
        let progress = decode(&mut stream, &rect(32, 16), &format, &mut fb, &mut state).unwrap();
        assert_eq!(progress, Progress::Complete);
        assert_eq!(fb.pixel(20, 8), Some(0xFF00_FF00));
    }

    #[test]
    fn coloured_subrects_overwrite_background() {
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(16, 16);
        let mut stream = StreamBuffer::new();

        stream.extend(&[BACKGROUND_SPECIFIED | ANY_SUBRECTS | SUBRECTS_COLOURED]);
        stream.extend(&[0x00, 0x00, 0x00, 0x00]); // black background
        stream.extend(&[1]); // one subrect
        stream.extend(&[0x00, 0x00, 0xFF, 0x00]); // red pixel
        // x=2, y=3, w=4, h=2 -> xy = 0x23, wh = 0x31
        stream.extend(&[0x23, 0x31]);

        let mut state = HextileState::default();
        let progress = decode(&mut stream, &rect(16, 16), &format, &mut fb, &mut state).unwrap();
        assert_eq!(progress, Progress::Complete);
        assert_eq!(fb.pixel(2, 3), Some(0xFFFF_0000));
        assert_eq!(fb.pixel(5, 4), Some(0xFFFF_0000));
        assert_eq!(fb.pixel(6, 3), Some(0xFF00_0000));
        assert_eq!(fb.pixel(2, 5), Some(0xFF00_0000));
    }

    #[test]
    fn raw_tile_ignores_other_flags() {
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(1, 1);
        let mut stream = StreamBuffer::new();
        stream.extend(&[RAW | BACKGROUND_SPECIFIED]);
        stream.extend(&[0x12, 0x34, 0x56, 0x00]);

        let mut state = HextileState::default();
        let progress = decode(&mut stream, &rect(1, 1), &format, &mut fb, &mut state).unwrap();
        assert_eq!(progress, Progress::Complete);
        // Pixel 0x00563412 -> r=0x56, g=0x34, b=0x12.
        assert_eq!(fb.pixel(0, 0), Some(0xFF56_3412));
        assert_eq!(stream.available(), 0);
    }
}
