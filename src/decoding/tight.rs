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

//! Tight encoding decoder.
//!
//! Every Tight rectangle starts with a control byte. The low nibble holds
//! per-stream reset flags for the four persistent zlib streams; the high
//! nibble selects the mode:
//!
//! - `0x8` **Fill**: one TPIXEL paints the whole rectangle.
//! - `0x9` **JPEG**: a compact length plus a JPEG image, decoded with the
//!   `image` crate and blitted at the rectangle origin.
//! - `0x0..=0x7` **Basic**: bits 0-1 select the zlib stream, bit 2 says a
//!   filter byte follows (Copy, Palette or Gradient; anything else decodes
//!   as Copy). Bodies smaller than 12 bytes are sent raw; larger ones are
//!   a compact length plus zlib data inflated into the selected stream.
//!
//! Byte needs are computed by peeking (control byte, filter byte, palette
//! size, compact length) before anything is consumed, so the decoder can
//! suspend cleanly at any point.

use log::warn;

use crate::decoding::zstream::{inflate_exact, InflateStreams};
use crate::decoding::Progress;
use crate::error::{Result, VncError};
use crate::framebuffer::Framebuffer;
use crate::pixel_format::PixelFormat;
use crate::protocol::Rectangle;
use crate::stream::StreamBuffer;

/// Filter id: pixels pass through unchanged.
const FILTER_COPY: u8 = 0;
/// Filter id: palette-indexed pixels.
const FILTER_PALETTE: u8 = 1;
/// Filter id: per-channel gradient prediction.
const FILTER_GRADIENT: u8 = 2;

/// Bodies below this size are sent uncompressed with no length field.
const MIN_BYTES_TO_COMPRESS: usize = 12;

/// Peek a VNC compact length at `offset`: 1-3 bytes, 7 bits each starting
/// with the least significant, continuation in bit 7. Returns the value
/// and its encoded size, or `None` if not enough bytes are buffered.
fn peek_compact_length(stream: &StreamBuffer, offset: usize) -> Option<(usize, usize)> {
    let b0 = stream.peek_at(offset)?;
    if b0 & 0x80 == 0 {
        return Some((usize::from(b0), 1));
    }
    let b1 = stream.peek_at(offset + 1)?;
    if b1 & 0x80 == 0 {
        return Some((usize::from(b0 & 0x7F) | (usize::from(b1) << 7), 2));
    }
    let b2 = stream.peek_at(offset + 2)?;
    Some((
        usize::from(b0 & 0x7F) | (usize::from(b1 & 0x7F) << 7) | (usize::from(b2) << 14),
        3,
    ))
}

/// Consume a compact length previously sized by [`peek_compact_length`].
fn skip_compact_length(stream: &mut StreamBuffer, encoded_len: usize) {
    stream.skip(encoded_len);
}

/// Reset the zlib streams whose flags are set in the control byte's low
/// nibble.
fn apply_stream_resets(streams: &mut InflateStreams, control: u8) {
    for stream_id in 0..4 {
        if control & (1 << stream_id) != 0 {
            streams.reset_tight(stream_id);
        }
    }
}

/// Decode one Tight rectangle into the framebuffer.
pub fn decode(
    stream: &mut StreamBuffer,
    rect: &Rectangle,
    format: &PixelFormat,
    fb: &mut Framebuffer,
    streams: &mut InflateStreams,
) -> Result<Progress> {
    let control = match stream.peek_at(0) {
        Some(byte) => byte,
        None => return Ok(Progress::NeedMore),
    };
    let mode = control >> 4;
    let tpix = format.compact_pixel_len();

    match mode {
        0x08 => decode_fill(stream, rect, format, fb, streams, control, tpix),
        0x09 => decode_jpeg(stream, rect, fb, streams, control),
        0x00..=0x07 => decode_basic(stream, rect, format, fb, streams, control, tpix),
        // Undefined mode: the body cannot be delimited, so nothing is
        // consumed and the session abandons the stream.
        invalid => Err(VncError::Protocol(format!(
            "invalid Tight compression mode {invalid:#x}"
        ))),
    }
}

/// Fill mode: one TPIXEL covers the rectangle. No length field.
fn decode_fill(
    stream: &mut StreamBuffer,
    rect: &Rectangle,
    format: &PixelFormat,
    fb: &mut Framebuffer,
    streams: &mut InflateStreams,
    control: u8,
    tpix: usize,
) -> Result<Progress> {
    if stream.available() < 1 + tpix {
        return Ok(Progress::NeedMore);
    }
    stream.skip(1);
    apply_stream_resets(streams, control);
    let bytes = stream.take_vec(tpix);
    let rgb = format.rgb8(format.compact_pixel(&bytes));
    fb.fill_rect(
        usize::from(rect.x),
        usize::from(rect.y),
        usize::from(rect.width),
        usize::from(rect.height),
        rgb,
    );
    Ok(Progress::Complete)
}

/// JPEG mode: compact length + JPEG payload, blitted at the rect origin.
fn decode_jpeg(
    stream: &mut StreamBuffer,
    rect: &Rectangle,
    fb: &mut Framebuffer,
    streams: &mut InflateStreams,
    control: u8,
) -> Result<Progress> {
    let (data_len, len_bytes) = match peek_compact_length(stream, 1) {
        Some(v) => v,
        None => return Ok(Progress::NeedMore),
    };
    if stream.available() < 1 + len_bytes + data_len {
        return Ok(Progress::NeedMore);
    }
    stream.skip(1);
    apply_stream_resets(streams, control);
    skip_compact_length(stream, len_bytes);
    let data = stream.take_vec(data_len);

    let decoded = image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
        .map_err(|e| VncError::JpegDecode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    fb.blit_rgba(
        usize::from(rect.x),
        usize::from(rect.y),
        rgba.width() as usize,
        rgba.height() as usize,
        rgba.as_raw(),
    );
    Ok(Progress::Complete)
}

/// Basic mode: optional filter, optional palette, raw or zlib body.
#[allow(clippy::too_many_lines)] // one function per Tight mode keeps the peek/consume phases readable
fn decode_basic(
    stream: &mut StreamBuffer,
    rect: &Rectangle,
    format: &PixelFormat,
    fb: &mut Framebuffer,
    streams: &mut InflateStreams,
    control: u8,
    tpix: usize,
) -> Result<Progress> {
    let mode = control >> 4;
    let stream_id = usize::from(mode & 0x03);
    let has_filter = mode & 0x04 != 0;
    let w = usize::from(rect.width);
    let h = usize::from(rect.height);

    // Peek phase: establish the total byte need without consuming.
    let mut offset = 1;
    let filter = if has_filter {
        match stream.peek_at(offset) {
            Some(byte) => {
                offset += 1;
                byte
            }
            None => return Ok(Progress::NeedMore),
        }
    } else {
        FILTER_COPY
    };

    let mut num_colors = 0usize;
    if filter == FILTER_PALETTE {
        match stream.peek_at(offset) {
            Some(byte) => num_colors = usize::from(byte) + 1,
            None => return Ok(Progress::NeedMore),
        }
        offset += 1 + num_colors * tpix;
    }

    let body_len = match filter {
        FILTER_PALETTE if num_colors <= 2 => w.div_ceil(8) * h,
        FILTER_PALETTE => w * h,
        // Copy, Gradient and unknown filter ids all carry full pixels.
        _ => w * h * tpix,
    };

    let (wire_len, len_bytes) = if body_len < MIN_BYTES_TO_COMPRESS {
        (body_len, 0)
    } else {
        match peek_compact_length(stream, offset) {
            Some(v) => v,
            None => return Ok(Progress::NeedMore),
        }
    };
    if stream.available() < offset + len_bytes + wire_len {
        return Ok(Progress::NeedMore);
    }

    // Consume phase: everything is buffered, re-read the fields in order.
    stream.skip(1);
    apply_stream_resets(streams, control);
    if has_filter {
        stream.skip(1);
    }
    let mut palette = Vec::with_capacity(num_colors);
    if filter == FILTER_PALETTE {
        stream.skip(1); // numColors - 1
        for _ in 0..num_colors {
            let bytes = stream.take_vec(tpix);
            palette.push(format.rgb8(format.compact_pixel(&bytes)));
        }
    }

    let body = if body_len < MIN_BYTES_TO_COMPRESS {
        stream.take_vec(body_len)
    } else {
        skip_compact_length(stream, len_bytes);
        let compressed = stream.take_vec(wire_len);
        inflate_exact(streams.tight(stream_id), &compressed, body_len)?
    };

    match filter {
        FILTER_PALETTE if num_colors <= 2 => paint_mono(&body, &palette, rect, w, h, fb),
        FILTER_PALETTE => paint_indexed(&body, &palette, rect, w, h, fb),
        FILTER_GRADIENT => {
            let reconstructed = gradient_reconstruct(&body, w, h, tpix);
            paint_pixels(&reconstructed, rect, format, tpix, w, h, fb);
        }
        other => {
            if other != FILTER_COPY {
                warn!("unknown Tight filter {other}, decoding as Copy");
            }
            paint_pixels(&body, rect, format, tpix, w, h, fb);
        }
    }
    Ok(Progress::Complete)
}

/// Paint a full-pixel body (Copy, or Gradient after reconstruction).
fn paint_pixels(
    body: &[u8],
    rect: &Rectangle,
    format: &PixelFormat,
    tpix: usize,
    w: usize,
    h: usize,
    fb: &mut Framebuffer,
) {
    for y in 0..h {
        for x in 0..w {
            let start = (y * w + x) * tpix;
            let pixel = format.compact_pixel(&body[start..start + tpix]);
            fb.set_pixel(
                usize::from(rect.x) + x,
                usize::from(rect.y) + y,
                format.rgb8(pixel),
            );
        }
    }
}

/// Paint a two-colour palette body: one bit per pixel, rows padded to a
/// whole byte, most significant bit leftmost.
fn paint_mono(body: &[u8], palette: &[(u8, u8, u8)], rect: &Rectangle, w: usize, h: usize, fb: &mut Framebuffer) {
    let row_bytes = w.div_ceil(8);
    for y in 0..h {
        for x in 0..w {
            let byte = body[y * row_bytes + x / 8];
            let index = usize::from((byte >> (7 - (x % 8))) & 1);
            let rgb = palette.get(index).copied().unwrap_or((0, 0, 0));
            fb.set_pixel(usize::from(rect.x) + x, usize::from(rect.y) + y, rgb);
        }
    }
}

/// Paint an 8-bit palette body.
fn paint_indexed(body: &[u8], palette: &[(u8, u8, u8)], rect: &Rectangle, w: usize, h: usize, fb: &mut Framebuffer) {
    for y in 0..h {
        for x in 0..w {
            let index = usize::from(body[y * w + x]);
            let rgb = palette.get(index).copied().unwrap_or((0, 0, 0));
            fb.set_pixel(usize::from(rect.x) + x, usize::from(rect.y) + y, rgb);
        }
    }
}

/// Undo the gradient filter.
///
/// The wire carries additive error terms; the predictor for each byte lane
/// is `clamp(left + above - above_left, 0, 255)` with zero at the borders,
/// and reconstruction is modulo 256.
fn gradient_reconstruct(body: &[u8], w: usize, h: usize, tpix: usize) -> Vec<u8> {
    let row_len = w * tpix;
    let mut out = vec![0u8; body.len()];
    for y in 0..h {
        for x in 0..w {
            for lane in 0..tpix {
                let idx = y * row_len + x * tpix + lane;
                let left = if x > 0 { i32::from(out[idx - tpix]) } else { 0 };
                let above = if y > 0 { i32::from(out[idx - row_len]) } else { 0 };
                let diagonal = if x > 0 && y > 0 {
                    i32::from(out[idx - row_len - tpix])
                } else {
                    0
                };
                let predictor = (left + above - diagonal).clamp(0, 255);
                out[idx] = ((predictor + i32::from(body[idx])) & 0xFF) as u8;
            }
        }
    }
    out
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
            encoding: 7,
        }
    }

    // RGB888 TPIXEL wire bytes for an RGB colour (blue, green, red order).
    fn tpix(r: u8, g: u8, b: u8) -> [u8; 3] {
        [b, g, r]
    }

    #[test]
    fn compact_length_forms() {
        let mut stream = StreamBuffer::new();
        stream.extend(&[42]);
        assert_eq!(peek_compact_length(&stream, 0), Some((42, 1)));

        let mut stream = StreamBuffer::new();
        stream.extend(&[0x90, 0x01]);
        assert_eq!(peek_compact_length(&stream, 0), Some((0x90 & 0x7F | 1 << 7, 2)));

        let mut stream = StreamBuffer::new();
        stream.extend(&[0xFF, 0xFF, 0x03]);
        let (value, size) = peek_compact_length(&stream, 0).unwrap();
        assert_eq!(size, 3);
        assert_eq!(value, 0x7F | (0x7F << 7) | (0x03 << 14));

        let mut stream = StreamBuffer::new();
        stream.extend(&[0x80]); // continuation set but next byte missing
        assert_eq!(peek_compact_length(&stream, 0), None);
    }

    #[test]
    fn fill_mode_paints_rectangle() {
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(8, 8);
        let mut streams = InflateStreams::new();
        let mut stream = StreamBuffer::new();
        stream.extend(&[0x80]);
        stream.extend(&tpix(0x11, 0x22, 0x33));

        let progress =
            decode(&mut stream, &rect(8, 8), &format, &mut fb, &mut streams).unwrap();
        assert_eq!(progress, Progress::Complete);
        assert_eq!(fb.pixel(0, 0), Some(0xFF11_2233));
        assert_eq!(fb.pixel(7, 7), Some(0xFF11_2233));
        assert_eq!(stream.available(), 0);
    }

    #[test]
    fn fill_mode_suspends_without_pixel() {
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(8, 8);
        let mut streams = InflateStreams::new();
        let mut stream = StreamBuffer::new();
        stream.extend(&[0x80, 0x01]); // control + 1 of 3 pixel bytes

        let progress =
            decode(&mut stream, &rect(8, 8), &format, &mut fb, &mut streams).unwrap();
        assert_eq!(progress, Progress::NeedMore);
        assert_eq!(stream.available(), 2);
    }

    #[test]
    fn basic_copy_uncompressed_small_body() {
        // 1x2 rectangle: body = 6 bytes < 12, sent raw without length.
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(1, 2);
        let mut streams = InflateStreams::new();
        let mut stream = StreamBuffer::new();
        stream.extend(&[0x00]); // basic, stream 0, no filter byte
        stream.extend(&tpix(1, 2, 3));
        stream.extend(&tpix(4, 5, 6));

        let progress =
            decode(&mut stream, &rect(1, 2), &format, &mut fb, &mut streams).unwrap();
        assert_eq!(progress, Progress::Complete);
        assert_eq!(fb.pixel(0, 0), Some(0xFF01_0203));
        assert_eq!(fb.pixel(0, 1), Some(0xFF04_0506));
    }

    #[test]
    fn basic_mono_palette_bit_order() {
        // 9x1 palette rectangle with 2 colours: row is 2 bytes, MSB first.
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(9, 1);
        let mut streams = InflateStreams::new();
        let mut stream = StreamBuffer::new();
        stream.extend(&[0x40]); // basic, stream 0, filter byte follows
        stream.extend(&[FILTER_PALETTE]);
        stream.extend(&[1]); // numColors - 1 = 1 -> 2 colours
        stream.extend(&tpix(0, 0, 0));
        stream.extend(&tpix(0xFF, 0xFF, 0xFF));
        // Body: ceil(9/8)*1 = 2 bytes < 12 -> raw. Pattern 10000000 1.......
        stream.extend(&[0x80, 0x80]);

        let progress =
            decode(&mut stream, &rect(9, 1), &format, &mut fb, &mut streams).unwrap();
        assert_eq!(progress, Progress::Complete);
        assert_eq!(fb.pixel(0, 0), Some(0xFFFF_FFFF));
        assert_eq!(fb.pixel(1, 0), Some(0xFF00_0000));
        assert_eq!(fb.pixel(8, 0), Some(0xFFFF_FFFF));
    }

    #[test]
    fn basic_gradient_reconstruction() {
        // 2x2 gradient: all error terms zero except the first pixel, so the
        // prediction propagates it across the rectangle.
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(2, 2);
        let mut streams = InflateStreams::new();
        let mut stream = StreamBuffer::new();
        stream.extend(&[0x40]);
        stream.extend(&[FILTER_GRADIENT]);
        // Body = 2*2*3 = 12 bytes -> compressed with a length. Compress it.
        let mut body = Vec::new();
        body.extend_from_slice(&tpix(10, 20, 30)); // first pixel error = value
        body.extend_from_slice(&[0, 0, 0]); // right: predictor = left
        body.extend_from_slice(&[0, 0, 0]); // below: predictor = above
        body.extend_from_slice(&[0, 0, 0]); // diagonal: left+above-diag
        let mut compressor = flate2::Compress::new(flate2::Compression::default(), true);
        let mut compressed = vec![0u8; 128];
        compressor
            .compress(&body, &mut compressed, flate2::FlushCompress::Sync)
            .unwrap();
        compressed.truncate(compressor.total_out() as usize);
        assert!(compressed.len() < 0x80);
        stream.extend(&[compressed.len() as u8]);
        stream.extend(&compressed);

        let progress =
            decode(&mut stream, &rect(2, 2), &format, &mut fb, &mut streams).unwrap();
        assert_eq!(progress, Progress::Complete);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(fb.pixel(x, y), Some(0xFF0A_141E), "pixel ({x},{y})");
        }
    }

    #[test]
    fn reset_flags_reinitialize_streams() {
        let mut streams = InflateStreams::new();
        // Touch stream 2 so it exists, then reset it via a Fill control
        // byte with bit 2 set.
        let _ = streams.tight(2);
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(1, 1);
        let mut stream = StreamBuffer::new();
        stream.extend(&[0x84]); // fill + reset stream 2
        stream.extend(&tpix(0, 0, 0));
        decode(&mut stream, &rect(1, 1), &format, &mut fb, &mut streams).unwrap();
        // The stream was dropped; asking for it again yields a fresh one
        // that accepts a brand-new zlib stream.
        let mut compressor = flate2::Compress::new(flate2::Compression::default(), true);
        let mut compressed = vec![0u8; 64];
        compressor
            .compress(b"xyz", &mut compressed, flate2::FlushCompress::Sync)
            .unwrap();
        compressed.truncate(compressor.total_out() as usize);
        let out = inflate_exact(streams.tight(2), &compressed, 3).unwrap();
        assert_eq!(&out, b"xyz");
    }

    #[test]
    fn invalid_mode_is_an_error() {
        let format = PixelFormat::RGB888;
        let mut fb = Framebuffer::new();
        fb.allocate(1, 1);
        let mut streams = InflateStreams::new();
        let mut stream = StreamBuffer::new();
        stream.extend(&[0xA0]);
        assert!(decode(&mut stream, &rect(1, 1), &format, &mut fb, &mut streams).is_err());
    }
}
