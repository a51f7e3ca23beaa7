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

//! Raw encoding decoder.
//!
//! Raw rectangles carry `width * height * bytes_per_pixel` bytes of
//! uncompressed pixel data in scan order, using the server's declared
//! endianness. The whole body is the decode unit: nothing is consumed
//! until all of it is buffered.

use crate::decoding::Progress;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::pixel_format::PixelFormat;
use crate::protocol::Rectangle;
use crate::stream::StreamBuffer;

/// Decode one Raw rectangle into the framebuffer.
pub fn decode(
    stream: &mut StreamBuffer,
    rect: &Rectangle,
    format: &PixelFormat,
    fb: &mut Framebuffer,
) -> Result<Progress> {
    let bpp = format.bytes_per_pixel();
    let needed = usize::from(rect.width) * usize::from(rect.height) * bpp;
    if stream.available() < needed {
        return Ok(Progress::NeedMore);
    }

    let mut bytes = [0u8; 4];
    for y in 0..usize::from(rect.height) {
        for x in 0..usize::from(rect.width) {
            stream.copy_to_slice(&mut bytes[..bpp]);
            let pixel = format.read_pixel(&bytes[..bpp]);
            fb.set_pixel(
                usize::from(rect.x) + x,
                usize::from(rect.y) + y,
                format.rgb8(pixel),
            );
        }
    }
    Ok(Progress::Complete)
}
