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

//! VNC framebuffer rectangle decoders.
//!
//! Each supported encoding has a decoder that consumes bytes from the
//! receive buffer and paints pixels into the framebuffer. Decoders are
//! *resumable*: they only ever consume whole logical units (a tile, a
//! compressed blob, a full raw rectangle), and when the next unit is not
//! fully buffered they return [`Progress::NeedMore`] without side effects
//! so the state machine can suspend and re-enter later.
//!
//! # Supported Encodings
//!
//! - **Raw**: Uncompressed pixel data. Simple but bandwidth-intensive.
//! - **Hextile**: 16x16 tiles with background/foreground/subrectangle
//!   subencodings.
//! - **ZRLE**: zlib-compressed 64x64 tiles with palette and RLE modes
//!   (`zlib` feature).
//! - **Tight**: four persistent zlib streams, palette/gradient filters and
//!   JPEG (`zlib` feature).

pub mod hextile;
pub mod raw;
#[cfg(feature = "zlib")]
pub mod tight;
#[cfg(feature = "zlib")]
pub mod zrle;
#[cfg(feature = "zlib")]
pub mod zstream;

/// Outcome of feeding a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The rectangle is fully decoded; its bytes were consumed.
    Complete,
    /// The next unit is not fully buffered; nothing was consumed.
    NeedMore,
}
