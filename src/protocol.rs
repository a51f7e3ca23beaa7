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

//! VNC Remote Framebuffer (RFB) protocol constants and structures.
//!
//! This module provides the fundamental building blocks for VNC protocol
//! communication from the client side: protocol version negotiation, message
//! types, security handshakes, encodings, and the client-to-server message
//! builders. It implements the RFB protocol as specified in RFC 6143.
//!
//! # Protocol Overview
//!
//! The VNC RFB protocol operates in the following phases:
//! 1. **Protocol Version** - Server and client agree on protocol version
//! 2. **Security Handshake** - Authentication method selection and execution
//! 3. **Initialization** - Exchange of framebuffer parameters and capabilities
//! 4. **Normal Operation** - Framebuffer updates flow in, input events flow out

use bytes::{BufMut, BytesMut};

use crate::pixel_format::PixelFormat;
use crate::stream::StreamBuffer;

// Client-to-Server Message Types

/// Message type: Client requests to change the pixel format.
pub const CLIENT_MSG_SET_PIXEL_FORMAT: u8 = 0;

/// Message type: Client specifies supported encodings.
///
/// The client sends a list of encoding types it supports, ordered by
/// preference. The server will use the first mutually supported encoding.
pub const CLIENT_MSG_SET_ENCODINGS: u8 = 2;

/// Message type: Client requests a framebuffer update.
///
/// The client can request either an incremental update (changes only) or
/// a full refresh of a specified rectangular region.
pub const CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;

/// Message type: Client sends a keyboard event.
pub const CLIENT_MSG_KEY_EVENT: u8 = 4;

/// Message type: Client sends a pointer (mouse) event.
pub const CLIENT_MSG_POINTER_EVENT: u8 = 5;

// Server-to-Client Message Types

/// Message type: Server sends a framebuffer update.
///
/// Contains one or more rectangles of pixel data representing screen changes.
/// This is the only server message the client core processes; everything
/// else is logged and drained.
pub const SERVER_MSG_FRAMEBUFFER_UPDATE: u8 = 0;

// Encoding Types

/// Encoding type: Raw pixel data (no compression).
pub const ENCODING_RAW: i32 = 0;

/// Encoding type: Copy Rectangle.
///
/// Instructs the client to copy a rectangular region from another location
/// on the screen. This client consumes the body and skips the copy.
pub const ENCODING_COPYRECT: i32 = 1;

/// Encoding type: Hextile (16x16 tiles with per-tile subencodings).
pub const ENCODING_HEXTILE: i32 = 5;

/// Encoding type: Tight (zlib streams, palettes, gradients and JPEG).
pub const ENCODING_TIGHT: i32 = 7;

/// Encoding type: ZRLE (Zlib Run-Length Encoding with 64x64 tiles).
pub const ENCODING_ZRLE: i32 = 16;

// Security Types

/// Security type: Invalid/Unknown.
///
/// Sent by the server when the connection cannot proceed; followed by a
/// reason string.
pub const SECURITY_TYPE_INVALID: u8 = 0;

/// Security type: None (no authentication).
pub const SECURITY_TYPE_NONE: u8 = 1;

/// Security type: VNC Authentication.
///
/// Standard VNC authentication using DES-encrypted challenge-response.
/// The server sends a 16-byte challenge, which the client encrypts with
/// the password and returns.
pub const SECURITY_TYPE_VNC_AUTH: u8 = 2;

// Security Results

/// Security result: Authentication successful.
pub const SECURITY_RESULT_OK: u32 = 0;

/// The negotiated RFB protocol version.
///
/// Set once during the handshake and monotonic for the life of a
/// connection. The version determines the shape of the security handshake:
/// 3.3 has a server-chosen security type and no `SecurityResult` after VNC
/// authentication sends its response, while 3.7/3.8 negotiate from a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// No version negotiated yet.
    #[default]
    Unknown,
    /// RFB 3.3 (legacy).
    V33,
    /// RFB 3.7.
    V37,
    /// RFB 3.8.
    V38,
}

impl ProtocolVersion {
    /// Parse the 12-byte version string the server sends, e.g. `RFB 003.008\n`.
    ///
    /// Returns `Unknown` for any version outside {3.3, 3.7, 3.8}.
    pub fn from_wire(bytes: &[u8]) -> Self {
        match bytes {
            b"RFB 003.003\n" => Self::V33,
            b"RFB 003.007\n" => Self::V37,
            b"RFB 003.008\n" => Self::V38,
            _ => Self::Unknown,
        }
    }

    /// The 12-byte wire form of this version, if it has one.
    pub fn wire_bytes(self) -> Option<&'static [u8; 12]> {
        match self {
            Self::V33 => Some(b"RFB 003.003\n"),
            Self::V37 => Some(b"RFB 003.007\n"),
            Self::V38 => Some(b"RFB 003.008\n"),
            Self::Unknown => None,
        }
    }
}

/// The negotiated security type.
///
/// `Other` carries any type the server offered that this client does not
/// implement; it is reported through the event channel and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityType {
    /// No security type negotiated yet.
    #[default]
    Unknown,
    /// The server refused the connection (type 0, reason string follows).
    Invalid,
    /// No authentication required.
    None,
    /// DES challenge-response VNC authentication.
    VncAuth,
    /// A security type this client does not support.
    Other(u8),
}

impl SecurityType {
    /// Map a wire security-type byte onto the enum.
    pub fn from_wire(value: u8) -> Self {
        match value {
            SECURITY_TYPE_INVALID => Self::Invalid,
            SECURITY_TYPE_NONE => Self::None,
            SECURITY_TYPE_VNC_AUTH => Self::VncAuth,
            other => Self::Other(other),
        }
    }

    /// The wire byte for this type, if it can be selected by the client.
    pub fn wire_byte(self) -> Option<u8> {
        match self {
            Self::None => Some(SECURITY_TYPE_NONE),
            Self::VncAuth => Some(SECURITY_TYPE_VNC_AUTH),
            _ => None,
        }
    }
}

/// A rectangle header within a framebuffer update message.
///
/// Each framebuffer update contains one or more rectangles, each with its
/// own encoding type. The header specifies the position, dimensions, and
/// encoding of the pixel data that follows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rectangle {
    /// X coordinate of the top-left corner.
    pub x: u16,
    /// Y coordinate of the top-left corner.
    pub y: u16,
    /// Width of the rectangle in pixels.
    pub width: u16,
    /// Height of the rectangle in pixels.
    pub height: u16,
    /// The encoding type used for this rectangle's pixel data.
    pub encoding: i32,
}

/// Size of a rectangle header on the wire: x, y, w, h (u16 each) + i32 encoding.
pub const RECTANGLE_HEADER_LEN: usize = 12;

impl Rectangle {
    /// Consume a 12-byte rectangle header from the stream.
    ///
    /// The caller must have verified that [`RECTANGLE_HEADER_LEN`] bytes are
    /// available.
    pub fn read_header(stream: &mut StreamBuffer) -> Self {
        Self {
            x: stream.get_u16(),
            y: stream.get_u16(),
            width: stream.get_u16(),
            height: stream.get_u16(),
            encoding: stream.get_i32(),
        }
    }
}

/// Build a `SetPixelFormat` message (type 0x00).
///
/// The format sent back is the one learned from `ServerInit`, confirming to
/// the server that updates should keep using it.
pub fn set_pixel_format(buf: &mut BytesMut, format: &PixelFormat) {
    buf.put_u8(CLIENT_MSG_SET_PIXEL_FORMAT);
    buf.put_bytes(0, 3); // padding
    format.write_to(buf);
}

/// Build a `SetEncodings` message (type 0x02) listing `encodings` in
/// preference order.
#[allow(clippy::cast_possible_truncation)] // encoding list length limited to u16 per RFC 6143
pub fn set_encodings(buf: &mut BytesMut, encodings: &[i32]) {
    buf.put_u8(CLIENT_MSG_SET_ENCODINGS);
    buf.put_u8(0); // padding
    buf.put_u16(encodings.len() as u16);
    for &encoding in encodings {
        buf.put_i32(encoding);
    }
}

/// Build a `FramebufferUpdateRequest` message (type 0x03).
///
/// An incremental request asks only for regions that changed since the last
/// update; a non-incremental request asks for a full repaint of the region.
pub fn framebuffer_update_request(
    buf: &mut BytesMut,
    incremental: bool,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
) {
    buf.put_u8(CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST);
    buf.put_u8(u8::from(incremental));
    buf.put_u16(x);
    buf.put_u16(y);
    buf.put_u16(width);
    buf.put_u16(height);
}
