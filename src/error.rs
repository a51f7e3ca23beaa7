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

//! Error types for the VNC client.

use thiserror::Error;

/// Errors that can occur while talking to a VNC server.
///
/// Most decode-level failures are contained by the session: the offending
/// rectangle is logged and dropped while the rest of the update continues.
/// Only the transport adapter propagates errors to the caller.
#[derive(Debug, Error)]
pub enum VncError {
    /// I/O error from the underlying stream (transport adapter only).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server violated the RFB protocol in a way that loses stream
    /// framing. Unlike the contained decode errors, this is fatal: the
    /// session parks until the transport reconnects.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A zlib inflate operation failed.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// A Tight JPEG payload could not be decoded.
    #[error("JPEG decode error: {0}")]
    JpegDecode(String),

    /// The server sent a rectangle with an encoding we never advertised.
    /// The rectangle is logged and skipped; the update continues.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(i32),
}

/// Convenience result type used throughout the crate.
pub type Result<T> = std::result::Result<T, VncError>;
