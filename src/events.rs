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

//! Client events that can be received by the application.

use crate::protocol::{ProtocolVersion, Rectangle, SecurityType};

/// Events emitted by the VNC client session.
///
/// Events are delivered over the unbounded channel handed out by
/// [`VncClient::new`](crate::client::VncClient::new), in the order the
/// session produced them.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The connection was established (`true`) or torn down (`false`).
    ConnectionStateChanged(bool),

    /// The protocol version negotiated during the handshake changed.
    ProtocolVersionChanged(ProtocolVersion),

    /// The security type negotiated during the handshake changed.
    SecurityTypeChanged(SecurityType),

    /// The server announced its framebuffer dimensions.
    ///
    /// Emitted from `ServerInit`, and again with zero dimensions when the
    /// session resets.
    FramebufferSizeChanged {
        /// Framebuffer width in pixels.
        width: u16,
        /// Framebuffer height in pixels.
        height: u16,
    },

    /// A rectangle of the framebuffer image was repainted.
    ///
    /// Emitted once per decoded rectangle of a framebuffer update.
    ImageChanged {
        /// The repainted region.
        rect: Rectangle,
    },

    /// The server sent an authentication challenge but no password is set.
    ///
    /// The session holds the challenge; calling
    /// [`set_password`](crate::client::VncClient::set_password) completes
    /// the authentication.
    PasswordRequested,

    /// Authentication or security negotiation failed terminally.
    AuthenticationFailed {
        /// Human-readable reason from the server, when one was sent.
        reason: Option<String>,
    },
}
