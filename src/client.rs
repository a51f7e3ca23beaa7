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

//! VNC client session and protocol state machine.
//!
//! This module drives an established byte stream through the RFB protocol:
//! version exchange, security negotiation, authentication, initialization,
//! and the steady-state framebuffer update loop, while forwarding input
//! events upstream.
//!
//! # Protocol Flow
//!
//! 1. **Handshake**: Protocol version exchange and security negotiation
//! 2. **Authentication**: Optional DES challenge-response
//! 3. **Initialization**: `ClientInit`/`ServerInit`, pixel format and
//!    encoding setup, first full-frame update request
//! 4. **Waiting**: decode framebuffer updates, request the next frame
//!
//! # Resumability
//!
//! The session never blocks: it consumes bytes fed in through
//! [`VncClient::receive`] and suspends whenever the next protocol unit is
//! not fully buffered, preserving all intermediate state (current
//! rectangle, Hextile tile coordinates, zlib dictionaries). Output is
//! queued and drained by the transport with [`VncClient::take_outgoing`].

use bytes::{Bytes, BytesMut};
use log::{debug, error, warn};
use tokio::sync::mpsc;

use crate::auth;
use crate::decoding::hextile::{self, HextileState};
use crate::decoding::raw;
#[cfg(feature = "zlib")]
use crate::decoding::tight;
#[cfg(feature = "zlib")]
use crate::decoding::zrle;
#[cfg(feature = "zlib")]
use crate::decoding::zstream::InflateStreams;
use crate::decoding::Progress;
use crate::error::{Result, VncError};
use crate::events::ClientEvent;
use crate::framebuffer::Framebuffer;
use crate::input::{self, Key};
use crate::pixel_format::PixelFormat;
use crate::protocol::{
    self, ProtocolVersion, Rectangle, SecurityType, ENCODING_COPYRECT, ENCODING_HEXTILE,
    ENCODING_RAW, RECTANGLE_HEADER_LEN, SECURITY_TYPE_NONE, SECURITY_TYPE_VNC_AUTH,
    SERVER_MSG_FRAMEBUFFER_UPDATE,
};
#[cfg(feature = "zlib")]
use crate::protocol::{ENCODING_TIGHT, ENCODING_ZRLE};
use crate::stream::StreamBuffer;

/// States of the RFB handshake and session.
///
/// `ClientInit` does not appear: it involves no waiting for server bytes,
/// so the session performs it synchronously while advancing to
/// `ServerInit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProtocolState {
    /// Waiting for the server's 12-byte version string.
    ProtocolVersion,
    /// Waiting for the security type (3.3) or type list (3.7/3.8).
    Security,
    /// Waiting for the 16-byte authentication challenge, or for a
    /// password to answer one already received.
    VncAuthentication,
    /// Waiting for the u32 security result.
    SecurityResult,
    /// Waiting for the `ServerInit` message.
    ServerInit,
    /// Steady state: waiting for server messages.
    Waiting,
    /// Terminal: the connection was refused or the protocol failed.
    Invalid,
    /// Terminal: authentication failed.
    AuthFailure,
}

/// The resumable cursor for an in-progress framebuffer update message.
///
/// While `active`, every incoming byte belongs to this update and no other
/// server message is dispatched.
#[derive(Debug, Default)]
struct UpdateCursor {
    active: bool,
    total_rects: u16,
    current_rect: u16,
    header_read: bool,
    rect: Rectangle,
    hextile: HextileState,
}

/// A VNC client session over an externally managed byte stream.
///
/// The session owns the protocol state, the framebuffer image and the
/// decompression contexts; it does not own the transport. Incoming bytes
/// are pushed in with [`receive`], queued output is drained with
/// [`take_outgoing`], and observable side effects are delivered as
/// [`ClientEvent`]s on the channel returned by [`new`].
///
/// [`receive`]: VncClient::receive
/// [`take_outgoing`]: VncClient::take_outgoing
/// [`new`]: VncClient::new
pub struct VncClient {
    state: ProtocolState,
    protocol_version: ProtocolVersion,
    security_type: SecurityType,
    /// Password configured by the application; survives reconnects.
    password: Option<String>,
    /// Challenge buffered while waiting for a password.
    challenge: Option<[u8; 16]>,
    pixel_format: PixelFormat,
    framebuffer_width: u16,
    framebuffer_height: u16,
    framebuffer: Framebuffer,
    cursor: UpdateCursor,
    #[cfg(feature = "zlib")]
    streams: InflateStreams,
    rx: StreamBuffer,
    outgoing: BytesMut,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
    /// Reentrancy guard for the processing loop.
    processing: bool,
}

impl VncClient {
    /// Create a session and the channel its events are delivered on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let client = Self {
            state: ProtocolState::ProtocolVersion,
            protocol_version: ProtocolVersion::Unknown,
            security_type: SecurityType::Unknown,
            password: None,
            challenge: None,
            pixel_format: PixelFormat::default(),
            framebuffer_width: 0,
            framebuffer_height: 0,
            framebuffer: Framebuffer::new(),
            cursor: UpdateCursor::default(),
            #[cfg(feature = "zlib")]
            streams: InflateStreams::new(),
            rx: StreamBuffer::new(),
            outgoing: BytesMut::new(),
            event_tx,
            processing: false,
        };
        (client, event_rx)
    }

    /// The negotiated protocol version.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// The negotiated security type.
    pub fn security_type(&self) -> SecurityType {
        self.security_type
    }

    /// Width of the remote framebuffer in pixels (0 before `ServerInit`).
    pub fn framebuffer_width(&self) -> u16 {
        self.framebuffer_width
    }

    /// Height of the remote framebuffer in pixels (0 before `ServerInit`).
    pub fn framebuffer_height(&self) -> u16 {
        self.framebuffer_height
    }

    /// The framebuffer image.
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Set the VNC password.
    ///
    /// If the server's challenge already arrived and is waiting for a
    /// password, the authentication response is produced immediately.
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
        if self.state == ProtocolState::VncAuthentication && self.challenge.is_some() {
            self.respond_to_challenge();
            // Later handshake bytes may already be buffered.
            self.process();
        }
    }

    /// Notify the session that the transport connected.
    ///
    /// Resets the handshake state and emits `ConnectionStateChanged(true)`;
    /// the server speaks first, so no bytes are written yet.
    pub fn connection_established(&mut self) {
        debug!("connected to VNC server");
        self.emit(ClientEvent::ConnectionStateChanged(true));
        self.state = ProtocolState::ProtocolVersion;
        self.set_protocol_version(ProtocolVersion::Unknown);
        self.set_security_type(SecurityType::Unknown);
    }

    /// Notify the session that the transport disconnected.
    ///
    /// Discards all per-connection state (pending update, challenge, zlib
    /// dictionaries, image) and emits `ConnectionStateChanged(false)`. The
    /// configured password is kept for the next connection.
    pub fn disconnected(&mut self) {
        debug!("disconnected from VNC server");
        self.reset();
        self.emit(ClientEvent::ConnectionStateChanged(false));
    }

    /// Feed bytes received from the transport and run the state machine.
    pub fn receive(&mut self, data: &[u8]) {
        self.rx.extend(data);
        self.process();
    }

    /// Drain the bytes queued for the server.
    pub fn take_outgoing(&mut self) -> Bytes {
        self.outgoing.split().freeze()
    }

    /// Send a key press or release.
    pub fn send_key_event(&mut self, key: Key, down: bool) {
        input::key_event(&mut self.outgoing, down, key.keysym());
    }

    /// Send a pointer event with the given button mask and position.
    pub fn send_pointer_event(&mut self, button_mask: u8, x: u16, y: u16) {
        input::pointer_event(&mut self.outgoing, button_mask, x, y);
    }

    /// Type a string by sending a press/release pair per character.
    pub fn type_text(&mut self, text: &str) {
        for ch in text.chars() {
            self.send_key_event(Key::Char(ch), true);
            self.send_key_event(Key::Char(ch), false);
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event);
    }

    fn set_protocol_version(&mut self, version: ProtocolVersion) {
        if self.protocol_version != version {
            self.protocol_version = version;
            self.emit(ClientEvent::ProtocolVersionChanged(version));
        }
    }

    fn set_security_type(&mut self, security: SecurityType) {
        if self.security_type != security {
            self.security_type = security;
            self.emit(ClientEvent::SecurityTypeChanged(security));
        }
    }

    fn reset(&mut self) {
        self.state = ProtocolState::ProtocolVersion;
        self.set_protocol_version(ProtocolVersion::Unknown);
        self.set_security_type(SecurityType::Unknown);
        self.challenge = None;
        self.pixel_format = PixelFormat::default();
        self.framebuffer_width = 0;
        self.framebuffer_height = 0;
        self.framebuffer.clear();
        self.cursor = UpdateCursor::default();
        #[cfg(feature = "zlib")]
        self.streams.reset();
        self.rx.clear();
        self.outgoing.clear();
        self.emit(ClientEvent::FramebufferSizeChanged {
            width: 0,
            height: 0,
        });
    }

    /// Run the state machine until no further byte progress can be made.
    ///
    /// The loop re-dispatches as long as a pass consumed input, which is
    /// the cooperative equivalent of rescheduling another pass when bytes
    /// remain; a pass that consumes nothing means the current unit is
    /// incomplete and the session suspends.
    fn process(&mut self) {
        if self.processing {
            return;
        }
        self.processing = true;
        loop {
            let before = self.rx.available();
            self.step();
            if self.rx.available() == before || self.rx.available() == 0 {
                break;
            }
        }
        self.processing = false;
    }

    fn step(&mut self) {
        match self.state {
            ProtocolState::ProtocolVersion => self.parse_protocol_version(),
            ProtocolState::Security => self.parse_security(),
            ProtocolState::VncAuthentication => self.parse_challenge(),
            ProtocolState::SecurityResult => self.parse_security_result(),
            ProtocolState::ServerInit => self.parse_server_init(),
            ProtocolState::Waiting => self.parse_server_messages(),
            ProtocolState::Invalid | ProtocolState::AuthFailure => {
                // Terminal; nothing further to parse.
                self.rx.clear();
            }
        }
    }

    /// Wait for the server's 12-byte version string, echo it back and
    /// advance to security negotiation.
    fn parse_protocol_version(&mut self) {
        if self.rx.available() < 12 {
            return;
        }
        let bytes = self.rx.take_vec(12);
        let version = ProtocolVersion::from_wire(&bytes);
        match version.wire_bytes() {
            Some(wire) => {
                debug!("server protocol version {version:?}");
                self.outgoing.extend_from_slice(wire);
                self.set_protocol_version(version);
                self.state = ProtocolState::Security;
            }
            None => {
                warn!(
                    "unsupported protocol version {:?}",
                    String::from_utf8_lossy(&bytes)
                );
                self.state = ProtocolState::Invalid;
            }
        }
    }

    fn parse_security(&mut self) {
        match self.protocol_version {
            ProtocolVersion::V33 => self.parse_security_v33(),
            ProtocolVersion::V37 | ProtocolVersion::V38 => self.parse_security_v37(),
            ProtocolVersion::Unknown => {}
        }
    }

    /// RFB 3.3: the server dictates a u32 security type; no selection byte
    /// is sent back.
    fn parse_security_v33(&mut self) {
        let value = match self.rx.peek_u32_at(0) {
            Some(v) => v,
            None => return,
        };
        if value == 0 {
            // Refused: a reason string follows the type word.
            let Some(reason) = self.try_take_reason(4) else {
                return;
            };
            warn!("connection refused: {reason}");
            self.set_security_type(SecurityType::Invalid);
            self.emit(ClientEvent::AuthenticationFailed {
                reason: Some(reason),
            });
            self.state = ProtocolState::Invalid;
            return;
        }

        self.rx.skip(4);
        match value {
            v if v == u32::from(SECURITY_TYPE_NONE) => {
                self.set_security_type(SecurityType::None);
                self.client_init();
            }
            v if v == u32::from(SECURITY_TYPE_VNC_AUTH) => {
                self.set_security_type(SecurityType::VncAuth);
                self.state = ProtocolState::VncAuthentication;
            }
            other => {
                warn!("server requires unsupported security type {other}");
                #[allow(clippy::cast_possible_truncation)] // reported opaquely
                self.set_security_type(SecurityType::Other(other as u8));
                self.emit(ClientEvent::AuthenticationFailed { reason: None });
                self.state = ProtocolState::Invalid;
            }
        }
    }

    /// RFB 3.7/3.8: the server offers a list of types and the client picks
    /// one, preferring VNC authentication, then None.
    fn parse_security_v37(&mut self) {
        let count = match self.rx.peek_at(0) {
            Some(c) => usize::from(c),
            None => return,
        };
        if count == 0 {
            // Zero types: a reason string follows the count byte.
            let Some(reason) = self.try_take_reason(1) else {
                return;
            };
            warn!("connection refused: {reason}");
            self.set_security_type(SecurityType::Invalid);
            self.emit(ClientEvent::AuthenticationFailed {
                reason: Some(reason),
            });
            self.state = ProtocolState::Invalid;
            return;
        }
        if self.rx.available() < 1 + count {
            return;
        }
        self.rx.skip(1);
        let offered = self.rx.take_vec(count);
        debug!("server offers security types {offered:?}");

        if offered.contains(&SECURITY_TYPE_VNC_AUTH) {
            self.outgoing.extend_from_slice(&[SECURITY_TYPE_VNC_AUTH]);
            self.set_security_type(SecurityType::VncAuth);
            self.state = ProtocolState::VncAuthentication;
        } else if offered.contains(&SECURITY_TYPE_NONE) {
            self.outgoing.extend_from_slice(&[SECURITY_TYPE_NONE]);
            self.set_security_type(SecurityType::None);
            if self.protocol_version == ProtocolVersion::V38 {
                self.state = ProtocolState::SecurityResult;
            } else {
                self.client_init();
            }
        } else {
            warn!("no acceptable security type offered: {offered:?}");
            self.set_security_type(SecurityType::Invalid);
            self.emit(ClientEvent::AuthenticationFailed { reason: None });
            self.state = ProtocolState::Invalid;
        }
    }

    /// Consume a `prefix`-byte header plus a u32-prefixed reason string, if
    /// fully buffered. Nothing is consumed otherwise.
    fn try_take_reason(&mut self, prefix: usize) -> Option<String> {
        let len = self.rx.peek_u32_at(prefix)? as usize;
        if self.rx.available() < prefix + 4 + len {
            return None;
        }
        self.rx.skip(prefix + 4);
        let reason = self.rx.take_vec(len);
        Some(String::from_utf8_lossy(&reason).into_owned())
    }

    /// Wait for the 16-byte challenge. Without a password the challenge is
    /// retained and `PasswordRequested` emitted; `set_password` completes
    /// the exchange later.
    fn parse_challenge(&mut self) {
        if self.challenge.is_some() || self.rx.available() < 16 {
            return;
        }
        let mut challenge = [0u8; 16];
        self.rx.copy_to_slice(&mut challenge);
        self.challenge = Some(challenge);

        if self.password.is_some() {
            self.respond_to_challenge();
        } else {
            debug!("authentication challenge received, waiting for password");
            self.emit(ClientEvent::PasswordRequested);
        }
    }

    /// Encrypt the stored challenge and send the 16-byte response.
    fn respond_to_challenge(&mut self) {
        let Some(challenge) = self.challenge.take() else {
            return;
        };
        let password = self.password.clone().unwrap_or_default();
        let response = auth::encrypt_challenge(&password, &challenge);
        self.outgoing.extend_from_slice(&response);

        // 3.3 has no SecurityResult message after the response.
        if self.protocol_version == ProtocolVersion::V33 {
            self.client_init();
        } else {
            self.state = ProtocolState::SecurityResult;
        }
    }

    /// Read the u32 security result; zero proceeds, anything else is a
    /// terminal authentication failure (3.8 appends a reason string).
    fn parse_security_result(&mut self) {
        let result = match self.rx.peek_u32_at(0) {
            Some(v) => v,
            None => return,
        };
        if result == protocol::SECURITY_RESULT_OK {
            self.rx.skip(4);
            self.client_init();
            return;
        }

        let reason = if self.protocol_version == ProtocolVersion::V38 {
            let Some(reason) = self.try_take_reason(4) else {
                return;
            };
            Some(reason)
        } else {
            self.rx.skip(4);
            None
        };
        warn!("authentication failed: {reason:?}");
        self.emit(ClientEvent::AuthenticationFailed { reason });
        self.state = ProtocolState::AuthFailure;
    }

    /// Send `ClientInit` (shared flag set) and advance to `ServerInit`.
    /// Synchronous: no server bytes are awaited in between.
    fn client_init(&mut self) {
        self.outgoing.extend_from_slice(&[1]);
        self.state = ProtocolState::ServerInit;
    }

    /// Parse `ServerInit`, allocate the image, and send the pixel format,
    /// encoding list and initial full-frame update request.
    fn parse_server_init(&mut self) {
        // Fixed part (24 bytes) plus the name must be buffered before any
        // field is consumed.
        if self.rx.available() < 24 {
            return;
        }
        let name_len = match self.rx.peek_u32_at(20) {
            Some(len) => len as usize,
            None => return,
        };
        if self.rx.available() < 24 + name_len {
            return;
        }

        let width = self.rx.get_u16();
        let height = self.rx.get_u16();
        self.pixel_format = PixelFormat::read_from(&mut self.rx);
        self.rx.skip(4); // name length, already peeked
        let name = self.rx.take_vec(name_len);
        debug!(
            "server \"{}\": {width}x{height}, {:?}",
            String::from_utf8_lossy(&name),
            self.pixel_format
        );

        self.framebuffer_width = width;
        self.framebuffer_height = height;
        self.emit(ClientEvent::FramebufferSizeChanged { width, height });
        self.framebuffer.allocate(width, height);

        protocol::set_pixel_format(&mut self.outgoing, &self.pixel_format);
        protocol::set_encodings(&mut self.outgoing, &supported_encodings());
        protocol::framebuffer_update_request(&mut self.outgoing, false, 0, 0, width, height);
        self.state = ProtocolState::Waiting;
    }

    /// Steady-state dispatch: continue an in-progress update, or read the
    /// next server message type.
    fn parse_server_messages(&mut self) {
        if self.cursor.active {
            self.continue_update();
            return;
        }
        let message_type = match self.rx.peek_at(0) {
            Some(t) => t,
            None => return,
        };
        match message_type {
            SERVER_MSG_FRAMEBUFFER_UPDATE => {
                // Type byte, padding byte, u16 rectangle count.
                if self.rx.available() < 4 {
                    return;
                }
                self.rx.skip(2);
                let total_rects = self.rx.get_u16();
                self.cursor = UpdateCursor {
                    active: true,
                    total_rects,
                    ..UpdateCursor::default()
                };
                self.cursor.hextile.start_update();
                self.continue_update();
            }
            other => {
                warn!("unknown server message type {other}, draining");
                self.rx.clear();
            }
        }
    }

    /// Decode rectangles until the update completes or input runs dry.
    fn continue_update(&mut self) {
        while self.cursor.current_rect < self.cursor.total_rects {
            if !self.cursor.header_read {
                if self.rx.available() < RECTANGLE_HEADER_LEN {
                    return;
                }
                self.cursor.rect = Rectangle::read_header(&mut self.rx);
                self.cursor.header_read = true;
                self.cursor.hextile.start_rectangle();
            }

            let rect = self.cursor.rect;
            let result: Result<Progress> = match rect.encoding {
                ENCODING_RAW => {
                    raw::decode(&mut self.rx, &rect, &self.pixel_format, &mut self.framebuffer)
                }
                ENCODING_COPYRECT => {
                    // Source position only; this client does not copy.
                    if self.rx.available() < 4 {
                        Ok(Progress::NeedMore)
                    } else {
                        self.rx.skip(4);
                        debug!("CopyRect rectangle skipped");
                        Ok(Progress::Complete)
                    }
                }
                ENCODING_HEXTILE => hextile::decode(
                    &mut self.rx,
                    &rect,
                    &self.pixel_format,
                    &mut self.framebuffer,
                    &mut self.cursor.hextile,
                ),
                #[cfg(feature = "zlib")]
                ENCODING_ZRLE => zrle::decode(
                    &mut self.rx,
                    &rect,
                    &self.pixel_format,
                    &mut self.framebuffer,
                    &mut self.streams,
                ),
                #[cfg(feature = "zlib")]
                ENCODING_TIGHT => tight::decode(
                    &mut self.rx,
                    &rect,
                    &self.pixel_format,
                    &mut self.framebuffer,
                    &mut self.streams,
                ),
                other => Err(VncError::UnsupportedEncoding(other)),
            };

            match result {
                Ok(Progress::NeedMore) => return,
                Ok(Progress::Complete) => {
                    if painted(rect.encoding) {
                        self.emit(ClientEvent::ImageChanged { rect });
                    }
                }
                Err(VncError::UnsupportedEncoding(encoding)) => {
                    // Safeguard; an advertised-encodings-only server never
                    // sends this, and its body length is unknowable.
                    warn!("unsupported encoding {encoding}, skipping rectangle");
                }
                Err(err @ VncError::Protocol(_)) => {
                    // The rectangle body cannot be delimited, so none of
                    // the remaining bytes can be parsed as rectangles.
                    error!("abandoning update, stream framing lost: {err}");
                    self.cursor = UpdateCursor::default();
                    self.rx.clear();
                    self.state = ProtocolState::Invalid;
                    return;
                }
                Err(err) => {
                    // Inflate and JPEG failures happen after the
                    // rectangle's bytes were consumed; framing holds.
                    warn!(
                        "dropping rectangle ({}, {}) {}x{}: {err}",
                        rect.x, rect.y, rect.width, rect.height
                    );
                }
            }
            self.cursor.current_rect += 1;
            self.cursor.header_read = false;
        }

        // Update complete: solicit the next frame.
        self.cursor.active = false;
        protocol::framebuffer_update_request(
            &mut self.outgoing,
            true,
            0,
            0,
            self.framebuffer_width,
            self.framebuffer_height,
        );
    }
}

/// Whether a completed rectangle of this encoding painted pixels.
fn painted(encoding: i32) -> bool {
    match encoding {
        ENCODING_RAW | ENCODING_HEXTILE => true,
        #[cfg(feature = "zlib")]
        ENCODING_ZRLE | ENCODING_TIGHT => true,
        _ => false,
    }
}

/// Encodings advertised to the server, in preference order.
fn supported_encodings() -> Vec<i32> {
    let mut encodings = Vec::new();
    #[cfg(feature = "zlib")]
    {
        encodings.push(ENCODING_TIGHT);
        encodings.push(ENCODING_ZRLE);
    }
    encodings.push(ENCODING_HEXTILE);
    encodings.push(ENCODING_RAW);
    encodings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_preference_order() {
        let encodings = supported_encodings();
        #[cfg(feature = "zlib")]
        assert_eq!(encodings, vec![7, 16, 5, 0]);
        #[cfg(not(feature = "zlib"))]
        assert_eq!(encodings, vec![5, 0]);
    }

    #[test]
    fn version_echo_and_transition() {
        let (mut client, mut events) = VncClient::new();
        client.connection_established();
        client.receive(b"RFB 003.008\n");
        assert_eq!(client.take_outgoing().as_ref(), b"RFB 003.008\n");
        assert_eq!(client.protocol_version(), ProtocolVersion::V38);

        assert!(matches!(
            events.try_recv(),
            Ok(ClientEvent::ConnectionStateChanged(true))
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(ClientEvent::ProtocolVersionChanged(ProtocolVersion::V38))
        ));
    }

    #[test]
    fn unsupported_version_fails() {
        let (mut client, _events) = VncClient::new();
        client.connection_established();
        client.receive(b"RFB 003.005\n");
        assert!(client.take_outgoing().is_empty());
        // Subsequent bytes are drained without effect.
        client.receive(&[1, 2, 3]);
        assert_eq!(client.protocol_version(), ProtocolVersion::Unknown);
    }

    #[test]
    fn partial_version_bytes_suspend() {
        let (mut client, _events) = VncClient::new();
        client.connection_established();
        client.receive(b"RFB 003.");
        assert!(client.take_outgoing().is_empty());
        client.receive(b"008\n");
        assert_eq!(client.take_outgoing().as_ref(), b"RFB 003.008\n");
    }

    #[test]
    fn v33_auth_waits_for_password() {
        let (mut client, mut events) = VncClient::new();
        client.connection_established();
        client.receive(b"RFB 003.003\n");
        let _ = client.take_outgoing();

        // Server dictates VNC authentication and sends a zero challenge.
        client.receive(&2u32.to_be_bytes());
        client.receive(&[0u8; 16]);
        assert!(client.take_outgoing().is_empty());

        // Drain events up to the password request.
        let mut saw_request = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ClientEvent::PasswordRequested) {
                saw_request = true;
            }
        }
        assert!(saw_request);

        // Supplying the password answers immediately; with an empty
        // password the response is DES(0-key, 0-block) twice. 3.3 then
        // proceeds straight to ClientInit, so the shared flag follows.
        client.set_password("");
        let out = client.take_outgoing();
        assert_eq!(out.len(), 17);
        assert_eq!(&out[0..8], &[0x8C, 0xA6, 0x4D, 0xE9, 0xC1, 0xB1, 0x23, 0xA7]);
        assert_eq!(&out[0..8], &out[8..16]);
        assert_eq!(out[16], 1);
    }
}
