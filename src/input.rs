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

//! Keyboard and pointer input encoding.
//!
//! Input events travel client-to-server as `KeyEvent` (0x04) and
//! `PointerEvent` (0x05) messages. Named non-text keys map to fixed X11
//! keysyms; everything else uses the Unicode code point of the character.

use bytes::{BufMut, BytesMut};

use crate::protocol::{CLIENT_MSG_KEY_EVENT, CLIENT_MSG_POINTER_EVENT};

/// Pointer button mask bit for the left button.
pub const BUTTON_LEFT: u8 = 1 << 0;

/// Pointer button mask bit for the middle button.
pub const BUTTON_MIDDLE: u8 = 1 << 1;

/// Pointer button mask bit for the right button.
pub const BUTTON_RIGHT: u8 = 1 << 2;

/// A key that can be sent to the server.
///
/// Named variants cover the non-text keys (navigation, editing, function
/// keys, modifiers); [`Key::Char`] covers everything a keystroke produces
/// as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Backspace.
    Backspace,
    /// Tab.
    Tab,
    /// Return / Enter.
    Return,
    /// Insert.
    Insert,
    /// Delete.
    Delete,
    /// Home.
    Home,
    /// End.
    End,
    /// Page Up.
    PageUp,
    /// Page Down.
    PageDown,
    /// Left arrow.
    Left,
    /// Up arrow.
    Up,
    /// Right arrow.
    Right,
    /// Down arrow.
    Down,
    /// Function key F1..F12 (1-based).
    Function(u8),
    /// Shift modifier.
    Shift,
    /// Control modifier.
    Control,
    /// Meta / Super modifier.
    Meta,
    /// Alt modifier.
    Alt,
    /// A character key; the keysym is its Unicode code point.
    Char(char),
}

impl Key {
    /// The X11 keysym transmitted for this key.
    pub fn keysym(self) -> u32 {
        match self {
            Self::Backspace => 0xff08,
            Self::Tab => 0xff09,
            Self::Return => 0xff0d,
            Self::Insert => 0xff63,
            Self::Delete => 0xffff,
            Self::Home => 0xff50,
            Self::End => 0xff57,
            Self::PageUp => 0xff55,
            Self::PageDown => 0xff56,
            Self::Left => 0xff51,
            Self::Up => 0xff52,
            Self::Right => 0xff53,
            Self::Down => 0xff54,
            // F1 = 0xffbe .. F12 = 0xffc9.
            Self::Function(n) => 0xffbe + u32::from(n.clamp(1, 12)) - 1,
            Self::Shift => 0xffe1,
            Self::Control => 0xffe3,
            Self::Meta => 0xffe7,
            Self::Alt => 0xffe9,
            Self::Char(c) => c as u32,
        }
    }
}

/// Append a `KeyEvent` message: type, down-flag, 2 bytes padding, keysym.
pub fn key_event(buf: &mut BytesMut, down: bool, keysym: u32) {
    buf.put_u8(CLIENT_MSG_KEY_EVENT);
    buf.put_u8(u8::from(down));
    buf.put_bytes(0, 2); // padding
    buf.put_u32(keysym);
}

/// Append a `PointerEvent` message: type, button mask, x, y.
pub fn pointer_event(buf: &mut BytesMut, button_mask: u8, x: u16, y: u16) {
    buf.put_u8(CLIENT_MSG_POINTER_EVENT);
    buf.put_u8(button_mask);
    buf.put_u16(x);
    buf.put_u16(y);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keysym_table() {
        assert_eq!(Key::Backspace.keysym(), 0xff08);
        assert_eq!(Key::Delete.keysym(), 0xffff);
        assert_eq!(Key::Function(1).keysym(), 0xffbe);
        assert_eq!(Key::Function(12).keysym(), 0xffc9);
        assert_eq!(Key::Alt.keysym(), 0xffe9);
        assert_eq!(Key::Char('a').keysym(), 0x61);
        assert_eq!(Key::Char('é').keysym(), 0xe9);
    }

    #[test]
    fn key_event_wire_format() {
        let mut buf = BytesMut::new();
        key_event(&mut buf, true, Key::Return.keysym());
        assert_eq!(&buf[..], &[0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0xff, 0x0d]);
    }

    #[test]
    fn pointer_event_wire_format() {
        let mut buf = BytesMut::new();
        pointer_event(&mut buf, BUTTON_LEFT | BUTTON_RIGHT, 0x0102, 0x0304);
        assert_eq!(&buf[..], &[0x05, 0x05, 0x01, 0x02, 0x03, 0x04]);
    }
}
