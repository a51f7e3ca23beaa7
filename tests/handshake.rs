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

//! End-to-end handshake scenarios against synthetic server byte streams.

use rustvncclient::{ClientEvent, ProtocolVersion, SecurityType, VncClient};
use tokio::sync::mpsc::UnboundedReceiver;

/// 32bpp little-endian RGB888 pixel format as sent by a server.
const PIXEL_FORMAT: [u8; 16] = [32, 24, 0, 1, 0, 255, 0, 255, 0, 255, 16, 8, 0, 0, 0, 0];

fn server_init(width: u16, height: u16, name: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&PIXEL_FORMAT);
    bytes.extend_from_slice(&(name.len() as u32).to_be_bytes());
    bytes.extend_from_slice(name.as_bytes());
    bytes
}

fn drain_events(events: &mut UnboundedReceiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

#[test]
fn v38_none_handshake_signal_sequence() {
    let (mut client, mut events) = VncClient::new();
    client.connection_established();

    client.receive(b"RFB 003.008\n");
    assert_eq!(client.take_outgoing().as_ref(), b"RFB 003.008\n");

    // Server advertises {None}; client selects it with a single byte.
    client.receive(&[1, 1]);
    assert_eq!(client.take_outgoing().as_ref(), &[1u8]);
    assert_eq!(client.security_type(), SecurityType::None);

    // SecurityResult OK; the client responds with ClientInit (shared = 1).
    client.receive(&[0, 0, 0, 0]);
    assert_eq!(client.take_outgoing().as_ref(), &[1u8]);

    client.receive(&server_init(640, 480, "test server"));
    assert_eq!(client.framebuffer_width(), 640);
    assert_eq!(client.framebuffer_height(), 480);

    // After ServerInit: SetPixelFormat (20) + SetEncodings + a
    // non-incremental full-frame FramebufferUpdateRequest (10).
    let out = client.take_outgoing();
    assert_eq!(out[0], 0x00);
    assert_eq!(&out[4..20], &PIXEL_FORMAT);
    assert_eq!(out[20], 0x02);
    let encoding_count = usize::from(u16::from_be_bytes([out[22], out[23]]));
    let request_start = 24 + encoding_count * 4;
    assert_eq!(
        &out[request_start..],
        &[0x03, 0x00, 0, 0, 0, 0, 0x02, 0x80, 0x01, 0xe0]
    );

    let seen = drain_events(&mut events);
    assert!(matches!(seen[0], ClientEvent::ConnectionStateChanged(true)));
    assert!(matches!(
        seen[1],
        ClientEvent::ProtocolVersionChanged(ProtocolVersion::V38)
    ));
    assert!(matches!(
        seen[2],
        ClientEvent::SecurityTypeChanged(SecurityType::None)
    ));
    assert!(matches!(
        seen[3],
        ClientEvent::FramebufferSizeChanged {
            width: 640,
            height: 480
        }
    ));
}

#[test]
fn v38_vnc_auth_with_preset_password() {
    let (mut client, _events) = VncClient::new();
    client.set_password("");
    client.connection_established();

    client.receive(b"RFB 003.008\n");
    let _ = client.take_outgoing();

    // Server advertises {VncAuth}; the client selects it.
    client.receive(&[1, 2]);
    assert_eq!(client.take_outgoing().as_ref(), &[2u8]);
    assert_eq!(client.security_type(), SecurityType::VncAuth);

    // All-zero challenge with an empty password: both halves are
    // DES(all-zero key, all-zero block).
    client.receive(&[0u8; 16]);
    let response = client.take_outgoing();
    assert_eq!(response.len(), 16);
    let expected = [0x8C, 0xA6, 0x4D, 0xE9, 0xC1, 0xB1, 0x23, 0xA7];
    assert_eq!(&response[0..8], &expected);
    assert_eq!(&response[8..16], &expected);

    // SecurityResult OK continues to ClientInit.
    client.receive(&[0, 0, 0, 0]);
    assert_eq!(client.take_outgoing().as_ref(), &[1u8]);
}

#[test]
fn v33_auth_challenge_waits_for_password() {
    let (mut client, mut events) = VncClient::new();
    client.connection_established();

    client.receive(b"RFB 003.003\n");
    let _ = client.take_outgoing();

    // 3.3: the server dictates VncAuth directly; no selection byte.
    client.receive(&[0, 0, 0, 2]);
    assert_eq!(client.security_type(), SecurityType::VncAuth);
    assert!(client.take_outgoing().is_empty());

    // Challenge arrives before any password is configured.
    client.receive(&[0u8; 16]);
    assert!(client.take_outgoing().is_empty());
    let seen = drain_events(&mut events);
    assert!(seen
        .iter()
        .any(|e| matches!(e, ClientEvent::PasswordRequested)));

    // Setting the password completes the exchange; 3.3 has no
    // SecurityResult so ClientInit's shared flag follows directly.
    client.set_password("password");
    let out = client.take_outgoing();
    assert_eq!(out.len(), 17);
    assert_eq!(out[16], 1);
    // Both halves encrypt the same zero block with the same key.
    assert_eq!(&out[0..8], &out[8..16]);
    // The key differs from the all-zero key, so the ciphertext differs
    // from the empty-password response.
    assert_ne!(&out[0..8], &[0x8C, 0xA6, 0x4D, 0xE9, 0xC1, 0xB1, 0x23, 0xA7]);
}

#[test]
fn v38_auth_failure_reports_reason() {
    let (mut client, mut events) = VncClient::new();
    client.set_password("wrong");
    client.connection_established();

    client.receive(b"RFB 003.008\n");
    client.receive(&[1, 2]);
    client.receive(&[7u8; 16]);
    let _ = client.take_outgoing();

    // Non-zero SecurityResult with a reason string (3.8 only).
    let mut failure = vec![0, 0, 0, 1];
    failure.extend_from_slice(&9u32.to_be_bytes());
    failure.extend_from_slice(b"bad creds");
    client.receive(&failure);

    let seen = drain_events(&mut events);
    assert!(seen.iter().any(|e| matches!(
        e,
        ClientEvent::AuthenticationFailed { reason: Some(r) } if r == "bad creds"
    )));
}

#[test]
fn v37_none_skips_security_result() {
    let (mut client, _events) = VncClient::new();
    client.connection_established();

    client.receive(b"RFB 003.007\n");
    let _ = client.take_outgoing();

    // 3.7 with None goes straight to ClientInit after the selection byte.
    client.receive(&[1, 1]);
    assert_eq!(client.take_outgoing().as_ref(), &[1u8, 1u8]);
}

#[test]
fn refusal_reason_is_surfaced() {
    let (mut client, mut events) = VncClient::new();
    client.connection_established();

    client.receive(b"RFB 003.008\n");
    let _ = client.take_outgoing();

    // Zero security types: a reason string follows.
    let mut refusal = vec![0u8];
    refusal.extend_from_slice(&4u32.to_be_bytes());
    refusal.extend_from_slice(b"nope");
    client.receive(&refusal);

    let seen = drain_events(&mut events);
    assert!(seen.iter().any(|e| matches!(
        e,
        ClientEvent::AuthenticationFailed { reason: Some(r) } if r == "nope"
    )));
    assert_eq!(client.security_type(), SecurityType::Invalid);
}

/// A complete recorded session: handshake plus one Raw update.
fn recorded_stream() -> Vec<u8> {
    let mut stream = Vec::new();
    stream.extend_from_slice(b"RFB 003.008\n");
    stream.extend_from_slice(&[1, 1]); // security: {None}
    stream.extend_from_slice(&[0, 0, 0, 0]); // SecurityResult OK
    stream.extend_from_slice(&server_init(4, 4, "resume"));

    // One FramebufferUpdate with a 2x2 Raw rectangle at (1, 1).
    stream.extend_from_slice(&[0, 0, 0, 1]);
    stream.extend_from_slice(&1u16.to_be_bytes());
    stream.extend_from_slice(&1u16.to_be_bytes());
    stream.extend_from_slice(&2u16.to_be_bytes());
    stream.extend_from_slice(&2u16.to_be_bytes());
    stream.extend_from_slice(&0i32.to_be_bytes());
    for pixel in [0x00FF_0000u32, 0x0000_FF00, 0x0000_00FF, 0x00FF_FFFF] {
        stream.extend_from_slice(&pixel.to_le_bytes());
    }
    stream
}

fn run_session(chunks: &[&[u8]]) -> (VncClient, Vec<ClientEvent>) {
    let (mut client, mut events) = VncClient::new();
    client.connection_established();
    for chunk in chunks {
        client.receive(chunk);
        let _ = client.take_outgoing();
    }
    let seen = drain_events(&mut events);
    (client, seen)
}

#[test]
fn raw_update_paints_pixels_and_emits_once() {
    let stream = recorded_stream();
    let (client, seen) = run_session(&[&stream]);

    let fb = client.framebuffer();
    assert_eq!(fb.pixel(1, 1), Some(0xFFFF_0000)); // red
    assert_eq!(fb.pixel(2, 1), Some(0xFF00_FF00)); // green
    assert_eq!(fb.pixel(1, 2), Some(0xFF00_00FF)); // blue
    assert_eq!(fb.pixel(2, 2), Some(0xFFFF_FFFF)); // white
    assert_eq!(fb.pixel(0, 0), Some(0xFFFF_FFFF)); // untouched background

    let image_changes = seen
        .iter()
        .filter(|e| matches!(e, ClientEvent::ImageChanged { .. }))
        .count();
    assert_eq!(image_changes, 1);
}

#[test]
fn one_update_request_after_final_rectangle() {
    let stream = recorded_stream();
    let (mut client, _events) = VncClient::new();
    client.connection_established();

    // Feed the handshake, drain its outgoing traffic.
    let update_start = stream.len() - (4 + 12 + 16);
    client.receive(&stream[..update_start]);
    let _ = client.take_outgoing();

    // Feed the update; the only response is one incremental full-frame
    // request.
    client.receive(&stream[update_start..]);
    let out = client.take_outgoing();
    assert_eq!(out.as_ref(), &[0x03, 0x01, 0, 0, 0, 0, 0, 4, 0, 4]);
}

#[test]
fn resumability_across_all_split_points() {
    let stream = recorded_stream();
    let (reference, _) = run_session(&[&stream]);
    let expected = reference.framebuffer().data().to_vec();
    assert!(!expected.is_empty());

    for split in 0..=stream.len() {
        let (client, _) = run_session(&[&stream[..split], &stream[split..]]);
        assert_eq!(
            client.framebuffer().data(),
            &expected[..],
            "split at byte {split}"
        );
    }
}

#[test]
fn resumability_byte_by_byte() {
    let stream = recorded_stream();
    let (reference, _) = run_session(&[&stream]);

    let chunks: Vec<&[u8]> = stream.chunks(1).collect();
    let (client, _) = run_session(&chunks);
    assert_eq!(client.framebuffer().data(), reference.framebuffer().data());
}

#[test]
fn disconnect_resets_session() {
    let stream = recorded_stream();
    let (mut client, mut events) = VncClient::new();
    client.connection_established();
    client.receive(&stream);
    let _ = drain_events(&mut events);

    client.disconnected();
    assert!(client.framebuffer().is_empty());
    assert_eq!(client.protocol_version(), ProtocolVersion::Unknown);
    assert_eq!(client.framebuffer_width(), 0);

    let seen = drain_events(&mut events);
    assert!(seen
        .iter()
        .any(|e| matches!(e, ClientEvent::ConnectionStateChanged(false))));
}
