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

//! Transport adapter driving a [`VncClient`] over an async byte stream.
//!
//! The protocol core is synchronous and sans-I/O; this module supplies the
//! event loop around it: socket reads become [`VncClient::receive`] calls,
//! queued output is flushed after every step, and input from the
//! application arrives on a command channel so a UI can inject events
//! while the loop owns the session.
//!
//! Any stream implementing `AsyncRead + AsyncWrite + Unpin` works: TCP,
//! TLS wrappers, WebSocket adapters, or an in-memory duplex in tests.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::client::VncClient;
use crate::error::Result;
use crate::input::Key;

/// Input commands the application can inject into a running session.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Press or release a key.
    KeyEvent {
        /// The key.
        key: Key,
        /// True for press, false for release.
        down: bool,
    },
    /// Move the pointer / change button state.
    PointerEvent {
        /// Button mask (bit 0 left, bit 1 middle, bit 2 right).
        button_mask: u8,
        /// X coordinate.
        x: u16,
        /// Y coordinate.
        y: u16,
    },
    /// Type a string as press/release pairs.
    TypeText(String),
    /// Supply the password for VNC authentication.
    SetPassword(String),
}

/// Connect to a VNC server over TCP and drive the session until the
/// connection closes.
pub async fn connect(
    host: &str,
    port: u16,
    client: &mut VncClient,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
) -> Result<()> {
    let stream = TcpStream::connect((host, port)).await?;
    // Disable Nagle's algorithm so input events go out immediately.
    stream.set_nodelay(true)?;
    run_client(stream, client, commands).await
}

/// Drive a session over any established async byte stream.
///
/// Returns when the peer closes the stream (after resetting the session)
/// or when an I/O error occurs.
pub async fn run_client<S>(
    mut stream: S,
    client: &mut VncClient,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    client.connection_established();
    flush(&mut stream, client).await?;

    let mut buf = BytesMut::with_capacity(16 * 1024);
    let mut commands_open = true;
    loop {
        tokio::select! {
            result = stream.read_buf(&mut buf) => {
                if result? == 0 {
                    client.disconnected();
                    return Ok(());
                }
                client.receive(&buf);
                buf.clear();
                flush(&mut stream, client).await?;
            }
            command = commands.recv(), if commands_open => {
                match command {
                    Some(command) => {
                        apply_command(client, command);
                        flush(&mut stream, client).await?;
                    }
                    None => commands_open = false,
                }
            }
        }
    }
}

fn apply_command(client: &mut VncClient, command: ClientCommand) {
    match command {
        ClientCommand::KeyEvent { key, down } => client.send_key_event(key, down),
        ClientCommand::PointerEvent { button_mask, x, y } => {
            client.send_pointer_event(button_mask, x, y);
        }
        ClientCommand::TypeText(text) => client.type_text(&text),
        ClientCommand::SetPassword(password) => client.set_password(password),
    }
}

async fn flush<S>(stream: &mut S, client: &mut VncClient) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let outgoing = client.take_outgoing();
    if !outgoing.is_empty() {
        stream.write_all(&outgoing).await?;
        stream.flush().await?;
    }
    Ok(())
}
