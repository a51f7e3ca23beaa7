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

//! # rustvncclient
//!
//! A pure Rust implementation of a VNC (Virtual Network Computing) client.
//!
//! This library implements the client side of the RFB (Remote Framebuffer)
//! protocol as specified in RFC 6143: protocol and security negotiation,
//! DES challenge-response authentication, and continuous decoding of
//! framebuffer updates into an ARGB32 image, with keyboard and pointer
//! events flowing back to the server.
//!
//! ## Features
//!
//! - **Protocol versions**: RFB 3.3, 3.7 and 3.8
//! - **Security types**: None and VNC Authentication (self-contained DES)
//! - **Encodings**: Raw, Hextile, ZRLE and Tight (palette, gradient and
//!   JPEG modes), with persistent zlib dictionaries across rectangles
//! - **Sans-I/O core**: the protocol state machine never blocks; it
//!   consumes buffered bytes, suspends mid-rectangle when data runs out,
//!   and resumes exactly where it stopped
//! - **Async adapter**: a Tokio event loop driving the core over any
//!   `AsyncRead + AsyncWrite` stream
//!
//! ## Quick Start
//!
//! ```no_run
//! use rustvncclient::{ClientCommand, ClientEvent, VncClient};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut client, mut events) = VncClient::new();
//!     client.set_password("secret");
//!
//!     let (commands, command_rx) = mpsc::unbounded_channel::<ClientCommand>();
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             if let ClientEvent::ImageChanged { rect } = event {
//!                 println!("updated {}x{} at ({}, {})", rect.width, rect.height, rect.x, rect.y);
//!             }
//!         }
//!     });
//!
//!     rustvncclient::net::connect("localhost", 5900, &mut client, command_rx).await?;
//!     drop(commands);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Your Application              │
//! │                                         │
//! │  • Read ClientEvents (image updates)    │
//! │  • Send ClientCommands (input, auth)    │
//! └──────────────────┬──────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │        net adapter (Tokio loop)         │
//! │                                         │
//! │  socket bytes  -> client.receive()      │
//! │  take_outgoing() -> socket writes       │
//! └──────────────────┬──────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │        VncClient (state machine)        │
//! │                                         │
//! │  handshake / auth / ServerInit          │
//! │  update cursor + rectangle decoders     │
//! │  framebuffer (ARGB32) + zlib streams    │
//! └─────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod events;
pub mod framebuffer;
pub mod input;
pub mod net;
pub mod protocol;

// Internal modules
mod auth;
mod decoding;
mod pixel_format;
mod stream;

// Re-exports
pub use client::VncClient;
pub use error::{Result, VncError};
pub use events::ClientEvent;
pub use framebuffer::Framebuffer;
pub use input::Key;
pub use net::ClientCommand;
pub use pixel_format::PixelFormat;
pub use protocol::{ProtocolVersion, Rectangle, SecurityType};

/// Default VNC port.
pub const DEFAULT_PORT: u16 = 5900;
