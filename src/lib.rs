//! # kasa-bridge
//!
//! Emulator for the TP-Link Kasa smart-bulb wire protocol. A substitute
//! device built on this crate answers discovery scans and control
//! commands from the vendor's mobile app and cloud relay exactly like a
//! real KL130B bulb.
//!
//! ## Architecture
//!
//! - **Protocol** (`protocol`): XOR-autokey cipher (initial key 171) and
//!   the 4-byte big-endian length framing used on TCP.
//! - **Handler** (`handler`): JSON command dispatcher; recognizes the
//!   `get_sysinfo` query and fills the device template with live sensor
//!   readings.
//! - **Transport** (`transport`): one TCP and one UDP task on port 9999,
//!   stopped through a cancellation token.
//! - **Connectivity** (`connectivity`): link-event driven start/stop.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kasa_bridge::sensor::StaticSensors;
//! use kasa_bridge::{Dispatcher, Server, ServerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> kasa_bridge::Result<()> {
//!     let dispatcher = Dispatcher::new(Arc::new(StaticSensors::new(21.0, 45.0)));
//!     let server = Server::bind(ServerConfig::default(), dispatcher).await?;
//!     let handle = server.spawn(CancellationToken::new());
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod connectivity;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod sensor;
pub mod transport;

pub use error::{KasaError, Result};
pub use handler::Dispatcher;
pub use transport::{Server, ServerConfig, ServerHandle, KASA_PORT};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
