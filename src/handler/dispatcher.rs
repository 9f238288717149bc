//! Command recognition and dispatch.
//!
//! The dispatcher sits between the transports and the codec: it decrypts
//! a received buffer, recognizes the command shape, builds the reply
//! document and hands it back re-encrypted. Anything it cannot decode or
//! does not recognize is dropped without a reply; errors never cross this
//! boundary back into the transport loops.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::sysinfo;
use crate::protocol::framing;
use crate::sensor::Sensors;

/// Recognized request shapes.
///
/// New verbs (on/off, color, brightness) are added here and matched in
/// [`Command::recognize`] ahead of the no-match fallthrough; each follows
/// the same decrypt, act, encrypt contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `{"system":{"get_sysinfo": ...}}`: device identity and state query.
    GetSysinfo,
}

impl Command {
    /// Recognize a parsed request document, if it matches a known shape.
    ///
    /// Only the presence of the `get_sysinfo` key inside the `system`
    /// object is inspected, never its value.
    pub fn recognize(message: &Value) -> Option<Self> {
        let system = message.get("system")?.as_object()?;
        if system.contains_key("get_sysinfo") {
            return Some(Command::GetSysinfo);
        }
        None
    }
}

/// Protocol dispatcher, shared by both transport tasks.
///
/// Holds no mutable state; every request is served from a fresh template
/// clone and the injected [`Sensors`] collaborator.
#[derive(Clone)]
pub struct Dispatcher {
    sensors: Arc<dyn Sensors>,
}

impl Dispatcher {
    /// Create a dispatcher reading live values from `sensors`.
    pub fn new(sensors: Arc<dyn Sensors>) -> Self {
        Self { sensors }
    }

    /// Process one received buffer and produce the encrypted reply.
    ///
    /// `framed` selects the TCP wire shape (4-byte length header) for both
    /// the inbound decrypt and the outbound encrypt; UDP datagrams pass
    /// `false`. Returns `None` when no reply should be sent: undecodable
    /// payload, unrecognized command shape, or an internal reply-building
    /// failure.
    pub fn handle(&self, raw: &[u8], framed: bool) -> Option<Bytes> {
        let frame = framing::decrypt(raw, framed);

        let message: Value = match serde_json::from_slice(&frame.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, len = raw.len(), "dropping undecodable request");
                return None;
            }
        };

        match Command::recognize(&message) {
            Some(Command::GetSysinfo) => {
                info!("system information requested");
                self.sysinfo_reply(framed)
            }
            None => {
                debug!(%message, "unrecognized command shape, no reply");
                None
            }
        }
    }

    fn sysinfo_reply(&self, framed: bool) -> Option<Bytes> {
        let temperature = self.sensors.temperature();
        let humidity = self.sensors.humidity();
        debug!(temperature, humidity, "sensor readings");

        let reply = sysinfo::build_sysinfo_reply(temperature, humidity)
            .and_then(|document| framing::encrypt(&document, framed));
        match reply {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "failed to build sysinfo reply");
                None
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
