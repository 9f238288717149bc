//! Frame encryption and decryption.
//!
//! A TCP frame is `[4-byte big-endian length][autokey ciphertext]`; a UDP
//! datagram is the ciphertext alone. Decryption is deliberately lenient
//! about the length header: a declared length that exceeds the bytes on
//! hand (a partial read, or a headerless datagram whose first ciphertext
//! bytes happen to decode as a huge length) falls back to treating the
//! entire buffer as ciphertext. That fallback must be preserved exactly to
//! interoperate with the vendor client ecosystem.

use bytes::Bytes;
use serde_json::Value;

use super::cipher;
use crate::error::Result;

/// Length header size in bytes.
pub const HEADER_SIZE: usize = 4;

/// Result of decrypting one received buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedFrame {
    /// Decrypted payload, exactly sized. Callers parse it as JSON text.
    pub payload: Bytes,
    /// Whether a length header was actually consumed. False when the
    /// header was absent, implausible, or the input was too short.
    pub header_consumed: bool,
}

/// Decrypt a received buffer.
///
/// Inputs no longer than the header yield an empty payload; this is a
/// defined empty-result policy, not an error. The first four bytes are
/// always parsed as a big-endian length, but they only take effect when
/// `header_present` is set and the declared length fits the buffer;
/// otherwise the whole buffer is deciphered as payload.
pub fn decrypt(input: &[u8], header_present: bool) -> DecryptedFrame {
    if input.len() <= HEADER_SIZE {
        return DecryptedFrame {
            payload: Bytes::new(),
            header_consumed: false,
        };
    }

    let declared_len = u32::from_be_bytes([input[0], input[1], input[2], input[3]]) as usize;

    // Truncation fallback: a declared length bigger than the bytes on hand
    // means a partial read, so decode the whole buffer just in case.
    let (body, header_consumed) = if !header_present || declared_len > input.len() - HEADER_SIZE {
        (input, false)
    } else {
        (&input[HEADER_SIZE..HEADER_SIZE + declared_len], true)
    };

    DecryptedFrame {
        payload: cipher::decipher(body).into(),
        header_consumed,
    }
}

/// Serialize a JSON document (minimal form) and encrypt it.
///
/// With `include_header` set, the plaintext length is prepended as four
/// big-endian bytes; otherwise the ciphertext begins at offset zero. The
/// returned buffer is exactly sized, so callers frame replies by its
/// length and never transmit stale tail bytes.
pub fn encrypt(document: &Value, include_header: bool) -> Result<Bytes> {
    let plain = serde_json::to_vec(document)?;
    let body = cipher::encipher(&plain);

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    if include_header {
        out.extend_from_slice(&(plain.len() as u32).to_be_bytes());
    }
    out.extend_from_slice(&body);
    Ok(out.into())
}
