//! XOR autokey cipher used by the Kasa device protocol.
//!
//! Every message starts from the same fixed key byte (171). On encipher,
//! each plaintext byte is XORed with the running key and the *output* byte
//! becomes the next key. On decipher, the running key chains on the
//! *input* byte instead, which is the same ciphertext byte the encipher
//! side just produced, so the two key streams are identical and
//! `decipher(encipher(p)) == p`.
//!
//! This is an obfuscation scheme, not cryptography. It must match the
//! vendor ecosystem bit-for-bit and is deliberately not strengthened.
//!
//! # Example
//!
//! ```
//! use kasa_bridge::protocol::cipher::{decipher, encipher};
//!
//! let cipher = encipher(b"{\"a\":1}");
//! assert_eq!(decipher(&cipher), b"{\"a\":1}");
//! ```

/// Initial autokey value, reseeded at the start of every message in each
/// direction.
pub const INITIAL_KEY: u8 = 171;

/// Encipher a plaintext buffer.
///
/// The key chains on each produced ciphertext byte.
pub fn encipher(plain: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    plain
        .iter()
        .map(|&b| {
            let c = b ^ key;
            key = c;
            c
        })
        .collect()
}

/// Decipher a ciphertext buffer.
///
/// The key chains on each consumed ciphertext byte.
pub fn decipher(cipher: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    cipher
        .iter()
        .map(|&b| {
            let p = b ^ key;
            key = b;
            p
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ciphertext_vector() {
        // Hand-computed for the 7 characters of {"a":1} at key 171.
        let cipher = encipher(b"{\"a\":1}");
        assert_eq!(cipher, [0xD0, 0xF2, 0x93, 0xB1, 0x8B, 0xBA, 0xC7]);
    }

    #[test]
    fn test_roundtrip() {
        let plain = br#"{"system":{"get_sysinfo":{}}}"#;
        assert_eq!(decipher(&encipher(plain)), plain);
    }

    #[test]
    fn test_roundtrip_all_byte_values() {
        let plain: Vec<u8> = (0..=255u8).collect();
        assert_eq!(decipher(&encipher(&plain)), plain);
    }

    #[test]
    fn test_empty_input() {
        assert!(encipher(b"").is_empty());
        assert!(decipher(b"").is_empty());
    }

    #[test]
    fn test_key_reseeds_per_message() {
        // Two identical messages must produce identical ciphertext.
        let a = encipher(b"hello");
        let b = encipher(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn test_first_byte_uses_initial_key() {
        let cipher = encipher(&[0x00]);
        assert_eq!(cipher, [INITIAL_KEY]);
    }
}
