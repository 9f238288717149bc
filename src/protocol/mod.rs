//! Wire protocol layer: autokey cipher and length framing.

pub mod cipher;
pub mod framing;

pub use cipher::INITIAL_KEY;
pub use framing::{decrypt, encrypt, DecryptedFrame, HEADER_SIZE};
