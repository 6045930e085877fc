//! The 5-byte envelope header carried by ciphertexts and versioned
//! signatures: a format version byte followed by the producing key's
//! 4-byte hash.

use core::fmt;

use crate::KeyrollError;

/// The only envelope format in circulation. Readers reject anything else.
pub const VERSION_BYTE: u8 = 0x00;
pub const HASH_SIZE: usize = 4;
pub const HEADER_SIZE: usize = 1 + HASH_SIZE;

/// A short identifier for a key, derived from its canonical material.
///
/// A private key and its matching public key share the same hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyHash(pub [u8; HASH_SIZE]);

impl KeyHash {
    /// The key-hash portion of an envelope, bytes `[1..5]`, without
    /// interpreting the rest.
    pub fn from_envelope(bytes: &[u8]) -> Result<Self, KeyrollError> {
        if bytes.len() < HEADER_SIZE {
            return Err(KeyrollError::FormatError);
        }
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&bytes[1..HEADER_SIZE]);
        Ok(KeyHash(hash))
    }
}

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::base64::encode(&self.0))
    }
}

impl fmt::Debug for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHash({self})")
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Header {
    pub hash: KeyHash,
}

impl Header {
    pub fn new(hash: KeyHash) -> Self {
        Header { hash }
    }

    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = VERSION_BYTE;
        out[1..].copy_from_slice(&self.hash.0);
        out
    }

    /// Splits an envelope into its header and body.
    pub fn parse(bytes: &[u8]) -> Result<(Header, &[u8]), KeyrollError> {
        let (head, body) = bytes
            .split_first_chunk::<HEADER_SIZE>()
            .ok_or(KeyrollError::FormatError)?;
        if head[0] != VERSION_BYTE {
            return Err(KeyrollError::FormatError);
        }
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&head[1..]);
        Ok((Header::new(KeyHash(hash)), body))
    }
}
