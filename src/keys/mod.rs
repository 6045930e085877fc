//! Key material: six variants over a shared capability surface.
//!
//! Every variant knows its canonical JSON value, its 4-byte hash, and
//! whichever of {sign, verify, encrypt, decrypt} its algorithm offers.
//! Asking a key for a capability it does not have is an
//! [`UnsupportedAlgorithm`](crate::KeyrollError::UnsupportedAlgorithm)
//! error, never a panic.

mod aes;
mod dsa;
mod hmac;
mod rsa;

pub use aes::{AesKey, CipherMode};
pub use dsa::{DsaPrivateKey, DsaPublicKey};
pub use hmac::{HmacKey, TAG_SIZE};
pub use rsa::{RsaPrivateKey, RsaPublicKey};

use num_bigint_dig::BigUint;

use crate::envelope::{Header, KeyHash, HEADER_SIZE};
use crate::metadata::KeyType;
use crate::{base64, KeyrollError};

/// A key of any supported algorithm.
#[derive(Clone)]
pub enum Key {
    Hmac(HmacKey),
    Aes(AesKey),
    RsaPublic(RsaPublicKey),
    RsaPrivate(RsaPrivateKey),
    DsaPublic(DsaPublicKey),
    DsaPrivate(DsaPrivateKey),
}

impl Key {
    /// Generates fresh material of the given type and bit size.
    pub fn generate(key_type: KeyType, size: u32) -> Result<Self, KeyrollError> {
        match key_type {
            KeyType::HmacSha1 => HmacKey::generate(size).map(Key::Hmac),
            KeyType::Aes => AesKey::generate(size).map(Key::Aes),
            KeyType::RsaPriv => RsaPrivateKey::generate(size).map(Key::RsaPrivate),
            KeyType::DsaPriv => DsaPrivateKey::generate(size).map(Key::DsaPrivate),
            // Public halves are derived from a private key, never drawn.
            KeyType::RsaPub | KeyType::DsaPub => Err(KeyrollError::UnsupportedAlgorithm),
        }
    }

    /// Loads a key of the given type from its canonical JSON value.
    pub fn from_value(key_type: KeyType, value: &serde_json::Value) -> Result<Self, KeyrollError> {
        match key_type {
            KeyType::HmacSha1 => HmacKey::from_value(value).map(Key::Hmac),
            KeyType::Aes => AesKey::from_value(value).map(Key::Aes),
            KeyType::RsaPriv => RsaPrivateKey::from_value(value).map(Key::RsaPrivate),
            KeyType::RsaPub => RsaPublicKey::from_value(value).map(Key::RsaPublic),
            KeyType::DsaPriv => DsaPrivateKey::from_value(value).map(Key::DsaPrivate),
            KeyType::DsaPub => DsaPublicKey::from_value(value).map(Key::DsaPublic),
        }
    }

    /// The canonical JSON value, as persisted in a keyset version file.
    pub fn to_value(&self) -> Result<serde_json::Value, KeyrollError> {
        match self {
            Key::Hmac(k) => k.to_value(),
            Key::Aes(k) => k.to_value(),
            Key::RsaPublic(k) => k.to_value(),
            Key::RsaPrivate(k) => k.to_value(),
            Key::DsaPublic(k) => k.to_value(),
            Key::DsaPrivate(k) => k.to_value(),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Hmac(_) => KeyType::HmacSha1,
            Key::Aes(_) => KeyType::Aes,
            Key::RsaPublic(_) => KeyType::RsaPub,
            Key::RsaPrivate(_) => KeyType::RsaPriv,
            Key::DsaPublic(_) => KeyType::DsaPub,
            Key::DsaPrivate(_) => KeyType::DsaPriv,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            Key::Hmac(k) => k.size(),
            Key::Aes(k) => k.size(),
            Key::RsaPublic(k) => k.size(),
            Key::RsaPrivate(k) => k.size(),
            Key::DsaPublic(k) => k.size(),
            Key::DsaPrivate(k) => k.size(),
        }
    }

    pub fn hash(&self) -> KeyHash {
        match self {
            Key::Hmac(k) => k.hash(),
            Key::Aes(k) => k.hash(),
            Key::RsaPublic(k) => k.hash(),
            Key::RsaPrivate(k) => k.hash(),
            Key::DsaPublic(k) => k.hash(),
            Key::DsaPrivate(k) => k.hash(),
        }
    }

    /// The 5-byte envelope header this key stamps on its output.
    pub fn header(&self) -> [u8; HEADER_SIZE] {
        Header::new(self.hash()).to_bytes()
    }

    /// Raw signature bytes over `data`. The caller frames them.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        match self {
            Key::Hmac(k) => Ok(k.sign(data)),
            Key::RsaPrivate(k) => k.sign(data),
            Key::DsaPrivate(k) => k.sign(data),
            _ => Err(KeyrollError::UnsupportedAlgorithm),
        }
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyrollError> {
        match self {
            Key::Hmac(k) => k.verify(data, signature),
            Key::RsaPublic(k) => k.verify(data, signature),
            Key::RsaPrivate(k) => k.public().verify(data, signature),
            Key::DsaPublic(k) => k.verify(data, signature),
            Key::DsaPrivate(k) => k.public().verify(data, signature),
            _ => Err(KeyrollError::UnsupportedAlgorithm),
        }
    }

    /// Produces a complete envelope, header included.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        match self {
            Key::Aes(k) => k.encrypt(plaintext),
            Key::RsaPublic(k) => k.encrypt(plaintext),
            Key::RsaPrivate(k) => k.public().encrypt(plaintext),
            _ => Err(KeyrollError::UnsupportedAlgorithm),
        }
    }

    /// Consumes a complete envelope, header included.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        match self {
            Key::Aes(k) => k.decrypt(envelope),
            Key::RsaPrivate(k) => k.decrypt(envelope),
            _ => Err(KeyrollError::UnsupportedAlgorithm),
        }
    }
}

/// Big-endian integer bytes for JSON: a two's-complement positive value,
/// so a set high bit gains a leading zero byte.
pub(crate) fn big_to_b64(n: &BigUint) -> String {
    let bytes = n.to_bytes_be();
    if bytes[0] & 0x80 != 0 {
        let mut padded = Vec::with_capacity(bytes.len() + 1);
        padded.push(0);
        padded.extend_from_slice(&bytes);
        base64::encode(&padded)
    } else {
        base64::encode(&bytes)
    }
}

pub(crate) fn big_from_b64(s: &str) -> Result<BigUint, KeyrollError> {
    let bytes = base64::decode(s)?;
    if bytes.is_empty() {
        return Err(KeyrollError::InvalidKey);
    }
    Ok(BigUint::from_bytes_be(&bytes))
}

/// The bare magnitude, used for hashing so that both integer spellings
/// agree.
pub(crate) fn magnitude(n: &BigUint) -> Vec<u8> {
    let bytes = n.to_bytes_be();
    crate::util::strip_leading_zeros(&bytes).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_int_encoding_round_trips() {
        let n = BigUint::from(0x80u8);
        let encoded = big_to_b64(&n);
        // two's-complement positive: 0x00 0x80
        assert_eq!(base64::decode(&encoded).unwrap(), vec![0x00, 0x80]);
        assert_eq!(big_from_b64(&encoded).unwrap(), n);

        let n = BigUint::from(0x7fu8);
        assert_eq!(base64::decode(&big_to_b64(&n)).unwrap(), vec![0x7f]);
    }

    #[test]
    fn magnitude_strips_the_sign_byte() {
        let n = BigUint::from(0x80u8);
        assert_eq!(magnitude(&n), vec![0x80]);
    }

    #[test]
    fn capabilities_are_partial() {
        let key = Key::generate(KeyType::HmacSha1, 256).unwrap();
        assert!(key.sign(b"x").is_ok());
        assert!(key.encrypt(b"x").is_err());

        let key = Key::generate(KeyType::Aes, 128).unwrap();
        assert!(key.encrypt(b"x").is_ok());
        assert!(key.sign(b"x").is_err());
    }

    #[test]
    fn public_halves_cannot_be_generated() {
        assert!(Key::generate(KeyType::RsaPub, 2048).is_err());
        assert!(Key::generate(KeyType::DsaPub, 1024).is_err());
    }
}
