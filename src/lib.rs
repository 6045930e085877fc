//! Versioned keysets with enveloped signing and encryption.
//!
//! A [`Keyset`] is an ordered, versioned collection of keys sharing one
//! purpose. One version is *primary* and produces new output; older
//! versions stay readable, so ciphertexts and signatures survive key
//! rotation. Every output is framed with a 5-byte envelope header naming
//! the key that produced it.
//!
//! The high-level entry points are the role-bound façades:
//! * [`Encrypter`] / [`Crypter`] for encryption and decryption
//! * [`Signer`] / [`Verifier`] for versioned and attached signatures
//! * [`UnversionedSigner`] / [`UnversionedVerifier`] for bare signatures
//! * [`SessionEncrypter`] and friends for ephemeral-key envelopes

pub mod base64;
mod compress;
pub mod envelope;
mod facade;
pub mod interop;
pub mod keys;
pub mod keyset;
pub mod metadata;
pub mod rw;
pub mod session;
mod util;

mod crypter;
mod signer;

pub use crypter::{Crypter, Encrypter};
pub use envelope::KeyHash;
pub use facade::{Compression, Encoding};
pub use keys::Key;
pub use keyset::Keyset;
pub use metadata::{KeyPurpose, KeyStatus, KeyType, KeyVersion, KeysetMetadata};
pub use session::{
    SessionDecrypter, SessionEncrypter, SignedSessionDecrypter, SignedSessionEncrypter,
};
pub use signer::{Signer, UnversionedSigner, UnversionedVerifier, Verifier};
pub use util::safe_equals;

#[derive(Debug)]
#[non_exhaustive]
/// Error returned for all keyset and envelope operations that can fail.
pub enum KeyrollError {
    /// Keyset metadata was malformed, referenced a missing version, or
    /// did not match the keys it described.
    InvalidKeyset,
    /// Key material was malformed, of the wrong size, or failed its
    /// consistency checks.
    InvalidKey,
    /// The envelope header named a key that is not in the keyset.
    UnknownKey,
    /// The input was not a valid envelope: bad base64, short header,
    /// wrong version byte, or truncated body.
    FormatError,
    /// A tag or signature did not verify.
    IntegrityFailure,
    /// Algorithm, size, compression or encoding value out of range.
    UnsupportedAlgorithm,
    /// The façade was constructed over a keyset with an incompatible
    /// purpose.
    PurposeMismatch,
    /// There was an error reading or writing a keyset.
    Io(std::io::Error),
}

impl std::error::Error for KeyrollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyrollError::Io(x) => Some(x),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyrollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyrollError::InvalidKeyset => f.write_str("the keyset could not be loaded"),
            KeyrollError::InvalidKey => f.write_str("the key material could not be loaded"),
            // Deliberately indistinguishable from IntegrityFailure: callers
            // must not learn whether the key or the body was at fault.
            KeyrollError::UnknownKey | KeyrollError::IntegrityFailure => {
                f.write_str("the input could not be decrypted or verified")
            }
            KeyrollError::FormatError => f.write_str("the input was not a valid envelope"),
            KeyrollError::UnsupportedAlgorithm => {
                f.write_str("unsupported algorithm, size or option")
            }
            KeyrollError::PurposeMismatch => {
                f.write_str("the keyset purpose does not allow this operation")
            }
            KeyrollError::Io(x) => write!(f, "there was an error with keyset storage: {x}"),
        }
    }
}

impl From<std::io::Error> for KeyrollError {
    fn from(e: std::io::Error) -> Self {
        KeyrollError::Io(e)
    }
}
