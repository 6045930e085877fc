//! The signing façades.
//!
//! Versioned signatures append the envelope version byte to the signed
//! buffer, separating their domain from headerless ("unversioned")
//! signatures over the same data. Attached signatures additionally carry
//! the payload inline and may bind an out-of-band nonce.

use tracing::debug;

use crate::envelope::{Header, HEADER_SIZE, VERSION_BYTE};
use crate::facade::{Encoding, Facade};
use crate::keyset::Keyset;
use crate::metadata::KeyPurpose;
use crate::rw::{KeysetFileReader, KeysetReader};
use crate::util::read_u32;
use crate::KeyrollError;

/// Signs with the primary key of a sign-and-verify keyset. Also
/// verifies, like any signer.
pub struct Signer {
    facade: Facade,
}

impl Signer {
    /// Wraps an already-loaded keyset.
    pub fn new(keyset: Keyset) -> Result<Self, KeyrollError> {
        Facade::over(keyset, KeyPurpose::can_sign).map(|facade| Signer { facade })
    }

    pub fn read(reader: &dyn KeysetReader) -> Result<Self, KeyrollError> {
        Facade::read(reader, KeyPurpose::can_sign).map(|facade| Signer { facade })
    }

    pub fn read_dir(path: impl Into<std::path::PathBuf>) -> Result<Self, KeyrollError> {
        Self::read(&KeysetFileReader::new(path))
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.facade.set_encoding(encoding);
    }

    /// `header ‖ sign(data ‖ version_byte)`, encoded.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        let key = self.facade.primary_key()?;
        let sig = key.sign(&versioned_buf(data))?;

        let mut message = Vec::with_capacity(HEADER_SIZE + sig.len());
        message.extend_from_slice(&key.header());
        message.extend_from_slice(&sig);
        Ok(self.facade.encode(message))
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyrollError> {
        verify_with(&self.facade, data, signature)
    }

    /// `header ‖ len32(data) ‖ data ‖ sign(data ‖ len32(nonce) ‖ nonce ‖
    /// version_byte)`, encoded. The nonce is not carried; the verifier
    /// must supply the same one.
    pub fn attached_sign(&self, data: &[u8], nonce: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        let key = self.facade.primary_key()?;
        let sig = key.sign(&attached_buf(data, nonce))?;

        let mut message = Vec::with_capacity(HEADER_SIZE + 4 + data.len() + sig.len());
        message.extend_from_slice(&key.header());
        message.extend_from_slice(&(data.len() as u32).to_be_bytes());
        message.extend_from_slice(data);
        message.extend_from_slice(&sig);
        Ok(self.facade.encode(message))
    }

    pub fn attached_verify(
        &self,
        signed_data: &[u8],
        nonce: &[u8],
    ) -> Result<Vec<u8>, KeyrollError> {
        attached_verify_with(&self.facade, signed_data, nonce)
    }
}

/// Verifies versioned and attached signatures against whichever version
/// the envelope header names.
pub struct Verifier {
    facade: Facade,
}

impl Verifier {
    /// Wraps an already-loaded keyset.
    pub fn new(keyset: Keyset) -> Result<Self, KeyrollError> {
        Facade::over(keyset, KeyPurpose::can_verify).map(|facade| Verifier { facade })
    }

    pub fn read(reader: &dyn KeysetReader) -> Result<Self, KeyrollError> {
        Facade::read(reader, KeyPurpose::can_verify).map(|facade| Verifier { facade })
    }

    pub fn read_dir(path: impl Into<std::path::PathBuf>) -> Result<Self, KeyrollError> {
        Self::read(&KeysetFileReader::new(path))
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.facade.set_encoding(encoding);
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyrollError> {
        verify_with(&self.facade, data, signature)
    }

    /// Checks an attached signature and returns the payload it carries.
    pub fn attached_verify(
        &self,
        signed_data: &[u8],
        nonce: &[u8],
    ) -> Result<Vec<u8>, KeyrollError> {
        attached_verify_with(&self.facade, signed_data, nonce)
    }
}

/// Signs without an envelope: the output is the bare signature.
pub struct UnversionedSigner {
    facade: Facade,
}

impl UnversionedSigner {
    /// Wraps an already-loaded keyset.
    pub fn new(keyset: Keyset) -> Result<Self, KeyrollError> {
        Facade::over(keyset, KeyPurpose::can_sign).map(|facade| UnversionedSigner { facade })
    }

    pub fn read(reader: &dyn KeysetReader) -> Result<Self, KeyrollError> {
        Facade::read(reader, KeyPurpose::can_sign).map(|facade| UnversionedSigner { facade })
    }

    pub fn read_dir(path: impl Into<std::path::PathBuf>) -> Result<Self, KeyrollError> {
        Self::read(&KeysetFileReader::new(path))
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.facade.set_encoding(encoding);
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        let sig = self.facade.primary_key()?.sign(data)?;
        Ok(self.facade.encode(sig))
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyrollError> {
        unversioned_verify_with(&self.facade, data, signature)
    }
}

/// Verifies bare signatures. With no header to name the producing key,
/// every primary or active version is tried in order.
pub struct UnversionedVerifier {
    facade: Facade,
}

impl UnversionedVerifier {
    /// Wraps an already-loaded keyset.
    pub fn new(keyset: Keyset) -> Result<Self, KeyrollError> {
        Facade::over(keyset, KeyPurpose::can_verify).map(|facade| UnversionedVerifier { facade })
    }

    pub fn read(reader: &dyn KeysetReader) -> Result<Self, KeyrollError> {
        Facade::read(reader, KeyPurpose::can_verify).map(|facade| UnversionedVerifier { facade })
    }

    pub fn read_dir(path: impl Into<std::path::PathBuf>) -> Result<Self, KeyrollError> {
        Self::read(&KeysetFileReader::new(path))
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.facade.set_encoding(encoding);
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyrollError> {
        unversioned_verify_with(&self.facade, data, signature)
    }
}

fn versioned_buf(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 1);
    buf.extend_from_slice(data);
    buf.push(VERSION_BYTE);
    buf
}

fn attached_buf(data: &[u8], nonce: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 4 + nonce.len() + 1);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&(nonce.len() as u32).to_be_bytes());
    buf.extend_from_slice(nonce);
    buf.push(VERSION_BYTE);
    buf
}

fn verify_with(facade: &Facade, data: &[u8], signature: &[u8]) -> Result<(), KeyrollError> {
    let raw = facade.decode(signature)?;
    let (header, sig) = Header::parse(&raw)?;
    let buf = versioned_buf(data);

    let mut matched = false;
    for key in facade.keyset().keys_from_hash(&header.hash) {
        matched = true;
        if key.verify(&buf, sig).is_ok() {
            return Ok(());
        }
    }
    Err(verify_failure(matched, header))
}

fn attached_verify_with(
    facade: &Facade,
    signed_data: &[u8],
    nonce: &[u8],
) -> Result<Vec<u8>, KeyrollError> {
    let raw = facade.decode(signed_data)?;
    let (header, body) = Header::parse(&raw)?;
    let (len, rest) = read_u32(body)?;
    if rest.len() <= len as usize {
        // the signature after the payload must be non-empty
        return Err(KeyrollError::FormatError);
    }
    let (data, sig) = rest.split_at(len as usize);
    let buf = attached_buf(data, nonce);

    let mut matched = false;
    for key in facade.keyset().keys_from_hash(&header.hash) {
        matched = true;
        if key.verify(&buf, sig).is_ok() {
            return Ok(data.to_vec());
        }
    }
    Err(verify_failure(matched, header))
}

fn unversioned_verify_with(
    facade: &Facade,
    data: &[u8],
    signature: &[u8],
) -> Result<(), KeyrollError> {
    let raw = facade.decode(signature)?;
    for key in facade.keyset().verifying_keys() {
        if key.verify(data, &raw).is_ok() {
            return Ok(());
        }
    }
    Err(KeyrollError::IntegrityFailure)
}

fn verify_failure(matched: bool, header: Header) -> KeyrollError {
    if matched {
        KeyrollError::IntegrityFailure
    } else {
        debug!(hash = %header.hash, "no key matches the envelope header");
        KeyrollError::UnknownKey
    }
}
