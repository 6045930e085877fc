//! The encryption façades.

use tracing::debug;

use crate::envelope::Header;
use crate::facade::{Compression, Encoding, Facade};
use crate::keyset::Keyset;
use crate::metadata::KeyPurpose;
use crate::rw::{KeysetFileReader, KeysetReader};
use crate::KeyrollError;

/// Encrypts with the primary key of an encrypt-capable keyset.
///
/// Pipeline: compress, primary-key encrypt (which stamps the envelope
/// header), encode.
pub struct Encrypter {
    facade: Facade,
}

impl Encrypter {
    /// Wraps an already-loaded keyset.
    pub fn new(keyset: Keyset) -> Result<Self, KeyrollError> {
        Facade::over(keyset, KeyPurpose::can_encrypt).map(|facade| Encrypter { facade })
    }

    pub fn read(reader: &dyn KeysetReader) -> Result<Self, KeyrollError> {
        Facade::read(reader, KeyPurpose::can_encrypt).map(|facade| Encrypter { facade })
    }

    pub fn read_dir(path: impl Into<std::path::PathBuf>) -> Result<Self, KeyrollError> {
        Self::read(&KeysetFileReader::new(path))
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.facade.set_encoding(encoding);
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.facade.set_compression(compression);
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        encrypt_with(&self.facade, plaintext)
    }
}

/// Encrypts and decrypts over a decrypt-and-encrypt keyset. Decryption
/// may use any version whose hash matches the envelope header, not just
/// the primary.
pub struct Crypter {
    facade: Facade,
}

impl Crypter {
    /// Wraps an already-loaded keyset.
    pub fn new(keyset: Keyset) -> Result<Self, KeyrollError> {
        Facade::over(keyset, KeyPurpose::can_decrypt).map(|facade| Crypter { facade })
    }

    pub fn read(reader: &dyn KeysetReader) -> Result<Self, KeyrollError> {
        Facade::read(reader, KeyPurpose::can_decrypt).map(|facade| Crypter { facade })
    }

    pub fn read_dir(path: impl Into<std::path::PathBuf>) -> Result<Self, KeyrollError> {
        Self::read(&KeysetFileReader::new(path))
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.facade.set_encoding(encoding);
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.facade.set_compression(compression);
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        encrypt_with(&self.facade, plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        let raw = self.facade.decode(ciphertext)?;
        let (header, _) = Header::parse(&raw)?;

        let mut matched = false;
        for key in self.facade.keyset().keys_from_hash(&header.hash) {
            matched = true;
            match key.decrypt(&raw) {
                Ok(compressed) => return self.facade.decompress(&compressed),
                Err(e) => debug!(hash = %header.hash, error = %e, "candidate key failed"),
            }
        }
        if matched {
            Err(KeyrollError::IntegrityFailure)
        } else {
            debug!(hash = %header.hash, "no key matches the envelope header");
            Err(KeyrollError::UnknownKey)
        }
    }
}

fn encrypt_with(facade: &Facade, plaintext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
    let key = facade.primary_key()?;
    let compressed = facade.compress(plaintext)?;
    let envelope = key.encrypt(&compressed)?;
    Ok(facade.encode(envelope))
}
