//! Shared plumbing for the role-bound façades: purpose enforcement, the
//! output encoding, and the optional body compression.

use crate::compress;
use crate::keys::Key;
use crate::keyset::Keyset;
use crate::metadata::KeyPurpose;
use crate::rw::KeysetReader;
use crate::{base64, KeyrollError};

/// Text framing of pipeline output.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Encoding {
    None,
    #[default]
    Base64w,
}

/// Body compression applied before encryption and after decryption.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zlib,
}

pub(crate) struct Facade {
    keyset: Keyset,
    encoding: Encoding,
    compression: Compression,
}

impl Facade {
    pub fn read(
        reader: &dyn KeysetReader,
        accepts: fn(KeyPurpose) -> bool,
    ) -> Result<Self, KeyrollError> {
        Self::over(Keyset::read(reader, true)?, accepts)
    }

    pub fn over(keyset: Keyset, accepts: fn(KeyPurpose) -> bool) -> Result<Self, KeyrollError> {
        if !accepts(keyset.metadata().purpose) {
            return Err(KeyrollError::PurposeMismatch);
        }
        Ok(Facade {
            keyset,
            encoding: Encoding::default(),
            compression: Compression::None,
        })
    }

    pub fn keyset(&self) -> &Keyset {
        &self.keyset
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    pub fn primary_key(&self) -> Result<&Key, KeyrollError> {
        self.keyset.primary_key().ok_or(KeyrollError::InvalidKeyset)
    }

    pub fn encode(&self, bytes: Vec<u8>) -> Vec<u8> {
        match self.encoding {
            Encoding::None => bytes,
            Encoding::Base64w => base64::encode(&bytes).into_bytes(),
        }
    }

    pub fn decode(&self, input: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        match self.encoding {
            Encoding::None => Ok(input.to_vec()),
            Encoding::Base64w => {
                let text = std::str::from_utf8(input).map_err(|_| KeyrollError::FormatError)?;
                base64::decode(text)
            }
        }
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        compress::compress(self.compression, data)
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        compress::decompress(self.compression, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{KeyStatus, KeyType, KeysetMetadata};

    fn signing_keyset() -> Keyset {
        let mut keyset = Keyset::new(KeysetMetadata::new(
            "f",
            KeyPurpose::SignAndVerify,
            KeyType::HmacSha1,
        ))
        .unwrap();
        keyset.generate_key(KeyStatus::Primary).unwrap();
        keyset
    }

    #[test]
    fn purpose_gate_applies_at_construction() {
        assert!(Facade::over(signing_keyset(), KeyPurpose::can_sign).is_ok());
        assert!(matches!(
            Facade::over(signing_keyset(), KeyPurpose::can_encrypt),
            Err(KeyrollError::PurposeMismatch)
        ));
    }

    #[test]
    fn encode_round_trips_in_both_modes() {
        let mut facade = Facade::over(signing_keyset(), KeyPurpose::can_sign).unwrap();
        let encoded = facade.encode(vec![0, 1, 2]);
        assert_eq!(facade.decode(&encoded).unwrap(), vec![0, 1, 2]);

        facade.set_encoding(Encoding::None);
        assert_eq!(facade.encode(vec![0, 1, 2]), vec![0, 1, 2]);
    }
}
