//! Keyset metadata: the algorithm, the purpose, and the version records.
//!
//! The serialized spelling matches the on-disk `meta` file:
//! `{"name": ..., "purpose": "SIGN_AND_VERIFY", "type": "HMAC_SHA1",
//!   "encrypted": false, "versions": [{"versionNumber": 1,
//!   "status": "PRIMARY", "exportable": false}]}`.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::KeyrollError;

/// Key algorithm identifier.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "HMAC_SHA1")]
    HmacSha1,
    #[serde(rename = "AES")]
    Aes,
    #[serde(rename = "RSA_PRIV")]
    RsaPriv,
    #[serde(rename = "RSA_PUB")]
    RsaPub,
    #[serde(rename = "DSA_PRIV")]
    DsaPriv,
    #[serde(rename = "DSA_PUB")]
    DsaPub,
}

impl KeyType {
    /// Bit sizes a key of this type may have.
    pub fn acceptable_sizes(self) -> &'static [u32] {
        match self {
            KeyType::HmacSha1 => &[256],
            KeyType::Aes => &[128, 192, 256],
            KeyType::RsaPriv | KeyType::RsaPub => &[1024, 2048, 3072, 4096],
            KeyType::DsaPriv | KeyType::DsaPub => &[1024, 2048, 3072],
        }
    }

    /// The size used when the caller does not pick one.
    pub fn default_size(self) -> u32 {
        match self {
            KeyType::HmacSha1 => 256,
            KeyType::Aes => 128,
            KeyType::RsaPriv | KeyType::RsaPub => 2048,
            KeyType::DsaPriv | KeyType::DsaPub => 1024,
        }
    }

    pub fn is_acceptable_size(self, size: u32) -> bool {
        self.acceptable_sizes().contains(&size)
    }

    /// Whether a keyset of this type may carry the given purpose.
    pub fn supports_purpose(self, purpose: KeyPurpose) -> bool {
        match self {
            KeyType::HmacSha1 | KeyType::DsaPriv => purpose == KeyPurpose::SignAndVerify,
            KeyType::Aes => purpose == KeyPurpose::DecryptAndEncrypt,
            KeyType::RsaPriv => {
                purpose == KeyPurpose::SignAndVerify || purpose == KeyPurpose::DecryptAndEncrypt
            }
            KeyType::RsaPub => purpose == KeyPurpose::Verify || purpose == KeyPurpose::Encrypt,
            KeyType::DsaPub => purpose == KeyPurpose::Verify,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyType::HmacSha1 => "HMAC_SHA1",
            KeyType::Aes => "AES",
            KeyType::RsaPriv => "RSA_PRIV",
            KeyType::RsaPub => "RSA_PUB",
            KeyType::DsaPriv => "DSA_PRIV",
            KeyType::DsaPub => "DSA_PUB",
        };
        f.write_str(name)
    }
}

/// What a keyset is for. Façades refuse keysets whose purpose does not
/// cover their operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum KeyPurpose {
    #[serde(rename = "UNDEF")]
    Undef,
    #[serde(rename = "SIGN_AND_VERIFY")]
    SignAndVerify,
    #[serde(rename = "VERIFY")]
    Verify,
    #[serde(rename = "DECRYPT_AND_ENCRYPT")]
    DecryptAndEncrypt,
    #[serde(rename = "ENCRYPT")]
    Encrypt,
}

impl KeyPurpose {
    pub fn can_encrypt(self) -> bool {
        matches!(self, KeyPurpose::Encrypt | KeyPurpose::DecryptAndEncrypt)
    }

    pub fn can_decrypt(self) -> bool {
        self == KeyPurpose::DecryptAndEncrypt
    }

    pub fn can_sign(self) -> bool {
        self == KeyPurpose::SignAndVerify
    }

    pub fn can_verify(self) -> bool {
        matches!(self, KeyPurpose::Verify | KeyPurpose::SignAndVerify)
    }
}

/// Lifecycle state of one keyset version.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum KeyStatus {
    #[serde(rename = "PRIMARY")]
    Primary,
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "INACTIVE")]
    Inactive,
}

/// One version record from the metadata.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVersion {
    pub version_number: u32,
    pub status: KeyStatus,
    #[serde(default)]
    pub exportable: bool,
}

/// The `meta` document of a keyset.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysetMetadata {
    pub name: String,
    pub purpose: KeyPurpose,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub versions: Vec<KeyVersion>,
}

impl KeysetMetadata {
    pub fn new(name: impl Into<String>, purpose: KeyPurpose, key_type: KeyType) -> Self {
        KeysetMetadata {
            name: name.into(),
            purpose,
            key_type,
            encrypted: false,
            versions: Vec::new(),
        }
    }

    pub fn version(&self, number: u32) -> Option<&KeyVersion> {
        self.versions.iter().find(|v| v.version_number == number)
    }

    pub fn primary_version(&self) -> Option<u32> {
        self.versions
            .iter()
            .find(|v| v.status == KeyStatus::Primary)
            .map(|v| v.version_number)
    }

    pub fn next_version_number(&self) -> u32 {
        self.versions
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Checks the invariants every well-formed metadata document holds:
    /// positive unique version numbers and at most one primary.
    pub fn validate(&self) -> Result<(), KeyrollError> {
        let mut primaries = 0;
        for (i, v) in self.versions.iter().enumerate() {
            if v.version_number == 0 {
                return Err(KeyrollError::InvalidKeyset);
            }
            if self.versions[..i]
                .iter()
                .any(|prev| prev.version_number == v.version_number)
            {
                return Err(KeyrollError::InvalidKeyset);
            }
            if v.status == KeyStatus::Primary {
                primaries += 1;
            }
        }
        if primaries > 1 {
            return Err(KeyrollError::InvalidKeyset);
        }
        Ok(())
    }
}
