use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::envelope::KeyHash;
use crate::metadata::KeyType;
use crate::util::{key_hash, safe_equals};
use crate::{base64, KeyrollError};

type HmacSha1 = Hmac<sha1::Sha1>;

/// Length of an HMAC-SHA1 tag.
pub const TAG_SIZE: usize = 20;

/// A symmetric MAC key.
#[derive(Clone)]
pub struct HmacKey {
    material: Zeroizing<Vec<u8>>,
    size: u32,
    hash: KeyHash,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HmacKeyJson {
    hmac_key_string: String,
    size: u32,
}

impl HmacKey {
    pub fn generate(size: u32) -> Result<Self, KeyrollError> {
        if !KeyType::HmacSha1.is_acceptable_size(size) {
            return Err(KeyrollError::UnsupportedAlgorithm);
        }
        let mut material = Zeroizing::new(vec![0u8; size as usize / 8]);
        OsRng.fill_bytes(&mut material);
        Ok(Self::from_material(material, size))
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyrollError> {
        let json: HmacKeyJson =
            serde_json::from_value(value.clone()).map_err(|_| KeyrollError::InvalidKey)?;
        let material = Zeroizing::new(base64::decode(&json.hmac_key_string)?);
        if !KeyType::HmacSha1.is_acceptable_size(json.size)
            || material.len() as u32 * 8 != json.size
        {
            return Err(KeyrollError::InvalidKey);
        }
        Ok(Self::from_material(material, json.size))
    }

    pub(crate) fn from_material(material: Zeroizing<Vec<u8>>, size: u32) -> Self {
        let hash = KeyHash(key_hash(&[&material]));
        HmacKey {
            material,
            size,
            hash,
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value, KeyrollError> {
        serde_json::to_value(HmacKeyJson {
            hmac_key_string: base64::encode(&self.material),
            size: self.size,
        })
        .map_err(|_| KeyrollError::InvalidKey)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn hash(&self) -> KeyHash {
        self.hash
    }

    pub(crate) fn raw(&self) -> &[u8] {
        &self.material
    }

    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha1::new_from_slice(&self.material).expect("hmac accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyrollError> {
        if safe_equals(&self.sign(data), signature) {
            Ok(())
        } else {
            Err(KeyrollError::IntegrityFailure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips() {
        let key = HmacKey::generate(256).unwrap();
        let tag = key.sign(b"hello");
        assert_eq!(tag.len(), TAG_SIZE);
        key.verify(b"hello", &tag).unwrap();
        assert!(key.verify(b"hellO", &tag).is_err());
        assert!(key.verify(b"hello", &tag[..TAG_SIZE - 1]).is_err());
    }

    #[test]
    fn json_round_trips_with_stable_hash() {
        let key = HmacKey::generate(256).unwrap();
        let value = key.to_value().unwrap();
        assert!(value["hmacKeyString"].is_string());
        assert_eq!(value["size"], 256);

        let back = HmacKey::from_value(&value).unwrap();
        assert_eq!(back.hash(), key.hash());
        assert_eq!(back.sign(b"data"), key.sign(b"data"));
    }

    #[test]
    fn rejects_size_mismatch() {
        let key = HmacKey::generate(256).unwrap();
        let mut value = key.to_value().unwrap();
        value["size"] = serde_json::json!(128);
        assert!(HmacKey::from_value(&value).is_err());
    }
}
