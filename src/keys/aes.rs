use aes::{Aes128, Aes192, Aes256};
use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::envelope::{Header, KeyHash, HEADER_SIZE};
use crate::keys::hmac::{HmacKey, TAG_SIZE};
use crate::metadata::KeyType;
use crate::util::{key_hash, len_prefix_pack, len_prefix_unpack};
use crate::{base64, KeyrollError};

pub const IV_SIZE: usize = 16;
const BLOCK_SIZE: usize = 16;

/// Block cipher chaining mode. Only CBC is in circulation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CipherMode {
    #[serde(rename = "CBC")]
    Cbc,
}

/// A symmetric cipher key with an embedded MAC key authenticating its
/// envelopes.
#[derive(Clone)]
pub struct AesKey {
    material: Zeroizing<Vec<u8>>,
    hmac_key: HmacKey,
    mode: CipherMode,
    size: u32,
    hash: KeyHash,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AesKeyJson {
    aes_key_string: String,
    size: u32,
    hmac_key: serde_json::Value,
    mode: CipherMode,
}

impl AesKey {
    pub fn generate(size: u32) -> Result<Self, KeyrollError> {
        if !KeyType::Aes.is_acceptable_size(size) {
            return Err(KeyrollError::UnsupportedAlgorithm);
        }
        let mut material = Zeroizing::new(vec![0u8; size as usize / 8]);
        OsRng.fill_bytes(&mut material);
        let hmac_key = HmacKey::generate(KeyType::HmacSha1.default_size())?;
        Ok(Self::assemble(material, hmac_key, size))
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyrollError> {
        let json: AesKeyJson =
            serde_json::from_value(value.clone()).map_err(|_| KeyrollError::InvalidKey)?;
        let material = Zeroizing::new(base64::decode(&json.aes_key_string)?);
        if !KeyType::Aes.is_acceptable_size(json.size) || material.len() as u32 * 8 != json.size {
            return Err(KeyrollError::InvalidKey);
        }
        let hmac_key = HmacKey::from_value(&json.hmac_key)?;
        Ok(Self::assemble(material, hmac_key, json.size))
    }

    /// Rebuilds a key from its packed wire form, the inverse of
    /// [`AesKey::to_packed`]. Used to move session keys.
    pub fn from_packed(bytes: &[u8]) -> Result<Self, KeyrollError> {
        let parts = len_prefix_unpack(bytes)?;
        let [aes_bytes, hmac_bytes]: [Vec<u8>; 2] =
            parts.try_into().map_err(|_| KeyrollError::InvalidKey)?;
        let size = aes_bytes.len() as u32 * 8;
        if !KeyType::Aes.is_acceptable_size(size)
            || !KeyType::HmacSha1.is_acceptable_size(hmac_bytes.len() as u32 * 8)
        {
            return Err(KeyrollError::InvalidKey);
        }
        let hmac_key =
            HmacKey::from_material(Zeroizing::new(hmac_bytes), KeyType::HmacSha1.default_size());
        Ok(Self::assemble(Zeroizing::new(aes_bytes), hmac_key, size))
    }

    pub fn to_packed(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(len_prefix_pack(&[&self.material, self.hmac_key.raw()]))
    }

    fn assemble(material: Zeroizing<Vec<u8>>, hmac_key: HmacKey, size: u32) -> Self {
        let hash = KeyHash(key_hash(&[&material, hmac_key.raw()]));
        AesKey {
            material,
            hmac_key,
            mode: CipherMode::Cbc,
            size,
            hash,
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value, KeyrollError> {
        serde_json::to_value(AesKeyJson {
            aes_key_string: base64::encode(&self.material),
            size: self.size,
            hmac_key: self.hmac_key.to_value()?,
            mode: self.mode,
        })
        .map_err(|_| KeyrollError::InvalidKey)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn hash(&self) -> KeyHash {
        self.hash
    }

    /// Produces the full envelope `header ‖ iv ‖ ct ‖ tag`, where the tag
    /// authenticates everything before it.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);
        let ciphertext = self.cbc_encrypt(&iv, plaintext)?;

        let mut out =
            Vec::with_capacity(HEADER_SIZE + IV_SIZE + ciphertext.len() + TAG_SIZE);
        out.extend_from_slice(&Header::new(self.hash).to_bytes());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        let tag = self.hmac_key.sign(&out);
        out.extend_from_slice(&tag);
        Ok(out)
    }

    /// Undoes [`AesKey::encrypt`]. The tag is checked in constant time
    /// before any block is decrypted.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        if envelope.len() < HEADER_SIZE + IV_SIZE + BLOCK_SIZE + TAG_SIZE {
            return Err(KeyrollError::FormatError);
        }
        let (signed, tag) = envelope.split_at(envelope.len() - TAG_SIZE);
        self.hmac_key.verify(signed, tag)?;

        let body = &signed[HEADER_SIZE..];
        let (iv, ciphertext) = body.split_at(IV_SIZE);
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(KeyrollError::FormatError);
        }
        self.cbc_decrypt(iv, ciphertext)
    }

    fn cbc_encrypt(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        macro_rules! run {
            ($cipher:ty) => {
                cbc::Encryptor::<$cipher>::new_from_slices(&self.material, iv)
                    .map_err(|_| KeyrollError::InvalidKey)?
                    .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
            };
        }
        Ok(match self.material.len() {
            16 => run!(Aes128),
            24 => run!(Aes192),
            32 => run!(Aes256),
            _ => return Err(KeyrollError::InvalidKey),
        })
    }

    fn cbc_decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        macro_rules! run {
            ($cipher:ty) => {
                cbc::Decryptor::<$cipher>::new_from_slices(&self.material, iv)
                    .map_err(|_| KeyrollError::InvalidKey)?
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|_| KeyrollError::IntegrityFailure)
            };
        }
        match self.material.len() {
            16 => run!(Aes128),
            24 => run!(Aes192),
            32 => run!(Aes256),
            _ => Err(KeyrollError::InvalidKey),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_at_every_size() {
        for size in [128, 192, 256] {
            let key = AesKey::generate(size).unwrap();
            let envelope = key.encrypt(b"abc").unwrap();
            // header, iv, one padded block, tag
            assert_eq!(envelope.len(), HEADER_SIZE + IV_SIZE + 16 + TAG_SIZE);
            assert_eq!(key.decrypt(&envelope).unwrap(), b"abc");
        }
    }

    #[test]
    fn any_flipped_byte_is_rejected() {
        let key = AesKey::generate(128).unwrap();
        let envelope = key.encrypt(b"abc").unwrap();
        for i in 0..envelope.len() {
            let mut tampered = envelope.clone();
            tampered[i] ^= 0x01;
            assert!(key.decrypt(&tampered).is_err(), "byte {i} accepted");
        }
    }

    #[test]
    fn json_round_trips_with_stable_hash() {
        let key = AesKey::generate(128).unwrap();
        let value = key.to_value().unwrap();
        assert_eq!(value["mode"], "CBC");
        let back = AesKey::from_value(&value).unwrap();
        assert_eq!(back.hash(), key.hash());

        let envelope = key.encrypt(b"payload").unwrap();
        assert_eq!(back.decrypt(&envelope).unwrap(), b"payload");
    }

    #[test]
    fn packed_form_round_trips() {
        let key = AesKey::generate(128).unwrap();
        let back = AesKey::from_packed(&key.to_packed()).unwrap();
        assert_eq!(back.hash(), key.hash());
    }

    #[test]
    fn rejects_truncated_envelope() {
        let key = AesKey::generate(128).unwrap();
        let envelope = key.encrypt(b"abc").unwrap();
        assert!(key.decrypt(&envelope[..HEADER_SIZE + IV_SIZE]).is_err());
    }
}
