use dsa::{Components, KeySize, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use signature::SignatureEncoding;

use crate::envelope::KeyHash;
use crate::keys::{big_from_b64, big_to_b64, magnitude};
use crate::metadata::KeyType;
use crate::util::key_hash;
use crate::KeyrollError;

/// A DSA public key. Signatures are DER-encoded `(r, s)` pairs.
#[derive(Clone)]
pub struct DsaPublicKey {
    key: VerifyingKey,
    size: u32,
    hash: KeyHash,
}

#[derive(Serialize, Deserialize)]
struct DsaPublicJson {
    p: String,
    q: String,
    g: String,
    y: String,
    size: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DsaPrivateJson {
    x: String,
    size: u32,
    public_key: serde_json::Value,
}

/// The nominal byte length of `q` for digest selection. Derived from the
/// standard subgroup sizes rather than the material's own length, which
/// may be short when `q` has leading zero bits.
fn q_nominal_bytes(q_bits: u32) -> Result<usize, KeyrollError> {
    match q_bits {
        0..=160 => Ok(20),
        161..=224 => Ok(28),
        225..=256 => Ok(32),
        _ => Err(KeyrollError::UnsupportedAlgorithm),
    }
}

/// Digest with the SHA variant matching `|q|`, truncated to `|q|` bytes.
fn dsa_digest(q_bytes: usize, data: &[u8]) -> Result<Vec<u8>, KeyrollError> {
    let mut digest = match q_bytes {
        20 => Sha1::digest(data).to_vec(),
        28 => Sha224::digest(data).to_vec(),
        32 => Sha256::digest(data).to_vec(),
        _ => return Err(KeyrollError::UnsupportedAlgorithm),
    };
    digest.truncate(q_bytes);
    Ok(digest)
}

impl DsaPublicKey {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyrollError> {
        let json: DsaPublicJson =
            serde_json::from_value(value.clone()).map_err(|_| KeyrollError::InvalidKey)?;
        let components = Components::from_components(
            big_from_b64(&json.p)?,
            big_from_b64(&json.q)?,
            big_from_b64(&json.g)?,
        )
        .map_err(|_| KeyrollError::InvalidKey)?;
        let key = VerifyingKey::from_components(components, big_from_b64(&json.y)?)
            .map_err(|_| KeyrollError::InvalidKey)?;
        Self::checked(key, json.size)
    }

    pub(crate) fn checked(key: VerifyingKey, size: u32) -> Result<Self, KeyrollError> {
        let components = key.components();
        // The most significant bit of p must sit at the nominal position.
        if !KeyType::DsaPub.is_acceptable_size(size) || components.p().bits() as u32 != size {
            return Err(KeyrollError::InvalidKey);
        }
        q_nominal_bytes(components.q().bits() as u32)?;
        let hash = KeyHash(key_hash(&[
            &magnitude(components.p()),
            &magnitude(components.q()),
            &magnitude(components.g()),
            &magnitude(key.y()),
        ]));
        Ok(DsaPublicKey { key, size, hash })
    }

    pub fn to_value(&self) -> Result<serde_json::Value, KeyrollError> {
        let components = self.key.components();
        serde_json::to_value(DsaPublicJson {
            p: big_to_b64(components.p()),
            q: big_to_b64(components.q()),
            g: big_to_b64(components.g()),
            y: big_to_b64(self.key.y()),
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

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyrollError> {
        let q_bytes = q_nominal_bytes(self.key.components().q().bits() as u32)?;
        let digest = dsa_digest(q_bytes, data)?;
        let signature =
            Signature::try_from(signature).map_err(|_| KeyrollError::IntegrityFailure)?;
        self.key
            .verify_prehash(&digest, &signature)
            .map_err(|_| KeyrollError::IntegrityFailure)
    }
}

/// A DSA private key. Carries its public half; both hash identically.
#[derive(Clone)]
pub struct DsaPrivateKey {
    key: SigningKey,
    public: DsaPublicKey,
}

impl DsaPrivateKey {
    pub fn generate(size: u32) -> Result<Self, KeyrollError> {
        let key_size = match size {
            1024 => KeySize::DSA_1024_160,
            2048 => KeySize::DSA_2048_256,
            3072 => KeySize::DSA_3072_256,
            _ => return Err(KeyrollError::UnsupportedAlgorithm),
        };
        let components = Components::generate(&mut OsRng, key_size);
        let key = SigningKey::generate(&mut OsRng, components);
        Self::checked(key, size)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyrollError> {
        let json: DsaPrivateJson =
            serde_json::from_value(value.clone()).map_err(|_| KeyrollError::InvalidKey)?;
        let public = DsaPublicKey::from_value(&json.public_key)?;
        if public.size() != json.size {
            return Err(KeyrollError::InvalidKey);
        }
        let key = SigningKey::from_components(public.key.clone(), big_from_b64(&json.x)?)
            .map_err(|_| KeyrollError::InvalidKey)?;
        Self::checked(key, json.size)
    }

    fn checked(key: SigningKey, size: u32) -> Result<Self, KeyrollError> {
        let public = DsaPublicKey::checked(key.verifying_key().clone(), size)?;
        Ok(DsaPrivateKey { key, public })
    }

    pub fn public(&self) -> &DsaPublicKey {
        &self.public
    }

    pub fn to_value(&self) -> Result<serde_json::Value, KeyrollError> {
        serde_json::to_value(DsaPrivateJson {
            x: big_to_b64(self.key.x()),
            size: self.public.size,
            public_key: self.public.to_value()?,
        })
        .map_err(|_| KeyrollError::InvalidKey)
    }

    pub fn size(&self) -> u32 {
        self.public.size
    }

    pub fn hash(&self) -> KeyHash {
        self.public.hash
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        let q_bytes = q_nominal_bytes(self.public.key.components().q().bits() as u32)?;
        let digest = dsa_digest(q_bytes, data)?;
        let signature = self
            .key
            .sign_prehash(&digest)
            .map_err(|_| KeyrollError::IntegrityFailure)?;
        Ok(signature.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> DsaPrivateKey {
        DsaPrivateKey::generate(1024).unwrap()
    }

    #[test]
    fn sign_verify_round_trips() {
        let key = test_key();
        let sig = key.sign(b"message").unwrap();
        key.public().verify(b"message", &sig).unwrap();
        assert!(key.public().verify(b"messagE", &sig).is_err());
        assert!(key.public().verify(b"message", b"not a der signature").is_err());
    }

    #[test]
    fn json_round_trips_and_halves_share_a_hash() {
        let key = test_key();
        assert_eq!(key.hash(), key.public().hash());

        let back = DsaPrivateKey::from_value(&key.to_value().unwrap()).unwrap();
        assert_eq!(back.hash(), key.hash());

        let sig = back.sign(b"cross").unwrap();
        key.public().verify(b"cross", &sig).unwrap();
    }

    #[test]
    fn digest_truncates_to_q() {
        let digest = dsa_digest(20, b"data").unwrap();
        assert_eq!(digest.len(), 20);
        let digest = dsa_digest(32, b"data").unwrap();
        assert_eq!(digest.len(), 32);
        assert!(dsa_digest(21, b"data").is_err());
    }

    #[test]
    fn rejects_unsupported_size() {
        assert!(DsaPrivateKey::generate(512).is_err());
    }
}
