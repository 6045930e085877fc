use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{Oaep, Pkcs1v15Sign};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::envelope::{Header, KeyHash, HEADER_SIZE};
use crate::keys::{big_from_b64, big_to_b64, magnitude};
use crate::metadata::KeyType;
use crate::util::key_hash;
use crate::KeyrollError;

/// An RSA public key: verifies PKCS#1 v1.5 signatures and produces OAEP
/// envelopes.
#[derive(Clone)]
pub struct RsaPublicKey {
    key: rsa::RsaPublicKey,
    size: u32,
    hash: KeyHash,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RsaPublicJson {
    modulus: String,
    public_exponent: String,
    size: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RsaPrivateJson {
    private_exponent: String,
    prime_p: String,
    prime_q: String,
    prime_exponent_p: String,
    prime_exponent_q: String,
    crt_coefficient: String,
    size: u32,
    public_key: serde_json::Value,
}

/// The signature digest is fixed by the modulus length.
fn pkcs1_digest(size: u32, data: &[u8]) -> Result<(Pkcs1v15Sign, Vec<u8>), KeyrollError> {
    Ok(match size {
        1024 => (Pkcs1v15Sign::new::<Sha1>(), Sha1::digest(data).to_vec()),
        2048 => (Pkcs1v15Sign::new::<Sha256>(), Sha256::digest(data).to_vec()),
        3072 => (Pkcs1v15Sign::new::<Sha384>(), Sha384::digest(data).to_vec()),
        4096 => (Pkcs1v15Sign::new::<Sha512>(), Sha512::digest(data).to_vec()),
        _ => return Err(KeyrollError::UnsupportedAlgorithm),
    })
}

impl RsaPublicKey {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyrollError> {
        let json: RsaPublicJson =
            serde_json::from_value(value.clone()).map_err(|_| KeyrollError::InvalidKey)?;
        let n = big_from_b64(&json.modulus)?;
        let e = big_from_b64(&json.public_exponent)?;
        let key = rsa::RsaPublicKey::new(n, e).map_err(|_| KeyrollError::InvalidKey)?;
        Self::checked(key, json.size)
    }

    pub(crate) fn checked(key: rsa::RsaPublicKey, size: u32) -> Result<Self, KeyrollError> {
        if !KeyType::RsaPub.is_acceptable_size(size) || key.n().bits() as u32 != size {
            return Err(KeyrollError::InvalidKey);
        }
        let hash = KeyHash(key_hash(&[
            &magnitude(key.n()),
            &magnitude(key.e()),
        ]));
        Ok(RsaPublicKey { key, size, hash })
    }

    pub fn to_value(&self) -> Result<serde_json::Value, KeyrollError> {
        serde_json::to_value(RsaPublicJson {
            modulus: big_to_b64(self.key.n()),
            public_exponent: big_to_b64(self.key.e()),
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
        let (padding, digest) = pkcs1_digest(self.size, data)?;
        self.key
            .verify(padding, &digest, signature)
            .map_err(|_| KeyrollError::IntegrityFailure)
    }

    /// Produces the envelope `header ‖ oaep_block`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        let block = self
            .key
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), plaintext)
            .map_err(|_| KeyrollError::FormatError)?;
        let mut out = Vec::with_capacity(HEADER_SIZE + block.len());
        out.extend_from_slice(&Header::new(self.hash).to_bytes());
        out.extend_from_slice(&block);
        Ok(out)
    }
}

/// An RSA private key. Carries its public half; both hash identically.
#[derive(Clone)]
pub struct RsaPrivateKey {
    key: rsa::RsaPrivateKey,
    public: RsaPublicKey,
}

impl RsaPrivateKey {
    pub fn generate(size: u32) -> Result<Self, KeyrollError> {
        if !KeyType::RsaPriv.is_acceptable_size(size) {
            return Err(KeyrollError::UnsupportedAlgorithm);
        }
        let key = rsa::RsaPrivateKey::new(&mut OsRng, size as usize)
            .map_err(|_| KeyrollError::InvalidKey)?;
        Self::checked(key, size)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyrollError> {
        let json: RsaPrivateJson =
            serde_json::from_value(value.clone()).map_err(|_| KeyrollError::InvalidKey)?;
        let public = RsaPublicKey::from_value(&json.public_key)?;
        if public.size() != json.size {
            return Err(KeyrollError::InvalidKey);
        }
        let d = big_from_b64(&json.private_exponent)?;
        let p = big_from_b64(&json.prime_p)?;
        let q = big_from_b64(&json.prime_q)?;
        let key = rsa::RsaPrivateKey::from_components(
            public.key.n().clone(),
            public.key.e().clone(),
            d,
            vec![p, q],
        )
        .map_err(|_| KeyrollError::InvalidKey)?;
        Self::checked(key, json.size)
    }

    fn checked(mut key: rsa::RsaPrivateKey, size: u32) -> Result<Self, KeyrollError> {
        key.precompute().map_err(|_| KeyrollError::InvalidKey)?;
        let public = RsaPublicKey::checked(key.to_public_key(), size)?;
        Ok(RsaPrivateKey { key, public })
    }

    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn to_value(&self) -> Result<serde_json::Value, KeyrollError> {
        let dp = self.key.dp().ok_or(KeyrollError::InvalidKey)?;
        let dq = self.key.dq().ok_or(KeyrollError::InvalidKey)?;
        let qinv = self.key.crt_coefficient().ok_or(KeyrollError::InvalidKey)?;
        let primes = self.key.primes();
        serde_json::to_value(RsaPrivateJson {
            private_exponent: big_to_b64(self.key.d()),
            prime_p: big_to_b64(&primes[0]),
            prime_q: big_to_b64(&primes[1]),
            prime_exponent_p: big_to_b64(dp),
            prime_exponent_q: big_to_b64(dq),
            crt_coefficient: big_to_b64(&qinv),
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
        let (padding, digest) = pkcs1_digest(self.public.size, data)?;
        self.key
            .sign(padding, &digest)
            .map_err(|_| KeyrollError::IntegrityFailure)
    }

    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        if envelope.len() <= HEADER_SIZE {
            return Err(KeyrollError::FormatError);
        }
        self.key
            .decrypt(Oaep::new::<Sha1>(), &envelope[HEADER_SIZE..])
            .map_err(|_| KeyrollError::IntegrityFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::generate(1024).unwrap()
    }

    #[test]
    fn sign_verify_round_trips() {
        let key = test_key();
        let sig = key.sign(b"message").unwrap();
        key.public().verify(b"message", &sig).unwrap();
        assert!(key.public().verify(b"messagE", &sig).is_err());
    }

    #[test]
    fn oaep_round_trips() {
        let key = test_key();
        let envelope = key.public().encrypt(b"secret").unwrap();
        assert_eq!(key.decrypt(&envelope).unwrap(), b"secret");

        let mut tampered = envelope.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert!(key.decrypt(&tampered).is_err());
    }

    #[test]
    fn json_round_trips_and_halves_share_a_hash() {
        let key = test_key();
        assert_eq!(key.hash(), key.public().hash());

        let back = RsaPrivateKey::from_value(&key.to_value().unwrap()).unwrap();
        assert_eq!(back.hash(), key.hash());

        let sig = back.sign(b"cross").unwrap();
        key.public().verify(b"cross", &sig).unwrap();
    }

    #[test]
    fn rejects_size_mismatch() {
        let key = test_key();
        let mut value = key.to_value().unwrap();
        value["size"] = serde_json::json!(2048);
        assert!(RsaPrivateKey::from_value(&value).is_err());
    }

    #[test]
    fn rejects_oversized_plaintext() {
        let key = test_key();
        // OAEP with SHA-1 over a 1024-bit modulus tops out at 86 bytes
        assert!(key.public().encrypt(&[0u8; 87]).is_err());
    }
}
