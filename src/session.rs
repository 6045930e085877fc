//! Ephemeral-key envelopes: a fresh AES key sealed under a recipient's
//! encrypt-capable keyset, used for any number of payloads.
//!
//! The signed variant additionally binds the sealed key to a sender: the
//! session blob carries an attached signature whose payload is a fresh
//! nonce and whose hidden input is the SHA-1 digest of the sealed key.
//! Nothing decrypts until that signature checks out.

use digest::Digest;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::crypter::{Crypter, Encrypter};
use crate::facade::{Compression, Encoding};
use crate::keys::{AesKey, Key};
use crate::metadata::{KeyPurpose, KeyType};
use crate::rw::ImportedKeyReader;
use crate::signer::{Signer, Verifier};
use crate::{base64, KeyrollError};

const NONCE_SIZE: usize = 16;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionBlob {
    session_key: String,
    signature: String,
}

/// Seals a fresh AES key under the recipient's keyset and encrypts
/// payloads with it.
pub struct SessionEncrypter {
    crypter: Crypter,
    material: Vec<u8>,
}

impl SessionEncrypter {
    pub fn new(encrypter: Encrypter) -> Result<Self, KeyrollError> {
        let (crypter, material) = seal_session_key(encrypter)?;
        Ok(SessionEncrypter { crypter, material })
    }

    /// The sealed session key, base64w-encoded. Hand it to the recipient
    /// alongside the ciphertexts.
    pub fn session_material(&self) -> String {
        base64::encode(&self.material)
    }

    /// Encrypts with the session key. Output is a raw envelope.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        self.crypter.encrypt(plaintext)
    }
}

/// The receiving end of [`SessionEncrypter`].
pub struct SessionDecrypter {
    crypter: Crypter,
}

impl SessionDecrypter {
    pub fn new(crypter: Crypter, session_material: &str) -> Result<Self, KeyrollError> {
        let mut crypter = crypter;
        crypter.set_encoding(Encoding::None);
        crypter.set_compression(Compression::None);
        let packed = Zeroizing::new(crypter.decrypt(&base64::decode(session_material)?)?);
        Ok(SessionDecrypter {
            crypter: session_crypter(AesKey::from_packed(&packed)?)?,
        })
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        self.crypter.decrypt(ciphertext)
    }
}

/// A session whose sealed key is signed by the sender.
pub struct SignedSessionEncrypter {
    crypter: Crypter,
    signer: Signer,
    material: Vec<u8>,
    nonce: [u8; NONCE_SIZE],
}

impl SignedSessionEncrypter {
    pub fn new(encrypter: Encrypter, signer: Signer) -> Result<Self, KeyrollError> {
        let (crypter, material) = seal_session_key(encrypter)?;
        let mut signer = signer;
        signer.set_encoding(Encoding::None);
        let mut nonce = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut nonce);
        Ok(SignedSessionEncrypter {
            crypter,
            signer,
            material,
            nonce,
        })
    }

    /// The session blob: the sealed key plus the sender's signature over
    /// its digest, carrying the session nonce.
    pub fn session_blob(&self) -> Result<String, KeyrollError> {
        let digest = Sha1::digest(&self.material);
        let signature = self.signer.attached_sign(&self.nonce, digest.as_slice())?;
        serde_json::to_string(&SessionBlob {
            session_key: base64::encode(&self.material),
            signature: base64::encode(&signature),
        })
        .map_err(|_| KeyrollError::FormatError)
    }

    /// Encrypts with the session key. Output is a raw envelope.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        self.crypter.encrypt(plaintext)
    }
}

/// The receiving end of [`SignedSessionEncrypter`]: refuses the session
/// outright when the blob's signature does not verify.
pub struct SignedSessionDecrypter {
    crypter: Crypter,
}

impl SignedSessionDecrypter {
    pub fn new(
        crypter: Crypter,
        verifier: Verifier,
        session_blob: &str,
    ) -> Result<Self, KeyrollError> {
        let blob: SessionBlob =
            serde_json::from_str(session_blob).map_err(|_| KeyrollError::FormatError)?;
        let material = base64::decode(&blob.session_key)?;
        let signature = base64::decode(&blob.signature)?;

        let mut verifier = verifier;
        verifier.set_encoding(Encoding::None);
        let digest = Sha1::digest(&material);
        let nonce = verifier.attached_verify(&signature, digest.as_slice())?;
        if nonce.len() != NONCE_SIZE {
            return Err(KeyrollError::IntegrityFailure);
        }

        let mut crypter = crypter;
        crypter.set_encoding(Encoding::None);
        crypter.set_compression(Compression::None);
        let packed = Zeroizing::new(crypter.decrypt(&material)?);
        Ok(SignedSessionDecrypter {
            crypter: session_crypter(AesKey::from_packed(&packed)?)?,
        })
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyrollError> {
        self.crypter.decrypt(ciphertext)
    }
}

/// Draws the session key, seals its packed form under the recipient's
/// keyset, and builds the payload crypter.
fn seal_session_key(encrypter: Encrypter) -> Result<(Crypter, Vec<u8>), KeyrollError> {
    let mut encrypter = encrypter;
    encrypter.set_encoding(Encoding::None);
    encrypter.set_compression(Compression::None);

    let key = AesKey::generate(KeyType::Aes.default_size())?;
    let material = encrypter.encrypt(&key.to_packed())?;
    Ok((session_crypter(key)?, material))
}

fn session_crypter(key: AesKey) -> Result<Crypter, KeyrollError> {
    let reader = ImportedKeyReader::new(Key::Aes(key), KeyPurpose::DecryptAndEncrypt);
    let mut crypter = Crypter::read(&reader)?;
    crypter.set_encoding(Encoding::None);
    Ok(crypter)
}
