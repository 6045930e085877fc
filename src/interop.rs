//! The cross-implementation operation harness.
//!
//! Each operation pairs `generate` (produce an output under keysets found
//! below a root directory) with `test` (check an output, possibly through
//! a different role). Together they pin down the envelope and encoding
//! contracts well enough for independent implementations to check each
//! other's output.

use std::path::Path;

use serde_json::Value;

use crate::crypter::{Crypter, Encrypter};
use crate::facade::Encoding;
use crate::session::{SignedSessionDecrypter, SignedSessionEncrypter};
use crate::signer::{Signer, UnversionedSigner, UnversionedVerifier, Verifier};
use crate::{base64, KeyrollError};

/// A named harness operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operation {
    Sign,
    Attached,
    Unversioned,
    Encrypt,
    SignedSession,
}

impl Operation {
    pub fn from_name(name: &str) -> Option<Operation> {
        match name {
            "sign" => Some(Operation::Sign),
            "attached" => Some(Operation::Attached),
            "unversioned" => Some(Operation::Unversioned),
            "encrypt" => Some(Operation::Encrypt),
            "signedSession" => Some(Operation::SignedSession),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Sign => "sign",
            Operation::Attached => "attached",
            Operation::Unversioned => "unversioned",
            Operation::Encrypt => "encrypt",
            Operation::SignedSession => "signedSession",
        }
    }

    /// Produces an output for `test_data` under `key_root/algorithm`.
    pub fn generate(
        &self,
        key_root: &Path,
        algorithm: &str,
        params: &Value,
        test_data: &[u8],
    ) -> Result<Vec<u8>, KeyrollError> {
        let path = key_root.join(algorithm);
        match self {
            Operation::Sign => {
                let mut signer = Signer::read_dir(path)?;
                signer.set_encoding(encoding_param(params)?);
                signer.sign(test_data)
            }
            Operation::Attached => {
                let mut signer = Signer::read_dir(path)?;
                signer.set_encoding(encoding_param(params)?);
                signer.attached_sign(test_data, b"")
            }
            Operation::Unversioned => {
                let mut signer = UnversionedSigner::read_dir(path)?;
                signer.set_encoding(encoding_param(params)?);
                signer.sign(test_data)
            }
            Operation::Encrypt => {
                let encoding = encoding_param(params)?;
                let output = match str_param(params, "class")? {
                    "encrypter" => {
                        let mut encrypter = Encrypter::read_dir(path)?;
                        encrypter.set_encoding(encoding);
                        encrypter.encrypt(test_data)?
                    }
                    "crypter" => {
                        let mut crypter = Crypter::read_dir(path)?;
                        crypter.set_encoding(encoding);
                        crypter.encrypt(test_data)?
                    }
                    _ => return Err(KeyrollError::UnsupportedAlgorithm),
                };
                Ok(output)
            }
            Operation::SignedSession => {
                let signer_algorithm = str_param(params, "signer")?;
                let encrypter = Encrypter::read_dir(path)?;
                let signer = Signer::read_dir(key_root.join(signer_algorithm))?;
                let session = SignedSessionEncrypter::new(encrypter, signer)?;

                let blob = session.session_blob()?;
                let payload = session.encrypt(test_data)?;
                let output = serde_json::json!({
                    "output": base64::encode(&payload),
                    "sessionMaterial": blob,
                });
                Ok(output.to_string().into_bytes())
            }
        }
    }

    /// Checks an output produced by [`Operation::generate`], possibly by
    /// a different implementation.
    pub fn test(
        &self,
        output: &[u8],
        key_root: &Path,
        algorithm: &str,
        generate_params: &Value,
        test_params: &Value,
        test_data: &[u8],
    ) -> bool {
        self.run_test(
            output,
            key_root,
            algorithm,
            generate_params,
            test_params,
            test_data,
        )
        .unwrap_or(false)
    }

    fn run_test(
        &self,
        output: &[u8],
        key_root: &Path,
        algorithm: &str,
        generate_params: &Value,
        test_params: &Value,
        test_data: &[u8],
    ) -> Result<bool, KeyrollError> {
        let path = key_root.join(algorithm);
        match self {
            Operation::Sign => {
                let encoding = encoding_param(generate_params)?;
                Ok(match str_param(test_params, "class")? {
                    "signer" => {
                        let mut signer = Signer::read_dir(path)?;
                        signer.set_encoding(encoding);
                        signer.verify(test_data, output).is_ok()
                    }
                    "verifier" => {
                        let mut verifier = Verifier::read_dir(path)?;
                        verifier.set_encoding(encoding);
                        verifier.verify(test_data, output).is_ok()
                    }
                    _ => return Err(KeyrollError::UnsupportedAlgorithm),
                })
            }
            Operation::Attached => {
                let encoding = encoding_param(generate_params)?;
                let message = match str_param(test_params, "class")? {
                    "signer" => {
                        let mut signer = Signer::read_dir(path)?;
                        signer.set_encoding(encoding);
                        signer.attached_verify(output, b"")
                    }
                    "verifier" => {
                        let mut verifier = Verifier::read_dir(path)?;
                        verifier.set_encoding(encoding);
                        verifier.attached_verify(output, b"")
                    }
                    _ => return Err(KeyrollError::UnsupportedAlgorithm),
                };
                Ok(message.map(|m| m == test_data).unwrap_or(false))
            }
            Operation::Unversioned => {
                let encoding = encoding_param(generate_params)?;
                Ok(match str_param(test_params, "class")? {
                    "signer" => {
                        let mut signer = UnversionedSigner::read_dir(path)?;
                        signer.set_encoding(encoding);
                        signer.verify(test_data, output).is_ok()
                    }
                    "verifier" => {
                        let mut verifier = UnversionedVerifier::read_dir(path)?;
                        verifier.set_encoding(encoding);
                        verifier.verify(test_data, output).is_ok()
                    }
                    _ => return Err(KeyrollError::UnsupportedAlgorithm),
                })
            }
            Operation::Encrypt => {
                let mut crypter = Crypter::read_dir(path)?;
                crypter.set_encoding(encoding_param(generate_params)?);
                Ok(crypter
                    .decrypt(output)
                    .map(|plaintext| plaintext == test_data)
                    .unwrap_or(false))
            }
            Operation::SignedSession => {
                let json: Value = serde_json::from_slice(output)
                    .map_err(|_| KeyrollError::FormatError)?;
                let payload = base64::decode(
                    json.get("output")
                        .and_then(Value::as_str)
                        .ok_or(KeyrollError::FormatError)?,
                )?;
                let blob = json
                    .get("sessionMaterial")
                    .and_then(Value::as_str)
                    .ok_or(KeyrollError::FormatError)?;

                let signer_algorithm = str_param(generate_params, "signer")?;
                let crypter = Crypter::read_dir(path)?;
                let verifier = Verifier::read_dir(key_root.join(signer_algorithm))?;
                let session = SignedSessionDecrypter::new(crypter, verifier, blob)?;
                Ok(session
                    .decrypt(&payload)
                    .map(|plaintext| plaintext == test_data)
                    .unwrap_or(false))
            }
        }
    }

    /// Wraps raw output as `{"output": base64w}`. Signed-session outputs
    /// are already JSON and pass through.
    pub fn output_to_json(&self, output: &[u8]) -> Result<String, KeyrollError> {
        if *self == Operation::SignedSession {
            return String::from_utf8(output.to_vec()).map_err(|_| KeyrollError::FormatError);
        }
        let wrapped = serde_json::json!({ "output": base64::encode(output) });
        Ok(wrapped.to_string())
    }

    /// The inverse of [`Operation::output_to_json`].
    pub fn input_from_json(&self, json: &str) -> Result<Vec<u8>, KeyrollError> {
        if *self == Operation::SignedSession {
            return Ok(json.as_bytes().to_vec());
        }
        let value: Value = serde_json::from_str(json).map_err(|_| KeyrollError::FormatError)?;
        base64::decode(
            value
                .get("output")
                .and_then(Value::as_str)
                .ok_or(KeyrollError::FormatError)?,
        )
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, KeyrollError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or(KeyrollError::UnsupportedAlgorithm)
}

fn encoding_param(params: &Value) -> Result<Encoding, KeyrollError> {
    match str_param(params, "encoding")? {
        "encoded" => Ok(Encoding::Base64w),
        "unencoded" => Ok(Encoding::None),
        _ => Err(KeyrollError::UnsupportedAlgorithm),
    }
}
