//! Session envelope tests: ephemeral AES keys sealed under an
//! asymmetric keyset, with and without a sender signature.

use keyroll::{
    Crypter, Encrypter, KeyPurpose, KeyStatus, KeyType, Keyset, KeysetMetadata, SessionDecrypter,
    SessionEncrypter, Signer, SignedSessionDecrypter, SignedSessionEncrypter, Verifier,
};
use tempfile::TempDir;

/// Writes an RSA crypt keyset and an HMAC signing keyset to disk so both
/// sides of the session can load their own copies.
fn fixtures() -> TempDir {
    let dir = tempfile::tempdir().unwrap();

    let mut rsa = Keyset::new(KeysetMetadata::new(
        "rsa-session",
        KeyPurpose::DecryptAndEncrypt,
        KeyType::RsaPriv,
    ))
    .unwrap();
    rsa.generate_key_sized(KeyStatus::Primary, 1024).unwrap();
    rsa.write(&keyroll::rw::KeysetFileWriter::new(dir.path().join("rsa")).unwrap())
        .unwrap();

    let mut hmac = Keyset::new(KeysetMetadata::new(
        "hmac-session",
        KeyPurpose::SignAndVerify,
        KeyType::HmacSha1,
    ))
    .unwrap();
    hmac.generate_key(KeyStatus::Primary).unwrap();
    hmac.write(&keyroll::rw::KeysetFileWriter::new(dir.path().join("hmac")).unwrap())
        .unwrap();

    dir
}

#[test]
fn plain_session_round_trips() {
    let dir = fixtures();
    let encrypter = Encrypter::read_dir(dir.path().join("rsa")).unwrap();
    let session = SessionEncrypter::new(encrypter).unwrap();

    let material = session.session_material();
    let ciphertext = session.encrypt(b"session payload").unwrap();

    let crypter = Crypter::read_dir(dir.path().join("rsa")).unwrap();
    let decrypter = SessionDecrypter::new(crypter, &material).unwrap();
    assert_eq!(decrypter.decrypt(&ciphertext).unwrap(), b"session payload");
}

#[test]
fn plain_session_rejects_foreign_material() {
    let dir = fixtures();

    let mut other = Keyset::new(KeysetMetadata::new(
        "other",
        KeyPurpose::DecryptAndEncrypt,
        KeyType::RsaPriv,
    ))
    .unwrap();
    other.generate_key_sized(KeyStatus::Primary, 1024).unwrap();

    let encrypter = Encrypter::read_dir(dir.path().join("rsa")).unwrap();
    let session = SessionEncrypter::new(encrypter).unwrap();

    let crypter = Crypter::new(other).unwrap();
    assert!(SessionDecrypter::new(crypter, &session.session_material()).is_err());
}

#[test]
fn signed_session_round_trips() {
    let dir = fixtures();
    let encrypter = Encrypter::read_dir(dir.path().join("rsa")).unwrap();
    let signer = Signer::read_dir(dir.path().join("hmac")).unwrap();
    let session = SignedSessionEncrypter::new(encrypter, signer).unwrap();

    let blob = session.session_blob().unwrap();
    let ciphertext = session.encrypt(b"signed payload").unwrap();

    // the blob is a JSON object naming the sealed key and the signature
    let parsed: serde_json::Value = serde_json::from_str(&blob).unwrap();
    assert!(parsed["sessionKey"].is_string());
    assert!(parsed["signature"].is_string());

    let crypter = Crypter::read_dir(dir.path().join("rsa")).unwrap();
    let verifier = Verifier::read_dir(dir.path().join("hmac")).unwrap();
    let decrypter = SignedSessionDecrypter::new(crypter, verifier, &blob).unwrap();
    assert_eq!(decrypter.decrypt(&ciphertext).unwrap(), b"signed payload");
}

#[test]
fn signed_session_rejects_a_tampered_blob() {
    let dir = fixtures();
    let encrypter = Encrypter::read_dir(dir.path().join("rsa")).unwrap();
    let signer = Signer::read_dir(dir.path().join("hmac")).unwrap();
    let session = SignedSessionEncrypter::new(encrypter, signer).unwrap();

    let blob = session.session_blob().unwrap();
    let mut parsed: serde_json::Value = serde_json::from_str(&blob).unwrap();

    // swap the sealed key for a different session's: the signature no
    // longer covers it
    let other = {
        let encrypter = Encrypter::read_dir(dir.path().join("rsa")).unwrap();
        let signer = Signer::read_dir(dir.path().join("hmac")).unwrap();
        SignedSessionEncrypter::new(encrypter, signer).unwrap()
    };
    let other_blob: serde_json::Value =
        serde_json::from_str(&other.session_blob().unwrap()).unwrap();
    parsed["sessionKey"] = other_blob["sessionKey"].clone();

    let crypter = Crypter::read_dir(dir.path().join("rsa")).unwrap();
    let verifier = Verifier::read_dir(dir.path().join("hmac")).unwrap();
    assert!(SignedSessionDecrypter::new(crypter, verifier, &parsed.to_string()).is_err());
}

#[test]
fn signed_session_rejects_the_wrong_verifier() {
    let dir = fixtures();
    let encrypter = Encrypter::read_dir(dir.path().join("rsa")).unwrap();
    let signer = Signer::read_dir(dir.path().join("hmac")).unwrap();
    let session = SignedSessionEncrypter::new(encrypter, signer).unwrap();
    let blob = session.session_blob().unwrap();

    let mut stranger = Keyset::new(KeysetMetadata::new(
        "stranger",
        KeyPurpose::SignAndVerify,
        KeyType::HmacSha1,
    ))
    .unwrap();
    stranger.generate_key(KeyStatus::Primary).unwrap();

    let crypter = Crypter::read_dir(dir.path().join("rsa")).unwrap();
    let verifier = Verifier::new(stranger).unwrap();
    assert!(SignedSessionDecrypter::new(crypter, verifier, &blob).is_err());
}
