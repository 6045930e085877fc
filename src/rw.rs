//! Keyset storage: readers that yield metadata and keys by version, and
//! the matching writers.
//!
//! The on-disk layout is a directory holding a `meta` document plus one
//! file per version, named by its number.

use std::fs;
use std::path::{Path, PathBuf};

use crate::keys::Key;
use crate::metadata::{KeyPurpose, KeyStatus, KeyVersion, KeysetMetadata};
use crate::KeyrollError;

pub trait KeysetReader {
    fn metadata(&self) -> Result<serde_json::Value, KeyrollError>;
    fn key(&self, version: u32) -> Result<serde_json::Value, KeyrollError>;
}

pub trait KeysetWriter {
    fn put_metadata(&self, metadata: &serde_json::Value) -> Result<(), KeyrollError>;
    fn put_key(&self, version: u32, key: &serde_json::Value) -> Result<(), KeyrollError>;
}

/// Reads a keyset from a directory.
pub struct KeysetFileReader {
    dir: PathBuf,
}

impl KeysetFileReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        KeysetFileReader { dir: dir.into() }
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, KeyrollError> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|_| KeyrollError::InvalidKeyset)
}

impl KeysetReader for KeysetFileReader {
    fn metadata(&self) -> Result<serde_json::Value, KeyrollError> {
        read_json(&self.dir.join("meta"))
    }

    fn key(&self, version: u32) -> Result<serde_json::Value, KeyrollError> {
        read_json(&self.dir.join(version.to_string()))
    }
}

/// Writes a keyset into a directory, creating it as needed.
pub struct KeysetFileWriter {
    dir: PathBuf,
}

impl KeysetFileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, KeyrollError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(KeysetFileWriter { dir })
    }
}

impl KeysetWriter for KeysetFileWriter {
    fn put_metadata(&self, metadata: &serde_json::Value) -> Result<(), KeyrollError> {
        fs::write(self.dir.join("meta"), metadata.to_string())?;
        Ok(())
    }

    fn put_key(&self, version: u32, key: &serde_json::Value) -> Result<(), KeyrollError> {
        fs::write(self.dir.join(version.to_string()), key.to_string())?;
        Ok(())
    }
}

/// Presents a single key as a one-version primary keyset, so that
/// ephemeral material (session keys) can drive the ordinary pipelines.
pub struct ImportedKeyReader {
    metadata: KeysetMetadata,
    key: Key,
}

impl ImportedKeyReader {
    pub fn new(key: Key, purpose: KeyPurpose) -> Self {
        let mut metadata = KeysetMetadata::new("imported", purpose, key.key_type());
        metadata.versions.push(KeyVersion {
            version_number: 1,
            status: KeyStatus::Primary,
            exportable: false,
        });
        ImportedKeyReader { metadata, key }
    }
}

impl KeysetReader for ImportedKeyReader {
    fn metadata(&self) -> Result<serde_json::Value, KeyrollError> {
        serde_json::to_value(&self.metadata).map_err(|_| KeyrollError::InvalidKeyset)
    }

    fn key(&self, version: u32) -> Result<serde_json::Value, KeyrollError> {
        if version != 1 {
            return Err(KeyrollError::InvalidKeyset);
        }
        self.key.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyset::Keyset;
    use crate::metadata::KeyType;

    #[test]
    fn keyset_survives_a_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmac");

        let mut keyset = Keyset::new(KeysetMetadata::new(
            "disk",
            KeyPurpose::SignAndVerify,
            KeyType::HmacSha1,
        ))
        .unwrap();
        keyset.generate_key(KeyStatus::Primary).unwrap();
        keyset.generate_key(KeyStatus::Active).unwrap();
        keyset.write(&KeysetFileWriter::new(&path).unwrap()).unwrap();

        let back = Keyset::read(&KeysetFileReader::new(&path), true).unwrap();
        assert_eq!(back.metadata().name, "disk");
        assert_eq!(back.metadata().primary_version(), Some(1));
        assert_eq!(
            back.primary_key().unwrap().hash(),
            keyset.primary_key().unwrap().hash()
        );
        assert_eq!(back.iter().count(), 2);
    }

    #[test]
    fn missing_version_file_fails_the_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken");

        let mut keyset = Keyset::new(KeysetMetadata::new(
            "broken",
            KeyPurpose::SignAndVerify,
            KeyType::HmacSha1,
        ))
        .unwrap();
        keyset.generate_key(KeyStatus::Primary).unwrap();
        keyset.write(&KeysetFileWriter::new(&path).unwrap()).unwrap();
        std::fs::remove_file(path.join("1")).unwrap();

        assert!(matches!(
            Keyset::read(&KeysetFileReader::new(&path), true),
            Err(KeyrollError::InvalidKeyset)
        ));
    }

    #[test]
    fn imported_key_reader_is_a_primary_keyset() {
        let key = Key::generate(KeyType::Aes, 128).unwrap();
        let hash = key.hash();
        let reader = ImportedKeyReader::new(key, KeyPurpose::DecryptAndEncrypt);

        let keyset = Keyset::read(&reader, true).unwrap();
        assert_eq!(keyset.primary_key().unwrap().hash(), hash);
        assert!(reader.key(2).is_err());
    }
}
