//! An ordered, versioned collection of keys sharing one purpose.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::envelope::KeyHash;
use crate::keys::Key;
use crate::metadata::{KeyStatus, KeyVersion, KeysetMetadata};
use crate::rw::{KeysetReader, KeysetWriter};
use crate::KeyrollError;

/// A keyset owns its keys; façades borrow it read-only. At most one
/// version is primary, and only that version produces new output.
pub struct Keyset {
    metadata: KeysetMetadata,
    keys: BTreeMap<u32, Key>,
    by_hash: HashMap<KeyHash, Vec<u32>>,
}

impl Keyset {
    /// Creates an empty keyset around fresh metadata.
    pub fn new(metadata: KeysetMetadata) -> Result<Self, KeyrollError> {
        if !metadata.versions.is_empty() {
            return Err(KeyrollError::InvalidKeyset);
        }
        Ok(Keyset {
            metadata,
            keys: BTreeMap::new(),
            by_hash: HashMap::new(),
        })
    }

    /// Loads a keyset: the metadata document, then every version's key.
    ///
    /// With `check_purpose` set, the metadata purpose must be one the
    /// key type can serve.
    pub fn read(reader: &dyn KeysetReader, check_purpose: bool) -> Result<Self, KeyrollError> {
        let metadata: KeysetMetadata = serde_json::from_value(reader.metadata()?)
            .map_err(|e| {
                debug!(error = %e, "malformed keyset metadata");
                KeyrollError::InvalidKeyset
            })?;
        metadata.validate()?;
        if metadata.encrypted {
            debug!("encrypted keysets are not supported");
            return Err(KeyrollError::InvalidKeyset);
        }
        if check_purpose && !metadata.key_type.supports_purpose(metadata.purpose) {
            debug!(
                key_type = %metadata.key_type,
                "keyset purpose does not match its key type"
            );
            return Err(KeyrollError::InvalidKeyset);
        }

        let mut keyset = Keyset {
            metadata,
            keys: BTreeMap::new(),
            by_hash: HashMap::new(),
        };
        for record in keyset.metadata.versions.clone() {
            let value = reader.key(record.version_number).map_err(|e| match e {
                KeyrollError::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                    debug!(version = record.version_number, "referenced version missing");
                    KeyrollError::InvalidKeyset
                }
                other => other,
            })?;
            let key = Key::from_value(keyset.metadata.key_type, &value)?;
            keyset.index(record.version_number, key);
        }
        Ok(keyset)
    }

    pub fn metadata(&self) -> &KeysetMetadata {
        &self.metadata
    }

    pub fn primary_key(&self) -> Option<&Key> {
        self.metadata
            .primary_version()
            .and_then(|v| self.keys.get(&v))
    }

    pub fn key(&self, version: u32) -> Option<&Key> {
        self.keys.get(&version)
    }

    /// Every key whose hash matches, in version order. Collisions within
    /// a keyset are rare but permitted, so callers try each candidate.
    pub fn keys_from_hash(&self, hash: &KeyHash) -> impl Iterator<Item = &Key> + '_ {
        self.by_hash
            .get(hash)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(move |v| self.keys.get(v))
    }

    /// Version-ordered iteration over every key.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Key)> + '_ {
        self.keys.iter().map(|(v, k)| (*v, k))
    }

    /// Version-ordered iteration skipping inactive versions; the set a
    /// headerless verification walks.
    pub fn verifying_keys(&self) -> impl Iterator<Item = &Key> + '_ {
        self.keys.iter().filter_map(move |(v, k)| {
            let record = self.metadata.version(*v)?;
            (record.status != KeyStatus::Inactive).then_some(k)
        })
    }

    /// Generates a new version at the type's default size.
    pub fn generate_key(&mut self, status: KeyStatus) -> Result<u32, KeyrollError> {
        self.generate_key_sized(status, self.metadata.key_type.default_size())
    }

    pub fn generate_key_sized(&mut self, status: KeyStatus, size: u32) -> Result<u32, KeyrollError> {
        let key = Key::generate(self.metadata.key_type, size)?;
        Ok(self.insert(key, status))
    }

    /// Adds a key from its canonical JSON value.
    pub fn import_key(
        &mut self,
        value: &serde_json::Value,
        status: KeyStatus,
    ) -> Result<u32, KeyrollError> {
        let key = Key::from_value(self.metadata.key_type, value)?;
        Ok(self.insert(key, status))
    }

    /// Makes `version` primary. The old primary, if any, moves to
    /// active in the same step.
    pub fn promote(&mut self, version: u32) -> Result<(), KeyrollError> {
        if self.metadata.version(version).is_none() {
            return Err(KeyrollError::InvalidKeyset);
        }
        if let Some(old) = self.metadata.primary_version() {
            if old != version {
                self.set_status(old, KeyStatus::Active);
            }
        }
        self.set_status(version, KeyStatus::Primary);
        Ok(())
    }

    /// Steps `version` down: primary becomes active, active becomes
    /// inactive.
    pub fn demote(&mut self, version: u32) -> Result<(), KeyrollError> {
        let record = self
            .metadata
            .version(version)
            .ok_or(KeyrollError::InvalidKeyset)?;
        let next = match record.status {
            KeyStatus::Primary => KeyStatus::Active,
            KeyStatus::Active => KeyStatus::Inactive,
            KeyStatus::Inactive => return Err(KeyrollError::InvalidKeyset),
        };
        self.set_status(version, next);
        Ok(())
    }

    /// Removes an inactive version and its material.
    pub fn revoke(&mut self, version: u32) -> Result<(), KeyrollError> {
        let record = self
            .metadata
            .version(version)
            .ok_or(KeyrollError::InvalidKeyset)?;
        if record.status != KeyStatus::Inactive {
            return Err(KeyrollError::InvalidKeyset);
        }
        self.metadata
            .versions
            .retain(|v| v.version_number != version);
        if let Some(key) = self.keys.remove(&version) {
            if let Some(versions) = self.by_hash.get_mut(&key.hash()) {
                versions.retain(|&v| v != version);
            }
        }
        Ok(())
    }

    /// Persists the metadata and every version file.
    pub fn write(&self, writer: &dyn KeysetWriter) -> Result<(), KeyrollError> {
        let metadata =
            serde_json::to_value(&self.metadata).map_err(|_| KeyrollError::InvalidKeyset)?;
        writer.put_metadata(&metadata)?;
        for (version, key) in &self.keys {
            writer.put_key(*version, &key.to_value()?)?;
        }
        Ok(())
    }

    fn insert(&mut self, key: Key, status: KeyStatus) -> u32 {
        let version = self.metadata.next_version_number();
        if status == KeyStatus::Primary {
            if let Some(old) = self.metadata.primary_version() {
                self.set_status(old, KeyStatus::Active);
            }
        }
        self.metadata.versions.push(KeyVersion {
            version_number: version,
            status,
            exportable: false,
        });
        self.index(version, key);
        version
    }

    fn index(&mut self, version: u32, key: Key) {
        self.by_hash.entry(key.hash()).or_default().push(version);
        self.keys.insert(version, key);
    }

    fn set_status(&mut self, version: u32, status: KeyStatus) {
        if let Some(record) = self
            .metadata
            .versions
            .iter_mut()
            .find(|v| v.version_number == version)
        {
            record.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{KeyPurpose, KeyType};

    fn hmac_keyset() -> Keyset {
        Keyset::new(KeysetMetadata::new(
            "test",
            KeyPurpose::SignAndVerify,
            KeyType::HmacSha1,
        ))
        .unwrap()
    }

    #[test]
    fn generated_primary_is_looked_up_by_hash() {
        let mut keyset = hmac_keyset();
        let version = keyset.generate_key(KeyStatus::Primary).unwrap();
        assert_eq!(version, 1);

        let hash = keyset.primary_key().unwrap().hash();
        assert_eq!(keyset.keys_from_hash(&hash).count(), 1);
        assert_eq!(keyset.keys_from_hash(&KeyHash([9; 4])).count(), 0);
    }

    #[test]
    fn a_second_primary_demotes_the_first() {
        let mut keyset = hmac_keyset();
        keyset.generate_key(KeyStatus::Primary).unwrap();
        keyset.generate_key(KeyStatus::Primary).unwrap();

        assert_eq!(keyset.metadata().primary_version(), Some(2));
        assert_eq!(
            keyset.metadata().version(1).unwrap().status,
            KeyStatus::Active
        );
        keyset.metadata().validate().unwrap();
    }

    #[test]
    fn promote_swaps_atomically() {
        let mut keyset = hmac_keyset();
        keyset.generate_key(KeyStatus::Primary).unwrap();
        keyset.generate_key(KeyStatus::Active).unwrap();

        keyset.promote(2).unwrap();
        assert_eq!(keyset.metadata().primary_version(), Some(2));
        assert_eq!(
            keyset.metadata().version(1).unwrap().status,
            KeyStatus::Active
        );
        keyset.metadata().validate().unwrap();

        assert!(keyset.promote(9).is_err());
    }

    #[test]
    fn demote_steps_down_and_revoke_requires_inactive() {
        let mut keyset = hmac_keyset();
        keyset.generate_key(KeyStatus::Primary).unwrap();

        assert!(keyset.revoke(1).is_err());
        keyset.demote(1).unwrap();
        assert!(keyset.revoke(1).is_err());
        keyset.demote(1).unwrap();
        keyset.revoke(1).unwrap();
        assert!(keyset.key(1).is_none());
        assert!(keyset.metadata().versions.is_empty());
    }

    #[test]
    fn verifying_keys_skip_inactive_versions() {
        let mut keyset = hmac_keyset();
        keyset.generate_key(KeyStatus::Primary).unwrap();
        keyset.generate_key(KeyStatus::Active).unwrap();
        keyset.generate_key(KeyStatus::Inactive).unwrap();

        assert_eq!(keyset.iter().count(), 3);
        assert_eq!(keyset.verifying_keys().count(), 2);
    }
}
