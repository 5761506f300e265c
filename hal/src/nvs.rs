//! Namespaced key/value partition abstraction
//!
//! Models the ESP32 NVS "preferences" store: values live under a short
//! namespace and a short key, both limited to [`MAX_KEY_LEN`] characters.

use crate::MediumError;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Longest namespace or key name the partition accepts
pub const MAX_KEY_LEN: usize = 15;

/// Key/value partition trait
pub trait NvsPartition {
    /// Read the value stored under `namespace`/`key`
    fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>>;

    /// Store `value` under `namespace`/`key`, replacing any previous value
    ///
    /// # Errors
    /// Returns `MediumError::KeyTooLong` if either name exceeds [`MAX_KEY_LEN`]
    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), MediumError>;

    /// Whether a value exists under `namespace`/`key`
    fn contains(&self, namespace: &str, key: &str) -> bool {
        self.get(namespace, key).is_some()
    }

    /// Whether the namespace holds at least one key
    fn has_namespace(&self, namespace: &str) -> bool;

    /// Remove every key of a namespace
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), MediumError>;

    /// Remove every namespace
    fn erase_all(&mut self) -> Result<(), MediumError>;

    /// Flush pending writes
    fn commit(&mut self) -> Result<(), MediumError> {
        Ok(())
    }
}

/// RAM NVS - an in-memory key/value partition
#[derive(Debug, Clone, Default)]
pub struct RamNvs {
    entries: BTreeMap<(String, String), Vec<u8>>,
}

impl RamNvs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys across all namespaces
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NvsPartition for RamNvs {
    fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), MediumError> {
        if namespace.len() > MAX_KEY_LEN || key.len() > MAX_KEY_LEN {
            return Err(MediumError::KeyTooLong);
        }
        self.entries
            .insert((namespace.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    fn has_namespace(&self, namespace: &str) -> bool {
        self.entries.keys().any(|(ns, _)| ns == namespace)
    }

    fn erase_namespace(&mut self, namespace: &str) -> Result<(), MediumError> {
        self.entries.retain(|(ns, _), _| ns != namespace);
        Ok(())
    }

    fn erase_all(&mut self) -> Result<(), MediumError> {
        self.entries.clear();
        Ok(())
    }
}
