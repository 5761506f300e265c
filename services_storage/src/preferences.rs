//! ESP32 preferences (NVS) backend
//!
//! Each block tag becomes an NVS namespace and each value tag a key. NVS
//! limits both names to 15 characters, so tags are hashed into fixed-width
//! decimal strings first (see [`hashed_key`]). Memory management is left to
//! the partition; there is no allocation or compaction here.

use crate::backend::{BackendKind, BlockMode, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::tag::hashed_key;
use core_types::{PropertyType, PropertyValue};
use hal::NvsPartition;

#[derive(Debug)]
struct OpenNamespace {
    tag: String,
    namespace: String,
    mode: BlockMode,
}

/// Tag-keyed backend over a namespaced key/value partition
pub struct PreferencesBackend<P: NvsPartition> {
    partition: P,
    open: Option<OpenNamespace>,
    name: String,
}

impl<P: NvsPartition> PreferencesBackend<P> {
    pub fn new(partition: P) -> Self {
        Self {
            partition,
            open: None,
            name: "preferences".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn partition(&self) -> &P {
        &self.partition
    }

    pub fn into_partition(self) -> P {
        self.partition
    }

    fn open_namespace(&self) -> StorageResult<&OpenNamespace> {
        self.open.as_ref().ok_or(StorageError::NoTransaction)
    }
}

impl<P: NvsPartition> StorageBackend for PreferencesBackend<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Internal
    }

    fn begin_block(&mut self, tag: &str, mode: BlockMode, _size: usize) -> StorageResult<()> {
        if let Some(open) = &self.open {
            log::error!(
                "{}: begin_block({:?}) while {:?} is open",
                self.name,
                tag,
                open.tag
            );
            return Err(StorageError::TransactionConflict(open.tag.clone()));
        }
        let namespace = hashed_key(tag)?;
        if mode == BlockMode::Read && !self.partition.has_namespace(&namespace) {
            return Err(StorageError::BlockNotFound(tag.to_string()));
        }
        self.open = Some(OpenNamespace {
            tag: tag.to_string(),
            namespace,
            mode,
        });
        Ok(())
    }

    fn end_block(&mut self) -> StorageResult<()> {
        let open = self.open.take().ok_or(StorageError::NoTransaction)?;
        if open.mode == BlockMode::Write {
            self.partition.commit()?;
        }
        Ok(())
    }

    fn write_value(&mut self, tag: &str, value: &PropertyValue) -> StorageResult<()> {
        let key = hashed_key(tag)?;
        let open = self.open_namespace()?;
        if open.mode == BlockMode::Read {
            return Err(StorageError::ReadOnly);
        }
        let namespace = open.namespace.clone();
        self.partition.put(&namespace, &key, &value.to_bytes())?;
        Ok(())
    }

    fn read_value(&mut self, tag: &str, ty: PropertyType) -> StorageResult<Option<PropertyValue>> {
        let key = hashed_key(tag)?;
        let open = self.open_namespace()?;
        let Some(bytes) = self.partition.get(&open.namespace, &key) else {
            return Ok(None);
        };
        let (value, used) = PropertyValue::decode_from(ty, &bytes)?;
        if used != bytes.len() {
            return Err(StorageError::TypeMismatch {
                tag: tag.to_string(),
                expected: ty,
            });
        }
        Ok(Some(value))
    }

    fn value_exists(&mut self, tag: &str) -> bool {
        let (Ok(key), Some(open)) = (hashed_key(tag), self.open.as_ref()) else {
            return false;
        };
        self.partition.contains(&open.namespace, &key)
    }

    fn reset(&mut self) -> StorageResult<()> {
        if let Some(open) = &self.open {
            return Err(StorageError::TransactionConflict(open.tag.clone()));
        }
        log::info!("{}: erasing all namespaces", self.name);
        self.partition.erase_all()?;
        self.partition.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal::RamNvs;

    fn backend() -> PreferencesBackend<RamNvs> {
        PreferencesBackend::new(RamNvs::new())
    }

    #[test]
    fn test_values_by_tag_in_any_order() {
        let mut prefs = backend();
        prefs.begin_block("wifi_station", BlockMode::Write, 0).unwrap();
        prefs
            .write_value("ssid_name", &PropertyValue::Str("lab".to_string()))
            .unwrap();
        prefs
            .write_value("channel", &PropertyValue::UInt8(6))
            .unwrap();
        prefs.end_block().unwrap();

        prefs.begin_block("wifi_station", BlockMode::Read, 0).unwrap();
        assert_eq!(
            prefs.read_value("channel", PropertyType::UInt8).unwrap(),
            Some(PropertyValue::UInt8(6))
        );
        assert_eq!(
            prefs.read_value("ssid_name", PropertyType::Str).unwrap(),
            Some(PropertyValue::Str("lab".to_string()))
        );
        assert_eq!(prefs.read_value("missing_key", PropertyType::Bool).unwrap(), None);
        assert!(prefs.value_exists("channel"));
        assert!(!prefs.value_exists("missing_key"));
        prefs.end_block().unwrap();
    }

    #[test]
    fn test_keys_are_hashed() {
        let mut prefs = backend();
        prefs.begin_block("a_really_long_block_tag", BlockMode::Write, 0).unwrap();
        prefs
            .write_value("a_really_long_property_tag", &PropertyValue::Bool(true))
            .unwrap();
        prefs.end_block().unwrap();

        let ns = hashed_key("a_really_long_block_tag").unwrap();
        let key = hashed_key("a_really_long_property_tag").unwrap();
        assert_eq!(prefs.partition().get(&ns, &key), Some(vec![1]));
    }

    #[test]
    fn test_short_tags_rejected_before_partition() {
        let mut prefs = backend();
        assert!(matches!(
            prefs.begin_block("abc", BlockMode::Write, 0),
            Err(StorageError::InvalidTag(_))
        ));

        prefs.begin_block("valid_block", BlockMode::Write, 0).unwrap();
        assert!(matches!(
            prefs.write_value("ab", &PropertyValue::Bool(true)),
            Err(StorageError::InvalidTag(_))
        ));
        prefs.end_block().unwrap();
        assert!(prefs.partition().is_empty());
    }

    #[test]
    fn test_missing_namespace() {
        let mut prefs = backend();
        assert!(matches!(
            prefs.begin_block("never_saved", BlockMode::Read, 0),
            Err(StorageError::BlockNotFound(_))
        ));
    }

    #[test]
    fn test_one_block_at_a_time() {
        let mut prefs = backend();
        prefs.begin_block("first_block", BlockMode::Write, 0).unwrap();
        assert!(matches!(
            prefs.begin_block("second_block", BlockMode::Write, 0),
            Err(StorageError::TransactionConflict(_))
        ));
        prefs.end_block().unwrap();
    }

    #[test]
    fn test_type_mismatch() {
        let mut prefs = backend();
        prefs.begin_block("mixed_types", BlockMode::Write, 0).unwrap();
        prefs
            .write_value("counter", &PropertyValue::UInt32(1))
            .unwrap();
        prefs.end_block().unwrap();

        prefs.begin_block("mixed_types", BlockMode::Read, 0).unwrap();
        assert!(matches!(
            prefs.read_value("counter", PropertyType::UInt16),
            Err(StorageError::TypeMismatch { .. })
        ));
        prefs.end_block().unwrap();
    }

    #[test]
    fn test_reset_erases_everything() {
        let mut prefs = backend();
        prefs.begin_block("some_block", BlockMode::Write, 0).unwrap();
        prefs
            .write_value("value_one", &PropertyValue::Int8(-1))
            .unwrap();
        prefs.end_block().unwrap();

        prefs.reset().unwrap();
        assert!(prefs.partition().is_empty());
    }
}
