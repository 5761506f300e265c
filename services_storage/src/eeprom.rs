//! Positional EEPROM backend
//!
//! Maps each object tag to a block of the [`BlockStore`]. Values are packed
//! back to back in registration order without tags, so they must be read
//! back in exactly the order they were written.

use crate::backend::{BackendKind, BlockMode, StorageBackend};
use crate::block_store::BlockStore;
use crate::error::{StorageError, StorageResult};
use crate::tag::block_id;
use core_types::{PropertyType, PropertyValue};
use hal::StorageMedium;

/// Block-store backed, positional storage backend
pub struct EepromBackend<M: StorageMedium> {
    store: BlockStore<M>,
    mode: Option<BlockMode>,
    name: String,
}

impl<M: StorageMedium> EepromBackend<M> {
    pub fn new(medium: M) -> Self {
        Self {
            store: BlockStore::new(medium),
            mode: None,
            name: "eeprom".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn store(&self) -> &BlockStore<M> {
        &self.store
    }

    /// Low-level access, e.g. for diagnostics
    pub fn store_mut(&mut self) -> &mut BlockStore<M> {
        &mut self.store
    }

    pub fn into_medium(self) -> M {
        self.store.into_medium()
    }

    fn require_open(&self) -> StorageResult<BlockMode> {
        self.mode.ok_or(StorageError::NoTransaction)
    }
}

impl<M: StorageMedium> StorageBackend for EepromBackend<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Internal
    }

    fn begin_block(&mut self, tag: &str, mode: BlockMode, size: usize) -> StorageResult<()> {
        if tag.is_empty() {
            return Err(StorageError::InvalidTag(tag.to_string()));
        }
        let id = block_id(tag);
        let offset = match mode {
            BlockMode::Write => self.store.begin_block(id, size)?,
            BlockMode::Read => self.store.begin_existing_block(id)?,
        };
        self.mode = Some(mode);
        log::trace!(
            "{}: opened block {:?} ({:#06x}) at offset {} for {:?}",
            self.name,
            tag,
            id,
            offset,
            mode
        );
        Ok(())
    }

    fn end_block(&mut self) -> StorageResult<()> {
        self.require_open()?;
        self.mode = None;
        self.store.end_block()
    }

    fn write_value(&mut self, _tag: &str, value: &PropertyValue) -> StorageResult<()> {
        if self.require_open()? == BlockMode::Read {
            return Err(StorageError::ReadOnly);
        }
        self.store.write_bytes(&value.to_bytes())
    }

    fn read_value(&mut self, _tag: &str, ty: PropertyType) -> StorageResult<Option<PropertyValue>> {
        self.require_open()?;
        let bytes = match ty.fixed_size() {
            Some(width) => {
                let mut buf = vec![0u8; width];
                self.store.read_bytes(&mut buf)?;
                buf
            }
            None => {
                let mut len = [0u8; 1];
                self.store.read_bytes(&mut len)?;
                let mut buf = vec![0u8; 1 + len[0] as usize];
                buf[0] = len[0];
                self.store.read_bytes(&mut buf[1..])?;
                buf
            }
        };
        let (value, _) = PropertyValue::decode_from(ty, &bytes)?;
        Ok(Some(value))
    }

    fn value_exists(&mut self, _tag: &str) -> bool {
        self.mode.is_some() && self.store.transaction().remaining() > 0
    }

    fn reset(&mut self) -> StorageResult<()> {
        self.store.reset_storage()
    }
}
