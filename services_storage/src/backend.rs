//! Storage backend contract
//!
//! Every backend exposes the same block-oriented API so the save/restore
//! cascade never needs to know how a medium lays out its data.

use crate::error::StorageResult;
use core_types::{PropertyType, PropertyValue};
use std::fmt;

/// Trust classification of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// On-device storage (EEPROM, NVS). Data must carry the identity guard.
    Internal,
    /// Removable or exported storage (SD card, cloud export). Trusted by source.
    External,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Internal => write!(f, "internal"),
            BackendKind::External => write!(f, "external"),
        }
    }
}

/// How a block is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// Open an existing block; never allocates
    Read,
    /// Open or create a block with room for the given size
    Write,
}

/// A block-oriented storage backend
///
/// One block may be open at a time. Values are addressed by tag; positional
/// backends ignore the tag and rely on the caller reading values back in
/// the order they were written.
pub trait StorageBackend {
    /// Short name used in log messages
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    /// Opens the block identified by `tag`
    ///
    /// `size` is the number of data bytes the caller is about to write; it
    /// is ignored in [`BlockMode::Read`] and by tag-keyed backends.
    fn begin_block(&mut self, tag: &str, mode: BlockMode, size: usize) -> StorageResult<()>;

    /// Closes the open block, flushing it to the medium
    fn end_block(&mut self) -> StorageResult<()>;

    /// Stores `value` under `tag` in the open block
    fn write_value(&mut self, tag: &str, value: &PropertyValue) -> StorageResult<()>;

    /// Reads the value stored under `tag` in the open block
    ///
    /// `Ok(None)` means the value is absent and the caller keeps its default.
    fn read_value(&mut self, tag: &str, ty: PropertyType) -> StorageResult<Option<PropertyValue>>;

    /// Whether the open block holds a value for `tag`
    fn value_exists(&mut self, tag: &str) -> bool;

    /// Erases every block (factory reset)
    fn reset(&mut self) -> StorageResult<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn begin_block(&mut self, tag: &str, mode: BlockMode, size: usize) -> StorageResult<()> {
        (**self).begin_block(tag, mode, size)
    }

    fn end_block(&mut self) -> StorageResult<()> {
        (**self).end_block()
    }

    fn write_value(&mut self, tag: &str, value: &PropertyValue) -> StorageResult<()> {
        (**self).write_value(tag, value)
    }

    fn read_value(&mut self, tag: &str, ty: PropertyType) -> StorageResult<Option<PropertyValue>> {
        (**self).read_value(tag, ty)
    }

    fn value_exists(&mut self, tag: &str) -> bool {
        (**self).value_exists(tag)
    }

    fn reset(&mut self) -> StorageResult<()> {
        (**self).reset()
    }
}
