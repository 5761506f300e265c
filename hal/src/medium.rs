/// Byte-addressable storage medium abstraction
///
/// Provides a minimal positional read/write API over small, low-endurance
/// media such as EEPROM or an emulated-EEPROM flash partition.
/// This is the foundation for the positional block store.
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

/// Value of a byte after the medium has been erased
pub const ERASED_BYTE: u8 = 0xFF;

/// Medium errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumError {
    /// Offset or length outside the medium
    OutOfBounds,
    /// I/O error (hardware failure, write verification mismatch, etc.)
    IoError,
    /// Device not ready
    NotReady,
    /// Key or namespace name exceeds the partition limit
    KeyTooLong,
}

impl fmt::Display for MediumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "offset out of bounds"),
            Self::IoError => write!(f, "I/O error"),
            Self::NotReady => write!(f, "device not ready"),
            Self::KeyTooLong => write!(f, "key too long"),
        }
    }
}

/// Storage medium trait
///
/// Implementers provide positional byte read/write operations.
/// Writes may be cached until [`StorageMedium::commit`] is called, the same
/// way the ESP32 EEPROM emulation buffers writes in RAM.
pub trait StorageMedium {
    /// Total number of bytes on this medium
    fn capacity(&self) -> usize;

    /// Read `buffer.len()` bytes starting at `offset`
    ///
    /// # Errors
    /// Returns `MediumError::OutOfBounds` if the range exceeds `capacity()`
    /// Returns `MediumError::IoError` on hardware failure
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), MediumError>;

    /// Write `data` starting at `offset`
    ///
    /// # Errors
    /// Returns `MediumError::OutOfBounds` if the range exceeds `capacity()`
    /// Returns `MediumError::IoError` on hardware failure
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), MediumError>;

    /// Flush pending writes to persistent storage
    fn commit(&mut self) -> Result<(), MediumError> {
        // Default implementation: no-op (assume writes are synchronous)
        Ok(())
    }
}

fn check_range(capacity: usize, offset: usize, len: usize) -> Result<(), MediumError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(MediumError::OutOfBounds),
    }
}

/// RAM EEPROM - an in-memory storage medium
///
/// Useful for testing and for host builds. Starts in the erased state
/// (every byte `0xFF`), like a factory-fresh part.
#[derive(Debug, Clone)]
pub struct RamEeprom {
    bytes: Vec<u8>,
    commits: usize,
}

impl RamEeprom {
    /// Create a new erased medium with `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![ERASED_BYTE; capacity],
            commits: 0,
        }
    }

    /// Create a medium from an existing image (e.g. a dump taken earlier)
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            bytes: image,
            commits: 0,
        }
    }

    /// Raw contents (for test verification)
    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }

    /// Erase the whole medium back to `0xFF`
    pub fn erase(&mut self) {
        self.bytes.iter_mut().for_each(|b| *b = ERASED_BYTE);
    }

    /// Overwrite a range with a corrupt pattern (for testing error recovery)
    pub fn inject_corruption(&mut self, offset: usize, len: usize) {
        let end = (offset + len).min(self.bytes.len());
        for byte in &mut self.bytes[offset.min(end)..end] {
            *byte = 0xAA;
        }
    }

    /// Number of commits issued so far
    pub fn commit_count(&self) -> usize {
        self.commits
    }
}

impl StorageMedium for RamEeprom {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), MediumError> {
        check_range(self.bytes.len(), offset, buffer.len())?;
        buffer.copy_from_slice(&self.bytes[offset..offset + buffer.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), MediumError> {
        check_range(self.bytes.len(), offset, data.len())?;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), MediumError> {
        self.commits += 1;
        Ok(())
    }
}
