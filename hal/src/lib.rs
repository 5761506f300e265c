#![no_std]

//! # Hardware Abstraction Layer (HAL)
//!
//! This crate defines the storage hardware traits the persistence engine
//! runs on.
//!
//! ## Philosophy
//!
//! **Storage hardware must be fully abstracted and swappable.**
//!
//! The block store does not know whether it writes to a real EEPROM, an
//! emulated-EEPROM flash partition or a RAM buffer on the host.
//!
//! ## Design Principles
//!
//! 1. **Trait-based**: All medium operations go through traits
//! 2. **Synchronous**: Writes complete (or fail) before the call returns
//! 3. **Testable**: RAM implementations back every trait

extern crate alloc;

pub mod medium;
pub mod nvs;

pub use medium::{MediumError, RamEeprom, StorageMedium, ERASED_BYTE};
pub use nvs::{NvsPartition, RamNvs, MAX_KEY_LEN};
