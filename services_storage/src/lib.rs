//! # Storage Service
//!
//! This crate turns small, low-endurance media into named records that the
//! settings layer can save objects into.
//!
//! ## Philosophy
//!
//! **Storage is a flat namespace of blocks.**
//!
//! The live object graph is a tree, but its persisted form is not: every
//! object gets its own independently keyed block. We provide:
//! - A positional block allocator for raw EEPROM-style media
//! - Tag-keyed adapters for key/value partitions and JSON documents
//! - One backend contract so callers never care which one they talk to
//!
//! ## Design
//!
//! - **BlockStore**: cookie + header chain + EOF marker on a byte medium
//! - **StorageBackend**: begin/read/write/end over one open block at a time
//! - **BackendKind**: internal media carry an identity guard, external ones
//!   are trusted by source
//! - **FailingMedium**: fault injection for tests

pub mod backend;
pub mod block_store;
pub mod eeprom;
pub mod error;
pub mod failing_medium;
pub mod json;
pub mod preferences;
pub mod tag;

pub use backend::{BackendKind, BlockMode, StorageBackend};
pub use block_store::{BlockHeader, BlockStore, BlockTransaction, MAGIC_COOKIE};
pub use eeprom::EepromBackend;
pub use error::{StorageError, StorageResult};
pub use failing_medium::{FailingMedium, FailurePolicy};
pub use json::JsonBackend;
pub use preferences::PreferencesBackend;
pub use tag::{block_id, hashed_key, MIN_TAG_LEN};
