//! Identity guard
//!
//! The tree root's block carries a hash of the application identity string.
//! On internal media the hash must match before any restored value is
//! trusted, so a board flashed with different firmware does not pick up
//! foreign settings.

use services_storage::BackendKind;

/// Reserved value tag holding the identity hash inside the root block
pub const IDENTITY_KEY: &str = "identity_hash";

/// Hash stored under [`IDENTITY_KEY`]
pub fn identity_hash(identity: &str) -> u32 {
    crc32fast::hash(identity.as_bytes())
}

/// How a restore treats the identity hash in the root block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardCheck {
    /// The stored hash must exist and equal this value
    Enforce(u32),
    /// The stored hash is read if present and discarded
    Ignore,
    /// The block was saved without an identity hash
    Absent,
}

impl GuardCheck {
    /// Internal backends are verified by hash, external ones by source
    pub fn for_kind(kind: BackendKind, hash: u32) -> Self {
        match kind {
            BackendKind::Internal => GuardCheck::Enforce(hash),
            BackendKind::External => GuardCheck::Ignore,
        }
    }
}
