//! # Settings Service
//!
//! Persists the settings held in an object tree and brings them back after
//! a power cycle.
//!
//! ## Philosophy
//!
//! - **Explicit context**: one [`SettingsManager`] owns its backends, no
//!   global registry
//! - **Never trust foreign data**: internal media carry an identity hash
//! - **Degrade, don't fail**: a broken block costs that block, not the tree
//! - **Heal forward**: data found under legacy tags or on the fallback is
//!   written back to the primary in the current layout
//!
//! ## Example
//!
//! ```ignore
//! use hal::RamEeprom;
//! use services_settings::{SettingsConfig, SettingsManager};
//! use services_storage::EepromBackend;
//!
//! let mut manager = SettingsManager::new(SettingsConfig::with_identity("sensorhub"));
//! manager.set_storage(Box::new(EepromBackend::new(RamEeprom::new(1024))));
//!
//! // At boot: keep defaults if nothing usable is stored
//! let _ = manager.restore(&mut tree, None);
//!
//! // After the user changes something
//! manager.save(&tree, None)?;
//! ```

pub mod cascade;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod manager;

pub use cascade::{restore_tree, save_tree};
pub use config::{SettingsConfig, DEFAULT_IDENTITY};
pub use error::{CascadeError, ConfigError, SettingsError};
pub use events::{EventOutcome, SettingsEvent};
pub use identity::{identity_hash, GuardCheck, IDENTITY_KEY};
pub use manager::{RestoreSource, SettingsManager};
