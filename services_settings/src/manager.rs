//! Settings manager
//!
//! Owns the primary and optional fallback backends and decides which one a
//! restore trusts. The order is fixed: primary under current tags, primary
//! under legacy tags (then migrated), fallback (then healed back into the
//! primary).

use crate::cascade::{restore_tree, save_tree};
use crate::config::SettingsConfig;
use crate::error::{CascadeError, SettingsError};
use crate::identity::{identity_hash, GuardCheck};
use core_types::{NodeId, ObjectTree, TagScheme};
use services_storage::StorageBackend;

/// Where a successful restore got its data from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    /// Primary backend, current tags
    Primary,
    /// Primary backend, legacy tags; since migrated to current tags
    Legacy,
    /// Fallback backend; primary healed from it
    Fallback,
}

/// Persists an object tree to a primary backend with optional fallback
pub struct SettingsManager {
    primary: Option<Box<dyn StorageBackend>>,
    fallback: Option<Box<dyn StorageBackend>>,
    config: SettingsConfig,
    identity_hash: u32,
}

impl SettingsManager {
    /// Creates a manager with no backends attached
    pub fn new(config: SettingsConfig) -> Self {
        let identity_hash = identity_hash(&config.identity);
        Self {
            primary: None,
            fallback: None,
            config,
            identity_hash,
        }
    }

    pub fn config(&self) -> &SettingsConfig {
        &self.config
    }

    pub fn identity_hash(&self) -> u32 {
        self.identity_hash
    }

    pub fn set_identity(&mut self, identity: impl Into<String>) {
        self.config.identity = identity.into();
        self.identity_hash = identity_hash(&self.config.identity);
    }

    pub fn set_storage(&mut self, primary: Box<dyn StorageBackend>) {
        log::info!("Primary storage: {} ({})", primary.name(), primary.kind());
        self.primary = Some(primary);
    }

    pub fn set_fallback(&mut self, fallback: Box<dyn StorageBackend>) {
        log::info!("Fallback storage: {} ({})", fallback.name(), fallback.kind());
        self.fallback = Some(fallback);
    }

    pub fn take_primary(&mut self) -> Option<Box<dyn StorageBackend>> {
        self.primary.take()
    }

    pub fn take_fallback(&mut self) -> Option<Box<dyn StorageBackend>> {
        self.fallback.take()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn set_fallback_save(&mut self, enabled: bool) {
        self.config.fallback_save = enabled;
    }

    pub fn set_fallback_restore(&mut self, enabled: bool) {
        self.config.fallback_restore = enabled;
    }

    pub fn set_save_on_event(&mut self, enabled: bool) {
        self.config.save_on_event = enabled;
    }

    pub fn set_restore_on_event(&mut self, enabled: bool) {
        self.config.restore_on_event = enabled;
    }

    fn resolve_root(tree: &ObjectTree, root: Option<NodeId>) -> Result<NodeId, SettingsError> {
        let root = root.unwrap_or_else(|| tree.root());
        if tree.contains(root) {
            Ok(root)
        } else {
            Err(SettingsError::UnknownNode(root))
        }
    }

    /// Saves the subtree at `root` (whole tree when `None`) to the primary
    ///
    /// With `fallback_save` on, the fallback receives a copy too. Only the
    /// primary's outcome is reported.
    pub fn save(&mut self, tree: &ObjectTree, root: Option<NodeId>) -> Result<(), SettingsError> {
        let root = Self::resolve_root(tree, root)?;
        let hash = self.identity_hash;
        let primary = self.primary.as_mut().ok_or(SettingsError::NoStorage)?;

        let result = save_tree(tree, root, &mut **primary, TagScheme::Current, Some(hash))
            .map(|blocks| log::info!("Saved {} blocks to {}", blocks, primary.name()))
            .map_err(|source| SettingsError::Save {
                backend: primary.name().to_string(),
                source,
            });

        if self.config.fallback_save {
            if let Some(fallback) = self.fallback.as_mut() {
                if let Err(err) =
                    save_tree(tree, root, &mut **fallback, TagScheme::Current, Some(hash))
                {
                    log::warn!("Fallback save to {} failed: {}", fallback.name(), err);
                }
            }
        }

        result
    }

    /// Restores the subtree at `root` (whole tree when `None`)
    ///
    /// When nothing usable is found the tree keeps the values it had. Once a
    /// backend's root block is accepted, child blocks that fail to restore
    /// keep their current values and the backend still counts as the source.
    pub fn restore(
        &mut self,
        tree: &mut ObjectTree,
        root: Option<NodeId>,
    ) -> Result<RestoreSource, SettingsError> {
        let root = Self::resolve_root(tree, root)?;
        let hash = self.identity_hash;
        let Self {
            primary,
            fallback,
            config,
            ..
        } = self;
        let primary = primary.as_mut().ok_or(SettingsError::NoStorage)?;
        let guard = GuardCheck::for_kind(primary.kind(), hash);

        match settle(
            restore_tree(tree, root, &mut **primary, TagScheme::Current, guard),
            primary.name(),
        ) {
            Ok(blocks) => {
                log::info!("Restored {} blocks from {}", blocks, primary.name());
                return Ok(RestoreSource::Primary);
            }
            Err(err) if err.is_absent() => {
                log::info!("{}: {}; trying legacy tags", primary.name(), err);
                match settle(
                    restore_tree(tree, root, &mut **primary, TagScheme::Legacy, guard),
                    primary.name(),
                ) {
                    Ok(blocks) => {
                        log::info!("Restored {} legacy blocks from {}", blocks, primary.name());
                        if let Err(err) =
                            save_tree(tree, root, &mut **primary, TagScheme::Current, Some(hash))
                        {
                            log::warn!("Migration to current tags failed: {}", err);
                        }
                        return Ok(RestoreSource::Legacy);
                    }
                    Err(err) => log::info!("{}: no legacy data: {}", primary.name(), err),
                }
            }
            Err(err) => log::warn!("{}: restore failed: {}", primary.name(), err),
        }

        if config.fallback_restore {
            if let Some(fallback) = fallback.as_mut() {
                let guard = GuardCheck::for_kind(fallback.kind(), hash);
                match settle(
                    restore_tree(tree, root, &mut **fallback, TagScheme::Current, guard),
                    fallback.name(),
                ) {
                    Ok(blocks) => {
                        log::info!("Restored {} blocks from fallback {}", blocks, fallback.name());
                        match save_tree(tree, root, &mut **primary, TagScheme::Current, Some(hash)) {
                            Ok(_) => log::info!("Healed {} from {}", primary.name(), fallback.name()),
                            Err(err) => log::warn!("Healing {} failed: {}", primary.name(), err),
                        }
                        return Ok(RestoreSource::Fallback);
                    }
                    Err(err) => log::warn!("Fallback {}: restore failed: {}", fallback.name(), err),
                }
            }
        }

        log::warn!("No usable settings data; keeping defaults");
        Err(SettingsError::NoUsableData)
    }

    /// Erases both backends (factory reset)
    ///
    /// Both are attempted; the first failure is returned.
    pub fn reset(&mut self) -> Result<(), SettingsError> {
        let mut first_error = None;
        for backend in [self.primary.as_mut(), self.fallback.as_mut()]
            .into_iter()
            .flatten()
        {
            match backend.reset() {
                Ok(()) => log::info!("Reset {}", backend.name()),
                Err(source) => {
                    log::error!("Reset of {} failed: {}", backend.name(), source);
                    if first_error.is_none() {
                        first_error = Some(SettingsError::Reset {
                            backend: backend.name().to_string(),
                            source,
                        });
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new(SettingsConfig::default())
    }
}

/// Turns a partial restore into success
///
/// A partial result means the root block was accepted and applied, so the
/// tree already carries this backend's data.
fn settle(result: Result<usize, CascadeError>, backend: &str) -> Result<usize, CascadeError> {
    match result {
        Err(CascadeError::Partial { failed, total }) => {
            log::warn!(
                "{}: {} of {} blocks not restored, keeping their values",
                backend,
                failed,
                total
            );
            Ok(total - failed)
        }
        other => other,
    }
}
