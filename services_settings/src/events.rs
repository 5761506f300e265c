//! Event hooks
//!
//! Lets an application bus trigger save, restore and factory reset without
//! knowing about backends. Save and restore honour their enable flags;
//! factory reset always runs.

use crate::error::SettingsError;
use crate::manager::{RestoreSource, SettingsManager};
use core_types::ObjectTree;

/// Request delivered to [`SettingsManager::handle_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsEvent {
    SaveRequested,
    RestoreRequested,
    FactoryResetRequested,
}

/// What a handled event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Saved,
    Restored(RestoreSource),
    Reset,
}

impl SettingsManager {
    /// Runs the operation matching `event` on the whole tree
    ///
    /// Returns `None` when the event is disabled by configuration.
    pub fn handle_event(
        &mut self,
        event: SettingsEvent,
        tree: &mut ObjectTree,
    ) -> Option<Result<EventOutcome, SettingsError>> {
        match event {
            SettingsEvent::SaveRequested if self.config().save_on_event => {
                Some(self.save(tree, None).map(|()| EventOutcome::Saved))
            }
            SettingsEvent::RestoreRequested if self.config().restore_on_event => {
                Some(self.restore(tree, None).map(EventOutcome::Restored))
            }
            SettingsEvent::FactoryResetRequested => {
                Some(self.reset().map(|()| EventOutcome::Reset))
            }
            _ => {
                log::debug!("Ignoring {:?}", event);
                None
            }
        }
    }
}
