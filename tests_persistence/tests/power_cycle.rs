//! Power Cycle Tests
//!
//! Validates that settings saved before a reboot come back unchanged after
//! it, on every internal backend.

use hal::{RamEeprom, RamNvs};
use services_settings::{RestoreSource, SettingsConfig, SettingsManager};
use services_storage::{EepromBackend, PreferencesBackend};
use tests_persistence::{blank_eeprom, eeprom_manager, init_logging, power_cycle, SensorHub};

/// Test: Customised tree survives a reboot on EEPROM
#[test]
fn test_eeprom_round_trip() {
    init_logging();
    let mut hub = SensorHub::new();
    hub.customise();

    let mut manager = eeprom_manager();
    manager.save(&hub.tree, None).expect("Failed to save");

    let mut manager = power_cycle(manager);
    let mut rebooted = SensorHub::new();
    assert_ne!(rebooted.snapshot(), hub.snapshot());

    let source = manager
        .restore(&mut rebooted.tree, None)
        .expect("Failed to restore");
    assert_eq!(source, RestoreSource::Primary);
    assert_eq!(rebooted.snapshot(), hub.snapshot());
}

/// Test: Restoring into the same tree twice gives the same values
#[test]
fn test_restore_twice_is_idempotent() {
    init_logging();
    let mut hub = SensorHub::new();
    hub.customise();

    let mut manager = eeprom_manager();
    manager.save(&hub.tree, None).expect("Failed to save");

    let mut manager = power_cycle(manager);
    let mut rebooted = SensorHub::new();
    for _ in 0..2 {
        let source = manager
            .restore(&mut rebooted.tree, None)
            .expect("Failed to restore");
        assert_eq!(source, RestoreSource::Primary);
        assert_eq!(rebooted.snapshot(), hub.snapshot());
    }
}

/// Test: Customised tree survives a reboot on a key/value partition
#[test]
fn test_preferences_round_trip() {
    init_logging();
    let mut hub = SensorHub::new();
    hub.customise();

    let mut manager = SettingsManager::default();
    manager.set_storage(Box::new(PreferencesBackend::new(RamNvs::new())));
    manager.save(&hub.tree, None).expect("Failed to save");

    let mut manager = power_cycle(manager);
    let mut rebooted = SensorHub::new();
    manager
        .restore(&mut rebooted.tree, None)
        .expect("Failed to restore");
    assert_eq!(rebooted.snapshot(), hub.snapshot());
}

/// Test: Saving twice without changes leaves the medium byte-identical
#[test]
fn test_save_is_idempotent() {
    init_logging();
    let mut hub = SensorHub::new();
    hub.customise();

    let mut backend = blank_eeprom();
    for _ in 0..2 {
        services_settings::save_tree(
            &hub.tree,
            hub.hub,
            &mut backend,
            core_types::TagScheme::Current,
            Some(services_settings::identity_hash("sensorhub")),
        )
        .expect("Failed to save");
    }
    let once = backend.into_medium();

    let mut backend = EepromBackend::new(RamEeprom::from_image(once.contents().to_vec()));
    services_settings::save_tree(
        &hub.tree,
        hub.hub,
        &mut backend,
        core_types::TagScheme::Current,
        Some(services_settings::identity_hash("sensorhub")),
    )
    .expect("Failed to save");
    assert_eq!(backend.into_medium().contents(), once.contents());
}

/// Test: Restore followed by save does not change the stored image
#[test]
fn test_restore_then_save_is_stable() {
    init_logging();
    let mut hub = SensorHub::new();
    hub.customise();

    let mut manager = eeprom_manager();
    manager.save(&hub.tree, None).expect("Failed to save");

    for _ in 0..3 {
        manager = power_cycle(manager);
        let mut rebooted = SensorHub::new();
        manager
            .restore(&mut rebooted.tree, None)
            .expect("Failed to restore");
        manager.save(&rebooted.tree, None).expect("Failed to save");
        assert_eq!(rebooted.snapshot(), hub.snapshot());
    }
}

/// Test: A longer string grows its block without disturbing the others
#[test]
fn test_growing_string_relocates_block() {
    init_logging();
    let mut hub = SensorHub::new();
    hub.customise();

    let mut manager = eeprom_manager();
    manager.save(&hub.tree, None).expect("Failed to save");

    hub.tree
        .set(
            hub.display,
            "greeting",
            core_types::PropertyValue::Str("a much longer greeting than before".into()),
        )
        .expect("Failed to set greeting");
    manager.save(&hub.tree, None).expect("Failed to save grown block");

    let mut manager = power_cycle(manager);
    let mut rebooted = SensorHub::new();
    manager
        .restore(&mut rebooted.tree, None)
        .expect("Failed to restore");
    assert_eq!(rebooted.snapshot(), hub.snapshot());
}

/// Test: Nothing saved yet means defaults stay in place
#[test]
fn test_first_boot_keeps_defaults() {
    init_logging();
    let mut manager = eeprom_manager();
    let mut hub = SensorHub::new();
    let defaults = hub.snapshot();

    assert!(manager.restore(&mut hub.tree, None).is_err());
    assert_eq!(hub.snapshot(), defaults);
}

/// Test: Configured identity travels with the manager across reboots
#[test]
fn test_custom_identity_round_trip() {
    init_logging();
    let mut hub = SensorHub::new();
    hub.customise();

    let mut manager = SettingsManager::new(SettingsConfig::with_identity("greenhouse-v3"));
    manager.set_storage(Box::new(blank_eeprom()));
    manager.save(&hub.tree, None).expect("Failed to save");

    let mut manager = power_cycle(manager);
    assert_eq!(manager.config().identity, "greenhouse-v3");
    let mut rebooted = SensorHub::new();
    manager
        .restore(&mut rebooted.tree, None)
        .expect("Failed to restore");
    assert_eq!(rebooted.snapshot(), hub.snapshot());
}
