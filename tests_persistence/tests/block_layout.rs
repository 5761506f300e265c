//! Block Layout Tests
//!
//! Validates the on-medium image a settings save produces: cookie, one
//! block per object in pre-order, identity hash leading the root block.

use core_types::{PropertyValue, TagScheme};
use hal::RamEeprom;
use services_settings::{identity_hash, save_tree};
use services_storage::{block_id, BlockHeader, EepromBackend, MAGIC_COOKIE};
use tests_persistence::{init_logging, SensorHub, EEPROM_SIZE};

fn save(hub: &SensorHub, backend: &mut EepromBackend<RamEeprom>) {
    save_tree(
        &hub.tree,
        hub.hub,
        backend,
        TagScheme::Current,
        Some(identity_hash("sensorhub")),
    )
    .expect("Failed to save");
}

/// Test: Image starts with the cookie and the root block
#[test]
fn test_image_layout() {
    init_logging();
    let mut hub = SensorHub::new();
    hub.customise();
    let mut backend = EepromBackend::new(RamEeprom::new(EEPROM_SIZE));
    save(&hub, &mut backend);

    let image = backend.store().medium().contents().to_vec();
    assert_eq!(u16::from_le_bytes([image[0], image[1]]), MAGIC_COOKIE);

    let root_size = hub.tree.node(hub.hub).expect("Root missing").serialized_size() + 4;
    let root = BlockHeader::from_bytes(&image[2..8].try_into().expect("Header slice"));
    assert_eq!(root.id, block_id("sensor_hub"));
    assert_eq!(root.size as usize, root_size);
    assert_eq!(root.next as usize, 2 + BlockHeader::SIZE + root_size);
    assert_eq!(&image[8..12], &identity_hash("sensorhub").to_le_bytes());
    // Then the first property: length-prefixed hub name
    assert_eq!(image[12] as usize, "greenhouse".len());
    assert_eq!(&image[13..23], b"greenhouse");
}

/// Test: Objects get blocks in pre-order
#[test]
fn test_blocks_in_pre_order() {
    init_logging();
    let hub = SensorHub::new();
    let mut backend = EepromBackend::new(RamEeprom::new(EEPROM_SIZE));
    save(&hub, &mut backend);

    let ids: Vec<u16> = backend
        .store_mut()
        .block_headers()
        .expect("Failed to list blocks")
        .into_iter()
        .map(|(_, header)| header.id)
        .collect();
    let expected: Vec<u16> = ["sensor_hub", "temp_sensor", "humidity_sensor", "oled_display"]
        .iter()
        .map(|tag| block_id(tag))
        .collect();
    assert_eq!(ids, expected);
}

/// Test: Shorter values reuse the block without shrinking it
#[test]
fn test_shorter_value_reuses_block() {
    init_logging();
    let mut hub = SensorHub::new();
    hub.customise();
    let mut backend = EepromBackend::new(RamEeprom::new(EEPROM_SIZE));
    save(&hub, &mut backend);
    let used = backend.store_mut().used_bytes().expect("Failed to measure");
    let headers = backend.store_mut().block_headers().expect("Failed to list");

    hub.tree
        .set(hub.display, "greeting", PropertyValue::Str("hi".into()))
        .expect("Failed to set greeting");
    save(&hub, &mut backend);

    assert_eq!(backend.store_mut().used_bytes().expect("Failed to measure"), used);
    assert_eq!(
        backend.store_mut().block_headers().expect("Failed to list"),
        headers
    );
}

/// Test: A grown block moves to the end and the rest compacts left
#[test]
fn test_grown_block_moves_to_end() {
    init_logging();
    let mut hub = SensorHub::new();
    let mut backend = EepromBackend::new(RamEeprom::new(EEPROM_SIZE));
    save(&hub, &mut backend);
    let used = backend.store_mut().used_bytes().expect("Failed to measure");

    hub.tree
        .set(hub.hub, "hub_name", PropertyValue::Str("sensorhub-upstairs".into()))
        .expect("Failed to set name");
    save(&hub, &mut backend);

    let headers = backend.store_mut().block_headers().expect("Failed to list");
    assert_eq!(headers[0].0, 2);
    assert_eq!(headers[0].1.id, block_id("temp_sensor"));
    assert_eq!(
        headers.last().expect("No blocks").1.id,
        block_id("sensor_hub")
    );
    assert_eq!(
        backend.store_mut().used_bytes().expect("Failed to measure"),
        used + "-upstairs".len()
    );
}
