//! Persistence Test Utilities
//!
//! Shared fixtures for the end-to-end persistence tests.
//!
//! ## Test Philosophy
//!
//! - **Power cycles are explicit**: backends are taken out of one manager
//!   and handed to a fresh one, the way a reboot hands the same EEPROM to new
//!   firmware state
//! - **Defaults are the baseline**: every test compares against a freshly
//!   built tree
//! - **Faults are deterministic**: media failures come from `FailingMedium`
//!   policies, never from timing

use core_types::{NodeId, NodeKind, ObjectNode, ObjectTree, Property, PropertyValue};
use hal::RamEeprom;
use services_settings::{SettingsConfig, SettingsManager};
use services_storage::EepromBackend;

/// EEPROM size used by most tests
pub const EEPROM_SIZE: usize = 512;

/// Sample device tree: a hub with three child objects
pub struct SensorHub {
    pub tree: ObjectTree,
    pub hub: NodeId,
    pub temperature: NodeId,
    pub humidity: NodeId,
    pub display: NodeId,
}

impl SensorHub {
    /// Builds the tree with factory defaults
    pub fn new() -> Self {
        let root = ObjectNode::new(NodeKind::Container, "Hub", "sensor_hub")
            .with_description("Main")
            .with_property(Property::new("hub_name", PropertyValue::Str("sensorhub".into())))
            .with_property(Property::new("report_interval", PropertyValue::UInt16(60)))
            .with_property(Property::hidden("boot_count", PropertyValue::UInt32(0)));
        let mut tree = ObjectTree::new(root);
        let hub = tree.root();

        let temperature = ObjectNode::new(NodeKind::Device, "Temperature", "temp_sensor")
            .with_description("Sensor")
            .with_property(Property::new("enabled", PropertyValue::Bool(true)))
            .with_property(Property::new("offset", PropertyValue::Float(0.0)))
            .with_property(Property::new("alarm_high", PropertyValue::Int16(40)));
        let humidity = ObjectNode::new(NodeKind::Device, "Humidity", "humidity_sensor")
            .with_description("Sensor")
            .with_property(Property::new("enabled", PropertyValue::Bool(false)))
            .with_property(Property::new("smoothing", PropertyValue::Double(0.5)));
        let display = ObjectNode::new(NodeKind::Device, "Display", "oled_display")
            .with_description("Panel")
            .with_property(Property::new("contrast", PropertyValue::UInt8(128)))
            .with_property(Property::new("flip", PropertyValue::Bool(false)))
            .with_property(Property::new("greeting", PropertyValue::Str("hello".into())));

        let temperature = add(&mut tree, hub, temperature);
        let humidity = add(&mut tree, hub, humidity);
        let display = add(&mut tree, hub, display);

        Self {
            tree,
            hub,
            temperature,
            humidity,
            display,
        }
    }

    /// Applies a user configuration that differs from every default
    pub fn customise(&mut self) {
        let changes = [
            (self.hub, "hub_name", PropertyValue::Str("greenhouse".into())),
            (self.hub, "report_interval", PropertyValue::UInt16(15)),
            (self.hub, "boot_count", PropertyValue::UInt32(7)),
            (self.temperature, "enabled", PropertyValue::Bool(false)),
            (self.temperature, "offset", PropertyValue::Float(-0.75)),
            (self.temperature, "alarm_high", PropertyValue::Int16(-5)),
            (self.humidity, "enabled", PropertyValue::Bool(true)),
            (self.humidity, "smoothing", PropertyValue::Double(0.125)),
            (self.display, "contrast", PropertyValue::UInt8(255)),
            (self.display, "flip", PropertyValue::Bool(true)),
            (self.display, "greeting", PropertyValue::Str("grüezi".into())),
        ];
        for (id, name, value) in changes {
            if let Err(err) = self.tree.set(id, name, value) {
                panic!("fixture property {} rejected: {}", name, err);
            }
        }
    }

    /// Every value in the tree, in pre-order
    pub fn snapshot(&self) -> Vec<(NodeId, String, PropertyValue)> {
        self.tree.values(self.hub)
    }
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new()
    }
}

fn add(tree: &mut ObjectTree, parent: NodeId, node: ObjectNode) -> NodeId {
    match tree.add_child(parent, node) {
        Ok(id) => id,
        Err(err) => panic!("fixture tree rejected node: {}", err),
    }
}

/// A blank EEPROM backend
pub fn blank_eeprom() -> EepromBackend<RamEeprom> {
    EepromBackend::new(RamEeprom::new(EEPROM_SIZE))
}

/// A manager with the default config and a blank EEPROM as primary
pub fn eeprom_manager() -> SettingsManager {
    let mut manager = SettingsManager::new(SettingsConfig::default());
    manager.set_storage(Box::new(blank_eeprom()));
    manager
}

/// Moves both backends into a fresh manager with the same config
pub fn power_cycle(mut manager: SettingsManager) -> SettingsManager {
    let mut rebooted = SettingsManager::new(manager.config().clone());
    if let Some(primary) = manager.take_primary() {
        rebooted.set_storage(primary);
    }
    if let Some(fallback) = manager.take_fallback() {
        rebooted.set_fallback(fallback);
    }
    rebooted
}

/// Routes `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}
