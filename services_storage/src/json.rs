//! JSON document backend
//!
//! Stores one JSON object per block tag with one field per value tag:
//!
//! ```json
//! {
//!   "bme280_sensor": { "interval": 60, "label": "outdoor" },
//!   "mqtt_publish": { "enabled": true }
//! }
//! ```
//!
//! Intended for files on removable media and for settings export/import.
//! A read-only document rejects every write, which makes importing a file
//! safe: it can never be modified by the restore path.

use crate::backend::{BackendKind, BlockMode, StorageBackend};
use crate::error::{StorageError, StorageResult};
use core_types::{PropertyType, PropertyValue};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Tag-keyed backend over a JSON document, optionally backed by a file
pub struct JsonBackend {
    document: Map<String, Value>,
    path: Option<PathBuf>,
    read_only: bool,
    kind: BackendKind,
    open: Option<(String, BlockMode)>,
    name: String,
}

fn to_json(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Bool(v) => Value::from(*v),
        PropertyValue::Int8(v) => Value::from(*v),
        PropertyValue::Int16(v) => Value::from(*v),
        PropertyValue::Int32(v) => Value::from(*v),
        PropertyValue::UInt8(v) => Value::from(*v),
        PropertyValue::UInt16(v) => Value::from(*v),
        PropertyValue::UInt32(v) => Value::from(*v),
        // Non-finite floats have no JSON form and become null
        PropertyValue::Float(v) => Value::from(f64::from(*v)),
        PropertyValue::Double(v) => Value::from(*v),
        PropertyValue::Str(v) => Value::from(v.as_str()),
    }
}

fn from_json(value: &Value, ty: PropertyType) -> Option<PropertyValue> {
    let int = || value.as_i64();
    Some(match ty {
        PropertyType::Bool => PropertyValue::Bool(value.as_bool()?),
        PropertyType::Int8 => PropertyValue::Int8(i8::try_from(int()?).ok()?),
        PropertyType::Int16 => PropertyValue::Int16(i16::try_from(int()?).ok()?),
        PropertyType::Int32 => PropertyValue::Int32(i32::try_from(int()?).ok()?),
        PropertyType::UInt8 => PropertyValue::UInt8(u8::try_from(int()?).ok()?),
        PropertyType::UInt16 => PropertyValue::UInt16(u16::try_from(int()?).ok()?),
        PropertyType::UInt32 => PropertyValue::UInt32(u32::try_from(int()?).ok()?),
        PropertyType::Float => PropertyValue::Float(value.as_f64()? as f32),
        PropertyType::Double => PropertyValue::Double(value.as_f64()?),
        PropertyType::Str => PropertyValue::Str(value.as_str()?.to_string()),
    })
}

impl JsonBackend {
    /// Empty, writable, in-memory document
    pub fn new() -> Self {
        Self {
            document: Map::new(),
            path: None,
            read_only: false,
            kind: BackendKind::External,
            open: None,
            name: "json".to_string(),
        }
    }

    /// Parses an in-memory document
    pub fn from_json_str(json: &str) -> StorageResult<Self> {
        let document = match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(Self {
            document,
            ..Self::new()
        })
    }

    /// Opens a writable document backed by `path`
    ///
    /// A missing file starts an empty document; it is created on first save.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let mut backend = if path.exists() {
            Self::from_json_str(&fs::read_to_string(path)?)?
        } else {
            Self::new()
        };
        backend.path = Some(path.to_path_buf());
        Ok(backend)
    }

    /// Opens an existing file for import; every write is rejected
    pub fn open_read_only(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let mut backend = Self::from_json_str(&fs::read_to_string(path)?)?;
        backend.path = Some(path.to_path_buf());
        backend.read_only = true;
        Ok(backend)
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Overrides the trust classification (default: external)
    pub fn with_kind(mut self, kind: BackendKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Pretty-printed document
    pub fn to_json_string(&self) -> StorageResult<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }

    fn flush(&self) -> StorageResult<()> {
        if let Some(path) = &self.path {
            fs::write(path, self.to_json_string()?)?;
            log::debug!("{}: wrote {}", self.name, path.display());
        }
        Ok(())
    }

    fn open_block(&self) -> StorageResult<(&str, BlockMode)> {
        self.open
            .as_ref()
            .map(|(tag, mode)| (tag.as_str(), *mode))
            .ok_or(StorageError::NoTransaction)
    }

    fn open_object(&self) -> Option<&Map<String, Value>> {
        let (tag, _) = self.open.as_ref()?;
        self.document.get(tag)?.as_object()
    }
}

impl Default for JsonBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for JsonBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn begin_block(&mut self, tag: &str, mode: BlockMode, _size: usize) -> StorageResult<()> {
        if let Some((open, _)) = &self.open {
            log::error!("{}: begin_block({:?}) while {:?} is open", self.name, tag, open);
            return Err(StorageError::TransactionConflict(open.clone()));
        }
        if tag.is_empty() {
            return Err(StorageError::InvalidTag(tag.to_string()));
        }
        match mode {
            BlockMode::Write => {
                if self.read_only {
                    return Err(StorageError::ReadOnly);
                }
                let entry = self
                    .document
                    .entry(tag.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
            }
            BlockMode::Read => {
                if !self.document.get(tag).is_some_and(Value::is_object) {
                    return Err(StorageError::BlockNotFound(tag.to_string()));
                }
            }
        }
        self.open = Some((tag.to_string(), mode));
        Ok(())
    }

    fn end_block(&mut self) -> StorageResult<()> {
        let (_, mode) = self.open.take().ok_or(StorageError::NoTransaction)?;
        if mode == BlockMode::Write {
            self.flush()?;
        }
        Ok(())
    }

    fn write_value(&mut self, tag: &str, value: &PropertyValue) -> StorageResult<()> {
        let (block, mode) = self.open_block()?;
        if mode == BlockMode::Read || self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let block = block.to_string();
        if let Some(Value::Object(object)) = self.document.get_mut(&block) {
            object.insert(tag.to_string(), to_json(value));
        }
        Ok(())
    }

    fn read_value(&mut self, tag: &str, ty: PropertyType) -> StorageResult<Option<PropertyValue>> {
        self.open_block()?;
        match self.open_object().and_then(|object| object.get(tag)) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => from_json(value, ty).map(Some).ok_or_else(|| {
                StorageError::TypeMismatch {
                    tag: tag.to_string(),
                    expected: ty,
                }
            }),
        }
    }

    fn value_exists(&mut self, tag: &str) -> bool {
        self.open_object()
            .is_some_and(|object| object.get(tag).is_some_and(|v| !v.is_null()))
    }

    fn reset(&mut self) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        if let Some((open, _)) = &self.open {
            return Err(StorageError::TransactionConflict(open.clone()));
        }
        log::info!("{}: clearing document", self.name);
        self.document.clear();
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_block(backend: &mut JsonBackend, tag: &str, values: &[(&str, PropertyValue)]) {
        backend.begin_block(tag, BlockMode::Write, 0).unwrap();
        for (name, value) in values {
            backend.write_value(name, value).unwrap();
        }
        backend.end_block().unwrap();
    }

    #[test]
    fn test_document_layout() {
        let mut json = JsonBackend::new();
        write_block(
            &mut json,
            "bme280_sensor",
            &[
                ("interval", PropertyValue::UInt16(60)),
                ("label", PropertyValue::Str("outdoor".to_string())),
            ],
        );

        let expected = serde_json::json!({
            "bme280_sensor": { "interval": 60, "label": "outdoor" }
        });
        assert_eq!(Value::Object(json.document().clone()), expected);
    }

    #[test]
    fn test_read_values_and_defaults() {
        let mut json = JsonBackend::from_json_str(
            r#"{ "mqtt_publish": { "enabled": true, "qos": 1, "topic": null } }"#,
        )
        .unwrap();

        json.begin_block("mqtt_publish", BlockMode::Read, 0).unwrap();
        assert_eq!(
            json.read_value("enabled", PropertyType::Bool).unwrap(),
            Some(PropertyValue::Bool(true))
        );
        assert_eq!(
            json.read_value("qos", PropertyType::UInt8).unwrap(),
            Some(PropertyValue::UInt8(1))
        );
        assert_eq!(json.read_value("topic", PropertyType::Str).unwrap(), None);
        assert_eq!(json.read_value("absent", PropertyType::Str).unwrap(), None);
        assert!(json.value_exists("qos"));
        assert!(!json.value_exists("topic"));
        json.end_block().unwrap();
    }

    #[test]
    fn test_out_of_range_is_type_mismatch() {
        let mut json =
            JsonBackend::from_json_str(r#"{ "some_block": { "level": 300, "name": 5 } }"#).unwrap();
        json.begin_block("some_block", BlockMode::Read, 0).unwrap();
        assert!(matches!(
            json.read_value("level", PropertyType::UInt8),
            Err(StorageError::TypeMismatch { .. })
        ));
        assert!(matches!(
            json.read_value("name", PropertyType::Str),
            Err(StorageError::TypeMismatch { .. })
        ));
        json.end_block().unwrap();
    }

    #[test]
    fn test_missing_block() {
        let mut json = JsonBackend::new();
        assert!(matches!(
            json.begin_block("nothing_here", BlockMode::Read, 0),
            Err(StorageError::BlockNotFound(_))
        ));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let mut json = JsonBackend::from_json_str(r#"{ "block_one": { "a": 1 } }"#)
            .unwrap()
            .read_only();

        assert!(matches!(
            json.begin_block("block_one", BlockMode::Write, 0),
            Err(StorageError::ReadOnly)
        ));
        json.begin_block("block_one", BlockMode::Read, 0).unwrap();
        assert!(matches!(
            json.write_value("a", &PropertyValue::Int32(2)),
            Err(StorageError::ReadOnly)
        ));
        json.end_block().unwrap();
        assert!(matches!(json.reset(), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut json = JsonBackend::open(&path).unwrap();
        assert!(!path.exists());
        write_block(&mut json, "sht31_sensor", &[("offset", PropertyValue::Double(0.25))]);
        assert!(path.exists());

        let mut reopened = JsonBackend::open_read_only(&path).unwrap();
        reopened.begin_block("sht31_sensor", BlockMode::Read, 0).unwrap();
        assert_eq!(
            reopened.read_value("offset", PropertyType::Double).unwrap(),
            Some(PropertyValue::Double(0.25))
        );
        reopened.end_block().unwrap();
    }

    #[test]
    fn test_open_read_only_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            JsonBackend::open_read_only(dir.path().join("absent.json")),
            Err(StorageError::Io(_))
        ));
    }

    #[test]
    fn test_reset_clears_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut json = JsonBackend::open(&path).unwrap();
        write_block(&mut json, "block_one", &[("a", PropertyValue::Bool(false))]);

        json.reset().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "{}");
        assert_eq!(json.kind(), BackendKind::External);
    }
}
