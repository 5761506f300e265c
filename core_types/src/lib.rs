//! # Core Types
//!
//! This crate defines the object model the persistence engine works on.
//!
//! ## Philosophy
//!
//! - **Closed value set**: A property is one of a fixed set of typed variants,
//!   each with exactly one binary encoding.
//! - **Explicit tree**: The live object graph is an arena, not a web of
//!   pointers. Parents know their children by index.
//! - **Stable identity**: Storage keys come from per-class identifiers so
//!   renaming an object does not orphan its settings.
//!
//! ## Key Types
//!
//! - [`PropertyValue`]: A typed property value
//! - [`Property`]: A named, registered field of an object
//! - [`ObjectNode`]: A persistable object (container, device, action)
//! - [`ObjectTree`]: The arena holding the object graph

pub mod property;
pub mod tree;

pub use property::{DecodeError, PropertyType, PropertyValue, MAX_STRING_LEN};
pub use tree::{NodeId, NodeKind, ObjectNode, ObjectTree, Property, TagScheme, TreeError};
