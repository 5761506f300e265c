//! Live object tree
//!
//! The tree of persistable objects (root container, sub-containers, devices,
//! actions) is stored as an arena: nodes live in one `Vec` and refer to
//! their children by [`NodeId`]. Traversal uses an explicit stack so deep
//! hierarchies do not grow the call stack.

use crate::property::{PropertyType, PropertyValue};
use std::fmt;

/// Index of a node inside an [`ObjectTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// What a node represents in the sensor framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Groups other nodes (the root, device lists, action lists)
    Container,
    /// A sensor or actuator
    Device,
    /// Something that runs on a schedule (publishing, logging, ...)
    Action,
}

/// Which string tag identifies a node's storage block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagScheme {
    /// Stable per-class identifier, survives renames
    Current,
    /// Display name followed by description, used by older firmware
    Legacy,
}

/// Tree errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// No node with this id
    UnknownNode(NodeId),
    /// Node has no property with this name
    UnknownProperty(String),
    /// A property with this name is already registered on the node
    DuplicateProperty(String),
    /// Value type differs from the registered property type
    TypeMismatch {
        expected: PropertyType,
        found: PropertyType,
    },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::UnknownNode(id) => write!(f, "unknown node {}", id),
            TreeError::UnknownProperty(name) => write!(f, "unknown property {}", name),
            TreeError::DuplicateProperty(name) => write!(f, "duplicate property {}", name),
            TreeError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// A registered, persistable field of a node
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    name: String,
    value: PropertyValue,
    hidden: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
            hidden: false,
        }
    }

    /// A property the menu does not show. It is still persisted.
    pub fn hidden(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            hidden: true,
            ..Self::new(name, value)
        }
    }

    /// Name, also used as the storage tag of the value
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn type_tag(&self) -> PropertyType {
        self.value.type_tag()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn size_in_bytes(&self) -> usize {
        self.value.size_in_bytes()
    }

    /// Replaces the value, keeping the registered type
    pub fn set(&mut self, value: PropertyValue) -> Result<(), TreeError> {
        if value.type_tag() != self.type_tag() {
            return Err(TreeError::TypeMismatch {
                expected: self.type_tag(),
                found: value.type_tag(),
            });
        }
        self.value = value;
        Ok(())
    }
}

/// A persistable object
#[derive(Debug, Clone)]
pub struct ObjectNode {
    kind: NodeKind,
    name: String,
    description: String,
    class_id: String,
    properties: Vec<Property>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl ObjectNode {
    /// Creates a node with a display name and a stable class identifier
    pub fn new(kind: NodeKind, name: impl Into<String>, class_id: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: String::new(),
            class_id: class_id.into(),
            properties: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder form of [`register`](Self::register)
    ///
    /// Duplicate names are ignored so static node definitions stay infallible.
    pub fn with_property(mut self, property: Property) -> Self {
        let _ = self.register(property);
        self
    }

    /// Registers a property; registration order is the serialization order
    pub fn register(&mut self, property: Property) -> Result<(), TreeError> {
        if self.property(property.name()).is_some() {
            return Err(TreeError::DuplicateProperty(property.name().to_string()));
        }
        self.properties.push(property);
        Ok(())
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the node. The current storage tag does not change.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    /// Storage tag under the current scheme
    pub fn identity_tag(&self) -> &str {
        &self.class_id
    }

    /// Storage tag under the legacy scheme
    pub fn legacy_tag(&self) -> String {
        format!("{}{}", self.name, self.description)
    }

    pub fn storage_tag(&self, scheme: TagScheme) -> String {
        match scheme {
            TagScheme::Current => self.identity_tag().to_string(),
            TagScheme::Legacy => self.legacy_tag(),
        }
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name() == name)
    }

    /// Sum of the encoded sizes of all properties
    pub fn serialized_size(&self) -> usize {
        self.properties.iter().map(Property::size_in_bytes).sum()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// Arena holding the whole object graph
#[derive(Debug, Clone)]
pub struct ObjectTree {
    nodes: Vec<ObjectNode>,
}

impl ObjectTree {
    /// Creates a tree holding only `root`
    pub fn new(root: ObjectNode) -> Self {
        let mut root = root;
        root.parent = None;
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Appends `node` as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, node: ObjectNode) -> Result<NodeId, TreeError> {
        if !self.contains(parent) {
            return Err(TreeError::UnknownNode(parent));
        }
        let id = NodeId(self.nodes.len());
        let mut node = node;
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&ObjectNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ObjectNode> {
        self.nodes.get_mut(id.0)
    }

    /// First node whose class identifier matches
    pub fn find_by_class(&self, class_id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.class_id == class_id)
            .map(NodeId)
    }

    pub fn get(&self, id: NodeId, name: &str) -> Option<&PropertyValue> {
        self.node(id)?.property(name).map(Property::value)
    }

    pub fn set(&mut self, id: NodeId, name: &str, value: PropertyValue) -> Result<(), TreeError> {
        let node = self.node_mut(id).ok_or(TreeError::UnknownNode(id))?;
        let property = node
            .property_mut(name)
            .ok_or_else(|| TreeError::UnknownProperty(name.to_string()))?;
        property.set(value)
    }

    /// Pre-order listing of the subtree rooted at `from`
    ///
    /// Children are visited in insertion order. Unknown ids yield an empty list.
    pub fn pre_order(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.contains(from) {
            return order;
        }
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            order.push(id);
            // Reverse so the first child is popped first
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    /// Snapshot of every property value in the subtree, in pre-order
    pub fn values(&self, from: NodeId) -> Vec<(NodeId, String, PropertyValue)> {
        self.pre_order(from)
            .into_iter()
            .flat_map(|id| {
                self.nodes[id.0]
                    .properties
                    .iter()
                    .map(move |p| (id, p.name().to_string(), p.value().clone()))
            })
            .collect()
    }
}
