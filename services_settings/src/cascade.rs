//! Object persistence cascade
//!
//! Walks a subtree in pre-order and gives every node its own block, keyed
//! by the node's storage tag. The persisted form is flat: a child's block
//! holds only the child's properties, never its descendants.
//!
//! The tree root's block additionally starts with the identity hash under
//! [`IDENTITY_KEY`]. Positional backends read values back in write order, so
//! restore must be told whether that hash is there ([`GuardCheck`]).

use crate::error::CascadeError;
use crate::identity::{GuardCheck, IDENTITY_KEY};
use core_types::{NodeId, ObjectNode, ObjectTree, PropertyType, PropertyValue, TagScheme};
use services_storage::{BlockMode, StorageBackend, StorageError};

/// Values read from one block, applied only once the whole block was read
type Staged = Vec<(String, PropertyValue)>;

/// Saves the subtree rooted at `from` into `backend`
///
/// `identity` is written into the tree root's block when the tree root is
/// part of the subtree. Returns the number of blocks written.
pub fn save_tree(
    tree: &ObjectTree,
    from: NodeId,
    backend: &mut dyn StorageBackend,
    scheme: TagScheme,
    identity: Option<u32>,
) -> Result<usize, CascadeError> {
    let order = tree.pre_order(from);
    if order.is_empty() {
        return Err(CascadeError::UnknownNode(from));
    }

    let total = order.len();
    let mut failed = 0;
    for id in order {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let tag = node.storage_tag(scheme);
        let guard = if id == tree.root() { identity } else { None };

        match save_node(node, &tag, backend, guard) {
            Ok(()) => {}
            Err(StorageError::TransactionConflict(msg)) => {
                log::error!("{}: save of {:?} aborted, block busy", backend.name(), tag);
                return Err(CascadeError::Block {
                    tag,
                    source: StorageError::TransactionConflict(msg),
                });
            }
            Err(err) => {
                log::warn!("{}: failed to save block {:?}: {}", backend.name(), tag, err);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        Err(CascadeError::Partial { failed, total })
    } else {
        log::debug!("{}: saved {} blocks", backend.name(), total);
        Ok(total)
    }
}

fn save_node(
    node: &ObjectNode,
    tag: &str,
    backend: &mut dyn StorageBackend,
    identity: Option<u32>,
) -> Result<(), StorageError> {
    let guard_size = identity.map_or(0, |_| PropertyValue::UInt32(0).size_in_bytes());
    let size = node.serialized_size() + guard_size;

    backend.begin_block(tag, BlockMode::Write, size)?;
    let written = write_values(node, backend, identity);
    let closed = backend.end_block();
    written?;
    closed
}

fn write_values(
    node: &ObjectNode,
    backend: &mut dyn StorageBackend,
    identity: Option<u32>,
) -> Result<(), StorageError> {
    if let Some(hash) = identity {
        backend.write_value(IDENTITY_KEY, &PropertyValue::UInt32(hash))?;
    }
    for property in node.properties() {
        backend.write_value(property.name(), property.value())?;
    }
    Ok(())
}

/// Restores the subtree rooted at `from` from `backend`
///
/// An enforced guard is checked against the tree root's block even when
/// `from` is below it. The first block read is the subtree root. Any failure
/// up to there (missing block, guard rejected) aborts before a single
/// property is touched. Child blocks that fail are skipped; siblings already
/// restored keep their new values. Returns the number of blocks restored.
pub fn restore_tree(
    tree: &mut ObjectTree,
    from: NodeId,
    backend: &mut dyn StorageBackend,
    scheme: TagScheme,
    guard: GuardCheck,
) -> Result<usize, CascadeError> {
    let order = tree.pre_order(from);
    if order.is_empty() {
        return Err(CascadeError::UnknownNode(from));
    }

    if from != tree.root() && matches!(guard, GuardCheck::Enforce(_)) {
        verify_root_guard(tree, backend, scheme, guard)?;
    }

    let total = order.len();
    let mut failed = 0;
    for (position, id) in order.into_iter().enumerate() {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let tag = node.storage_tag(scheme);
        let guard = if id == tree.root() {
            guard
        } else {
            GuardCheck::Absent
        };

        match read_node(node, &tag, backend, guard) {
            Ok(staged) => apply(tree, id, staged),
            Err(err) if position == 0 => {
                log::debug!("{}: root block {:?} rejected: {}", backend.name(), tag, err);
                return Err(err);
            }
            Err(err @ CascadeError::Block {
                source: StorageError::TransactionConflict(_),
                ..
            }) => return Err(err),
            Err(err) => {
                log::warn!("{}: failed to restore block {:?}: {}", backend.name(), tag, err);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        Err(CascadeError::Partial { failed, total })
    } else {
        log::debug!("{}: restored {} blocks", backend.name(), total);
        Ok(total)
    }
}

/// Opens the tree root's block only to check its identity hash
fn verify_root_guard(
    tree: &ObjectTree,
    backend: &mut dyn StorageBackend,
    scheme: TagScheme,
    guard: GuardCheck,
) -> Result<(), CascadeError> {
    let root = tree.root();
    let tag = tree
        .node(root)
        .map(|node| node.storage_tag(scheme))
        .ok_or(CascadeError::UnknownNode(root))?;
    open_block(&tag, backend)?;
    let checked = check_guard(&tag, backend, guard);
    let closed = backend.end_block().map_err(|source| CascadeError::Block {
        tag: tag.clone(),
        source,
    });
    checked?;
    closed
}

fn open_block(tag: &str, backend: &mut dyn StorageBackend) -> Result<(), CascadeError> {
    backend
        .begin_block(tag, BlockMode::Read, 0)
        .map_err(|err| match err {
            StorageError::BlockNotFound(_) => CascadeError::BlockNotFound(tag.to_string()),
            source => CascadeError::Block {
                tag: tag.to_string(),
                source,
            },
        })
}

fn read_node(
    node: &ObjectNode,
    tag: &str,
    backend: &mut dyn StorageBackend,
    guard: GuardCheck,
) -> Result<Staged, CascadeError> {
    open_block(tag, backend)?;
    let staged = read_values(node, tag, backend, guard);
    let closed = backend.end_block().map_err(|source| CascadeError::Block {
        tag: tag.to_string(),
        source,
    });
    let staged = staged?;
    closed?;
    Ok(staged)
}

fn read_values(
    node: &ObjectNode,
    tag: &str,
    backend: &mut dyn StorageBackend,
    guard: GuardCheck,
) -> Result<Staged, CascadeError> {
    check_guard(tag, backend, guard)?;

    let block_err = |source| CascadeError::Block {
        tag: tag.to_string(),
        source,
    };
    let mut staged = Vec::with_capacity(node.properties().len());
    for property in node.properties() {
        if let Some(value) = backend
            .read_value(property.name(), property.type_tag())
            .map_err(block_err)?
        {
            staged.push((property.name().to_string(), value));
        }
    }
    Ok(staged)
}

/// Reads the identity hash at the start of an open block, if `guard` asks
fn check_guard(
    tag: &str,
    backend: &mut dyn StorageBackend,
    guard: GuardCheck,
) -> Result<(), CascadeError> {
    let block_err = |source| CascadeError::Block {
        tag: tag.to_string(),
        source,
    };

    match guard {
        GuardCheck::Enforce(expected) => {
            if !backend.value_exists(IDENTITY_KEY) {
                return Err(CascadeError::IdentityMissing(tag.to_string()));
            }
            match backend
                .read_value(IDENTITY_KEY, PropertyType::UInt32)
                .map_err(block_err)?
            {
                Some(PropertyValue::UInt32(stored)) if stored == expected => {}
                Some(PropertyValue::UInt32(stored)) => {
                    return Err(CascadeError::IdentityMismatch {
                        tag: tag.to_string(),
                        stored,
                        expected,
                    })
                }
                _ => return Err(CascadeError::IdentityMissing(tag.to_string())),
            }
        }
        GuardCheck::Ignore => {
            if backend.value_exists(IDENTITY_KEY) {
                backend
                    .read_value(IDENTITY_KEY, PropertyType::UInt32)
                    .map_err(block_err)?;
            }
        }
        GuardCheck::Absent => {}
    }
    Ok(())
}

fn apply(tree: &mut ObjectTree, id: NodeId, staged: Staged) {
    for (name, value) in staged {
        if let Err(err) = tree.set(id, &name, value) {
            log::warn!("Restored value for {:?} not applied: {}", name, err);
        }
    }
}
