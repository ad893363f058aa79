//! Parent-before-child ordering and structural checks over a node forest.
//!
//! The forest is treated as an arena indexed by uuid: nodes are never linked
//! by reference, children are bucketed by parent uuid, and traversal uses an
//! explicit stack so arbitrarily deep hierarchies cannot overflow.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use shelf_types::{Node, NodeUuid, SyncNode};

/// Anything that sits in the hierarchy by uuid and optional parent uuid.
pub trait Hierarchical {
    fn node_uuid(&self) -> &NodeUuid;
    fn parent_uuid(&self) -> Option<&NodeUuid>;
}

impl Hierarchical for Node {
    fn node_uuid(&self) -> &NodeUuid {
        &self.uuid
    }

    fn parent_uuid(&self) -> Option<&NodeUuid> {
        self.parent.as_ref()
    }
}

impl Hierarchical for SyncNode {
    fn node_uuid(&self) -> &NodeUuid {
        &self.uuid
    }

    fn parent_uuid(&self) -> Option<&NodeUuid> {
        self.parent.as_ref()
    }
}

/// Order nodes so every parent precedes all of its descendants.
///
/// Roots come first (in input order), then each root's subtree depth-first,
/// siblings in input order. Nodes whose parent is not in the input, and
/// nodes caught in a parent cycle, cannot be placed under a root; they are
/// appended at the end rather than dropped.
pub fn tree_sort<'a, T, I>(nodes: I) -> Vec<&'a T>
where
    T: Hierarchical + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let items: Vec<&T> = nodes.into_iter().collect();
    let index: HashMap<&NodeUuid, usize> = items
        .iter()
        .enumerate()
        .map(|(i, n)| (n.node_uuid(), i))
        .collect();

    let mut children: HashMap<&NodeUuid, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    let mut detached = Vec::new();

    for (i, node) in items.iter().enumerate() {
        match node.parent_uuid() {
            None => roots.push(i),
            Some(parent) if index.contains_key(parent) => {
                children.entry(parent).or_default().push(i)
            }
            Some(_) => detached.push(i),
        }
    }

    let mut emitted = vec![false; items.len()];
    let mut order = Vec::with_capacity(items.len());

    for &root in &roots {
        emitted[root] = true;
        order.push(root);
    }

    let emit_subtree = |start: usize, emitted: &mut Vec<bool>, order: &mut Vec<usize>| {
        let mut stack: Vec<usize> = Vec::new();
        if let Some(kids) = children.get(items[start].node_uuid()) {
            stack.extend(kids.iter().rev());
        }
        while let Some(i) = stack.pop() {
            if emitted[i] {
                continue;
            }
            emitted[i] = true;
            order.push(i);
            if let Some(kids) = children.get(items[i].node_uuid()) {
                stack.extend(kids.iter().rev());
            }
        }
    };

    for &root in &roots {
        emit_subtree(root, &mut emitted, &mut order);
    }

    if !detached.is_empty() {
        warn!(count = detached.len(), "nodes reference missing parents; placing them last");
    }
    for &i in &detached {
        if !emitted[i] {
            emitted[i] = true;
            order.push(i);
            emit_subtree(i, &mut emitted, &mut order);
        }
    }

    let unreachable: Vec<usize> = (0..items.len()).filter(|&i| !emitted[i]).collect();
    if !unreachable.is_empty() {
        warn!(count = unreachable.len(), "nodes form a parent cycle; placing them last");
        order.extend(unreachable);
    }

    order.into_iter().map(|i| items[i]).collect()
}

/// A node whose `parent` does not resolve to any node in the forest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingParent {
    pub node: NodeUuid,
    pub parent: NodeUuid,
}

/// Report every node whose parent reference dangles.
///
/// This is an audit, not a repair: the caller decides what to do with the
/// affected nodes.
pub fn dangling_parents<'a, T, I>(nodes: I) -> Vec<DanglingParent>
where
    T: Hierarchical + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let items: Vec<&T> = nodes.into_iter().collect();
    let known: HashSet<&NodeUuid> = items.iter().map(|n| n.node_uuid()).collect();
    items
        .iter()
        .filter_map(|n| {
            let parent = n.parent_uuid()?;
            (!known.contains(parent)).then(|| DanglingParent {
                node: n.node_uuid().clone(),
                parent: parent.clone(),
            })
        })
        .collect()
}
