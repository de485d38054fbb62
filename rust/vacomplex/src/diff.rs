// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change-sets emitted once per outermost operations scope.

use serde::{Serialize, Serializer};

use crate::keys::{NodeInsertionType, NodeKey};

/// Bitset describing how a node was modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeModificationFlags(u8);

impl NodeModificationFlags {
    pub const NONE: Self = Self(0);
    pub const GEOMETRY_CHANGED: Self = Self(1 << 0);
    pub const BOUNDARY_CHANGED: Self = Self(1 << 1);
    pub const BOUNDARY_GEOMETRY_CHANGED: Self = Self(1 << 2);
    pub const STAR_CHANGED: Self = Self(1 << 3);
    pub const CHILDREN_CHANGED: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns whether all flags of `other` are set.
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether any flag of `other` is set.
    pub fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Names of the set flags, for logging.
    pub fn names(&self) -> Vec<&'static str> {
        const NAMES: [(NodeModificationFlags, &str); 5] = [
            (NodeModificationFlags::GEOMETRY_CHANGED, "GeometryChanged"),
            (NodeModificationFlags::BOUNDARY_CHANGED, "BoundaryChanged"),
            (NodeModificationFlags::BOUNDARY_GEOMETRY_CHANGED, "BoundaryGeometryChanged"),
            (NodeModificationFlags::STAR_CHANGED, "StarChanged"),
            (NodeModificationFlags::CHILDREN_CHANGED, "ChildrenChanged"),
        ];
        NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl std::ops::BitOr for NodeModificationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for NodeModificationFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Serialize for NodeModificationFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

/// A node created during the scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedNodeInfo {
    pub node: NodeKey,
}

/// A node inserted (created or moved) during the scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertedNodeInfo {
    pub node: NodeKey,
    /// Parent before the first insertion of the scope (`None` for new nodes).
    pub old_parent: Option<NodeKey>,
    /// Kind of the last insertion of the scope.
    pub insertion_type: NodeInsertionType,
}

/// A node modified during the scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedNodeInfo {
    pub node: NodeKey,
    pub flags: NodeModificationFlags,
    pub modified_properties: Vec<String>,
}

/// Everything that changed in a complex during one outermost operations
/// scope.
///
/// A node created and destroyed within the same scope does not appear at
/// all. A destroyed node appears only in [`Self::destroyed_nodes`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplexDiff {
    created_nodes: Vec<CreatedNodeInfo>,
    destroyed_nodes: Vec<NodeKey>,
    inserted_nodes: Vec<InsertedNodeInfo>,
    modified_nodes: Vec<ModifiedNodeInfo>,
}

impl ComplexDiff {
    pub fn created_nodes(&self) -> &[CreatedNodeInfo] {
        &self.created_nodes
    }

    pub fn destroyed_nodes(&self) -> &[NodeKey] {
        &self.destroyed_nodes
    }

    pub fn inserted_nodes(&self) -> &[InsertedNodeInfo] {
        &self.inserted_nodes
    }

    pub fn modified_nodes(&self) -> &[ModifiedNodeInfo] {
        &self.modified_nodes
    }

    pub fn is_empty(&self) -> bool {
        self.created_nodes.is_empty()
            && self.destroyed_nodes.is_empty()
            && self.inserted_nodes.is_empty()
            && self.modified_nodes.is_empty()
    }

    pub fn is_created(&self, node: NodeKey) -> bool {
        self.created_nodes.iter().any(|c| c.node == node)
    }

    pub fn is_destroyed(&self, node: NodeKey) -> bool {
        self.destroyed_nodes.contains(&node)
    }

    /// Modification flags recorded for `node`, if any.
    pub fn modification_flags(&self, node: NodeKey) -> NodeModificationFlags {
        self.modified_nodes
            .iter()
            .find(|m| m.node == node)
            .map(|m| m.flags)
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.created_nodes.clear();
        self.destroyed_nodes.clear();
        self.inserted_nodes.clear();
        self.modified_nodes.clear();
    }

    pub(crate) fn on_node_created(&mut self, node: NodeKey) {
        self.created_nodes.push(CreatedNodeInfo { node });
    }

    pub(crate) fn on_node_destroyed(&mut self, node: NodeKey) {
        self.inserted_nodes.retain(|i| i.node != node);
        self.modified_nodes.retain(|m| m.node != node);
        let len = self.created_nodes.len();
        self.created_nodes.retain(|c| c.node != node);
        if self.created_nodes.len() == len {
            self.destroyed_nodes.push(node);
        }
    }

    pub(crate) fn on_node_inserted(
        &mut self,
        node: NodeKey,
        old_parent: Option<NodeKey>,
        insertion_type: NodeInsertionType,
    ) {
        match self.inserted_nodes.iter_mut().find(|i| i.node == node) {
            Some(info) => info.insertion_type = insertion_type,
            None => self.inserted_nodes.push(InsertedNodeInfo {
                node,
                old_parent,
                insertion_type,
            }),
        }
    }

    pub(crate) fn on_node_modified(&mut self, node: NodeKey, flags: NodeModificationFlags) {
        match self.modified_nodes.iter_mut().find(|m| m.node == node) {
            Some(info) => info.flags |= flags,
            None => self.modified_nodes.push(ModifiedNodeInfo {
                node,
                flags,
                modified_properties: Vec::new(),
            }),
        }
    }

    pub(crate) fn on_node_property_modified(&mut self, node: NodeKey, name: &str) {
        let info = match self.modified_nodes.iter().position(|m| m.node == node) {
            Some(i) => &mut self.modified_nodes[i],
            None => {
                self.modified_nodes.push(ModifiedNodeInfo {
                    node,
                    flags: NodeModificationFlags::NONE,
                    modified_properties: Vec::new(),
                });
                let last = self.modified_nodes.len() - 1;
                &mut self.modified_nodes[last]
            }
        };
        if !info.modified_properties.iter().any(|p| p == name) {
            info.modified_properties.push(name.to_string());
        }
    }
}
