// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for complex operations.
//!
//! Only contract violations are reported through [`Error`]. Requests that are
//! well-formed but topologically infeasible (e.g. uncutting a vertex used
//! three times) are reported through result structs with `success = false`.

use crate::keys::{CellType, NodeKey};

/// Result type alias for complex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when calling the checked operations API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced node does not exist in the complex (never created, or
    /// already destroyed).
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeKey),

    /// The node exists but is a group, where a cell was required.
    #[error("node is not a cell: {0:?}")]
    NotACell(NodeKey),

    /// The node exists but is a cell, where a group was required.
    #[error("node is not a group: {0:?}")]
    NotAGroup(NodeKey),

    /// The cell exists but has the wrong type.
    #[error("wrong cell type for {key:?}: expected {expected}, found {found}")]
    WrongCellType {
        key: NodeKey,
        expected: CellType,
        found: CellType,
    },

    /// `next_sibling` is not a child of the given parent group.
    #[error("node {child:?} is not a child of group {parent:?}")]
    NotAChild { child: NodeKey, parent: NodeKey },

    /// The complex has no root group (between `clear()` and `reset_root()`).
    #[error("complex has no root group")]
    NullRoot,

    /// A cycle given to a face is not a valid closed walk.
    #[error("invalid key cycle")]
    InvalidCycle,

    /// A face vertex usage index does not refer to an existing corner.
    #[error("invalid face vertex usage index: cycle {cycle}, component {component}")]
    InvalidUsageIndex { cycle: usize, component: usize },

    /// Moving a group into itself or one of its descendants.
    #[error("cannot move {node:?} into its own descendant {parent:?}")]
    CyclicParent { node: NodeKey, parent: NodeKey },

    /// The given nodes do not all share the same parent group.
    #[error("nodes do not share the same parent group")]
    MixedGroups,

    /// Any other misuse of the API.
    #[error("logic error: {0}")]
    Logic(String),

    /// Settings (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
