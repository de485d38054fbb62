// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node keys and cell type discriminants.
//!
//! Every node of a [`Complex`](crate::Complex) is identified by a [`NodeKey`]
//! created by `slotmap::SlotMap`. Keys are generational: once a node is
//! destroyed, its key never compares equal to the key of a node created
//! later, so stale keys are detected instead of silently aliasing.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key for any node (group or cell) of a complex.
    pub struct NodeKey;

    /// Key for a registered diff listener.
    pub struct ListenerKey;
}

/// Time at which a key cell exists.
pub type AnimTime = f64;

/// Spatial dimension of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellSpatialType {
    Vertex = 0,
    Edge = 1,
    Face = 2,
}

/// Whether a cell exists at a single time or spans a time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellTemporalType {
    Key,
    Inbetween,
}

/// Discriminant for cell types.
///
/// Variants are declared by increasing spatial dimension, so the derived
/// ordering sorts vertices before edges before faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellType {
    KeyVertex,
    InbetweenVertex,
    KeyEdge,
    InbetweenEdge,
    KeyFace,
    InbetweenFace,
}

impl CellType {
    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::KeyVertex => "KeyVertex",
            CellType::InbetweenVertex => "InbetweenVertex",
            CellType::KeyEdge => "KeyEdge",
            CellType::InbetweenEdge => "InbetweenEdge",
            CellType::KeyFace => "KeyFace",
            CellType::InbetweenFace => "InbetweenFace",
        }
    }

    pub fn spatial_type(&self) -> CellSpatialType {
        match self {
            CellType::KeyVertex | CellType::InbetweenVertex => CellSpatialType::Vertex,
            CellType::KeyEdge | CellType::InbetweenEdge => CellSpatialType::Edge,
            CellType::KeyFace | CellType::InbetweenFace => CellSpatialType::Face,
        }
    }

    pub fn temporal_type(&self) -> CellTemporalType {
        match self {
            CellType::KeyVertex | CellType::KeyEdge | CellType::KeyFace => CellTemporalType::Key,
            CellType::InbetweenVertex | CellType::InbetweenEdge | CellType::InbetweenFace => {
                CellTemporalType::Inbetween
            }
        }
    }

    /// Returns the spatial dimension (0, 1 or 2).
    pub fn dimension(&self) -> usize {
        self.spatial_type() as usize
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a node was inserted relative to an existing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeInsertionType {
    BeforeSibling,
    AfterSibling,
    FirstChild,
    LastChild,
}

impl NodeInsertionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeInsertionType::BeforeSibling => "BeforeSibling",
            NodeInsertionType::AfterSibling => "AfterSibling",
            NodeInsertionType::FirstChild => "FirstChild",
            NodeInsertionType::LastChild => "LastChild",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_type_names() {
        assert_eq!(CellType::KeyVertex.as_str(), "KeyVertex");
        assert_eq!(CellType::KeyEdge.to_string(), "KeyEdge");
        assert_eq!(CellType::InbetweenFace.as_str(), "InbetweenFace");
    }

    #[test]
    fn cell_type_ordering_follows_dimension() {
        let mut types = vec![
            CellType::KeyFace,
            CellType::InbetweenEdge,
            CellType::KeyVertex,
            CellType::KeyEdge,
            CellType::InbetweenVertex,
            CellType::InbetweenFace,
        ];
        types.sort();
        let dims: Vec<usize> = types.iter().map(|t| t.dimension()).collect();
        assert_eq!(dims, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn temporal_types() {
        assert_eq!(CellType::KeyEdge.temporal_type(), CellTemporalType::Key);
        assert_eq!(
            CellType::InbetweenVertex.temporal_type(),
            CellTemporalType::Inbetween
        );
    }
}
