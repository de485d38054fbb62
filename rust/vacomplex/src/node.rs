// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nodes of a complex: groups and cells.
//!
//! A [`Node`] stores its tree links (parent and siblings) as keys into the
//! complex arena, and a [`NodeKind`] payload. Cells carry their boundary and
//! star, and a [`CellKind`] payload with the data specific to each of the six
//! cell types. Matching on [`CellKind`] is exhaustive, so adding a cell type
//! is a compile error at every dispatch site.
//!
//! Nodes are only mutated by [`Operations`](crate::Operations); the public
//! API here is read-only.

use nalgebra::Point2;

use crate::cycle::KeyCycle;
use crate::data::{KeyEdgeData, KeyFaceData};
use crate::keys::{AnimTime, CellType, NodeKey};

/// A node of the complex tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeKey>,
    pub(crate) previous_sibling: Option<NodeKey>,
    pub(crate) next_sibling: Option<NodeKey>,
    pub(crate) kind: NodeKind,
}

/// Group or cell payload of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Group(Group),
    Cell(Cell),
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            previous_sibling: None,
            next_sibling: None,
            kind,
        }
    }

    /// Parent group. `None` only for the root group (and for nodes being
    /// created or destroyed).
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn previous_sibling(&self) -> Option<NodeKey> {
        self.previous_sibling
    }

    pub fn next_sibling(&self) -> Option<NodeKey> {
        self.next_sibling
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    pub fn is_cell(&self) -> bool {
        matches!(self.kind, NodeKind::Cell(_))
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            NodeKind::Group(g) => Some(g),
            NodeKind::Cell(_) => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.kind {
            NodeKind::Group(g) => Some(g),
            NodeKind::Cell(_) => None,
        }
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match &self.kind {
            NodeKind::Cell(c) => Some(c),
            NodeKind::Group(_) => None,
        }
    }

    pub(crate) fn as_cell_mut(&mut self) -> Option<&mut Cell> {
        match &mut self.kind {
            NodeKind::Cell(c) => Some(c),
            NodeKind::Group(_) => None,
        }
    }
}

/// An ordered container of nodes. The first child is the bottom-most one.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub(crate) first_child: Option<NodeKey>,
    pub(crate) last_child: Option<NodeKey>,
    pub(crate) num_children: usize,
}

impl Group {
    pub fn first_child(&self) -> Option<NodeKey> {
        self.first_child
    }

    pub fn last_child(&self) -> Option<NodeKey> {
        self.last_child
    }

    pub fn num_children(&self) -> usize {
        self.num_children
    }
}

/// A cell: boundary, star and type-specific payload.
#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) boundary: Vec<NodeKey>,
    pub(crate) star: Vec<NodeKey>,
    pub(crate) kind: CellKind,
}

/// Type-specific payload of a cell.
#[derive(Debug, Clone)]
pub enum CellKind {
    KeyVertex(KeyVertex),
    KeyEdge(KeyEdge),
    KeyFace(KeyFace),
    InbetweenVertex(InbetweenVertex),
    InbetweenEdge(InbetweenEdge),
    InbetweenFace(InbetweenFace),
}

impl Cell {
    pub(crate) fn new(kind: CellKind) -> Self {
        Self {
            boundary: Vec::new(),
            star: Vec::new(),
            kind,
        }
    }

    /// Cells this cell depends on.
    pub fn boundary(&self) -> &[NodeKey] {
        &self.boundary
    }

    /// Cells depending on this cell.
    pub fn star(&self) -> &[NodeKey] {
        &self.star
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    pub fn cell_type(&self) -> CellType {
        match &self.kind {
            CellKind::KeyVertex(_) => CellType::KeyVertex,
            CellKind::KeyEdge(_) => CellType::KeyEdge,
            CellKind::KeyFace(_) => CellType::KeyFace,
            CellKind::InbetweenVertex(_) => CellType::InbetweenVertex,
            CellKind::InbetweenEdge(_) => CellType::InbetweenEdge,
            CellKind::InbetweenFace(_) => CellType::InbetweenFace,
        }
    }

    /// Returns whether the cell exists at time `t`.
    pub fn exists_at(&self, t: AnimTime) -> bool {
        match &self.kind {
            CellKind::KeyVertex(kv) => kv.time == t,
            CellKind::KeyEdge(ke) => ke.time == t,
            CellKind::KeyFace(kf) => kf.time == t,
            CellKind::InbetweenVertex(iv) => iv.time_span.contains(t),
            CellKind::InbetweenEdge(ie) => ie.time_span.contains(t),
            CellKind::InbetweenFace(face) => face.time_span.contains(t),
        }
    }

    pub fn as_key_vertex(&self) -> Option<&KeyVertex> {
        match &self.kind {
            CellKind::KeyVertex(kv) => Some(kv),
            _ => None,
        }
    }

    pub fn as_key_edge(&self) -> Option<&KeyEdge> {
        match &self.kind {
            CellKind::KeyEdge(ke) => Some(ke),
            _ => None,
        }
    }

    pub fn as_key_face(&self) -> Option<&KeyFace> {
        match &self.kind {
            CellKind::KeyFace(kf) => Some(kf),
            _ => None,
        }
    }

    pub fn as_inbetween_vertex(&self) -> Option<&InbetweenVertex> {
        match &self.kind {
            CellKind::InbetweenVertex(iv) => Some(iv),
            _ => None,
        }
    }

    pub(crate) fn as_key_vertex_mut(&mut self) -> Option<&mut KeyVertex> {
        match &mut self.kind {
            CellKind::KeyVertex(kv) => Some(kv),
            _ => None,
        }
    }

    pub(crate) fn as_key_edge_mut(&mut self) -> Option<&mut KeyEdge> {
        match &mut self.kind {
            CellKind::KeyEdge(ke) => Some(ke),
            _ => None,
        }
    }

    pub(crate) fn as_key_face_mut(&mut self) -> Option<&mut KeyFace> {
        match &mut self.kind {
            CellKind::KeyFace(kf) => Some(kf),
            _ => None,
        }
    }
}

/// Open time interval `(start, end)` during which an inbetween cell exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub start: AnimTime,
    pub end: AnimTime,
}

impl TimeSpan {
    pub fn new(start: AnimTime, end: AnimTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: AnimTime) -> bool {
        self.start < t && t < self.end
    }
}

/// A vertex at a single time.
#[derive(Debug, Clone)]
pub struct KeyVertex {
    pub(crate) time: AnimTime,
    pub(crate) position: Point2<f64>,
}

impl KeyVertex {
    pub fn time(&self) -> AnimTime {
        self.time
    }

    pub fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// An edge at a single time, either open (two end vertices, possibly equal)
/// or closed (no end vertices).
#[derive(Debug, Clone)]
pub struct KeyEdge {
    pub(crate) time: AnimTime,
    pub(crate) start_vertex: Option<NodeKey>,
    pub(crate) end_vertex: Option<NodeKey>,
    pub(crate) data: KeyEdgeData,
}

impl KeyEdge {
    pub fn time(&self) -> AnimTime {
        self.time
    }

    pub fn start_vertex(&self) -> Option<NodeKey> {
        self.start_vertex
    }

    pub fn end_vertex(&self) -> Option<NodeKey> {
        self.end_vertex
    }

    pub fn is_closed(&self) -> bool {
        self.start_vertex.is_none()
    }

    pub fn is_start_vertex(&self, kv: NodeKey) -> bool {
        self.start_vertex == Some(kv)
    }

    pub fn is_end_vertex(&self, kv: NodeKey) -> bool {
        self.end_vertex == Some(kv)
    }

    pub fn data(&self) -> &KeyEdgeData {
        &self.data
    }
}

/// A face at a single time, bounded by zero or more cycles.
#[derive(Debug, Clone)]
pub struct KeyFace {
    pub(crate) time: AnimTime,
    pub(crate) cycles: Vec<KeyCycle>,
    pub(crate) data: KeyFaceData,
}

impl KeyFace {
    pub fn time(&self) -> AnimTime {
        self.time
    }

    pub fn cycles(&self) -> &[KeyCycle] {
        &self.cycles
    }

    pub fn data(&self) -> &KeyFaceData {
        &self.data
    }
}

/// A vertex interpolated between two key vertices.
#[derive(Debug, Clone)]
pub struct InbetweenVertex {
    pub(crate) key_vertex_before: NodeKey,
    pub(crate) key_vertex_after: NodeKey,
    pub(crate) time_span: TimeSpan,
}

impl InbetweenVertex {
    pub fn key_vertex_before(&self) -> NodeKey {
        self.key_vertex_before
    }

    pub fn key_vertex_after(&self) -> NodeKey {
        self.key_vertex_after
    }

    pub fn time_span(&self) -> TimeSpan {
        self.time_span
    }
}

/// An edge interpolated between key cells. Geometry is not interpolated.
#[derive(Debug, Clone)]
pub struct InbetweenEdge {
    pub(crate) time_span: TimeSpan,
}

impl InbetweenEdge {
    pub fn time_span(&self) -> TimeSpan {
        self.time_span
    }
}

/// A face interpolated between key cells. Geometry is not interpolated.
#[derive(Debug, Clone)]
pub struct InbetweenFace {
    pub(crate) time_span: TimeSpan,
}

impl InbetweenFace {
    pub fn time_span(&self) -> TimeSpan {
        self.time_span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_cells_exist_at_their_time() {
        let cell = Cell::new(CellKind::KeyVertex(KeyVertex {
            time: 2.0,
            position: Point2::new(1.0, 1.0),
        }));
        assert!(cell.exists_at(2.0));
        assert!(!cell.exists_at(2.5));
        assert_eq!(cell.cell_type(), CellType::KeyVertex);
        assert!(cell.as_key_edge().is_none());
    }

    #[test]
    fn inbetween_cells_exist_strictly_inside_span() {
        let cell = Cell::new(CellKind::InbetweenEdge(InbetweenEdge {
            time_span: TimeSpan::new(0.0, 1.0),
        }));
        assert!(cell.exists_at(0.5));
        assert!(!cell.exists_at(0.0));
        assert!(!cell.exists_at(1.0));
    }

    #[test]
    fn closed_edge_has_no_vertices() {
        let edge = KeyEdge {
            time: 0.0,
            start_vertex: None,
            end_vertex: None,
            data: KeyEdgeData::default(),
        };
        assert!(edge.is_closed());
    }

    #[test]
    fn node_discriminators() {
        let group = Node::new(NodeKind::Group(Group::default()));
        assert!(group.is_group());
        assert!(!group.is_cell());
        assert!(group.as_cell().is_none());
        assert_eq!(group.as_group().map(|g| g.num_children()), Some(0));
    }
}
