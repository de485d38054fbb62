// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traversal helpers: descendants, closure/opening, vertex rings, usage
//! counts and z-order lookups.

use rustc_hash::FxHashSet;

use crate::complex::Complex;
use crate::cycle::{KeyFaceVertexUsageIndex, KeyHalfedge};
use crate::geometry::Rect2;
use crate::keys::NodeKey;
use crate::node::CellKind;

/// An outgoing halfedge around a vertex, with the angle of its tangent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingHalfedge {
    pub halfedge: KeyHalfedge,
    pub angle: f64,
}

impl Complex {
    /// All descendants of a node, in depth-first order, excluding the node.
    pub fn descendants(&self, node: NodeKey) -> Vec<NodeKey> {
        let mut result = Vec::new();
        if self.find_group(node).is_some() {
            self.collect_descendants_(node, &mut result);
        }
        result
    }

    /// The given cells and everything in their boundary, recursively.
    pub fn closure(&self, cells: &FxHashSet<NodeKey>) -> FxHashSet<NodeKey> {
        let mut result = cells.clone();
        let mut stack: Vec<NodeKey> = cells.iter().copied().collect();
        while let Some(key) = stack.pop() {
            if let Some(cell) = self.find_cell(key) {
                for b in &cell.boundary {
                    if result.insert(*b) {
                        stack.push(*b);
                    }
                }
            }
        }
        result
    }

    /// The given cells and everything in their star, recursively.
    pub fn opening(&self, cells: &FxHashSet<NodeKey>) -> FxHashSet<NodeKey> {
        let mut result = cells.clone();
        let mut stack: Vec<NodeKey> = cells.iter().copied().collect();
        while let Some(key) = stack.pop() {
            if let Some(cell) = self.find_cell(key) {
                for s in &cell.star {
                    if result.insert(*s) {
                        stack.push(*s);
                    }
                }
            }
        }
        result
    }

    /// Outgoing halfedges of the open key edges incident to `kv`, sorted by
    /// increasing tangent angle. A loop edge appears twice.
    pub fn ring_halfedges(&self, kv: NodeKey) -> Vec<RingHalfedge> {
        let mut ring = Vec::new();
        let Some(cell) = self.find_cell(kv) else {
            return ring;
        };
        for &key in &cell.star {
            let Some(ke) = self.key_edge(key) else { continue };
            let stroke = ke.data().stroke();
            if ke.is_start_vertex(kv) {
                ring.push(RingHalfedge {
                    halfedge: KeyHalfedge::new(key, true),
                    angle: stroke.start_angle(),
                });
            }
            if ke.is_end_vertex(kv) {
                ring.push(RingHalfedge {
                    halfedge: KeyHalfedge::new(key, false),
                    angle: stroke.end_opposite_angle(),
                });
            }
        }
        ring.sort_by(|a, b| a.angle.total_cmp(&b.angle));
        ring
    }

    /// Number of times `kv` is used: as an end of an edge not bounding any
    /// face, as a Steiner vertex, or as a face corner.
    pub fn count_vertex_uses(&self, kv: NodeKey) -> usize {
        let Some(cell) = self.find_cell(kv) else {
            return 0;
        };
        let mut count = 0;
        for &key in &cell.star {
            let Some(star_cell) = self.find_cell(key) else { continue };
            match &star_cell.kind {
                CellKind::KeyEdge(ke) => {
                    let has_face = star_cell.star.iter().any(|s| self.key_face(*s).is_some());
                    if !has_face {
                        count += usize::from(ke.is_start_vertex(kv));
                        count += usize::from(ke.is_end_vertex(kv));
                    }
                }
                CellKind::KeyFace(kf) => {
                    for cycle in &kf.cycles {
                        if cycle.steiner_vertex() == Some(kv) {
                            count += 1;
                        }
                        count += cycle
                            .halfedges()
                            .iter()
                            .filter(|h| h.start_vertex(self) == Some(kv))
                            .count();
                    }
                }
                CellKind::KeyVertex(_)
                | CellKind::InbetweenVertex(_)
                | CellKind::InbetweenEdge(_)
                | CellKind::InbetweenFace(_) => {}
            }
        }
        count
    }

    /// Number of halfedges referencing `ke` in the cycles of its star faces.
    pub fn count_edge_uses(&self, ke: NodeKey) -> usize {
        let Some(cell) = self.find_cell(ke) else {
            return 0;
        };
        cell.star
            .iter()
            .filter_map(|s| self.key_face(*s))
            .flat_map(|kf| kf.cycles.iter())
            .map(|c| c.halfedges().iter().filter(|h| h.edge == ke).count())
            .sum()
    }

    /// Vertex at a usage index of a face.
    pub fn key_face_vertex(&self, kf: NodeKey, index: KeyFaceVertexUsageIndex) -> Option<NodeKey> {
        let cycle = self.key_face(kf)?.cycles.get(index.cycle_index)?;
        if let Some(kv) = cycle.steiner_vertex() {
            return (index.component_index == 0).then_some(kv);
        }
        cycle.halfedges().get(index.component_index)?.start_vertex(self)
    }

    /// Returns the top-most node of `nodes` among the children of the parent
    /// of the first node. Nodes with another parent are ignored.
    pub fn find_top_most(&self, nodes: &[NodeKey]) -> Option<NodeKey> {
        let parent = self.parent(*nodes.first()?)?;
        let set: FxHashSet<NodeKey> = nodes.iter().copied().collect();
        let mut current = self.find_group(parent)?.last_child;
        while let Some(k) = current {
            if set.contains(&k) {
                return Some(k);
            }
            current = self.find(k)?.previous_sibling;
        }
        None
    }

    /// Returns the bottom-most node of `nodes` among the children of the
    /// parent of the first node.
    pub fn find_bottom_most(&self, nodes: &[NodeKey]) -> Option<NodeKey> {
        let parent = self.parent(*nodes.first()?)?;
        let set: FxHashSet<NodeKey> = nodes.iter().copied().collect();
        self.children(parent).find(|k| set.contains(k))
    }

    /// Bounding box of a cell. Groups have the union of their children.
    pub fn bounding_box(&self, key: NodeKey) -> Rect2 {
        let Some(node) = self.find(key) else {
            return Rect2::empty();
        };
        let Some(cell) = node.as_cell() else {
            let mut rect = Rect2::empty();
            for child in self.children(key) {
                rect.extend(&self.bounding_box(child));
            }
            return rect;
        };
        match &cell.kind {
            CellKind::KeyVertex(kv) => Rect2::from_point(kv.position),
            CellKind::KeyEdge(ke) => ke.data().stroke().bounding_box(),
            CellKind::KeyFace(kf) => {
                let mut rect = Rect2::empty();
                for cycle in &kf.cycles {
                    rect.extend(&cycle.bounding_box(self));
                }
                rect
            }
            CellKind::InbetweenVertex(_) | CellKind::InbetweenEdge(_) | CellKind::InbetweenFace(_) => {
                let mut rect = Rect2::empty();
                for b in &cell.boundary {
                    rect.extend(&self.bounding_box(*b));
                }
                rect
            }
        }
    }
}
