// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The operations engine: the only way to mutate a [`Complex`].
//!
//! An [`Operations`] value is a scope guard borrowing the complex mutably.
//! Scopes nest (see [`Operations::nested`]); when the outermost scope is
//! dropped, the engine:
//!
//! 1. recomputes the geometry of every cell whose boundary geometry changed,
//!    vertices first, then edges, then faces;
//! 2. finalizes the concatenated data of created edges and faces;
//! 3. emits the accumulated [`ComplexDiff`](crate::ComplexDiff) to listeners;
//! 4. clears the diff and the temporary working sets.
//!
//! The methods of [`Operations`] do not validate their arguments beyond what
//! is needed to stay memory- and invariant-safe: a missing node makes them
//! return `None` (or do nothing). Use [`crate::ops`] for the checked API.

mod cut;
mod delete;
mod glue;
mod intersect;
mod order;
mod uncut;

pub use cut::{CutEdgeResult, CutFaceResult, OneCycleCutPolicy, TwoCycleCutPolicy};
pub use glue::{UnglueKeyEdgesResult, UnglueKeyVerticesResult};
pub use intersect::{IntersectResult, IntersectSettings};
pub use uncut::{UncutAtKeyEdgeResult, UncutAtKeyVertexResult};

use nalgebra::Point2;

use crate::complex::Complex;
use crate::cycle::{KeyCycle, KeyHalfedge};
use crate::data::{KeyEdgeData, KeyFaceData};
use crate::diff::NodeModificationFlags;
use crate::keys::{AnimTime, CellType, NodeInsertionType, NodeKey};
use crate::node::{
    Cell, CellKind, Group, InbetweenEdge, InbetweenFace, InbetweenVertex, KeyEdge, KeyFace,
    KeyVertex, Node, NodeKind, TimeSpan,
};
use crate::properties::PropertyValue;

/// Anything an operations scope can be opened on: a complex (new outermost
/// scope) or an existing scope (nested scope).
pub trait OperationsScope {
    fn complex(&self) -> &Complex;
    fn operations(&mut self) -> Operations<'_>;
}

impl OperationsScope for Complex {
    fn complex(&self) -> &Complex {
        self
    }

    fn operations(&mut self) -> Operations<'_> {
        Operations::new(self)
    }
}

impl OperationsScope for Operations<'_> {
    fn complex(&self) -> &Complex {
        self.complex
    }

    fn operations(&mut self) -> Operations<'_> {
        self.nested()
    }
}

/// A mutation scope on a complex.
#[derive(Debug)]
pub struct Operations<'a> {
    complex: &'a mut Complex,
}

impl<'a> Operations<'a> {
    /// Opens a scope. The version of the complex is incremented when an
    /// outermost scope is opened.
    pub fn new(complex: &'a mut Complex) -> Self {
        complex.num_operations_in_progress += 1;
        if complex.num_operations_in_progress == 1 {
            complex.version += 1;
        }
        Self { complex }
    }

    /// Opens a nested scope. Its changes are emitted with the outer scope.
    pub fn nested(&mut self) -> Operations<'_> {
        Operations::new(self.complex)
    }

    pub fn complex(&self) -> &Complex {
        self.complex
    }

    fn finalize_(&mut self) {
        let complex = &mut *self.complex;

        // Update geometry from boundary, by increasing dimension.
        let mut dirty: Vec<(CellType, NodeKey)> = complex
            .op_diff
            .modified_nodes()
            .iter()
            .filter(|m| m.flags.contains(NodeModificationFlags::BOUNDARY_GEOMETRY_CHANGED))
            .filter_map(|m| Some((complex.cell_type(m.node)?, m.node)))
            .collect();
        dirty.sort_by_key(|(cell_type, _)| *cell_type);
        for (_, key) in dirty {
            if self.update_geometry_from_boundary_(key) {
                self.complex.record_modified_(key, NodeModificationFlags::GEOMETRY_CHANGED);
            }
        }

        let created: Vec<NodeKey> = self
            .complex
            .op_diff
            .created_nodes()
            .iter()
            .map(|c| c.node)
            .collect();
        for key in created {
            if let Some(ke) = self.complex.key_edge_mut(key) {
                ke.data.finalize_concat();
            } else if let Some(kf) = self.complex.key_face_mut(key) {
                kf.data.finalize_concat();
            }
        }

        if cfg!(debug_assertions) {
            self.complex.check_incidence();
        }

        let diff = std::mem::take(&mut self.complex.op_diff);
        tracing::debug!(
            version = self.complex.version,
            created = diff.created_nodes().len(),
            destroyed = diff.destroyed_nodes().len(),
            inserted = diff.inserted_nodes().len(),
            modified = diff.modified_nodes().len(),
            "operations completed"
        );
        self.complex.emit_(&diff);
        self.complex.temporary_cell_set.clear();
    }

    fn update_geometry_from_boundary_(&mut self, key: NodeKey) -> bool {
        let Some(cell) = self.complex.find_cell(key) else {
            return false;
        };
        match &cell.kind {
            CellKind::KeyEdge(ke) => {
                let (Some(start), Some(end)) = (ke.start_vertex, ke.end_vertex) else {
                    return false;
                };
                let (Some(p0), Some(p1)) = (
                    self.complex.key_vertex(start).map(KeyVertex::position),
                    self.complex.key_vertex(end).map(KeyVertex::position),
                ) else {
                    return false;
                };
                let snap = self.complex.settings.snap;
                self.complex
                    .key_edge_mut(key)
                    .is_some_and(|ke| ke.data.snap(p0, p1, &snap))
            }
            // Face geometry is entirely derived from its boundary.
            CellKind::KeyFace(_) => true,
            CellKind::KeyVertex(_)
            | CellKind::InbetweenVertex(_)
            | CellKind::InbetweenEdge(_)
            | CellKind::InbetweenFace(_) => false,
        }
    }

    // --- Node creation ---

    fn can_insert_(&self, parent: NodeKey, next_sibling: Option<NodeKey>) -> bool {
        if self.complex.find_group(parent).is_none() {
            return false;
        }
        next_sibling.map_or(true, |ns| self.complex.parent(ns) == Some(parent))
    }

    fn create_node_(&mut self, kind: NodeKind, parent: NodeKey, next_sibling: Option<NodeKey>) -> NodeKey {
        let key = self.complex.nodes.insert(Node::new(kind));
        self.complex.op_diff.on_node_created(key);
        self.insert_node_(key, parent, next_sibling);
        key
    }

    fn create_cell_(
        &mut self,
        kind: CellKind,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
    ) -> Option<NodeKey> {
        if !self.can_insert_(parent, next_sibling) {
            return None;
        }
        Some(self.create_node_(NodeKind::Cell(Cell::new(kind)), parent, next_sibling))
    }

    /// Creates the root group. Only called on an empty arena.
    pub(crate) fn create_root_group(&mut self) -> NodeKey {
        let key = self
            .complex
            .nodes
            .insert(Node::new(NodeKind::Group(Group::default())));
        self.complex.op_diff.on_node_created(key);
        self.complex.root = Some(key);
        key
    }

    pub fn create_group(&mut self, parent: NodeKey, next_sibling: Option<NodeKey>) -> Option<NodeKey> {
        if !self.can_insert_(parent, next_sibling) {
            return None;
        }
        Some(self.create_node_(NodeKind::Group(Group::default()), parent, next_sibling))
    }

    pub fn create_key_vertex(
        &mut self,
        position: Point2<f64>,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
        t: AnimTime,
    ) -> Option<NodeKey> {
        tracing::trace!(?parent, "create_key_vertex");
        self.create_cell_(
            CellKind::KeyVertex(KeyVertex { time: t, position }),
            parent,
            next_sibling,
        )
    }

    /// Creates an open edge. `start` and `end` may be the same vertex.
    pub fn create_key_open_edge(
        &mut self,
        start: NodeKey,
        end: NodeKey,
        mut data: KeyEdgeData,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
    ) -> Option<NodeKey> {
        tracing::trace!(?start, ?end, "create_key_open_edge");
        let t = self.complex.key_vertex(start)?.time;
        self.complex.key_vertex(end)?;
        data.set_sampling_quality(self.complex.settings.sampling_quality);
        let ke = self.create_cell_(
            CellKind::KeyEdge(KeyEdge {
                time: t,
                start_vertex: Some(start),
                end_vertex: Some(end),
                data,
            }),
            parent,
            next_sibling,
        )?;
        self.add_to_boundary_(ke, start);
        self.add_to_boundary_(ke, end);
        Some(ke)
    }

    pub fn create_key_closed_edge(
        &mut self,
        mut data: KeyEdgeData,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
        t: AnimTime,
    ) -> Option<NodeKey> {
        tracing::trace!("create_key_closed_edge");
        data.set_sampling_quality(self.complex.settings.sampling_quality);
        if !data.is_closed() {
            let stroke = data.stroke().close(false);
            data.set_stroke(stroke);
        }
        self.create_cell_(
            CellKind::KeyEdge(KeyEdge {
                time: t,
                start_vertex: None,
                end_vertex: None,
                data,
            }),
            parent,
            next_sibling,
        )
    }

    pub fn create_key_face(
        &mut self,
        cycles: Vec<KeyCycle>,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
        t: AnimTime,
    ) -> Option<NodeKey> {
        tracing::trace!(num_cycles = cycles.len(), "create_key_face");
        let kf = self.create_cell_(
            CellKind::KeyFace(KeyFace {
                time: t,
                cycles: Vec::new(),
                data: KeyFaceData::default(),
            }),
            parent,
            next_sibling,
        )?;
        for cycle in cycles {
            self.add_cycle_to_face(kf, cycle);
        }
        Some(kf)
    }

    /// Appends a cycle to a face and updates its boundary.
    pub fn add_cycle_to_face(&mut self, kf: NodeKey, cycle: KeyCycle) -> bool {
        let Some(face) = self.complex.key_face_mut(kf) else {
            return false;
        };
        face.cycles.push(cycle.clone());
        self.add_cycle_to_boundary_(kf, &cycle);
        true
    }

    pub fn create_inbetween_vertex(
        &mut self,
        key_vertex_before: NodeKey,
        key_vertex_after: NodeKey,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
    ) -> Option<NodeKey> {
        let t0 = self.complex.key_vertex(key_vertex_before)?.time;
        let t1 = self.complex.key_vertex(key_vertex_after)?.time;
        let iv = self.create_cell_(
            CellKind::InbetweenVertex(InbetweenVertex {
                key_vertex_before,
                key_vertex_after,
                time_span: TimeSpan::new(t0.min(t1), t0.max(t1)),
            }),
            parent,
            next_sibling,
        )?;
        self.add_to_boundary_(iv, key_vertex_before);
        self.add_to_boundary_(iv, key_vertex_after);
        Some(iv)
    }

    pub fn create_inbetween_edge(
        &mut self,
        boundary: &[NodeKey],
        time_span: TimeSpan,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
    ) -> Option<NodeKey> {
        let ie = self.create_cell_(
            CellKind::InbetweenEdge(InbetweenEdge { time_span }),
            parent,
            next_sibling,
        )?;
        for &b in boundary {
            self.add_to_boundary_(ie, b);
        }
        Some(ie)
    }

    pub fn create_inbetween_face(
        &mut self,
        boundary: &[NodeKey],
        time_span: TimeSpan,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
    ) -> Option<NodeKey> {
        let face = self.create_cell_(
            CellKind::InbetweenFace(InbetweenFace { time_span }),
            parent,
            next_sibling,
        )?;
        for &b in boundary {
            self.add_to_boundary_(face, b);
        }
        Some(face)
    }

    // --- Geometry and property edits ---

    /// Moves a key vertex. Returns whether the position changed.
    pub fn set_key_vertex_position(&mut self, kv: NodeKey, position: Point2<f64>) -> bool {
        let Some(vertex) = self.complex.key_vertex_mut(kv) else {
            return false;
        };
        if vertex.position == position {
            return false;
        }
        vertex.position = position;
        self.complex.record_modified_(kv, NodeModificationFlags::GEOMETRY_CHANGED);
        self.on_geometry_changed_(kv);
        true
    }

    /// Replaces the data of a key edge. The stroke is snapped to the end
    /// vertices when the scope ends.
    pub fn set_key_edge_data(&mut self, ke: NodeKey, mut data: KeyEdgeData) -> bool {
        let quality = self.complex.settings.sampling_quality;
        let Some(edge) = self.complex.key_edge_mut(ke) else {
            return false;
        };
        data.set_sampling_quality(quality);
        edge.data = data;
        self.complex.record_modified_(
            ke,
            NodeModificationFlags::GEOMETRY_CHANGED | NodeModificationFlags::BOUNDARY_GEOMETRY_CHANGED,
        );
        self.on_geometry_changed_(ke);
        true
    }

    pub fn set_key_edge_sampling_quality(
        &mut self,
        ke: NodeKey,
        quality: crate::settings::CurveSamplingQuality,
    ) -> bool {
        let changed = self
            .complex
            .key_edge_mut(ke)
            .is_some_and(|edge| edge.data.set_sampling_quality(quality));
        if changed {
            self.complex.record_modified_(ke, NodeModificationFlags::GEOMETRY_CHANGED);
            self.on_geometry_changed_(ke);
        }
        changed
    }

    /// Sets a property on the data of a key edge or key face.
    pub fn set_cell_property(&mut self, cell: NodeKey, name: &str, value: PropertyValue) -> bool {
        let changed = match self.complex.cell_mut(cell).map(|c| &mut c.kind) {
            Some(CellKind::KeyEdge(ke)) => ke.data.properties_mut().set(name, value),
            Some(CellKind::KeyFace(kf)) => kf.data.properties_mut().set(name, value),
            _ => false,
        };
        if changed {
            self.complex.op_diff.on_node_property_modified(cell, name);
        }
        changed
    }

    fn on_geometry_changed_(&mut self, cell: NodeKey) {
        let star = self.star_(cell);
        for s in star {
            self.complex
                .record_modified_(s, NodeModificationFlags::BOUNDARY_GEOMETRY_CHANGED);
        }
    }

    // --- Boundary and star ---

    pub(crate) fn star_(&self, cell: NodeKey) -> Vec<NodeKey> {
        self.complex
            .find_cell(cell)
            .map(|c| c.star.clone())
            .unwrap_or_default()
    }

    pub(crate) fn boundary_(&self, cell: NodeKey) -> Vec<NodeKey> {
        self.complex
            .find_cell(cell)
            .map(|c| c.boundary.clone())
            .unwrap_or_default()
    }

    /// Adds `bounding` to the boundary of `bounded` (and `bounded` to the star
    /// of `bounding`). No-op if already present.
    pub(crate) fn add_to_boundary_(&mut self, bounded: NodeKey, bounding: NodeKey) {
        if bounded == bounding || self.complex.find_cell(bounding).is_none() {
            return;
        }
        match self.complex.cell_mut(bounded) {
            Some(cell) if !cell.boundary.contains(&bounding) => cell.boundary.push(bounding),
            _ => return,
        }
        if let Some(cell) = self.complex.cell_mut(bounding) {
            cell.star.push(bounded);
        }
        self.complex.record_modified_(
            bounded,
            NodeModificationFlags::BOUNDARY_CHANGED | NodeModificationFlags::BOUNDARY_GEOMETRY_CHANGED,
        );
        self.complex
            .record_modified_(bounding, NodeModificationFlags::STAR_CHANGED);
    }

    /// Removes `bounding` from the boundary of `bounded` (and `bounded` from
    /// the star of `bounding`). No-op if absent.
    pub(crate) fn remove_from_boundary_(&mut self, bounded: NodeKey, bounding: NodeKey) {
        match self.complex.cell_mut(bounded) {
            Some(cell) => {
                let Some(i) = cell.boundary.iter().position(|b| *b == bounding) else {
                    return;
                };
                cell.boundary.remove(i);
            }
            None => return,
        }
        if let Some(cell) = self.complex.cell_mut(bounding) {
            cell.star.retain(|s| *s != bounded);
        }
        self.complex.record_modified_(
            bounded,
            NodeModificationFlags::BOUNDARY_CHANGED | NodeModificationFlags::BOUNDARY_GEOMETRY_CHANGED,
        );
        self.complex
            .record_modified_(bounding, NodeModificationFlags::STAR_CHANGED);
    }

    pub(crate) fn add_cycle_to_boundary_(&mut self, kf: NodeKey, cycle: &KeyCycle) {
        if let Some(kv) = cycle.steiner_vertex() {
            self.add_to_boundary_(kf, kv);
            return;
        }
        let Some(first) = cycle.first() else {
            return;
        };
        if first.is_closed(self.complex) {
            self.add_to_boundary_(kf, first.edge);
            return;
        }
        for h in cycle.halfedges() {
            self.add_to_boundary_(kf, h.edge);
            if let Some(kv) = h.end_vertex(self.complex) {
                self.add_to_boundary_(kf, kv);
            }
        }
    }

    /// Rebuilds the boundary of a face from its cycles.
    pub(crate) fn rebuild_face_boundary_(&mut self, kf: NodeKey) {
        let old = self.boundary_(kf);
        for b in old {
            self.remove_from_boundary_(kf, b);
        }
        let cycles = self
            .complex
            .key_face(kf)
            .map(|f| f.cycles.clone())
            .unwrap_or_default();
        for cycle in &cycles {
            self.add_cycle_to_boundary_(kf, cycle);
        }
    }

    // --- Substitution ---

    /// Replaces every use of `old_kv` by `new_kv` in the star of `old_kv`.
    pub(crate) fn substitute_vertex_(&mut self, old_kv: NodeKey, new_kv: NodeKey) {
        if old_kv == new_kv {
            return;
        }
        for cell in self.star_(old_kv) {
            match self.complex.cell_mut(cell).map(|c| &mut c.kind) {
                Some(CellKind::KeyEdge(ke)) => {
                    if ke.start_vertex == Some(old_kv) {
                        ke.start_vertex = Some(new_kv);
                    }
                    if ke.end_vertex == Some(old_kv) {
                        ke.end_vertex = Some(new_kv);
                    }
                }
                Some(CellKind::KeyFace(kf)) => {
                    for cycle in &mut kf.cycles {
                        if cycle.steiner_vertex() == Some(old_kv) {
                            *cycle = KeyCycle::from_steiner_vertex(new_kv);
                        }
                    }
                }
                Some(CellKind::InbetweenVertex(iv)) => {
                    if iv.key_vertex_before == old_kv {
                        iv.key_vertex_before = new_kv;
                    }
                    if iv.key_vertex_after == old_kv {
                        iv.key_vertex_after = new_kv;
                    }
                }
                Some(CellKind::KeyVertex(_))
                | Some(CellKind::InbetweenEdge(_))
                | Some(CellKind::InbetweenFace(_))
                | None => {}
            }
            self.remove_from_boundary_(cell, old_kv);
            self.add_to_boundary_(cell, new_kv);
        }
    }

    /// Replaces every use of the halfedge `old` (in either direction) by
    /// `new` (with the matching direction) in the star of `old.edge`.
    pub(crate) fn substitute_edge_(&mut self, old: KeyHalfedge, new: KeyHalfedge) {
        if old.edge == new.edge {
            return;
        }
        for cell in self.star_(old.edge) {
            if let Some(kf) = self.complex.key_face_mut(cell) {
                for cycle in &mut kf.cycles {
                    for h in cycle.halfedges_mut().iter_mut() {
                        if h.edge == old.edge {
                            *h = if h.direction == old.direction { new } else { new.opposite() };
                        }
                    }
                }
            }
            self.remove_from_boundary_(cell, old.edge);
            self.add_to_boundary_(cell, new.edge);
        }
    }

    // --- Tree insertion ---

    fn insert_(&mut self, node: NodeKey, parent: NodeKey, next_sibling: Option<NodeKey>, kind: NodeInsertionType) -> bool {
        if node == parent || Some(node) == next_sibling {
            return false;
        }
        let unchanged = self
            .complex
            .find(node)
            .is_some_and(|n| n.parent == Some(parent) && n.next_sibling == next_sibling);
        if unchanged {
            return false;
        }
        let old_parent = self.complex.unlink_(node);
        self.complex.link_before_(node, parent, next_sibling);
        self.complex.op_diff.on_node_inserted(node, old_parent, kind);
        if let Some(op) = old_parent {
            self.complex
                .record_modified_(op, NodeModificationFlags::CHILDREN_CHANGED);
        }
        self.complex
            .record_modified_(parent, NodeModificationFlags::CHILDREN_CHANGED);
        true
    }

    pub(crate) fn insert_node_before_sibling_(&mut self, node: NodeKey, next_sibling: NodeKey) -> bool {
        let Some(parent) = self.complex.parent(next_sibling) else {
            return false;
        };
        self.insert_(node, parent, Some(next_sibling), NodeInsertionType::BeforeSibling)
    }

    pub(crate) fn insert_node_after_sibling_(&mut self, node: NodeKey, previous_sibling: NodeKey) -> bool {
        let Some(prev) = self.complex.find(previous_sibling) else {
            return false;
        };
        let (Some(parent), next) = (prev.parent, prev.next_sibling) else {
            return false;
        };
        if next == Some(node) {
            return false;
        }
        self.insert_(node, parent, next, NodeInsertionType::AfterSibling)
    }

    pub(crate) fn insert_node_as_first_child_(&mut self, node: NodeKey, parent: NodeKey) -> bool {
        let Some(group) = self.complex.find_group(parent) else {
            return false;
        };
        let first = group.first_child;
        if first == Some(node) {
            return false;
        }
        self.insert_(node, parent, first, NodeInsertionType::FirstChild)
    }

    pub(crate) fn insert_node_as_last_child_(&mut self, node: NodeKey, parent: NodeKey) -> bool {
        if self.complex.find_group(parent).is_none() {
            return false;
        }
        self.insert_(node, parent, None, NodeInsertionType::LastChild)
    }

    /// Inserts before `next_sibling`, or as last child of `parent`.
    pub(crate) fn insert_node_(&mut self, node: NodeKey, parent: NodeKey, next_sibling: Option<NodeKey>) -> bool {
        match next_sibling {
            Some(ns) => self.insert_node_before_sibling_(node, ns),
            None => self.insert_node_as_last_child_(node, parent),
        }
    }

    // --- Node destruction ---

    /// Unparents and destroys the given nodes. Their boundary/star links
    /// must already have been cleared.
    pub(crate) fn destroy_nodes_(&mut self, nodes: &[NodeKey]) {
        for &node in nodes {
            if let Some(parent) = self.complex.unlink_(node) {
                self.complex
                    .record_modified_(parent, NodeModificationFlags::CHILDREN_CHANGED);
            }
        }
        for &node in nodes {
            if self.complex.nodes.remove(node).is_some() {
                self.complex.op_diff.on_node_destroyed(node);
                self.complex.temporary_cell_set.remove(&node);
                if self.complex.root == Some(node) {
                    self.complex.root = None;
                }
            }
        }
    }

    /// Destroys a node that has no children and no boundary/star links.
    pub(crate) fn destroy_childless_node_(&mut self, node: NodeKey) {
        let has_children = self.complex.find_group(node).is_some_and(|g| g.num_children > 0);
        if has_children {
            return;
        }
        self.destroy_nodes_(&[node]);
    }

    // --- Small helpers shared by the operation modules ---

    pub(crate) fn parent_of_(&self, node: NodeKey) -> Option<NodeKey> {
        self.complex.parent(node)
    }

    pub(crate) fn next_sibling_of_(&self, node: NodeKey) -> Option<NodeKey> {
        self.complex.find(node).and_then(|n| n.next_sibling)
    }

    pub(crate) fn time_of_(&self, cell: NodeKey) -> AnimTime {
        match self.complex.find_cell(cell).map(|c| &c.kind) {
            Some(CellKind::KeyVertex(kv)) => kv.time,
            Some(CellKind::KeyEdge(ke)) => ke.time,
            Some(CellKind::KeyFace(kf)) => kf.time,
            Some(CellKind::InbetweenVertex(iv)) => iv.time_span.start,
            Some(CellKind::InbetweenEdge(ie)) => ie.time_span.start,
            Some(CellKind::InbetweenFace(face)) => face.time_span.start,
            None => 0.0,
        }
    }

    pub(crate) fn vertex_position_(&self, kv: NodeKey) -> Option<Point2<f64>> {
        self.complex.key_vertex(kv).map(KeyVertex::position)
    }
}

impl Drop for Operations<'_> {
    fn drop(&mut self) {
        self.complex.num_operations_in_progress = self.complex.num_operations_in_progress.saturating_sub(1);
        if self.complex.num_operations_in_progress == 0 {
            self.finalize_();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComplexDiff;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn line_data(a: (f64, f64), b: (f64, f64)) -> KeyEdgeData {
        KeyEdgeData::from_points(vec![Point2::new(a.0, a.1), Point2::new(b.0, b.1)])
    }

    fn recorder(complex: &mut Complex) -> Rc<RefCell<Vec<ComplexDiff>>> {
        let diffs = Rc::new(RefCell::new(Vec::new()));
        let sink = diffs.clone();
        complex.on_nodes_changed(move |_, diff| sink.borrow_mut().push(diff.clone()));
        diffs
    }

    // --- Creation tests ---

    #[test]
    fn open_edge_links_boundary_and_star() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let (a, b, e) = complex.with_operations(|ops| {
            let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
            let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, None, 0.0).unwrap();
            let e = ops
                .create_key_open_edge(a, b, line_data((0.0, 0.0), (1.0, 0.0)), root, None)
                .unwrap();
            (a, b, e)
        });
        assert_eq!(complex.find_cell(e).unwrap().boundary(), &[a, b]);
        assert_eq!(complex.find_cell(a).unwrap().star(), &[e]);
        assert_eq!(complex.find_cell(b).unwrap().star(), &[e]);
    }

    #[test]
    fn loop_edge_has_single_boundary_vertex() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let (v, e) = complex.with_operations(|ops| {
            let v = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
            let data = KeyEdgeData::from_points(vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(0.0, 1.0),
                Point2::new(0.0, 0.0),
            ]);
            let e = ops.create_key_open_edge(v, v, data, root, None).unwrap();
            (v, e)
        });
        assert_eq!(complex.find_cell(e).unwrap().boundary(), &[v]);
        assert_eq!(complex.find_cell(v).unwrap().star(), &[e]);
    }

    #[test]
    fn creation_rejects_bad_parent() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        complex.with_operations(|ops| {
            let v = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
            assert!(ops.create_key_vertex(Point2::new(0.0, 0.0), v, None, 0.0).is_none());
            let g = ops.create_group(root, None).unwrap();
            // `v` is not a child of `g`.
            assert!(ops.create_key_vertex(Point2::new(0.0, 0.0), g, Some(v), 0.0).is_none());
        });
    }

    #[test]
    fn creation_diff() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let diffs = recorder(&mut complex);
        let v = complex.with_operations(|ops| {
            ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap()
        });
        let diffs = diffs.borrow();
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].is_created(v));
        assert_eq!(diffs[0].inserted_nodes()[0].old_parent, None);
        assert_eq!(
            diffs[0].inserted_nodes()[0].insertion_type,
            NodeInsertionType::LastChild
        );
        assert!(diffs[0]
            .modification_flags(root)
            .contains(NodeModificationFlags::CHILDREN_CHANGED));
    }

    // --- Boundary tests ---

    #[test]
    fn boundary_helpers_are_idempotent() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        complex.with_operations(|ops| {
            let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
            let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, None, 0.0).unwrap();
            let e = ops
                .create_key_open_edge(a, b, line_data((0.0, 0.0), (1.0, 0.0)), root, None)
                .unwrap();
            ops.add_to_boundary_(e, a);
            assert_eq!(ops.complex().find_cell(e).unwrap().boundary().len(), 2);
            ops.remove_from_boundary_(e, a);
            ops.remove_from_boundary_(e, a);
            assert_eq!(ops.complex().find_cell(e).unwrap().boundary(), &[b]);
            assert!(ops.complex().find_cell(a).unwrap().star().is_empty());
        });
    }

    // --- Scope tests ---

    #[test]
    fn nested_scopes_emit_once() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let diffs = recorder(&mut complex);
        let version = complex.version();
        {
            let mut outer = Operations::new(&mut complex);
            outer.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0);
            {
                let mut inner = outer.nested();
                inner.create_key_vertex(Point2::new(1.0, 0.0), root, None, 0.0);
            }
            assert!(outer.complex().is_operation_in_progress());
        }
        assert_eq!(diffs.borrow().len(), 1);
        assert_eq!(diffs.borrow()[0].created_nodes().len(), 2);
        assert_eq!(complex.version(), version + 1);
        assert!(!complex.is_operation_in_progress());
    }

    #[test]
    fn moving_vertex_snaps_edges() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let (a, e) = complex.with_operations(|ops| {
            let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
            let b = ops.create_key_vertex(Point2::new(2.0, 0.0), root, None, 0.0).unwrap();
            let e = ops
                .create_key_open_edge(a, b, line_data((0.0, 0.0), (2.0, 0.0)), root, None)
                .unwrap();
            (a, e)
        });
        let diffs = recorder(&mut complex);
        complex.with_operations(|ops| {
            assert!(ops.set_key_vertex_position(a, Point2::new(0.0, 1.0)));
            assert!(!ops.set_key_vertex_position(a, Point2::new(0.0, 1.0)));
        });
        let stroke = complex.key_edge(e).unwrap().data().stroke().clone();
        assert_eq!(stroke.start_point(), Point2::new(0.0, 1.0));
        let flags = diffs.borrow()[0].modification_flags(e);
        assert!(flags.contains(NodeModificationFlags::BOUNDARY_GEOMETRY_CHANGED));
        assert!(flags.contains(NodeModificationFlags::GEOMETRY_CHANGED));
    }

    #[test]
    fn cell_property_records_name() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let e = complex.with_operations(|ops| {
            ops.create_key_closed_edge(
                KeyEdgeData::from_closed_points(vec![
                    Point2::new(0.0, 0.0),
                    Point2::new(1.0, 0.0),
                    Point2::new(0.0, 1.0),
                ]),
                root,
                None,
                0.0,
            )
            .unwrap()
        });
        let diffs = recorder(&mut complex);
        complex.with_operations(|ops| {
            assert!(ops.set_cell_property(e, "color", PropertyValue::Int(3)));
        });
        assert_eq!(
            diffs.borrow()[0].modified_nodes()[0].modified_properties,
            vec!["color".to_string()]
        );
    }
}
