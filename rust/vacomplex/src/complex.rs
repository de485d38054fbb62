// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The [`Complex`]: owner of all nodes.
//!
//! The complex stores every group and cell in a slot map keyed by
//! [`NodeKey`]. The tree structure (parent, siblings, children) is stored as
//! keys inside the nodes. All mutation goes through an
//! [`Operations`](crate::Operations) scope, which records a [`ComplexDiff`]
//! and emits it to the registered listeners when the outermost scope ends.

use std::fmt::Write as _;

use rustc_hash::FxHashSet;
use slotmap::SlotMap;

use crate::diff::{ComplexDiff, NodeModificationFlags};
use crate::keys::{AnimTime, CellType, ListenerKey, NodeKey};
use crate::node::{Cell, CellKind, Group, KeyEdge, KeyFace, KeyVertex, Node, NodeKind};
use crate::operations::Operations;
use crate::settings::{ComplexSettings, CurveSamplingQuality, SnapSettings};

/// Callback invoked with every emitted diff.
pub type DiffListener = Box<dyn FnMut(&Complex, &ComplexDiff)>;

#[derive(Default)]
struct Listeners(SlotMap<ListenerKey, DiffListener>);

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("count", &self.0.len()).finish()
    }
}

/// A vector animation complex.
///
/// # Example
///
/// ```
/// use nalgebra::Point2;
/// use vacomplex::{ops, Complex, KeyEdgeData};
///
/// let mut complex = Complex::new();
/// let root = complex.root_group().unwrap();
/// let a = ops::create_key_vertex(&mut complex, Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
/// let b = ops::create_key_vertex(&mut complex, Point2::new(1.0, 0.0), root, None, 0.0).unwrap();
/// let data = KeyEdgeData::from_points(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]);
/// let e = ops::create_key_open_edge(&mut complex, a, b, data, root, None).unwrap();
///
/// assert_eq!(complex.edges().count(), 1);
/// assert_eq!(complex.find_cell(a).unwrap().star(), &[e]);
/// ```
#[derive(Debug)]
pub struct Complex {
    pub(crate) nodes: SlotMap<NodeKey, Node>,
    pub(crate) root: Option<NodeKey>,
    pub(crate) version: u64,
    pub(crate) num_operations_in_progress: usize,
    pub(crate) op_diff: ComplexDiff,
    pub(crate) temporary_cell_set: FxHashSet<NodeKey>,
    pub(crate) settings: ComplexSettings,
    listeners: Listeners,
}

impl Default for Complex {
    fn default() -> Self {
        Self::new()
    }
}

impl Complex {
    /// Creates a complex with an empty root group.
    pub fn new() -> Self {
        Self::with_settings(ComplexSettings::default())
    }

    /// Creates a complex with an empty root group and the given settings.
    pub fn with_settings(settings: ComplexSettings) -> Self {
        let mut complex = Self {
            nodes: SlotMap::with_key(),
            root: None,
            version: 0,
            num_operations_in_progress: 0,
            op_diff: ComplexDiff::default(),
            temporary_cell_set: FxHashSet::default(),
            settings,
            listeners: Listeners::default(),
        };
        complex.reset_root();
        complex
    }

    // --- Lifecycle ---

    /// Destroys every node, including the root group.
    ///
    /// Emits one diff listing all destroyed nodes and increments the version.
    pub fn clear(&mut self) {
        let mut diff = ComplexDiff::default();
        let keys: Vec<NodeKey> = self.nodes.keys().collect();
        for key in keys {
            diff.on_node_destroyed(key);
        }
        self.nodes.clear();
        self.root = None;
        self.version += 1;
        tracing::debug!(destroyed = diff.destroyed_nodes().len(), "complex cleared");
        self.emit_(&diff);
    }

    /// Clears the complex and creates a new empty root group.
    pub fn reset_root(&mut self) {
        self.clear();
        let mut ops = Operations::new(self);
        ops.create_root_group();
    }

    /// Number of completed outermost operation scopes (plus clears).
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_operation_in_progress(&self) -> bool {
        self.num_operations_in_progress > 0
    }

    /// Runs `f` inside an operations scope. The diff is emitted when the
    /// scope ends, unless it is nested in another scope.
    pub fn with_operations<R>(&mut self, f: impl FnOnce(&mut Operations<'_>) -> R) -> R {
        let mut ops = Operations::new(self);
        f(&mut ops)
    }

    // --- Settings ---

    pub fn settings(&self) -> &ComplexSettings {
        &self.settings
    }

    /// Applies all settings, updating every key edge.
    pub fn apply_settings(&mut self, settings: ComplexSettings) {
        self.settings.snap = settings.snap;
        self.set_sampling_quality(settings.sampling_quality);
    }

    /// Sets the sampling quality of the complex and of all its key edges.
    pub fn set_sampling_quality(&mut self, quality: CurveSamplingQuality) {
        self.settings.sampling_quality = quality;
        let edges: Vec<NodeKey> = self.edges().collect();
        let mut ops = Operations::new(self);
        for ke in edges {
            ops.set_key_edge_sampling_quality(ke, quality);
        }
    }

    pub fn set_snap_settings(&mut self, snap: SnapSettings) {
        self.settings.snap = snap;
    }

    // --- Listeners ---

    /// Registers a callback receiving every emitted diff.
    pub fn on_nodes_changed(&mut self, listener: impl FnMut(&Complex, &ComplexDiff) + 'static) -> ListenerKey {
        self.listeners.0.insert(Box::new(listener))
    }

    pub fn remove_listener(&mut self, key: ListenerKey) -> bool {
        self.listeners.0.remove(key).is_some()
    }

    pub(crate) fn emit_(&mut self, diff: &ComplexDiff) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in listeners.0.values_mut() {
            listener(self, diff);
        }
        self.listeners = listeners;
    }

    // --- Queries ---

    pub fn root_group(&self) -> Option<NodeKey> {
        self.root
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn find(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn find_cell(&self, key: NodeKey) -> Option<&Cell> {
        self.nodes.get(key)?.as_cell()
    }

    pub fn find_group(&self, key: NodeKey) -> Option<&Group> {
        self.nodes.get(key)?.as_group()
    }

    pub fn cell_type(&self, key: NodeKey) -> Option<CellType> {
        self.find_cell(key).map(Cell::cell_type)
    }

    pub fn key_vertex(&self, key: NodeKey) -> Option<&KeyVertex> {
        self.find_cell(key)?.as_key_vertex()
    }

    pub fn key_edge(&self, key: NodeKey) -> Option<&KeyEdge> {
        self.find_cell(key)?.as_key_edge()
    }

    pub fn key_face(&self, key: NodeKey) -> Option<&KeyFace> {
        self.find_cell(key)?.as_key_face()
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key)?.parent
    }

    /// Children of a group, from bottom-most to top-most.
    pub fn children(&self, group: NodeKey) -> Children<'_> {
        Children {
            complex: self,
            next: self.find_group(group).and_then(|g| g.first_child),
        }
    }

    /// All nodes below the root in depth-first order (which is also the
    /// back-to-front drawing order).
    pub fn nodes_in_order(&self) -> Vec<NodeKey> {
        let mut result = Vec::with_capacity(self.nodes.len());
        if let Some(root) = self.root {
            self.collect_descendants_(root, &mut result);
        }
        result
    }

    pub(crate) fn collect_descendants_(&self, group: NodeKey, out: &mut Vec<NodeKey>) {
        for child in self.children(group) {
            out.push(child);
            if self.find_group(child).is_some() {
                self.collect_descendants_(child, out);
            }
        }
    }

    fn cells_of_type(&self, filter: fn(&Cell) -> bool) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes_in_order()
            .into_iter()
            .filter(move |k| self.find_cell(*k).is_some_and(filter))
    }

    /// All vertex cells (key and inbetween).
    pub fn vertices(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.cells_of_type(|c| matches!(c.kind, CellKind::KeyVertex(_) | CellKind::InbetweenVertex(_)))
    }

    /// All edge cells (key and inbetween).
    pub fn edges(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.cells_of_type(|c| matches!(c.kind, CellKind::KeyEdge(_) | CellKind::InbetweenEdge(_)))
    }

    /// All face cells (key and inbetween).
    pub fn faces(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.cells_of_type(|c| matches!(c.kind, CellKind::KeyFace(_) | CellKind::InbetweenFace(_)))
    }

    /// Vertex cells existing at time `t`.
    pub fn vertices_at(&self, t: AnimTime) -> impl Iterator<Item = NodeKey> + '_ {
        self.vertices().filter(move |k| self.exists_at(*k, t))
    }

    /// Edge cells existing at time `t`.
    pub fn edges_at(&self, t: AnimTime) -> impl Iterator<Item = NodeKey> + '_ {
        self.edges().filter(move |k| self.exists_at(*k, t))
    }

    /// Face cells existing at time `t`.
    pub fn faces_at(&self, t: AnimTime) -> impl Iterator<Item = NodeKey> + '_ {
        self.faces().filter(move |k| self.exists_at(*k, t))
    }

    fn exists_at(&self, key: NodeKey, t: AnimTime) -> bool {
        self.find_cell(key).is_some_and(|c| c.exists_at(t))
    }

    // --- Debug output ---

    /// Human-readable dump of the node tree.
    pub fn debug_string(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root {
            let _ = writeln!(out, "{:?} Group (root)", root);
            self.debug_write_(&mut out, root, 1);
        }
        out
    }

    fn debug_write_(&self, out: &mut String, group: NodeKey, depth: usize) {
        for child in self.children(group) {
            let indent = "  ".repeat(depth);
            let Some(node) = self.find(child) else { continue };
            match &node.kind {
                NodeKind::Group(_) => {
                    let _ = writeln!(out, "{indent}{child:?} Group");
                    self.debug_write_(out, child, depth + 1);
                }
                NodeKind::Cell(cell) => {
                    let _ = write!(out, "{indent}{child:?} {}", cell.cell_type());
                    match &cell.kind {
                        CellKind::KeyVertex(kv) => {
                            let _ = write!(out, " t={} position=({}, {})", kv.time, kv.position.x, kv.position.y);
                        }
                        CellKind::KeyEdge(ke) => {
                            let _ = write!(out, " t={} start={:?} end={:?}", ke.time, ke.start_vertex, ke.end_vertex);
                        }
                        CellKind::KeyFace(kf) => {
                            let _ = write!(out, " t={} cycles={}", kf.time, kf.cycles.len());
                        }
                        CellKind::InbetweenVertex(_) | CellKind::InbetweenEdge(_) | CellKind::InbetweenFace(_) => {}
                    }
                    let _ = writeln!(out, " boundary={:?} star={:?}", cell.boundary, cell.star);
                }
            }
        }
    }

    /// Logs the node tree at debug level.
    pub fn debug_print(&self) {
        tracing::debug!(version = self.version, "complex tree:\n{}", self.debug_string());
    }

    /// Returns whether boundary and star mirror each other over existing
    /// cells. Every broken link is logged at warn level.
    pub fn check_incidence(&self) -> bool {
        let mut consistent = true;
        for (key, node) in &self.nodes {
            let Some(cell) = node.as_cell() else { continue };
            for &b in &cell.boundary {
                if !self.find_cell(b).is_some_and(|bc| bc.star.contains(&key)) {
                    tracing::warn!(cell = ?key, boundary = ?b, "boundary cell does not list the cell in its star");
                    consistent = false;
                }
            }
            for &s in &cell.star {
                if !self.find_cell(s).is_some_and(|sc| sc.boundary.contains(&key)) {
                    tracing::warn!(cell = ?key, star = ?s, "star cell does not list the cell in its boundary");
                    consistent = false;
                }
            }
        }
        consistent
    }

    // --- Internal mutable access ---

    pub(crate) fn cell_mut(&mut self, key: NodeKey) -> Option<&mut Cell> {
        self.nodes.get_mut(key)?.as_cell_mut()
    }

    pub(crate) fn group_mut(&mut self, key: NodeKey) -> Option<&mut Group> {
        self.nodes.get_mut(key)?.as_group_mut()
    }

    pub(crate) fn key_vertex_mut(&mut self, key: NodeKey) -> Option<&mut KeyVertex> {
        self.cell_mut(key)?.as_key_vertex_mut()
    }

    pub(crate) fn key_edge_mut(&mut self, key: NodeKey) -> Option<&mut KeyEdge> {
        self.cell_mut(key)?.as_key_edge_mut()
    }

    pub(crate) fn key_face_mut(&mut self, key: NodeKey) -> Option<&mut KeyFace> {
        self.cell_mut(key)?.as_key_face_mut()
    }

    pub(crate) fn record_modified_(&mut self, key: NodeKey, flags: NodeModificationFlags) {
        self.op_diff.on_node_modified(key, flags);
    }

    // --- Tree links ---

    /// Detaches a node from its parent. Returns the old parent.
    pub(crate) fn unlink_(&mut self, key: NodeKey) -> Option<NodeKey> {
        let (parent, prev, next) = {
            let node = self.nodes.get(key)?;
            (node.parent?, node.previous_sibling, node.next_sibling)
        };
        match prev {
            Some(p) => {
                if let Some(n) = self.nodes.get_mut(p) {
                    n.next_sibling = next;
                }
            }
            None => {
                if let Some(g) = self.group_mut(parent) {
                    g.first_child = next;
                }
            }
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.nodes.get_mut(nx) {
                    n.previous_sibling = prev;
                }
            }
            None => {
                if let Some(g) = self.group_mut(parent) {
                    g.last_child = prev;
                }
            }
        }
        if let Some(g) = self.group_mut(parent) {
            g.num_children = g.num_children.saturating_sub(1);
        }
        if let Some(node) = self.nodes.get_mut(key) {
            node.parent = None;
            node.previous_sibling = None;
            node.next_sibling = None;
        }
        Some(parent)
    }

    /// Attaches an unlinked node as a child of `parent`, just before
    /// `next_sibling` (or as last child). `next_sibling` must be a child of
    /// `parent`.
    pub(crate) fn link_before_(&mut self, key: NodeKey, parent: NodeKey, next_sibling: Option<NodeKey>) {
        let prev = match next_sibling {
            Some(nx) => self.nodes.get(nx).and_then(|n| n.previous_sibling),
            None => self.find_group(parent).and_then(|g| g.last_child),
        };
        match prev {
            Some(p) => {
                if let Some(n) = self.nodes.get_mut(p) {
                    n.next_sibling = Some(key);
                }
            }
            None => {
                if let Some(g) = self.group_mut(parent) {
                    g.first_child = Some(key);
                }
            }
        }
        match next_sibling {
            Some(nx) => {
                if let Some(n) = self.nodes.get_mut(nx) {
                    n.previous_sibling = Some(key);
                }
            }
            None => {
                if let Some(g) = self.group_mut(parent) {
                    g.last_child = Some(key);
                }
            }
        }
        if let Some(g) = self.group_mut(parent) {
            g.num_children += 1;
        }
        if let Some(node) = self.nodes.get_mut(key) {
            node.parent = Some(parent);
            node.previous_sibling = prev;
            node.next_sibling = next_sibling;
        }
    }

    /// Returns whether `node` is `ancestor` or one of its descendants.
    pub fn is_descendant_of(&self, node: NodeKey, ancestor: NodeKey) -> bool {
        let mut current = Some(node);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.parent(k);
        }
        false
    }
}

/// Iterator over the children of a group.
pub struct Children<'a> {
    complex: &'a Complex,
    next: Option<NodeKey>,
}

impl Iterator for Children<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let current = self.next?;
        self.next = self.complex.find(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::KeyEdgeData;
    use nalgebra::Point2;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn new_complex_has_root() {
        let complex = Complex::new();
        let root = complex.root_group().unwrap();
        assert_eq!(complex.num_nodes(), 1);
        assert!(complex.find_group(root).is_some());
        assert!(complex.parent(root).is_none());
    }

    #[test]
    fn clear_removes_everything() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        complex.with_operations(|ops| {
            ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0);
        });
        let version = complex.version();
        complex.clear();
        assert_eq!(complex.num_nodes(), 0);
        assert!(complex.root_group().is_none());
        assert_eq!(complex.version(), version + 1);
        assert!(!complex.contains(root));
    }

    #[test]
    fn reset_root_creates_new_root() {
        let mut complex = Complex::new();
        let old = complex.root_group().unwrap();
        complex.with_operations(|ops| {
            ops.create_key_vertex(Point2::new(0.0, 0.0), old, None, 0.0);
        });
        complex.reset_root();
        let new = complex.root_group().unwrap();
        assert_ne!(old, new);
        assert!(!complex.contains(old));
        // Every node in the arena is reachable from the root.
        assert_eq!(complex.num_nodes(), 1);
        assert_eq!(complex.num_nodes(), complex.nodes_in_order().len() + 1);
    }

    #[test]
    fn check_incidence_detects_broken_star() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let a = complex.with_operations(|ops| {
            let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
            let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, None, 0.0).unwrap();
            let data = KeyEdgeData::from_points(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]);
            ops.create_key_open_edge(a, b, data, root, None).unwrap();
            a
        });
        assert!(complex.check_incidence());
        complex.cell_mut(a).unwrap().star.clear();
        assert!(!complex.check_incidence());
    }

    #[test]
    fn children_in_order() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let (a, b, c) = complex.with_operations(|ops| {
            let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
            let c = ops.create_key_vertex(Point2::new(2.0, 0.0), root, None, 0.0).unwrap();
            let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, Some(c), 0.0).unwrap();
            (a, b, c)
        });
        let children: Vec<NodeKey> = complex.children(root).collect();
        assert_eq!(children, vec![a, b, c]);
        assert_eq!(complex.find_group(root).unwrap().num_children(), 3);
        assert_eq!(complex.vertices().count(), 3);
        assert_eq!(complex.vertices_at(0.0).count(), 3);
        assert_eq!(complex.vertices_at(1.0).count(), 0);
    }

    #[test]
    fn listeners_receive_one_diff_per_outer_scope() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        let listener = complex.on_nodes_changed(move |_, diff| {
            sink.borrow_mut().push(diff.created_nodes().len());
        });

        let version = complex.version();
        complex.with_operations(|ops| {
            ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0);
            let mut nested = ops.nested();
            nested.create_key_vertex(Point2::new(1.0, 0.0), root, None, 0.0);
        });
        assert_eq!(*received.borrow(), vec![2]);
        assert_eq!(complex.version(), version + 1);

        assert!(complex.remove_listener(listener));
        complex.with_operations(|ops| {
            ops.create_key_vertex(Point2::new(2.0, 0.0), root, None, 0.0);
        });
        assert_eq!(received.borrow().len(), 1);
    }

    #[test]
    fn debug_string_lists_cells() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        complex.with_operations(|ops| {
            ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0);
        });
        let text = complex.debug_string();
        assert!(text.contains("KeyVertex"));
        assert!(text.contains("root"));
    }

    #[test]
    fn sampling_quality_applies_to_edges() {
        use crate::data::KeyEdgeData;
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
        complex.set_sampling_quality(CurveSamplingQuality::High);
        assert_eq!(
            complex.key_edge(e).unwrap().data().sampling_quality(),
            CurveSamplingQuality::High
        );
    }
}
