// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hard and soft deletion.

use rustc_hash::FxHashSet;

use super::Operations;
use crate::cycle::KeyCycle;
use crate::geometry::WindingRule;
use crate::keys::{CellSpatialType, CellType, NodeKey};
use crate::node::CellKind;

const NUM_SAMPLES_PER_CONTAIN_TEST: usize = 20;
const CONTAIN_RATIO_THRESHOLD: f64 = 0.5;

/// Insertion-ordered set of nodes about to be destroyed.
#[derive(Default)]
struct DoomedNodes {
    set: FxHashSet<NodeKey>,
    list: Vec<NodeKey>,
}

impl DoomedNodes {
    fn insert(&mut self, key: NodeKey) -> bool {
        let inserted = self.set.insert(key);
        if inserted {
            self.list.push(key);
        }
        inserted
    }

    fn contains(&self, key: NodeKey) -> bool {
        self.set.contains(&key)
    }
}

struct RepairedCycle {
    cycle: KeyCycle,
    original_index: usize,
    is_unchanged: bool,
}

/// A selection with groups expanded to their descendants.
#[derive(Default)]
struct ResolvedSelection {
    groups: Vec<NodeKey>,
    cells: Vec<NodeKey>,
    top_groups: Vec<NodeKey>,
}

impl ResolvedSelection {
    fn new(ops: &Operations<'_>, nodes: &[NodeKey]) -> Self {
        let mut selection = Self::default();
        for &node in nodes {
            if ops.complex.find_group(node).is_some() {
                selection.visit_group_(ops, node);
            }
        }
        for &node in nodes {
            if ops.complex.find_cell(node).is_some() && !selection.cells.contains(&node) {
                selection.cells.push(node);
            }
        }
        selection
    }

    fn visit_group_(&mut self, ops: &Operations<'_>, group: NodeKey) {
        if self.groups.contains(&group) {
            self.top_groups.retain(|g| *g != group);
            return;
        }
        self.groups.push(group);
        self.top_groups.push(group);
        let children: Vec<NodeKey> = ops.complex.children(group).collect();
        for child in children {
            if ops.complex.find_group(child).is_some() {
                self.visit_group_(ops, child);
            } else if !self.cells.contains(&child) {
                self.cells.push(child);
            }
        }
    }
}

/// Key cells sorted by type, without duplicates.
#[derive(Default)]
struct ClassifiedCells {
    kvs: Vec<NodeKey>,
    kes: Vec<NodeKey>,
    kfs: Vec<NodeKey>,
}

impl ClassifiedCells {
    fn insert(&mut self, cell_type: Option<CellType>, key: NodeKey) {
        let list = match cell_type {
            Some(CellType::KeyVertex) => &mut self.kvs,
            Some(CellType::KeyEdge) => &mut self.kes,
            Some(CellType::KeyFace) => &mut self.kfs,
            _ => return,
        };
        if !list.contains(&key) {
            list.push(key);
        }
    }
}

impl Operations<'_> {
    /// Deletes the given nodes, their descendants, and every cell depending
    /// on them. Deleting the root group deletes its content but keeps the
    /// root.
    pub fn hard_delete(&mut self, nodes: &[NodeKey], delete_isolated_vertices: bool) {
        tracing::trace!(count = nodes.len(), "hard_delete");
        self.delete_with_dependents_(nodes, delete_isolated_vertices, false);
    }

    /// Deletes the given nodes while preserving the appearance of what
    /// remains: cells are merged away (uncut) where possible, and faces
    /// depending on deleted cells are repaired instead of deleted.
    pub fn soft_delete(&mut self, nodes: &[NodeKey], delete_isolated_vertices: bool) {
        tracing::trace!(count = nodes.len(), "soft_delete");
        if nodes.is_empty() {
            return;
        }
        let selection = ResolvedSelection::new(self, nodes);
        let mut selection_cells = ClassifiedCells::default();
        for &cell in &selection.cells {
            selection_cells.insert(self.complex.cell_type(cell), cell);
        }

        let selected: FxHashSet<NodeKey> = selection.cells.iter().copied().collect();
        let closure = self.complex.closure(&self.complex.opening(&selected));
        self.complex.temporary_cell_set = closure;

        // Faces
        {
            let mut kfs = selection_cells.kfs.clone();
            self.uncut_cells_(&mut kfs);
            self.delete_cells_(&kfs, delete_isolated_vertices);
        }

        // Edges
        {
            let mut kes = selection_cells.kes.clone();
            self.uncut_cells_(&mut kes);
            if !kes.is_empty() {
                let mut star = self.classify_star_(&kes);
                self.uncut_cells_(&mut star.kfs);
                self.uncut_cells_(&mut kes);
            }
            self.delete_cells_(&kes, delete_isolated_vertices);
        }

        // Vertices
        {
            let mut kvs = selection_cells.kvs.clone();
            self.uncut_cells_(&mut kvs);
            if !kvs.is_empty() {
                let mut star = self.classify_star_(&kvs);
                self.uncut_cells_(&mut star.kes);
                self.uncut_cells_(&mut kvs);
            }
            if !kvs.is_empty() {
                let mut star = self.classify_star_(&kvs);
                self.uncut_cells_(&mut star.kfs);
                self.uncut_cells_(&mut star.kes);
                self.uncut_cells_(&mut kvs);
            }
            self.delete_cells_(&kvs, delete_isolated_vertices);
        }

        for &group in &selection.top_groups {
            self.destroy_childless_node_(group);
        }

        // Residual isolated vertices.
        let mut residual: Vec<NodeKey> = self
            .complex
            .temporary_cell_set
            .iter()
            .copied()
            .filter(|k| {
                self.complex
                    .find_cell(*k)
                    .is_some_and(|c| c.star.is_empty() && matches!(c.kind, CellKind::KeyVertex(_)))
            })
            .collect();
        residual.sort();
        for kv in residual {
            self.destroy_childless_node_(kv);
        }
    }

    /// Keeps in `cells` only the cells that still exist and could not be
    /// uncut.
    fn uncut_cells_(&mut self, cells: &mut Vec<NodeKey>) {
        let mut remaining = Vec::with_capacity(cells.len());
        for &cell in cells.iter() {
            let was_uncut = match self.complex.cell_type(cell) {
                None => true,
                Some(CellType::KeyVertex) => self.uncut_at_key_vertex(cell, false).success,
                Some(CellType::KeyEdge) => self.uncut_at_key_edge(cell).success,
                Some(_) => false,
            };
            if !was_uncut {
                remaining.push(cell);
            }
        }
        *cells = remaining;
    }

    fn classify_star_(&self, cells: &[NodeKey]) -> ClassifiedCells {
        let mut classified = ClassifiedCells::default();
        for &cell in cells {
            for s in self.star_(cell) {
                classified.insert(self.complex.cell_type(s), s);
            }
        }
        classified
    }

    fn delete_cells_(&mut self, cells: &[NodeKey], delete_isolated_vertices: bool) {
        let existing: Vec<NodeKey> = cells
            .iter()
            .copied()
            .filter(|c| self.complex.contains(*c))
            .collect();
        if !existing.is_empty() {
            self.delete_with_dependents_(&existing, delete_isolated_vertices, true);
        }
    }

    pub(crate) fn delete_with_dependents_(
        &mut self,
        nodes: &[NodeKey],
        delete_isolated_vertices: bool,
        try_repairing_star_cells: bool,
    ) {
        let root = self.complex.root;
        let mut doomed = DoomedNodes::default();
        for &node in nodes {
            if !self.complex.contains(node) {
                continue;
            }
            for descendant in self.complex.descendants(node) {
                doomed.insert(descendant);
            }
            if Some(node) != root {
                doomed.insert(node);
            }
        }
        self.delete_(doomed, delete_isolated_vertices, try_repairing_star_cells);
    }

    fn delete_(
        &mut self,
        mut doomed: DoomedNodes,
        delete_isolated_vertices: bool,
        try_repairing_star_cells: bool,
    ) {
        // Doom the star of every doomed cell, except faces which may be
        // repaired.
        let mut star_faces: Vec<NodeKey> = Vec::new();
        for node in doomed.list.clone() {
            for s in self.star_(node) {
                if self.complex.key_face(s).is_some() {
                    if !star_faces.contains(&s) {
                        star_faces.push(s);
                    }
                } else {
                    doomed.insert(s);
                }
            }
        }

        for kf in star_faces {
            if doomed.contains(kf) {
                continue;
            }
            if !try_repairing_star_cells {
                doomed.insert(kf);
                continue;
            }
            let repaired = self.repair_face_cycles_(kf, &doomed);
            if repaired.is_empty() {
                doomed.insert(kf);
            } else {
                for b in self.boundary_(kf) {
                    self.remove_from_boundary_(kf, b);
                }
                let cycles: Vec<KeyCycle> = repaired.into_iter().map(|r| r.cycle).collect();
                if let Some(face) = self.complex.key_face_mut(kf) {
                    face.cycles = cycles.clone();
                }
                for cycle in &cycles {
                    self.add_cycle_to_boundary_(kf, cycle);
                }
            }
        }

        // Remove doomed cells from the star of surviving boundary cells, and
        // detect vertices that become isolated.
        let mut isolated_key_vertices: Vec<NodeKey> = Vec::new();
        let mut isolated_inbetween_vertices: Vec<NodeKey> = Vec::new();
        for node in doomed.list.clone() {
            if self.complex.find_cell(node).is_none() {
                continue;
            }
            for b in self.boundary_(node) {
                if doomed.contains(b) {
                    continue;
                }
                let b_type = self.complex.cell_type(b);
                if delete_isolated_vertices
                    && b_type.is_some_and(|t| t.spatial_type() == CellSpatialType::Vertex)
                    && self.has_empty_star_(&doomed, b)
                {
                    match b_type {
                        Some(CellType::KeyVertex) => isolated_key_vertices.push(b),
                        Some(CellType::InbetweenVertex) => isolated_inbetween_vertices.push(b),
                        _ => {}
                    }
                    doomed.set.insert(b);
                    continue;
                }
                self.remove_star_entry_(b, node);
            }
            if let Some(cell) = self.complex.cell_mut(node) {
                cell.star.clear();
            }
        }

        // Isolated inbetween vertices may in turn isolate key vertices.
        if delete_isolated_vertices {
            for &iv in &isolated_inbetween_vertices {
                for kv in self.boundary_(iv) {
                    if doomed.contains(kv) {
                        continue;
                    }
                    if self.has_empty_star_(&doomed, kv) {
                        isolated_key_vertices.push(kv);
                        doomed.set.insert(kv);
                    } else {
                        self.remove_star_entry_(kv, iv);
                    }
                }
            }
            doomed.list.extend(isolated_key_vertices);
            doomed.list.extend(isolated_inbetween_vertices);
        }

        self.destroy_nodes_(&doomed.list);
    }

    fn has_empty_star_(&self, doomed: &DoomedNodes, cell: NodeKey) -> bool {
        self.star_(cell).iter().all(|s| doomed.contains(*s))
    }

    fn remove_star_entry_(&mut self, cell: NodeKey, star_cell: NodeKey) {
        if let Some(c) = self.complex.cell_mut(cell) {
            if let Some(i) = c.star.iter().position(|s| *s == star_cell) {
                c.star.remove(i);
            }
        }
        self.complex
            .record_modified_(cell, crate::diff::NodeModificationFlags::STAR_CHANGED);
    }

    /// Cycles of `kf` that survive the deletion of the doomed cells.
    fn repair_face_cycles_(&self, kf: NodeKey, doomed: &DoomedNodes) -> Vec<RepairedCycle> {
        let Some(face) = self.complex.key_face(kf) else {
            return Vec::new();
        };
        let original = face.cycles.clone();
        let mut repaired: Vec<RepairedCycle> = Vec::new();
        for (i, kc) in original.iter().enumerate() {
            if let Some(sv) = kc.steiner_vertex() {
                if !doomed.contains(sv) {
                    repaired.push(RepairedCycle {
                        cycle: kc.clone(),
                        original_index: i,
                        is_unchanged: true,
                    });
                }
                continue;
            }
            let mut cycle = kc.clone();
            let before = cycle.halfedges().len();
            cycle.halfedges_mut().retain(|h| !doomed.contains(h.edge));
            let is_unchanged = cycle.halfedges().len() == before;
            if is_unchanged || cycle.is_valid(self.complex) {
                repaired.push(RepairedCycle {
                    cycle,
                    original_index: i,
                    is_unchanged,
                });
            }
        }

        // A repaired cycle lying inside a modified original cycle, but not
        // inside that cycle's repaired version, was only there to be a hole
        // of the deleted part: drop it.
        let rule = WindingRule::Odd;
        let mut index = 0;
        while index < repaired.len() {
            let current = &repaired[index];
            let keep = match current.cycle.steiner_vertex() {
                Some(sv) => {
                    let pos = self.complex.key_vertex(sv).map(|v| v.position());
                    pos.map_or(true, |pos| {
                        original.iter().enumerate().all(|(i, orig)| {
                            let rc = repaired.iter().find(|r| r.original_index == i);
                            if rc.is_some_and(|r| r.is_unchanged) {
                                return true;
                            }
                            if !rule.is_inside(orig.winding_number_at(self.complex, &pos)) {
                                return true;
                            }
                            rc.is_some_and(|r| rule.is_inside(r.cycle.winding_number_at(self.complex, &pos)))
                        })
                    })
                }
                None => {
                    let samples = current
                        .cycle
                        .sample_uniformly(self.complex, NUM_SAMPLES_PER_CONTAIN_TEST);
                    let ratio = |cycle: &KeyCycle| {
                        if samples.is_empty() {
                            return 0.0;
                        }
                        let inside = samples
                            .iter()
                            .filter(|p| rule.is_inside(cycle.winding_number_at(self.complex, p)))
                            .count();
                        inside as f64 / samples.len() as f64
                    };
                    original.iter().enumerate().all(|(i, orig)| {
                        let rc = repaired.iter().find(|r| r.original_index == i);
                        if rc.is_some_and(|r| r.is_unchanged) {
                            return true;
                        }
                        if ratio(orig) <= CONTAIN_RATIO_THRESHOLD {
                            return true;
                        }
                        rc.is_some_and(|r| ratio(&r.cycle) > CONTAIN_RATIO_THRESHOLD)
                    })
                }
            };
            if keep {
                index += 1;
            } else {
                let removed = repaired.remove(index);
                if removed.cycle.steiner_vertex().is_none() {
                    // Earlier cycles may have been saved by this one.
                    index = 0;
                }
            }
        }
        repaired
    }
}
