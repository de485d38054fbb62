// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Uncut: removing a vertex or an edge while merging the cells around it,
//! and simplification built on top of it.

use rustc_hash::FxHashSet;

use super::Operations;
use crate::cycle::{KeyCycle, KeyHalfedge};
use crate::data::{KeyEdgeData, KeyFaceData};
use crate::keys::NodeKey;
use crate::node::CellKind;

/// Outcome of [`Operations::uncut_at_key_vertex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UncutAtKeyVertexResult {
    pub success: bool,
    /// Edge resulting from the merge of the two incident edges, or the
    /// closed edge replacing a loop.
    pub result_ke: Option<NodeKey>,
    /// Face from which a Steiner vertex was removed.
    pub result_kf: Option<NodeKey>,
    pub removed_ke_id1: Option<NodeKey>,
    pub removed_ke_id2: Option<NodeKey>,
}

/// Outcome of [`Operations::uncut_at_key_edge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UncutAtKeyEdgeResult {
    pub success: bool,
    /// Face resulting from the merge, or the face that used the edge twice.
    pub result_kf: Option<NodeKey>,
    pub removed_kf_id1: Option<NodeKey>,
    pub removed_kf_id2: Option<NodeKey>,
}

/// How a vertex can be uncut.
#[derive(Debug, Clone, Copy)]
enum VertexUncut {
    /// The vertex is the Steiner vertex of one face cycle.
    Steiner { kf: NodeKey, cycle_index: usize },
    /// The vertex is the only vertex of a loop edge.
    Loop { ke: NodeKey },
    /// The vertex joins two edges: `khe1` ends at it, `khe2` starts at it.
    Concat { khe1: KeyHalfedge, khe2: KeyHalfedge },
}

/// A use of an edge in a face cycle.
#[derive(Debug, Clone, Copy)]
struct EdgeUse {
    kf: NodeKey,
    cycle_index: usize,
    component_index: usize,
}

impl Operations<'_> {
    /// Removes `kv`, merging its two incident edges into one (or turning its
    /// loop edge into a closed edge, or removing it from the face it is the
    /// Steiner vertex of).
    pub fn uncut_at_key_vertex(&mut self, kv: NodeKey, smooth_join: bool) -> UncutAtKeyVertexResult {
        let mut result = UncutAtKeyVertexResult::default();
        let Some(info) = self.prepare_uncut_at_key_vertex_(kv) else {
            return result;
        };
        tracing::trace!(?kv, ?info, "uncut_at_key_vertex");

        match info {
            VertexUncut::Steiner { kf, cycle_index } => {
                if let Some(face) = self.complex.key_face_mut(kf) {
                    face.cycles.remove(cycle_index);
                }
                self.remove_from_boundary_(kf, kv);
                result.result_kf = Some(kf);
            }
            VertexUncut::Loop { ke } => {
                let Some(old) = self.complex.key_edge(ke) else {
                    return result;
                };
                let mut data = old.data().clone();
                let time = old.time;
                data.close_stroke(smooth_join);
                let parent = self.parent_of_(ke);
                let next = self.next_sibling_of_(ke);
                let Some(parent) = parent else {
                    return result;
                };
                let Some(new_ke) = self.create_key_closed_edge(data, parent, next, time) else {
                    return result;
                };
                self.substitute_edge_(KeyHalfedge::new(ke, true), KeyHalfedge::new(new_ke, true));
                for cell in self.star_(kv) {
                    self.remove_from_boundary_(cell, kv);
                }
                self.hard_delete(&[ke], false);
                result.result_ke = Some(new_ke);
                result.removed_ke_id1 = Some(ke);
            }
            VertexUncut::Concat { khe1, khe2 } => {
                let (Some(kv1), Some(kv2)) = (
                    khe1.start_vertex(self.complex),
                    khe2.end_vertex(self.complex),
                ) else {
                    return result;
                };
                let (Some(e1), Some(e2)) = (
                    self.complex.key_edge(khe1.edge),
                    self.complex.key_edge(khe2.edge),
                ) else {
                    return result;
                };
                let data = KeyEdgeData::from_concat_step(
                    (e1.data(), khe1.direction),
                    (e2.data(), khe2.direction),
                    smooth_join,
                );
                let Some(bottom) = self.complex.find_bottom_most(&[khe1.edge, khe2.edge]) else {
                    return result;
                };
                let Some(parent) = self.parent_of_(bottom) else {
                    return result;
                };
                let Some(new_ke) = self.create_key_open_edge(kv1, kv2, data, parent, Some(bottom)) else {
                    return result;
                };

                for kf in self.star_(khe1.edge) {
                    let Some(face) = self.complex.key_face_mut(kf) else {
                        continue;
                    };
                    for cycle in &mut face.cycles {
                        if cycle.steiner_vertex().is_some() {
                            continue;
                        }
                        let halfedges = cycle.halfedges_mut();
                        halfedges.retain(|h| h.edge != khe2.edge);
                        for h in halfedges.iter_mut() {
                            if h.edge == khe1.edge {
                                *h = KeyHalfedge::new(new_ke, h.direction == khe1.direction);
                            }
                        }
                    }
                    self.remove_from_boundary_(kf, khe1.edge);
                    self.remove_from_boundary_(kf, khe2.edge);
                    self.remove_from_boundary_(kf, kv);
                    self.add_to_boundary_(kf, new_ke);
                }

                self.hard_delete(&[khe1.edge], false);
                self.hard_delete(&[khe2.edge], false);
                result.result_ke = Some(new_ke);
                result.removed_ke_id1 = Some(khe1.edge);
                result.removed_ke_id2 = Some(khe2.edge);
            }
        }

        self.hard_delete(&[kv], false);
        result.success = true;
        result
    }

    fn prepare_uncut_at_key_vertex_(&self, kv: NodeKey) -> Option<VertexUncut> {
        let star = self.star_(kv);
        let mut khe1: Option<KeyHalfedge> = None;
        let mut khe2: Option<KeyHalfedge> = None;
        let mut steiner: Option<(NodeKey, usize)> = None;

        for &cell in &star {
            match &self.complex.find_cell(cell)?.kind {
                CellKind::KeyEdge(ke) => {
                    if ke.is_start_vertex(kv) {
                        if khe1.is_none() {
                            khe1 = Some(KeyHalfedge::new(cell, false));
                        } else if khe2.is_none() {
                            khe2 = Some(KeyHalfedge::new(cell, true));
                        } else {
                            return None;
                        }
                    }
                    if ke.is_end_vertex(kv) {
                        if khe1.is_none() {
                            khe1 = Some(KeyHalfedge::new(cell, true));
                        } else if khe2.is_none() {
                            khe2 = Some(KeyHalfedge::new(cell, false));
                        } else {
                            return None;
                        }
                    }
                }
                CellKind::KeyFace(kf) => {
                    for (i, cycle) in kf.cycles.iter().enumerate() {
                        if cycle.steiner_vertex() == Some(kv) {
                            if steiner.is_some() {
                                return None;
                            }
                            steiner = Some((cell, i));
                        }
                    }
                }
                CellKind::InbetweenVertex(_) => return None,
                CellKind::KeyVertex(_) | CellKind::InbetweenEdge(_) | CellKind::InbetweenFace(_) => {}
            }
        }

        match (khe1, khe2, steiner) {
            (Some(khe1), Some(khe2), None) if khe1.edge != khe2.edge => {
                // Faces must not make a u-turn at the vertex.
                for &cell in &star {
                    let Some(kf) = self.complex.key_face(cell) else {
                        continue;
                    };
                    for cycle in &kf.cycles {
                        let Some(last) = cycle.halfedges().last() else {
                            continue;
                        };
                        let mut previous = last.edge;
                        for h in cycle.halfedges() {
                            if h.edge == previous && h.start_vertex(self.complex) == Some(kv) {
                                return None;
                            }
                            previous = h.edge;
                        }
                    }
                }
                Some(VertexUncut::Concat { khe1, khe2 })
            }
            (Some(khe1), Some(_), None) => {
                // Closing a loop is only possible if every cycle using it
                // goes around it in one direction.
                for &cell in &star {
                    let Some(kf) = self.complex.key_face(cell) else {
                        continue;
                    };
                    for cycle in &kf.cycles {
                        let Some(first) = cycle.first() else { continue };
                        if first.edge != khe1.edge {
                            continue;
                        }
                        if cycle.halfedges().iter().any(|h| h.direction != first.direction) {
                            return None;
                        }
                    }
                }
                Some(VertexUncut::Loop { ke: khe1.edge })
            }
            (None, None, Some((kf, cycle_index))) => Some(VertexUncut::Steiner { kf, cycle_index }),
            _ => None,
        }
    }

    /// Removes `ke`, merging the one or two faces on its sides.
    ///
    /// The edge must be used exactly twice by face cycles.
    pub fn uncut_at_key_edge(&mut self, ke: NodeKey) -> UncutAtKeyEdgeResult {
        let mut result = UncutAtKeyEdgeResult::default();
        let Some((use1, use2)) = self.prepare_uncut_at_key_edge_(ke) else {
            return result;
        };
        let Some(edge) = self.complex.key_edge(ke) else {
            return result;
        };
        tracing::trace!(?ke, closed = edge.is_closed(), "uncut_at_key_edge");

        let ok = if edge.is_closed() {
            self.uncut_closed_edge_(ke, use1, use2, &mut result)
        } else {
            self.uncut_open_edge_(ke, use1, use2, &mut result)
        };
        if !ok {
            return result;
        }

        self.hard_delete(&[ke], false);
        result.success = true;
        result
    }

    fn prepare_uncut_at_key_edge_(&self, ke: NodeKey) -> Option<(EdgeUse, EdgeUse)> {
        let mut uses: Vec<EdgeUse> = Vec::new();
        for cell in self.star_(ke) {
            match &self.complex.find_cell(cell)?.kind {
                CellKind::KeyFace(kf) => {
                    for (ci, cycle) in kf.cycles.iter().enumerate() {
                        if cycle.steiner_vertex().is_some() {
                            continue;
                        }
                        for (j, h) in cycle.halfedges().iter().enumerate() {
                            if h.edge != ke {
                                continue;
                            }
                            if uses.len() == 2 {
                                return None;
                            }
                            uses.push(EdgeUse {
                                kf: cell,
                                cycle_index: ci,
                                component_index: j,
                            });
                        }
                    }
                }
                CellKind::InbetweenEdge(_) | CellKind::InbetweenFace(_) => return None,
                _ => {}
            }
        }
        match uses.as_slice() {
            [a, b] => Some((*a, *b)),
            _ => None,
        }
    }

    fn uncut_closed_edge_(
        &mut self,
        ke: NodeKey,
        use1: EdgeUse,
        use2: EdgeUse,
        result: &mut UncutAtKeyEdgeResult,
    ) -> bool {
        let uses_edge = |c: &KeyCycle| c.first().is_some_and(|h| h.edge == ke);
        if use1.kf == use2.kf {
            let kf = use1.kf;
            if let Some(face) = self.complex.key_face_mut(kf) {
                face.cycles.retain(|c| !uses_edge(c));
            }
            self.remove_from_boundary_(kf, ke);
            result.result_kf = Some(kf);
            return true;
        }

        let mut cycles: Vec<KeyCycle> = Vec::new();
        for kf in [use1.kf, use2.kf] {
            if let Some(face) = self.complex.key_face(kf) {
                cycles.extend(face.cycles.iter().filter(|c| !uses_edge(c)).cloned());
            }
        }
        self.merge_faces_(use1.kf, use2.kf, cycles, result)
    }

    fn uncut_open_edge_(
        &mut self,
        ke: NodeKey,
        use1: EdgeUse,
        use2: EdgeUse,
        result: &mut UncutAtKeyEdgeResult,
    ) -> bool {
        let Some(cycle1) = self.cycle_(use1.kf, use1.cycle_index) else {
            return false;
        };
        let Some(cycle2) = self.cycle_(use2.kf, use2.cycle_index) else {
            return false;
        };
        let i1 = use1.component_index;
        let i2 = use2.component_index;
        let d1 = cycle1.halfedges()[i1].direction;
        let d2 = cycle2.halfedges()[i2].direction;

        if use1.kf == use2.kf && use1.cycle_index == use2.cycle_index {
            // Both uses in the same cycle: it splits into one or two cycles.
            let kf = use1.kf;
            let mut p1 = cycle1.sub_path(self.complex, i1 + 1, i2, false);
            let p2 = cycle1.sub_path(self.complex, i2 + 1, i1, false);
            let mut new_cycles: Vec<KeyCycle> = Vec::new();
            if d1 == d2 {
                p1.extend_reversed(&p2);
                new_cycles.push(KeyCycle::from_path(p1));
            } else {
                new_cycles.push(KeyCycle::from_path(p1));
                new_cycles.push(KeyCycle::from_path(p2));
            }
            if let Some(face) = self.complex.key_face_mut(kf) {
                face.cycles.remove(use1.cycle_index);
                face.cycles.extend(new_cycles);
            }
            self.remove_from_boundary_(kf, ke);
            self.rebuild_face_boundary_(kf);
            result.result_kf = Some(kf);
            return true;
        }

        // Uses in two different cycles: they are spliced into one.
        let mut p1 = cycle1.sub_path(self.complex, i1 + 1, i1, false);
        let p2 = cycle2.sub_path(self.complex, i2 + 1, i2, false);
        if d1 == d2 {
            p1.extend_reversed(&p2);
        } else {
            p1.extend(&p2);
        }
        let spliced = KeyCycle::from_path(p1);

        if use1.kf == use2.kf {
            let kf = use1.kf;
            if let Some(face) = self.complex.key_face_mut(kf) {
                let (a, b) = if use1.cycle_index > use2.cycle_index {
                    (use1.cycle_index, use2.cycle_index)
                } else {
                    (use2.cycle_index, use1.cycle_index)
                };
                face.cycles.remove(a);
                face.cycles.remove(b);
                face.cycles.push(spliced);
            }
            self.remove_from_boundary_(kf, ke);
            self.rebuild_face_boundary_(kf);
            result.result_kf = Some(kf);
            return true;
        }

        let mut cycles: Vec<KeyCycle> = Vec::new();
        for u in [use1, use2] {
            if let Some(face) = self.complex.key_face(u.kf) {
                cycles.extend(
                    face.cycles
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != u.cycle_index)
                        .map(|(_, c)| c.clone()),
                );
            }
        }
        cycles.push(spliced);
        self.merge_faces_(use1.kf, use2.kf, cycles, result)
    }

    /// Replaces two faces by a new face with the given cycles, placed at
    /// the lower of the two.
    fn merge_faces_(
        &mut self,
        kf1: NodeKey,
        kf2: NodeKey,
        cycles: Vec<KeyCycle>,
        result: &mut UncutAtKeyEdgeResult,
    ) -> bool {
        let (Some(f1), Some(f2)) = (self.complex.key_face(kf1), self.complex.key_face(kf2)) else {
            return false;
        };
        let mut data = KeyFaceData::new();
        data.assign_from_concat_step(f1.data(), f2.data());
        let time = f1.time;
        let Some(bottom) = self.complex.find_bottom_most(&[kf1, kf2]) else {
            return false;
        };
        let Some(parent) = self.parent_of_(bottom) else {
            return false;
        };
        let Some(new_kf) = self.create_key_face(cycles, parent, Some(bottom), time) else {
            return false;
        };
        if let Some(face) = self.complex.key_face_mut(new_kf) {
            face.data = data;
        }
        self.hard_delete(&[kf1, kf2], false);
        result.result_kf = Some(new_kf);
        result.removed_kf_id1 = Some(kf1);
        result.removed_kf_id2 = Some(kf2);
        true
    }

    fn cycle_(&self, kf: NodeKey, index: usize) -> Option<KeyCycle> {
        self.complex.key_face(kf)?.cycles.get(index).cloned()
    }

    /// Uncuts the given edges then the given vertices where possible.
    ///
    /// Returns the vertices that could not be uncut, followed by the edges
    /// that remain: the ones that could not be uncut and the ones resulting
    /// from merges at vertices.
    pub fn simplify(&mut self, kvs: &[NodeKey], kes: &[NodeKey], smooth_joins: bool) -> Vec<NodeKey> {
        let mut result: Vec<NodeKey> = Vec::new();
        let mut result_edges: Vec<NodeKey> = Vec::new();

        for &ke in kes {
            if !self.complex.contains(ke) {
                continue;
            }
            if !self.uncut_at_key_edge(ke).success && !result_edges.contains(&ke) {
                result_edges.push(ke);
            }
        }

        for &kv in kvs {
            if !self.complex.contains(kv) {
                continue;
            }
            let res = self.uncut_at_key_vertex(kv, smooth_joins);
            if res.success {
                let removed: FxHashSet<NodeKey> =
                    [res.removed_ke_id1, res.removed_ke_id2].into_iter().flatten().collect();
                result_edges.retain(|e| !removed.contains(e));
                if let Some(ke) = res.result_ke {
                    if !result_edges.contains(&ke) {
                        result_edges.push(ke);
                    }
                }
            } else {
                result.push(kv);
            }
        }

        result.extend(result_edges.into_iter().filter(|e| self.complex.contains(*e)));
        result
    }
}
