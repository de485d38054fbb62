// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Glue (merge several cells into one) and unglue (split a cell used
//! several times into one cell per use).

use nalgebra::Point2;

use super::Operations;
use crate::cycle::{KeyCycle, KeyHalfedge};
use crate::data::KeyEdgeData;
use crate::keys::NodeKey;
use crate::node::CellKind;

/// Samples per edge used to choose edge directions when gluing open edges.
const NUM_OPEN_GLUE_SAMPLES: usize = 10;

/// Samples per edge used to choose directions and start offsets when gluing
/// closed edges.
const NUM_CLOSED_GLUE_SAMPLES: usize = 100;
const CLOSED_GLUE_COST_STRIDE: usize = 10;

/// Outcome of [`Operations::unglue_key_edges`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnglueKeyEdgesResult {
    pub success: bool,
    /// One edge per former use. The input edge itself if it was used at most
    /// once.
    pub edges: Vec<NodeKey>,
}

/// Outcome of [`Operations::unglue_key_vertices`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnglueKeyVerticesResult {
    pub success: bool,
    /// One vertex per former use. The input vertex itself if it was used at
    /// most once.
    pub vertices: Vec<NodeKey>,
    /// Incident edges that had to be unglued first, with their replacements.
    pub unglued_edges: Vec<(NodeKey, Vec<NodeKey>)>,
}

/// Sum of squared distances between two sample lists, the second one read
/// through `index`.
fn matching_cost(a: &[Point2<f64>], b: &[Point2<f64>], index: impl Fn(usize) -> usize) -> f64 {
    a.iter()
        .enumerate()
        .map(|(i, p)| (b[index(i)] - p).norm_squared())
        .sum()
}

impl Operations<'_> {
    /// Glues the given vertices into a new vertex at `position`.
    ///
    /// The new vertex is inserted above the top-most input vertex. If all
    /// inputs are the same vertex, it is moved instead.
    pub fn glue_key_vertices(&mut self, kvs: &[NodeKey], position: Point2<f64>) -> Option<NodeKey> {
        let kv0 = *kvs.first()?;
        if kvs.iter().all(|kv| *kv == kv0) {
            self.set_key_vertex_position(kv0, position);
            return Some(kv0);
        }
        tracing::trace!(count = kvs.len(), "glue_key_vertices");

        let top = self.complex.find_top_most(kvs)?;
        let parent = self.parent_of_(top)?;
        let next = self.next_sibling_of_(top);
        let time = self.time_of_(kv0);
        let new_kv = self.create_key_vertex(position, parent, next, time)?;

        let mut seen: Vec<NodeKey> = Vec::with_capacity(kvs.len());
        for &kv in kvs {
            if seen.contains(&kv) {
                continue;
            }
            seen.push(kv);
            self.substitute_vertex_(kv, new_kv);
            self.hard_delete(&[kv], false);
        }
        Some(new_kv)
    }

    /// Glues open edges, choosing their relative directions so that the
    /// glued edges are as close as possible.
    pub fn glue_key_open_edges(&mut self, kes: &[NodeKey]) -> Option<NodeKey> {
        match kes {
            [] => None,
            [ke] => Some(*ke),
            _ => {
                let directions = self.open_glue_directions_(kes)?;
                let khs: Vec<KeyHalfedge> = kes
                    .iter()
                    .zip(directions)
                    .map(|(ke, dir)| KeyHalfedge::new(*ke, dir))
                    .collect();
                self.glue_key_open_halfedges(&khs)
            }
        }
    }

    fn open_glue_directions_(&self, kes: &[NodeKey]) -> Option<Vec<bool>> {
        let n = kes.len();
        let mut edges = Vec::with_capacity(n);
        for &ke in kes {
            let edge = self.complex.key_edge(ke)?;
            if edge.is_closed() {
                return None;
            }
            edges.push(edge);
        }

        // Two edges sharing exactly one end: their topology decides.
        if n == 2 {
            let is_loop = |e: &&crate::node::KeyEdge| e.start_vertex() == e.end_vertex();
            if !edges.iter().any(is_loop) {
                let (s0, e0) = (edges[0].start_vertex(), edges[0].end_vertex());
                let (s1, e1) = (edges[1].start_vertex(), edges[1].end_vertex());
                let shared00 = s0 == s1;
                let shared11 = e0 == e1;
                let shared01 = s0 == e1;
                let shared10 = e0 == s1;
                if shared00 != shared11 {
                    return Some(vec![true, true]);
                }
                if shared01 != shared10 {
                    return Some(vec![true, false]);
                }
            }
        }

        // Otherwise, greedy choice against each edge taken as reference.
        let samples: Vec<Vec<Point2<f64>>> = edges
            .iter()
            .map(|e| e.data().stroke().sample_uniform(NUM_OPEN_GLUE_SAMPLES))
            .collect();
        let m = NUM_OPEN_GLUE_SAMPLES;
        let mut best_directions = vec![true; n];
        let mut best_cost = f64::INFINITY;
        for i in 0..n {
            let mut directions = vec![true; n];
            let mut total = 0.0;
            for j in 0..n {
                if j == i {
                    continue;
                }
                let same = matching_cost(&samples[i], &samples[j], |k| k);
                let reversed = matching_cost(&samples[i], &samples[j], |k| m - 1 - k);
                if same <= reversed {
                    total += same;
                } else {
                    directions[j] = false;
                    total += reversed;
                }
            }
            if total < best_cost {
                best_cost = total;
                best_directions = directions;
            }
        }
        Some(best_directions)
    }

    /// Glues open halfedges: their start vertices are glued together, their
    /// end vertices are glued together, and the edges are replaced by one
    /// edge whose geometry is the average of the oriented inputs.
    pub fn glue_key_open_halfedges(&mut self, khs: &[KeyHalfedge]) -> Option<NodeKey> {
        match khs {
            [] => return None,
            [kh] if kh.direction => return Some(kh.edge),
            _ => {}
        }
        tracing::trace!(count = khs.len(), "glue_key_open_halfedges");

        let mut data = {
            let mut khds: Vec<(&KeyEdgeData, bool)> = Vec::with_capacity(khs.len());
            for kh in khs {
                let edge = self.complex.key_edge(kh.edge)?;
                if edge.is_closed() {
                    return None;
                }
                khds.push((edge.data(), kh.direction));
            }
            KeyEdgeData::from_glue_open(&khds)
        };
        let start_position = data.stroke().start_point();
        let mut end_position = data.stroke().end_point();

        let start_kvs: Vec<NodeKey> = khs
            .iter()
            .map(|kh| kh.start_vertex(self.complex))
            .collect::<Option<_>>()?;
        let mut start_kv = self.glue_key_vertices(&start_kvs, start_position)?;

        let end_kvs: Vec<NodeKey> = khs
            .iter()
            .map(|kh| kh.end_vertex(self.complex))
            .collect::<Option<_>>()?;
        let collapses = end_kvs.contains(&start_kv);
        if collapses {
            end_position = nalgebra::center(&start_position, &end_position);
            let snap = self.complex.settings.snap;
            data.snap(end_position, end_position, &snap);
        }
        let end_kv = self.glue_key_vertices(&end_kvs, end_position)?;
        if collapses {
            start_kv = end_kv;
        }

        let edges: Vec<NodeKey> = khs.iter().map(|kh| kh.edge).collect();
        let top = self.complex.find_top_most(&edges)?;
        let parent = self.parent_of_(top)?;
        let next = self.next_sibling_of_(top);
        let new_ke = self.create_key_open_edge(start_kv, end_kv, data, parent, next)?;

        let new_kh = KeyHalfedge::new(new_ke, true);
        for kh in khs {
            self.substitute_edge_(*kh, new_kh);
            self.hard_delete(&[kh.edge], true);
        }
        Some(new_ke)
    }

    /// Glues closed edges, choosing their relative directions and start
    /// offsets so that the glued edges are as close as possible.
    pub fn glue_key_closed_edges(&mut self, kes: &[NodeKey]) -> Option<NodeKey> {
        match kes {
            [] => None,
            [ke] => Some(*ke),
            _ => {
                let samples = self.closed_glue_samples_(kes.iter().map(|ke| KeyHalfedge::new(*ke, true)))?;
                let n = NUM_CLOSED_GLUE_SAMPLES;
                let mut best: Option<(f64, Vec<bool>, Vec<f64>)> = None;
                for i in 0..kes.len() {
                    let mut directions = vec![true; kes.len()];
                    let mut offsets = vec![0.0; kes.len()];
                    let mut total = 0.0;
                    for j in 0..kes.len() {
                        if j == i {
                            continue;
                        }
                        let mut best_j: Option<(f64, bool, usize)> = None;
                        for shift in 0..n {
                            let same = closed_cost(&samples[i], &samples[j], |s| (s + shift) % n);
                            let reversed =
                                closed_cost(&samples[i], &samples[j], |s| (n - (s + shift) % n) % n);
                            for (cost, dir) in [(same, true), (reversed, false)] {
                                if best_j.map_or(true, |(c, _, _)| cost < c) {
                                    best_j = Some((cost, dir, shift));
                                }
                            }
                        }
                        if let Some((cost, dir, shift)) = best_j {
                            total += cost;
                            directions[j] = dir;
                            // The reversed stroke keeps its start point, so
                            // the shift is an offset along either orientation.
                            offsets[j] = shift as f64 / n as f64;
                        }
                    }
                    if best.as_ref().map_or(true, |(c, _, _)| total < *c) {
                        best = Some((total, directions, offsets));
                    }
                }
                let (_, directions, offsets) = best?;
                let khs: Vec<KeyHalfedge> = kes
                    .iter()
                    .zip(directions)
                    .map(|(ke, dir)| KeyHalfedge::new(*ke, dir))
                    .collect();
                self.glue_closed_(&khs, &offsets)
            }
        }
    }

    /// Glues closed halfedges with the given directions, choosing only the
    /// start offsets.
    pub fn glue_key_closed_halfedges(&mut self, khs: &[KeyHalfedge]) -> Option<NodeKey> {
        match khs {
            [] => None,
            [kh] if kh.direction => Some(kh.edge),
            _ => {
                let samples = self.closed_glue_samples_(khs.iter().copied())?;
                let n = NUM_CLOSED_GLUE_SAMPLES;
                let mut best: Option<(f64, Vec<f64>)> = None;
                for i in 0..khs.len() {
                    let mut offsets = vec![0.0; khs.len()];
                    let mut total = 0.0;
                    for j in 0..khs.len() {
                        if j == i {
                            continue;
                        }
                        let mut best_j: Option<(f64, usize)> = None;
                        for shift in 0..n {
                            let cost = closed_cost(&samples[i], &samples[j], |s| (s + shift) % n);
                            if best_j.map_or(true, |(c, _)| cost < c) {
                                best_j = Some((cost, shift));
                            }
                        }
                        if let Some((cost, shift)) = best_j {
                            total += cost;
                            offsets[j] = shift as f64 / n as f64;
                        }
                    }
                    if best.as_ref().map_or(true, |(c, _)| total < *c) {
                        best = Some((total, offsets));
                    }
                }
                let (_, offsets) = best?;
                self.glue_closed_(khs, &offsets)
            }
        }
    }

    /// Uniform samples of each oriented closed halfedge.
    fn closed_glue_samples_(&self, khs: impl Iterator<Item = KeyHalfedge>) -> Option<Vec<Vec<Point2<f64>>>> {
        let mut result = Vec::new();
        for kh in khs {
            let edge = self.complex.key_edge(kh.edge)?;
            if !edge.is_closed() {
                return None;
            }
            let stroke = edge.data().stroke().oriented(kh.direction);
            result.push(stroke.sample_uniform(NUM_CLOSED_GLUE_SAMPLES));
        }
        Some(result)
    }

    fn glue_closed_(&mut self, khs: &[KeyHalfedge], offsets: &[f64]) -> Option<NodeKey> {
        tracing::trace!(count = khs.len(), "glue_key_closed_halfedges");
        let data = {
            let mut khds: Vec<(&KeyEdgeData, bool)> = Vec::with_capacity(khs.len());
            for kh in khs {
                khds.push((self.complex.key_edge(kh.edge)?.data(), kh.direction));
            }
            KeyEdgeData::from_glue_closed(&khds, offsets)
        };
        let edges: Vec<NodeKey> = khs.iter().map(|kh| kh.edge).collect();
        let top = self.complex.find_top_most(&edges)?;
        let parent = self.parent_of_(top)?;
        let next = self.next_sibling_of_(top);
        let time = self.time_of_(khs[0].edge);
        let new_ke = self.create_key_closed_edge(data, parent, next, time)?;

        let new_kh = KeyHalfedge::new(new_ke, true);
        for kh in khs {
            self.substitute_edge_(*kh, new_kh);
            self.hard_delete(&[kh.edge], true);
        }
        Some(new_ke)
    }

    // --- Unglue ---

    fn duplicate_key_edge_(&mut self, ke: NodeKey) -> Option<NodeKey> {
        let edge = self.complex.key_edge(ke)?;
        let data = edge.data().clone();
        let (start, end, time) = (edge.start_vertex(), edge.end_vertex(), edge.time);
        let parent = self.parent_of_(ke)?;
        let next = self.next_sibling_of_(ke);
        match (start, end) {
            (Some(s), Some(e)) => self.create_key_open_edge(s, e, data, parent, next),
            _ => self.create_key_closed_edge(data, parent, next, time),
        }
    }

    /// Replaces an edge used several times by face cycles with one
    /// duplicate per use.
    pub fn unglue_key_edges(&mut self, ke: NodeKey) -> UnglueKeyEdgesResult {
        let Some(edge) = self.complex.key_edge(ke) else {
            return UnglueKeyEdgesResult::default();
        };
        let is_closed = edge.is_closed();
        if self.complex.count_edge_uses(ke) <= 1 {
            return UnglueKeyEdgesResult {
                success: true,
                edges: vec![ke],
            };
        }
        let star = self.star_(ke);
        if star.iter().any(|s| self.complex.key_face(*s).is_none()) {
            tracing::debug!(?ke, "unglue_key_edges: temporal star is not supported");
            return UnglueKeyEdgesResult::default();
        }
        tracing::trace!(?ke, "unglue_key_edges");

        let mut edges = Vec::new();
        for kf in star {
            let Some(mut cycles) = self.complex.key_face(kf).map(|f| f.cycles.clone()) else {
                continue;
            };
            for cycle in &mut cycles {
                if cycle.steiner_vertex().is_some() {
                    continue;
                }
                if is_closed {
                    if cycle.first().map(|h| h.edge) != Some(ke) {
                        continue;
                    }
                    let Some(new_ke) = self.duplicate_key_edge_(ke) else {
                        continue;
                    };
                    for h in cycle.halfedges_mut().iter_mut() {
                        h.edge = new_ke;
                    }
                    self.add_to_boundary_(kf, new_ke);
                    edges.push(new_ke);
                } else {
                    for i in 0..cycle.halfedges().len() {
                        if cycle.halfedges()[i].edge != ke {
                            continue;
                        }
                        let Some(new_ke) = self.duplicate_key_edge_(ke) else {
                            continue;
                        };
                        cycle.halfedges_mut()[i].edge = new_ke;
                        self.add_to_boundary_(kf, new_ke);
                        edges.push(new_ke);
                    }
                }
            }
            if let Some(face) = self.complex.key_face_mut(kf) {
                face.cycles = cycles;
            }
            self.remove_from_boundary_(kf, ke);
        }

        self.hard_delete(&[ke], false);
        UnglueKeyEdgesResult { success: true, edges }
    }

    fn duplicate_key_vertex_(&mut self, kv: NodeKey) -> Option<NodeKey> {
        let position = self.vertex_position_(kv)?;
        let parent = self.parent_of_(kv)?;
        let next = self.next_sibling_of_(kv);
        let time = self.time_of_(kv);
        self.create_key_vertex(position, parent, next, time)
    }

    /// Replaces `kv` by `new_kv` as the start (`at_start`) or end vertex of
    /// the halfedge `khe`.
    fn substitute_halfedge_vertex_(&mut self, khe: KeyHalfedge, at_start: bool, kv: NodeKey, new_kv: NodeKey) {
        let Some(edge) = self.complex.key_edge_mut(khe.edge) else {
            return;
        };
        let other = if khe.direction == at_start {
            edge.start_vertex = Some(new_kv);
            edge.end_vertex
        } else {
            edge.end_vertex = Some(new_kv);
            edge.start_vertex
        };
        if other != Some(kv) {
            self.remove_from_boundary_(khe.edge, kv);
        }
        self.add_to_boundary_(khe.edge, new_kv);
    }

    /// Replaces a vertex used several times with one duplicate per use.
    /// Incident edges used several times are unglued first.
    pub fn unglue_key_vertices(&mut self, kv: NodeKey) -> UnglueKeyVerticesResult {
        let mut result = UnglueKeyVerticesResult::default();
        if self.complex.key_vertex(kv).is_none() {
            return result;
        }
        if self.complex.count_vertex_uses(kv) <= 1 {
            result.success = true;
            result.vertices.push(kv);
            return result;
        }
        let is_temporal = self.star_(kv).iter().any(|s| {
            self.complex
                .cell_type(*s)
                .is_some_and(|t| t.temporal_type() == crate::keys::CellTemporalType::Inbetween)
        });
        if is_temporal {
            tracing::debug!(?kv, "unglue_key_vertices: temporal star is not supported");
            return result;
        }
        tracing::trace!(?kv, "unglue_key_vertices");

        for ke in self.star_(kv) {
            if self.complex.key_edge(ke).is_none() {
                continue;
            }
            let res = self.unglue_key_edges(ke);
            if res.edges.len() > 1 {
                result.unglued_edges.push((ke, res.edges));
            }
        }

        for cell in self.star_(kv) {
            let Some(kind) = self.complex.find_cell(cell).map(|c| &c.kind) else {
                continue;
            };
            match kind {
                CellKind::KeyEdge(edge) => {
                    let has_face = self.star_(cell).iter().any(|s| self.complex.key_face(*s).is_some());
                    if has_face {
                        continue;
                    }
                    let (is_start, is_end) = (edge.is_start_vertex(kv), edge.is_end_vertex(kv));
                    if is_start {
                        if let Some(new_kv) = self.duplicate_key_vertex_(kv) {
                            if let Some(edge) = self.complex.key_edge_mut(cell) {
                                edge.start_vertex = Some(new_kv);
                            }
                            self.add_to_boundary_(cell, new_kv);
                            result.vertices.push(new_kv);
                        }
                    }
                    if is_end {
                        if let Some(new_kv) = self.duplicate_key_vertex_(kv) {
                            if let Some(edge) = self.complex.key_edge_mut(cell) {
                                edge.end_vertex = Some(new_kv);
                            }
                            self.add_to_boundary_(cell, new_kv);
                            result.vertices.push(new_kv);
                        }
                    }
                    self.remove_from_boundary_(cell, kv);
                }
                CellKind::KeyFace(face) => {
                    let num_cycles = face.cycles.len();
                    for ci in 0..num_cycles {
                        let Some(cycle) = self.complex.key_face(cell).and_then(|f| f.cycles.get(ci)).cloned() else {
                            continue;
                        };
                        if cycle.steiner_vertex() == Some(kv) {
                            let Some(new_kv) = self.duplicate_key_vertex_(kv) else {
                                continue;
                            };
                            if let Some(face) = self.complex.key_face_mut(cell) {
                                face.cycles[ci] = KeyCycle::from_steiner_vertex(new_kv);
                            }
                            self.add_to_boundary_(cell, new_kv);
                            result.vertices.push(new_kv);
                            continue;
                        }
                        let halfedges = cycle.halfedges();
                        let n = halfedges.len();
                        for i in 0..n {
                            let khe1 = halfedges[i];
                            if khe1.start_vertex(self.complex) != Some(kv) {
                                continue;
                            }
                            let khe0 = halfedges[(i + n - 1) % n];
                            let Some(new_kv) = self.duplicate_key_vertex_(kv) else {
                                continue;
                            };
                            self.substitute_halfedge_vertex_(khe0, false, kv, new_kv);
                            self.substitute_halfedge_vertex_(khe1, true, kv, new_kv);
                            self.add_to_boundary_(cell, new_kv);
                            result.vertices.push(new_kv);
                        }
                    }
                    self.remove_from_boundary_(cell, kv);
                }
                CellKind::KeyVertex(_)
                | CellKind::InbetweenVertex(_)
                | CellKind::InbetweenEdge(_)
                | CellKind::InbetweenFace(_) => {}
            }
        }

        self.hard_delete(&[kv], false);
        result.success = true;
        result
    }
}

/// Cost of matching the evenly spaced subset of `a` against `b` read
/// through `index`.
fn closed_cost(a: &[Point2<f64>], b: &[Point2<f64>], index: impl Fn(usize) -> usize) -> f64 {
    (0..a.len() / CLOSED_GLUE_COST_STRIDE)
        .map(|c| {
            let s = c * CLOSED_GLUE_COST_STRIDE;
            (b[index(s)] - a[s]).norm_squared()
        })
        .sum()
}
