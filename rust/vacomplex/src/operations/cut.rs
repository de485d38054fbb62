// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cut operations: splitting edges at vertices and splitting faces along
//! edges or vertices.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use super::Operations;
use crate::cycle::{KeyCycle, KeyFaceVertexUsageIndex, KeyHalfedge, KeyPath};
use crate::data::KeyEdgeData;
use crate::geometry::{self, WindingRule};
use crate::keys::NodeKey;
use crate::stroke::CurveParameter;

const NUM_SAMPLES_PER_CONTAIN_TEST: usize = 20;
const CONTAIN_RATIO_THRESHOLD: f64 = 0.5;

/// Distance of sector sample points from their vertex, relative to the size
/// of the face.
const SECTOR_POINT_RELATIVE_DELTA: f64 = 1e-6;

/// What to do when the two ends of a cutting edge lie on the same cycle (or
/// when cutting with a closed edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OneCycleCutPolicy {
    /// Mobius if the two sides of the cycle cross each other an odd number
    /// of times, Disk otherwise.
    #[default]
    Auto,
    /// The face is split into two faces.
    Disk,
    /// The face keeps a single cycle going twice along the edge.
    Mobius,
    /// The face keeps two cycles going along the edge in opposite
    /// directions.
    Torus,
}

/// What to do when the two ends of a cutting edge lie on two different
/// cycles: which of the two cycles are traversed backwards in the merged
/// cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TwoCycleCutPolicy {
    /// Chooses the option keeping the winding numbers around the edge ends
    /// as small as possible.
    #[default]
    Auto,
    ReverseNone,
    ReverseStart,
    ReverseEnd,
    ReverseBoth,
}

/// Outcome of [`Operations::cut_edge_at`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutEdgeResult {
    /// New edges, in order along the original edge.
    pub edges: Vec<NodeKey>,
    /// New vertices, in order along the original edge.
    pub vertices: Vec<NodeKey>,
}

/// Outcome of a face cut. When the face is not split, `face1` and `face2`
/// are both the modified face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutFaceResult {
    pub face1: NodeKey,
    pub edge: NodeKey,
    pub face2: NodeKey,
}

/// Winding numbers around the ends of a two-cycle cut, one per policy
/// (none, start, end, both reversed).
struct WindingSample {
    numbers: [i64; 4],
}

impl Operations<'_> {
    // --- Edge cuts ---

    /// Cuts an edge at one parameter. Cutting a closed edge turns it into a
    /// loop edge.
    pub fn cut_edge(&mut self, ke: NodeKey, param: CurveParameter) -> Option<CutEdgeResult> {
        self.cut_edge_at(ke, &[param])
    }

    /// Cuts an edge at several parameters, inserting one vertex at each.
    ///
    /// An open edge cut at `n` parameters gives `n + 1` edges. A closed edge
    /// gives `n` edges forming a loop through the new vertices. Face cycles
    /// using the edge are updated.
    pub fn cut_edge_at(&mut self, ke: NodeKey, params: &[CurveParameter]) -> Option<CutEdgeResult> {
        let edge = self.complex.key_edge(ke)?;
        let data = edge.data().clone();
        let is_closed = edge.is_closed();
        let (start_kv, end_kv, time) = (edge.start_vertex(), edge.end_vertex(), edge.time);

        let mut params = params.to_vec();
        params.sort_by(|a, b| a.to_scalar().total_cmp(&b.to_scalar()));
        params.dedup_by(|a, b| a.to_scalar() == b.to_scalar());
        if params.is_empty() {
            return Some(CutEdgeResult {
                edges: vec![ke],
                vertices: Vec::new(),
            });
        }
        tracing::trace!(?ke, num_params = params.len(), "cut_edge_at");

        let parent = self.parent_of_(ke)?;
        let next = self.next_sibling_of_(ke);
        let stroke = data.stroke().clone();

        // New vertices go above the edge, new edges take its place.
        let mut vertices = Vec::with_capacity(params.len());
        for p in &params {
            vertices.push(self.create_key_vertex(stroke.eval(*p), parent, next, time)?);
        }

        let mut edges = Vec::with_capacity(params.len() + 1);
        if is_closed {
            let n = params.len();
            let num_wraps = usize::from(n == 1);
            for i in 0..n {
                let slice = KeyEdgeData::from_slice(&data, params[i], params[(i + 1) % n], num_wraps);
                edges.push(self.create_key_open_edge(vertices[i], vertices[(i + 1) % n], slice, parent, Some(ke))?);
            }
        } else {
            let (start_kv, end_kv) = (start_kv?, end_kv?);
            let mut bounds = Vec::with_capacity(params.len() + 2);
            bounds.push(CurveParameter::new(0, 0.0));
            bounds.extend(params.iter().copied());
            bounds.push(stroke.end_parameter());
            let mut kvs = Vec::with_capacity(vertices.len() + 2);
            kvs.push(start_kv);
            kvs.extend(vertices.iter().copied());
            kvs.push(end_kv);
            for i in 0..bounds.len() - 1 {
                let slice = KeyEdgeData::from_slice(&data, bounds[i], bounds[i + 1], 0);
                edges.push(self.create_key_open_edge(kvs[i], kvs[i + 1], slice, parent, Some(ke))?);
            }
        }

        let forward: Vec<KeyHalfedge> = edges.iter().map(|e| KeyHalfedge::new(*e, true)).collect();
        let backward: Vec<KeyHalfedge> = edges.iter().rev().map(|e| KeyHalfedge::new(*e, false)).collect();
        let replacement = |h: &KeyHalfedge| -> Vec<KeyHalfedge> {
            if h.edge != ke {
                vec![*h]
            } else if h.direction {
                forward.clone()
            } else {
                backward.clone()
            }
        };

        for kf in self.star_(ke) {
            let Some(face) = self.complex.key_face_mut(kf) else {
                continue;
            };
            for cycle in &mut face.cycles {
                if cycle.steiner_vertex().is_some() {
                    continue;
                }
                let uses_edge = cycle.halfedges().iter().any(|h| h.edge == ke);
                if uses_edge {
                    let halfedges: Vec<KeyHalfedge> = cycle.halfedges().iter().flat_map(&replacement).collect();
                    *cycle.halfedges_mut() = halfedges;
                }
            }
            self.remove_from_boundary_(kf, ke);
            for &e in &edges {
                self.add_to_boundary_(kf, e);
            }
            for &v in &vertices {
                self.add_to_boundary_(kf, v);
            }
        }

        self.hard_delete(&[ke], false);
        Some(CutEdgeResult { edges, vertices })
    }

    // --- Face cuts with vertices ---

    /// Adds `kv` to `kf` as a Steiner vertex.
    pub fn cut_glue_face_with_vertex(&mut self, kf: NodeKey, kv: NodeKey) -> bool {
        self.complex.key_vertex(kv).is_some() && self.add_cycle_to_face(kf, KeyCycle::from_steiner_vertex(kv))
    }

    /// Creates a vertex at `position`, just above `kf`, and adds it to `kf`
    /// as a Steiner vertex.
    pub fn cut_face_with_vertex(&mut self, kf: NodeKey, position: Point2<f64>) -> Option<NodeKey> {
        self.complex.key_face(kf)?;
        let parent = self.parent_of_(kf)?;
        let next = self.next_sibling_of_(kf);
        let time = self.time_of_(kf);
        let kv = self.create_key_vertex(position, parent, next, time)?;
        self.cut_glue_face_with_vertex(kf, kv);
        Some(kv)
    }

    // --- Face cuts with edges ---

    /// Cuts `kf` with the existing edge `ke`.
    ///
    /// For an open edge, the first usage of each end vertex in the face
    /// cycles is used.
    pub fn cut_glue_face(
        &mut self,
        kf: NodeKey,
        ke: NodeKey,
        one_cycle_policy: OneCycleCutPolicy,
        two_cycle_policy: TwoCycleCutPolicy,
    ) -> Option<CutFaceResult> {
        let edge = self.complex.key_edge(ke)?;
        self.complex.key_face(kf)?;
        let khe = KeyHalfedge::new(ke, true);

        if !edge.is_closed() {
            let (start_kv, end_kv) = (edge.start_vertex()?, edge.end_vertex()?);
            let start_index = self.first_vertex_usage_(kf, start_kv)?;
            let end_index = self.first_vertex_usage_(kf, end_kv)?;
            return self.cut_glue_face_with_halfedge(kf, khe, start_index, end_index, one_cycle_policy, two_cycle_policy);
        }

        tracing::trace!(?kf, ?ke, ?one_cycle_policy, "cut_glue_face with closed edge");
        match one_cycle_policy {
            OneCycleCutPolicy::Auto | OneCycleCutPolicy::Disk => {
                let new_cycle = KeyCycle::from_halfedges(vec![khe]);
                let mut cycles1 = vec![new_cycle.clone()];
                let mut cycles2 = vec![new_cycle.reversed()];
                let old_cycles = self.complex.key_face(kf)?.cycles.clone();
                for cycle in old_cycles {
                    let ratio = new_cycle.interior_contained_ratio(
                        self.complex,
                        &cycle,
                        WindingRule::Odd,
                        NUM_SAMPLES_PER_CONTAIN_TEST,
                    );
                    if ratio > CONTAIN_RATIO_THRESHOLD {
                        cycles1.push(cycle);
                    } else {
                        cycles2.push(cycle);
                    }
                }
                self.split_face_(kf, ke, cycles1, cycles2)
            }
            OneCycleCutPolicy::Mobius => {
                self.add_cycle_to_face(kf, KeyCycle::from_halfedges(vec![khe, khe]));
                Some(CutFaceResult { face1: kf, edge: ke, face2: kf })
            }
            OneCycleCutPolicy::Torus => {
                let cycle = KeyCycle::from_halfedges(vec![khe]);
                self.add_cycle_to_face(kf, cycle.reversed());
                self.add_cycle_to_face(kf, cycle);
                Some(CutFaceResult { face1: kf, edge: ke, face2: kf })
            }
        }
    }

    fn first_vertex_usage_(&self, kf: NodeKey, kv: NodeKey) -> Option<KeyFaceVertexUsageIndex> {
        let face = self.complex.key_face(kf)?;
        for (i, cycle) in face.cycles.iter().enumerate() {
            if let Some(sv) = cycle.steiner_vertex() {
                if sv == kv {
                    return Some(KeyFaceVertexUsageIndex::new(i, 0));
                }
                continue;
            }
            for (j, h) in cycle.halfedges().iter().enumerate() {
                if h.start_vertex(self.complex) == Some(kv) {
                    return Some(KeyFaceVertexUsageIndex::new(i, j));
                }
            }
        }
        None
    }

    /// Cuts `kf` with the open halfedge `khe`, going from the face corner
    /// `start_index` to the face corner `end_index`.
    pub fn cut_glue_face_with_halfedge(
        &mut self,
        kf: NodeKey,
        khe: KeyHalfedge,
        start_index: KeyFaceVertexUsageIndex,
        end_index: KeyFaceVertexUsageIndex,
        one_cycle_policy: OneCycleCutPolicy,
        two_cycle_policy: TwoCycleCutPolicy,
    ) -> Option<CutFaceResult> {
        if khe.is_closed(self.complex) {
            return None;
        }
        let start_kv = self.complex.key_face_vertex(kf, start_index)?;
        let end_kv = self.complex.key_face_vertex(kf, end_index)?;
        if khe.start_vertex(self.complex) != Some(start_kv) || khe.end_vertex(self.complex) != Some(end_kv) {
            return None;
        }
        if start_index.cycle_index == end_index.cycle_index {
            self.cut_one_cycle_(kf, khe, start_index, end_index, one_cycle_policy)
        } else {
            self.cut_two_cycles_(kf, khe, start_index, end_index, two_cycle_policy)
        }
    }

    fn cut_one_cycle_(
        &mut self,
        kf: NodeKey,
        khe: KeyHalfedge,
        start_index: KeyFaceVertexUsageIndex,
        end_index: KeyFaceVertexUsageIndex,
        policy: OneCycleCutPolicy,
    ) -> Option<CutFaceResult> {
        let ci = start_index.cycle_index;
        let cycles = self.complex.key_face(kf)?.cycles.clone();
        let cycle = cycles.get(ci)?;

        // If one path must be empty, it is path2.
        let path1 = cycle.sub_path(self.complex, end_index.component_index, start_index.component_index, true);
        let path2 = cycle.sub_path(self.complex, start_index.component_index, end_index.component_index, false);

        let policy = match policy {
            OneCycleCutPolicy::Auto => {
                if self.paths_cross_odd_times_(&path1, &path2) {
                    OneCycleCutPolicy::Mobius
                } else {
                    OneCycleCutPolicy::Disk
                }
            }
            p => p,
        };
        tracing::trace!(?kf, ?policy, "cut_glue_face one-cycle");

        let new_cycle1 = {
            let mut path = path1.clone();
            path.append(khe);
            KeyCycle::from_path(path)
        };
        let new_cycle2 = {
            let mut path = path2.clone();
            path.append(khe.opposite());
            KeyCycle::from_path(path)
        };

        match policy {
            OneCycleCutPolicy::Auto | OneCycleCutPolicy::Disk => {
                let mut cycles1 = vec![new_cycle1.clone()];
                let mut cycles2 = vec![new_cycle2.clone()];
                for (i, other) in cycles.iter().enumerate() {
                    if i == ci {
                        continue;
                    }
                    let r1 = new_cycle1.interior_contained_ratio(
                        self.complex,
                        other,
                        WindingRule::Odd,
                        NUM_SAMPLES_PER_CONTAIN_TEST,
                    );
                    let r2 = new_cycle2.interior_contained_ratio(
                        self.complex,
                        other,
                        WindingRule::Odd,
                        NUM_SAMPLES_PER_CONTAIN_TEST,
                    );
                    if r1 >= r2 {
                        cycles1.push(other.clone());
                    } else {
                        cycles2.push(other.clone());
                    }
                }
                self.split_face_(kf, khe.edge, cycles1, cycles2)
            }
            OneCycleCutPolicy::Mobius => {
                let mut path = path1;
                path.append(khe);
                path.extend_reversed(&path2);
                path.append(khe);
                let new_cycle = KeyCycle::from_path(path);
                if let Some(face) = self.complex.key_face_mut(kf) {
                    face.cycles[ci] = new_cycle;
                }
                self.add_to_boundary_(kf, khe.edge);
                Some(CutFaceResult { face1: kf, edge: khe.edge, face2: kf })
            }
            OneCycleCutPolicy::Torus => {
                if let Some(face) = self.complex.key_face_mut(kf) {
                    face.cycles[ci] = new_cycle1;
                    face.cycles.push(new_cycle2);
                }
                self.add_to_boundary_(kf, khe.edge);
                Some(CutFaceResult { face1: kf, edge: khe.edge, face2: kf })
            }
        }
    }

    /// Whether the interiors of the two sides of a one-cycle cut cross each
    /// other an odd number of times.
    fn paths_cross_odd_times_(&self, path1: &KeyPath, path2: &KeyPath) -> bool {
        if path1.halfedges().is_empty() || path2.halfedges().is_empty() {
            return false;
        }
        let poly1 = path1.sample_centerline(self.complex);
        let poly2 = path2.sample_centerline(self.complex);
        let mut count = 0usize;
        for i in 1..poly1.len().saturating_sub(2) {
            for j in 1..poly2.len().saturating_sub(2) {
                if geometry::fast_semi_open_segment_intersects(&poly1[i], &poly1[i + 1], &poly2[j], &poly2[j + 1]) {
                    count += 1;
                }
            }
        }
        count % 2 == 1
    }

    fn cut_two_cycles_(
        &mut self,
        kf: NodeKey,
        khe: KeyHalfedge,
        start_index: KeyFaceVertexUsageIndex,
        end_index: KeyFaceVertexUsageIndex,
        policy: TwoCycleCutPolicy,
    ) -> Option<CutFaceResult> {
        let (ci1, ci2) = (start_index.cycle_index, end_index.cycle_index);
        let cycles = self.complex.key_face(kf)?.cycles.clone();
        let cycle1 = cycles.get(ci1)?;
        let cycle2 = cycles.get(ci2)?;
        let mut path1 = cycle1.rotated_path(start_index.component_index);
        let mut path2 = cycle2.rotated_path(end_index.component_index);

        let policy = match policy {
            TwoCycleCutPolicy::Auto if !path1.is_single_vertex() && !path2.is_single_vertex() => {
                self.best_two_cycle_policy_(kf, khe, &cycles, ci1, ci2)
            }
            TwoCycleCutPolicy::Auto => TwoCycleCutPolicy::ReverseNone,
            p => p,
        };
        tracing::trace!(?kf, ?policy, "cut_glue_face two-cycle");

        match policy {
            TwoCycleCutPolicy::Auto | TwoCycleCutPolicy::ReverseNone => {}
            TwoCycleCutPolicy::ReverseStart => path1.reverse(),
            TwoCycleCutPolicy::ReverseEnd => path2.reverse(),
            TwoCycleCutPolicy::ReverseBoth => {
                path1.reverse();
                path2.reverse();
            }
        }

        path1.append(khe);
        path1.extend(&path2);
        path1.append(khe.opposite());
        let new_cycle = KeyCycle::from_path(path1);

        if let Some(face) = self.complex.key_face_mut(kf) {
            face.cycles[ci1] = new_cycle;
            face.cycles.remove(ci2);
        }
        self.add_to_boundary_(kf, khe.edge);
        Some(CutFaceResult { face1: kf, edge: khe.edge, face2: kf })
    }

    /// Samples the winding numbers in each sector around the ends of `khe`
    /// and picks the policy with the smallest even, then odd, then
    /// sign-changing winding numbers.
    fn best_two_cycle_policy_(
        &self,
        kf: NodeKey,
        khe: KeyHalfedge,
        cycles: &[KeyCycle],
        ci1: usize,
        ci2: usize,
    ) -> TwoCycleCutPolicy {
        let complex = &*self.complex;
        let others: Vec<&KeyCycle> = cycles
            .iter()
            .enumerate()
            .filter(|(i, c)| *i != ci1 && *i != ci2 && c.steiner_vertex().is_none())
            .map(|(_, c)| c)
            .collect();
        let bbox = complex.bounding_box(kf);
        let delta = bbox.width().max(bbox.height()) * SECTOR_POINT_RELATIVE_DELTA;

        let mut samples: Vec<WindingSample> = Vec::new();
        let mut process_ring = |kv: NodeKey| {
            let Some(p) = complex.key_vertex(kv).map(|v| v.position()) else {
                return;
            };
            let ring = complex.ring_halfedges(kv);
            let Some(mut previous) = ring.last().copied() else {
                return;
            };
            for current in ring.iter().copied() {
                let a1 = previous.angle;
                let mut a2 = current.angle;
                previous = current;
                if a2 < a1 {
                    a2 += std::f64::consts::TAU;
                } else if a2 == a1 {
                    continue;
                }
                let sp = p + geometry::direction((a1 + a2) * 0.5) * delta;
                let n0: i64 = others.iter().map(|c| c.winding_number_at(complex, &sp)).sum();
                let n1 = cycles[ci1].winding_number_at(complex, &sp);
                let n2 = cycles[ci2].winding_number_at(complex, &sp);
                samples.push(WindingSample {
                    numbers: [n0 + n1 + n2, n0 - n1 + n2, n0 + n1 - n2, n0 - n1 - n2],
                });
            }
        };
        let start_kv = khe.start_vertex(complex);
        let end_kv = khe.end_vertex(complex);
        if let Some(kv) = start_kv {
            process_ring(kv);
        }
        if let Some(kv) = end_kv.filter(|kv| Some(*kv) != start_kv) {
            process_ring(kv);
        }

        // With the odd rule every option keeps the appearance: prefer small
        // numbers, then numbers not changing sign.
        let mut sums = [[0i64; 3]; 4];
        for sample in &samples {
            let n0 = sample.numbers[0];
            for (i, &number) in sample.numbers.iter().enumerate() {
                let abs = number.abs();
                if abs % 2 == 0 {
                    sums[i][0] += abs;
                } else {
                    sums[i][1] += abs;
                }
                if number != 0 && (n0 == 0 || number * n0 < 0) {
                    sums[i][2] += 1;
                }
            }
        }
        let best = (0..4).min_by_key(|i| sums[*i]).unwrap_or(0);
        match best {
            1 => TwoCycleCutPolicy::ReverseStart,
            2 => TwoCycleCutPolicy::ReverseEnd,
            3 => TwoCycleCutPolicy::ReverseBoth,
            _ => TwoCycleCutPolicy::ReverseNone,
        }
    }

    /// Replaces `kf` by two faces with the given cycles, both just below
    /// where `kf` was and with its properties.
    fn split_face_(
        &mut self,
        kf: NodeKey,
        ke: NodeKey,
        cycles1: Vec<KeyCycle>,
        cycles2: Vec<KeyCycle>,
    ) -> Option<CutFaceResult> {
        let face = self.complex.key_face(kf)?;
        let data = face.data().clone();
        let time = face.time;
        let parent = self.parent_of_(kf)?;
        let kf1 = self.create_key_face(cycles1, parent, Some(kf), time)?;
        let kf2 = self.create_key_face(cycles2, parent, Some(kf), time)?;
        for new_kf in [kf1, kf2] {
            if let Some(face) = self.complex.key_face_mut(new_kf) {
                face.data.set_properties(data.properties().clone());
            }
        }
        self.hard_delete(&[kf], false);
        Some(CutFaceResult { face1: kf1, edge: ke, face2: kf2 })
    }

    /// Creates a closed edge just above `kf` and cuts `kf` with it.
    pub fn cut_face_with_closed_edge(
        &mut self,
        kf: NodeKey,
        data: KeyEdgeData,
        one_cycle_policy: OneCycleCutPolicy,
    ) -> Option<CutFaceResult> {
        self.complex.key_face(kf)?;
        let parent = self.parent_of_(kf)?;
        let next = self.next_sibling_of_(kf);
        let time = self.time_of_(kf);
        let ke = self.create_key_closed_edge(data, parent, next, time)?;
        self.cut_glue_face(kf, ke, one_cycle_policy, TwoCycleCutPolicy::Auto)
    }

    /// Creates an open edge between two face corners, just above `kf`, and
    /// cuts `kf` with it.
    pub fn cut_face_with_open_edge(
        &mut self,
        kf: NodeKey,
        data: KeyEdgeData,
        start_index: KeyFaceVertexUsageIndex,
        end_index: KeyFaceVertexUsageIndex,
        one_cycle_policy: OneCycleCutPolicy,
        two_cycle_policy: TwoCycleCutPolicy,
    ) -> Option<CutFaceResult> {
        let kv1 = self.complex.key_face_vertex(kf, start_index)?;
        let kv2 = self.complex.key_face_vertex(kf, end_index)?;
        let parent = self.parent_of_(kf)?;
        let next = self.next_sibling_of_(kf);
        let ke = self.create_key_open_edge(kv1, kv2, data, parent, next)?;
        self.cut_glue_face_with_halfedge(
            kf,
            KeyHalfedge::new(ke, true),
            start_index,
            end_index,
            one_cycle_policy,
            two_cycle_policy,
        )
    }

    /// Creates an open edge between two vertices of `kf`, just above `kf`,
    /// and cuts `kf` with it.
    pub fn cut_face_with_open_edge_between(
        &mut self,
        kf: NodeKey,
        data: KeyEdgeData,
        start_kv: NodeKey,
        end_kv: NodeKey,
        one_cycle_policy: OneCycleCutPolicy,
        two_cycle_policy: TwoCycleCutPolicy,
    ) -> Option<CutFaceResult> {
        self.complex.key_face(kf)?;
        let parent = self.parent_of_(kf)?;
        let next = self.next_sibling_of_(kf);
        let ke = self.create_key_open_edge(start_kv, end_kv, data, parent, next)?;
        self.cut_glue_face(kf, ke, one_cycle_policy, two_cycle_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;
    use approx::assert_relative_eq;

    fn seg(a: Point2<f64>, b: Point2<f64>) -> KeyEdgeData {
        KeyEdgeData::from_points(vec![a, b])
    }

    struct Square {
        vs: Vec<NodeKey>,
        es: Vec<NodeKey>,
        f: NodeKey,
    }

    fn square(complex: &mut Complex, size: f64) -> Square {
        let root = complex.root_group().unwrap();
        complex.with_operations(|ops| {
            let pts = [
                Point2::new(0.0, 0.0),
                Point2::new(size, 0.0),
                Point2::new(size, size),
                Point2::new(0.0, size),
            ];
            let vs: Vec<NodeKey> = pts
                .iter()
                .map(|p| ops.create_key_vertex(*p, root, None, 0.0).unwrap())
                .collect();
            let es: Vec<NodeKey> = (0..4)
                .map(|i| {
                    ops.create_key_open_edge(vs[i], vs[(i + 1) % 4], seg(pts[i], pts[(i + 1) % 4]), root, None)
                        .unwrap()
                })
                .collect();
            let cycle = KeyCycle::from_halfedges(es.iter().map(|e| KeyHalfedge::new(*e, true)).collect());
            let f = ops.create_key_face(vec![cycle], root, None, 0.0).unwrap();
            Square { vs, es, f }
        })
    }

    struct SquareWithHole {
        vs: Vec<NodeKey>,
        ws: Vec<NodeKey>,
        f: NodeKey,
    }

    /// A 4x4 square with a 2x2 inner cycle. The inner cycle goes clockwise
    /// unless `inner_ccw` is set.
    fn square_with_hole(complex: &mut Complex, inner_ccw: bool) -> SquareWithHole {
        let root = complex.root_group().unwrap();
        complex.with_operations(|ops| {
            let mut ring = |pts: &[Point2<f64>]| {
                let vs: Vec<NodeKey> = pts
                    .iter()
                    .map(|p| ops.create_key_vertex(*p, root, None, 0.0).unwrap())
                    .collect();
                let n = vs.len();
                let es: Vec<NodeKey> = (0..n)
                    .map(|i| {
                        ops.create_key_open_edge(vs[i], vs[(i + 1) % n], seg(pts[i], pts[(i + 1) % n]), root, None)
                            .unwrap()
                    })
                    .collect();
                (vs, KeyCycle::from_halfedges(es.iter().map(|e| KeyHalfedge::new(*e, true)).collect()))
            };
            let (vs, outer) = ring(&[
                Point2::new(0.0, 0.0),
                Point2::new(4.0, 0.0),
                Point2::new(4.0, 4.0),
                Point2::new(0.0, 4.0),
            ]);
            let inner_pts = if inner_ccw {
                [
                    Point2::new(1.0, 1.0),
                    Point2::new(3.0, 1.0),
                    Point2::new(3.0, 3.0),
                    Point2::new(1.0, 3.0),
                ]
            } else {
                [
                    Point2::new(1.0, 1.0),
                    Point2::new(1.0, 3.0),
                    Point2::new(3.0, 3.0),
                    Point2::new(3.0, 1.0),
                ]
            };
            let (ws, inner) = ring(&inner_pts);
            let f = ops.create_key_face(vec![outer, inner], root, None, 0.0).unwrap();
            SquareWithHole { vs, ws, f }
        })
    }

    fn cut_to_hole(complex: &mut Complex, sq: &SquareWithHole, policy: TwoCycleCutPolicy) -> CutFaceResult {
        complex
            .with_operations(|ops| {
                ops.cut_face_with_open_edge(
                    sq.f,
                    seg(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)),
                    KeyFaceVertexUsageIndex::new(0, 0),
                    KeyFaceVertexUsageIndex::new(1, 0),
                    OneCycleCutPolicy::Auto,
                    policy,
                )
            })
            .unwrap()
    }

    // --- Edge cut tests ---

    #[test]
    fn cut_open_edge_updates_face_cycle() {
        let mut complex = Complex::new();
        let sq = square(&mut complex, 2.0);
        let res = complex
            .with_operations(|ops| ops.cut_edge(sq.es[0], CurveParameter::new(0, 0.5)))
            .unwrap();
        assert_eq!(res.edges.len(), 2);
        assert_eq!(res.vertices.len(), 1);
        assert!(!complex.contains(sq.es[0]));
        assert_eq!(
            complex.key_vertex(res.vertices[0]).unwrap().position(),
            Point2::new(1.0, 0.0)
        );
        let e1 = complex.key_edge(res.edges[0]).unwrap();
        assert_eq!(e1.start_vertex(), Some(sq.vs[0]));
        assert_eq!(e1.end_vertex(), Some(res.vertices[0]));
        let cycle = &complex.key_face(sq.f).unwrap().cycles()[0];
        assert_eq!(cycle.halfedges().len(), 5);
        assert!(cycle.is_valid(&complex));
        assert!(complex.find_cell(res.vertices[0]).unwrap().star().contains(&sq.f));
    }

    #[test]
    fn cut_edge_at_several_params() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let e = complex.with_operations(|ops| {
            let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
            let b = ops.create_key_vertex(Point2::new(3.0, 0.0), root, None, 0.0).unwrap();
            ops.create_key_open_edge(a, b, seg(Point2::new(0.0, 0.0), Point2::new(3.0, 0.0)), root, None)
                .unwrap()
        });
        let params = [CurveParameter::new(0, 2.0 / 3.0), CurveParameter::new(0, 1.0 / 3.0)];
        let res = complex.with_operations(|ops| ops.cut_edge_at(e, &params)).unwrap();
        assert_eq!(res.edges.len(), 3);
        let xs: Vec<f64> = res
            .vertices
            .iter()
            .map(|v| complex.key_vertex(*v).unwrap().position().x)
            .collect();
        assert_relative_eq!(xs[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(xs[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn cut_closed_edge_gives_loop() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let (e, f) = complex.with_operations(|ops| {
            let data = KeyEdgeData::from_closed_points(vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ]);
            let e = ops.create_key_closed_edge(data, root, None, 0.0).unwrap();
            let f = ops
                .create_key_face(vec![KeyCycle::from_halfedges(vec![KeyHalfedge::new(e, true)])], root, None, 0.0)
                .unwrap();
            (e, f)
        });
        let res = complex
            .with_operations(|ops| ops.cut_edge(e, CurveParameter::new(1, 0.5)))
            .unwrap();
        assert_eq!(res.edges.len(), 1);
        let kv = res.vertices[0];
        let edge = complex.key_edge(res.edges[0]).unwrap();
        assert_eq!(edge.start_vertex(), Some(kv));
        assert_eq!(edge.end_vertex(), Some(kv));
        assert_eq!(complex.key_vertex(kv).unwrap().position(), Point2::new(1.0, 0.5));
        let cycle = &complex.key_face(f).unwrap().cycles()[0];
        assert_eq!(cycle.halfedges(), &[KeyHalfedge::new(res.edges[0], true)]);
        assert!(cycle.is_valid(&complex));
    }

    // --- Face cut tests ---

    #[test]
    fn cut_square_along_diagonal_splits_it() {
        let mut complex = Complex::new();
        let sq = square(&mut complex, 1.0);
        let res = complex
            .with_operations(|ops| {
                ops.cut_face_with_open_edge(
                    sq.f,
                    seg(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)),
                    KeyFaceVertexUsageIndex::new(0, 0),
                    KeyFaceVertexUsageIndex::new(0, 2),
                    OneCycleCutPolicy::Auto,
                    TwoCycleCutPolicy::Auto,
                )
            })
            .unwrap();
        assert!(!complex.contains(sq.f));
        assert_ne!(res.face1, res.face2);
        for kf in [res.face1, res.face2] {
            let face = complex.key_face(kf).unwrap();
            assert_eq!(face.cycles().len(), 1);
            assert_eq!(face.cycles()[0].halfedges().len(), 3);
            assert!(face.cycles()[0].is_valid(&complex));
        }
        assert_eq!(complex.count_edge_uses(res.edge), 2);
    }

    #[test]
    fn cut_with_edge_to_steiner_vertex_merges_cycles() {
        let mut complex = Complex::new();
        let sq = square(&mut complex, 2.0);
        let w = complex
            .with_operations(|ops| ops.cut_face_with_vertex(sq.f, Point2::new(1.0, 1.0)))
            .unwrap();
        assert_eq!(complex.key_face(sq.f).unwrap().cycles().len(), 2);
        let res = complex
            .with_operations(|ops| {
                ops.cut_face_with_open_edge_between(
                    sq.f,
                    seg(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)),
                    sq.vs[0],
                    w,
                    OneCycleCutPolicy::Auto,
                    TwoCycleCutPolicy::Auto,
                )
            })
            .unwrap();
        assert_eq!(res.face1, sq.f);
        let face = complex.key_face(sq.f).unwrap();
        assert_eq!(face.cycles().len(), 1);
        assert_eq!(face.cycles()[0].halfedges().len(), 6);
        assert!(face.cycles()[0].is_valid(&complex));
        assert!(complex.find_cell(sq.f).unwrap().boundary().contains(&res.edge));
    }

    #[test]
    fn cut_with_closed_edge_disk_moves_inner_cycles() {
        let mut complex = Complex::new();
        let sq = square(&mut complex, 4.0);
        let w = complex
            .with_operations(|ops| ops.cut_face_with_vertex(sq.f, Point2::new(2.0, 2.0)))
            .unwrap();
        let circle = KeyEdgeData::from_closed_points(vec![
            Point2::new(1.0, 1.0),
            Point2::new(3.0, 1.0),
            Point2::new(3.0, 3.0),
            Point2::new(1.0, 3.0),
        ]);
        let res = complex
            .with_operations(|ops| ops.cut_face_with_closed_edge(sq.f, circle, OneCycleCutPolicy::Auto))
            .unwrap();
        let inner = complex.key_face(res.face1).unwrap();
        assert_eq!(inner.cycles().len(), 2);
        assert!(inner.cycles().iter().any(|c| c.steiner_vertex() == Some(w)));
        let outer = complex.key_face(res.face2).unwrap();
        assert_eq!(outer.cycles().len(), 2);
        assert_eq!(outer.cycles()[0].halfedges(), &[KeyHalfedge::new(res.edge, false)]);
    }

    #[test]
    fn cut_with_closed_edge_torus_keeps_face() {
        let mut complex = Complex::new();
        let sq = square(&mut complex, 4.0);
        let circle = KeyEdgeData::from_closed_points(vec![
            Point2::new(1.0, 1.0),
            Point2::new(3.0, 1.0),
            Point2::new(3.0, 3.0),
        ]);
        let res = complex
            .with_operations(|ops| ops.cut_face_with_closed_edge(sq.f, circle, OneCycleCutPolicy::Torus))
            .unwrap();
        assert_eq!(res.face1, sq.f);
        assert_eq!(res.face2, sq.f);
        assert_eq!(complex.key_face(sq.f).unwrap().cycles().len(), 3);
        assert_eq!(complex.count_edge_uses(res.edge), 2);
    }

    #[test]
    fn cut_square_along_diagonal_mobius_keeps_one_cycle() {
        let mut complex = Complex::new();
        let sq = square(&mut complex, 1.0);
        let res = complex
            .with_operations(|ops| {
                ops.cut_face_with_open_edge(
                    sq.f,
                    seg(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)),
                    KeyFaceVertexUsageIndex::new(0, 0),
                    KeyFaceVertexUsageIndex::new(0, 2),
                    OneCycleCutPolicy::Mobius,
                    TwoCycleCutPolicy::Auto,
                )
            })
            .unwrap();
        assert_eq!(res.face1, sq.f);
        assert_eq!(res.face2, sq.f);
        let face = complex.key_face(sq.f).unwrap();
        assert_eq!(face.cycles().len(), 1);
        let cycle = &face.cycles()[0];
        assert!(cycle.is_valid(&complex));
        let h = KeyHalfedge::new;
        assert_eq!(
            cycle.halfedges(),
            &[
                h(sq.es[2], true),
                h(sq.es[3], true),
                h(res.edge, true),
                h(sq.es[1], false),
                h(sq.es[0], false),
                h(res.edge, true),
            ]
        );
        assert_eq!(complex.count_edge_uses(res.edge), 2);
    }

    #[test]
    fn auto_cut_of_self_crossing_cycle_is_mobius() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        // A bowtie: a-b crosses c-d.
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 3.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        ];
        let f = complex.with_operations(|ops| {
            let vs: Vec<NodeKey> = pts
                .iter()
                .map(|p| ops.create_key_vertex(*p, root, None, 0.0).unwrap())
                .collect();
            let es: Vec<NodeKey> = (0..4)
                .map(|i| {
                    ops.create_key_open_edge(vs[i], vs[(i + 1) % 4], seg(pts[i], pts[(i + 1) % 4]), root, None)
                        .unwrap()
                })
                .collect();
            let cycle = KeyCycle::from_halfedges(es.iter().map(|e| KeyHalfedge::new(*e, true)).collect());
            ops.create_key_face(vec![cycle], root, None, 0.0).unwrap()
        });
        let res = complex
            .with_operations(|ops| {
                ops.cut_face_with_open_edge(
                    f,
                    seg(pts[0], pts[2]),
                    KeyFaceVertexUsageIndex::new(0, 0),
                    KeyFaceVertexUsageIndex::new(0, 2),
                    OneCycleCutPolicy::Auto,
                    TwoCycleCutPolicy::Auto,
                )
            })
            .unwrap();
        assert_eq!(res.face1, f);
        assert_eq!(res.face2, f);
        let face = complex.key_face(f).unwrap();
        assert_eq!(face.cycles().len(), 1);
        assert_eq!(face.cycles()[0].halfedges().len(), 6);
        assert!(face.cycles()[0].is_valid(&complex));
    }

    #[test]
    fn cut_between_cycles_with_explicit_policies() {
        let policies = [
            (TwoCycleCutPolicy::ReverseNone, false, false),
            (TwoCycleCutPolicy::ReverseStart, true, false),
            (TwoCycleCutPolicy::ReverseEnd, false, true),
            (TwoCycleCutPolicy::ReverseBoth, true, true),
        ];
        for (policy, reverse_start, reverse_end) in policies {
            let mut complex = Complex::new();
            let sq = square_with_hole(&mut complex, false);
            let res = cut_to_hole(&mut complex, &sq, policy);
            assert_eq!(res.face1, sq.f);
            let face = complex.key_face(sq.f).unwrap();
            assert_eq!(face.cycles().len(), 1, "{policy:?}");
            let cycle = &face.cycles()[0];
            assert!(cycle.is_valid(&complex), "{policy:?}");
            let hs = cycle.halfedges();
            assert_eq!(hs.len(), 10);
            assert!(hs[..4].iter().all(|h| h.direction != reverse_start), "{policy:?}");
            assert_eq!(hs[4], KeyHalfedge::new(res.edge, true));
            assert!(hs[5..9].iter().all(|h| h.direction != reverse_end), "{policy:?}");
            assert_eq!(hs[9], KeyHalfedge::new(res.edge, false));
            assert_eq!(hs[0].start_vertex(&complex), Some(sq.vs[0]));
            assert_eq!(hs[5].start_vertex(&complex), Some(sq.ws[0]));
        }
    }

    #[test]
    fn auto_cut_between_cycles_keeps_hole_orientation() {
        let mut complex = Complex::new();
        let sq = square_with_hole(&mut complex, false);
        let res = cut_to_hole(&mut complex, &sq, TwoCycleCutPolicy::Auto);
        let hs = complex.key_face(res.face1).unwrap().cycles()[0].halfedges().to_vec();
        assert!(hs.iter().filter(|h| h.edge != res.edge).all(|h| h.direction));
    }

    #[test]
    fn auto_cut_between_same_orientation_cycles_reverses_end() {
        let mut complex = Complex::new();
        let sq = square_with_hole(&mut complex, true);
        let res = cut_to_hole(&mut complex, &sq, TwoCycleCutPolicy::Auto);
        let cycle = &complex.key_face(res.face1).unwrap().cycles()[0];
        assert!(cycle.is_valid(&complex));
        let hs = cycle.halfedges();
        assert!(hs[..4].iter().all(|h| h.direction));
        assert!(hs[5..9].iter().all(|h| !h.direction));
    }

    #[test]
    fn cut_face_with_vertex_places_vertex_above_face() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let sq = square(&mut complex, 1.0);
        let v = complex
            .with_operations(|ops| ops.cut_face_with_vertex(sq.f, Point2::new(0.5, 0.5)))
            .unwrap();
        let children: Vec<NodeKey> = complex.children(root).collect();
        assert_eq!(children.last(), Some(&v));
        assert_eq!(complex.find_cell(v).unwrap().star(), &[sq.f]);
    }

    #[test]
    fn cut_rejects_mismatched_usage() {
        let mut complex = Complex::new();
        let sq = square(&mut complex, 1.0);
        let root = complex.root_group().unwrap();
        let res = complex.with_operations(|ops| {
            let ke = ops
                .create_key_open_edge(sq.vs[0], sq.vs[2], seg(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)), root, None)
                .unwrap();
            ops.cut_glue_face_with_halfedge(
                sq.f,
                KeyHalfedge::new(ke, true),
                KeyFaceVertexUsageIndex::new(0, 1),
                KeyFaceVertexUsageIndex::new(0, 2),
                OneCycleCutPolicy::Auto,
                TwoCycleCutPolicy::Auto,
            )
        });
        assert!(res.is_none());
        assert!(complex.contains(sq.f));
        assert!(complex.contains(sq.es[0]));
    }
}
