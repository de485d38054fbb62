// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge/edge intersection: cuts crossing key edges at their intersection
//! points and glues the cuts into shared vertices.

use nalgebra::Point2;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::Operations;
use crate::keys::NodeKey;
use crate::stroke::CurveParameter;

/// Parameters of [`Operations::intersect_with_group`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectSettings {
    /// Intersections closer than this to each other are merged, and
    /// intersections closer than this (in arclength) to the end of an open
    /// edge are ignored.
    pub tolerance: f64,
}

impl Default for IntersectSettings {
    fn default() -> Self {
        Self { tolerance: 1e-6 }
    }
}

/// Outcome of [`Operations::intersect_with_group`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntersectResult {
    /// One vertex per intersection point.
    pub vertices: Vec<NodeKey>,
    /// The edges replacing the input edges, in input order.
    pub edges: Vec<NodeKey>,
}

/// Intersection parameters collected for one edge.
#[derive(Default)]
struct EdgeHits {
    /// Parameter along the edge and index of the intersection point.
    params: Vec<(CurveParameter, usize)>,
}

impl Operations<'_> {
    /// Intersects the given key edges with the key edges of `group`
    /// (default: the parent of each edge).
    ///
    /// Every involved edge is cut once at all of its intersections, then the
    /// vertices created at the same intersection point are glued. Faces are
    /// not cut.
    pub fn intersect_with_group(
        &mut self,
        edges: &[NodeKey],
        group: Option<NodeKey>,
        settings: &IntersectSettings,
    ) -> IntersectResult {
        let tol = settings.tolerance;
        let mut inputs: Vec<NodeKey> = Vec::with_capacity(edges.len());
        for &ke in edges {
            if self.complex.key_edge(ke).is_some() && !inputs.contains(&ke) {
                inputs.push(ke);
            }
        }

        let mut points: Vec<Point2<f64>> = Vec::new();
        let mut hits: FxHashMap<NodeKey, EdgeHits> = FxHashMap::default();
        // Edges in first-hit order, for deterministic cuts.
        let mut hit_order: Vec<NodeKey> = Vec::new();
        let mut processed: FxHashSet<(NodeKey, NodeKey)> = FxHashSet::default();

        for &ke in &inputs {
            let Some(g) = group.or_else(|| self.parent_of_(ke)) else {
                continue;
            };
            let candidates: Vec<NodeKey> = self
                .complex
                .children(g)
                .filter(|k| *k != ke && self.complex.key_edge(*k).is_some())
                .collect();
            for other in candidates {
                let pair = if ke < other { (ke, other) } else { (other, ke) };
                if !processed.insert(pair) {
                    continue;
                }
                let (Some(e1), Some(e2)) = (self.complex.key_edge(ke), self.complex.key_edge(other)) else {
                    continue;
                };
                if e1.time() != e2.time() {
                    continue;
                }
                let (s1, s2) = (e1.data().stroke(), e2.data().stroke());
                let (l1, l2) = (s1.length(), s2.length());
                for hit in s1.intersections(s2, tol) {
                    if !e1.is_closed() && near_end(s1.arclength_at(hit.param1), l1, tol) {
                        continue;
                    }
                    if !e2.is_closed() && near_end(s2.arclength_at(hit.param2), l2, tol) {
                        continue;
                    }
                    let index = match points.iter().position(|p| (p - hit.position).norm() <= tol) {
                        Some(i) => i,
                        None => {
                            points.push(hit.position);
                            points.len() - 1
                        }
                    };
                    for (edge, param) in [(ke, hit.param1), (other, hit.param2)] {
                        let entry = hits.entry(edge).or_insert_with(|| {
                            hit_order.push(edge);
                            EdgeHits::default()
                        });
                        entry.params.push((param, index));
                    }
                }
            }
        }
        tracing::trace!(
            num_inputs = inputs.len(),
            num_points = points.len(),
            num_edges_hit = hit_order.len(),
            "intersect_with_group"
        );

        let mut point_vertices: Vec<Vec<NodeKey>> = vec![Vec::new(); points.len()];
        let mut replacements: FxHashMap<NodeKey, Vec<NodeKey>> = FxHashMap::default();
        for ke in hit_order {
            let Some(mut edge_hits) = hits.remove(&ke) else {
                continue;
            };
            edge_hits
                .params
                .sort_by(|a, b| a.0.to_scalar().total_cmp(&b.0.to_scalar()));
            edge_hits
                .params
                .dedup_by(|a, b| a.0.to_scalar() == b.0.to_scalar());
            let params: Vec<CurveParameter> = edge_hits.params.iter().map(|(p, _)| *p).collect();
            let Some(cut) = self.cut_edge_at(ke, &params) else {
                continue;
            };
            for (kv, (_, index)) in cut.vertices.iter().zip(&edge_hits.params) {
                point_vertices[*index].push(*kv);
            }
            replacements.insert(ke, cut.edges);
        }

        let mut result = IntersectResult::default();
        for (position, kvs) in points.iter().zip(&point_vertices) {
            if kvs.is_empty() {
                continue;
            }
            if let Some(kv) = self.glue_key_vertices(kvs, *position) {
                result.vertices.push(kv);
            }
        }
        for ke in inputs {
            match replacements.remove(&ke) {
                Some(new_edges) => result.edges.extend(new_edges),
                None => result.edges.push(ke),
            }
        }
        result
    }
}

fn near_end(s: f64, length: f64, tol: f64) -> bool {
    s <= tol || s >= length - tol
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;
    use crate::data::KeyEdgeData;
    use approx::assert_relative_eq;

    fn open_edge(complex: &mut Complex, a: (f64, f64), b: (f64, f64)) -> NodeKey {
        let root = complex.root_group().unwrap();
        complex.with_operations(|ops| {
            let pa = Point2::new(a.0, a.1);
            let pb = Point2::new(b.0, b.1);
            let va = ops.create_key_vertex(pa, root, None, 0.0).unwrap();
            let vb = ops.create_key_vertex(pb, root, None, 0.0).unwrap();
            ops.create_key_open_edge(va, vb, KeyEdgeData::from_points(vec![pa, pb]), root, None)
                .unwrap()
        })
    }

    // --- Intersection tests ---

    #[test]
    fn crossing_edges_share_a_vertex() {
        let mut complex = Complex::new();
        let e1 = open_edge(&mut complex, (0.0, 0.0), (2.0, 2.0));
        let _e2 = open_edge(&mut complex, (0.0, 2.0), (2.0, 0.0));
        let res = complex.with_operations(|ops| ops.intersect_with_group(&[e1], None, &IntersectSettings::default()));
        assert_eq!(res.vertices.len(), 1);
        assert_eq!(res.edges.len(), 2);
        let kv = res.vertices[0];
        let p = complex.key_vertex(kv).unwrap().position();
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-9);
        assert_eq!(complex.find_cell(kv).unwrap().star().len(), 4);
        assert_eq!(complex.edges().count(), 4);
        assert_eq!(complex.vertices().count(), 5);
    }

    #[test]
    fn shared_endpoint_is_not_an_intersection() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let (e1, e2) = complex.with_operations(|ops| {
            let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
            let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, None, 0.0).unwrap();
            let c = ops.create_key_vertex(Point2::new(1.0, 1.0), root, None, 0.0).unwrap();
            let e1 = ops
                .create_key_open_edge(a, b, KeyEdgeData::from_points(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]), root, None)
                .unwrap();
            let e2 = ops
                .create_key_open_edge(b, c, KeyEdgeData::from_points(vec![Point2::new(1.0, 0.0), Point2::new(1.0, 1.0)]), root, None)
                .unwrap();
            (e1, e2)
        });
        let res = complex.with_operations(|ops| ops.intersect_with_group(&[e1], None, &IntersectSettings::default()));
        assert!(res.vertices.is_empty());
        assert_eq!(res.edges, vec![e1]);
        assert!(complex.contains(e2));
    }

    #[test]
    fn line_through_closed_edge() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let closed = complex.with_operations(|ops| {
            let data = KeyEdgeData::from_closed_points(vec![
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 2.0),
                Point2::new(0.0, 2.0),
            ]);
            ops.create_key_closed_edge(data, root, None, 0.0).unwrap()
        });
        let line = open_edge(&mut complex, (-1.0, 1.0), (3.0, 1.0));
        let res = complex.with_operations(|ops| ops.intersect_with_group(&[line], None, &IntersectSettings::default()));
        assert_eq!(res.vertices.len(), 2);
        assert_eq!(res.edges.len(), 3);
        assert!(!complex.contains(closed));
        // Two halves of the square plus three pieces of the line.
        assert_eq!(complex.edges().count(), 5);
        for kv in &res.vertices {
            assert_eq!(complex.find_cell(*kv).unwrap().star().len(), 4);
        }
    }

    #[test]
    fn disjoint_edges_are_untouched() {
        let mut complex = Complex::new();
        let e1 = open_edge(&mut complex, (0.0, 0.0), (1.0, 0.0));
        let e2 = open_edge(&mut complex, (0.0, 1.0), (1.0, 1.0));
        let res = complex.with_operations(|ops| ops.intersect_with_group(&[e1, e2], None, &IntersectSettings::default()));
        assert!(res.vertices.is_empty());
        assert_eq!(res.edges, vec![e1, e2]);
    }
}
