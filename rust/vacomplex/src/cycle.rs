// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Halfedges, paths and cycles: the combinatorial boundary of key faces.
//!
//! A [`KeyCycle`] is either a single Steiner vertex or a closed walk of
//! [`KeyHalfedge`]s. A [`KeyPath`] is an open walk, or a single vertex when
//! it has no halfedges. Both only store keys; anything that needs the end
//! vertices or the geometry of their edges takes the owning [`Complex`].

use nalgebra::Point2;

use crate::complex::Complex;
use crate::geometry::{self, Rect2, WindingRule};
use crate::keys::NodeKey;

/// An edge plus a traversal direction (`true` = from start to end vertex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyHalfedge {
    pub edge: NodeKey,
    pub direction: bool,
}

impl KeyHalfedge {
    pub fn new(edge: NodeKey, direction: bool) -> Self {
        Self { edge, direction }
    }

    /// Same edge, opposite direction.
    pub fn opposite(&self) -> Self {
        Self::new(self.edge, !self.direction)
    }

    pub fn start_vertex(&self, complex: &Complex) -> Option<NodeKey> {
        let ke = complex.key_edge(self.edge)?;
        if self.direction {
            ke.start_vertex()
        } else {
            ke.end_vertex()
        }
    }

    pub fn end_vertex(&self, complex: &Complex) -> Option<NodeKey> {
        let ke = complex.key_edge(self.edge)?;
        if self.direction {
            ke.end_vertex()
        } else {
            ke.start_vertex()
        }
    }

    pub fn is_closed(&self, complex: &Complex) -> bool {
        complex.key_edge(self.edge).is_some_and(|ke| ke.is_closed())
    }

    /// Sampled centerline in the halfedge direction.
    pub fn sample_centerline(&self, complex: &Complex) -> Vec<Point2<f64>> {
        complex
            .key_edge(self.edge)
            .map(|ke| {
                ke.data()
                    .stroke()
                    .oriented(self.direction)
                    .sample_centerline(ke.data().sampling_quality())
            })
            .unwrap_or_default()
    }

    /// Control polyline in the halfedge direction.
    fn control_polyline(&self, complex: &Complex) -> Vec<Point2<f64>> {
        complex
            .key_edge(self.edge)
            .map(|ke| ke.data().stroke().oriented(self.direction).control_polyline())
            .unwrap_or_default()
    }

    pub fn winding_contribution(&self, complex: &Complex, p: &Point2<f64>) -> i64 {
        let Some(ke) = complex.key_edge(self.edge) else {
            return 0;
        };
        let c = ke.data().stroke().winding_contribution(p);
        if self.direction {
            c
        } else {
            -c
        }
    }
}

/// Concatenates polylines, dropping the duplicated joint points.
fn join_polylines(parts: impl Iterator<Item = Vec<Point2<f64>>>) -> Vec<Point2<f64>> {
    let mut result: Vec<Point2<f64>> = Vec::new();
    for part in parts {
        let skip = usize::from(!result.is_empty());
        result.extend(part.into_iter().skip(skip));
    }
    result
}

/// An open walk of halfedges, or a single vertex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath {
    single_vertex: Option<NodeKey>,
    halfedges: Vec<KeyHalfedge>,
}

impl KeyPath {
    /// Path made of a single vertex.
    pub fn from_vertex(kv: NodeKey) -> Self {
        Self {
            single_vertex: Some(kv),
            halfedges: Vec::new(),
        }
    }

    pub fn from_halfedges(halfedges: Vec<KeyHalfedge>) -> Self {
        Self {
            single_vertex: None,
            halfedges,
        }
    }

    pub fn single_vertex(&self) -> Option<NodeKey> {
        self.single_vertex
    }

    pub fn is_single_vertex(&self) -> bool {
        self.single_vertex.is_some()
    }

    pub fn halfedges(&self) -> &[KeyHalfedge] {
        &self.halfedges
    }

    pub fn into_halfedges(self) -> Vec<KeyHalfedge> {
        self.halfedges
    }

    pub fn start_vertex(&self, complex: &Complex) -> Option<NodeKey> {
        match self.halfedges.first() {
            Some(h) => h.start_vertex(complex),
            None => self.single_vertex,
        }
    }

    pub fn end_vertex(&self, complex: &Complex) -> Option<NodeKey> {
        match self.halfedges.last() {
            Some(h) => h.end_vertex(complex),
            None => self.single_vertex,
        }
    }

    /// Reverses the traversal direction of the path in place.
    pub fn reverse(&mut self) {
        self.halfedges.reverse();
        for h in &mut self.halfedges {
            h.direction = !h.direction;
        }
    }

    pub fn append(&mut self, khe: KeyHalfedge) {
        self.single_vertex = None;
        self.halfedges.push(khe);
    }

    pub fn extend(&mut self, other: &KeyPath) {
        if other.halfedges.is_empty() {
            return;
        }
        self.single_vertex = None;
        self.halfedges.extend_from_slice(&other.halfedges);
    }

    /// Appends `other` traversed backwards.
    pub fn extend_reversed(&mut self, other: &KeyPath) {
        if other.halfedges.is_empty() {
            return;
        }
        self.single_vertex = None;
        self.halfedges
            .extend(other.halfedges.iter().rev().map(KeyHalfedge::opposite));
    }

    /// Sampled centerline of the whole path.
    pub fn sample_centerline(&self, complex: &Complex) -> Vec<Point2<f64>> {
        if let Some(kv) = self.single_vertex {
            return complex.key_vertex(kv).map(|v| vec![v.position()]).unwrap_or_default();
        }
        join_polylines(self.halfedges.iter().map(|h| h.sample_centerline(complex)))
    }
}

/// Locates a vertex usage inside a face: the cycle index, and the index of
/// the halfedge starting at that vertex (`0` for Steiner cycles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyFaceVertexUsageIndex {
    pub cycle_index: usize,
    pub component_index: usize,
}

impl KeyFaceVertexUsageIndex {
    pub fn new(cycle_index: usize, component_index: usize) -> Self {
        Self {
            cycle_index,
            component_index,
        }
    }
}

/// A boundary component of a key face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCycle {
    steiner_vertex: Option<NodeKey>,
    halfedges: Vec<KeyHalfedge>,
}

impl KeyCycle {
    pub fn from_steiner_vertex(kv: NodeKey) -> Self {
        Self {
            steiner_vertex: Some(kv),
            halfedges: Vec::new(),
        }
    }

    pub fn from_halfedges(halfedges: Vec<KeyHalfedge>) -> Self {
        Self {
            steiner_vertex: None,
            halfedges,
        }
    }

    /// Closes a path into a cycle. A single-vertex path becomes a Steiner
    /// cycle.
    pub fn from_path(path: KeyPath) -> Self {
        match path.single_vertex {
            Some(kv) => Self::from_steiner_vertex(kv),
            None => Self::from_halfedges(path.halfedges),
        }
    }

    pub fn steiner_vertex(&self) -> Option<NodeKey> {
        self.steiner_vertex
    }

    pub fn halfedges(&self) -> &[KeyHalfedge] {
        &self.halfedges
    }

    pub(crate) fn halfedges_mut(&mut self) -> &mut Vec<KeyHalfedge> {
        &mut self.halfedges
    }

    pub fn first(&self) -> Option<KeyHalfedge> {
        self.halfedges.first().copied()
    }

    /// Returns whether the halfedges form a closed walk.
    pub fn is_valid(&self, complex: &Complex) -> bool {
        if let Some(kv) = self.steiner_vertex {
            return self.halfedges.is_empty() && complex.key_vertex(kv).is_some();
        }
        let Some(first) = self.first() else {
            return false;
        };
        let Some(first_edge) = complex.key_edge(first.edge) else {
            return false;
        };
        if first_edge.is_closed() {
            return self.halfedges.iter().all(|h| *h == first);
        }
        let n = self.halfedges.len();
        for i in 0..n {
            let h = self.halfedges[i];
            let next = self.halfedges[(i + 1) % n];
            if h.is_closed(complex) {
                return false;
            }
            match (h.end_vertex(complex), next.start_vertex(complex)) {
                (Some(a), Some(b)) if a == b => {}
                _ => return false,
            }
        }
        true
    }

    /// Returns whether `other` is the same cycle, up to a rotation.
    pub fn is_rotation_of(&self, other: &KeyCycle) -> bool {
        if self.steiner_vertex != other.steiner_vertex {
            return false;
        }
        let n = self.halfedges.len();
        if n != other.halfedges.len() {
            return false;
        }
        if n == 0 {
            return true;
        }
        (0..n).any(|shift| (0..n).all(|i| self.halfedges[(i + shift) % n] == other.halfedges[i]))
    }

    /// Returns the same cycle traversed backwards.
    pub fn reversed(&self) -> Self {
        let mut path = KeyPath::from_halfedges(self.halfedges.clone());
        path.reverse();
        Self {
            steiner_vertex: self.steiner_vertex,
            halfedges: path.halfedges,
        }
    }

    /// The halfedges as a path starting at component `start`.
    pub fn rotated_path(&self, start: usize) -> KeyPath {
        if let Some(kv) = self.steiner_vertex {
            return KeyPath::from_vertex(kv);
        }
        let n = self.halfedges.len();
        if n == 0 {
            return KeyPath::default();
        }
        let start = start % n;
        let mut halfedges = Vec::with_capacity(n);
        halfedges.extend_from_slice(&self.halfedges[start..]);
        halfedges.extend_from_slice(&self.halfedges[..start]);
        KeyPath::from_halfedges(halfedges)
    }

    /// Sub-path from component `first` up to (excluding) component `last`.
    ///
    /// Indices wrap around. When `first == last`, the result is the whole
    /// cycle if `loop_if_empty`, or the single start vertex otherwise.
    pub fn sub_path(&self, complex: &Complex, first: usize, last: usize, loop_if_empty: bool) -> KeyPath {
        if let Some(kv) = self.steiner_vertex {
            return KeyPath::from_vertex(kv);
        }
        let n = self.halfedges.len();
        if n == 0 {
            return KeyPath::default();
        }
        let first = first % n;
        let last = last % n;
        if first == last {
            if loop_if_empty {
                return self.rotated_path(first);
            }
            return match self.halfedges[first].start_vertex(complex) {
                Some(kv) => KeyPath::from_vertex(kv),
                None => KeyPath::default(),
            };
        }
        let mut halfedges = Vec::new();
        let mut i = first;
        while i != last {
            halfedges.push(self.halfedges[i]);
            i = (i + 1) % n;
        }
        KeyPath::from_halfedges(halfedges)
    }

    /// Closed polyline following the cycle. A Steiner cycle is the single
    /// vertex position.
    pub fn control_polyline(&self, complex: &Complex) -> Vec<Point2<f64>> {
        if let Some(kv) = self.steiner_vertex {
            return complex.key_vertex(kv).map(|v| vec![v.position()]).unwrap_or_default();
        }
        join_polylines(self.halfedges.iter().map(|h| h.control_polyline(complex)))
    }

    /// Sampled centerline of the cycle.
    pub fn sample_centerline(&self, complex: &Complex) -> Vec<Point2<f64>> {
        if self.steiner_vertex.is_some() {
            return self.control_polyline(complex);
        }
        join_polylines(self.halfedges.iter().map(|h| h.sample_centerline(complex)))
    }

    /// `count` points uniformly distributed by arclength along the cycle,
    /// without repeating the start point.
    pub fn sample_uniformly(&self, complex: &Complex, count: usize) -> Vec<Point2<f64>> {
        let polyline = self.control_polyline(complex);
        if polyline.len() <= 1 {
            return polyline.into_iter().cycle().take(count).collect();
        }
        let mut samples = geometry::sample_polyline_uniformly(&polyline, count + 1);
        samples.pop();
        samples
    }

    /// Winding number of the cycle at `p`. Steiner cycles have none.
    pub fn winding_number_at(&self, complex: &Complex, p: &Point2<f64>) -> i64 {
        self.halfedges
            .iter()
            .map(|h| h.winding_contribution(complex, p))
            .sum()
    }

    /// Fraction of the samples of `other` lying inside this cycle.
    pub fn interior_contained_ratio(
        &self,
        complex: &Complex,
        other: &KeyCycle,
        rule: WindingRule,
        num_samples: usize,
    ) -> f64 {
        let samples = other.sample_uniformly(complex, num_samples);
        if samples.is_empty() {
            return 0.0;
        }
        let inside = samples
            .iter()
            .filter(|p| rule.is_inside(self.winding_number_at(complex, p)))
            .count();
        inside as f64 / samples.len() as f64
    }

    pub fn bounding_box(&self, complex: &Complex) -> Rect2 {
        let mut rect = Rect2::empty();
        for p in self.control_polyline(complex) {
            rect.extend_point(p);
        }
        rect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::KeyEdgeData;
    use crate::operations::Operations;

    /// Square with corners a(0,0) b(1,0) c(1,1) d(0,1), counterclockwise.
    fn square(complex: &mut Complex) -> (Vec<NodeKey>, Vec<KeyHalfedge>) {
        let root = complex.root_group().unwrap();
        let mut ops = Operations::new(complex);
        let pts = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let vs: Vec<NodeKey> = pts
            .iter()
            .map(|&(x, y)| ops.create_key_vertex(Point2::new(x, y), root, None, 0.0).unwrap())
            .collect();
        let mut hs = Vec::new();
        for i in 0..4 {
            let (a, b) = (vs[i], vs[(i + 1) % 4]);
            let data = KeyEdgeData::from_points(vec![
                Point2::new(pts[i].0, pts[i].1),
                Point2::new(pts[(i + 1) % 4].0, pts[(i + 1) % 4].1),
            ]);
            let e = ops.create_key_open_edge(a, b, data, root, None).unwrap();
            hs.push(KeyHalfedge::new(e, true));
        }
        (vs, hs)
    }

    #[test]
    fn square_cycle_is_valid() {
        let mut complex = Complex::new();
        let (_, hs) = square(&mut complex);
        let cycle = KeyCycle::from_halfedges(hs.clone());
        assert!(cycle.is_valid(&complex));
        assert!(cycle.reversed().is_valid(&complex));

        let broken = KeyCycle::from_halfedges(vec![hs[0], hs[2]]);
        assert!(!broken.is_valid(&complex));
        assert!(!KeyCycle::from_halfedges(Vec::new()).is_valid(&complex));
    }

    #[test]
    fn steiner_cycle_is_valid() {
        let mut complex = Complex::new();
        let (vs, _) = square(&mut complex);
        assert!(KeyCycle::from_steiner_vertex(vs[0]).is_valid(&complex));
    }

    #[test]
    fn winding_number_and_containment() {
        let mut complex = Complex::new();
        let (_, hs) = square(&mut complex);
        let cycle = KeyCycle::from_halfedges(hs);
        assert_eq!(cycle.winding_number_at(&complex, &Point2::new(0.5, 0.5)), 1);
        assert_eq!(cycle.reversed().winding_number_at(&complex, &Point2::new(0.5, 0.5)), -1);
        assert_eq!(cycle.winding_number_at(&complex, &Point2::new(1.5, 0.5)), 0);
        let samples = cycle.sample_uniformly(&complex, 8);
        assert_eq!(samples.len(), 8);
    }

    #[test]
    fn sub_paths() {
        let mut complex = Complex::new();
        let (vs, hs) = square(&mut complex);
        let cycle = KeyCycle::from_halfedges(hs.clone());

        let p = cycle.sub_path(&complex, 3, 1, false);
        assert_eq!(p.halfedges(), &[hs[3], hs[0]]);
        assert_eq!(p.start_vertex(&complex), Some(vs[3]));
        assert_eq!(p.end_vertex(&complex), Some(vs[1]));

        let empty = cycle.sub_path(&complex, 2, 2, false);
        assert_eq!(empty.single_vertex(), Some(vs[2]));

        let full = cycle.sub_path(&complex, 2, 2, true);
        assert_eq!(full.halfedges().len(), 4);
        assert_eq!(full.halfedges()[0], hs[2]);
    }

    #[test]
    fn path_reverse_and_extend() {
        let mut complex = Complex::new();
        let (vs, hs) = square(&mut complex);
        let mut p = KeyPath::from_halfedges(vec![hs[0], hs[1]]);
        p.reverse();
        assert_eq!(p.start_vertex(&complex), Some(vs[2]));
        assert_eq!(p.end_vertex(&complex), Some(vs[0]));

        let mut q = KeyPath::from_vertex(vs[0]);
        q.extend_reversed(&KeyPath::from_halfedges(vec![hs[3]]));
        assert!(!q.is_single_vertex());
        assert_eq!(q.halfedges(), &[hs[3].opposite()]);
    }

    #[test]
    fn rotation_equivalence() {
        let mut complex = Complex::new();
        let (_, hs) = square(&mut complex);
        let a = KeyCycle::from_halfedges(hs.clone());
        let b = KeyCycle::from_halfedges(vec![hs[2], hs[3], hs[0], hs[1]]);
        assert!(a.is_rotation_of(&b));
        assert!(!a.is_rotation_of(&a.reversed()));
    }
}
