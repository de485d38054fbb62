// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polyline strokes: the geometry carried by key edges.
//!
//! A [`Stroke2d`] is a centerline polyline with one width per control point.
//! Open strokes go from their first to their last point. Closed strokes have
//! an implicit closing segment from the last point back to the first one.
//!
//! Positions along a stroke are given as a [`CurveParameter`]: a segment
//! index plus a parameter `u` in `[0, 1]` within that segment. Slicing a
//! stroke at a parameter keeps every control point on both sides, so
//! concatenating the two slices gives back the same curve.

use nalgebra::{Point2, Vector2};

use crate::geometry::{self, Rect2};
use crate::settings::{CurveSamplingQuality, SnapSettings};

/// A position along a stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveParameter {
    pub segment_index: usize,
    pub u: f64,
}

impl CurveParameter {
    pub fn new(segment_index: usize, u: f64) -> Self {
        Self { segment_index, u }
    }

    /// The parameter as a single scalar `segment_index + u`.
    pub fn to_scalar(&self) -> f64 {
        self.segment_index as f64 + self.u
    }

    fn from_scalar(s: f64, num_segments: usize) -> Self {
        if num_segments == 0 || s <= 0.0 {
            return Self::new(0, 0.0);
        }
        let max = num_segments as f64;
        if s >= max {
            return Self::new(num_segments - 1, 1.0);
        }
        let i = s.floor();
        Self::new(i as usize, s - i)
    }
}

/// An intersection point between two strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeIntersection {
    pub position: Point2<f64>,
    pub param1: CurveParameter,
    pub param2: CurveParameter,
}

/// A polyline stroke with per-point widths.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke2d {
    points: Vec<Point2<f64>>,
    widths: Vec<f64>,
    closed: bool,
}

impl Default for Stroke2d {
    fn default() -> Self {
        Self::open(vec![Point2::origin()])
    }
}

impl Stroke2d {
    /// Default width used by the convenience constructors.
    pub const DEFAULT_WIDTH: f64 = 1.0;

    /// Creates a stroke. Missing widths are filled with the last given width
    /// (or [`Self::DEFAULT_WIDTH`]), extra widths are dropped. An empty point
    /// list becomes a single point at the origin.
    pub fn new(mut points: Vec<Point2<f64>>, mut widths: Vec<f64>, closed: bool) -> Self {
        if points.is_empty() {
            points.push(Point2::origin());
        }
        let fill = widths.last().copied().unwrap_or(Self::DEFAULT_WIDTH);
        widths.resize(points.len(), fill);
        Self { points, widths, closed }
    }

    pub fn open(points: Vec<Point2<f64>>) -> Self {
        Self::new(points, Vec::new(), false)
    }

    pub fn closed(points: Vec<Point2<f64>>) -> Self {
        Self::new(points, Vec::new(), true)
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn num_segments(&self) -> usize {
        if self.closed {
            self.points.len()
        } else {
            self.points.len() - 1
        }
    }

    pub fn start_point(&self) -> Point2<f64> {
        self.points[0]
    }

    pub fn end_point(&self) -> Point2<f64> {
        if self.closed {
            self.points[0]
        } else {
            self.points[self.points.len() - 1]
        }
    }

    /// Parameter of the stroke end.
    pub fn end_parameter(&self) -> CurveParameter {
        CurveParameter::from_scalar(self.num_segments() as f64, self.num_segments())
    }

    fn point_at_index(&self, i: usize) -> Point2<f64> {
        self.points[i % self.points.len()]
    }

    fn width_at_index(&self, i: usize) -> f64 {
        self.widths[i % self.widths.len()]
    }

    fn eval_scalar(&self, s: f64) -> (Point2<f64>, f64) {
        let n = self.num_segments();
        if n == 0 {
            return (self.points[0], self.widths[0]);
        }
        let s = if self.closed { s.rem_euclid(n as f64) } else { s };
        let p = CurveParameter::from_scalar(s, n);
        let i = p.segment_index;
        let a = self.point_at_index(i);
        let b = self.point_at_index(i + 1);
        let wa = self.width_at_index(i);
        let wb = self.width_at_index(i + 1);
        (a + (b - a) * p.u, wa + (wb - wa) * p.u)
    }

    /// Evaluates the centerline position at the given parameter.
    pub fn eval(&self, param: CurveParameter) -> Point2<f64> {
        self.eval_scalar(param.to_scalar()).0
    }

    /// Evaluates the width at the given parameter.
    pub fn eval_width(&self, param: CurveParameter) -> f64 {
        self.eval_scalar(param.to_scalar()).1
    }

    /// Control polyline including the closing point for closed strokes.
    pub fn control_polyline(&self) -> Vec<Point2<f64>> {
        let mut result = self.points.clone();
        if self.closed {
            result.push(self.points[0]);
        }
        result
    }

    fn cumulative_lengths(&self) -> Vec<f64> {
        geometry::cumulative_lengths(&self.control_polyline())
    }

    pub fn length(&self) -> f64 {
        self.cumulative_lengths().last().copied().unwrap_or(0.0)
    }

    /// Parameter at the given arclength, clamped to the stroke.
    pub fn param_at_arclength(&self, s: f64) -> CurveParameter {
        let lengths = self.cumulative_lengths();
        self.param_at_arclength_(&lengths, s)
    }

    fn param_at_arclength_(&self, lengths: &[f64], s: f64) -> CurveParameter {
        let n = self.num_segments();
        if n == 0 {
            return CurveParameter::new(0, 0.0);
        }
        let i = lengths.partition_point(|&l| l <= s).clamp(1, n);
        let l0 = lengths[i - 1];
        let seg = lengths[i] - l0;
        let u = if seg > 0.0 { ((s - l0) / seg).clamp(0.0, 1.0) } else { 0.0 };
        CurveParameter::new(i - 1, u)
    }

    fn sample_at_arclengths(&self, arclengths: impl Iterator<Item = f64>) -> Vec<(Point2<f64>, f64)> {
        let lengths = self.cumulative_lengths();
        arclengths
            .map(|s| self.eval_scalar(self.param_at_arclength_(&lengths, s).to_scalar()))
            .collect()
    }

    /// Samples `count` points uniformly by arclength.
    ///
    /// Open strokes are sampled from start to end inclusive. Closed strokes
    /// are sampled over `[0, length)`, without repeating the start point.
    pub fn sample_uniform(&self, count: usize) -> Vec<Point2<f64>> {
        self.sample_uniform_with_widths(count, 0.0)
            .into_iter()
            .map(|(p, _)| p)
            .collect()
    }

    /// Same as [`Self::sample_uniform`] but also returns widths. For closed
    /// strokes, samples start at `offset` (a fraction of the arclength).
    pub fn sample_uniform_with_widths(&self, count: usize, offset: f64) -> Vec<(Point2<f64>, f64)> {
        if count == 0 {
            return Vec::new();
        }
        let total = self.length();
        if self.closed {
            let step = 1.0 / count as f64;
            self.sample_at_arclengths(
                (0..count).map(|k| ((offset + k as f64 * step).rem_euclid(1.0)) * total),
            )
        } else if count == 1 {
            self.sample_at_arclengths(std::iter::once(0.0))
        } else {
            let step = total / (count - 1) as f64;
            self.sample_at_arclengths((0..count).map(|k| k as f64 * step))
        }
    }

    /// Centerline sampled with the given quality. Closed strokes end with a
    /// copy of their start point.
    pub fn sample_centerline(&self, quality: CurveSamplingQuality) -> Vec<Point2<f64>> {
        let k = quality.samples_per_segment();
        let n = self.num_segments();
        let mut result = Vec::with_capacity(n * k + 1);
        for i in 0..n {
            let a = self.point_at_index(i);
            let b = self.point_at_index(i + 1);
            for j in 0..k {
                result.push(a + (b - a) * (j as f64 / k as f64));
            }
        }
        result.push(self.end_point());
        result
    }

    pub fn bounding_box(&self) -> Rect2 {
        let mut rect = Rect2::empty();
        for p in &self.points {
            rect.extend_point(*p);
        }
        rect
    }

    /// Returns the same curve traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        let mut widths = self.widths.clone();
        if self.closed {
            // Keep the start point in place.
            points[1..].reverse();
            widths[1..].reverse();
        } else {
            points.reverse();
            widths.reverse();
        }
        Self { points, widths, closed: self.closed }
    }

    /// Returns this stroke oriented along `direction`.
    pub fn oriented(&self, direction: bool) -> Self {
        if direction {
            self.clone()
        } else {
            self.reversed()
        }
    }

    /// Winding number contribution of the stroke at `p`.
    pub fn winding_contribution(&self, p: &Point2<f64>) -> i64 {
        geometry::polyline_winding_contribution(&self.control_polyline(), p)
    }

    fn first_direction(mut points: impl Iterator<Item = Point2<f64>>) -> Option<Vector2<f64>> {
        let origin = points.next()?;
        points.map(|p| p - origin).find(|d| d.norm_squared() > 0.0)
    }

    /// Angle of the outgoing tangent at the stroke start.
    pub fn start_angle(&self) -> f64 {
        let it = self.control_polyline().into_iter();
        Self::first_direction(it).map_or(0.0, |d| d.y.atan2(d.x))
    }

    /// Angle of the tangent at the stroke end, pointing backwards along the
    /// stroke.
    pub fn end_opposite_angle(&self) -> f64 {
        let it = self.control_polyline().into_iter().rev();
        Self::first_direction(it).map_or(0.0, |d| d.y.atan2(d.x))
    }

    /// Extracts the part of the stroke between `from` and `to` as an open
    /// stroke.
    ///
    /// For closed strokes, the slice may wrap around the start point:
    /// `num_wraps` full turns are added after `to`, and a `to` located before
    /// `from` wraps once implicitly. Slicing a closed stroke from `p` to `p`
    /// with one wrap yields the whole loop starting at `p`.
    pub fn slice(&self, from: CurveParameter, to: CurveParameter, num_wraps: usize) -> Self {
        let n = self.num_segments();
        let s0 = from.to_scalar();
        let mut s1 = to.to_scalar();
        if self.closed {
            s1 += (num_wraps * n) as f64;
            if s1 < s0 {
                s1 += n as f64;
            }
        } else {
            s1 = s1.max(s0);
        }

        let (p0, w0) = self.eval_scalar(s0);
        let mut points = vec![p0];
        let mut widths = vec![w0];
        let mut k = s0.floor() as usize + 1;
        while (k as f64) < s1 {
            points.push(self.point_at_index(k));
            widths.push(self.width_at_index(k));
            k += 1;
        }
        let (p1, w1) = self.eval_scalar(s1);
        points.push(p1);
        widths.push(w1);
        Self { points, widths, closed: false }
    }

    /// Concatenates two open strokes. The end of `self` and the start of
    /// `other` are merged into a single joint point.
    ///
    /// Without smoothing, a joint lying inside the straight segment between
    /// its neighbors (with an interpolated width) is removed, so that
    /// concatenating the two halves of a cut gives back the original control
    /// points.
    pub fn concat(&self, other: &Stroke2d, smooth_join: bool) -> Self {
        let mut points = self.control_polyline();
        let mut widths = self.widths.clone();
        if self.closed {
            widths.push(self.widths[0]);
        }
        let joint = points.len() - 1;
        let other_points = other.control_polyline();
        let mut other_widths = other.widths.clone();
        if other.closed {
            other_widths.push(other.widths[0]);
        }
        points[joint] = nalgebra::center(&points[joint], &other_points[0]);
        widths[joint] = 0.5 * (widths[joint] + other_widths[0]);
        points.extend_from_slice(&other_points[1..]);
        widths.extend_from_slice(&other_widths[1..]);
        let mut result = Self { points, widths, closed: false };
        if smooth_join {
            result.smooth_point(joint);
        } else if result.is_redundant_point_(joint) {
            result.points.remove(joint);
            result.widths.remove(joint);
        }
        result
    }

    // Whether an interior control point can be removed without changing the
    // centerline or the width profile.
    fn is_redundant_point_(&self, i: usize) -> bool {
        if i == 0 || i + 1 >= self.points.len() {
            return false;
        }
        let (a, p, b) = (self.points[i - 1], self.points[i], self.points[i + 1]);
        let d1 = p - a;
        let d2 = b - p;
        let (l1, l2) = (d1.norm(), d2.norm());
        if l1 == 0.0 || l2 == 0.0 {
            return false;
        }
        let tolerance = 1e-9 * l1 * l2;
        if d1.perp(&d2).abs() > tolerance || d1.dot(&d2) <= 0.0 {
            return false;
        }
        let (w0, w, w1) = (self.widths[i - 1], self.widths[i], self.widths[i + 1]);
        let expected = w0 + (w1 - w0) * l1 / (l1 + l2);
        (w - expected).abs() <= 1e-9 * w0.abs().max(w1.abs()).max(1.0)
    }

    /// Converts an open stroke whose end points coincide into a closed
    /// stroke starting at the former joint.
    pub fn close(&self, smooth_join: bool) -> Self {
        if self.closed {
            return self.clone();
        }
        let mut points = self.points.clone();
        let mut widths = self.widths.clone();
        if points.len() >= 2 {
            let last = points.len() - 1;
            points[0] = nalgebra::center(&points[0], &points[last]);
            widths[0] = 0.5 * (widths[0] + widths[last]);
            points.pop();
            widths.pop();
        }
        let mut result = Self { points, widths, closed: true };
        if smooth_join {
            result.smooth_point(0);
        }
        result
    }

    // Laplacian smoothing of one control point.
    fn smooth_point(&mut self, i: usize) {
        let len = self.points.len();
        if len < 3 {
            return;
        }
        let (prev, next) = if self.closed {
            ((i + len - 1) % len, (i + 1) % len)
        } else if i > 0 && i + 1 < len {
            (i - 1, i + 1)
        } else {
            return;
        };
        let avg = nalgebra::center(&self.points[prev], &self.points[next]);
        self.points[i] = nalgebra::center(&self.points[i], &avg);
    }

    /// Moves the end points of an open stroke to `start` and `end`,
    /// deforming the rest of the stroke according to `settings`.
    ///
    /// Returns whether any point moved.
    pub fn snap(&mut self, start: Point2<f64>, end: Point2<f64>, settings: &SnapSettings) -> bool {
        if self.closed {
            return false;
        }
        let last = self.points.len() - 1;
        let d0 = start - self.points[0];
        let d1 = end - self.points[last];
        if d0 == Vector2::zeros() && d1 == Vector2::zeros() {
            return false;
        }
        if last == 0 {
            self.points[0] = start;
            return true;
        }
        let lengths = self.cumulative_lengths();
        let total = lengths[last];
        for (i, p) in self.points.iter_mut().enumerate() {
            let s = if total > 0.0 { lengths[i] / total } else { i as f64 / last as f64 };
            *p += d0 * settings.start_weight(s) + d1 * settings.end_weight(s);
        }
        self.points[0] = start;
        self.points[last] = end;
        true
    }

    /// Averages oriented open strokes into one open stroke.
    pub fn glue_open(strokes: &[Stroke2d]) -> Self {
        let count = strokes.iter().map(|s| s.points.len()).max().unwrap_or(1).max(2);
        let sampled: Vec<_> = strokes.iter().map(|s| s.sample_uniform_with_widths(count, 0.0)).collect();
        Self::average(&sampled, count, false)
    }

    /// Averages oriented closed strokes into one closed stroke. Each stroke is
    /// sampled starting at its offset (a fraction of its arclength).
    pub fn glue_closed(strokes: &[Stroke2d], offsets: &[f64]) -> Self {
        let count = strokes.iter().map(|s| s.points.len()).max().unwrap_or(1).max(3);
        let sampled: Vec<_> = strokes
            .iter()
            .enumerate()
            .map(|(i, s)| s.sample_uniform_with_widths(count, offsets.get(i).copied().unwrap_or(0.0)))
            .collect();
        Self::average(&sampled, count, true)
    }

    fn average(sampled: &[Vec<(Point2<f64>, f64)>], count: usize, closed: bool) -> Self {
        let n = sampled.len().max(1) as f64;
        let mut points = Vec::with_capacity(count);
        let mut widths = Vec::with_capacity(count);
        for k in 0..count {
            let mut sum = Vector2::zeros();
            let mut width = 0.0;
            for samples in sampled {
                if let Some((p, w)) = samples.get(k) {
                    sum += p.coords;
                    width += w;
                }
            }
            points.push(Point2::from(sum / n));
            widths.push(width / n);
        }
        Self::new(points, widths, closed)
    }

    /// All intersection points between the control polylines of two
    /// strokes. Intersections closer than `tolerance` to an already found
    /// one are merged.
    pub fn intersections(&self, other: &Stroke2d, tolerance: f64) -> Vec<StrokeIntersection> {
        let pts1 = self.control_polyline();
        let pts2 = other.control_polyline();
        let mut result: Vec<StrokeIntersection> = Vec::new();
        for i in 0..pts1.len().saturating_sub(1) {
            for j in 0..pts2.len().saturating_sub(1) {
                let Some((t, u)) =
                    geometry::segment_intersection(&pts1[i], &pts1[i + 1], &pts2[j], &pts2[j + 1])
                else {
                    continue;
                };
                let position = pts1[i] + (pts1[i + 1] - pts1[i]) * t;
                if result.iter().any(|r| (r.position - position).norm() <= tolerance) {
                    continue;
                }
                result.push(StrokeIntersection {
                    position,
                    param1: CurveParameter::new(i, t),
                    param2: CurveParameter::new(j, u),
                });
            }
        }
        result
    }

    /// Arclength from the start of the stroke to the given parameter.
    pub fn arclength_at(&self, param: CurveParameter) -> f64 {
        let lengths = self.cumulative_lengths();
        let i = param.segment_index.min(lengths.len().saturating_sub(2));
        match (lengths.get(i), lengths.get(i + 1)) {
            (Some(l0), Some(l1)) => l0 + (l1 - l0) * param.u,
            _ => 0.0,
        }
    }
}
