// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D geometric primitives used by the topological operators.
//!
//! Winding numbers, segment intersections, polyline sampling and
//! axis-aligned bounding boxes. Cell-level queries built on top of these
//! (cycle winding numbers, containment ratios) live in [`crate::cycle`].

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Rule deciding whether a winding number is inside a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindingRule {
    #[default]
    Odd,
    NonZero,
    Positive,
    Negative,
}

impl WindingRule {
    pub fn is_inside(&self, winding_number: i64) -> bool {
        match self {
            WindingRule::Odd => winding_number % 2 != 0,
            WindingRule::NonZero => winding_number != 0,
            WindingRule::Positive => winding_number > 0,
            WindingRule::Negative => winding_number < 0,
        }
    }
}

/// Axis-aligned rectangle. An empty rectangle has `min > max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect2 {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Rect2 {
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::INFINITY, f64::INFINITY),
            max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_point(p: Point2<f64>) -> Self {
        Self { min: p, max: p }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.x - self.min.x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.y - self.min.y
        }
    }

    pub fn extend_point(&mut self, p: Point2<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn extend(&mut self, other: &Rect2) {
        if !other.is_empty() {
            self.extend_point(other.min);
            self.extend_point(other.max);
        }
    }

    /// Returns whether the two rectangles overlap (touching counts).
    pub fn intersects(&self, other: &Rect2) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

impl Default for Rect2 {
    fn default() -> Self {
        Self::empty()
    }
}

/// Z component of the cross product of two 2D vectors.
pub fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Signed contribution of the directed segment `a -> b` to the winding
/// number at `p`, using a horizontal ray towards `+x`.
///
/// Reversing the segment exactly negates the contribution, so summing over
/// the halfedges of a closed walk yields its winding number.
pub fn segment_winding_contribution(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> i64 {
    let side = cross(&(b - a), &(p - a));
    if a.y <= p.y && b.y > p.y {
        // Upward crossing, counted if p is strictly left.
        if side > 0.0 {
            return 1;
        }
    } else if a.y > p.y && b.y <= p.y {
        // Downward crossing, counted if p is strictly right.
        if side < 0.0 {
            return -1;
        }
    }
    0
}

/// Winding number of a polyline (closed or not) at `p`.
pub fn polyline_winding_contribution(points: &[Point2<f64>], p: &Point2<f64>) -> i64 {
    points
        .windows(2)
        .map(|w| segment_winding_contribution(&w[0], &w[1], p))
        .sum()
}

/// Intersection parameters `(t, u)` of segments `a1-b1` and `a2-b2`, with
/// both parameters in `[0, 1]`. Parallel segments never intersect.
pub fn segment_intersection(
    a1: &Point2<f64>,
    b1: &Point2<f64>,
    a2: &Point2<f64>,
    b2: &Point2<f64>,
) -> Option<(f64, f64)> {
    let d1 = b1 - a1;
    let d2 = b2 - a2;
    let denom = cross(&d1, &d2);
    if denom == 0.0 {
        return None;
    }
    let w = a2 - a1;
    let t = cross(&w, &d2) / denom;
    let u = cross(&w, &d1) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((t, u))
    } else {
        None
    }
}

/// Tests whether the semi-open segments `[a1, b1)` and `[a2, b2)` intersect.
///
/// Semi-open segments let consecutive segments of a polyline be tested
/// without counting their shared point twice.
pub fn fast_semi_open_segment_intersects(
    a1: &Point2<f64>,
    b1: &Point2<f64>,
    a2: &Point2<f64>,
    b2: &Point2<f64>,
) -> bool {
    let d1 = b1 - a1;
    let d2 = b2 - a2;
    let denom = cross(&d1, &d2);
    if denom == 0.0 {
        return false;
    }
    let w = a2 - a1;
    let t = cross(&w, &d2) / denom;
    let u = cross(&w, &d1) / denom;
    (0.0..1.0).contains(&t) && (0.0..1.0).contains(&u)
}

/// Cumulative arclengths of a polyline, starting at `0.0`.
pub fn cumulative_lengths(points: &[Point2<f64>]) -> Vec<f64> {
    let mut result = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            total += (p - points[i - 1]).norm();
        }
        result.push(total);
    }
    result
}

/// Point at arclength `s` along a polyline, clamped to its ends.
pub fn polyline_point_at(points: &[Point2<f64>], lengths: &[f64], s: f64) -> Point2<f64> {
    match points.len() {
        0 => Point2::origin(),
        1 => points[0],
        n => {
            let i = lengths.partition_point(|&l| l <= s).clamp(1, n - 1);
            let l0 = lengths[i - 1];
            let seg = lengths[i] - l0;
            let u = if seg > 0.0 { ((s - l0) / seg).clamp(0.0, 1.0) } else { 0.0 };
            points[i - 1] + (points[i] - points[i - 1]) * u
        }
    }
}

/// Samples `count` points uniformly by arclength along a polyline,
/// including both ends.
pub fn sample_polyline_uniformly(points: &[Point2<f64>], count: usize) -> Vec<Point2<f64>> {
    if points.is_empty() || count == 0 {
        return Vec::new();
    }
    let lengths = cumulative_lengths(points);
    let total = lengths.last().copied().unwrap_or(0.0);
    if count == 1 {
        return vec![points[0]];
    }
    (0..count)
        .map(|k| polyline_point_at(points, &lengths, total * k as f64 / (count - 1) as f64))
        .collect()
}

/// Unit vector at angle `angle` (radians).
pub fn direction(angle: f64) -> Vector2<f64> {
    Vector2::new(angle.cos(), angle.sin())
}
