// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric and styling data of key edges and key faces.
//!
//! The data is kept separate from topology: operations that split or merge
//! cells build the data of the new cells from the data of the old ones with
//! the constructors below (`from_slice`, `from_concat_step`, `from_glue_*`).

use nalgebra::Point2;

use crate::properties::CellProperties;
use crate::settings::{CurveSamplingQuality, SnapSettings};
use crate::stroke::{CurveParameter, Stroke2d};

/// Data of a key edge: its stroke and properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyEdgeData {
    stroke: Stroke2d,
    properties: CellProperties,
    sampling_quality: CurveSamplingQuality,
}

impl KeyEdgeData {
    pub fn new(stroke: Stroke2d) -> Self {
        Self {
            stroke,
            properties: CellProperties::default(),
            sampling_quality: CurveSamplingQuality::default(),
        }
    }

    /// Convenience constructor for an open polyline stroke.
    pub fn from_points(points: Vec<Point2<f64>>) -> Self {
        Self::new(Stroke2d::open(points))
    }

    /// Convenience constructor for a closed polyline stroke.
    pub fn from_closed_points(points: Vec<Point2<f64>>) -> Self {
        Self::new(Stroke2d::closed(points))
    }

    pub fn stroke(&self) -> &Stroke2d {
        &self.stroke
    }

    pub fn set_stroke(&mut self, stroke: Stroke2d) {
        self.stroke = stroke;
    }

    pub fn properties(&self) -> &CellProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut CellProperties {
        &mut self.properties
    }

    pub fn set_properties(&mut self, properties: CellProperties) {
        self.properties = properties;
    }

    pub fn sampling_quality(&self) -> CurveSamplingQuality {
        self.sampling_quality
    }

    pub fn set_sampling_quality(&mut self, quality: CurveSamplingQuality) -> bool {
        let changed = self.sampling_quality != quality;
        self.sampling_quality = quality;
        changed
    }

    pub fn is_closed(&self) -> bool {
        self.stroke.is_closed()
    }

    /// Sampled centerline according to the sampling quality.
    pub fn sample_centerline(&self) -> Vec<Point2<f64>> {
        self.stroke.sample_centerline(self.sampling_quality)
    }

    /// Data of the part of `data` between `from` and `to`.
    pub fn from_slice(
        data: &KeyEdgeData,
        from: CurveParameter,
        to: CurveParameter,
        num_wraps: usize,
    ) -> Self {
        Self {
            stroke: data.stroke.slice(from, to, num_wraps),
            properties: data.properties.clone(),
            sampling_quality: data.sampling_quality,
        }
    }

    /// Data of the concatenation of two directed edges. Properties are
    /// pending until [`Self::finalize_concat`].
    pub fn from_concat_step(
        first: (&KeyEdgeData, bool),
        second: (&KeyEdgeData, bool),
        smooth_join: bool,
    ) -> Self {
        let s1 = first.0.stroke.oriented(first.1);
        let s2 = second.0.stroke.oriented(second.1);
        let mut properties = CellProperties::default();
        properties.concat_step(&first.0.properties, s1.length());
        properties.concat_step(&second.0.properties, s2.length());
        Self {
            stroke: s1.concat(&s2, smooth_join),
            properties,
            sampling_quality: first.0.sampling_quality,
        }
    }

    /// Data of the glue of directed open edges.
    pub fn from_glue_open(khds: &[(&KeyEdgeData, bool)]) -> Self {
        let strokes: Vec<Stroke2d> = khds.iter().map(|(d, dir)| d.stroke.oriented(*dir)).collect();
        let mut properties = CellProperties::default();
        for ((data, _), stroke) in khds.iter().zip(&strokes) {
            properties.concat_step(&data.properties, stroke.length());
        }
        Self {
            stroke: Stroke2d::glue_open(&strokes),
            properties,
            sampling_quality: khds.first().map(|(d, _)| d.sampling_quality).unwrap_or_default(),
        }
    }

    /// Data of the glue of directed closed edges, each starting at its
    /// arclength fraction `u_offsets[i]`.
    pub fn from_glue_closed(khds: &[(&KeyEdgeData, bool)], u_offsets: &[f64]) -> Self {
        let strokes: Vec<Stroke2d> = khds.iter().map(|(d, dir)| d.stroke.oriented(*dir)).collect();
        let mut properties = CellProperties::default();
        for ((data, _), stroke) in khds.iter().zip(&strokes) {
            properties.concat_step(&data.properties, stroke.length());
        }
        Self {
            stroke: Stroke2d::glue_closed(&strokes, u_offsets),
            properties,
            sampling_quality: khds.first().map(|(d, _)| d.sampling_quality).unwrap_or_default(),
        }
    }

    /// Turns the stroke of a loop edge into a closed stroke.
    pub fn close_stroke(&mut self, smooth_join: bool) {
        self.stroke = self.stroke.close(smooth_join);
    }

    /// Moves the stroke end points onto the given vertex positions.
    pub fn snap(&mut self, start: Point2<f64>, end: Point2<f64>, settings: &SnapSettings) -> bool {
        self.stroke.snap(start, end, settings)
    }

    pub fn finalize_concat(&mut self) {
        self.properties.finalize_concat();
    }
}

/// Data of a key face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFaceData {
    properties: CellProperties,
}

impl KeyFaceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn properties(&self) -> &CellProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut CellProperties {
        &mut self.properties
    }

    pub fn set_properties(&mut self, properties: CellProperties) {
        self.properties = properties;
    }

    /// Accumulates the properties of two merged faces.
    pub fn assign_from_concat_step(&mut self, a: &KeyFaceData, b: &KeyFaceData) {
        self.properties = CellProperties::default();
        self.properties.concat_step(&a.properties, 1.0);
        self.properties.concat_step(&b.properties, 1.0);
    }

    pub fn finalize_concat(&mut self) {
        self.properties.finalize_concat();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::PropertyValue;

    #[test]
    fn concat_step_prefers_longer_edge_properties() {
        let mut short = KeyEdgeData::from_points(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]);
        short.properties_mut().set("color", PropertyValue::String("red".into()));
        let mut long = KeyEdgeData::from_points(vec![Point2::new(1.0, 0.0), Point2::new(9.0, 0.0)]);
        long.properties_mut().set("color", PropertyValue::String("blue".into()));

        let mut merged = KeyEdgeData::from_concat_step((&short, true), (&long, true), false);
        assert!(merged.properties().is_concat_pending());
        merged.finalize_concat();
        assert_eq!(
            merged.properties().get("color"),
            Some(&PropertyValue::String("blue".into()))
        );
        assert_eq!(merged.stroke().points().len(), 3);
    }

    #[test]
    fn concat_step_respects_directions() {
        let a = KeyEdgeData::from_points(vec![Point2::new(1.0, 0.0), Point2::new(0.0, 0.0)]);
        let b = KeyEdgeData::from_points(vec![Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)]);
        let merged = KeyEdgeData::from_concat_step((&a, false), (&b, true), false);
        assert_eq!(merged.stroke().start_point(), Point2::new(0.0, 0.0));
        assert_eq!(merged.stroke().end_point(), Point2::new(2.0, 0.0));
    }

    #[test]
    fn face_concat_step() {
        let mut a = KeyFaceData::new();
        a.properties_mut().set("fill", PropertyValue::Int(1));
        let b = KeyFaceData::new();
        let mut merged = KeyFaceData::new();
        merged.assign_from_concat_step(&a, &b);
        merged.finalize_concat();
        assert_eq!(merged.properties().get("fill"), Some(&PropertyValue::Int(1)));
    }
}
