// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Complex-wide settings.
//!
//! Settings are a plain value owned by the [`Complex`](crate::Complex). They
//! can be loaded from JSON, e.g. from an application preferences file:
//!
//! ```
//! use vacomplex::settings::{ComplexSettings, CurveSamplingQuality};
//!
//! let settings = ComplexSettings::from_json(
//!     r#"{ "sampling_quality": "High", "snap": { "falloff": 0.5 } }"#,
//! ).unwrap();
//! assert_eq!(settings.sampling_quality, CurveSamplingQuality::High);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How densely edge strokes are sampled for geometric queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurveSamplingQuality {
    /// Only the stroke control points are used.
    Disabled,
    Low,
    #[default]
    Medium,
    High,
}

impl CurveSamplingQuality {
    /// Number of samples generated per polyline segment (excluding the
    /// segment end point).
    pub fn samples_per_segment(&self) -> usize {
        match self {
            CurveSamplingQuality::Disabled => 1,
            CurveSamplingQuality::Low => 2,
            CurveSamplingQuality::Medium => 4,
            CurveSamplingQuality::High => 8,
        }
    }
}

/// Controls how an edge stroke is deformed when its end vertices move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapSettings {
    /// Fraction of the stroke arclength (in `(0, 1]`) over which the
    /// displacement of an end point fades out. `1.0` distributes the
    /// displacement linearly along the whole stroke.
    pub falloff: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self { falloff: 1.0 }
    }
}

impl SnapSettings {
    /// Weight of the start-point displacement at normalized arclength `s`.
    pub(crate) fn start_weight(&self, s: f64) -> f64 {
        let falloff = self.falloff.clamp(f64::EPSILON, 1.0);
        (1.0 - s / falloff).max(0.0)
    }

    /// Weight of the end-point displacement at normalized arclength `s`.
    pub(crate) fn end_weight(&self, s: f64) -> f64 {
        self.start_weight(1.0 - s)
    }
}

/// All settings applied across the cells of a complex.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexSettings {
    pub sampling_quality: CurveSamplingQuality,
    pub snap: SnapSettings,
}

impl ComplexSettings {
    /// Parses settings from JSON. Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes settings to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_json() {
        let settings = ComplexSettings::from_json("{}").unwrap();
        assert_eq!(settings, ComplexSettings::default());
    }

    #[test]
    fn json_round_trip() {
        let settings = ComplexSettings {
            sampling_quality: CurveSamplingQuality::Low,
            snap: SnapSettings { falloff: 0.25 },
        };
        let json = settings.to_json().unwrap();
        assert_eq!(ComplexSettings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(ComplexSettings::from_json("{ not json").is_err());
    }

    #[test]
    fn snap_weights() {
        let linear = SnapSettings::default();
        assert_eq!(linear.start_weight(0.0), 1.0);
        assert_eq!(linear.start_weight(1.0), 0.0);
        assert!((linear.end_weight(0.25) - 0.25).abs() < 1e-12);

        let short = SnapSettings { falloff: 0.5 };
        assert_eq!(short.start_weight(0.75), 0.0);
        assert!((short.start_weight(0.25) - 0.5).abs() < 1e-12);
    }
}
