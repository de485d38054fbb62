// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # VAComplex
//!
//! Vector Animation Complex: a 2D cell complex of vertices, edges and faces
//! for vector illustration, with topological editing operators.
//!
//! Nodes (groups and cells) are stored in an arena keyed by generational
//! [`NodeKey`]s, with bidirectional boundary/star incidence. Cells are key
//! cells (existing at one time) or inbetween cells (spanning a time
//! interval). A key face is bounded by [`KeyCycle`]s: closed walks of
//! [`KeyHalfedge`]s, or a single Steiner vertex.
//!
//! All mutations go through an [`Operations`] scope. The engine methods of
//! [`Operations`] are the raw operators (cut, glue, uncut, delete, simplify,
//! intersect, ordering); the [`ops`] module wraps them with argument
//! validation returning [`Result`]. When the outermost scope ends, derived
//! geometry is refreshed and a single [`ComplexDiff`] is emitted to the
//! listeners registered with [`Complex::on_nodes_changed`].
//!
//! ## Core Types
//!
//! - [`Complex`]: the arena, the root group and the settings
//! - [`Node`], [`Cell`], [`CellKind`]: node storage and cell variants
//! - [`KeyEdgeData`] / [`Stroke2d`]: edge geometry and properties
//! - [`ComplexDiff`]: created/destroyed/inserted/modified nodes of a scope

pub mod complex;
pub mod cycle;
pub mod data;
pub mod diff;
pub mod error;
pub mod geometry;
pub mod keys;
pub mod node;
pub mod operations;
pub mod ops;
pub mod properties;
pub mod settings;
pub mod stroke;
pub mod traversal;

pub use complex::{Children, Complex};
pub use cycle::{KeyCycle, KeyFaceVertexUsageIndex, KeyHalfedge, KeyPath};
pub use data::{KeyEdgeData, KeyFaceData};
pub use diff::{ComplexDiff, NodeModificationFlags};
pub use error::{Error, Result};
pub use geometry::{Rect2, WindingRule};
pub use keys::{
    AnimTime, CellSpatialType, CellTemporalType, CellType, ListenerKey, NodeInsertionType,
    NodeKey,
};
pub use node::{
    Cell, CellKind, Group, InbetweenEdge, InbetweenFace, InbetweenVertex, KeyEdge, KeyFace,
    KeyVertex, Node, NodeKind, TimeSpan,
};
pub use operations::{
    CutEdgeResult, CutFaceResult, IntersectResult, IntersectSettings, OneCycleCutPolicy,
    Operations, OperationsScope, TwoCycleCutPolicy, UncutAtKeyEdgeResult, UncutAtKeyVertexResult,
    UnglueKeyEdgesResult, UnglueKeyVerticesResult,
};
pub use properties::{CellProperties, PropertyValue};
pub use settings::{ComplexSettings, CurveSamplingQuality, SnapSettings};
pub use stroke::{CurveParameter, Stroke2d, StrokeIntersection};
pub use traversal::RingHalfedge;
