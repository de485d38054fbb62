// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Checked operations.
//!
//! Each function validates its arguments against the complex (existence,
//! cell types, parent/sibling relations, cycle validity, usage indices)
//! before opening an operations scope, so a returned `Err` means the complex
//! was not touched. Functions accept either a [`Complex`] (one outer scope
//! per call) or an [`Operations`] scope (nested, emitting a single diff when
//! the outer scope ends).
//!
//! ```
//! use nalgebra::Point2;
//! use vacomplex::{ops, Complex, KeyEdgeData};
//!
//! let mut complex = Complex::new();
//! let root = complex.root_group().ok_or(vacomplex::Error::NullRoot)?;
//! let a = ops::create_key_vertex(&mut complex, Point2::new(0.0, 0.0), root, None, 0.0)?;
//! let b = ops::create_key_vertex(&mut complex, Point2::new(1.0, 0.0), root, None, 0.0)?;
//! let data = KeyEdgeData::from_points(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]);
//! let e = ops::create_key_open_edge(&mut complex, a, b, data, root, None)?;
//! assert_eq!(complex.find_cell(a).map(|c| c.star().len()), Some(1));
//! assert!(complex.key_edge(e).is_some());
//! # Ok::<(), vacomplex::Error>(())
//! ```

use nalgebra::Point2;
use rustc_hash::FxHashSet;

use crate::complex::Complex;
use crate::cycle::{KeyCycle, KeyFaceVertexUsageIndex, KeyHalfedge};
use crate::data::KeyEdgeData;
use crate::error::{Error, Result};
use crate::keys::{AnimTime, CellType, NodeKey};
use crate::node::{Node, TimeSpan};
use crate::operations::{
    CutEdgeResult, CutFaceResult, IntersectResult, IntersectSettings, OneCycleCutPolicy, Operations,
    OperationsScope, TwoCycleCutPolicy, UncutAtKeyEdgeResult, UncutAtKeyVertexResult,
    UnglueKeyEdgesResult, UnglueKeyVerticesResult,
};
use crate::properties::PropertyValue;
use crate::settings::CurveSamplingQuality;
use crate::stroke::CurveParameter;

// ============================================================================
// Validation helpers
// ============================================================================

fn check_node(complex: &Complex, key: NodeKey) -> Result<&Node> {
    complex.find(key).ok_or(Error::NodeNotFound(key))
}

fn check_group(complex: &Complex, key: NodeKey) -> Result<()> {
    match check_node(complex, key)?.as_group() {
        Some(_) => Ok(()),
        None => Err(Error::NotAGroup(key)),
    }
}

fn check_cell(complex: &Complex, key: NodeKey) -> Result<CellType> {
    check_node(complex, key)?
        .as_cell()
        .map(|c| c.cell_type())
        .ok_or(Error::NotACell(key))
}

fn check_cell_type(complex: &Complex, key: NodeKey, expected: CellType) -> Result<()> {
    let found = check_cell(complex, key)?;
    if found != expected {
        return Err(Error::WrongCellType { key, expected, found });
    }
    Ok(())
}

fn check_all_cell_type(complex: &Complex, keys: &[NodeKey], expected: CellType) -> Result<()> {
    keys.iter()
        .try_for_each(|k| check_cell_type(complex, *k, expected))
}

fn check_insertion(complex: &Complex, parent: NodeKey, next_sibling: Option<NodeKey>) -> Result<()> {
    check_group(complex, parent)?;
    if let Some(ns) = next_sibling {
        check_node(complex, ns)?;
        if complex.parent(ns) != Some(parent) {
            return Err(Error::NotAChild { child: ns, parent });
        }
    }
    Ok(())
}

fn check_cycle(complex: &Complex, cycle: &KeyCycle) -> Result<()> {
    if let Some(kv) = cycle.steiner_vertex() {
        check_cell_type(complex, kv, CellType::KeyVertex)?;
    }
    for h in cycle.halfedges() {
        check_cell_type(complex, h.edge, CellType::KeyEdge)?;
    }
    if !cycle.is_valid(complex) {
        return Err(Error::InvalidCycle);
    }
    Ok(())
}

fn check_usage(complex: &Complex, kf: NodeKey, index: KeyFaceVertexUsageIndex) -> Result<NodeKey> {
    complex
        .key_face_vertex(kf, index)
        .ok_or(Error::InvalidUsageIndex {
            cycle: index.cycle_index,
            component: index.component_index,
        })
}

fn check_open_edge(complex: &Complex, ke: NodeKey, open: bool) -> Result<()> {
    check_cell_type(complex, ke, CellType::KeyEdge)?;
    let is_closed = complex.key_edge(ke).is_some_and(|e| e.is_closed());
    match (open, is_closed) {
        (true, true) => Err(Error::Logic(format!("key edge {ke:?} is closed"))),
        (false, false) => Err(Error::Logic(format!("key edge {ke:?} is open"))),
        _ => Ok(()),
    }
}

/// Returns the common parent of `nodes`.
fn check_same_parent(complex: &Complex, nodes: &[NodeKey]) -> Result<Option<NodeKey>> {
    let mut parent = None;
    for &n in nodes {
        check_node(complex, n)?;
        let p = complex.parent(n);
        match parent {
            None => parent = Some(p),
            Some(q) if q != p => return Err(Error::MixedGroups),
            Some(_) => {}
        }
    }
    Ok(parent.flatten())
}

fn check_all_exist(complex: &Complex, nodes: &[NodeKey]) -> Result<()> {
    nodes.iter().try_for_each(|n| check_node(complex, *n).map(|_| ()))
}

fn infeasible(what: &str) -> Error {
    Error::Logic(format!("{what} failed"))
}

// ============================================================================
// Creation
// ============================================================================

pub fn create_group<S>(scope: &mut S, parent: NodeKey, next_sibling: Option<NodeKey>) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    check_insertion(scope.complex(), parent, next_sibling)?;
    scope
        .operations()
        .create_group(parent, next_sibling)
        .ok_or_else(|| infeasible("create_group"))
}

pub fn create_key_vertex<S>(
    scope: &mut S,
    position: Point2<f64>,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
    t: AnimTime,
) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    check_insertion(scope.complex(), parent, next_sibling)?;
    scope
        .operations()
        .create_key_vertex(position, parent, next_sibling, t)
        .ok_or_else(|| infeasible("create_key_vertex"))
}

pub fn create_key_open_edge<S>(
    scope: &mut S,
    start: NodeKey,
    end: NodeKey,
    data: KeyEdgeData,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_cell_type(complex, start, CellType::KeyVertex)?;
    check_cell_type(complex, end, CellType::KeyVertex)?;
    check_insertion(complex, parent, next_sibling)?;
    if data.is_closed() {
        return Err(Error::Logic("open edge created with a closed stroke".into()));
    }
    scope
        .operations()
        .create_key_open_edge(start, end, data, parent, next_sibling)
        .ok_or_else(|| infeasible("create_key_open_edge"))
}

pub fn create_key_closed_edge<S>(
    scope: &mut S,
    data: KeyEdgeData,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
    t: AnimTime,
) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    check_insertion(scope.complex(), parent, next_sibling)?;
    scope
        .operations()
        .create_key_closed_edge(data, parent, next_sibling, t)
        .ok_or_else(|| infeasible("create_key_closed_edge"))
}

pub fn create_key_face<S>(
    scope: &mut S,
    cycles: Vec<KeyCycle>,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
    t: AnimTime,
) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_insertion(complex, parent, next_sibling)?;
    for cycle in &cycles {
        check_cycle(complex, cycle)?;
    }
    scope
        .operations()
        .create_key_face(cycles, parent, next_sibling, t)
        .ok_or_else(|| infeasible("create_key_face"))
}

pub fn add_cycle_to_face<S>(scope: &mut S, kf: NodeKey, cycle: KeyCycle) -> Result<()>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_cell_type(complex, kf, CellType::KeyFace)?;
    check_cycle(complex, &cycle)?;
    scope.operations().add_cycle_to_face(kf, cycle);
    Ok(())
}

pub fn create_inbetween_vertex<S>(
    scope: &mut S,
    key_vertex_before: NodeKey,
    key_vertex_after: NodeKey,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_cell_type(complex, key_vertex_before, CellType::KeyVertex)?;
    check_cell_type(complex, key_vertex_after, CellType::KeyVertex)?;
    check_insertion(complex, parent, next_sibling)?;
    scope
        .operations()
        .create_inbetween_vertex(key_vertex_before, key_vertex_after, parent, next_sibling)
        .ok_or_else(|| infeasible("create_inbetween_vertex"))
}

pub fn create_inbetween_edge<S>(
    scope: &mut S,
    boundary: &[NodeKey],
    time_span: TimeSpan,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    for &b in boundary {
        check_cell(complex, b)?;
    }
    check_insertion(complex, parent, next_sibling)?;
    scope
        .operations()
        .create_inbetween_edge(boundary, time_span, parent, next_sibling)
        .ok_or_else(|| infeasible("create_inbetween_edge"))
}

pub fn create_inbetween_face<S>(
    scope: &mut S,
    boundary: &[NodeKey],
    time_span: TimeSpan,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    for &b in boundary {
        check_cell(complex, b)?;
    }
    check_insertion(complex, parent, next_sibling)?;
    scope
        .operations()
        .create_inbetween_face(boundary, time_span, parent, next_sibling)
        .ok_or_else(|| infeasible("create_inbetween_face"))
}

// ============================================================================
// Edits
// ============================================================================

/// Moves a key vertex. Returns whether the position changed.
pub fn set_key_vertex_position<S>(scope: &mut S, kv: NodeKey, position: Point2<f64>) -> Result<bool>
where
    S: OperationsScope + ?Sized,
{
    check_cell_type(scope.complex(), kv, CellType::KeyVertex)?;
    Ok(scope.operations().set_key_vertex_position(kv, position))
}

pub fn set_key_edge_data<S>(scope: &mut S, ke: NodeKey, data: KeyEdgeData) -> Result<()>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_cell_type(complex, ke, CellType::KeyEdge)?;
    let is_closed = complex.key_edge(ke).is_some_and(|e| e.is_closed());
    if data.is_closed() != is_closed {
        return Err(Error::Logic(format!("stroke closedness does not match key edge {ke:?}")));
    }
    scope.operations().set_key_edge_data(ke, data);
    Ok(())
}

pub fn set_key_edge_sampling_quality<S>(scope: &mut S, ke: NodeKey, quality: CurveSamplingQuality) -> Result<bool>
where
    S: OperationsScope + ?Sized,
{
    check_cell_type(scope.complex(), ke, CellType::KeyEdge)?;
    Ok(scope.operations().set_key_edge_sampling_quality(ke, quality))
}

/// Sets a property on a key edge or key face. Returns whether the value
/// changed.
pub fn set_cell_property<S>(scope: &mut S, cell: NodeKey, name: &str, value: PropertyValue) -> Result<bool>
where
    S: OperationsScope + ?Sized,
{
    let found = check_cell(scope.complex(), cell)?;
    if !matches!(found, CellType::KeyEdge | CellType::KeyFace) {
        return Err(Error::WrongCellType {
            key: cell,
            expected: CellType::KeyEdge,
            found,
        });
    }
    Ok(scope.operations().set_cell_property(cell, name, value))
}

// ============================================================================
// Deletion and simplification
// ============================================================================

pub fn hard_delete<S>(scope: &mut S, nodes: &[NodeKey], delete_isolated_vertices: bool) -> Result<()>
where
    S: OperationsScope + ?Sized,
{
    check_all_exist(scope.complex(), nodes)?;
    scope.operations().hard_delete(nodes, delete_isolated_vertices);
    Ok(())
}

pub fn soft_delete<S>(scope: &mut S, nodes: &[NodeKey], delete_isolated_vertices: bool) -> Result<()>
where
    S: OperationsScope + ?Sized,
{
    check_all_exist(scope.complex(), nodes)?;
    scope.operations().soft_delete(nodes, delete_isolated_vertices);
    Ok(())
}

/// Uncuts the given vertices and edges where possible. Returns the cells
/// that could not be simplified.
pub fn simplify<S>(scope: &mut S, kvs: &[NodeKey], kes: &[NodeKey], smooth_joins: bool) -> Result<Vec<NodeKey>>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_all_cell_type(complex, kvs, CellType::KeyVertex)?;
    check_all_cell_type(complex, kes, CellType::KeyEdge)?;
    Ok(scope.operations().simplify(kvs, kes, smooth_joins))
}

// ============================================================================
// Glue and unglue
// ============================================================================

pub fn glue_key_vertices<S>(scope: &mut S, kvs: &[NodeKey], position: Point2<f64>) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    if kvs.is_empty() {
        return Err(Error::Logic("no vertices to glue".into()));
    }
    check_all_cell_type(scope.complex(), kvs, CellType::KeyVertex)?;
    scope
        .operations()
        .glue_key_vertices(kvs, position)
        .ok_or_else(|| infeasible("glue_key_vertices"))
}

pub fn glue_key_open_edges<S>(scope: &mut S, kes: &[NodeKey]) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    if kes.is_empty() {
        return Err(Error::Logic("no edges to glue".into()));
    }
    let complex = scope.complex();
    for &ke in kes {
        check_open_edge(complex, ke, true)?;
    }
    scope
        .operations()
        .glue_key_open_edges(kes)
        .ok_or_else(|| infeasible("glue_key_open_edges"))
}

pub fn glue_key_open_halfedges<S>(scope: &mut S, khs: &[KeyHalfedge]) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    if khs.is_empty() {
        return Err(Error::Logic("no halfedges to glue".into()));
    }
    let complex = scope.complex();
    for h in khs {
        check_open_edge(complex, h.edge, true)?;
    }
    scope
        .operations()
        .glue_key_open_halfedges(khs)
        .ok_or_else(|| infeasible("glue_key_open_halfedges"))
}

pub fn glue_key_closed_edges<S>(scope: &mut S, kes: &[NodeKey]) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    if kes.is_empty() {
        return Err(Error::Logic("no edges to glue".into()));
    }
    let complex = scope.complex();
    for &ke in kes {
        check_open_edge(complex, ke, false)?;
    }
    scope
        .operations()
        .glue_key_closed_edges(kes)
        .ok_or_else(|| infeasible("glue_key_closed_edges"))
}

pub fn glue_key_closed_halfedges<S>(scope: &mut S, khs: &[KeyHalfedge]) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    if khs.is_empty() {
        return Err(Error::Logic("no halfedges to glue".into()));
    }
    let complex = scope.complex();
    for h in khs {
        check_open_edge(complex, h.edge, false)?;
    }
    scope
        .operations()
        .glue_key_closed_halfedges(khs)
        .ok_or_else(|| infeasible("glue_key_closed_halfedges"))
}

pub fn unglue_key_edges<S>(scope: &mut S, ke: NodeKey) -> Result<UnglueKeyEdgesResult>
where
    S: OperationsScope + ?Sized,
{
    check_cell_type(scope.complex(), ke, CellType::KeyEdge)?;
    Ok(scope.operations().unglue_key_edges(ke))
}

pub fn unglue_key_vertices<S>(scope: &mut S, kv: NodeKey) -> Result<UnglueKeyVerticesResult>
where
    S: OperationsScope + ?Sized,
{
    check_cell_type(scope.complex(), kv, CellType::KeyVertex)?;
    Ok(scope.operations().unglue_key_vertices(kv))
}

// ============================================================================
// Cut and uncut
// ============================================================================

fn check_edge_params(complex: &Complex, ke: NodeKey, params: &[CurveParameter]) -> Result<()> {
    check_cell_type(complex, ke, CellType::KeyEdge)?;
    let Some(edge) = complex.key_edge(ke) else {
        return Err(Error::NodeNotFound(ke));
    };
    let end = edge.data().stroke().end_parameter().to_scalar();
    for p in params {
        let s = p.to_scalar();
        if !(0.0..=end).contains(&s) {
            return Err(Error::Logic(format!("curve parameter {s} out of range [0, {end}]")));
        }
    }
    Ok(())
}

pub fn cut_edge<S>(scope: &mut S, ke: NodeKey, param: CurveParameter) -> Result<CutEdgeResult>
where
    S: OperationsScope + ?Sized,
{
    cut_edge_at(scope, ke, &[param])
}

pub fn cut_edge_at<S>(scope: &mut S, ke: NodeKey, params: &[CurveParameter]) -> Result<CutEdgeResult>
where
    S: OperationsScope + ?Sized,
{
    check_edge_params(scope.complex(), ke, params)?;
    scope
        .operations()
        .cut_edge_at(ke, params)
        .ok_or_else(|| infeasible("cut_edge_at"))
}

pub fn cut_glue_face<S>(
    scope: &mut S,
    kf: NodeKey,
    ke: NodeKey,
    one_cycle_policy: OneCycleCutPolicy,
    two_cycle_policy: TwoCycleCutPolicy,
) -> Result<CutFaceResult>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_cell_type(complex, kf, CellType::KeyFace)?;
    check_cell_type(complex, ke, CellType::KeyEdge)?;
    scope
        .operations()
        .cut_glue_face(kf, ke, one_cycle_policy, two_cycle_policy)
        .ok_or_else(|| Error::Logic(format!("edge {ke:?} does not connect two corners of face {kf:?}")))
}

pub fn cut_glue_face_with_halfedge<S>(
    scope: &mut S,
    kf: NodeKey,
    khe: KeyHalfedge,
    start_index: KeyFaceVertexUsageIndex,
    end_index: KeyFaceVertexUsageIndex,
    one_cycle_policy: OneCycleCutPolicy,
    two_cycle_policy: TwoCycleCutPolicy,
) -> Result<CutFaceResult>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_cell_type(complex, kf, CellType::KeyFace)?;
    check_open_edge(complex, khe.edge, true)?;
    let start_kv = check_usage(complex, kf, start_index)?;
    let end_kv = check_usage(complex, kf, end_index)?;
    if khe.start_vertex(complex) != Some(start_kv) || khe.end_vertex(complex) != Some(end_kv) {
        return Err(Error::Logic("halfedge ends do not match the usage indices".into()));
    }
    scope
        .operations()
        .cut_glue_face_with_halfedge(kf, khe, start_index, end_index, one_cycle_policy, two_cycle_policy)
        .ok_or_else(|| infeasible("cut_glue_face_with_halfedge"))
}

pub fn cut_face_with_closed_edge<S>(
    scope: &mut S,
    kf: NodeKey,
    data: KeyEdgeData,
    one_cycle_policy: OneCycleCutPolicy,
) -> Result<CutFaceResult>
where
    S: OperationsScope + ?Sized,
{
    check_cell_type(scope.complex(), kf, CellType::KeyFace)?;
    scope
        .operations()
        .cut_face_with_closed_edge(kf, data, one_cycle_policy)
        .ok_or_else(|| infeasible("cut_face_with_closed_edge"))
}

pub fn cut_face_with_open_edge<S>(
    scope: &mut S,
    kf: NodeKey,
    data: KeyEdgeData,
    start_index: KeyFaceVertexUsageIndex,
    end_index: KeyFaceVertexUsageIndex,
    one_cycle_policy: OneCycleCutPolicy,
    two_cycle_policy: TwoCycleCutPolicy,
) -> Result<CutFaceResult>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_cell_type(complex, kf, CellType::KeyFace)?;
    check_usage(complex, kf, start_index)?;
    check_usage(complex, kf, end_index)?;
    scope
        .operations()
        .cut_face_with_open_edge(kf, data, start_index, end_index, one_cycle_policy, two_cycle_policy)
        .ok_or_else(|| infeasible("cut_face_with_open_edge"))
}

pub fn cut_face_with_open_edge_between<S>(
    scope: &mut S,
    kf: NodeKey,
    data: KeyEdgeData,
    start_kv: NodeKey,
    end_kv: NodeKey,
    one_cycle_policy: OneCycleCutPolicy,
    two_cycle_policy: TwoCycleCutPolicy,
) -> Result<CutFaceResult>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_cell_type(complex, kf, CellType::KeyFace)?;
    check_cell_type(complex, start_kv, CellType::KeyVertex)?;
    check_cell_type(complex, end_kv, CellType::KeyVertex)?;
    let boundary = complex.find_cell(kf).map(|c| c.boundary()).unwrap_or_default();
    for kv in [start_kv, end_kv] {
        if !boundary.contains(&kv) {
            return Err(Error::Logic(format!("vertex {kv:?} is not in the boundary of face {kf:?}")));
        }
    }
    scope
        .operations()
        .cut_face_with_open_edge_between(kf, data, start_kv, end_kv, one_cycle_policy, two_cycle_policy)
        .ok_or_else(|| infeasible("cut_face_with_open_edge_between"))
}

pub fn cut_glue_face_with_vertex<S>(scope: &mut S, kf: NodeKey, kv: NodeKey) -> Result<()>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_cell_type(complex, kf, CellType::KeyFace)?;
    check_cell_type(complex, kv, CellType::KeyVertex)?;
    scope.operations().cut_glue_face_with_vertex(kf, kv);
    Ok(())
}

pub fn cut_face_with_vertex<S>(scope: &mut S, kf: NodeKey, position: Point2<f64>) -> Result<NodeKey>
where
    S: OperationsScope + ?Sized,
{
    check_cell_type(scope.complex(), kf, CellType::KeyFace)?;
    scope
        .operations()
        .cut_face_with_vertex(kf, position)
        .ok_or_else(|| infeasible("cut_face_with_vertex"))
}

pub fn uncut_at_key_vertex<S>(scope: &mut S, kv: NodeKey, smooth_join: bool) -> Result<UncutAtKeyVertexResult>
where
    S: OperationsScope + ?Sized,
{
    check_cell_type(scope.complex(), kv, CellType::KeyVertex)?;
    Ok(scope.operations().uncut_at_key_vertex(kv, smooth_join))
}

pub fn uncut_at_key_edge<S>(scope: &mut S, ke: NodeKey) -> Result<UncutAtKeyEdgeResult>
where
    S: OperationsScope + ?Sized,
{
    check_cell_type(scope.complex(), ke, CellType::KeyEdge)?;
    Ok(scope.operations().uncut_at_key_edge(ke))
}

// ============================================================================
// Intersection
// ============================================================================

pub fn intersect_with_group<S>(
    scope: &mut S,
    edges: &[NodeKey],
    group: Option<NodeKey>,
    settings: &IntersectSettings,
) -> Result<IntersectResult>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_all_cell_type(complex, edges, CellType::KeyEdge)?;
    if let Some(g) = group {
        check_group(complex, g)?;
    }
    if settings.tolerance.is_nan() || settings.tolerance < 0.0 {
        return Err(Error::Logic("intersection tolerance must be non-negative".into()));
    }
    Ok(scope.operations().intersect_with_group(edges, group, settings))
}

// ============================================================================
// Ordering
// ============================================================================

pub fn move_to_group<S>(scope: &mut S, node: NodeKey, parent: NodeKey, next_sibling: Option<NodeKey>) -> Result<bool>
where
    S: OperationsScope + ?Sized,
{
    let complex = scope.complex();
    check_node(complex, node)?;
    check_insertion(complex, parent, next_sibling)?;
    if complex.is_descendant_of(parent, node) {
        return Err(Error::CyclicParent { node, parent });
    }
    Ok(scope.operations().move_to_group(node, parent, next_sibling))
}

pub fn move_below_boundary<S>(scope: &mut S, node: NodeKey) -> Result<bool>
where
    S: OperationsScope + ?Sized,
{
    check_cell(scope.complex(), node)?;
    Ok(scope.operations().move_below_boundary(node))
}

fn check_ordering_input(complex: &Complex, nodes: &[NodeKey]) -> Result<()> {
    if check_same_parent(complex, nodes)?.is_none() && !nodes.is_empty() {
        return Err(Error::Logic("cannot reorder a node without parent".into()));
    }
    let unique: FxHashSet<NodeKey> = nodes.iter().copied().collect();
    if unique.len() != nodes.len() {
        return Err(Error::Logic("duplicate nodes".into()));
    }
    Ok(())
}

macro_rules! ordering_op {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub fn $name<S>(scope: &mut S, nodes: &[NodeKey], t: AnimTime) -> Result<bool>
        where
            S: OperationsScope + ?Sized,
        {
            check_ordering_input(scope.complex(), nodes)?;
            Ok(scope.operations().$name(nodes, t))
        }
    };
}

ordering_op!(
    /// Moves `nodes` (all children of the same group) and their boundary to
    /// the top of their group.
    bring_to_front
);
ordering_op!(
    /// Moves `nodes` (all children of the same group) and their star to the
    /// bottom of their group.
    send_to_back
);
ordering_op!(
    /// Moves `nodes` just above the next overlapping sibling.
    bring_forward
);
ordering_op!(
    /// Moves `nodes` just below the previous overlapping sibling.
    send_backward
);

/// Opens a scope on `scope` and runs `f` in it. Convenience for composing
/// several checked calls into one diff. Changes made before an error
/// returned by `f` are kept.
pub fn batch<S, R>(scope: &mut S, f: impl FnOnce(&mut Operations<'_>) -> Result<R>) -> Result<R>
where
    S: OperationsScope + ?Sized,
{
    let mut ops = scope.operations();
    f(&mut ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(a: (f64, f64), b: (f64, f64)) -> KeyEdgeData {
        KeyEdgeData::from_points(vec![Point2::new(a.0, a.1), Point2::new(b.0, b.1)])
    }

    // --- Validation tests ---

    #[test]
    fn stale_keys_are_reported() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let v = create_key_vertex(&mut complex, Point2::origin(), root, None, 0.0).unwrap();
        hard_delete(&mut complex, &[v], false).unwrap();
        let version = complex.version();
        let err = set_key_vertex_position(&mut complex, v, Point2::new(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(k) if k == v));
        assert_eq!(complex.version(), version);
    }

    #[test]
    fn wrong_types_are_reported() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let v = create_key_vertex(&mut complex, Point2::origin(), root, None, 0.0).unwrap();
        let err = create_key_vertex(&mut complex, Point2::origin(), v, None, 0.0).unwrap_err();
        assert!(matches!(err, Error::NotAGroup(_)));
        let err = uncut_at_key_edge(&mut complex, v).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongCellType {
                expected: CellType::KeyEdge,
                found: CellType::KeyVertex,
                ..
            }
        ));
        let err = uncut_at_key_vertex(&mut complex, root, false).unwrap_err();
        assert!(matches!(err, Error::NotACell(_)));
    }

    #[test]
    fn next_sibling_must_be_a_child() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let g = create_group(&mut complex, root, None).unwrap();
        let v = create_key_vertex(&mut complex, Point2::origin(), root, None, 0.0).unwrap();
        let err = create_key_vertex(&mut complex, Point2::origin(), g, Some(v), 0.0).unwrap_err();
        assert!(matches!(err, Error::NotAChild { child, parent } if child == v && parent == g));
    }

    #[test]
    fn invalid_cycles_are_rejected() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let a = create_key_vertex(&mut complex, Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
        let b = create_key_vertex(&mut complex, Point2::new(1.0, 0.0), root, None, 0.0).unwrap();
        let e = create_key_open_edge(&mut complex, a, b, line((0.0, 0.0), (1.0, 0.0)), root, None).unwrap();
        let cycle = KeyCycle::from_halfedges(vec![KeyHalfedge::new(e, true)]);
        let num_nodes = complex.num_nodes();
        let err = create_key_face(&mut complex, vec![cycle], root, None, 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidCycle));
        assert_eq!(complex.num_nodes(), num_nodes);

        let good = KeyCycle::from_halfedges(vec![KeyHalfedge::new(e, true), KeyHalfedge::new(e, false)]);
        assert!(create_key_face(&mut complex, vec![good], root, None, 0.0).is_ok());
    }

    #[test]
    fn invalid_usage_index_is_rejected() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let v = create_key_vertex(&mut complex, Point2::origin(), root, None, 0.0).unwrap();
        let f = create_key_face(&mut complex, vec![KeyCycle::from_steiner_vertex(v)], root, None, 0.0).unwrap();
        let err = cut_face_with_open_edge(
            &mut complex,
            f,
            line((0.0, 0.0), (0.0, 0.0)),
            KeyFaceVertexUsageIndex::new(0, 0),
            KeyFaceVertexUsageIndex::new(3, 0),
            OneCycleCutPolicy::Auto,
            TwoCycleCutPolicy::Auto,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidUsageIndex { cycle: 3, component: 0 }));
    }

    #[test]
    fn cyclic_parent_and_mixed_groups() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let g = create_group(&mut complex, root, None).unwrap();
        let inner = create_group(&mut complex, g, None).unwrap();
        let err = move_to_group(&mut complex, g, inner, None).unwrap_err();
        assert!(matches!(err, Error::CyclicParent { .. }));

        let v1 = create_key_vertex(&mut complex, Point2::origin(), root, None, 0.0).unwrap();
        let v2 = create_key_vertex(&mut complex, Point2::origin(), g, None, 0.0).unwrap();
        let err = bring_to_front(&mut complex, &[v1, v2], 0.0).unwrap_err();
        assert!(matches!(err, Error::MixedGroups));
    }

    #[test]
    fn cut_parameter_out_of_range() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let a = create_key_vertex(&mut complex, Point2::new(0.0, 0.0), root, None, 0.0).unwrap();
        let b = create_key_vertex(&mut complex, Point2::new(1.0, 0.0), root, None, 0.0).unwrap();
        let e = create_key_open_edge(&mut complex, a, b, line((0.0, 0.0), (1.0, 0.0)), root, None).unwrap();
        assert!(cut_edge(&mut complex, e, CurveParameter::new(3, 0.0)).is_err());
        assert!(complex.contains(e));
        let res = cut_edge(&mut complex, e, CurveParameter::new(0, 0.5)).unwrap();
        assert_eq!(res.edges.len(), 2);
    }

    // --- Scope tests ---

    #[test]
    fn batch_emits_one_diff() {
        let mut complex = Complex::new();
        let root = complex.root_group().unwrap();
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let seen = count.clone();
        complex.on_nodes_changed(move |_, _| seen.set(seen.get() + 1));
        let version = complex.version();
        batch(&mut complex, |ops| {
            let a = create_key_vertex(ops, Point2::new(0.0, 0.0), root, None, 0.0)?;
            let b = create_key_vertex(ops, Point2::new(1.0, 0.0), root, None, 0.0)?;
            create_key_open_edge(ops, a, b, line((0.0, 0.0), (1.0, 0.0)), root, None)
        })
        .unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(complex.version(), version + 1);
        assert_eq!(complex.edges().count(), 1);
    }
}
