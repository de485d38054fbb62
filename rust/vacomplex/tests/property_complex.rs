// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use nalgebra::Point2;
use proptest::prelude::*;
use vacomplex::{
    ops, CellType, Complex, CurveParameter, KeyCycle, KeyEdgeData, KeyFaceVertexUsageIndex, KeyHalfedge,
    NodeKey, OneCycleCutPolicy, TwoCycleCutPolicy,
};

#[derive(Clone, Debug)]
enum Op {
    AddVertex { x: i8, y: i8 },
    AddEdge { a: u16, b: u16 },
    CutEdge { idx: u16, u: u8 },
    CutFace { idx: u16, k: u16 },
    AddSteiner { idx: u16 },
    GlueVertices { a: u16, b: u16 },
    UnglueEdge { idx: u16 },
    UncutVertex { idx: u16 },
    UncutEdge { idx: u16 },
    HardDelete { idx: u16 },
    SoftDelete { idx: u16 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<i8>(), any::<i8>()).prop_map(|(x, y)| Op::AddVertex { x, y }),
        (any::<u16>(), any::<u16>()).prop_map(|(a, b)| Op::AddEdge { a, b }),
        (any::<u16>(), 1u8..255u8).prop_map(|(idx, u)| Op::CutEdge { idx, u }),
        (any::<u16>(), any::<u16>()).prop_map(|(idx, k)| Op::CutFace { idx, k }),
        any::<u16>().prop_map(|idx| Op::AddSteiner { idx }),
        (any::<u16>(), any::<u16>()).prop_map(|(a, b)| Op::GlueVertices { a, b }),
        any::<u16>().prop_map(|idx| Op::UnglueEdge { idx }),
        any::<u16>().prop_map(|idx| Op::UncutVertex { idx }),
        any::<u16>().prop_map(|idx| Op::UncutEdge { idx }),
        any::<u16>().prop_map(|idx| Op::HardDelete { idx }),
        any::<u16>().prop_map(|idx| Op::SoftDelete { idx }),
    ]
}

fn sequence_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..16)
}

#[derive(Default)]
struct ModelState {
    vertices: Vec<NodeKey>,
    edges: Vec<NodeKey>,
    faces: Vec<NodeKey>,
}

fn sync_state(complex: &Complex, state: &mut ModelState) {
    state.vertices = complex.vertices().collect();
    state.edges = complex.edges().collect();
    state.faces = complex.faces().collect();
}

fn pick(keys: &[NodeKey], idx: u16) -> Option<NodeKey> {
    if keys.is_empty() {
        None
    } else {
        Some(keys[idx as usize % keys.len()])
    }
}

fn position(complex: &Complex, kv: NodeKey) -> Point2<f64> {
    complex.key_vertex(kv).map(|v| v.position()).unwrap_or_else(Point2::origin)
}

fn seed_square(complex: &mut Complex) {
    let root = complex.root_group().unwrap();
    let corners = [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)];
    let vs: Vec<NodeKey> = corners
        .iter()
        .map(|(x, y)| ops::create_key_vertex(complex, Point2::new(*x, *y), root, None, 0.0).unwrap())
        .collect();
    let es: Vec<NodeKey> = (0..4)
        .map(|i| {
            let (a, b) = (vs[i], vs[(i + 1) % 4]);
            let data = KeyEdgeData::from_points(vec![position(complex, a), position(complex, b)]);
            ops::create_key_open_edge(complex, a, b, data, root, None).unwrap()
        })
        .collect();
    let cycle = KeyCycle::from_halfedges(es.iter().map(|e| KeyHalfedge::new(*e, true)).collect());
    ops::create_key_face(complex, vec![cycle], root, None, 0.0).unwrap();
}

fn apply_op(complex: &mut Complex, state: &ModelState, op: Op) {
    let Some(root) = complex.root_group() else {
        return;
    };
    match op {
        Op::AddVertex { x, y } => {
            let p = Point2::new(x as f64 * 0.1, y as f64 * 0.1);
            let _ = ops::create_key_vertex(complex, p, root, None, 0.0);
        }
        Op::AddEdge { a, b } => {
            let (Some(a), Some(b)) = (pick(&state.vertices, a), pick(&state.vertices, b)) else {
                return;
            };
            if a == b {
                return;
            }
            let data = KeyEdgeData::from_points(vec![position(complex, a), position(complex, b)]);
            let _ = ops::create_key_open_edge(complex, a, b, data, root, None);
        }
        Op::CutEdge { idx, u } => {
            let Some(ke) = pick(&state.edges, idx) else {
                return;
            };
            let _ = ops::cut_edge(complex, ke, CurveParameter::new(0, u as f64 / 255.0));
        }
        Op::CutFace { idx, k } => {
            let Some(kf) = pick(&state.faces, idx) else {
                return;
            };
            let Some(face) = complex.key_face(kf) else {
                return;
            };
            let Some(cycle) = face.cycles().first() else {
                return;
            };
            let halfedges = cycle.halfedges();
            if halfedges.len() < 3 {
                return;
            }
            let j = 1 + k as usize % (halfedges.len() - 1);
            let (Some(a), Some(b)) = (
                halfedges[0].start_vertex(complex),
                halfedges[j].start_vertex(complex),
            ) else {
                return;
            };
            let data = KeyEdgeData::from_points(vec![position(complex, a), position(complex, b)]);
            let _ = ops::cut_face_with_open_edge(
                complex,
                kf,
                data,
                KeyFaceVertexUsageIndex::new(0, 0),
                KeyFaceVertexUsageIndex::new(0, j),
                OneCycleCutPolicy::Auto,
                TwoCycleCutPolicy::Auto,
            );
        }
        Op::AddSteiner { idx } => {
            let Some(kf) = pick(&state.faces, idx) else {
                return;
            };
            let Some(face) = complex.key_face(kf) else {
                return;
            };
            let Some(cycle) = face.cycles().first() else {
                return;
            };
            let bbox = cycle.bounding_box(complex);
            let center = nalgebra::center(&bbox.min, &bbox.max);
            if center.x.is_finite() && center.y.is_finite() {
                let _ = ops::cut_face_with_vertex(complex, kf, center);
            }
        }
        Op::GlueVertices { a, b } => {
            let (Some(a), Some(b)) = (pick(&state.vertices, a), pick(&state.vertices, b)) else {
                return;
            };
            if a == b {
                return;
            }
            let p = nalgebra::center(&position(complex, a), &position(complex, b));
            let _ = ops::glue_key_vertices(complex, &[a, b], p);
        }
        Op::UnglueEdge { idx } => {
            if let Some(ke) = pick(&state.edges, idx) {
                let _ = ops::unglue_key_edges(complex, ke);
            }
        }
        Op::UncutVertex { idx } => {
            if let Some(kv) = pick(&state.vertices, idx) {
                let _ = ops::uncut_at_key_vertex(complex, kv, false);
            }
        }
        Op::UncutEdge { idx } => {
            if let Some(ke) = pick(&state.edges, idx) {
                let _ = ops::uncut_at_key_edge(complex, ke);
            }
        }
        Op::HardDelete { idx } => {
            let cells: Vec<NodeKey> = state.vertices.iter().chain(&state.edges).chain(&state.faces).copied().collect();
            if let Some(cell) = pick(&cells, idx) {
                let _ = ops::hard_delete(complex, &[cell], false);
            }
        }
        Op::SoftDelete { idx } => {
            let cells: Vec<NodeKey> = state.vertices.iter().chain(&state.edges).chain(&state.faces).copied().collect();
            if let Some(cell) = pick(&cells, idx) {
                let _ = ops::soft_delete(complex, &[cell], false);
            }
        }
    }
}

fn assert_invariants(complex: &Complex) {
    assert!(!complex.is_operation_in_progress());
    for key in complex.nodes_in_order() {
        let Some(cell) = complex.find_cell(key) else {
            continue;
        };

        // Boundary and star are mirror relations over existing cells.
        for b in cell.boundary() {
            let bc = complex.find_cell(*b);
            assert!(bc.is_some(), "{key:?} has dangling boundary cell {b:?}");
            assert!(bc.unwrap().star().contains(&key), "{key:?} not in star of {b:?}");
        }
        for s in cell.star() {
            let sc = complex.find_cell(*s);
            assert!(sc.is_some(), "{key:?} has dangling star cell {s:?}");
            assert!(sc.unwrap().boundary().contains(&key), "{key:?} not in boundary of {s:?}");
        }

        match cell.cell_type() {
            CellType::KeyEdge => {
                let ke = complex.key_edge(key).unwrap();
                if ke.is_closed() {
                    assert!(cell.boundary().is_empty());
                } else {
                    for kv in [ke.start_vertex(), ke.end_vertex()] {
                        let kv = kv.expect("open edge has end vertices");
                        assert!(complex.key_vertex(kv).is_some());
                        assert!(cell.boundary().contains(&kv));
                    }
                }
            }
            CellType::KeyFace => {
                let kf = complex.key_face(key).unwrap();
                for cycle in kf.cycles() {
                    assert!(cycle.is_valid(complex), "face {key:?} has an invalid cycle");
                    for khe in cycle.halfedges() {
                        assert!(cell.boundary().contains(&khe.edge));
                    }
                }
            }
            _ => {}
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn topological_edit_invariants(seq in sequence_strategy()) {
        let mut complex = Complex::new();
        seed_square(&mut complex);
        let mut state = ModelState::default();
        for op in seq {
            sync_state(&complex, &mut state);
            apply_op(&mut complex, &state, op);
            assert_invariants(&complex);
        }
    }
}
