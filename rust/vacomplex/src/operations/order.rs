// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Z-ordering: moving nodes between groups and among their siblings.
//!
//! Raising cells carries their boundary along so that edges stay above the
//! faces they bound; lowering cells carries their star along for the same
//! reason.

use rustc_hash::FxHashSet;

use super::Operations;
use crate::geometry::Rect2;
use crate::keys::{AnimTime, NodeKey};

impl Operations<'_> {
    /// Moves `node` into `parent`, before `next_sibling` (or last). Returns
    /// whether anything moved.
    pub fn move_to_group(&mut self, node: NodeKey, parent: NodeKey, next_sibling: Option<NodeKey>) -> bool {
        if self.complex.find_group(parent).is_none() || self.complex.is_descendant_of(parent, node) {
            return false;
        }
        if next_sibling.is_some_and(|ns| self.complex.parent(ns) != Some(parent)) {
            return false;
        }
        self.insert_node_(node, parent, next_sibling)
    }

    /// Moves `node` just below the bottom-most of its boundary cells among
    /// its siblings, or to the top when none of them is a sibling.
    pub fn move_below_boundary(&mut self, node: NodeKey) -> bool {
        let Some(parent) = self.parent_of_(node) else {
            return false;
        };
        let boundary: FxHashSet<NodeKey> = self.boundary_(node).into_iter().collect();
        let first = self.complex.children(parent).find(|k| boundary.contains(k));
        match first {
            Some(sibling) => self.insert_node_before_sibling_(node, sibling),
            None => self.insert_node_as_last_child_(node, parent),
        }
    }

    /// Moves `nodes` and their boundary (at time `t`) to the top of their
    /// group, keeping their relative order.
    pub fn bring_to_front(&mut self, nodes: &[NodeKey], t: AnimTime) -> bool {
        let Some((parent, moved)) = self.ordered_set_(nodes, t, true) else {
            return false;
        };
        self.bring_to_front_ordered_(parent, moved)
    }

    /// Moves `nodes` and their star (at time `t`) to the bottom of their
    /// group, keeping their relative order.
    pub fn send_to_back(&mut self, nodes: &[NodeKey], t: AnimTime) -> bool {
        let Some((parent, moved)) = self.ordered_set_(nodes, t, false) else {
            return false;
        };
        self.send_to_back_ordered_(parent, moved)
    }

    /// Moves `nodes` and their boundary just above the first sibling above
    /// them whose bounding box overlaps theirs at time `t`.
    pub fn bring_forward(&mut self, nodes: &[NodeKey], t: AnimTime) -> bool {
        let Some((parent, moved)) = self.ordered_set_(nodes, t, true) else {
            return false;
        };
        let Some(&top) = moved.last() else {
            return false;
        };
        let set: FxHashSet<NodeKey> = moved.iter().copied().collect();
        let bbox = self.union_bbox_(&moved);

        let mut found = None;
        let mut current = self.next_sibling_of_(top);
        while let Some(k) = current {
            if !set.contains(&k) && self.overlaps_at_(k, &bbox, t) {
                found = Some(k);
                break;
            }
            current = self.next_sibling_of_(k);
        }
        let Some(mut anchor) = found else {
            tracing::trace!("bring_forward: no overlapping sibling above");
            return self.bring_to_front_ordered_(parent, moved);
        };
        let mut changed = false;
        for node in moved {
            changed |= self.insert_node_after_sibling_(node, anchor);
            anchor = node;
        }
        changed
    }

    /// Moves `nodes` and their star just below the first sibling below them
    /// whose bounding box overlaps theirs at time `t`.
    pub fn send_backward(&mut self, nodes: &[NodeKey], t: AnimTime) -> bool {
        let Some((parent, moved)) = self.ordered_set_(nodes, t, false) else {
            return false;
        };
        let Some(&bottom) = moved.first() else {
            return false;
        };
        let set: FxHashSet<NodeKey> = moved.iter().copied().collect();
        let bbox = self.union_bbox_(&moved);

        let mut found = None;
        let mut current = self.complex.find(bottom).and_then(|n| n.previous_sibling());
        while let Some(k) = current {
            if !set.contains(&k) && self.overlaps_at_(k, &bbox, t) {
                found = Some(k);
                break;
            }
            current = self.complex.find(k).and_then(|n| n.previous_sibling());
        }
        let Some(anchor) = found else {
            tracing::trace!("send_backward: no overlapping sibling below");
            return self.send_to_back_ordered_(parent, moved);
        };
        let mut changed = false;
        for node in moved {
            changed |= self.insert_node_before_sibling_(node, anchor);
        }
        changed
    }

    fn bring_to_front_ordered_(&mut self, parent: NodeKey, moved: Vec<NodeKey>) -> bool {
        let mut changed = false;
        for node in moved {
            changed |= self.insert_node_as_last_child_(node, parent);
        }
        changed
    }

    fn send_to_back_ordered_(&mut self, parent: NodeKey, moved: Vec<NodeKey>) -> bool {
        let mut changed = false;
        for node in moved.into_iter().rev() {
            changed |= self.insert_node_as_first_child_(node, parent);
        }
        changed
    }

    /// The children of the parent of `nodes[0]` that are in `nodes`, or in
    /// the boundary (`with_boundary`) or star of `nodes` and exist at `t`,
    /// in bottom-to-top order.
    fn ordered_set_(&self, nodes: &[NodeKey], t: AnimTime, with_boundary: bool) -> Option<(NodeKey, Vec<NodeKey>)> {
        let parent = self.parent_of_(*nodes.first()?)?;
        let selected: FxHashSet<NodeKey> = nodes
            .iter()
            .copied()
            .filter(|n| self.complex.parent(*n) == Some(parent))
            .collect();
        let related = if with_boundary {
            self.complex.closure(&selected)
        } else {
            self.complex.opening(&selected)
        };
        let moved: Vec<NodeKey> = self
            .complex
            .children(parent)
            .filter(|k| {
                selected.contains(k)
                    || (related.contains(k) && self.complex.find_cell(*k).is_some_and(|c| c.exists_at(t)))
            })
            .collect();
        Some((parent, moved))
    }

    fn union_bbox_(&self, nodes: &[NodeKey]) -> Rect2 {
        let mut rect = Rect2::empty();
        for &n in nodes {
            rect.extend(&self.complex.bounding_box(n));
        }
        rect
    }

    fn overlaps_at_(&self, node: NodeKey, bbox: &Rect2, t: AnimTime) -> bool {
        let exists = match self.complex.find(node) {
            Some(n) => n.as_cell().map_or(true, |c| c.exists_at(t)),
            None => false,
        };
        exists && self.complex.bounding_box(node).intersects(bbox)
    }
}
