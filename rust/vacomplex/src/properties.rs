// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed key-value properties attached to edge and face data.
//!
//! When cells are merged (uncut, glue), the merged cell receives the
//! properties of its inputs through a two-phase protocol: each input is
//! accumulated with a weight by a concat step, and [`CellProperties::finalize_concat`]
//! resolves every property to the value with the largest accumulated weight.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Double(f64),
    String(String),
    /// RGBA color with components in `[0, 1]`.
    Color([f32; 4]),
    List(Vec<PropertyValue>),
}

/// Properties of a cell, plus the pending state of an in-progress concat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellProperties {
    values: FxHashMap<String, PropertyValue>,
    #[serde(skip)]
    pending: Option<FxHashMap<String, Vec<(PropertyValue, f64)>>>,
}

impl PartialEq for CellProperties {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl CellProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Sets a property. Returns `true` if the stored value changed.
    pub fn set(&mut self, name: impl Into<String>, value: PropertyValue) -> bool {
        let name = name.into();
        if self.values.get(&name) == Some(&value) {
            return false;
        }
        self.values.insert(name, value);
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns whether concat steps were accumulated and not yet finalized.
    pub fn is_concat_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Accumulates the properties of `other` with the given weight.
    pub(crate) fn concat_step(&mut self, other: &CellProperties, weight: f64) {
        let pending = self.pending.get_or_insert_with(FxHashMap::default);
        for (name, value) in &other.values {
            let candidates = pending.entry(name.clone()).or_default();
            match candidates.iter_mut().find(|(v, _)| v == value) {
                Some((_, w)) => *w += weight,
                None => candidates.push((value.clone(), weight)),
            }
        }
    }

    /// Resolves accumulated concat steps. Each property takes the candidate
    /// with the largest total weight; ties keep the first accumulated value.
    pub fn finalize_concat(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        for (name, candidates) in pending {
            let mut best: Option<(PropertyValue, f64)> = None;
            for (value, weight) in candidates {
                if best.as_ref().map_or(true, |(_, w)| weight > *w) {
                    best = Some((value, weight));
                }
            }
            if let Some((value, _)) = best {
                self.values.insert(name, value);
            }
        }
    }
}
