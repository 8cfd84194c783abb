// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Three-state per-edge manifold classification.
//!
//! The encoded flag answers "is this edge shared by exactly two faces?" with
//! a third answer for exporters that skip the analysis. It counts faces on
//! the radial cycle and ignores winding; the orientation-aware test is
//! [`MeshStore::is_manifold`].

use serde::{Deserialize, Serialize};

use crate::config::EncodingConfig;
use crate::error::Result;
use crate::keys::EdgeKey;
use crate::store::MeshStore;

/// Encoded manifold status of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ManifoldState {
    /// Confirmed non-manifold: boundary, wire, or fin edge.
    NonManifold = 0,
    /// Confirmed 2-manifold: exactly two faces.
    Manifold = 1,
    /// Not analysed.
    Unknown = 255,
}

impl ManifoldState {
    /// The encoded byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses an encoded byte; only `0`, `1` and `255` are legal.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ManifoldState::NonManifold),
            1 => Some(ManifoldState::Manifold),
            255 => Some(ManifoldState::Unknown),
            _ => None,
        }
    }

    /// The inline-JSON form: `true`, `false` or `null`.
    pub fn as_flag(self) -> Option<bool> {
        match self {
            ManifoldState::NonManifold => Some(false),
            ManifoldState::Manifold => Some(true),
            ManifoldState::Unknown => None,
        }
    }

    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => ManifoldState::Manifold,
            Some(false) => ManifoldState::NonManifold,
            None => ManifoldState::Unknown,
        }
    }
}

/// Computes [`ManifoldState`] for edges of a store.
#[derive(Debug, Clone, Copy)]
pub struct ManifoldClassifier {
    preserve: bool,
}

impl ManifoldClassifier {
    /// A classifier that analyses every edge.
    pub fn new() -> Self {
        Self { preserve: true }
    }

    /// Follows `preserve_manifold_info`: when off every edge is unknown.
    pub fn from_config(config: &EncodingConfig) -> Self {
        Self {
            preserve: config.preserve_manifold_info,
        }
    }

    /// Classifies one edge from its radial cycle.
    ///
    /// Manifold means two loops on two different faces; a face running along
    /// the same edge twice does not count as a second face.
    pub fn classify(&self, store: &MeshStore, edge: EdgeKey) -> Result<ManifoldState> {
        if !self.preserve {
            // Still reject unknown keys.
            store.edge_radial_loops(edge)?;
            return Ok(ManifoldState::Unknown);
        }

        let faces = store.edge_faces(edge)?;
        Ok(self.classify_faces(&faces))
    }

    /// Classifies an edge from the faces of its radial loops, one entry per
    /// loop. Works on keys as well as dense indices.
    pub fn classify_faces<T: PartialEq>(&self, faces: &[T]) -> ManifoldState {
        if !self.preserve {
            return ManifoldState::Unknown;
        }
        match faces {
            [a, b] if a != b => ManifoldState::Manifold,
            _ => ManifoldState::NonManifold,
        }
    }
}

impl Default for ManifoldClassifier {
    fn default() -> Self {
        Self::new()
    }
}
