// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key types for arena-based mesh storage.
//!
//! Each mesh element gets a type-safe key for O(1) lookup in the store. Keys
//! are created by `slotmap::SlotMap` and stay valid while other elements are
//! removed (generational indices), so a stale key never aliases a new record.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a vertex (point in 3D space).
    pub struct VertexKey;

    /// Key for an edge (unordered vertex pair).
    pub struct EdgeKey;

    /// Key for a loop (one corner of one face).
    pub struct LoopKey;

    /// Key for a face (closed cycle of loops).
    pub struct FaceKey;
}

/// A key that can reference any mesh element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKey {
    Vertex(VertexKey),
    Edge(EdgeKey),
    Loop(LoopKey),
    Face(FaceKey),
}

impl ElementKey {
    /// Returns the element kind of this key.
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementKey::Vertex(_) => ElementKind::Vertex,
            ElementKey::Edge(_) => ElementKind::Edge,
            ElementKey::Loop(_) => ElementKind::Loop,
            ElementKey::Face(_) => ElementKind::Face,
        }
    }
}

/// Discriminant for mesh element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Vertex = 0,
    Edge = 1,
    Loop = 2,
    Face = 3,
}

impl ElementKind {
    /// All kinds, in encoding order.
    pub const ALL: [ElementKind; 4] = [
        ElementKind::Vertex,
        ElementKind::Edge,
        ElementKind::Loop,
        ElementKind::Face,
    ];

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Vertex => "Vertex",
            ElementKind::Edge => "Edge",
            ElementKind::Loop => "Loop",
            ElementKind::Face => "Face",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<VertexKey> for ElementKey {
    fn from(k: VertexKey) -> Self {
        ElementKey::Vertex(k)
    }
}

impl From<EdgeKey> for ElementKey {
    fn from(k: EdgeKey) -> Self {
        ElementKey::Edge(k)
    }
}

impl From<LoopKey> for ElementKey {
    fn from(k: LoopKey) -> Self {
        ElementKey::Loop(k)
    }
}

impl From<FaceKey> for ElementKey {
    fn from(k: FaceKey) -> Self {
        ElementKey::Face(k)
    }
}
