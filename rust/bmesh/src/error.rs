// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for mesh mutation and codec operations.

use crate::keys::{EdgeKey, ElementKey, FaceKey, VertexKey};

/// Result type alias for mesh operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during mesh mutation, encoding or decoding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --- Structural ---
    /// Vertex key not found in the store.
    #[error("vertex not found: {0:?}")]
    VertexNotFound(VertexKey),

    /// Edge key not found in the store.
    #[error("edge not found: {0:?}")]
    EdgeNotFound(EdgeKey),

    /// Face key not found in the store.
    #[error("face not found: {0:?}")]
    FaceNotFound(FaceKey),

    /// An element referenced by attribute access was not found.
    #[error("element not found: {0:?}")]
    ElementNotFound(ElementKey),

    /// A face needs at least 3 pairwise distinct vertices.
    #[error("invalid face: {0}")]
    InvalidFace(String),

    /// An edge cannot join a vertex to itself.
    #[error("edge endpoints must differ: {0:?}")]
    DegenerateEdge(VertexKey),

    /// The vertex pair is already connected by this edge.
    #[error("an edge already connects these vertices: {0:?}")]
    DuplicateEdge(EdgeKey),

    /// `u32::MAX` marks a face without material in encoded arrays.
    #[error("material index {0} is reserved")]
    ReservedMaterial(u32),

    /// An attribute layer keeps one layout per element kind.
    #[error("attribute `{name}` is {expected} on this element kind, got {found}")]
    AttributeTypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    // --- Codec ---
    /// An encoded index points past the end of its target array.
    #[error("{array}: index {index} out of range for count {count}")]
    IndexOutOfRange {
        array: &'static str,
        index: u32,
        count: usize,
    },

    /// Encoded navigation data does not describe closed, consistent cycles.
    #[error("topology corrupt: {0}")]
    TopologyCorrupt(String),

    /// Manifold byte outside `{0, 1, 255}`.
    #[error("edge {edge}: invalid manifold flag {value}")]
    InvalidManifoldFlag { edge: usize, value: u8 },

    /// An encoded array does not match its declared element count.
    #[error("{array}: expected {expected} values, found {found}")]
    LengthMismatch {
        array: String,
        expected: usize,
        found: usize,
    },

    /// A buffer view is out of bounds, misaligned, or badly sized.
    #[error("invalid buffer view: {0}")]
    InvalidBufferView(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
