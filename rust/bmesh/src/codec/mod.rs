// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Encoding of a [`MeshStore`] into portable representations.
//!
//! Two layers are produced:
//!
//! - the **implicit** layer ([`implicit`]): a plain triangle list whose fans
//!   can be regrouped into the original polygons;
//! - the **explicit** layer ([`arrays`]): every record as flat, typed arrays
//!   with dense `u32` indices, serialized either inline ([`inline`]) or as
//!   aligned little-endian buffer views ([`binary`]).
//!
//! [`asset`] bundles both and picks the representation.
//!
//! All layers share one dense numbering of the store's elements: vertices
//! and edges in slot order, faces in creation order, and loops face by face,
//! each boundary starting at the face's head loop.

pub mod arrays;
pub mod asset;
pub mod binary;
pub mod implicit;
pub mod inline;

use rustc_hash::FxHashMap;

use crate::keys::*;
use crate::store::MeshStore;

/// Dense `u32` numbering of a store's live elements.
pub(crate) struct DenseIndex {
    pub vertices: Vec<VertexKey>,
    pub edges: Vec<EdgeKey>,
    pub loops: Vec<LoopKey>,
    pub faces: Vec<FaceKey>,
    pub vertex_ids: FxHashMap<VertexKey, u32>,
    pub edge_ids: FxHashMap<EdgeKey, u32>,
    pub loop_ids: FxHashMap<LoopKey, u32>,
    pub face_ids: FxHashMap<FaceKey, u32>,
}

impl DenseIndex {
    pub fn new(store: &MeshStore) -> Self {
        let vertices: Vec<VertexKey> = store.vertices.keys().collect();
        let edges: Vec<EdgeKey> = store.edges.keys().collect();
        let faces: Vec<FaceKey> = store.faces().collect();
        let loops: Vec<LoopKey> = faces
            .iter()
            .flat_map(|&f| store.boundary_walk(&store.faces[f]))
            .collect();

        Self {
            vertex_ids: numbering(&vertices),
            edge_ids: numbering(&edges),
            loop_ids: numbering(&loops),
            face_ids: numbering(&faces),
            vertices,
            edges,
            loops,
            faces,
        }
    }
}

fn numbering<K: std::hash::Hash + Eq + Copy>(keys: &[K]) -> FxHashMap<K, u32> {
    keys.iter()
        .enumerate()
        .map(|(i, &k)| (k, i as u32))
        .collect()
}
