// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangle-fan base layer.
//!
//! Every polygon `V` of length `n` becomes `n - 2` triangles fanned around an
//! anchor vertex: the smallest vertex index of `V` that differs from the
//! anchor of the previous polygon. Because consecutive polygons never share
//! an anchor, a reader can regroup the flat triangle list by `triangle[0]`
//! and recover each polygon, rotated to start at its anchor.
//!
//! Polygons with fewer than 3 vertices produce no triangles and do not
//! change the previous anchor. If the exclusion leaves no candidate the
//! anchor falls back to `V[0]`; a store face has at least 3 distinct
//! vertices, so this only concerns raw polygon input.

use serde::{Deserialize, Serialize};

use crate::codec::DenseIndex;
use crate::keys::VertexKey;
use crate::store::MeshStore;

/// Emits fans while remembering the previous anchor.
#[derive(Debug, Default, Clone)]
pub struct FanEncoder {
    previous_anchor: Option<u32>,
}

impl FanEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the fan of one polygon to `out` and returns the number of
    /// triangles written.
    pub fn push(&mut self, polygon: &[u32], out: &mut Vec<[u32; 3]>) -> usize {
        let n = polygon.len();
        if n < 3 {
            return 0;
        }

        let k = anchor_position(polygon, self.previous_anchor);
        for j in 2..n {
            out.push([polygon[k], polygon[(k + j - 1) % n], polygon[(k + j) % n]]);
        }
        self.previous_anchor = Some(polygon[k]);
        n - 2
    }
}

/// Position in `polygon` of the smallest index not equal to `excluded`.
fn anchor_position(polygon: &[u32], excluded: Option<u32>) -> usize {
    polygon
        .iter()
        .enumerate()
        .filter(|&(_, &v)| Some(v) != excluded)
        .min_by_key(|&(_, &v)| v)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Triangulates polygons in order.
pub fn encode_fans<P: AsRef<[u32]>>(polygons: &[P]) -> Vec<[u32; 3]> {
    let mut encoder = FanEncoder::new();
    let mut triangles = Vec::new();
    for polygon in polygons {
        encoder.push(polygon.as_ref(), &mut triangles);
    }
    triangles
}

/// Regroups a fan-encoded triangle list into polygons.
///
/// Consecutive triangles with the same first vertex form one polygon. Each
/// triangle contributes the vertices not collected yet, in order.
pub fn decode_fans(triangles: &[[u32; 3]]) -> Vec<Vec<u32>> {
    fan_runs(triangles).into_iter().map(|(_, p)| p).collect()
}

/// Polygons with the index of their first triangle.
fn fan_runs(triangles: &[[u32; 3]]) -> Vec<(usize, Vec<u32>)> {
    let mut runs: Vec<(usize, Vec<u32>)> = Vec::new();
    for (t, &[anchor, b, c]) in triangles.iter().enumerate() {
        let continues = matches!(runs.last(), Some((_, polygon)) if polygon[0] == anchor);
        if !continues {
            runs.push((t, vec![anchor]));
        }
        if let Some((_, polygon)) = runs.last_mut() {
            for v in [b, c] {
                if !polygon.contains(&v) {
                    polygon.push(v);
                }
            }
        }
    }
    runs
}

/// The plain triangulated form of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplicitMesh {
    /// One position per vertex, in dense vertex order.
    pub positions: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
    /// Face material of every triangle; `0` when the face has none.
    pub materials: Vec<u32>,
}

impl ImplicitMesh {
    /// Triangulates every face of `store` in creation order.
    pub fn from_store(store: &MeshStore) -> Self {
        Self::from_dense(store, &DenseIndex::new(store))
    }

    pub(crate) fn from_dense(store: &MeshStore, index: &DenseIndex) -> Self {
        let positions = index
            .vertices
            .iter()
            .map(|&v| {
                let p = store.vertices[v].position;
                [p.x, p.y, p.z]
            })
            .collect();

        let mut encoder = FanEncoder::new();
        let mut triangles = Vec::new();
        let mut materials = Vec::new();
        for &face in &index.faces {
            let data = &store.faces[face];
            let polygon: Vec<u32> = store
                .boundary_walk(data)
                .map(|l| index.vertex_ids[&store.loops[l].vertex])
                .collect();
            let emitted = encoder.push(&polygon, &mut triangles);
            materials.extend(std::iter::repeat(data.material_index.unwrap_or(0)).take(emitted));
        }

        Self {
            positions,
            triangles,
            materials,
        }
    }

    /// Regroups the triangles into polygons.
    pub fn polygons(&self) -> Vec<Vec<u32>> {
        decode_fans(&self.triangles)
    }

    /// Rebuilds a store from the triangles alone.
    ///
    /// Only vertices and faces come back; edges are re-derived from the
    /// polygons. A polygon that cannot form a valid face is skipped with a
    /// warning.
    pub fn to_store(&self) -> MeshStore {
        let mut store = MeshStore::new();
        let vertices: Vec<VertexKey> = self
            .positions
            .iter()
            .map(|&p| store.add_vertex(p))
            .collect();

        let mut skipped = 0usize;
        for (first, polygon) in fan_runs(&self.triangles) {
            let keys: Option<Vec<VertexKey>> = polygon
                .iter()
                .map(|&i| vertices.get(i as usize).copied())
                .collect();
            let Some(keys) = keys else {
                tracing::warn!(triangle = first, "Fan references a missing vertex, skipping polygon");
                skipped += 1;
                continue;
            };

            match store.add_face(&keys) {
                Ok(face) => {
                    let material = self.materials.get(first).copied();
                    if let Err(e) = store.set_face_material(face, material) {
                        tracing::warn!(triangle = first, error = %e, "Dropping face material");
                    }
                }
                Err(e) => {
                    tracing::warn!(triangle = first, error = %e, "Cannot rebuild polygon, skipping");
                    skipped += 1;
                }
            }
        }

        tracing::debug!(
            vertices = store.vertex_count(),
            faces = store.face_count(),
            skipped,
            "Rebuilt mesh from implicit triangles"
        );
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::make_cube;

    #[test]
    fn triangle_is_its_own_fan() {
        assert_eq!(encode_fans(&[[4u32, 2, 7]]), vec![[2, 7, 4]]);
    }

    #[test]
    fn quad_fans_from_smallest_vertex() {
        let triangles = encode_fans(&[[5u32, 3, 8, 6]]);
        assert_eq!(triangles, vec![[3, 8, 6], [3, 6, 5]]);
        assert_eq!(decode_fans(&triangles), vec![vec![3, 8, 6, 5]]);
    }

    #[test]
    fn consecutive_faces_never_share_an_anchor() {
        // Both quads have vertex 0 as their smallest index.
        let polygons = [vec![0u32, 1, 2, 3], vec![0, 3, 4, 5], vec![0, 5, 6, 1]];
        let triangles = encode_fans(&polygons);

        let anchors: Vec<u32> = triangles.chunks(2).map(|fan| fan[0][0]).collect();
        assert_eq!(anchors, vec![0, 3, 0]);
        for pair in anchors.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }

        let decoded = decode_fans(&triangles);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[1], vec![3, 4, 5, 0]);
    }

    #[test]
    fn anchor_not_repeated_for_disjoint_faces() {
        let polygons: Vec<Vec<u32>> = (0..10u32)
            .map(|f| (0..5).map(|i| f * 5 + i).collect())
            .collect();
        let triangles = encode_fans(&polygons);
        let decoded = decode_fans(&triangles);
        assert_eq!(decoded, polygons);
    }

    #[test]
    fn short_polygons_emit_nothing_and_keep_previous_anchor() {
        let polygons = [vec![0u32, 1, 2], vec![7, 0], vec![0, 2, 3]];
        let triangles = encode_fans(&polygons);
        // The two-vertex polygon is dropped; the third face still avoids 0.
        assert_eq!(triangles, vec![[0, 1, 2], [2, 3, 0]]);
    }

    #[test]
    fn fallback_to_first_vertex_when_everything_is_excluded() {
        let mut encoder = FanEncoder::new();
        let mut out = Vec::new();
        encoder.push(&[2, 5, 9], &mut out);
        encoder.push(&[2, 2, 2], &mut out);
        assert_eq!(out[1], [2, 2, 2]);
    }

    #[test]
    fn cube_round_trips_through_fans() {
        let mut mesh = MeshStore::new();
        make_cube(&mut mesh).unwrap();

        let implicit = ImplicitMesh::from_store(&mesh);
        assert_eq!(implicit.positions.len(), 8);
        assert_eq!(implicit.triangles.len(), 12);
        assert_eq!(implicit.materials, vec![0; 12]);

        let polygons = implicit.polygons();
        assert_eq!(polygons.len(), 6);
        assert!(polygons.iter().all(|p| p.len() == 4));

        let rebuilt = implicit.to_store();
        assert_eq!(rebuilt.vertex_count(), 8);
        assert_eq!(rebuilt.edge_count(), 12);
        assert_eq!(rebuilt.face_count(), 6);
        rebuilt.validate().unwrap();
    }

    #[test]
    fn broken_polygons_are_skipped() {
        let implicit = ImplicitMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            triangles: vec![[0, 1, 2], [1, 2, 9]],
            materials: vec![3, 3],
        };
        let store = implicit.to_store();
        assert_eq!(store.face_count(), 1);
        let face = store.faces().next().unwrap();
        assert_eq!(store.face(face).unwrap().material_index, Some(3));
    }

    #[test]
    fn reserved_material_keeps_the_face() {
        let implicit = ImplicitMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            triangles: vec![[0, 1, 2]],
            materials: vec![u32::MAX],
        };
        let store = implicit.to_store();
        assert_eq!(store.face_count(), 1);
        let face = store.faces().next().unwrap();
        assert_eq!(store.face(face).unwrap().material_index, None);
    }
}
