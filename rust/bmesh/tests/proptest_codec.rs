// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property-based tests for the codec over random non-manifold meshes.

use bmesh_encoding::codec::binary::{pack, unpack};
use bmesh_encoding::codec::inline::InlineMesh;
use bmesh_encoding::*;
use proptest::prelude::*;
use proptest::sample::Index;

// =============================================================================
// Strategies
// =============================================================================

#[derive(Debug, Clone)]
struct MeshRecipe {
    positions: Vec<[f32; 3]>,
    polygons: Vec<Vec<usize>>,
    removals: Vec<Index>,
    weights: Vec<(Index, f32)>,
}

fn arb_recipe() -> impl Strategy<Value = MeshRecipe> {
    (4usize..12).prop_flat_map(|n| {
        let positions = prop::collection::vec(prop::array::uniform3(-10.0f32..10.0), n);
        let polygon = prop::sample::subsequence((0..n).collect::<Vec<_>>(), 3..=n.min(5))
            .prop_shuffle();
        let polygons = prop::collection::vec(polygon, 0..8);
        let removals = prop::collection::vec(any::<Index>(), 0..3);
        let weights = prop::collection::vec((any::<Index>(), -1.0f32..1.0), 0..4);
        (positions, polygons, removals, weights).prop_map(
            |(positions, polygons, removals, weights)| MeshRecipe {
                positions,
                polygons,
                removals,
                weights,
            },
        )
    })
}

fn build(recipe: &MeshRecipe) -> MeshStore {
    let mut mesh = MeshStore::new();
    let vertices: Vec<VertexKey> = recipe
        .positions
        .iter()
        .map(|&p| mesh.add_vertex(p))
        .collect();

    for polygon in &recipe.polygons {
        let keys: Vec<VertexKey> = polygon.iter().map(|&i| vertices[i]).collect();
        mesh.add_face(&keys).unwrap();
    }

    for index in &recipe.removals {
        let edges: Vec<EdgeKey> = mesh.edges().map(|(e, _)| e).collect();
        if edges.is_empty() {
            break;
        }
        mesh.remove_edge(edges[index.index(edges.len())]).unwrap();
    }

    for (index, weight) in &recipe.weights {
        let v = vertices[index.index(vertices.len())];
        mesh.set_attribute(v, "weight", AttributeValue::Float(vec![*weight]))
            .unwrap();
    }
    mesh
}

/// Descriptor JSON and buffer bytes of the buffer-view form.
fn packed(mesh: &MeshStore) -> (String, Vec<u8>) {
    let arrays = encode(mesh, &EncodingConfig::default());
    let mut buffer = Vec::new();
    let mut views = Vec::new();
    let encoding = pack(&arrays, &mut buffer, 0, &mut views);
    let json = serde_json::to_string(&(encoding, views)).unwrap();
    (json, buffer)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn proptest_round_trip_preserves_topology(recipe in arb_recipe()) {
        let mesh = build(&recipe);
        mesh.validate().unwrap();

        let config = EncodingConfig::default();
        let arrays = encode(&mesh, &config);
        let decoded = decode(&arrays).unwrap();

        prop_assert!(decoded.validate().is_ok());
        prop_assert_eq!(decoded.vertex_count(), mesh.vertex_count());
        prop_assert_eq!(decoded.edge_count(), mesh.edge_count());
        prop_assert_eq!(decoded.loop_count(), mesh.loop_count());
        prop_assert_eq!(decoded.face_count(), mesh.face_count());
        prop_assert_eq!(encode(&decoded, &config), arrays);
    }

    #[test]
    fn proptest_encoding_is_idempotent(recipe in arb_recipe()) {
        let mesh = build(&recipe);
        prop_assert_eq!(packed(&mesh), packed(&mesh));

        let decoded = decode(&encode(&mesh, &EncodingConfig::default())).unwrap();
        prop_assert_eq!(packed(&decoded), packed(&mesh));
    }

    #[test]
    fn proptest_buffer_form_round_trips(recipe in arb_recipe()) {
        let mesh = build(&recipe);
        let arrays = encode(&mesh, &EncodingConfig::default());
        let mut buffer = Vec::new();
        let mut views = Vec::new();
        let encoding = pack(&arrays, &mut buffer, 0, &mut views);

        for view in &views {
            prop_assert_eq!(view.byte_offset % 4, 0);
        }
        let unpacked = unpack(&encoding, &[&buffer], &views).unwrap();
        prop_assert_eq!(&unpacked, &arrays);
    }

    #[test]
    fn proptest_inline_form_round_trips(recipe in arb_recipe()) {
        let mesh = build(&recipe);
        let arrays = encode(&mesh, &EncodingConfig::default());
        let inline = InlineMesh::from_arrays(&arrays);
        let text = serde_json::to_string(&inline).unwrap();
        let parsed: InlineMesh = serde_json::from_str(&text).unwrap();

        let decoded = decode(&parsed.to_arrays().unwrap()).unwrap();
        prop_assert_eq!(decoded.face_count(), mesh.face_count());
        prop_assert_eq!(decoded.edge_count(), mesh.edge_count());
    }

    #[test]
    fn proptest_offsets_well_formed(recipe in arb_recipe()) {
        let mesh = build(&recipe);
        let arrays = encode(&mesh, &EncodingConfig::default());
        for (csr, count) in [
            (&arrays.faces.vertices, mesh.face_count()),
            (&arrays.faces.loops, mesh.face_count()),
            (&arrays.vertices.edges, mesh.vertex_count()),
            (&arrays.edges.faces, mesh.edge_count()),
        ] {
            prop_assert_eq!(csr.offsets.len(), count + 1);
            prop_assert_eq!(csr.offsets[0], 0);
            prop_assert!(csr.offsets.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn proptest_implicit_fans_regroup(recipe in arb_recipe()) {
        let mesh = build(&recipe);
        let implicit = ImplicitMesh::from_store(&mesh);
        let polygons = implicit.polygons();

        prop_assert_eq!(polygons.len(), mesh.face_count());
        for (polygon, face) in polygons.iter().zip(mesh.faces()) {
            prop_assert_eq!(polygon.len(), mesh.face(face).unwrap().vertex_count);
        }
    }
}
