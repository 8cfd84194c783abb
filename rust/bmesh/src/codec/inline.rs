// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inline element-list form of the explicit layer, for small meshes.
//!
//! Each element is a JSON object with an `id` equal to its dense index.
//! Readers accept the elements in any order, as long as the ids of each
//! kind are exactly `0..count`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeLayout, AttributeValue};
use crate::codec::arrays::*;
use crate::error::{Error, Result};
use crate::keys::ElementKind;
use crate::manifold::ManifoldState;

pub type InlineAttributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineVertex {
    pub id: u32,
    pub position: [f32; 3],
    pub edges: Vec<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: InlineAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineEdge {
    pub id: u32,
    pub vertices: [u32; 2],
    pub faces: Vec<u32>,
    /// `null` when the exporter did not classify the edge.
    pub manifold: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: InlineAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineLoop {
    pub id: u32,
    pub vertex: u32,
    pub edge: u32,
    pub face: u32,
    pub next: u32,
    pub prev: u32,
    pub radial_next: u32,
    pub radial_prev: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: InlineAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFace {
    pub id: u32,
    pub vertices: Vec<u32>,
    pub edges: Vec<u32>,
    pub loops: Vec<u32>,
    pub normal: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_index: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: InlineAttributes,
}

/// All elements of one mesh as JSON-friendly lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineMesh {
    pub vertices: Vec<InlineVertex>,
    pub edges: Vec<InlineEdge>,
    pub loops: Vec<InlineLoop>,
    pub faces: Vec<InlineFace>,
}

fn element_attributes(layers: &[AttributeArray], i: usize) -> InlineAttributes {
    layers
        .iter()
        .filter_map(|layer| layer.value(i).map(|v| (layer.name.clone(), v)))
        .collect()
}

fn triple(values: &[f32], i: usize) -> [f32; 3] {
    [values[3 * i], values[3 * i + 1], values[3 * i + 2]]
}

impl InlineMesh {
    /// Converts arrays to element lists. The arrays must come from
    /// [`encode`] or have passed [`decode`].
    pub fn from_arrays(mesh: &EncodedMesh) -> Self {
        let vertices = (0..mesh.vertices.count)
            .map(|i| InlineVertex {
                id: i as u32,
                position: triple(&mesh.vertices.positions, i),
                edges: mesh.vertices.edges.get(i).to_vec(),
                attributes: element_attributes(&mesh.vertices.attributes, i),
            })
            .collect();

        let edges = (0..mesh.edges.count)
            .map(|i| InlineEdge {
                id: i as u32,
                vertices: [mesh.edges.vertices[2 * i], mesh.edges.vertices[2 * i + 1]],
                faces: mesh.edges.faces.get(i).to_vec(),
                manifold: ManifoldState::from_u8(mesh.edges.manifold[i])
                    .and_then(ManifoldState::as_flag),
                attributes: element_attributes(&mesh.edges.attributes, i),
            })
            .collect();

        let l = &mesh.loops;
        let loops = (0..l.count)
            .map(|i| InlineLoop {
                id: i as u32,
                vertex: l.vertex[i],
                edge: l.edge[i],
                face: l.face[i],
                next: l.next[i],
                prev: l.prev[i],
                radial_next: l.radial_next[i],
                radial_prev: l.radial_prev[i],
                attributes: element_attributes(&l.attributes, i),
            })
            .collect();

        let f = &mesh.faces;
        let faces = (0..f.count)
            .map(|i| InlineFace {
                id: i as u32,
                vertices: f.vertices.get(i).to_vec(),
                edges: f.edges.get(i).to_vec(),
                loops: f.loops.get(i).to_vec(),
                normal: triple(&f.normals, i),
                material_index: f
                    .materials
                    .as_ref()
                    .map(|m| m[i])
                    .filter(|&m| m != NO_MATERIAL),
                attributes: element_attributes(&f.attributes, i),
            })
            .collect();

        Self {
            vertices,
            edges,
            loops,
            faces,
        }
    }

    /// Converts element lists back to arrays, ordering each kind by id.
    ///
    /// Fails with [`Error::TopologyCorrupt`] when the ids of a kind are not
    /// exactly `0..count`, and with [`Error::AttributeTypeMismatch`] when one
    /// attribute name carries two layouts.
    pub fn to_arrays(&self) -> Result<EncodedMesh> {
        let vertices = sorted_by_id("vertices", &self.vertices, |v| v.id)?;
        let edges = sorted_by_id("edges", &self.edges, |e| e.id)?;
        let loops = sorted_by_id("loops", &self.loops, |l| l.id)?;
        let faces = sorted_by_id("faces", &self.faces, |f| f.id)?;

        let vertex_arrays = VertexArrays {
            count: vertices.len(),
            positions: vertices.iter().flat_map(|v| v.position).collect(),
            edges: Csr::from_lists(vertices.iter().map(|v| v.edges.iter().copied())),
            attributes: collect_layers(ElementKind::Vertex, vertices.iter().map(|v| &v.attributes))?,
        };

        let edge_arrays = EdgeArrays {
            count: edges.len(),
            vertices: edges.iter().flat_map(|e| e.vertices).collect(),
            faces: Csr::from_lists(edges.iter().map(|e| e.faces.iter().copied())),
            manifold: edges
                .iter()
                .map(|e| ManifoldState::from_flag(e.manifold).as_u8())
                .collect(),
            attributes: collect_layers(ElementKind::Edge, edges.iter().map(|e| &e.attributes))?,
        };

        let loop_arrays = LoopArrays {
            count: loops.len(),
            vertex: loops.iter().map(|l| l.vertex).collect(),
            edge: loops.iter().map(|l| l.edge).collect(),
            face: loops.iter().map(|l| l.face).collect(),
            next: loops.iter().map(|l| l.next).collect(),
            prev: loops.iter().map(|l| l.prev).collect(),
            radial_next: loops.iter().map(|l| l.radial_next).collect(),
            radial_prev: loops.iter().map(|l| l.radial_prev).collect(),
            attributes: collect_layers(ElementKind::Loop, loops.iter().map(|l| &l.attributes))?,
        };

        let any_material = faces.iter().any(|f| f.material_index.is_some());
        let face_arrays = FaceArrays {
            count: faces.len(),
            vertices: Csr::from_lists(faces.iter().map(|f| f.vertices.iter().copied())),
            edges: Csr::from_lists(faces.iter().map(|f| f.edges.iter().copied())),
            loops: Csr::from_lists(faces.iter().map(|f| f.loops.iter().copied())),
            normals: faces.iter().flat_map(|f| f.normal).collect(),
            materials: any_material.then(|| {
                faces
                    .iter()
                    .map(|f| f.material_index.unwrap_or(NO_MATERIAL))
                    .collect()
            }),
            attributes: collect_layers(ElementKind::Face, faces.iter().map(|f| &f.attributes))?,
        };

        Ok(EncodedMesh {
            vertices: vertex_arrays,
            edges: edge_arrays,
            loops: loop_arrays,
            faces: face_arrays,
        })
    }
}

/// Orders elements by id and checks the ids are `0..len`.
fn sorted_by_id<'a, T>(
    kind: &str,
    elements: &'a [T],
    id: impl Fn(&T) -> u32,
) -> Result<Vec<&'a T>> {
    let mut sorted: Vec<&T> = elements.iter().collect();
    sorted.sort_by_key(|e| id(e));
    for (expected, element) in sorted.iter().enumerate() {
        if id(element) as usize != expected {
            return Err(Error::TopologyCorrupt(format!(
                "{kind}: ids are not 0..{}, found {} at position {expected}",
                elements.len(),
                id(element)
            )));
        }
    }
    Ok(sorted)
}

/// Builds one array per attribute name, sorted by name.
fn collect_layers<'a>(
    kind: ElementKind,
    elements: impl Iterator<Item = &'a InlineAttributes> + Clone,
) -> Result<Vec<AttributeArray>> {
    let mut layouts: BTreeMap<&str, AttributeLayout> = BTreeMap::new();
    for attrs in elements.clone() {
        for (name, value) in attrs {
            let layout = value.layout();
            if !(1..=4).contains(&layout.dimension) {
                return Err(Error::AttributeTypeMismatch {
                    name: name.clone(),
                    expected: "1 to 4 components".to_string(),
                    found: format!("{} components", layout.dimension),
                });
            }
            match layouts.get(name.as_str()) {
                Some(existing) if *existing != layout => {
                    return Err(Error::AttributeTypeMismatch {
                        name: name.clone(),
                        expected: format!("{existing} on every {kind}"),
                        found: layout.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    layouts.insert(name.as_str(), layout);
                }
            }
        }
    }

    Ok(layouts
        .into_iter()
        .map(|(name, layout)| {
            let values: Vec<Option<&AttributeValue>> =
                elements.clone().map(|attrs| attrs.get(name)).collect();
            AttributeArray::from_values(name, layout, values.into_iter())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodingConfig;
    use crate::construction::make_cube;
    use crate::store::MeshStore;

    fn triangle_arrays() -> EncodedMesh {
        let mut mesh = MeshStore::new();
        let a = mesh.add_vertex([0.0, 0.0, 0.0]);
        let b = mesh.add_vertex([1.0, 0.0, 0.0]);
        let c = mesh.add_vertex([0.0, 1.0, 0.0]);
        let face = mesh.add_face(&[a, b, c]).unwrap();
        mesh.set_face_material(face, Some(4)).unwrap();
        let first_loop = mesh.face_loops(face).unwrap().next().unwrap();
        mesh.set_attribute(first_loop, "TEXCOORD_0", AttributeValue::Float(vec![0.5, 1.0]))
            .unwrap();
        encode(&mesh, &EncodingConfig::default())
    }

    #[test]
    fn json_shape() {
        let inline = InlineMesh::from_arrays(&triangle_arrays());
        let json = serde_json::to_value(&inline).unwrap();

        assert_eq!(json["vertices"].as_array().unwrap().len(), 3);
        assert_eq!(json["edges"][0]["manifold"], false);
        assert!(json["loops"][0].get("radialNext").is_some());
        assert_eq!(json["faces"][0]["materialIndex"], 4);
        assert_eq!(
            json["loops"][0]["attributes"]["TEXCOORD_0"]["Float"],
            serde_json::json!([0.5, 1.0])
        );
        // Loops without the attribute omit the map.
        assert!(json["loops"][1].get("attributes").is_none());
    }

    #[test]
    fn unknown_manifold_is_null() {
        let mut mesh = MeshStore::new();
        make_cube(&mut mesh).unwrap();
        let config = EncodingConfig {
            preserve_manifold_info: false,
            ..EncodingConfig::default()
        };
        let inline = InlineMesh::from_arrays(&encode(&mesh, &config));
        let json = serde_json::to_value(&inline).unwrap();
        assert!(json["edges"][0]["manifold"].is_null());
        assert_eq!(inline.to_arrays().unwrap().edges.manifold, vec![255; 12]);
    }

    #[test]
    fn arrays_round_trip() {
        let arrays = triangle_arrays();
        let inline = InlineMesh::from_arrays(&arrays);
        assert_eq!(inline.to_arrays().unwrap(), arrays);
    }

    #[test]
    fn elements_may_come_in_any_order() {
        let arrays = triangle_arrays();
        let mut inline = InlineMesh::from_arrays(&arrays);
        inline.vertices.reverse();
        inline.loops.swap(0, 2);
        assert_eq!(inline.to_arrays().unwrap(), arrays);
    }

    #[test]
    fn rejects_gaps_in_ids() {
        let mut inline = InlineMesh::from_arrays(&triangle_arrays());
        inline.edges[1].id = 5;
        assert!(matches!(inline.to_arrays(), Err(Error::TopologyCorrupt(_))));
    }

    #[test]
    fn rejects_conflicting_attribute_layouts() {
        let mut inline = InlineMesh::from_arrays(&triangle_arrays());
        inline.loops[1]
            .attributes
            .insert("TEXCOORD_0".to_string(), AttributeValue::Int(vec![1, 2]));
        assert!(matches!(
            inline.to_arrays(),
            Err(Error::AttributeTypeMismatch { .. })
        ));
    }

    #[test]
    fn json_text_round_trip() {
        let inline = InlineMesh::from_arrays(&triangle_arrays());
        let text = serde_json::to_string(&inline).unwrap();
        let parsed: InlineMesh = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, inline);
    }
}
