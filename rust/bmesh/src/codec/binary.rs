// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Buffer-view form of the explicit layer.
//!
//! Every array is written little-endian into a shared byte buffer, each at a
//! 4-byte aligned offset (zero padding in between), and described by a
//! glTF-style [`BufferView`]. The JSON-facing [`BufferEncoding`] refers to
//! views by index. Empty arrays get no view and read back as empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeLayout, ComponentType};
use crate::codec::arrays::*;
use crate::error::{Error, Result};

const ALIGNMENT: usize = 4;

/// A byte range of one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: u32,
    pub byte_offset: usize,
    pub byte_length: usize,
}

/// View indices of one CSR pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrViews {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeViews {
    /// glTF component type code.
    pub component_type: u32,
    /// glTF accessor type (`SCALAR`, `VEC2`, ...).
    #[serde(rename = "type")]
    pub accessor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub present: Option<u32>,
}

pub type AttributeViewMap = BTreeMap<String, AttributeViews>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexViews {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<u32>,
    #[serde(default)]
    pub edges: CsrViews,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: AttributeViewMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeViews {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertices: Option<u32>,
    #[serde(default)]
    pub faces: CsrViews,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifold: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: AttributeViewMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopViews {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_vertex: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_edge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_face: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_next: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_prev: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_radial_next: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_radial_prev: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: AttributeViewMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceViews {
    pub count: usize,
    #[serde(default)]
    pub vertices: CsrViews,
    #[serde(default)]
    pub edges: CsrViews,
    #[serde(default)]
    pub loops: CsrViews,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normals: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: AttributeViewMap,
}

/// Descriptor of an explicit layer stored in buffer views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferEncoding {
    pub vertices: VertexViews,
    pub edges: EdgeViews,
    pub loops: LoopViews,
    pub faces: FaceViews,
}

// =============================================================================
// Writing
// =============================================================================

struct BufferWriter<'a> {
    buffer: &'a mut Vec<u8>,
    buffer_index: u32,
    views: &'a mut Vec<BufferView>,
}

impl BufferWriter<'_> {
    fn pad(&mut self) {
        let padded = self.buffer.len().next_multiple_of(ALIGNMENT);
        self.buffer.resize(padded, 0);
    }

    fn bytes(&mut self, bytes: &[u8]) -> Option<u32> {
        if bytes.is_empty() {
            return None;
        }
        self.pad();
        let index = self.views.len() as u32;
        self.views.push(BufferView {
            buffer: self.buffer_index,
            byte_offset: self.buffer.len(),
            byte_length: bytes.len(),
        });
        self.buffer.extend_from_slice(bytes);
        Some(index)
    }

    fn u32s(&mut self, values: &[u32]) -> Option<u32> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.bytes(&bytes)
    }

    fn f32s(&mut self, values: &[f32]) -> Option<u32> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.bytes(&bytes)
    }

    fn csr(&mut self, csr: &Csr) -> CsrViews {
        CsrViews {
            data: self.u32s(&csr.data),
            offsets: self.u32s(&csr.offsets),
        }
    }

    fn attributes(&mut self, layers: &[AttributeArray]) -> AttributeViewMap {
        layers
            .iter()
            .map(|layer| {
                let views = AttributeViews {
                    component_type: layer.layout.component.code(),
                    accessor_type: layer.layout.accessor_type().to_string(),
                    data: self.bytes(&layer.data),
                    present: layer.present.as_deref().and_then(|p| self.bytes(p)),
                };
                (layer.name.clone(), views)
            })
            .collect()
    }
}

/// Appends the arrays of `mesh` to `buffer` and their views to `views`.
///
/// `buffer_index` is the index of `buffer` in the host container. Existing
/// contents of `buffer` and `views` are kept, so the layer can share the
/// container's main buffer.
pub fn pack(
    mesh: &EncodedMesh,
    buffer: &mut Vec<u8>,
    buffer_index: u32,
    views: &mut Vec<BufferView>,
) -> BufferEncoding {
    let start = buffer.len();
    let mut w = BufferWriter {
        buffer,
        buffer_index,
        views,
    };

    let vertices = VertexViews {
        count: mesh.vertices.count,
        positions: w.f32s(&mesh.vertices.positions),
        edges: w.csr(&mesh.vertices.edges),
        attributes: w.attributes(&mesh.vertices.attributes),
    };
    let edges = EdgeViews {
        count: mesh.edges.count,
        vertices: w.u32s(&mesh.edges.vertices),
        faces: w.csr(&mesh.edges.faces),
        manifold: w.bytes(&mesh.edges.manifold),
        attributes: w.attributes(&mesh.edges.attributes),
    };
    let l = &mesh.loops;
    let loops = LoopViews {
        count: l.count,
        topology_vertex: w.u32s(&l.vertex),
        topology_edge: w.u32s(&l.edge),
        topology_face: w.u32s(&l.face),
        topology_next: w.u32s(&l.next),
        topology_prev: w.u32s(&l.prev),
        topology_radial_next: w.u32s(&l.radial_next),
        topology_radial_prev: w.u32s(&l.radial_prev),
        attributes: w.attributes(&l.attributes),
    };
    let faces = FaceViews {
        count: mesh.faces.count,
        vertices: w.csr(&mesh.faces.vertices),
        edges: w.csr(&mesh.faces.edges),
        loops: w.csr(&mesh.faces.loops),
        normals: w.f32s(&mesh.faces.normals),
        materials: mesh.faces.materials.as_deref().and_then(|m| w.u32s(m)),
        attributes: w.attributes(&mesh.faces.attributes),
    };
    w.pad();

    tracing::debug!(bytes = w.buffer.len() - start, views = w.views.len(), "Packed mesh buffers");

    BufferEncoding {
        vertices,
        edges,
        loops,
        faces,
    }
}

// =============================================================================
// Reading
// =============================================================================

struct BufferReader<'a> {
    buffers: &'a [&'a [u8]],
    views: &'a [BufferView],
}

impl<'a> BufferReader<'a> {
    fn bytes(&self, view: Option<u32>, element_size: usize) -> Result<&'a [u8]> {
        let Some(index) = view else {
            return Ok(&[]);
        };
        let v = self
            .views
            .get(index as usize)
            .ok_or_else(|| Error::InvalidBufferView(format!("view {index} does not exist")))?;
        let buffer: &'a [u8] = self.buffers.get(v.buffer as usize).copied().ok_or_else(|| {
            Error::InvalidBufferView(format!("view {index}: buffer {} does not exist", v.buffer))
        })?;
        if v.byte_offset % ALIGNMENT != 0 {
            return Err(Error::InvalidBufferView(format!(
                "view {index}: offset {} is not {ALIGNMENT}-byte aligned",
                v.byte_offset
            )));
        }
        if v.byte_length % element_size != 0 {
            return Err(Error::InvalidBufferView(format!(
                "view {index}: length {} is not a multiple of {element_size}",
                v.byte_length
            )));
        }
        v.byte_offset
            .checked_add(v.byte_length)
            .and_then(|end| buffer.get(v.byte_offset..end))
            .ok_or_else(|| {
                Error::InvalidBufferView(format!(
                    "view {index}: range {}+{} exceeds buffer of {} bytes",
                    v.byte_offset,
                    v.byte_length,
                    buffer.len()
                ))
            })
    }

    fn words(&self, view: Option<u32>) -> Result<impl Iterator<Item = [u8; 4]> + 'a> {
        Ok(self
            .bytes(view, 4)?
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]]))
    }

    fn u32s(&self, view: Option<u32>) -> Result<Vec<u32>> {
        Ok(self.words(view)?.map(u32::from_le_bytes).collect())
    }

    fn f32s(&self, view: Option<u32>) -> Result<Vec<f32>> {
        Ok(self.words(view)?.map(f32::from_le_bytes).collect())
    }

    fn csr(&self, views: &CsrViews) -> Result<Csr> {
        let offsets = match views.offsets {
            Some(_) => self.u32s(views.offsets)?,
            None => vec![0],
        };
        Ok(Csr {
            data: self.u32s(views.data)?,
            offsets,
        })
    }

    fn attributes(&self, map: &AttributeViewMap) -> Result<Vec<AttributeArray>> {
        map.iter()
            .map(|(name, views)| {
                let component = ComponentType::from_code(views.component_type).ok_or_else(|| {
                    Error::InvalidBufferView(format!(
                        "attribute `{name}`: unknown component type {}",
                        views.component_type
                    ))
                })?;
                let dimension = AttributeLayout::dimension_of(&views.accessor_type).ok_or_else(
                    || {
                        Error::InvalidBufferView(format!(
                            "attribute `{name}`: unknown accessor type {}",
                            views.accessor_type
                        ))
                    },
                )?;
                let present = match views.present {
                    Some(_) => Some(self.bytes(views.present, 1)?.to_vec()),
                    None => None,
                };
                Ok(AttributeArray {
                    name: name.clone(),
                    layout: AttributeLayout {
                        component,
                        dimension,
                    },
                    data: self.bytes(views.data, 4)?.to_vec(),
                    present,
                })
            })
            .collect()
    }
}

/// Reads the arrays described by `encoding` back out of `buffers`.
///
/// Only view bounds and alignment are checked here; array lengths and
/// topology are checked by [`decode`](crate::codec::arrays::decode).
pub fn unpack(
    encoding: &BufferEncoding,
    buffers: &[&[u8]],
    views: &[BufferView],
) -> Result<EncodedMesh> {
    let r = BufferReader { buffers, views };
    let (v, e, l, f) = (
        &encoding.vertices,
        &encoding.edges,
        &encoding.loops,
        &encoding.faces,
    );

    Ok(EncodedMesh {
        vertices: VertexArrays {
            count: v.count,
            positions: r.f32s(v.positions)?,
            edges: r.csr(&v.edges)?,
            attributes: r.attributes(&v.attributes)?,
        },
        edges: EdgeArrays {
            count: e.count,
            vertices: r.u32s(e.vertices)?,
            faces: r.csr(&e.faces)?,
            manifold: r.bytes(e.manifold, 1)?.to_vec(),
            attributes: r.attributes(&e.attributes)?,
        },
        loops: LoopArrays {
            count: l.count,
            vertex: r.u32s(l.topology_vertex)?,
            edge: r.u32s(l.topology_edge)?,
            face: r.u32s(l.topology_face)?,
            next: r.u32s(l.topology_next)?,
            prev: r.u32s(l.topology_prev)?,
            radial_next: r.u32s(l.topology_radial_next)?,
            radial_prev: r.u32s(l.topology_radial_prev)?,
            attributes: r.attributes(&l.attributes)?,
        },
        faces: FaceArrays {
            count: f.count,
            vertices: r.csr(&f.vertices)?,
            edges: r.csr(&f.edges)?,
            loops: r.csr(&f.loops)?,
            normals: r.f32s(f.normals)?,
            materials: match f.materials {
                Some(_) => Some(r.u32s(f.materials)?),
                None => None,
            },
            attributes: r.attributes(&f.attributes)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeValue;
    use crate::config::EncodingConfig;
    use crate::construction::make_cube;
    use crate::store::MeshStore;

    fn cube_arrays() -> EncodedMesh {
        let mut mesh = MeshStore::new();
        let (v, faces) = make_cube(&mut mesh).unwrap();
        mesh.set_face_material(faces[2], Some(1)).unwrap();
        mesh.set_attribute(v[0], "weight", AttributeValue::Float(vec![0.25]))
            .unwrap();
        encode(&mesh, &EncodingConfig::default())
    }

    #[test]
    fn pack_unpack_round_trip() {
        let arrays = cube_arrays();
        let mut buffer = Vec::new();
        let mut views = Vec::new();
        let encoding = pack(&arrays, &mut buffer, 0, &mut views);

        let unpacked = unpack(&encoding, &[&buffer], &views).unwrap();
        assert_eq!(unpacked, arrays);
    }

    #[test]
    fn every_view_is_aligned() {
        let arrays = cube_arrays();
        // Host buffer already holds 3 bytes of unrelated data.
        let mut buffer = vec![0xAB; 3];
        let mut views = Vec::new();
        pack(&arrays, &mut buffer, 2, &mut views);

        assert_eq!(views[0].byte_offset, 4);
        assert_eq!(&buffer[..3], &[0xAB; 3]);
        assert_eq!(buffer.len() % 4, 0);
        for view in &views {
            assert_eq!(view.buffer, 2);
            assert_eq!(view.byte_offset % 4, 0);
            assert!(view.byte_offset + view.byte_length <= buffer.len());
        }
    }

    #[test]
    fn empty_arrays_have_no_view() {
        let arrays = encode(&MeshStore::new(), &EncodingConfig::default());
        let mut buffer = Vec::new();
        let mut views = Vec::new();
        let encoding = pack(&arrays, &mut buffer, 0, &mut views);

        assert!(encoding.vertices.positions.is_none());
        assert!(encoding.loops.topology_next.is_none());
        assert!(encoding.vertices.edges.data.is_none());
        // Single-entry offset arrays still get a view.
        assert!(encoding.vertices.edges.offsets.is_some());

        let unpacked = unpack(&encoding, &[&buffer], &views).unwrap();
        assert_eq!(unpacked, arrays);
    }

    #[test]
    fn descriptor_uses_camel_case() {
        let arrays = cube_arrays();
        let mut buffer = Vec::new();
        let mut views = Vec::new();
        let encoding = pack(&arrays, &mut buffer, 0, &mut views);

        let json = serde_json::to_value(&encoding).unwrap();
        assert_eq!(json["loops"]["count"], 24);
        assert!(json["loops"]["topologyRadialNext"].is_u64());
        assert!(json["faces"]["materials"].is_u64());
        assert_eq!(json["vertices"]["attributes"]["weight"]["type"], "SCALAR");
        assert_eq!(json["vertices"]["attributes"]["weight"]["componentType"], 5126);

        let view = serde_json::to_value(views[0]).unwrap();
        assert!(view.get("byteOffset").is_some());
        assert!(view.get("byteLength").is_some());

        let parsed: BufferEncoding = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, encoding);
    }

    #[test]
    fn rejects_misaligned_view() {
        let arrays = cube_arrays();
        let mut buffer = Vec::new();
        let mut views = Vec::new();
        let encoding = pack(&arrays, &mut buffer, 0, &mut views);
        views[0].byte_offset += 2;

        assert!(matches!(
            unpack(&encoding, &[&buffer], &views),
            Err(Error::InvalidBufferView(_))
        ));
    }

    #[test]
    fn rejects_view_past_end() {
        let arrays = cube_arrays();
        let mut buffer = Vec::new();
        let mut views = Vec::new();
        let encoding = pack(&arrays, &mut buffer, 0, &mut views);
        buffer.truncate(16);

        assert!(matches!(
            unpack(&encoding, &[&buffer], &views),
            Err(Error::InvalidBufferView(_))
        ));
    }

    #[test]
    fn huge_declared_count_is_a_length_error() {
        let json = serde_json::json!({
            "vertices": { "count": u64::MAX },
            "edges": { "count": 0 },
            "loops": { "count": 0 },
            "faces": { "count": 0 },
        });
        let encoding: BufferEncoding = serde_json::from_value(json).unwrap();
        let arrays = unpack(&encoding, &[], &[]).unwrap();

        let outcome = std::panic::catch_unwind(|| decode(&arrays));
        assert!(matches!(outcome, Ok(Err(Error::LengthMismatch { .. }))));
    }

    #[test]
    fn rejects_missing_view() {
        let encoding = BufferEncoding {
            vertices: VertexViews {
                count: 1,
                positions: Some(7),
                ..VertexViews::default()
            },
            ..BufferEncoding::default()
        };
        assert!(matches!(
            unpack(&encoding, &[], &[]),
            Err(Error::InvalidBufferView(_))
        ));
    }
}
