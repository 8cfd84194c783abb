// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Explicit layer as flat, typed arrays.
//!
//! Fixed-stride data is stored one array per field (structure of arrays):
//! loops carry seven separate index arrays rather than one interleaved
//! record. Variable-length lists use [`Csr`] packing.
//!
//! [`decode`] rebuilds the store from the arrays alone. It validates every
//! length, index, flag and cycle before allocating a single record, so a
//! failed decode never exposes a partial store.

use rustc_hash::FxHashSet;

use crate::attributes::{AttributeLayout, AttributeValue, LayerInfo};
use crate::codec::DenseIndex;
use crate::config::{EncodingConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::keys::*;
use crate::manifold::{ManifoldClassifier, ManifoldState};
use crate::store::*;

/// Encoded value of a face without a material.
pub const NO_MATERIAL: u32 = u32::MAX;

// =============================================================================
// Array types
// =============================================================================

/// Compressed-row packing of variable-length lists.
///
/// Element `i` is `data[offsets[i]..offsets[i + 1]]`; `offsets` has one more
/// entry than there are elements and starts at 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Csr {
    pub data: Vec<u32>,
    pub offsets: Vec<u32>,
}

impl Default for Csr {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            offsets: vec![0],
        }
    }
}

impl Csr {
    /// Packs lists in order.
    pub fn from_lists<I, L>(lists: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = u32>,
    {
        let mut csr = Csr::default();
        for list in lists {
            csr.push(list);
        }
        csr
    }

    /// Appends one list.
    pub fn push(&mut self, list: impl IntoIterator<Item = u32>) {
        self.data.extend(list);
        self.offsets.push(self.data.len() as u32);
    }

    /// Number of lists.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns list `i`. Only valid on a checked array.
    pub fn get(&self, i: usize) -> &[u32] {
        &self.data[self.offsets[i] as usize..self.offsets[i + 1] as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u32]> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Checks shape: `count + 1` offsets, starting at 0, non-decreasing,
    /// ending at `data.len()`.
    fn check(&self, name: &str, count: usize) -> Result<()> {
        expect_scaled_len(&format!("{name}.offsets"), count, 1, 1, self.offsets.len())?;
        if self.offsets[0] != 0 {
            return Err(Error::TopologyCorrupt(format!("{name}: offsets must start at 0")));
        }
        if self.offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::TopologyCorrupt(format!("{name}: offsets decrease")));
        }
        if self.offsets[count] as usize != self.data.len() {
            return Err(Error::TopologyCorrupt(format!(
                "{name}: last offset {} does not match data length {}",
                self.offsets[count],
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// One named attribute layer: a fixed-stride little-endian array with one
/// element per record of its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeArray {
    pub name: String,
    pub layout: AttributeLayout,
    /// `count * layout.stride()` bytes; missing values are zero-filled.
    pub data: Vec<u8>,
    /// One byte per element, non-zero where the value exists. `None` means
    /// every element has a value.
    pub present: Option<Vec<u8>>,
}

impl AttributeArray {
    /// The value of element `i`, if present. Only valid on a checked array.
    pub fn value(&self, i: usize) -> Option<AttributeValue> {
        if let Some(present) = &self.present {
            if present[i] == 0 {
                return None;
            }
        }
        let stride = self.layout.stride();
        Some(AttributeValue::read_le(
            self.layout,
            &self.data[i * stride..(i + 1) * stride],
        ))
    }

    /// Packs per-element values that all share `layout`.
    pub fn from_values<'a>(
        name: impl Into<String>,
        layout: AttributeLayout,
        values: impl ExactSizeIterator<Item = Option<&'a AttributeValue>>,
    ) -> Self {
        let mut data = Vec::with_capacity(values.len() * layout.stride());
        let mut present = Vec::with_capacity(values.len());
        let zero = AttributeValue::zeroed(layout);
        for value in values {
            present.push(value.is_some() as u8);
            value.unwrap_or(&zero).write_le(&mut data);
        }
        let complete = present.iter().all(|&p| p != 0);
        Self {
            name: name.into(),
            layout,
            data,
            present: (!complete).then_some(present),
        }
    }

    fn check(&self, kind: ElementKind, count: usize) -> Result<()> {
        if !(1..=4).contains(&self.layout.dimension) {
            return Err(Error::AttributeTypeMismatch {
                name: self.name.clone(),
                expected: "1 to 4 components".to_string(),
                found: format!("{} components", self.layout.dimension),
            });
        }
        let label = format!("{kind}.attributes.{}", self.name);
        expect_scaled_len(&label, count, self.layout.stride(), 0, self.data.len())?;
        if let Some(present) = &self.present {
            expect_len(&format!("{label}.present"), count, present.len())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexArrays {
    pub count: usize,
    /// `x, y, z` per vertex.
    pub positions: Vec<f32>,
    /// Incident edges per vertex, ascending.
    pub edges: Csr,
    pub attributes: Vec<AttributeArray>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeArrays {
    pub count: usize,
    /// Two vertex indices per edge.
    pub vertices: Vec<u32>,
    /// Incident faces per edge, ascending, one entry per radial loop.
    pub faces: Csr,
    /// [`ManifoldState`] byte per edge.
    pub manifold: Vec<u8>,
    pub attributes: Vec<AttributeArray>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopArrays {
    pub count: usize,
    pub vertex: Vec<u32>,
    pub edge: Vec<u32>,
    pub face: Vec<u32>,
    pub next: Vec<u32>,
    pub prev: Vec<u32>,
    pub radial_next: Vec<u32>,
    pub radial_prev: Vec<u32>,
    pub attributes: Vec<AttributeArray>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceArrays {
    pub count: usize,
    pub vertices: Csr,
    pub edges: Csr,
    /// Boundary loops per face; the first is the head loop.
    pub loops: Csr,
    /// `x, y, z` per face.
    pub normals: Vec<f32>,
    /// Material per face, [`NO_MATERIAL`] for none. Absent when no face has
    /// a material.
    pub materials: Option<Vec<u32>>,
    pub attributes: Vec<AttributeArray>,
}

/// The explicit layer of one mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedMesh {
    pub vertices: VertexArrays,
    pub edges: EdgeArrays,
    pub loops: LoopArrays,
    pub faces: FaceArrays,
}

// =============================================================================
// Encode
// =============================================================================

/// Encodes a store into arrays.
///
/// The four element kinds are encoded independently in parallel. The output
/// depends only on the store's contents, so encoding twice gives equal
/// arrays.
pub fn encode(store: &MeshStore, config: &EncodingConfig) -> EncodedMesh {
    encode_dense(store, &DenseIndex::new(store), config)
}

pub(crate) fn encode_dense(
    store: &MeshStore,
    index: &DenseIndex,
    config: &EncodingConfig,
) -> EncodedMesh {
    let classifier = ManifoldClassifier::from_config(config);
    let ((vertices, edges), (loops, faces)) = rayon::join(
        || {
            rayon::join(
                || encode_vertices(store, index),
                || encode_edges(store, index, &classifier),
            )
        },
        || {
            rayon::join(
                || encode_loops(store, index),
                || encode_faces(store, index),
            )
        },
    );

    tracing::debug!(
        vertices = vertices.count,
        edges = edges.count,
        loops = loops.count,
        faces = faces.count,
        "Encoded mesh arrays"
    );

    EncodedMesh {
        vertices,
        edges,
        loops,
        faces,
    }
}

fn encode_attributes<K: Copy + Into<ElementKey>>(
    store: &MeshStore,
    kind: ElementKind,
    keys: &[K],
) -> Vec<AttributeArray> {
    store
        .attribute_layers(kind)
        .into_iter()
        .map(|(name, layout)| {
            let values = keys.iter().map(|&k| {
                let key: ElementKey = k.into();
                store
                    .attributes
                    .get(&key)
                    .and_then(|attrs| attrs.get(&name))
            });
            AttributeArray::from_values(name.clone(), layout, values)
        })
        .collect()
}

fn encode_vertices(store: &MeshStore, index: &DenseIndex) -> VertexArrays {
    let mut positions = Vec::with_capacity(index.vertices.len() * 3);
    let mut edges = Csr::default();
    for &v in &index.vertices {
        let data = &store.vertices[v];
        positions.extend_from_slice(&[data.position.x, data.position.y, data.position.z]);
        let mut incident: Vec<u32> = data.edges.iter().map(|e| index.edge_ids[e]).collect();
        incident.sort_unstable();
        edges.push(incident);
    }

    VertexArrays {
        count: index.vertices.len(),
        positions,
        edges,
        attributes: encode_attributes(store, ElementKind::Vertex, &index.vertices),
    }
}

fn encode_edges(
    store: &MeshStore,
    index: &DenseIndex,
    classifier: &ManifoldClassifier,
) -> EdgeArrays {
    let mut vertices = Vec::with_capacity(index.edges.len() * 2);
    let mut faces = Csr::default();
    let mut manifold = Vec::with_capacity(index.edges.len());
    for &e in &index.edges {
        let data = &store.edges[e];
        vertices.extend(data.vertices.iter().map(|v| index.vertex_ids[v]));

        let radial_faces: Vec<u32> = store
            .radial_walk(data)
            .map(|l| index.face_ids[&store.loops[l].face])
            .collect();
        manifold.push(classifier.classify_faces(&radial_faces).as_u8());

        let mut sorted = radial_faces;
        sorted.sort_unstable();
        faces.push(sorted);
    }

    EdgeArrays {
        count: index.edges.len(),
        vertices,
        faces,
        manifold,
        attributes: encode_attributes(store, ElementKind::Edge, &index.edges),
    }
}

fn encode_loops(store: &MeshStore, index: &DenseIndex) -> LoopArrays {
    let n = index.loops.len();
    let mut out = LoopArrays {
        count: n,
        vertex: Vec::with_capacity(n),
        edge: Vec::with_capacity(n),
        face: Vec::with_capacity(n),
        next: Vec::with_capacity(n),
        prev: Vec::with_capacity(n),
        radial_next: Vec::with_capacity(n),
        radial_prev: Vec::with_capacity(n),
        attributes: encode_attributes(store, ElementKind::Loop, &index.loops),
    };
    for &l in &index.loops {
        let data = &store.loops[l];
        out.vertex.push(index.vertex_ids[&data.vertex]);
        out.edge.push(index.edge_ids[&data.edge]);
        out.face.push(index.face_ids[&data.face]);
        out.next.push(index.loop_ids[&data.next]);
        out.prev.push(index.loop_ids[&data.prev]);
        out.radial_next.push(index.loop_ids[&data.radial_next]);
        out.radial_prev.push(index.loop_ids[&data.radial_prev]);
    }
    out
}

fn encode_faces(store: &MeshStore, index: &DenseIndex) -> FaceArrays {
    let mut vertices = Csr::default();
    let mut edges = Csr::default();
    let mut loops = Csr::default();
    let mut normals = Vec::with_capacity(index.faces.len() * 3);
    let mut materials = Vec::with_capacity(index.faces.len());

    for &f in &index.faces {
        let data = &store.faces[f];
        let boundary: Vec<&LoopData> = store.boundary_walk(data).map(|l| &store.loops[l]).collect();
        vertices.push(boundary.iter().map(|l| index.vertex_ids[&l.vertex]));
        edges.push(boundary.iter().map(|l| index.edge_ids[&l.edge]));
        loops.push(store.boundary_walk(data).map(|l| index.loop_ids[&l]));
        normals.extend_from_slice(&[data.normal.x, data.normal.y, data.normal.z]);
        materials.push(data.material_index.unwrap_or(NO_MATERIAL));
    }

    let any_material = materials.iter().any(|&m| m != NO_MATERIAL);
    FaceArrays {
        count: index.faces.len(),
        vertices,
        edges,
        loops,
        normals,
        materials: any_material.then_some(materials),
        attributes: encode_attributes(store, ElementKind::Face, &index.faces),
    }
}

// =============================================================================
// Decode
// =============================================================================

/// Rebuilds a store from arrays with the default store configuration.
pub fn decode(mesh: &EncodedMesh) -> Result<MeshStore> {
    decode_with_config(mesh, StoreConfig::default())
}

/// Rebuilds a store from arrays. All-or-nothing: any validation failure
/// returns an error before a store is built.
pub fn decode_with_config(mesh: &EncodedMesh, config: StoreConfig) -> Result<MeshStore> {
    check_lengths(mesh)?;
    check_ranges(mesh)?;
    check_manifold(mesh)?;
    let heads = check_topology(mesh)?;
    let store = build(mesh, &heads, config);

    tracing::debug!(
        vertices = store.vertex_count(),
        edges = store.edge_count(),
        loops = store.loop_count(),
        faces = store.face_count(),
        "Decoded mesh arrays"
    );
    debug_assert!(store.validate().is_ok());
    Ok(store)
}

fn expect_len(array: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::LengthMismatch {
            array: array.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Like [`expect_len`] for `count * per_element + extra` entries. A declared
/// count whose byte size does not fit in `usize` is a mismatch.
fn expect_scaled_len(
    array: &str,
    count: usize,
    per_element: usize,
    extra: usize,
    found: usize,
) -> Result<()> {
    let expected = count
        .checked_mul(per_element)
        .and_then(|n| n.checked_add(extra))
        .ok_or_else(|| Error::LengthMismatch {
            array: array.to_string(),
            expected: usize::MAX,
            found,
        })?;
    expect_len(array, expected, found)
}

fn check_lengths(mesh: &EncodedMesh) -> Result<()> {
    let EncodedMesh {
        vertices: v,
        edges: e,
        loops: l,
        faces: f,
    } = mesh;

    expect_scaled_len("vertices.positions", v.count, 3, 0, v.positions.len())?;
    v.edges.check("vertices.edges", v.count)?;

    expect_scaled_len("edges.vertices", e.count, 2, 0, e.vertices.len())?;
    e.faces.check("edges.faces", e.count)?;
    expect_len("edges.manifold", e.count, e.manifold.len())?;

    for (name, array) in [
        ("loops.vertex", &l.vertex),
        ("loops.edge", &l.edge),
        ("loops.face", &l.face),
        ("loops.next", &l.next),
        ("loops.prev", &l.prev),
        ("loops.radialNext", &l.radial_next),
        ("loops.radialPrev", &l.radial_prev),
    ] {
        expect_len(name, l.count, array.len())?;
    }

    f.vertices.check("faces.vertices", f.count)?;
    f.edges.check("faces.edges", f.count)?;
    f.loops.check("faces.loops", f.count)?;
    expect_scaled_len("faces.normals", f.count, 3, 0, f.normals.len())?;
    if let Some(materials) = &f.materials {
        expect_len("faces.materials", f.count, materials.len())?;
    }

    for (kind, count, layers) in [
        (ElementKind::Vertex, v.count, &v.attributes),
        (ElementKind::Edge, e.count, &e.attributes),
        (ElementKind::Loop, l.count, &l.attributes),
        (ElementKind::Face, f.count, &f.attributes),
    ] {
        let mut names = FxHashSet::default();
        for layer in layers {
            if !names.insert(layer.name.as_str()) {
                return Err(Error::TopologyCorrupt(format!(
                    "{kind}: attribute layer `{}` appears twice",
                    layer.name
                )));
            }
            layer.check(kind, count)?;
        }
    }
    Ok(())
}

fn check_range(array: &'static str, values: &[u32], count: usize) -> Result<()> {
    match values.iter().find(|&&i| i as usize >= count) {
        Some(&index) => Err(Error::IndexOutOfRange {
            array,
            index,
            count,
        }),
        None => Ok(()),
    }
}

fn check_ranges(mesh: &EncodedMesh) -> Result<()> {
    let (vc, ec, lc, fc) = (
        mesh.vertices.count,
        mesh.edges.count,
        mesh.loops.count,
        mesh.faces.count,
    );
    let l = &mesh.loops;

    check_range("vertices.edges", &mesh.vertices.edges.data, ec)?;
    check_range("edges.vertices", &mesh.edges.vertices, vc)?;
    check_range("edges.faces", &mesh.edges.faces.data, fc)?;
    check_range("loops.vertex", &l.vertex, vc)?;
    check_range("loops.edge", &l.edge, ec)?;
    check_range("loops.face", &l.face, fc)?;
    check_range("loops.next", &l.next, lc)?;
    check_range("loops.prev", &l.prev, lc)?;
    check_range("loops.radialNext", &l.radial_next, lc)?;
    check_range("loops.radialPrev", &l.radial_prev, lc)?;
    check_range("faces.vertices", &mesh.faces.vertices.data, vc)?;
    check_range("faces.edges", &mesh.faces.edges.data, ec)?;
    check_range("faces.loops", &mesh.faces.loops.data, lc)?;
    Ok(())
}

fn check_manifold(mesh: &EncodedMesh) -> Result<()> {
    for (edge, &value) in mesh.edges.manifold.iter().enumerate() {
        if ManifoldState::from_u8(value).is_none() {
            return Err(Error::InvalidManifoldFlag { edge, value });
        }
    }
    Ok(())
}

/// Checks every cycle and cross-reference; returns the radial head loop of
/// each edge.
fn check_topology(mesh: &EncodedMesh) -> Result<Vec<Option<u32>>> {
    let l = &mesh.loops;
    let corrupt = |msg: String| Error::TopologyCorrupt(msg);

    // Boundary and radial links are mutual inverses, radial links stay on
    // one edge.
    for i in 0..l.count {
        let (next, prev) = (l.next[i] as usize, l.prev[i] as usize);
        if l.prev[next] as usize != i || l.next[prev] as usize != i {
            return Err(corrupt(format!("loop {i}: next/prev are not inverse")));
        }
        let (rnext, rprev) = (l.radial_next[i] as usize, l.radial_prev[i] as usize);
        if l.radial_prev[rnext] as usize != i || l.radial_next[rprev] as usize != i {
            return Err(corrupt(format!("loop {i}: radialNext/radialPrev are not inverse")));
        }
        if l.edge[rnext] != l.edge[i] {
            return Err(corrupt(format!("loop {i}: radial cycle leaves edge {}", l.edge[i])));
        }
    }

    // Edges: distinct endpoints, one edge per unordered pair.
    let edge_pair = |e: usize| (mesh.edges.vertices[2 * e], mesh.edges.vertices[2 * e + 1]);
    let mut pairs = FxHashSet::default();
    for e in 0..mesh.edges.count {
        let (a, b) = edge_pair(e);
        if a == b {
            return Err(corrupt(format!("edge {e} joins vertex {a} to itself")));
        }
        if !pairs.insert((a.min(b), a.max(b))) {
            return Err(corrupt(format!("edge {e} duplicates vertex pair ({a}, {b})")));
        }
    }

    // Faces: each list closes a boundary cycle owned by the face.
    let f = &mesh.faces;
    let mut owner = vec![false; l.count];
    for face in 0..f.count {
        let loops = f.loops.get(face);
        let verts = f.vertices.get(face);
        let edges = f.edges.get(face);
        let n = loops.len();
        if n < 3 {
            return Err(corrupt(format!("face {face} has {n} loops")));
        }
        if verts.len() != n || edges.len() != n {
            return Err(corrupt(format!(
                "face {face}: {n} loops but {} vertices and {} edges",
                verts.len(),
                edges.len()
            )));
        }
        let distinct: FxHashSet<u32> = verts.iter().copied().collect();
        if distinct.len() != n {
            return Err(corrupt(format!("face {face} repeats a vertex")));
        }

        for (k, &lp) in loops.iter().enumerate() {
            let li = lp as usize;
            if std::mem::replace(&mut owner[li], true) {
                return Err(corrupt(format!("loop {li} appears in two face cycles")));
            }
            if l.face[li] as usize != face {
                return Err(corrupt(format!("loop {li} listed by face {face} names face {}", l.face[li])));
            }
            if l.next[li] != loops[(k + 1) % n] {
                return Err(corrupt(format!("face {face}: boundary cycle diverges at loop {li}")));
            }
            if l.vertex[li] != verts[k] || l.edge[li] != edges[k] {
                return Err(corrupt(format!("face {face}: lists disagree with loop {li}")));
            }
        }
    }
    if let Some(orphan) = owner.iter().position(|&owned| !owned) {
        return Err(corrupt(format!("loop {orphan} belongs to no face cycle")));
    }

    // Loop edges join the loop vertex and the next loop vertex.
    for i in 0..l.count {
        let (a, b) = edge_pair(l.edge[i] as usize);
        let (v, w) = (l.vertex[i], l.vertex[l.next[i] as usize]);
        if !((a == v && b == w) || (a == w && b == v)) {
            return Err(corrupt(format!("loop {i}: edge {} does not join {v} and {w}", l.edge[i])));
        }
    }

    // Radial cycles: one per edge, covering every loop of the edge.
    let mut uses: Vec<Vec<u32>> = vec![Vec::new(); mesh.edges.count];
    for i in 0..l.count {
        uses[l.edge[i] as usize].push(i as u32);
    }
    let mut heads = Vec::with_capacity(mesh.edges.count);
    for (e, edge_loops) in uses.iter().enumerate() {
        let Some(&head) = edge_loops.first() else {
            heads.push(None);
            continue;
        };
        let mut current = head as usize;
        let mut length = 0;
        loop {
            length += 1;
            current = l.radial_next[current] as usize;
            if current == head as usize || length > edge_loops.len() {
                break;
            }
        }
        if length != edge_loops.len() {
            return Err(corrupt(format!(
                "edge {e}: radial cycle has {length} loops, {} use the edge",
                edge_loops.len()
            )));
        }
        heads.push(Some(head));
    }

    // Derived incidence lists match the stored ones.
    let classifier = ManifoldClassifier::new();
    for (e, edge_loops) in uses.iter().enumerate() {
        let mut derived: Vec<u32> = edge_loops.iter().map(|&li| l.face[li as usize]).collect();
        let state = classifier.classify_faces(&derived);
        derived.sort_unstable();
        let mut stored = mesh.edges.faces.get(e).to_vec();
        stored.sort_unstable();
        if derived != stored {
            return Err(corrupt(format!("edge {e}: face list disagrees with loops")));
        }

        let flag = mesh.edges.manifold[e];
        if flag != ManifoldState::Unknown.as_u8() && flag != state.as_u8() {
            tracing::warn!(edge = e, flag, derived = state.as_u8(), "Manifold flag disagrees with incidence");
        }
    }

    let mut vertex_edges: Vec<Vec<u32>> = vec![Vec::new(); mesh.vertices.count];
    for e in 0..mesh.edges.count {
        let (a, b) = edge_pair(e);
        vertex_edges[a as usize].push(e as u32);
        vertex_edges[b as usize].push(e as u32);
    }
    for (v, derived) in vertex_edges.iter().enumerate() {
        let mut stored = mesh.vertices.edges.get(v).to_vec();
        stored.sort_unstable();
        if *derived != stored {
            return Err(corrupt(format!("vertex {v}: edge list disagrees with edges")));
        }
    }

    Ok(heads)
}

/// Allocates every record. The arrays are fully validated at this point.
fn build(mesh: &EncodedMesh, heads: &[Option<u32>], config: StoreConfig) -> MeshStore {
    let mut store = MeshStore::with_config(config);
    let l = &mesh.loops;
    let f = &mesh.faces;

    let vertices: Vec<VertexKey> = mesh
        .vertices
        .positions
        .chunks_exact(3)
        .map(|p| store.add_vertex([p[0], p[1], p[2]]))
        .collect();

    let edges: Vec<EdgeKey> = mesh
        .edges
        .vertices
        .chunks_exact(2)
        .map(|pair| store.create_edge(vertices[pair[0] as usize], vertices[pair[1] as usize]))
        .collect();

    let faces: Vec<FaceKey> = (0..f.count)
        .map(|i| {
            let material = f
                .materials
                .as_ref()
                .map(|m| m[i])
                .filter(|&m| m != NO_MATERIAL);
            let key = store.faces.insert(FaceData {
                head_loop: LoopKey::default(),
                vertex_count: f.loops.get(i).len(),
                normal: [f.normals[3 * i], f.normals[3 * i + 1], f.normals[3 * i + 2]].into(),
                material_index: material,
            });
            store.face_order.push(key);
            key
        })
        .collect();

    let loops: Vec<LoopKey> = (0..l.count)
        .map(|i| {
            store.loops.insert(LoopData {
                vertex: vertices[l.vertex[i] as usize],
                edge: edges[l.edge[i] as usize],
                face: faces[l.face[i] as usize],
                next: LoopKey::default(),
                prev: LoopKey::default(),
                radial_next: LoopKey::default(),
                radial_prev: LoopKey::default(),
            })
        })
        .collect();

    for (i, &key) in loops.iter().enumerate() {
        let data = &mut store.loops[key];
        data.next = loops[l.next[i] as usize];
        data.prev = loops[l.prev[i] as usize];
        data.radial_next = loops[l.radial_next[i] as usize];
        data.radial_prev = loops[l.radial_prev[i] as usize];
    }
    for (i, &key) in faces.iter().enumerate() {
        store.faces[key].head_loop = loops[f.loops.get(i)[0] as usize];
    }
    for (&key, head) in edges.iter().zip(heads) {
        store.edges[key].head_loop = head.map(|h| loops[h as usize]);
    }

    restore_attributes(&mut store, ElementKind::Vertex, &mesh.vertices.attributes, &vertices);
    restore_attributes(&mut store, ElementKind::Edge, &mesh.edges.attributes, &edges);
    restore_attributes(&mut store, ElementKind::Loop, &mesh.loops.attributes, &loops);
    restore_attributes(&mut store, ElementKind::Face, &mesh.faces.attributes, &faces);
    store
}

fn restore_attributes<K: Copy + Into<ElementKey>>(
    store: &mut MeshStore,
    kind: ElementKind,
    layers: &[AttributeArray],
    keys: &[K],
) {
    for layer in layers {
        let mut holders = 0;
        for (i, &key) in keys.iter().enumerate() {
            if let Some(value) = layer.value(i) {
                store
                    .attributes
                    .entry(key.into())
                    .or_default()
                    .insert(layer.name.clone(), value);
                holders += 1;
            }
        }
        // A layer nobody holds is not registered.
        if holders > 0 {
            store.layouts.insert(
                (kind, layer.name.clone()),
                LayerInfo {
                    layout: layer.layout,
                    holders,
                },
            );
        }
    }
}
