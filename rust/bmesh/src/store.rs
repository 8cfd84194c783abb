// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for non-manifold BMesh elements.
//!
//! The [`MeshStore`] is the sole owner of every vertex, edge, loop and face.
//! Records live in slot maps with stable, generational keys; every
//! cross-reference between records is a plain key, so the cyclic navigation
//! graph (loop → face → loop, loop → edge → loop) never forms an ownership
//! cycle.
//!
//! ## Navigation cycles
//!
//! Each loop is one corner of one face and sits on two independent cycles:
//!
//! - the **boundary cycle** (`next`/`prev`) around its face, entered through
//!   the face's `head_loop`;
//! - the **radial cycle** (`radial_next`/`radial_prev`) of all loops that
//!   use the same edge, entered through the edge's `head_loop`.
//!
//! The radial cycle length is the face incidence of the edge: 1 for a
//! boundary edge, 2 for an ordinary interior edge, more for a non-manifold
//! fin. Nothing restricts that count, which is what makes the store
//! non-manifold.

use nalgebra::{Point3, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use crate::attributes::{Attributes, LayerInfo};
use crate::config::StoreConfig;
use crate::keys::*;

/// Data stored for a vertex: a point in 3D space and its incident edges.
#[derive(Debug, Clone)]
pub struct VertexData {
    pub position: Point3<f32>,
    pub(crate) edges: FxHashSet<EdgeKey>,
}

impl VertexData {
    /// Edges that use this vertex, in no particular order.
    pub fn incident_edges(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        self.edges.iter().copied()
    }

    /// Number of edges that use this vertex.
    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}

/// Data stored for an edge: an unordered vertex pair and a radial entry point.
#[derive(Debug, Clone)]
pub struct EdgeData {
    /// Endpoints in the order the edge was created.
    pub vertices: [VertexKey; 2],
    /// One loop of the radial cycle, `None` for a wire edge without faces.
    pub head_loop: Option<LoopKey>,
}

impl EdgeData {
    /// Returns `true` if `vertex` is one of the endpoints.
    pub fn has_vertex(&self, vertex: VertexKey) -> bool {
        self.vertices[0] == vertex || self.vertices[1] == vertex
    }

    /// Returns the endpoint opposite to `vertex`.
    pub fn other_vertex(&self, vertex: VertexKey) -> Option<VertexKey> {
        if self.vertices[0] == vertex {
            Some(self.vertices[1])
        } else if self.vertices[1] == vertex {
            Some(self.vertices[0])
        } else {
            None
        }
    }

    /// Returns `true` if the edge joins `a` and `b` in either direction.
    pub fn connects(&self, a: VertexKey, b: VertexKey) -> bool {
        (self.vertices[0] == a && self.vertices[1] == b)
            || (self.vertices[0] == b && self.vertices[1] == a)
    }
}

/// Data stored for a loop: one face corner with its two cycles.
#[derive(Debug, Clone)]
pub struct LoopData {
    /// Corner vertex.
    pub vertex: VertexKey,
    /// Edge from `vertex` to `next.vertex`.
    pub edge: EdgeKey,
    /// Owning face.
    pub face: FaceKey,
    pub next: LoopKey,
    pub prev: LoopKey,
    pub radial_next: LoopKey,
    pub radial_prev: LoopKey,
}

/// Data stored for a face: an entry into its boundary cycle.
#[derive(Debug, Clone)]
pub struct FaceData {
    pub head_loop: LoopKey,
    pub vertex_count: usize,
    pub normal: Vector3<f32>,
    pub material_index: Option<u32>,
}

/// The central store that owns all mesh elements.
///
/// Single writer: mutations relink several cycles in sequence, so a store
/// must not be mutated from two threads at once. Shared `&MeshStore` reads
/// are free to run in parallel.
///
/// # Example
///
/// ```
/// use bmesh_encoding::MeshStore;
///
/// let mut mesh = MeshStore::new();
/// let a = mesh.add_vertex([0.0, 0.0, 0.0]);
/// let b = mesh.add_vertex([1.0, 0.0, 0.0]);
/// let c = mesh.add_vertex([0.0, 1.0, 0.0]);
/// let face = mesh.add_face(&[a, b, c]).unwrap();
///
/// assert_eq!(mesh.edge_count(), 3);
/// assert_eq!(mesh.face_loops(face).unwrap().count(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MeshStore {
    pub(crate) config: StoreConfig,

    // Element storage
    pub(crate) vertices: SlotMap<VertexKey, VertexData>,
    pub(crate) edges: SlotMap<EdgeKey, EdgeData>,
    pub(crate) loops: SlotMap<LoopKey, LoopData>,
    pub(crate) faces: SlotMap<FaceKey, FaceData>,

    // Faces in creation order; slot reuse makes slot order unreliable.
    // May hold removed keys until the next compaction.
    pub(crate) face_order: Vec<FaceKey>,

    // Unordered vertex pair → edge
    pub(crate) edge_lookup: FxHashMap<(VertexKey, VertexKey), EdgeKey>,

    // Metadata
    pub(crate) attributes: FxHashMap<ElementKey, Attributes>,
    pub(crate) layouts: FxHashMap<(ElementKind, String), LayerInfo>,
}

impl MeshStore {
    /// Creates a new, empty store with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Vertices ---

    /// Returns the vertex data for the given key, or `None` if not found.
    pub fn vertex(&self, key: VertexKey) -> Option<&VertexData> {
        self.vertices.get(key)
    }

    /// Returns the position of a vertex.
    pub fn vertex_position(&self, key: VertexKey) -> Option<Point3<f32>> {
        self.vertices.get(key).map(|v| v.position)
    }

    /// Returns the number of vertices in the store.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Iterates over all vertices in slot order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexKey, &VertexData)> {
        self.vertices.iter()
    }

    // --- Edges ---

    /// Returns the edge data for the given key, or `None` if not found.
    pub fn edge(&self, key: EdgeKey) -> Option<&EdgeData> {
        self.edges.get(key)
    }

    /// Returns the number of edges in the store.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterates over all edges in slot order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &EdgeData)> {
        self.edges.iter()
    }

    /// Returns the edge joining `a` and `b` in either direction.
    pub fn find_edge(&self, a: VertexKey, b: VertexKey) -> Option<EdgeKey> {
        self.edge_lookup.get(&pair_key(a, b)).copied()
    }

    // --- Loops ---

    /// Returns the loop data for the given key, or `None` if not found.
    pub fn get_loop(&self, key: LoopKey) -> Option<&LoopData> {
        self.loops.get(key)
    }

    /// Returns the number of loops in the store.
    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    // --- Faces ---

    /// Returns the face data for the given key, or `None` if not found.
    pub fn face(&self, key: FaceKey) -> Option<&FaceData> {
        self.faces.get(key)
    }

    /// Returns the number of faces in the store.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Iterates over face keys in creation order.
    pub fn faces(&self) -> impl Iterator<Item = FaceKey> + '_ {
        self.face_order
            .iter()
            .copied()
            .filter(|&f| self.faces.contains_key(f))
    }

    // --- Element existence checks ---

    /// Returns `true` if the given key references a live element.
    pub fn contains(&self, key: ElementKey) -> bool {
        match key {
            ElementKey::Vertex(k) => self.vertices.contains_key(k),
            ElementKey::Edge(k) => self.edges.contains_key(k),
            ElementKey::Loop(k) => self.loops.contains_key(k),
            ElementKey::Face(k) => self.faces.contains_key(k),
        }
    }

    /// Returns `true` if the store has no elements at all.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
            && self.edges.is_empty()
            && self.loops.is_empty()
            && self.faces.is_empty()
    }
}

/// Order-independent lookup key for a vertex pair.
pub(crate) fn pair_key(a: VertexKey, b: VertexKey) -> (VertexKey, VertexKey) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Newell's method: robust for non-planar and concave polygons.
pub(crate) fn newell_normal(points: &[Point3<f32>]) -> Vector3<f32> {
    let mut n = Vector3::zeros();
    for (i, cur) in points.iter().enumerate() {
        let next = &points[(i + 1) % points.len()];
        n.x += (cur.y - next.y) * (cur.z + next.z);
        n.y += (cur.z - next.z) * (cur.x + next.x);
        n.z += (cur.x - next.x) * (cur.y + next.y);
    }
    n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn new_store_is_empty() {
        let mesh = MeshStore::new();
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.edge_count(), 0);
        assert_eq!(mesh.loop_count(), 0);
        assert_eq!(mesh.face_count(), 0);
        assert!(mesh.is_empty());
    }

    #[test]
    fn add_and_retrieve_vertex() {
        let mut mesh = MeshStore::new();
        let key = mesh.add_vertex([1.0, 2.0, 3.0]);

        let v = mesh.vertex(key).unwrap();
        assert_eq!(v.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(v.degree(), 0);
        assert!(mesh.contains(key.into()));
    }

    #[test]
    fn pair_key_is_order_independent() {
        let mut mesh = MeshStore::new();
        let a = mesh.add_vertex([0.0, 0.0, 0.0]);
        let b = mesh.add_vertex([1.0, 0.0, 0.0]);
        assert_eq!(pair_key(a, b), pair_key(b, a));
    }

    #[test]
    fn newell_normal_of_ccw_square() {
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let n = newell_normal(&square);
        assert_relative_eq!(n, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn newell_normal_of_degenerate_polygon_is_zero() {
        let line = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert_eq!(newell_normal(&line), Vector3::zeros());
    }

    #[test]
    fn edge_data_helpers() {
        let mut mesh = MeshStore::new();
        let a = mesh.add_vertex([0.0, 0.0, 0.0]);
        let b = mesh.add_vertex([1.0, 0.0, 0.0]);
        let c = mesh.add_vertex([2.0, 0.0, 0.0]);
        let e = mesh.add_edge(a, b).unwrap();

        let data = mesh.edge(e).unwrap();
        assert!(data.connects(b, a));
        assert!(!data.has_vertex(c));
        assert_eq!(data.other_vertex(a), Some(b));
        assert_eq!(data.other_vertex(c), None);
        assert!(data.head_loop.is_none());
        assert_eq!(mesh.find_edge(b, a), Some(e));
    }
}
