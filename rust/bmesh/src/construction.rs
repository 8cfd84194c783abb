// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mutation primitives for mesh elements.
//!
//! Every element is created through the store, which checks referential
//! integrity before touching anything: a failed call leaves the store
//! unchanged. Face creation allocates its loops and any missing edges in one
//! step; removal unlinks a record from every cycle before it is deallocated,
//! and removing an edge removes every face that uses it first.

use nalgebra::Point3;
use rustc_hash::FxHashSet;

use crate::codec::arrays::NO_MATERIAL;
use crate::config::DuplicateEdgePolicy;
use crate::error::{Error, Result};
use crate::keys::*;
use crate::store::*;

impl MeshStore {
    /// Adds a vertex at the given position. Always succeeds.
    pub fn add_vertex(&mut self, position: impl Into<Point3<f32>>) -> VertexKey {
        self.vertices.insert(VertexData {
            position: position.into(),
            edges: FxHashSet::default(),
        })
    }

    /// Creates an edge between two existing vertices.
    ///
    /// An already connected pair is handled by the store's
    /// [`DuplicateEdgePolicy`]: `Reject` fails with [`Error::DuplicateEdge`],
    /// `ReuseExisting` returns the existing key.
    pub fn add_edge(&mut self, v0: VertexKey, v1: VertexKey) -> Result<EdgeKey> {
        if !self.vertices.contains_key(v0) {
            return Err(Error::VertexNotFound(v0));
        }
        if !self.vertices.contains_key(v1) {
            return Err(Error::VertexNotFound(v1));
        }
        if v0 == v1 {
            return Err(Error::DegenerateEdge(v0));
        }

        if let Some(existing) = self.find_edge(v0, v1) {
            return match self.config.duplicate_edges {
                DuplicateEdgePolicy::Reject => Err(Error::DuplicateEdge(existing)),
                DuplicateEdgePolicy::ReuseExisting => Ok(existing),
            };
        }

        Ok(self.create_edge(v0, v1))
    }

    /// Inserts an edge without checks. Callers guarantee both vertices exist
    /// and the pair is not connected yet.
    pub(crate) fn create_edge(&mut self, v0: VertexKey, v1: VertexKey) -> EdgeKey {
        let key = self.edges.insert(EdgeData {
            vertices: [v0, v1],
            head_loop: None,
        });
        self.vertices[v0].edges.insert(key);
        self.vertices[v1].edges.insert(key);
        self.edge_lookup.insert(pair_key(v0, v1), key);
        key
    }

    /// Creates a face from an ordered vertex cycle.
    ///
    /// Reuses the edge of every consecutive pair that is already connected
    /// and creates the rest, allocates one loop per vertex, and links each
    /// loop into its edge's radial cycle.
    pub fn add_face(&mut self, vertices: &[VertexKey]) -> Result<FaceKey> {
        if vertices.len() < 3 {
            return Err(Error::InvalidFace(format!(
                "needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }

        let mut seen = FxHashSet::default();
        for &vk in vertices {
            if !self.vertices.contains_key(vk) {
                return Err(Error::VertexNotFound(vk));
            }
            if !seen.insert(vk) {
                return Err(Error::InvalidFace(format!("vertex {vk:?} repeats")));
            }
        }

        let n = vertices.len();
        let points: Vec<Point3<f32>> = vertices.iter().map(|&v| self.vertices[v].position).collect();
        let normal = newell_normal(&points);

        let edges: Vec<EdgeKey> = (0..n)
            .map(|i| {
                let (a, b) = (vertices[i], vertices[(i + 1) % n]);
                match self.find_edge(a, b) {
                    Some(e) => e,
                    None => self.create_edge(a, b),
                }
            })
            .collect();

        let face = self.faces.insert(FaceData {
            head_loop: LoopKey::default(),
            vertex_count: n,
            normal,
            material_index: None,
        });

        let loops: Vec<LoopKey> = vertices
            .iter()
            .zip(&edges)
            .map(|(&vertex, &edge)| {
                self.loops.insert(LoopData {
                    vertex,
                    edge,
                    face,
                    next: LoopKey::default(),
                    prev: LoopKey::default(),
                    radial_next: LoopKey::default(),
                    radial_prev: LoopKey::default(),
                })
            })
            .collect();

        for (i, &l) in loops.iter().enumerate() {
            let data = &mut self.loops[l];
            data.next = loops[(i + 1) % n];
            data.prev = loops[(i + n - 1) % n];
        }
        self.faces[face].head_loop = loops[0];

        for (&l, &e) in loops.iter().zip(&edges) {
            self.link_radial(e, l);
        }

        self.face_order.push(face);
        Ok(face)
    }

    /// Removes an edge and, before it, every face whose boundary uses it.
    pub fn remove_edge(&mut self, edge: EdgeKey) -> Result<()> {
        if !self.edges.contains_key(edge) {
            return Err(Error::EdgeNotFound(edge));
        }

        let mut faces = self.edge_faces(edge)?;
        faces.sort();
        faces.dedup();
        for &face in &faces {
            self.remove_face(face)?;
        }

        let data = self.edges.remove(edge).ok_or(Error::EdgeNotFound(edge))?;
        for v in data.vertices {
            if let Some(vertex) = self.vertices.get_mut(v) {
                vertex.edges.remove(&edge);
            }
        }
        self.edge_lookup.remove(&pair_key(data.vertices[0], data.vertices[1]));
        self.drop_attributes(ElementKey::Edge(edge));

        tracing::debug!(removed_faces = faces.len(), "Removed edge");
        Ok(())
    }

    /// Removes a face and its loops. Edges and vertices stay.
    pub fn remove_face(&mut self, face: FaceKey) -> Result<()> {
        let loops: Vec<LoopKey> = self.face_loops(face)?.collect();

        for l in loops {
            self.unlink_radial(l);
            self.loops.remove(l);
            self.drop_attributes(ElementKey::Loop(l));
        }

        self.faces.remove(face);
        self.drop_attributes(ElementKey::Face(face));
        self.compact_face_order();
        Ok(())
    }

    /// Drops removed keys from `face_order` once they outnumber live faces,
    /// keeping removal amortized O(1).
    fn compact_face_order(&mut self) {
        if self.face_order.len() > 2 * self.faces.len() + 16 {
            let faces = &self.faces;
            self.face_order.retain(|&f| faces.contains_key(f));
        }
    }

    /// Removes a vertex together with every edge (and so every face) using it.
    pub fn remove_vertex(&mut self, vertex: VertexKey) -> Result<()> {
        let mut edges = self.vertex_edges(vertex)?;
        edges.sort();
        for edge in edges {
            self.remove_edge(edge)?;
        }

        self.vertices.remove(vertex);
        self.drop_attributes(ElementKey::Vertex(vertex));
        Ok(())
    }

    /// Moves a vertex and recomputes the normal of every face using it.
    pub fn set_vertex_position(
        &mut self,
        vertex: VertexKey,
        position: impl Into<Point3<f32>>,
    ) -> Result<()> {
        let data = self
            .vertices
            .get_mut(vertex)
            .ok_or(Error::VertexNotFound(vertex))?;
        data.position = position.into();

        let mut faces = self.vertex_faces(vertex)?;
        faces.sort();
        faces.dedup();
        for face in faces {
            self.recompute_normal(face)?;
        }
        Ok(())
    }

    /// Sets or clears the material slot of a face.
    ///
    /// [`NO_MATERIAL`] (`u32::MAX`) is reserved for "no material" and fails
    /// with [`Error::ReservedMaterial`].
    pub fn set_face_material(&mut self, face: FaceKey, material: Option<u32>) -> Result<()> {
        let data = self.faces.get_mut(face).ok_or(Error::FaceNotFound(face))?;
        if material == Some(NO_MATERIAL) {
            return Err(Error::ReservedMaterial(NO_MATERIAL));
        }
        data.material_index = material;
        Ok(())
    }

    /// Recomputes a face normal from the current vertex positions.
    pub fn recompute_normal(&mut self, face: FaceKey) -> Result<()> {
        let points: Vec<Point3<f32>> = self
            .face_vertices(face)?
            .into_iter()
            .map(|v| self.vertices[v].position)
            .collect();
        self.faces[face].normal = newell_normal(&points);
        Ok(())
    }

    // --- Radial cycle maintenance ---

    /// Appends a loop to the end of an edge's radial cycle.
    pub(crate) fn link_radial(&mut self, edge: EdgeKey, l: LoopKey) {
        match self.edges[edge].head_loop {
            None => {
                let data = &mut self.loops[l];
                data.radial_next = l;
                data.radial_prev = l;
                self.edges[edge].head_loop = Some(l);
            }
            Some(head) => {
                let tail = self.loops[head].radial_prev;
                {
                    let data = &mut self.loops[l];
                    data.radial_next = head;
                    data.radial_prev = tail;
                }
                self.loops[tail].radial_next = l;
                self.loops[head].radial_prev = l;
            }
        }
    }

    /// Takes a loop out of its edge's radial cycle, moving the edge's entry
    /// point if it pointed at this loop.
    fn unlink_radial(&mut self, l: LoopKey) {
        let LoopData {
            edge,
            radial_next,
            radial_prev,
            ..
        } = self.loops[l];

        if radial_next == l {
            self.edges[edge].head_loop = None;
            return;
        }

        self.loops[radial_prev].radial_next = radial_next;
        self.loops[radial_next].radial_prev = radial_prev;
        if self.edges[edge].head_loop == Some(l) {
            self.edges[edge].head_loop = Some(radial_next);
        }
    }
}

/// Builds a closed unit cube out of 6 quads (8 vertices, 12 shared edges).
///
/// Returns the vertex keys in `(x, y, z)` bit order and the face keys.
pub fn make_cube(mesh: &mut MeshStore) -> Result<([VertexKey; 8], [FaceKey; 6])> {
    let mut v = [VertexKey::default(); 8];
    for (i, slot) in v.iter_mut().enumerate() {
        let x = (i & 1) as f32;
        let y = ((i >> 1) & 1) as f32;
        let z = ((i >> 2) & 1) as f32;
        *slot = mesh.add_vertex([x, y, z]);
    }

    // Outward-facing, counter-clockwise when seen from outside.
    let quads = [
        [0, 2, 3, 1], // z = 0
        [4, 5, 7, 6], // z = 1
        [0, 1, 5, 4], // y = 0
        [2, 6, 7, 3], // y = 1
        [0, 4, 6, 2], // x = 0
        [1, 3, 7, 5], // x = 1
    ];
    let mut faces = [FaceKey::default(); 6];
    for (slot, quad) in faces.iter_mut().zip(quads) {
        *slot = mesh.add_face(&quad.map(|i| v[i]))?;
    }
    Ok((v, faces))
}
