// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only navigation over boundary and radial cycles.
//!
//! The two primitive walks are [`MeshStore::face_loops`] (boundary cycle)
//! and [`MeshStore::edge_radial_loops`] (radial cycle); every incidence query
//! below is derived from them. Both walks are bounded, so they terminate even
//! on a store whose cycles were corrupted by a bug.

use crate::error::{Error, Result};
use crate::keys::*;
use crate::store::{EdgeData, FaceData, MeshStore};

// =============================================================================
// Cycle iterators
// =============================================================================

/// Walks a face's boundary cycle from its head loop.
///
/// Yields exactly `vertex_count` loops. Clone it to restart the walk.
#[derive(Debug, Clone)]
pub struct FaceLoops<'a> {
    store: &'a MeshStore,
    next: LoopKey,
    remaining: usize,
}

impl Iterator for FaceLoops<'_> {
    type Item = LoopKey;

    fn next(&mut self) -> Option<LoopKey> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.next = self.store.loops[current].next;
        self.remaining -= 1;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for FaceLoops<'_> {}

/// Walks an edge's radial cycle from its head loop.
#[derive(Debug, Clone)]
pub struct RadialLoops<'a> {
    store: &'a MeshStore,
    head: Option<LoopKey>,
    next: Option<LoopKey>,
    budget: usize,
}

impl Iterator for RadialLoops<'_> {
    type Item = LoopKey;

    fn next(&mut self) -> Option<LoopKey> {
        let current = self.next?;
        if self.budget == 0 {
            debug_assert!(false, "radial cycle does not close");
            return None;
        }
        self.budget -= 1;

        let following = self.store.loops[current].radial_next;
        self.next = if Some(following) == self.head {
            None
        } else {
            Some(following)
        };
        Some(current)
    }
}

impl MeshStore {
    // =========================================================================
    // Boundary cycle
    // =========================================================================

    /// Returns the loops of a face in boundary order, starting at its head loop.
    pub fn face_loops(&self, face: FaceKey) -> Result<FaceLoops<'_>> {
        let data = self.faces.get(face).ok_or(Error::FaceNotFound(face))?;
        Ok(self.boundary_walk(data))
    }

    pub(crate) fn boundary_walk(&self, data: &FaceData) -> FaceLoops<'_> {
        FaceLoops {
            store: self,
            next: data.head_loop,
            remaining: data.vertex_count,
        }
    }

    /// Returns the vertices of a face in boundary order.
    pub fn face_vertices(&self, face: FaceKey) -> Result<Vec<VertexKey>> {
        Ok(self
            .face_loops(face)?
            .map(|l| self.loops[l].vertex)
            .collect())
    }

    /// Returns the edges of a face in boundary order.
    pub fn face_edges(&self, face: FaceKey) -> Result<Vec<EdgeKey>> {
        Ok(self.face_loops(face)?.map(|l| self.loops[l].edge).collect())
    }

    // =========================================================================
    // Radial cycle
    // =========================================================================

    /// Returns the loops that use an edge, starting at its head loop.
    ///
    /// The cycle length is the edge's face incidence; a wire edge yields nothing.
    pub fn edge_radial_loops(&self, edge: EdgeKey) -> Result<RadialLoops<'_>> {
        let data = self.edges.get(edge).ok_or(Error::EdgeNotFound(edge))?;
        Ok(self.radial_walk(data))
    }

    pub(crate) fn radial_walk(&self, data: &EdgeData) -> RadialLoops<'_> {
        RadialLoops {
            store: self,
            head: data.head_loop,
            next: data.head_loop,
            budget: self.loops.len(),
        }
    }

    /// Number of face corners using this edge.
    pub fn edge_incidence(&self, edge: EdgeKey) -> Result<usize> {
        Ok(self.edge_radial_loops(edge)?.count())
    }

    /// Returns the faces using an edge, once per loop.
    ///
    /// A face that runs along the same edge twice is listed twice.
    pub fn edge_faces(&self, edge: EdgeKey) -> Result<Vec<FaceKey>> {
        Ok(self
            .edge_radial_loops(edge)?
            .map(|l| self.loops[l].face)
            .collect())
    }

    /// Returns `true` for an edge used by exactly one face corner.
    pub fn is_boundary(&self, edge: EdgeKey) -> Result<bool> {
        Ok(self.edge_incidence(edge)? == 1)
    }

    /// Returns `true` for an edge with exactly two oppositely wound loops.
    ///
    /// This is the strict, orientation-aware test. The encoded three-state
    /// flag comes from [`ManifoldClassifier`](crate::ManifoldClassifier).
    pub fn is_manifold(&self, edge: EdgeKey) -> Result<bool> {
        let mut radial = self.edge_radial_loops(edge)?;
        let (Some(first), Some(second), None) = (radial.next(), radial.next(), radial.next())
        else {
            return Ok(false);
        };
        // Each loop's edge runs from its own vertex to the next corner, so
        // opposite winding means the two loops start at different endpoints.
        Ok(self.loops[first].vertex != self.loops[second].vertex)
    }

    // =========================================================================
    // Vertex incidence
    // =========================================================================

    /// Returns the edges using a vertex, sorted by key.
    pub fn vertex_edges(&self, vertex: VertexKey) -> Result<Vec<EdgeKey>> {
        let data = self
            .vertices
            .get(vertex)
            .ok_or(Error::VertexNotFound(vertex))?;
        let mut edges: Vec<EdgeKey> = data.edges.iter().copied().collect();
        edges.sort();
        Ok(edges)
    }

    /// Returns the loops (face corners) sitting on a vertex.
    pub fn vertex_loops(&self, vertex: VertexKey) -> Result<Vec<LoopKey>> {
        let mut loops = Vec::new();
        for edge in self.vertex_edges(vertex)? {
            // Every corner owns the edge leaving it, so each corner is found once.
            loops.extend(
                self.edge_radial_loops(edge)?
                    .filter(|&l| self.loops[l].vertex == vertex),
            );
        }
        Ok(loops)
    }

    /// Returns the faces with a corner on a vertex, once per corner.
    pub fn vertex_faces(&self, vertex: VertexKey) -> Result<Vec<FaceKey>> {
        Ok(self
            .vertex_loops(vertex)?
            .into_iter()
            .map(|l| self.loops[l].face)
            .collect())
    }
}
