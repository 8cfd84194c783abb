// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Full invariant check of a store.
//!
//! Mutations keep these invariants on their own; `validate` exists for tests
//! and for callers that assemble records through crate internals (the
//! decoder). Every lookup uses `get`, so a broken store reports an error
//! instead of panicking.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::keys::*;
use crate::store::{pair_key, MeshStore};

fn corrupt(msg: String) -> Error {
    Error::TopologyCorrupt(msg)
}

impl MeshStore {
    /// Checks every navigation invariant and reports the first violation as
    /// [`Error::TopologyCorrupt`].
    ///
    /// - Each face's boundary cycle closes after exactly `vertex_count` loops.
    /// - Each edge's radial cycle closes and holds exactly the loops that use
    ///   the edge.
    /// - Each loop's edge joins the loop's vertex and the next loop's vertex.
    /// - Every referenced key is live, and the lookup tables agree with the
    ///   records.
    pub fn validate(&self) -> Result<()> {
        self.validate_faces()?;
        self.validate_loops()?;
        self.validate_radial()?;
        self.validate_vertices()?;
        Ok(())
    }

    fn validate_faces(&self) -> Result<()> {
        let ordered: FxHashSet<FaceKey> = self.faces().collect();
        if ordered.len() != self.faces.len() || self.faces().count() != ordered.len() {
            return Err(corrupt(format!(
                "face order lists {} live faces, store holds {}",
                self.faces().count(),
                self.faces.len()
            )));
        }

        let mut owned: FxHashSet<LoopKey> = FxHashSet::default();
        for face in self.faces() {
            let data = &self.faces[face];
            if data.vertex_count < 3 {
                return Err(corrupt(format!(
                    "face {face:?} has {} corners",
                    data.vertex_count
                )));
            }

            let mut current = data.head_loop;
            for step in 0..data.vertex_count {
                let l = self.loops.get(current).ok_or_else(|| {
                    corrupt(format!("face {face:?} cycle reaches dead loop {current:?}"))
                })?;
                if l.face != face {
                    return Err(corrupt(format!(
                        "loop {current:?} in cycle of {face:?} belongs to {:?}",
                        l.face
                    )));
                }
                if !owned.insert(current) {
                    return Err(corrupt(format!("loop {current:?} visited twice")));
                }
                current = l.next;
                if current == data.head_loop && step + 1 != data.vertex_count {
                    return Err(corrupt(format!(
                        "face {face:?} cycle closes after {} of {} loops",
                        step + 1,
                        data.vertex_count
                    )));
                }
            }
            if current != data.head_loop {
                return Err(corrupt(format!(
                    "face {face:?} cycle does not return to its head"
                )));
            }
        }

        if owned.len() != self.loops.len() {
            return Err(corrupt(format!(
                "{} loops are not part of any face",
                self.loops.len() - owned.len()
            )));
        }
        Ok(())
    }

    fn validate_loops(&self) -> Result<()> {
        for (key, l) in &self.loops {
            let next = self
                .loops
                .get(l.next)
                .ok_or_else(|| corrupt(format!("loop {key:?}: dead next")))?;
            let prev = self
                .loops
                .get(l.prev)
                .ok_or_else(|| corrupt(format!("loop {key:?}: dead prev")))?;
            if next.prev != key || prev.next != key {
                return Err(corrupt(format!("loop {key:?}: next/prev are not inverse")));
            }

            let rnext = self
                .loops
                .get(l.radial_next)
                .ok_or_else(|| corrupt(format!("loop {key:?}: dead radial_next")))?;
            let rprev = self
                .loops
                .get(l.radial_prev)
                .ok_or_else(|| corrupt(format!("loop {key:?}: dead radial_prev")))?;
            if rnext.radial_prev != key || rprev.radial_next != key {
                return Err(corrupt(format!(
                    "loop {key:?}: radial_next/radial_prev are not inverse"
                )));
            }
            if rnext.edge != l.edge {
                return Err(corrupt(format!("loop {key:?}: radial cycle leaves its edge")));
            }

            if !self.vertices.contains_key(l.vertex) {
                return Err(corrupt(format!("loop {key:?}: dead vertex")));
            }
            let edge = self
                .edges
                .get(l.edge)
                .ok_or_else(|| corrupt(format!("loop {key:?}: dead edge")))?;
            if !edge.connects(l.vertex, next.vertex) {
                return Err(corrupt(format!(
                    "loop {key:?}: edge {:?} does not join its vertex and the next",
                    l.edge
                )));
            }
        }
        Ok(())
    }

    fn validate_radial(&self) -> Result<()> {
        let mut uses: FxHashMap<EdgeKey, usize> = FxHashMap::default();
        for (_, l) in &self.loops {
            *uses.entry(l.edge).or_default() += 1;
        }

        for (key, edge) in &self.edges {
            for v in edge.vertices {
                let vertex = self
                    .vertices
                    .get(v)
                    .ok_or_else(|| corrupt(format!("edge {key:?}: dead vertex {v:?}")))?;
                if !vertex.edges.contains(&key) {
                    return Err(corrupt(format!("vertex {v:?} does not list edge {key:?}")));
                }
            }
            if edge.vertices[0] == edge.vertices[1] {
                return Err(corrupt(format!("edge {key:?} joins a vertex to itself")));
            }
            if self.edge_lookup.get(&pair_key(edge.vertices[0], edge.vertices[1])) != Some(&key) {
                return Err(corrupt(format!("edge {key:?} missing from lookup")));
            }

            let expected = uses.get(&key).copied().unwrap_or(0);
            let Some(head) = edge.head_loop else {
                if expected != 0 {
                    return Err(corrupt(format!(
                        "edge {key:?} has no head but {expected} loops use it"
                    )));
                }
                continue;
            };

            let mut current = head;
            let mut count = 0;
            loop {
                let l = self
                    .loops
                    .get(current)
                    .ok_or_else(|| corrupt(format!("edge {key:?}: dead radial loop")))?;
                if l.edge != key {
                    return Err(corrupt(format!("edge {key:?}: radial loop on another edge")));
                }
                count += 1;
                if count > expected {
                    return Err(corrupt(format!("edge {key:?}: radial cycle does not close")));
                }
                current = l.radial_next;
                if current == head {
                    break;
                }
            }
            if count != expected {
                return Err(corrupt(format!(
                    "edge {key:?}: radial cycle has {count} loops, {expected} use the edge"
                )));
            }
        }

        if self.edge_lookup.len() != self.edges.len() {
            return Err(corrupt("edge lookup is out of sync".to_string()));
        }
        Ok(())
    }

    fn validate_vertices(&self) -> Result<()> {
        for (key, vertex) in &self.vertices {
            for &e in &vertex.edges {
                let edge = self
                    .edges
                    .get(e)
                    .ok_or_else(|| corrupt(format!("vertex {key:?}: dead edge {e:?}")))?;
                if !edge.has_vertex(key) {
                    return Err(corrupt(format!("vertex {key:?} lists foreign edge {e:?}")));
                }
            }
        }

        let mut holders: FxHashMap<(ElementKind, &str), usize> = FxHashMap::default();
        for (element, attrs) in &self.attributes {
            if !self.contains(*element) {
                return Err(corrupt(format!("attributes on dead element {element:?}")));
            }
            for (name, value) in attrs {
                let info = self
                    .layouts
                    .get(&(element.kind(), name.clone()))
                    .ok_or_else(|| corrupt(format!("attribute `{name}` has no layout")))?;
                if info.layout != value.layout() {
                    return Err(corrupt(format!(
                        "attribute `{name}` on {element:?} is {}, layer is {}",
                        value.layout(),
                        info.layout
                    )));
                }
                *holders.entry((element.kind(), name.as_str())).or_default() += 1;
            }
        }
        for ((kind, name), info) in &self.layouts {
            let counted = holders.get(&(*kind, name.as_str())).copied().unwrap_or(0);
            if counted != info.holders || counted == 0 {
                return Err(corrupt(format!(
                    "{kind} layer `{name}` records {} holders, found {counted}",
                    info.holders
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::make_cube;

    #[test]
    fn empty_store_is_valid() {
        MeshStore::new().validate().unwrap();
    }

    #[test]
    fn cube_is_valid() {
        let mut mesh = MeshStore::new();
        make_cube(&mut mesh).unwrap();
        mesh.validate().unwrap();
    }

    #[test]
    fn valid_after_removals() {
        let mut mesh = MeshStore::new();
        let (v, faces) = make_cube(&mut mesh).unwrap();
        mesh.remove_face(faces[0]).unwrap();
        mesh.validate().unwrap();

        let e = mesh.find_edge(v[4], v[5]).unwrap();
        mesh.remove_edge(e).unwrap();
        mesh.validate().unwrap();

        mesh.remove_vertex(v[7]).unwrap();
        mesh.validate().unwrap();
    }

    #[test]
    fn detects_broken_boundary_cycle() {
        let mut mesh = MeshStore::new();
        let (_, faces) = make_cube(&mut mesh).unwrap();
        let head = mesh.faces[faces[0]].head_loop;
        // Short-circuit the cycle: head -> head.
        mesh.loops[head].next = head;

        assert!(matches!(mesh.validate(), Err(Error::TopologyCorrupt(_))));
    }

    #[test]
    fn detects_wrong_loop_edge() {
        let mut mesh = MeshStore::new();
        let (_, faces) = make_cube(&mut mesh).unwrap();
        let head = mesh.faces[faces[0]].head_loop;
        let next = mesh.loops[head].next;
        let other_edge = mesh.loops[next].edge;
        mesh.loops[head].edge = other_edge;

        assert!(matches!(mesh.validate(), Err(Error::TopologyCorrupt(_))));
    }

    #[test]
    fn detects_stale_lookup() {
        let mut mesh = MeshStore::new();
        let a = mesh.add_vertex([0.0, 0.0, 0.0]);
        let b = mesh.add_vertex([1.0, 0.0, 0.0]);
        mesh.add_edge(a, b).unwrap();
        mesh.edge_lookup.clear();

        assert!(matches!(mesh.validate(), Err(Error::TopologyCorrupt(_))));
    }
}
