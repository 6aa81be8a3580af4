//! Mesh adjacency data structures.
//!
//! Provides O(degree) lookups for edge-to-face and vertex-to-face
//! relationships over the live faces of a [`Mesh`].

use hashbrown::HashMap;

use crate::Mesh;

/// Adjacency information for a mesh.
///
/// Provides efficient lookups for:
/// - Faces adjacent to an edge
/// - Faces adjacent to a vertex
/// - Boundary edges (edges with only one adjacent face)
/// - Non-manifold edges (edges with more than two adjacent faces)
///
/// Face lists are in ascending slot order.
#[derive(Debug, Clone, Default)]
pub struct MeshAdjacency {
    /// Maps edge (v0, v1) to list of face slots. v0 < v1.
    edge_to_faces: HashMap<(u32, u32), Vec<u32>>,
    /// Maps vertex slot to list of face slots.
    vertex_to_faces: HashMap<u32, Vec<u32>>,
}

impl MeshAdjacency {
    /// Build adjacency information from the live faces of a mesh.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_fix::{Mesh, MeshAdjacency};
    ///
    /// let mesh = Mesh::from_arrays(
    ///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
    ///     &[[0, 1, 2], [1, 3, 2]],
    /// )
    /// .unwrap();
    /// let adj = MeshAdjacency::build(&mesh);
    ///
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// ```
    #[must_use]
    pub fn build(mesh: &Mesh) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<u32>> =
            HashMap::with_capacity(mesh.face_count() * 3 / 2);
        let mut vertex_to_faces: HashMap<u32, Vec<u32>> =
            HashMap::with_capacity(mesh.vertex_count());

        for (face_idx, face) in mesh.live_faces() {
            for &v in &face {
                let faces = vertex_to_faces.entry(v).or_default();
                if faces.last() != Some(&face_idx) {
                    faces.push(face_idx);
                }
            }

            for (a, b) in face_edges(face) {
                if a == b {
                    continue;
                }
                let faces = edge_to_faces.entry(normalize_edge(a, b)).or_default();
                if faces.last() != Some(&face_idx) {
                    faces.push(face_idx);
                }
            }
        }

        Self {
            edge_to_faces,
            vertex_to_faces,
        }
    }

    /// Get faces adjacent to an edge.
    ///
    /// Returns an empty slice if the edge doesn't exist in the mesh.
    #[must_use]
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> &[u32] {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map_or(&[], Vec::as_slice)
    }

    /// Get faces adjacent to a vertex.
    ///
    /// Returns an empty slice if the vertex has no adjacent faces.
    #[must_use]
    pub fn faces_for_vertex(&self, v: u32) -> &[u32] {
        self.vertex_to_faces.get(&v).map_or(&[], Vec::as_slice)
    }

    /// Whether an edge between two vertices exists.
    #[must_use]
    pub fn has_edge(&self, v0: u32, v1: u32) -> bool {
        self.edge_to_faces.contains_key(&normalize_edge(v0, v1))
    }

    /// Faces sharing an edge with `face`, excluding `face` itself.
    pub fn edge_neighbors(&self, face_idx: u32, face: [u32; 3]) -> impl Iterator<Item = u32> + '_ {
        face_edges(face)
            .into_iter()
            .flat_map(move |(a, b)| self.faces_for_edge(a, b).iter().copied())
            .filter(move |&f| f != face_idx)
    }

    /// Iterate over all boundary edges (edges with exactly one adjacent face).
    ///
    /// Boundary edges indicate holes in the mesh surface.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
    }

    /// Count the number of boundary edges.
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Iterate over all non-manifold edges (edges with more than two adjacent faces).
    pub fn non_manifold_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(&edge, _)| edge)
    }

    /// Count the number of non-manifold edges.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() > 2)
            .count()
    }

    /// Check if the mesh is manifold (all edges have at most 2 adjacent faces).
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() <= 2)
    }

    /// Check if the mesh is watertight (no boundary edges).
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() >= 2)
    }

    /// Check if every edge has exactly two adjacent faces.
    #[must_use]
    pub fn is_closed_manifold(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() == 2)
    }

    /// Get the total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    /// Get the number of vertices referenced by faces.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_to_faces.len()
    }
}

/// Adjacency that rebuilds itself when the mesh changes.
#[derive(Debug, Default)]
pub struct AdjacencyCache {
    built_at: Option<u64>,
    adjacency: MeshAdjacency,
}

impl AdjacencyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjacency for the current state of `mesh`, rebuilt if stale.
    pub fn get(&mut self, mesh: &Mesh) -> &MeshAdjacency {
        if self.built_at != Some(mesh.generation()) {
            self.adjacency = MeshAdjacency::build(mesh);
            self.built_at = Some(mesh.generation());
        }
        &self.adjacency
    }

    /// Drop the cached adjacency.
    pub fn invalidate(&mut self) {
        self.built_at = None;
    }
}

/// The three directed edges of a face, in winding order.
#[inline]
pub fn face_edges(face: [u32; 3]) -> [(u32, u32); 3] {
    [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])]
}

/// Normalize edge direction so v0 < v1.
#[inline]
pub fn normalize_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}
