//! Core mesh data types.
//!
//! [`Mesh`] is an arena: vertices and faces live in dense slot arrays and are
//! referenced by `u32` index. Removal is logical (a per-slot flag) so indices
//! stay stable during a pass; [`Mesh::compact`] drops removed slots at pass
//! boundaries.
//!
//! Every mutation stamps the mesh with a fresh [`Mesh::generation`] and sets
//! the dirty flag. Generations are drawn from a process-wide counter, so two
//! meshes share a generation only when one is an unmodified clone of the
//! other. Caches of derived structures (adjacency, spatial trees) record the
//! generation they were built at and rebuild when it no longer matches.

use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::error::{MeshError, MeshResult};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// A vertex in the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,
}

impl Vertex {
    /// Create a new vertex at the given position.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self { position }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// Compacted arrays together with survival masks over the loaded input.
#[derive(Debug, Clone, Default)]
pub struct ExportedArrays {
    /// Vertex positions.
    pub vertices: Vec<[f64; 3]>,
    /// Faces indexing into `vertices`.
    pub faces: Vec<[u32; 3]>,
    /// `vertex_mask[i]` is true when input vertex `i` is still present.
    pub vertex_mask: Vec<bool>,
    /// `face_mask[i]` is true when input face `i` is still present.
    pub face_mask: Vec<bool>,
}

/// Index remapping produced by [`Mesh::compact`].
#[derive(Debug, Clone, Default)]
pub struct Compaction {
    /// New index for each old vertex slot, `None` if dropped.
    pub vertex_map: Vec<Option<u32>>,
    /// New index for each old face slot, `None` if dropped.
    pub face_map: Vec<Option<u32>>,
}

impl Compaction {
    /// Number of vertex slots dropped.
    pub fn vertices_dropped(&self) -> usize {
        self.vertex_map.iter().filter(|m| m.is_none()).count()
    }

    /// Number of face slots dropped.
    pub fn faces_dropped(&self) -> usize {
        self.face_map.iter().filter(|m| m.is_none()).count()
    }
}

/// An indexed triangle mesh with logical deletion.
///
/// Faces are `[v0, v1, v2]` with counter-clockwise winding when viewed from
/// outside.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    faces: Vec<[u32; 3]>,
    vertex_removed: Vec<bool>,
    face_removed: Vec<bool>,
    vertex_origin: Vec<Option<u32>>,
    face_origin: Vec<Option<u32>>,
    loaded_vertices: usize,
    loaded_faces: usize,
    live_vertices: usize,
    live_faces: usize,
    generation: u64,
    dirty: bool,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
            vertex_removed: Vec::with_capacity(vertex_count),
            face_removed: Vec::with_capacity(face_count),
            vertex_origin: Vec::with_capacity(vertex_count),
            face_origin: Vec::with_capacity(face_count),
            ..Self::default()
        }
    }

    /// Build a mesh from vertex and face arrays.
    ///
    /// Coordinates must be finite and every index must lie in `[0, N)`.
    ///
    /// ```
    /// use mesh_fix::Mesh;
    ///
    /// let mesh = Mesh::from_arrays(
    ///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    ///     &[[0, 1, 2]],
    /// )
    /// .unwrap();
    /// assert_eq!(mesh.face_count(), 1);
    /// ```
    pub fn from_arrays(vertices: &[[f64; 3]], faces: &[[i64; 3]]) -> MeshResult<Self> {
        let mut mesh = Self::new();
        mesh.load_arrays(vertices, faces)?;
        Ok(mesh)
    }

    /// Build a mesh from flat, row-major arrays (`[x0, y0, z0, x1, ...]`).
    ///
    /// Fails with an invalid-shape error when either length is not a multiple
    /// of three.
    pub fn from_flat(vertices: &[f64], faces: &[i64]) -> MeshResult<Self> {
        if vertices.len() % 3 != 0 {
            return Err(MeshError::invalid_shape(
                "vertex",
                format!("{} values is not a multiple of 3", vertices.len()),
            ));
        }
        if faces.len() % 3 != 0 {
            return Err(MeshError::invalid_shape(
                "face",
                format!("{} values is not a multiple of 3", faces.len()),
            ));
        }

        let vertices: Vec<[f64; 3]> = vertices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        let faces: Vec<[i64; 3]> = faces.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Self::from_arrays(&vertices, &faces)
    }

    /// Replace the mesh contents with the given arrays.
    ///
    /// On error the mesh is left unchanged.
    pub fn load_arrays(&mut self, vertices: &[[f64; 3]], faces: &[[i64; 3]]) -> MeshResult<()> {
        for (vertex_index, v) in vertices.iter().enumerate() {
            for (&axis, &value) in ["x", "y", "z"].iter().zip(v.iter()) {
                if !value.is_finite() {
                    return Err(MeshError::InvalidCoordinate {
                        vertex_index,
                        coordinate: axis,
                        value,
                    });
                }
            }
        }

        let vertex_count = vertices.len();
        for (face_index, f) in faces.iter().enumerate() {
            for &vertex_index in f {
                if vertex_index < 0 || vertex_index as u64 >= vertex_count as u64 {
                    return Err(MeshError::InvalidVertexIndex {
                        face_index,
                        vertex_index,
                        vertex_count,
                    });
                }
            }
        }

        if u32::try_from(vertex_count).is_err() || u32::try_from(faces.len()).is_err() {
            return Err(MeshError::invalid_shape(
                "vertex",
                "mesh exceeds u32 index range",
            ));
        }

        *self = Self::with_capacity(vertex_count, faces.len());
        for v in vertices {
            self.vertices.push(Vertex::from_coords(v[0], v[1], v[2]));
        }
        for f in faces {
            self.faces.push([f[0] as u32, f[1] as u32, f[2] as u32]);
        }
        self.vertex_removed = vec![false; vertex_count];
        self.face_removed = vec![false; faces.len()];
        self.vertex_origin = (0..vertex_count as u32).map(Some).collect();
        self.face_origin = (0..faces.len() as u32).map(Some).collect();
        self.loaded_vertices = vertex_count;
        self.loaded_faces = faces.len();
        self.live_vertices = vertex_count;
        self.live_faces = faces.len();
        self.touch();

        debug!(
            "Loaded arrays: {} vertices, {} faces",
            vertex_count,
            faces.len()
        );
        Ok(())
    }

    /// Build a mesh from positions and faces known to be valid.
    ///
    /// Used by importers after their own validation; elements count as loaded
    /// input for survival masks.
    pub(crate) fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        let vertex_count = vertices.len();
        let face_count = faces.len();
        Self {
            vertex_removed: vec![false; vertex_count],
            face_removed: vec![false; face_count],
            vertex_origin: (0..vertex_count as u32).map(Some).collect(),
            face_origin: (0..face_count as u32).map(Some).collect(),
            loaded_vertices: vertex_count,
            loaded_faces: face_count,
            live_vertices: vertex_count,
            live_faces: face_count,
            vertices,
            faces,
            generation: next_generation(),
            dirty: true,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Number of live vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.live_vertices
    }

    /// Number of live faces.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.live_faces
    }

    /// Number of vertex slots, including removed ones.
    #[inline]
    pub fn vertex_slots(&self) -> usize {
        self.vertices.len()
    }

    /// Number of face slots, including removed ones.
    #[inline]
    pub fn face_slots(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh has no live faces.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_faces == 0
    }

    /// Position of a vertex slot.
    ///
    /// # Panics
    ///
    /// Panics if `v` is not a valid slot index.
    #[inline]
    pub fn position(&self, v: u32) -> Point3<f64> {
        self.vertices[v as usize].position
    }

    /// Vertex data for a slot, or `None` when out of range or removed.
    pub fn vertex(&self, v: u32) -> Option<&Vertex> {
        if self.is_vertex_live(v) {
            self.vertices.get(v as usize)
        } else {
            None
        }
    }

    /// Face indices for a slot, or `None` when out of range or removed.
    #[inline]
    pub fn face(&self, f: u32) -> Option<[u32; 3]> {
        if self.is_face_live(f) {
            self.faces.get(f as usize).copied()
        } else {
            None
        }
    }

    /// Whether the vertex slot exists and is not removed.
    #[inline]
    pub fn is_vertex_live(&self, v: u32) -> bool {
        self.vertex_removed.get(v as usize) == Some(&false)
    }

    /// Whether the face slot exists and is not removed.
    #[inline]
    pub fn is_face_live(&self, f: u32) -> bool {
        self.face_removed.get(f as usize) == Some(&false)
    }

    /// Iterate over live faces as `(slot, indices)`.
    pub fn live_faces(&self) -> impl Iterator<Item = (u32, [u32; 3])> + '_ {
        self.faces
            .iter()
            .zip(&self.face_removed)
            .enumerate()
            .filter(|(_, (_, removed))| !**removed)
            .map(|(i, (face, _))| (i as u32, *face))
    }

    /// Iterate over live vertex slots.
    pub fn live_vertices(&self) -> impl Iterator<Item = (u32, &Vertex)> + '_ {
        self.vertices
            .iter()
            .zip(&self.vertex_removed)
            .enumerate()
            .filter(|(_, (_, removed))| !**removed)
            .map(|(i, (v, _))| (i as u32, v))
    }

    /// Geometric triangle for a live face.
    pub fn triangle(&self, f: u32) -> Option<Triangle> {
        self.face(f).map(|face| self.triangle_of(face))
    }

    /// Geometric triangle for an index triple.
    #[inline]
    pub fn triangle_of(&self, [i0, i1, i2]: [u32; 3]) -> Triangle {
        Triangle {
            v0: self.position(i0),
            v1: self.position(i1),
            v2: self.position(i2),
        }
    }

    /// Iterate over live triangles.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.live_faces().map(|(_, face)| self.triangle_of(face))
    }

    /// Axis-aligned bounding box of live vertices.
    /// Returns (min_corner, max_corner) or None if there are none.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut iter = self.live_vertices().map(|(_, v)| v.position);
        let first = iter.next()?;
        let (mut min, mut max) = (first, first);

        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some((min, max))
    }

    /// Length of the bounding-box diagonal, 0 for an empty mesh.
    pub fn diagonal(&self) -> f64 {
        self.bounds().map_or(0.0, |(min, max)| (max - min).norm())
    }

    /// Total surface area of live faces.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    /// Signed volume via the divergence theorem.
    ///
    /// Positive for a closed mesh with outward-facing normals. Not meaningful
    /// for open meshes.
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|t| t.v0.coords.dot(&t.v1.coords.cross(&t.v2.coords)))
            .sum::<f64>()
            / 6.0
    }

    // ========================================================================
    // Change tracking
    // ========================================================================

    /// Stamp refreshed on every mutation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the mesh changed since the last [`Mesh::clear_dirty`].
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Acknowledge all changes made so far.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    #[inline]
    fn touch(&mut self) {
        self.generation = next_generation();
        self.dirty = true;
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Append a vertex and return its index.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(Vertex::new(position));
        self.vertex_removed.push(false);
        self.vertex_origin.push(None);
        self.live_vertices += 1;
        self.touch();
        index
    }

    /// Append a face and return its index.
    ///
    /// Indices are not validated beyond debug assertions; callers inside the
    /// engine only reference live vertices.
    pub fn add_face(&mut self, face: [u32; 3]) -> u32 {
        debug_assert!(face.iter().all(|&v| (v as usize) < self.vertices.len()));
        let index = self.faces.len() as u32;
        self.faces.push(face);
        self.face_removed.push(false);
        self.face_origin.push(None);
        self.live_faces += 1;
        self.touch();
        index
    }

    /// Logically remove a face. Returns false if it was already removed.
    pub fn remove_face(&mut self, f: u32) -> bool {
        match self.face_removed.get_mut(f as usize) {
            Some(removed) if !*removed => {
                *removed = true;
                self.live_faces -= 1;
                self.touch();
                true
            }
            _ => false,
        }
    }

    /// Logically remove a vertex together with every live face that uses it.
    /// Returns false if it was already removed.
    pub fn remove_vertex(&mut self, v: u32) -> bool {
        if !self.is_vertex_live(v) {
            return false;
        }
        let incident: Vec<u32> = self
            .live_faces()
            .filter(|(_, face)| face.contains(&v))
            .map(|(f, _)| f)
            .collect();
        for f in incident {
            self.remove_face(f);
        }
        self.retire_vertex(v)
    }

    /// Mark a vertex slot removed without looking at faces. Callers guarantee
    /// no live face references it.
    pub(crate) fn retire_vertex(&mut self, v: u32) -> bool {
        match self.vertex_removed.get_mut(v as usize) {
            Some(removed) if !*removed => {
                *removed = true;
                self.live_vertices -= 1;
                self.touch();
                true
            }
            _ => false,
        }
    }

    /// Overwrite the indices of a live face, keeping its origin.
    pub fn replace_face(&mut self, f: u32, face: [u32; 3]) {
        if self.is_face_live(f) {
            self.faces[f as usize] = face;
            self.touch();
        }
    }

    /// Move a vertex.
    pub fn set_position(&mut self, v: u32, position: Point3<f64>) {
        if let Some(vertex) = self.vertices.get_mut(v as usize) {
            vertex.position = position;
            self.touch();
        }
    }

    /// Logically remove every live vertex not referenced by a live face.
    /// Returns the number removed.
    pub fn remove_unreferenced_vertices(&mut self) -> usize {
        let mut referenced = vec![false; self.vertices.len()];
        for (_, face) in self.live_faces() {
            for v in face {
                referenced[v as usize] = true;
            }
        }

        let mut removed = 0;
        for (v, used) in referenced.into_iter().enumerate() {
            if !used && self.retire_vertex(v as u32) {
                removed += 1;
            }
        }
        removed
    }

    /// Drop removed slots and renumber what remains.
    ///
    /// Faces that reference a removed vertex are dropped as well.
    pub fn compact(&mut self) -> Compaction {
        let mut vertex_map = vec![None; self.vertices.len()];
        let mut vertices = Vec::with_capacity(self.live_vertices);
        let mut vertex_origin = Vec::with_capacity(self.live_vertices);

        for (i, vertex) in self.vertices.iter().enumerate() {
            if !self.vertex_removed[i] {
                vertex_map[i] = Some(vertices.len() as u32);
                vertices.push(*vertex);
                vertex_origin.push(self.vertex_origin[i]);
            }
        }

        let mut face_map = vec![None; self.faces.len()];
        let mut faces = Vec::with_capacity(self.live_faces);
        let mut face_origin = Vec::with_capacity(self.live_faces);

        for (i, face) in self.faces.iter().enumerate() {
            if self.face_removed[i] {
                continue;
            }
            let mapped = [
                vertex_map[face[0] as usize],
                vertex_map[face[1] as usize],
                vertex_map[face[2] as usize],
            ];
            if let [Some(a), Some(b), Some(c)] = mapped {
                face_map[i] = Some(faces.len() as u32);
                faces.push([a, b, c]);
                face_origin.push(self.face_origin[i]);
            }
        }

        let changed = vertices.len() != self.vertices.len() || faces.len() != self.faces.len();

        self.live_vertices = vertices.len();
        self.live_faces = faces.len();
        self.vertex_removed = vec![false; vertices.len()];
        self.face_removed = vec![false; faces.len()];
        self.vertices = vertices;
        self.faces = faces;
        self.vertex_origin = vertex_origin;
        self.face_origin = face_origin;

        if changed {
            self.touch();
        }

        Compaction {
            vertex_map,
            face_map,
        }
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Current geometry as compacted arrays.
    ///
    /// Does not mutate the mesh; removed slots are skipped on the fly.
    pub fn export_arrays(&self) -> (Vec<[f64; 3]>, Vec<[u32; 3]>) {
        let exported = self.export_with_mask();
        (exported.vertices, exported.faces)
    }

    /// Current geometry plus masks of which loaded elements survived.
    pub fn export_with_mask(&self) -> ExportedArrays {
        let mut remap = vec![None; self.vertices.len()];
        let mut vertices = Vec::with_capacity(self.live_vertices);
        let mut vertex_mask = vec![false; self.loaded_vertices];

        for (i, vertex) in self.live_vertices() {
            remap[i as usize] = Some(vertices.len() as u32);
            let p = vertex.position;
            vertices.push([p.x, p.y, p.z]);
            if let Some(origin) = self.vertex_origin[i as usize] {
                vertex_mask[origin as usize] = true;
            }
        }

        let mut faces = Vec::with_capacity(self.live_faces);
        let mut face_mask = vec![false; self.loaded_faces];

        for (i, face) in self.live_faces() {
            if let [Some(a), Some(b), Some(c)] = face.map(|v| remap[v as usize]) {
                faces.push([a, b, c]);
                if let Some(origin) = self.face_origin[i as usize] {
                    face_mask[origin as usize] = true;
                }
            }
        }

        ExportedArrays {
            vertices,
            faces,
            vertex_mask,
            face_mask,
        }
    }
}

/// A triangle with concrete vertex positions.
///
/// Utility type for geometric calculations. Winding is counter-clockwise
/// when viewed from the front (normal points toward viewer).
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Compute the (unnormalized) face normal via cross product.
    /// The direction follows the right-hand rule with CCW winding.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(&e2)
    }

    /// Compute the unit face normal.
    /// Returns None for degenerate triangles (zero area).
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len_sq = n.norm_squared();
        if len_sq > f64::EPSILON * f64::EPSILON {
            Some(n / len_sq.sqrt())
        } else {
            None
        }
    }

    /// Compute the area of the triangle.
    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Compute the centroid (center of mass).
    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Compute the lengths of the three edges.
    /// Returns [len01, len12, len20] where lenXY is the distance from vX to vY.
    #[inline]
    pub fn edge_lengths(&self) -> [f64; 3] {
        [
            (self.v1 - self.v0).norm(),
            (self.v2 - self.v1).norm(),
            (self.v0 - self.v2).norm(),
        ]
    }

    /// Get the length of the shortest edge.
    #[inline]
    pub fn min_edge_length(&self) -> f64 {
        let lengths = self.edge_lengths();
        lengths[0].min(lengths[1]).min(lengths[2])
    }

    /// Get the length of the longest edge.
    #[inline]
    pub fn max_edge_length(&self) -> f64 {
        let lengths = self.edge_lengths();
        lengths[0].max(lengths[1]).max(lengths[2])
    }

    /// Smallest altitude, measured against the longest edge.
    ///
    /// Zero for colinear or coincident vertices.
    pub fn height(&self) -> f64 {
        let base = self.max_edge_length();
        if base <= 0.0 {
            return 0.0;
        }
        2.0 * self.area() / base
    }
}
