//! Degenerate and duplicate triangle removal.
//!
//! One sweep of [`remove_degeneracies`] handles, in order:
//!
//! 1. faces whose indices are not pairwise distinct (deleted),
//! 2. needles, faces with an edge no longer than the tolerance (the edge is
//!    collapsed by merging its endpoints),
//! 3. caps, faces whose altitude is within tolerance but whose edges are not
//!    short (the neighbour across the longest edge is split at the apex),
//! 4. duplicate faces over the same three vertices, in either winding,
//! 5. vertices left without faces.
//!
//! Removal is logical; slots are only reclaimed by [`Mesh::compact`], so face
//! indices stay valid for the whole sweep.

use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;
use tracing::{debug, info};

use crate::Mesh;
use crate::adjacency::MeshAdjacency;
use crate::error::{MeshError, MeshResult};

/// Absolute length tolerance for degeneracy tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance(f64);

impl Tolerance {
    /// Default tolerance relative to the bounding-box diagonal.
    pub const DEFAULT_RELATIVE: f64 = 1e-9;

    /// `relative` times the bounding-box diagonal of `mesh`.
    pub fn for_mesh(mesh: &Mesh, relative: f64) -> Self {
        Self(relative.max(0.0) * mesh.diagonal())
    }

    /// A fixed absolute tolerance.
    pub fn absolute(value: f64) -> Self {
        Self(value.max(0.0))
    }

    /// The tolerance as a length.
    pub fn value(self) -> f64 {
        self.0
    }
}

/// How a single face is degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Defect {
    RepeatedIndex,
    /// Shortest edge within tolerance; holds its endpoints.
    Needle(u32, u32),
    /// Altitude within tolerance; holds the longest edge `(a, b)` and apex.
    Cap { a: u32, b: u32, apex: u32 },
}

fn classify(mesh: &Mesh, face: [u32; 3], tol: f64) -> Option<Defect> {
    let [i0, i1, i2] = face;
    if i0 == i1 || i1 == i2 || i2 == i0 {
        return Some(Defect::RepeatedIndex);
    }

    let tri = mesh.triangle_of(face);
    let lengths = tri.edge_lengths();
    let edges = [(i0, i1, i2), (i1, i2, i0), (i2, i0, i1)];

    let (shortest, _) = lengths
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, &l)| if l < best.1 { (i, l) } else { best });
    if lengths[shortest] <= tol {
        let (a, b, _) = edges[shortest];
        return Some(Defect::Needle(a, b));
    }

    if tri.height() <= tol {
        let (longest, _) = lengths
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &l)| if l > best.1 { (i, l) } else { best });
        let (a, b, apex) = edges[longest];
        return Some(Defect::Cap { a, b, apex });
    }

    None
}

/// Canonical key for a face regardless of winding.
fn sorted_key(face: [u32; 3]) -> [u32; 3] {
    let mut key = face;
    key.sort_unstable();
    key
}

/// Non-mutating classification of degenerate faces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DegeneracyScan {
    /// Faces with a repeated vertex index.
    pub index_degenerate: Vec<u32>,
    /// Faces with an edge within tolerance.
    pub needles: Vec<u32>,
    /// Faces with an altitude within tolerance and no short edge.
    pub caps: Vec<u32>,
    /// Later copies of a face already seen (either winding).
    pub duplicates: Vec<u32>,
}

impl DegeneracyScan {
    /// Total number of flagged faces.
    pub fn total(&self) -> usize {
        self.index_degenerate.len() + self.needles.len() + self.caps.len() + self.duplicates.len()
    }

    /// Whether no face was flagged.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Classify every live face without modifying the mesh.
pub fn find_degeneracies(mesh: &Mesh, tolerance: Tolerance) -> DegeneracyScan {
    let tol = tolerance.value();
    let mut scan = DegeneracyScan::default();
    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(mesh.face_count());

    for (f, face) in mesh.live_faces() {
        match classify(mesh, face, tol) {
            Some(Defect::RepeatedIndex) => {
                scan.index_degenerate.push(f);
                continue;
            }
            Some(Defect::Needle(..)) => scan.needles.push(f),
            Some(Defect::Cap { .. }) => scan.caps.push(f),
            None => {}
        }
        if !seen.insert(sorted_key(face)) {
            scan.duplicates.push(f);
        }
    }

    scan
}

/// Counts from one [`remove_degeneracies`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct DegeneracyReport {
    /// Faces deleted because of a repeated vertex index.
    pub index_degenerate_removed: usize,
    /// Vertices merged away by needle collapse.
    pub vertices_merged: usize,
    /// Faces deleted because needle collapse made them degenerate.
    pub needles_removed: usize,
    /// Caps removed by splitting their neighbour.
    pub caps_split: usize,
    /// Caps deleted outright (no usable neighbour).
    pub caps_removed: usize,
    /// Duplicate faces deleted.
    pub duplicates_removed: usize,
    /// Vertices left without faces and removed.
    pub vertices_removed: usize,
}

impl DegeneracyReport {
    /// Total number of changes. Zero iff the sweep left the mesh untouched.
    pub fn total(&self) -> usize {
        self.faces_removed() + self.vertices_merged + self.vertices_removed
    }

    /// Faces deleted by the sweep. Split caps count as removed.
    pub fn faces_removed(&self) -> usize {
        self.index_degenerate_removed
            + self.needles_removed
            + self.caps_split
            + self.caps_removed
            + self.duplicates_removed
    }

    /// Accumulate another sweep's counts.
    pub fn absorb(&mut self, other: &DegeneracyReport) {
        self.index_degenerate_removed += other.index_degenerate_removed;
        self.vertices_merged += other.vertices_merged;
        self.needles_removed += other.needles_removed;
        self.caps_split += other.caps_split;
        self.caps_removed += other.caps_removed;
        self.duplicates_removed += other.duplicates_removed;
        self.vertices_removed += other.vertices_removed;
    }
}

/// Union-find over vertex slots; the smaller index becomes the root.
struct VertexMerge {
    parent: Vec<u32>,
}

impl VertexMerge {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
        }
    }

    fn find(&mut self, v: u32) -> u32 {
        let mut root = v;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut cur = v;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    /// Returns true if the two sets were distinct.
    fn union(&mut self, a: u32, b: u32) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (keep, drop) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[drop as usize] = keep;
        true
    }
}

/// Run one degeneracy sweep over the mesh.
///
/// Face removal is logical and orphaned vertices are only flagged, so the
/// caller decides when to [`Mesh::compact`].
///
/// # Example
///
/// ```
/// use mesh_fix::{Mesh, Tolerance, remove_degeneracies};
///
/// let mut mesh = Mesh::from_arrays(
///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
///     &[[0, 1, 2], [2, 1, 0], [0, 0, 1]],
/// )
/// .unwrap();
///
/// let tol = Tolerance::for_mesh(&mesh, Tolerance::DEFAULT_RELATIVE);
/// let report = remove_degeneracies(&mut mesh, tol);
/// assert_eq!(report.duplicates_removed, 1);
/// assert_eq!(report.index_degenerate_removed, 1);
/// assert_eq!(mesh.face_count(), 1);
/// ```
pub fn remove_degeneracies(mesh: &mut Mesh, tolerance: Tolerance) -> DegeneracyReport {
    let tol = tolerance.value();
    let mut report = DegeneracyReport::default();

    // Index-degenerate faces and needle merges.
    let mut merge = VertexMerge::new(mesh.vertex_slots());
    let mut to_remove = Vec::new();
    for (f, face) in mesh.live_faces() {
        match classify(mesh, face, tol) {
            Some(Defect::RepeatedIndex) => to_remove.push(f),
            Some(Defect::Needle(a, b)) => {
                if merge.union(a, b) {
                    report.vertices_merged += 1;
                }
            }
            _ => {}
        }
    }
    for f in to_remove {
        if mesh.remove_face(f) {
            report.index_degenerate_removed += 1;
        }
    }

    if report.vertices_merged > 0 {
        let faces: Vec<(u32, [u32; 3])> = mesh.live_faces().collect();
        for (f, face) in faces {
            let mapped = face.map(|v| merge.find(v));
            if mapped == face {
                continue;
            }
            if mapped[0] == mapped[1] || mapped[1] == mapped[2] || mapped[2] == mapped[0] {
                mesh.remove_face(f);
                report.needles_removed += 1;
            } else {
                mesh.replace_face(f, mapped);
            }
        }
        debug!(
            "Needle collapse: {} vertices merged, {} faces removed",
            report.vertices_merged, report.needles_removed
        );
    }

    split_caps(mesh, tol, &mut report);

    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(mesh.face_count());
    let duplicates: Vec<u32> = mesh
        .live_faces()
        .filter(|&(_, face)| !seen.insert(sorted_key(face)))
        .map(|(f, _)| f)
        .collect();
    for f in duplicates {
        if mesh.remove_face(f) {
            report.duplicates_removed += 1;
        }
    }

    report.vertices_removed = mesh.remove_unreferenced_vertices();

    if report.total() > 0 {
        info!(
            "Degeneracy sweep: {} faces removed, {} vertices merged, {} caps split, {} orphan vertices",
            report.faces_removed(),
            report.vertices_merged,
            report.caps_split,
            report.vertices_removed
        );
    }
    report
}

/// Remove caps by splitting the neighbour across the longest edge at the apex.
///
/// A face touched by one split is left alone for the rest of the sweep; the
/// next sweep picks up whatever remains.
fn split_caps(mesh: &mut Mesh, tol: f64, report: &mut DegeneracyReport) {
    let caps: Vec<(u32, u32, u32, u32)> = mesh
        .live_faces()
        .filter_map(|(f, face)| match classify(mesh, face, tol) {
            Some(Defect::Cap { a, b, apex }) => Some((f, a, b, apex)),
            _ => None,
        })
        .collect();
    if caps.is_empty() {
        return;
    }

    let adjacency = MeshAdjacency::build(mesh);
    let mut touched: HashSet<u32> = HashSet::new();

    for (cap, a, b, apex) in caps {
        if touched.contains(&cap) {
            continue;
        }

        let split = match adjacency.faces_for_edge(a, b) {
            [f0, f1] => {
                let neighbor = if *f0 == cap { *f1 } else { *f0 };
                if touched.contains(&neighbor) {
                    None
                } else {
                    mesh.face(neighbor)
                        .and_then(|face| split_at_edge(face, a, b, apex))
                        .map(|halves| (neighbor, halves))
                }
            }
            _ => None,
        };

        touched.insert(cap);
        mesh.remove_face(cap);
        match split {
            Some((neighbor, [first, second])) => {
                touched.insert(neighbor);
                mesh.replace_face(neighbor, first);
                let added = mesh.add_face(second);
                touched.insert(added);
                report.caps_split += 1;
            }
            None => report.caps_removed += 1,
        }
    }

    debug!(
        "Cap removal: {} split, {} deleted",
        report.caps_split, report.caps_removed
    );
}

/// Split `face` across its edge `{a, b}` at vertex `apex`, keeping winding.
fn split_at_edge(face: [u32; 3], a: u32, b: u32, apex: u32) -> Option<[[u32; 3]; 2]> {
    if face.contains(&apex) {
        return None;
    }
    (0..3).find_map(|i| {
        let (x, y, d) = (face[i], face[(i + 1) % 3], face[(i + 2) % 3]);
        let on_edge = (x == a && y == b) || (x == b && y == a);
        on_edge.then_some([[x, apex, d], [apex, y, d]])
    })
}

fn cell_of(p: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

/// Weld live vertices closer than `epsilon` into their lowest-index neighbour.
///
/// Faces are remapped and faces that collapse are removed. Returns the number
/// of vertices merged away.
pub fn merge_coincident_vertices(mesh: &mut Mesh, epsilon: f64) -> MeshResult<usize> {
    if !(epsilon.is_finite() && epsilon > 0.0) {
        return Err(MeshError::invalid_parameter(
            "epsilon",
            format!("must be positive and finite, got {}", epsilon),
        ));
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (v, vertex) in mesh.live_vertices() {
        spatial_hash
            .entry(cell_of(&vertex.position, cell_size))
            .or_default()
            .push(v);
    }

    let mut merge = VertexMerge::new(mesh.vertex_slots());
    let mut merged = 0;

    for (v, vertex) in mesh.live_vertices() {
        if merge.find(v) != v {
            continue;
        }
        let cell = cell_of(&vertex.position, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= v || merge.find(other) != other {
                            continue;
                        }
                        if (vertex.position - mesh.position(other)).norm() < epsilon
                            && merge.union(v, other)
                        {
                            merged += 1;
                        }
                    }
                }
            }
        }
    }

    if merged == 0 {
        return Ok(0);
    }

    let faces: Vec<(u32, [u32; 3])> = mesh.live_faces().collect();
    for (f, face) in faces {
        let mapped = face.map(|v| merge.find(v));
        if mapped == face {
            continue;
        }
        if mapped[0] == mapped[1] || mapped[1] == mapped[2] || mapped[2] == mapped[0] {
            mesh.remove_face(f);
        } else {
            mesh.replace_face(f, mapped);
        }
    }
    for v in 0..mesh.vertex_slots() as u32 {
        if merge.find(v) != v {
            mesh.retire_vertex(v);
        }
    }

    info!(
        "Merged {} coincident vertices (epsilon = {:.3e})",
        merged, epsilon
    );
    Ok(merged)
}
