//! Hole filling.
//!
//! A boundary loop is projected onto the plane of its Newell normal and
//! triangulated by ear clipping, which yields exactly `K - 2` triangles for a
//! loop of `K` edges. With refinement on, the patch is then densified to
//! match the surrounding edge lengths: centroids are inserted where a
//! triangle is too large for the local sizing field, and each insertion round
//! is followed by Delaunay-style edge flips inside the patch.

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::adjacency::{MeshAdjacency, normalize_edge};
use crate::boundary::{BoundaryLoop, scan_boundaries};
use crate::error::{MeshError, MeshResult};

/// Insertion rounds before refinement gives up.
const MAX_REFINE_ROUNDS: usize = 16;

/// Flip sweeps per relaxation.
const MAX_FLIP_SWEEPS: usize = 32;

/// Steiner vertices allowed per boundary vertex.
const STEINER_PER_LOOP_VERTEX: usize = 64;

/// What one filled loop added to the mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct FillReport {
    /// Faces added.
    pub triangles_added: usize,
    /// Steiner vertices added.
    pub vertices_added: usize,
    /// Faces dropped instead of filled. A three-edge loop that runs around
    /// a single face is closed by deleting that face.
    pub faces_removed: usize,
}

/// Fill one boundary loop.
///
/// Without refinement only the loop's own vertices are used. The new faces
/// follow the loop order, which makes them consistently wound with the faces
/// around the hole.
///
/// # Errors
///
/// [`MeshError::DegenerateBoundary`] when the loop has fewer than three
/// distinct vertices, no usable plane, or self-intersects once projected.
/// The mesh is not modified in that case.
///
/// # Example
///
/// ```
/// use mesh_fix::{Mesh, fill_boundary, scan_boundaries};
///
/// // A tetrahedron without its base.
/// let mut mesh = Mesh::from_arrays(
///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
///     &[[0, 1, 3], [1, 2, 3], [0, 3, 2]],
/// )
/// .unwrap();
/// let boundary = scan_boundaries(&mesh).loops.remove(0);
///
/// let report = fill_boundary(&mut mesh, &boundary, false).unwrap();
/// assert_eq!(report.triangles_added, 1);
/// assert_eq!(report.vertices_added, 0);
/// ```
pub fn fill_boundary(mesh: &mut Mesh, boundary: &BoundaryLoop, refine: bool) -> MeshResult<FillReport> {
    let adjacency = MeshAdjacency::build(mesh);
    let mut added_edges = HashSet::new();
    fill_loop(mesh, &adjacency, &mut added_edges, boundary, 0, refine)
}

/// Outcome of [`fill_boundaries_under`].
#[derive(Debug, Default)]
pub struct FillSummary {
    /// Loops filled.
    pub filled: usize,
    /// Faces added over all loops.
    pub triangles_added: usize,
    /// Steiner vertices added over all loops.
    pub vertices_added: usize,
    /// Lone faces dropped to close their own rim.
    pub faces_removed: usize,
    /// Loops left open because they reached the edge limit.
    pub skipped: usize,
    /// Loops that could not be filled, by discovery index.
    pub failed: Vec<(usize, MeshError)>,
    /// Boundary walks that did not close into loops.
    pub defects: Vec<MeshError>,
}

impl FillSummary {
    /// Whether every loop that was attempted got filled.
    pub fn all_filled(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fill every boundary loop with fewer than `max_edges` edges.
///
/// `max_edges == 0` fills every loop. Larger loops are left open, which is
/// what an intentionally open surface needs. Loops that cannot be filled are
/// reported in [`FillSummary::failed`] and the remaining loops still proceed.
pub fn fill_boundaries_under(mesh: &mut Mesh, max_edges: usize, refine: bool) -> FillSummary {
    let scan = scan_boundaries(mesh);
    let mut summary = FillSummary {
        defects: scan.defects,
        ..FillSummary::default()
    };
    if scan.loops.is_empty() {
        return summary;
    }

    let adjacency = MeshAdjacency::build(mesh);
    let mut added_edges = HashSet::new();

    for (index, boundary) in scan.loops.iter().enumerate() {
        if max_edges != 0 && boundary.edge_count() >= max_edges {
            debug!(
                "Leaving loop {} open: {} edges (limit {})",
                index,
                boundary.edge_count(),
                max_edges
            );
            summary.skipped += 1;
            continue;
        }

        match fill_loop(mesh, &adjacency, &mut added_edges, boundary, index, refine) {
            Ok(report) => {
                summary.filled += 1;
                summary.triangles_added += report.triangles_added;
                summary.vertices_added += report.vertices_added;
                summary.faces_removed += report.faces_removed;
            }
            Err(err) => {
                warn!("{}", err);
                summary.failed.push((index, err));
            }
        }
    }

    if summary.filled > 0 {
        info!(
            "Filled {} hole(s): {} triangles, {} new vertices",
            summary.filled, summary.triangles_added, summary.vertices_added
        );
    }
    summary
}

/// Triangulated patch in local indices. The first `boundary_len` locals are
/// the loop vertices in order; later locals are Steiner points.
struct Patch {
    positions: Vec<Point3<f64>>,
    sizing: Vec<f64>,
    ids: Vec<u32>,
    boundary_len: usize,
    normal: Vector3<f64>,
    triangles: Vec<[usize; 3]>,
}

impl Patch {
    fn is_loop_edge(&self, a: usize, b: usize) -> bool {
        let n = self.boundary_len;
        a < n && b < n && ((a + 1) % n == b || (b + 1) % n == a)
    }

    fn triangle_normal(&self, [a, b, c]: [usize; 3]) -> Vector3<f64> {
        (self.positions[b] - self.positions[a]).cross(&(self.positions[c] - self.positions[a]))
    }
}

pub(crate) fn fill_loop(
    mesh: &mut Mesh,
    adjacency: &MeshAdjacency,
    added_edges: &mut HashSet<(u32, u32)>,
    boundary: &BoundaryLoop,
    loop_index: usize,
    refine: bool,
) -> MeshResult<FillReport> {
    let vertices = &boundary.vertices;
    let fail = |details: &str| MeshError::degenerate_boundary(loop_index, vertices, details);

    let distinct: HashSet<u32> = vertices.iter().copied().collect();
    if distinct.len() < 3 {
        return Err(fail("fewer than 3 distinct vertices"));
    }
    if distinct.len() != vertices.len() {
        return Err(fail("loop revisits a vertex"));
    }
    if vertices.iter().any(|&v| !mesh.is_vertex_live(v)) {
        return Err(fail("loop references a removed vertex"));
    }

    // A three-edge loop around one face: drop the face.
    if let &[a, b, c] = vertices.as_slice()
        && let Some(&lone) = adjacency
            .faces_for_edge(a, b)
            .iter()
            .find(|&&f| mesh.face(f).is_some_and(|face| face.contains(&c)))
    {
        mesh.remove_face(lone);
        debug!("Loop {} is the rim of lone face {}; dropped it", loop_index, lone);
        return Ok(FillReport {
            faces_removed: 1,
            ..FillReport::default()
        });
    }

    let positions: Vec<Point3<f64>> = vertices.iter().map(|&v| mesh.position(v)).collect();
    let normal = newell_normal(&positions);
    let perimeter: f64 = boundary.perimeter(mesh);
    let normal_len = normal.norm();
    if !(normal_len > 1e-12 * perimeter * perimeter) {
        return Err(fail("boundary has no usable plane (vanishing normal)"));
    }
    let normal = normal / normal_len;

    let flat = project(&positions, &normal);
    if polygon_self_intersects(&flat) {
        return Err(fail("projected boundary self-intersects"));
    }

    let has_edge = |a: u32, b: u32| {
        adjacency.has_edge(a, b) || added_edges.contains(&normalize_edge(a, b))
    };

    let local_triangles = ear_clip(&flat, |i, j| has_edge(vertices[i], vertices[j]));

    let sizing = if refine {
        loop_sizing(mesh, adjacency, vertices)
    } else {
        Vec::new()
    };
    let mut patch = Patch {
        positions,
        sizing,
        ids: vertices.clone(),
        boundary_len: vertices.len(),
        normal,
        triangles: local_triangles,
    };

    if refine {
        let base = mesh.vertex_slots() as u32;
        refine_patch(&mut patch, base, &has_edge);
    }

    let mut report = FillReport::default();
    for &position in &patch.positions[patch.boundary_len..] {
        mesh.add_vertex(position);
        report.vertices_added += 1;
    }
    for tri in &patch.triangles {
        let face = tri.map(|i| patch.ids[i]);
        for k in 0..3 {
            added_edges.insert(normalize_edge(face[k], face[(k + 1) % 3]));
        }
        mesh.add_face(face);
        report.triangles_added += 1;
    }

    debug!(
        "Filled loop {} ({} edges): {} triangles, {} new vertices",
        loop_index,
        vertices.len(),
        report.triangles_added,
        report.vertices_added
    );
    Ok(report)
}

/// Newell's normal of a closed polygon; its length is twice the area.
fn newell_normal(positions: &[Point3<f64>]) -> Vector3<f64> {
    let n = positions.len();
    let centroid = positions
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords)
        / n as f64;

    (0..n).fold(Vector3::zeros(), |acc, i| {
        let v0 = positions[i].coords - centroid;
        let v1 = positions[(i + 1) % n].coords - centroid;
        acc + v0.cross(&v1)
    })
}

/// Project onto a right-handed basis of the plane, so a loop wound
/// counter-clockwise around `normal` stays counter-clockwise in 2D.
fn project(positions: &[Point3<f64>], normal: &Vector3<f64>) -> Vec<(f64, f64)> {
    let helper = if normal.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = normal.cross(&helper).normalize();
    let v = normal.cross(&u);
    let origin = positions[0];
    positions
        .iter()
        .map(|p| {
            let d = p - origin;
            (d.dot(&u), d.dot(&v))
        })
        .collect()
}

fn orient(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

fn segments_intersect(a: (f64, f64), b: (f64, f64), c: (f64, f64), d: (f64, f64)) -> bool {
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(c, d, a))
        || (d2 == 0.0 && on_segment(c, d, b))
        || (d3 == 0.0 && on_segment(a, b, c))
        || (d4 == 0.0 && on_segment(a, b, d))
}

/// Whether any two non-adjacent edges of the closed polygon meet.
fn polygon_self_intersects(flat: &[(f64, f64)]) -> bool {
    let n = flat.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        let (a, b) = (flat[i], flat[(i + 1) % n]);
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if segments_intersect(a, b, flat[j], flat[(j + 1) % n]) {
                return true;
            }
        }
    }
    false
}

fn point_in_triangle_2d(p: (f64, f64), a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    let d1 = orient(a, b, p);
    let d2 = orient(b, c, p);
    let d3 = orient(c, a, p);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;

    !(has_neg && has_pos)
}

/// Check if `curr` forms a valid ear of the counter-clockwise polygon.
fn is_ear(flat: &[(f64, f64)], remaining: &[usize], prev: usize, curr: usize, next: usize) -> bool {
    let (a, b, c) = (flat[prev], flat[curr], flat[next]);
    if orient(a, b, c) <= 0.0 {
        return false;
    }
    remaining
        .iter()
        .filter(|&&i| i != prev && i != curr && i != next)
        .all(|&i| !point_in_triangle_2d(flat[i], a, b, c))
}

/// Ear-clip a simple counter-clockwise polygon into `n - 2` triangles.
///
/// Ears whose closing diagonal already exists (`diagonal_taken`) are avoided
/// while any other ear is available. If no ear is found numerically the rest
/// is fanned.
fn ear_clip(flat: &[(f64, f64)], diagonal_taken: impl Fn(usize, usize) -> bool) -> Vec<[usize; 3]> {
    let n = flat.len();
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n.saturating_sub(2));
    let mut cursor = 0;

    while remaining.len() > 3 {
        let len = remaining.len();
        let ear_at = |i: usize, strict: bool| {
            let prev = remaining[(i + len - 1) % len];
            let curr = remaining[i];
            let next = remaining[(i + 1) % len];
            is_ear(flat, &remaining, prev, curr, next) && !(strict && diagonal_taken(prev, next))
        };

        let found = (0..len)
            .map(|k| (cursor + k) % len)
            .find(|&i| ear_at(i, true))
            .or_else(|| (0..len).map(|k| (cursor + k) % len).find(|&i| ear_at(i, false)));

        let Some(i) = found else {
            warn!(
                "Ear clipping stuck with {} vertices remaining, using fan triangulation",
                len
            );
            break;
        };

        triangles.push([remaining[(i + len - 1) % len], remaining[i], remaining[(i + 1) % len]]);
        remaining.remove(i);
        cursor = i % remaining.len();
    }

    if remaining.len() >= 3 {
        let center = remaining[0];
        for w in remaining[1..].windows(2) {
            triangles.push([center, w[0], w[1]]);
        }
    }
    triangles
}

/// Mean incident edge length at each loop vertex.
fn loop_sizing(mesh: &Mesh, adjacency: &MeshAdjacency, vertices: &[u32]) -> Vec<f64> {
    let sizing: Vec<Option<f64>> = vertices
        .iter()
        .map(|&v| {
            let p = mesh.position(v);
            let mut neighbors: Vec<u32> = adjacency
                .faces_for_vertex(v)
                .iter()
                .filter_map(|&f| mesh.face(f))
                .flat_map(|face| face.into_iter())
                .filter(|&u| u != v)
                .collect();
            neighbors.sort_unstable();
            neighbors.dedup();
            if neighbors.is_empty() {
                None
            } else {
                let total: f64 = neighbors.iter().map(|&u| (mesh.position(u) - p).norm()).sum();
                Some(total / neighbors.len() as f64)
            }
        })
        .collect();

    let n = vertices.len();
    let mean_boundary = (0..n)
        .map(|i| (mesh.position(vertices[(i + 1) % n]) - mesh.position(vertices[i])).norm())
        .sum::<f64>()
        / n as f64;

    sizing
        .into_iter()
        .map(|s| s.unwrap_or(mean_boundary))
        .collect()
}

fn refine_patch(patch: &mut Patch, base: u32, has_mesh_edge: &impl Fn(u32, u32) -> bool) {
    let max_steiner = patch.boundary_len * STEINER_PER_LOOP_VERTEX;

    relax(patch, has_mesh_edge);
    for round in 0..MAX_REFINE_ROUNDS {
        let inserted = split_large_triangles(patch, base, max_steiner);
        if inserted == 0 {
            break;
        }
        relax(patch, has_mesh_edge);
        debug!("Refinement round {}: {} Steiner vertices", round, inserted);
    }
}

/// Insert centroids into triangles too large for the sizing field.
fn split_large_triangles(patch: &mut Patch, base: u32, max_steiner: usize) -> usize {
    let mut inserted = 0;
    let count = patch.triangles.len();

    for t in 0..count {
        if patch.positions.len() - patch.boundary_len >= max_steiner {
            break;
        }
        let [a, b, c] = patch.triangles[t];
        let centroid = Point3::from(
            (patch.positions[a].coords + patch.positions[b].coords + patch.positions[c].coords)
                / 3.0,
        );
        let sigma = (patch.sizing[a] + patch.sizing[b] + patch.sizing[c]) / 3.0;

        let too_large = [a, b, c].iter().all(|&v| {
            let d = std::f64::consts::SQRT_2 * (centroid - patch.positions[v]).norm();
            d > sigma && d > patch.sizing[v]
        });
        if !too_large {
            continue;
        }

        let m = patch.positions.len();
        patch.positions.push(centroid);
        patch.sizing.push(sigma);
        patch.ids.push(base + (m - patch.boundary_len) as u32);

        patch.triangles[t] = [a, b, m];
        patch.triangles.push([b, c, m]);
        patch.triangles.push([c, a, m]);
        inserted += 1;
    }
    inserted
}

fn angle_at(apex: Point3<f64>, p: Point3<f64>, q: Point3<f64>) -> f64 {
    let (u, v) = (p - apex, q - apex);
    let denom = u.norm() * v.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (u.dot(&v) / denom).clamp(-1.0, 1.0).acos()
}

/// Flip patch-interior edges whose opposite angles sum above pi.
fn relax(patch: &mut Patch, has_mesh_edge: &impl Fn(u32, u32) -> bool) {
    for _ in 0..MAX_FLIP_SWEEPS {
        let mut edge_map: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (t, tri) in patch.triangles.iter().enumerate() {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                edge_map.entry((a.min(b), a.max(b))).or_default().push(t);
            }
        }

        let mut interior: Vec<((usize, usize), usize, usize)> = edge_map
            .iter()
            .filter(|((a, b), tris)| tris.len() == 2 && !patch.is_loop_edge(*a, *b))
            .map(|(&edge, tris)| (edge, tris[0], tris[1]))
            .collect();
        interior.sort_unstable();

        let mut touched = vec![false; patch.triangles.len()];
        let mut flips = 0;

        for ((a, b), t1, t2) in interior {
            if touched[t1] || touched[t2] {
                continue;
            }
            // Orient so that t1 runs a -> b.
            let (first, second) = if runs(patch.triangles[t1], a, b) {
                (t1, t2)
            } else {
                (t2, t1)
            };
            let (Some(c), Some(d)) = (
                third(patch.triangles[first], a, b),
                third(patch.triangles[second], a, b),
            ) else {
                continue;
            };
            if c == d || !runs(patch.triangles[second], b, a) {
                continue;
            }

            let p = &patch.positions;
            let opposite = angle_at(p[c], p[a], p[b]) + angle_at(p[d], p[b], p[a]);
            if opposite <= std::f64::consts::PI + 1e-12 {
                continue;
            }

            let exists = edge_map.contains_key(&(c.min(d), c.max(d)))
                || has_mesh_edge(patch.ids[c], patch.ids[d]);
            if exists {
                continue;
            }

            let new_first = [a, d, c];
            let new_second = [d, b, c];
            if patch.triangle_normal(new_first).dot(&patch.normal) <= 0.0
                || patch.triangle_normal(new_second).dot(&patch.normal) <= 0.0
            {
                continue;
            }

            patch.triangles[first] = new_first;
            patch.triangles[second] = new_second;
            touched[first] = true;
            touched[second] = true;
            flips += 1;
        }

        if flips == 0 {
            break;
        }
    }
}

/// Whether `tri` traverses the directed edge `a -> b`.
fn runs(tri: [usize; 3], a: usize, b: usize) -> bool {
    (0..3).any(|k| tri[k] == a && tri[(k + 1) % 3] == b)
}

fn third(tri: [usize; 3], a: usize, b: usize) -> Option<usize> {
    tri.iter().copied().find(|&v| v != a && v != b)
}
