//! Self-intersection detection.
//!
//! Triangles are bucketed into an octree over the mesh bounding box. A cell
//! is split only while it holds more than `cell_capacity` triangles, so the
//! work per cell tracks local density rather than the global face count.
//! Every pair sharing a leaf is then tested exactly.
//!
//! Pairs are classified by how many vertex indices they share:
//!
//! - none: separating-axis test, touching counts as intersecting;
//! - one: the edge opposite the shared vertex of either triangle must not
//!   reach the other triangle (angular sectors when coplanar);
//! - two (a shared edge): only a coplanar fold-over is an intersection;
//! - three: duplicate faces always overlap.

use std::fmt;
use std::ops::ControlFlow;

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::types::{Mesh, Triangle};

/// Default leaf capacity of the spatial tree.
pub const DEFAULT_CELL_CAPACITY: usize = 50;

/// Depth at which cells stop splitting regardless of occupancy.
const MAX_DEPTH: usize = 16;

/// Parameters for self-intersection detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionParams {
    /// A cell is subdivided while it holds more than this many triangles.
    pub cell_capacity: usize,
    /// Relative tolerance. Lengths are scaled by the bounding-box diagonal,
    /// angles are used as is.
    pub epsilon: f64,
    /// Only test pairs that share no vertex.
    pub proper_only: bool,
}

impl Default for IntersectionParams {
    fn default() -> Self {
        Self {
            cell_capacity: DEFAULT_CELL_CAPACITY,
            epsilon: 1e-10,
            proper_only: false,
        }
    }
}

impl IntersectionParams {
    /// Default parameters with the given cell capacity.
    pub fn with_cell_capacity(cell_capacity: usize) -> Self {
        Self {
            cell_capacity,
            ..Self::default()
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl Aabb {
    fn empty() -> Self {
        Self {
            min: Point3::from(Vector3::repeat(f64::INFINITY)),
            max: Point3::from(Vector3::repeat(f64::NEG_INFINITY)),
        }
    }

    fn from_triangle(tri: &Triangle) -> Self {
        let min = Point3::new(
            tri.v0.x.min(tri.v1.x).min(tri.v2.x),
            tri.v0.y.min(tri.v1.y).min(tri.v2.y),
            tri.v0.z.min(tri.v1.z).min(tri.v2.z),
        );
        let max = Point3::new(
            tri.v0.x.max(tri.v1.x).max(tri.v2.x),
            tri.v0.y.max(tri.v1.y).max(tri.v2.y),
            tri.v0.z.max(tri.v1.z).max(tri.v2.z),
        );
        Self { min, max }
    }

    fn expand(&self, epsilon: f64) -> Self {
        let e = Vector3::repeat(epsilon);
        Self {
            min: self.min - e,
            max: self.max + e,
        }
    }

    fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Minimum corner of the overlap of two boxes.
    fn overlap_min(&self, other: &Aabb) -> Point3<f64> {
        self.min.sup(&other.min)
    }

    /// Children obtained by halving every axis with positive extent.
    fn split(&self) -> Vec<Aabb> {
        let mid = nalgebra::center(&self.min, &self.max);
        let halves = |axis: usize| -> Vec<(f64, f64)> {
            if self.max[axis] > self.min[axis] {
                vec![(self.min[axis], mid[axis]), (mid[axis], self.max[axis])]
            } else {
                vec![(self.min[axis], self.max[axis])]
            }
        };

        let (xs, ys, zs) = (halves(0), halves(1), halves(2));
        let mut children = Vec::with_capacity(xs.len() * ys.len() * zs.len());
        for &(x0, x1) in &xs {
            for &(y0, y1) in &ys {
                for &(z0, z1) in &zs {
                    children.push(Aabb {
                        min: Point3::new(x0, y0, z0),
                        max: Point3::new(x1, y1, z1),
                    });
                }
            }
        }
        children
    }
}

/// A leaf cell: a box and a range into the item arena.
#[derive(Debug, Clone)]
struct Leaf {
    bounds: Aabb,
    start: usize,
    end: usize,
}

/// Octree of face slots, stored as leaf ranges over one flat arena.
#[derive(Debug, Clone)]
pub struct SpatialTree {
    generation: u64,
    cell_capacity: usize,
    tolerance: f64,
    bounds: Aabb,
    leaves: Vec<Leaf>,
    items: Vec<u32>,
    /// Expanded box per face slot; removed slots hold an empty box.
    boxes: Vec<Aabb>,
    depth: usize,
}

impl SpatialTree {
    /// Build the tree over the live faces of `mesh`.
    pub fn build(mesh: &Mesh, cell_capacity: usize) -> Self {
        Self::build_with_tolerance(mesh, cell_capacity, IntersectionParams::default().epsilon)
    }

    fn build_with_tolerance(mesh: &Mesh, cell_capacity: usize, epsilon: f64) -> Self {
        let cell_capacity = cell_capacity.max(1);
        let tolerance = epsilon * mesh.diagonal();

        let mut boxes = vec![Aabb::empty(); mesh.face_slots()];
        let mut bounds = Aabb::empty();
        let mut root_items = Vec::with_capacity(mesh.face_count());
        for (f, face) in mesh.live_faces() {
            let aabb = Aabb::from_triangle(&mesh.triangle_of(face)).expand(tolerance);
            bounds = bounds.union(&aabb);
            boxes[f as usize] = aabb;
            root_items.push(f);
        }

        let mut tree = Self {
            generation: mesh.generation(),
            cell_capacity,
            tolerance,
            bounds,
            leaves: Vec::new(),
            items: Vec::with_capacity(root_items.len()),
            boxes,
            depth: 0,
        };
        if root_items.is_empty() {
            return tree;
        }

        let mut stack = vec![(bounds, root_items, 0usize)];
        while let Some((cell, faces, depth)) = stack.pop() {
            tree.depth = tree.depth.max(depth);

            if faces.len() > cell_capacity && depth < MAX_DEPTH {
                let children: Vec<(Aabb, Vec<u32>)> = cell
                    .split()
                    .into_iter()
                    .map(|child| {
                        let inside = faces
                            .iter()
                            .copied()
                            .filter(|&f| tree.boxes[f as usize].overlaps(&child))
                            .collect();
                        (child, inside)
                    })
                    .collect();

                let progress = children.len() > 1
                    && children.iter().all(|(_, inside)| inside.len() < faces.len());
                if progress {
                    for (child, inside) in children {
                        if !inside.is_empty() {
                            stack.push((child, inside, depth + 1));
                        }
                    }
                    continue;
                }
            }

            let start = tree.items.len();
            tree.items.extend_from_slice(&faces);
            tree.leaves.push(Leaf {
                bounds: cell,
                start,
                end: tree.items.len(),
            });
        }

        debug!(
            "Spatial tree: {} leaves, depth {}, {} item references",
            tree.leaves.len(),
            tree.depth,
            tree.items.len()
        );
        tree
    }

    /// Number of leaf cells.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Depth of the deepest leaf.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Largest number of faces held by one leaf.
    pub fn max_leaf_size(&self) -> usize {
        self.leaves.iter().map(|l| l.end - l.start).max().unwrap_or(0)
    }

    /// Generation of the mesh this tree was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `leaf` is the unique owner of point `p`.
    ///
    /// Leaves partition the root box; ownership is half-open except along
    /// the root's upper faces.
    fn owns(&self, leaf: &Leaf, p: &Point3<f64>) -> bool {
        (0..3).all(|axis| {
            let (lo, hi) = (leaf.bounds.min[axis], leaf.bounds.max[axis]);
            p[axis] >= lo && (p[axis] < hi || (hi == self.bounds.max[axis] && p[axis] <= hi))
        })
    }

    /// Visit every candidate pair exactly once and report the intersecting
    /// ones to `on_hit`. Returns the number of exact tests run.
    fn visit_intersections(
        &self,
        mesh: &Mesh,
        params: &IntersectionParams,
        mut on_hit: impl FnMut(u32, u32) -> ControlFlow<()>,
    ) -> usize {
        let mut tested = 0;
        for leaf in &self.leaves {
            let cell = &self.items[leaf.start..leaf.end];
            for (i, &fa) in cell.iter().enumerate() {
                let box_a = &self.boxes[fa as usize];
                for &fb in &cell[i + 1..] {
                    let box_b = &self.boxes[fb as usize];
                    if !box_a.overlaps(box_b) || !self.owns(leaf, &box_a.overlap_min(box_b)) {
                        continue;
                    }
                    let (Some(face_a), Some(face_b)) = (mesh.face(fa), mesh.face(fb)) else {
                        continue;
                    };

                    tested += 1;
                    if faces_intersect(mesh, face_a, face_b, self.tolerance, params)
                        && on_hit(fa.min(fb), fa.max(fb)).is_break()
                    {
                        return tested;
                    }
                }
            }
        }
        tested
    }
}

/// Result of a full intersection search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntersectionReport {
    /// Intersecting face slots, sorted and unique.
    pub faces: Vec<u32>,
    /// Intersecting pairs `(a, b)` with `a < b`, sorted.
    pub pairs: Vec<(u32, u32)>,
    /// Leaf cells in the spatial tree.
    pub cells: usize,
    /// Exact triangle-pair tests performed.
    pub pairs_tested: usize,
}

impl IntersectionReport {
    /// Number of intersecting faces.
    pub fn count(&self) -> usize {
        self.faces.len()
    }

    /// Whether no intersection was found.
    pub fn is_clean(&self) -> bool {
        self.faces.is_empty()
    }
}

impl fmt::Display for IntersectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            write!(f, "No self-intersections detected")
        } else {
            write!(
                f,
                "Self-intersections found: {} face(s) in {} pair(s)",
                self.faces.len(),
                self.pairs.len()
            )
        }
    }
}

/// Intersection search with a spatial tree cached across calls.
///
/// The tree is rebuilt whenever the mesh generation changes, so a detector
/// can be kept alive across mutations of the same mesh.
#[derive(Debug, Clone, Default)]
pub struct IntersectionDetector {
    params: IntersectionParams,
    tree: Option<SpatialTree>,
}

impl IntersectionDetector {
    /// Detector with default parameters and the given cell capacity.
    pub fn new(cell_capacity: usize) -> Self {
        Self::with_params(IntersectionParams::with_cell_capacity(cell_capacity))
    }

    /// Detector with explicit parameters.
    pub fn with_params(params: IntersectionParams) -> Self {
        Self { params, tree: None }
    }

    /// Current parameters.
    pub fn params(&self) -> &IntersectionParams {
        &self.params
    }

    /// Whether the cached tree matches the current state of `mesh`.
    pub fn is_cached_for(&self, mesh: &Mesh) -> bool {
        self.tree
            .as_ref()
            .is_some_and(|t| t.generation == mesh.generation())
    }

    /// Drop the cached tree.
    pub fn invalidate(&mut self) {
        self.tree = None;
    }

    fn tree(&mut self, mesh: &Mesh) -> &SpatialTree {
        let stale = !self.is_cached_for(mesh)
            || self
                .tree
                .as_ref()
                .is_some_and(|t| t.cell_capacity != self.params.cell_capacity.max(1));
        if stale {
            self.tree = None;
        }
        let params = self.params;
        self.tree.get_or_insert_with(|| {
            SpatialTree::build_with_tolerance(mesh, params.cell_capacity, params.epsilon)
        })
    }

    /// Find all intersecting faces and pairs.
    pub fn find(&mut self, mesh: &Mesh) -> IntersectionReport {
        let params = self.params;
        let tree = self.tree(mesh);

        let mut pairs = Vec::new();
        let pairs_tested = tree.visit_intersections(mesh, &params, |a, b| {
            pairs.push((a, b));
            ControlFlow::Continue(())
        });
        pairs.sort_unstable();

        let mut faces: Vec<u32> = pairs.iter().flat_map(|&(a, b)| [a, b]).collect();
        faces.sort_unstable();
        faces.dedup();

        debug!(
            "Intersection search: {} faces in {} pairs ({} tests, {} cells)",
            faces.len(),
            pairs.len(),
            pairs_tested,
            tree.leaf_count()
        );

        IntersectionReport {
            faces,
            pairs,
            cells: tree.leaf_count(),
            pairs_tested,
        }
    }

    /// Number of intersecting faces, without collecting them.
    pub fn count(&mut self, mesh: &Mesh) -> usize {
        let params = self.params;
        let tree = self.tree(mesh);
        let mut flagged = vec![false; mesh.face_slots()];
        let mut count = 0;
        tree.visit_intersections(mesh, &params, |a, b| {
            for f in [a, b] {
                if !flagged[f as usize] {
                    flagged[f as usize] = true;
                    count += 1;
                }
            }
            ControlFlow::Continue(())
        });
        count
    }

    /// Whether any pair intersects. Stops at the first hit.
    pub fn any(&mut self, mesh: &Mesh) -> bool {
        let params = self.params;
        let tree = self.tree(mesh);
        let mut hit = false;
        tree.visit_intersections(mesh, &params, |_, _| {
            hit = true;
            ControlFlow::Break(())
        });
        hit
    }
}

/// One-shot intersection search.
///
/// # Example
///
/// ```
/// use mesh_fix::{Mesh, find_intersecting_triangles};
///
/// // Two triangles crossing through each other's interior.
/// let mesh = Mesh::from_arrays(
///     &[
///         [-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 0.0],
///         [-1.0, 0.0, -1.0], [1.0, 0.0, -1.0], [0.0, 0.0, 1.0],
///     ],
///     &[[0, 1, 2], [3, 4, 5]],
/// )
/// .unwrap();
///
/// let report = find_intersecting_triangles(&mesh, 50);
/// assert_eq!(report.faces, vec![0, 1]);
/// ```
pub fn find_intersecting_triangles(mesh: &Mesh, cell_capacity: usize) -> IntersectionReport {
    IntersectionDetector::new(cell_capacity).find(mesh)
}

/// Vertex indices present in both faces, in `a`'s order.
fn shared_vertices(a: [u32; 3], b: [u32; 3]) -> Vec<u32> {
    a.iter().copied().filter(|v| b.contains(v)).collect()
}

/// Rotate `face` so that `v` comes first.
fn rotate_to(face: [u32; 3], v: u32) -> [u32; 3] {
    match face.iter().position(|&x| x == v) {
        Some(1) => [face[1], face[2], face[0]],
        Some(2) => [face[2], face[0], face[1]],
        _ => face,
    }
}

/// The vertex of `face` not in `edge`.
fn opposite(face: [u32; 3], edge: &[u32]) -> Option<u32> {
    face.iter().copied().find(|v| !edge.contains(v))
}

fn faces_intersect(
    mesh: &Mesh,
    a: [u32; 3],
    b: [u32; 3],
    tol: f64,
    params: &IntersectionParams,
) -> bool {
    let shared = shared_vertices(a, b);
    if params.proper_only && !shared.is_empty() {
        return false;
    }

    let ta = mesh.triangle_of(a);
    let tb = mesh.triangle_of(b);

    match shared.len() {
        0 => triangles_intersect(&ta, &tb, tol, params.epsilon),
        1 => {
            let [s, a1, a2] = rotate_to(a, shared[0]);
            let [_, b1, b2] = rotate_to(b, shared[0]);
            let p = |v: u32| mesh.position(v);
            share_vertex_intersect(p(s), (p(a1), p(a2)), (p(b1), p(b2)), tol, params.epsilon)
        }
        2 => match (opposite(a, &shared), opposite(b, &shared)) {
            (Some(oa), Some(ob)) => folded_over(
                mesh.position(shared[0]),
                mesh.position(shared[1]),
                mesh.position(oa),
                mesh.position(ob),
                tol,
            ),
            _ => false,
        },
        _ => true,
    }
}

/// Test if two triangles with no shared vertex intersect.
///
/// Separating-axis test over both normals and the nine edge cross products;
/// coplanar triangles use the in-plane edge normals instead.
fn triangles_intersect(t1: &Triangle, t2: &Triangle, tol: f64, epsilon: f64) -> bool {
    let n1 = t1.normal_unnormalized();
    let n2 = t2.normal_unnormalized();

    // Degenerate triangles are the degeneracy pass's business.
    if n1.norm_squared() == 0.0 || n2.norm_squared() == 0.0 {
        return false;
    }

    if separated_by_axis(&n1, t1, t2, tol) || separated_by_axis(&n2, t1, t2, tol) {
        return false;
    }

    let edges1 = [t1.v1 - t1.v0, t1.v2 - t1.v1, t1.v0 - t1.v2];
    let edges2 = [t2.v1 - t2.v0, t2.v2 - t2.v1, t2.v0 - t2.v2];

    let cross_normals = n1.cross(&n2);
    let is_coplanar =
        cross_normals.norm_squared() < epsilon * epsilon * n1.norm_squared() * n2.norm_squared();

    if is_coplanar {
        let in_plane = edges1
            .iter()
            .map(|e| n1.cross(e))
            .chain(edges2.iter().map(|e| n2.cross(e)));
        for axis in in_plane {
            if axis.norm_squared() > 0.0 && separated_by_axis(&axis, t1, t2, tol) {
                return false;
            }
        }
        return true;
    }

    for e1 in &edges1 {
        for e2 in &edges2 {
            let axis = e1.cross(e2);
            if axis.norm_squared() > 0.0 && separated_by_axis(&axis, t1, t2, tol) {
                return false;
            }
        }
    }

    true
}

/// Check if two triangles are separated along `axis`, by more than `tol`.
fn separated_by_axis(axis: &Vector3<f64>, t1: &Triangle, t2: &Triangle, tol: f64) -> bool {
    let project = |t: &Triangle| {
        let p0 = axis.dot(&t.v0.coords);
        let p1 = axis.dot(&t.v1.coords);
        let p2 = axis.dot(&t.v2.coords);
        (p0.min(p1).min(p2), p0.max(p1).max(p2))
    };
    let (min1, max1) = project(t1);
    let (min2, max2) = project(t2);

    let margin = tol * axis.norm();
    max1 + margin < min2 || max2 + margin < min1
}

/// Triangles `(s, a1, a2)` and `(s, b1, b2)` meeting at `s`.
fn share_vertex_intersect(
    s: Point3<f64>,
    (a1, a2): (Point3<f64>, Point3<f64>),
    (b1, b2): (Point3<f64>, Point3<f64>),
    tol: f64,
    epsilon: f64,
) -> bool {
    let ta = Triangle::new(s, a1, a2);
    let tb = Triangle::new(s, b1, b2);
    let Some(na) = ta.normal() else {
        return false;
    };
    if tb.normal().is_none() {
        return false;
    }

    let coplanar = na.dot(&(b1 - s)).abs() <= tol && na.dot(&(b2 - s)).abs() <= tol;
    if coplanar {
        let u = (a1 - s).normalize();
        let w = na.cross(&u);
        let flat = |p: Point3<f64>| {
            let d = p - s;
            (d.dot(&u), d.dot(&w))
        };
        return sectors_overlap((flat(a1), flat(a2)), (flat(b1), flat(b2)), epsilon);
    }

    segment_hits_triangle(a1, a2, &tb, tol) || segment_hits_triangle(b1, b2, &ta, tol)
}

fn cross2(u: (f64, f64), v: (f64, f64)) -> f64 {
    u.0 * v.1 - u.1 * v.0
}

fn norm2(u: (f64, f64)) -> f64 {
    u.0.hypot(u.1)
}

/// Whether the open angular sectors `a` and `b` (both narrower than pi and
/// anchored at the origin) overlap.
fn sectors_overlap(a: ((f64, f64), (f64, f64)), b: ((f64, f64), (f64, f64)), epsilon: f64) -> bool {
    let ccw = |(u, w): ((f64, f64), (f64, f64))| if cross2(u, w) < 0.0 { (w, u) } else { (u, w) };
    let (a, b) = (ccw(a), ccw(b));

    let left_of = |u: (f64, f64), r: (f64, f64)| cross2(u, r) > epsilon * norm2(u) * norm2(r);
    let inside = |r: (f64, f64), (u, w): ((f64, f64), (f64, f64))| left_of(u, r) && left_of(r, w);
    let same_ray = |u: (f64, f64), r: (f64, f64)| {
        cross2(u, r).abs() <= epsilon * norm2(u) * norm2(r) && u.0 * r.0 + u.1 * r.1 > 0.0
    };

    inside(b.0, a)
        || inside(b.1, a)
        || inside(a.0, b)
        || inside(a.1, b)
        || (same_ray(a.0, b.0) && same_ray(a.1, b.1))
}

/// Whether segment `pq` reaches triangle `tri`, within `tol`.
///
/// Segments lying in the triangle's plane are not handled here.
fn segment_hits_triangle(p: Point3<f64>, q: Point3<f64>, tri: &Triangle, tol: f64) -> bool {
    let Some(n) = tri.normal() else {
        return false;
    };
    let dp = n.dot(&(p - tri.v0));
    let dq = n.dot(&(q - tri.v0));
    if (dp > tol && dq > tol) || (dp < -tol && dq < -tol) {
        return false;
    }
    if (dp - dq).abs() <= tol {
        return false;
    }

    let t = (dp / (dp - dq)).clamp(0.0, 1.0);
    let x = p + (q - p) * t;
    point_in_triangle(&x, tri, &n, tol)
}

fn point_in_triangle(x: &Point3<f64>, tri: &Triangle, n: &Vector3<f64>, tol: f64) -> bool {
    [(tri.v0, tri.v1), (tri.v1, tri.v2), (tri.v2, tri.v0)]
        .iter()
        .all(|(from, to)| {
            let edge = to - from;
            n.dot(&edge.cross(&(x - from))) >= -tol * edge.norm()
        })
}

/// Faces `(s0, s1, a)` and `(s0, s1, b)` sharing an edge overlap only when
/// coplanar with `a` and `b` on the same side of the edge.
fn folded_over(s0: Point3<f64>, s1: Point3<f64>, a: Point3<f64>, b: Point3<f64>, tol: f64) -> bool {
    let Some(n) = Triangle::new(s0, s1, a).normal() else {
        return false;
    };
    if n.dot(&(b - s0)).abs() > tol {
        return false;
    }
    let edge = s1 - s0;
    let side = |p: Point3<f64>| n.dot(&edge.cross(&(p - s0)));
    side(a) * side(b) > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{merge_parts, sphere, sphere_arrays, unit_cube};

    const TOL: f64 = 1e-10;
    const EPS: f64 = 1e-10;

    fn create_xy_triangle(x: f64, y: f64, size: f64) -> Triangle {
        Triangle::new(
            Point3::new(x, y, 0.0),
            Point3::new(x + size, y, 0.0),
            Point3::new(x + size / 2.0, y + size, 0.0),
        )
    }

    fn crossing_pair() -> Mesh {
        Mesh::from_arrays(
            &[
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [0.0, 1.0, 0.0],
                [-1.0, 0.0, -1.0],
                [1.0, 0.0, -1.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 1, 2], [3, 4, 5]],
        )
        .unwrap()
    }

    #[test]
    fn test_non_intersecting_triangles() {
        let t1 = create_xy_triangle(0.0, 0.0, 1.0);
        let t2 = create_xy_triangle(10.0, 10.0, 1.0);
        assert!(!triangles_intersect(&t1, &t2, TOL, EPS));
    }

    #[test]
    fn test_coplanar_non_intersecting() {
        let t1 = create_xy_triangle(0.0, 0.0, 1.0);
        let t2 = create_xy_triangle(2.0, 0.0, 1.0);
        assert!(!triangles_intersect(&t1, &t2, TOL, EPS));
    }

    #[test]
    fn test_coplanar_intersecting() {
        let t1 = create_xy_triangle(0.0, 0.0, 2.0);
        let t2 = create_xy_triangle(0.5, 0.5, 2.0);
        assert!(triangles_intersect(&t1, &t2, TOL, EPS));
    }

    #[test]
    fn test_parallel_planes_do_not_intersect() {
        let t1 = create_xy_triangle(0.0, 0.0, 2.0);
        let mut t2 = create_xy_triangle(0.5, 0.5, 2.0);
        for v in [&mut t2.v0, &mut t2.v1, &mut t2.v2] {
            v.z = 0.5;
        }
        assert!(!triangles_intersect(&t1, &t2, TOL, EPS));
    }

    #[test]
    fn test_perpendicular_intersecting() {
        let mesh = crossing_pair();
        let t1 = mesh.triangle(0).unwrap();
        let t2 = mesh.triangle(1).unwrap();
        assert!(triangles_intersect(&t1, &t2, TOL, EPS));
    }

    #[test]
    fn test_perpendicular_non_intersecting() {
        let t1 = Triangle::new(
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        let t2 = Triangle::new(
            Point3::new(-1.0, 5.0, -1.0),
            Point3::new(1.0, 5.0, -1.0),
            Point3::new(0.0, 5.0, 1.0),
        );
        assert!(!triangles_intersect(&t1, &t2, TOL, EPS));
    }

    #[test]
    fn test_detect_crossing_pair() {
        let report = find_intersecting_triangles(&crossing_pair(), 50);
        assert_eq!(report.faces, vec![0, 1]);
        assert_eq!(report.pairs, vec![(0, 1)]);
        assert_eq!(report.pairs_tested, 1);
        assert!(report.to_string().contains("2 face(s)"));
    }

    #[test]
    fn test_closed_meshes_are_clean() {
        assert!(find_intersecting_triangles(&unit_cube(), 50).is_clean());

        let ball = sphere(3);
        let mut detector = IntersectionDetector::new(4);
        let report = detector.find(&ball);
        assert!(report.is_clean(), "{}", report);
        assert!(report.cells > 1);
        assert_eq!(detector.count(&ball), 0);
        assert!(!detector.any(&ball));
    }

    #[test]
    fn test_shared_edge_not_reported() {
        let mesh = Mesh::from_arrays(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.5, 1.0, 0.0],
                [0.5, -1.0, 0.0],
            ],
            &[[0, 1, 2], [0, 3, 1]],
        )
        .unwrap();
        assert!(find_intersecting_triangles(&mesh, 50).is_clean());
    }

    #[test]
    fn test_shared_edge_fold_over_reported() {
        let mesh = Mesh::from_arrays(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.5, 1.0, 0.0],
                [0.4, 0.5, 0.0],
            ],
            &[[0, 1, 2], [1, 0, 3]],
        )
        .unwrap();
        assert_eq!(find_intersecting_triangles(&mesh, 50).faces, vec![0, 1]);
    }

    #[test]
    fn test_shared_vertex_piercing() {
        let mesh = Mesh::from_arrays(
            &[
                [0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [0.0, 2.0, 0.0],
                [0.5, 0.5, -1.0],
                [0.5, 0.5, 1.0],
            ],
            &[[0, 1, 2], [0, 3, 4]],
        )
        .unwrap();
        assert_eq!(find_intersecting_triangles(&mesh, 50).count(), 2);

        let mut proper = IntersectionDetector::with_params(IntersectionParams {
            proper_only: true,
            ..IntersectionParams::default()
        });
        assert!(proper.find(&mesh).is_clean());
    }

    #[test]
    fn test_shared_vertex_coplanar_sectors() {
        let overlapping = Mesh::from_arrays(
            &[
                [0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [0.0, 2.0, 0.0],
                [2.0, 1.0, 0.0],
                [1.0, 2.0, 0.0],
            ],
            &[[0, 1, 2], [0, 3, 4]],
        )
        .unwrap();
        assert_eq!(find_intersecting_triangles(&overlapping, 50).count(), 2);

        let disjoint = Mesh::from_arrays(
            &[
                [0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [0.0, 2.0, 0.0],
                [-1.0, 0.0, 0.0],
                [0.0, -1.0, 0.0],
            ],
            &[[0, 1, 2], [0, 3, 4]],
        )
        .unwrap();
        assert!(find_intersecting_triangles(&disjoint, 50).is_clean());
    }

    #[test]
    fn test_duplicate_faces_reported() {
        let mut mesh = unit_cube();
        mesh.add_face([0, 1, 2]);
        let report = find_intersecting_triangles(&mesh, 50);
        assert_eq!(report.faces, vec![0, 12]);
    }

    #[test]
    fn test_result_independent_of_cell_capacity() {
        let mesh = merge_parts(&[
            sphere_arrays(2, 1.0, [0.0, 0.0, 0.0]),
            sphere_arrays(2, 1.0, [1.0, 0.2, 0.1]),
        ]);

        let reference = find_intersecting_triangles(&mesh, 1000);
        assert!(!reference.is_clean());
        for capacity in [1, 4, 16, 50] {
            let report = find_intersecting_triangles(&mesh, capacity);
            assert_eq!(report.faces, reference.faces, "capacity {}", capacity);
            assert_eq!(report.pairs, reference.pairs, "capacity {}", capacity);
        }
    }

    #[test]
    fn test_count_and_any_match_find() {
        let mesh = merge_parts(&[
            sphere_arrays(1, 1.0, [0.0, 0.0, 0.0]),
            sphere_arrays(1, 1.0, [0.5, 0.0, 0.0]),
        ]);
        let mut detector = IntersectionDetector::new(8);
        let found = detector.find(&mesh);
        assert_eq!(detector.count(&mesh), found.count());
        assert!(detector.any(&mesh));
    }

    #[test]
    fn test_tree_cache_follows_generation() {
        let mut mesh = crossing_pair();
        let mut detector = IntersectionDetector::new(50);
        assert!(!detector.is_cached_for(&mesh));

        assert_eq!(detector.count(&mesh), 2);
        assert!(detector.is_cached_for(&mesh));

        mesh.remove_face(1);
        assert!(!detector.is_cached_for(&mesh));
        assert!(detector.find(&mesh).is_clean());
        assert!(detector.is_cached_for(&mesh));
    }

    #[test]
    fn test_tree_splits_dense_cells() {
        let ball = sphere(3);
        let tree = SpatialTree::build(&ball, 8);
        assert!(tree.leaf_count() > 8);
        assert!(tree.depth() >= 1);
        assert_eq!(tree.generation(), ball.generation());

        let coarse = SpatialTree::build(&ball, 10_000);
        assert_eq!(coarse.leaf_count(), 1);
        assert_eq!(coarse.max_leaf_size(), ball.face_count());
    }

    #[test]
    fn test_empty_mesh() {
        let report = find_intersecting_triangles(&Mesh::new(), 50);
        assert!(report.is_clean());
        assert_eq!(report.cells, 0);
    }
}
