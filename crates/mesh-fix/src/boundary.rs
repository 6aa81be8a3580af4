//! Boundary loop extraction.
//!
//! A boundary edge borders exactly one live face. Boundary edges are walked
//! into closed loops by following shared vertices. Each loop runs opposite to
//! its incident faces, so a patch triangulated in loop order is wound
//! consistently with the surrounding surface.
//!
//! Walks that cannot close are reported as [`MeshError::NonManifoldBoundary`]
//! items instead of being dropped.

use hashbrown::HashMap;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::Mesh;
use crate::adjacency::{MeshAdjacency, face_edges};
use crate::error::{MeshError, MeshResult};

/// A closed boundary loop (hole rim) as an ordered cycle of vertex indices.
///
/// The closing edge from the last vertex back to the first is implicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Vertex indices in walk order.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges in the loop (equals the vertex count).
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }

    /// Directed edges of the loop, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Whether `v` lies on this loop.
    pub fn contains(&self, v: u32) -> bool {
        self.vertices.contains(&v)
    }

    /// Total length of the loop edges.
    pub fn perimeter(&self, mesh: &Mesh) -> f64 {
        self.edges()
            .map(|(a, b)| (mesh.position(b) - mesh.position(a)).norm())
            .sum()
    }
}

/// Lazy sequence of boundary loops.
///
/// Created by [`find_boundary_loops`]. Loops are produced in discovery order
/// (ascending face slot of the first unvisited boundary edge), which is
/// deterministic for a fixed mesh state. The iterator borrows the mesh, so it
/// cannot be resumed across a mutation; call [`find_boundary_loops`] again.
pub struct BoundaryLoops<'a> {
    mesh: &'a Mesh,
    /// Directed boundary half-edges `(from, to)`, oriented along the hole.
    half_edges: Vec<(u32, u32)>,
    used: Vec<bool>,
    /// Outgoing half-edge indices per start vertex.
    outgoing: HashMap<u32, Vec<usize>>,
    next_start: usize,
    pending: VecDeque<MeshResult<BoundaryLoop>>,
}

impl<'a> BoundaryLoops<'a> {
    fn new(mesh: &'a Mesh, adjacency: &MeshAdjacency) -> Self {
        let mut half_edges = Vec::new();
        for (_, face) in mesh.live_faces() {
            for (a, b) in face_edges(face) {
                if a != b && adjacency.faces_for_edge(a, b).len() == 1 {
                    half_edges.push((b, a));
                }
            }
        }

        let mut outgoing: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, &(from, _)) in half_edges.iter().enumerate() {
            outgoing.entry(from).or_default().push(i);
        }

        debug!("Boundary extraction: {} boundary edges", half_edges.len());

        Self {
            mesh,
            used: vec![false; half_edges.len()],
            half_edges,
            outgoing,
            next_start: 0,
            pending: VecDeque::new(),
        }
    }

    /// The mesh this sequence was built from.
    pub fn mesh(&self) -> &'a Mesh {
        self.mesh
    }

    /// Number of boundary edges found, used or not.
    pub fn boundary_edge_count(&self) -> usize {
        self.half_edges.len()
    }

    fn take_outgoing(&mut self, v: u32) -> Option<usize> {
        let candidates = self.outgoing.get(&v)?;
        let next = candidates.iter().copied().find(|&i| !self.used[i])?;
        self.used[next] = true;
        Some(next)
    }

    /// Walk one chain starting at half-edge `start`, queueing every loop and
    /// defect it produces.
    fn walk(&mut self, start: usize) {
        self.used[start] = true;
        let (origin, mut current) = self.half_edges[start];

        let mut chain = vec![origin];
        let mut position: HashMap<u32, usize> = HashMap::new();
        position.insert(origin, 0);

        loop {
            if current == origin {
                self.emit_loop(chain);
                return;
            }

            if let Some(&at) = position.get(&current) {
                // Pinched boundary: split off the sub-cycle through `current`.
                let cycle = chain.split_off(at);
                for v in &cycle {
                    position.remove(v);
                }
                self.emit_loop(cycle);
            }

            position.insert(current, chain.len());
            chain.push(current);

            match self.take_outgoing(current) {
                Some(next) => current = self.half_edges[next].1,
                None => {
                    warn!(
                        "Boundary walk from vertex {} could not be closed ({} vertices)",
                        origin,
                        chain.len()
                    );
                    self.pending
                        .push_back(Err(MeshError::NonManifoldBoundary { chain }));
                    return;
                }
            }
        }
    }

    fn emit_loop(&mut self, vertices: Vec<u32>) {
        if vertices.len() < 3 {
            // Two-edge loops come from edges traversed in both directions by
            // inconsistently wound faces.
            self.pending
                .push_back(Err(MeshError::NonManifoldBoundary { chain: vertices }));
        } else {
            self.pending.push_back(Ok(BoundaryLoop { vertices }));
        }
    }
}

impl Iterator for BoundaryLoops<'_> {
    type Item = MeshResult<BoundaryLoop>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            while self.next_start < self.half_edges.len() && self.used[self.next_start] {
                self.next_start += 1;
            }
            if self.next_start >= self.half_edges.len() {
                return None;
            }
            self.walk(self.next_start);
        }
    }
}

/// Find all boundary loops of a mesh, lazily.
///
/// # Example
///
/// ```
/// use mesh_fix::{Mesh, find_boundary_loops};
///
/// let mesh = Mesh::from_arrays(
///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
///     &[[0, 1, 2]],
/// )
/// .unwrap();
///
/// let loops: Vec<_> = find_boundary_loops(&mesh).collect::<Result<_, _>>().unwrap();
/// assert_eq!(loops.len(), 1);
/// assert_eq!(loops[0].vertices, vec![1, 0, 2]);
/// ```
pub fn find_boundary_loops(mesh: &Mesh) -> BoundaryLoops<'_> {
    let adjacency = MeshAdjacency::build(mesh);
    BoundaryLoops::new(mesh, &adjacency)
}

/// Like [`find_boundary_loops`], reusing an adjacency already built for the
/// current mesh state.
pub fn find_boundary_loops_with<'a>(
    mesh: &'a Mesh,
    adjacency: &MeshAdjacency,
) -> BoundaryLoops<'a> {
    BoundaryLoops::new(mesh, adjacency)
}

/// All loops and walk defects of a mesh, collected.
#[derive(Debug, Default)]
pub struct BoundaryScan {
    /// Closed loops in discovery order.
    pub loops: Vec<BoundaryLoop>,
    /// Walks that could not be closed.
    pub defects: Vec<MeshError>,
}

impl BoundaryScan {
    /// Number of closed loops.
    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Whether the mesh has neither loops nor defects.
    pub fn is_closed(&self) -> bool {
        self.loops.is_empty() && self.defects.is_empty()
    }
}

/// Collect every boundary loop and defect.
pub fn scan_boundaries(mesh: &Mesh) -> BoundaryScan {
    let mut scan = BoundaryScan::default();
    for item in find_boundary_loops(mesh) {
        match item {
            Ok(boundary) => scan.loops.push(boundary),
            Err(defect) => scan.defects.push(defect),
        }
    }
    scan
}

/// Number of closed boundary loops.
pub fn boundary_count(mesh: &Mesh) -> usize {
    find_boundary_loops(mesh).filter(Result::is_ok).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{CUBE_FACES, CUBE_VERTICES, open_cube, unit_cube};

    #[test]
    fn test_closed_mesh_has_no_loops() {
        let mesh = unit_cube();
        assert_eq!(find_boundary_loops(&mesh).count(), 0);
        assert!(scan_boundaries(&mesh).is_closed());
    }

    #[test]
    fn test_open_cube_single_loop() {
        let mesh = open_cube();
        let scan = scan_boundaries(&mesh);

        assert!(scan.defects.is_empty());
        assert_eq!(scan.loop_count(), 1);

        let boundary = &scan.loops[0];
        assert_eq!(boundary.edge_count(), 4);
        let mut sorted = boundary.vertices.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_loop_runs_opposite_to_faces() {
        let mesh = open_cube();
        let boundary = scan_boundaries(&mesh).loops.remove(0);
        let adjacency = MeshAdjacency::build(&mesh);

        for (a, b) in boundary.edges() {
            let faces = adjacency.faces_for_edge(a, b);
            assert_eq!(faces.len(), 1);
            let face = mesh.face(faces[0]).unwrap();
            // The face must traverse the edge as b -> a.
            assert!(face_edges(face).contains(&(b, a)));
        }
    }

    #[test]
    fn test_loops_outlive_shared_adjacency() {
        let mesh = open_cube();
        let loops = {
            let adjacency = MeshAdjacency::build(&mesh);
            find_boundary_loops_with(&mesh, &adjacency)
        };
        let loops: Vec<_> = loops.collect::<Result<_, _>>().unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].edge_count(), 4);
    }

    #[test]
    fn test_two_separate_holes() {
        // Remove the top and bottom quads.
        let faces: Vec<[i64; 3]> = CUBE_FACES
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 3)
            .map(|(_, f)| *f)
            .collect();
        let mesh = Mesh::from_arrays(&CUBE_VERTICES, &faces).unwrap();

        let scan = scan_boundaries(&mesh);
        assert_eq!(scan.loop_count(), 2);
        assert!(scan.loops.iter().all(|l| l.edge_count() == 4));
    }

    #[test]
    fn test_pinched_boundary_splits() {
        // Two triangles touching at vertex 0 only: a bow tie.
        let mesh = Mesh::from_arrays(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 0.0, 0.0],
                [-1.0, -1.0, 0.0],
            ],
            &[[0, 1, 2], [0, 3, 4]],
        )
        .unwrap();

        let scan = scan_boundaries(&mesh);
        assert!(scan.defects.is_empty());
        assert_eq!(scan.loop_count(), 2);
        for l in &scan.loops {
            assert_eq!(l.edge_count(), 3);
            assert!(l.contains(0));
        }
    }

    #[test]
    fn test_inconsistent_winding_reports_defect() {
        // Second triangle flipped: the shared edge appears twice in the same
        // direction, so it is not boundary but the chains can't close.
        let mesh = Mesh::from_arrays(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.5, 1.0, 0.0],
                [0.5, -1.0, 0.0],
            ],
            &[[0, 1, 2], [0, 1, 3]],
        )
        .unwrap();

        let items: Vec<_> = find_boundary_loops(&mesh).collect();
        assert!(!items.is_empty());
        assert!(items.iter().any(|item| {
            matches!(item, Err(e) if e.kind() == ErrorKind::NonManifoldBoundary)
        }));
    }

    #[test]
    fn test_deterministic_order() {
        let mesh = open_cube();
        let first: Vec<_> = find_boundary_loops(&mesh).filter_map(Result::ok).collect();
        let second: Vec<_> = find_boundary_loops(&mesh).filter_map(Result::ok).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_boundary_count_and_perimeter() {
        let mesh = open_cube();
        assert_eq!(boundary_count(&mesh), 1);
        let boundary = scan_boundaries(&mesh).loops.remove(0);
        assert!((boundary.perimeter(&mesh) - 4.0).abs() < 1e-12);
    }
}
