//! Non-mutating mesh diagnostics.

use std::fmt;

use tracing::{debug, warn};

use crate::Mesh;
use crate::adjacency::MeshAdjacency;
use crate::boundary::find_boundary_loops_with;
use crate::components::find_connected_components;
use crate::degeneracy::{Tolerance, find_degeneracies};
use crate::intersect::{DEFAULT_CELL_CAPACITY, IntersectionDetector};
use crate::tracing_ext::OperationTimer;

/// What [`diagnose`] should collect beyond counts.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsOptions {
    /// Include the vertex list of every boundary loop.
    pub list_loops: bool,
    /// Include the intersecting face slots.
    pub list_intersections: bool,
    /// Cell capacity of the intersection search tree.
    pub cell_capacity: usize,
    /// Degeneracy tolerance relative to the bounding-box diagonal.
    pub tolerance: f64,
}

impl Default for DiagnosticsOptions {
    fn default() -> Self {
        Self {
            list_loops: false,
            list_intersections: false,
            cell_capacity: DEFAULT_CELL_CAPACITY,
            tolerance: Tolerance::DEFAULT_RELATIVE,
        }
    }
}

impl DiagnosticsOptions {
    /// Collect every list.
    pub fn detailed() -> Self {
        Self {
            list_loops: true,
            list_intersections: true,
            ..Default::default()
        }
    }
}

/// Health report for a mesh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshReport {
    /// Live vertex count.
    pub vertex_count: usize,
    /// Live face count.
    pub face_count: usize,

    /// Closed boundary loops.
    pub boundary_loop_count: usize,
    /// Edge count of each loop, in discovery order.
    pub boundary_loop_sizes: Vec<usize>,
    /// Vertex lists of the loops, when requested.
    pub boundary_loops: Option<Vec<Vec<u32>>>,
    /// Boundary walks that could not be closed.
    pub boundary_defect_count: usize,

    /// Edges with one adjacent face.
    pub boundary_edge_count: usize,
    /// Edges with more than two adjacent faces.
    pub non_manifold_edge_count: usize,

    /// Faces involved in at least one self-intersection.
    pub intersecting_face_count: usize,
    /// Intersecting face slots, when requested.
    pub intersecting_faces: Option<Vec<u32>>,

    /// Connected components.
    pub component_count: usize,
    /// Face count of each component, largest first.
    pub component_sizes: Vec<usize>,

    /// Faces with a repeated index, a vanishing edge or a vanishing altitude.
    pub degenerate_face_count: usize,
    /// Later copies of an earlier face.
    pub duplicate_face_count: usize,

    /// Bounding box as `(min, max)`.
    pub bounds: Option<([f64; 3], [f64; 3])>,
    /// Total surface area.
    pub surface_area: f64,
    /// Signed volume; only meaningful for closed meshes.
    pub signed_volume: f64,
}

impl MeshReport {
    /// Whether the mesh has no boundary at all.
    pub fn is_watertight(&self) -> bool {
        self.boundary_edge_count == 0
    }

    /// Whether no edge has more than two faces.
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0 && self.boundary_defect_count == 0
    }

    /// Whether a repair would find nothing to do.
    pub fn is_clean(&self) -> bool {
        self.is_watertight()
            && self.is_manifold()
            && self.intersecting_face_count == 0
            && self.degenerate_face_count == 0
            && self.duplicate_face_count == 0
    }
}

impl fmt::Display for MeshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Report:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Faces: {}", self.face_count)?;

        if let Some((min, max)) = &self.bounds {
            writeln!(
                f,
                "  Bounds: [{:.3}, {:.3}, {:.3}] to [{:.3}, {:.3}, {:.3}]",
                min[0], min[1], min[2], max[0], max[1], max[2]
            )?;
        }
        writeln!(f, "  Surface Area: {:.4}", self.surface_area)?;
        writeln!(f, "  Signed Volume: {:.4}", self.signed_volume)?;

        writeln!(
            f,
            "  Components: {} {:?}",
            self.component_count, self.component_sizes
        )?;
        writeln!(
            f,
            "  Boundary loops: {} {:?}",
            self.boundary_loop_count, self.boundary_loop_sizes
        )?;
        if let Some(loops) = &self.boundary_loops {
            for (i, vertices) in loops.iter().enumerate() {
                writeln!(f, "    loop {}: {:?}", i, vertices)?;
            }
        }
        writeln!(
            f,
            "  Watertight: {} (boundary edges: {})",
            if self.is_watertight() { "yes" } else { "NO" },
            self.boundary_edge_count
        )?;
        writeln!(
            f,
            "  Manifold: {} (non-manifold edges: {}, open boundary chains: {})",
            if self.is_manifold() { "yes" } else { "NO" },
            self.non_manifold_edge_count,
            self.boundary_defect_count
        )?;
        writeln!(
            f,
            "  Self-intersecting faces: {}",
            self.intersecting_face_count
        )?;
        if let Some(faces) = &self.intersecting_faces
            && !faces.is_empty()
        {
            writeln!(f, "    {:?}", faces)?;
        }
        writeln!(
            f,
            "  Degenerate faces: {}, duplicate faces: {}",
            self.degenerate_face_count, self.duplicate_face_count
        )?;
        write!(
            f,
            "  Clean: {}",
            if self.is_clean() { "yes" } else { "NO" }
        )
    }
}

/// Assess a mesh without modifying it.
///
/// # Example
///
/// ```
/// use mesh_fix::{DiagnosticsOptions, Mesh, diagnose};
///
/// let mesh = Mesh::from_arrays(
///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
///     &[[0, 1, 2]],
/// )
/// .unwrap();
///
/// let report = diagnose(&mesh, &DiagnosticsOptions::detailed());
/// assert_eq!(report.boundary_loop_count, 1);
/// assert_eq!(report.boundary_loops, Some(vec![vec![1, 0, 2]]));
/// assert!(!report.is_watertight());
/// ```
pub fn diagnose(mesh: &Mesh, options: &DiagnosticsOptions) -> MeshReport {
    let _timer = OperationTimer::with_context("diagnose", mesh);
    let adjacency = MeshAdjacency::build(mesh);

    let mut loops = Vec::new();
    let mut boundary_defect_count = 0;
    for item in find_boundary_loops_with(mesh, &adjacency) {
        match item {
            Ok(boundary) => loops.push(boundary.vertices),
            Err(_) => boundary_defect_count += 1,
        }
    }

    let intersections = IntersectionDetector::new(options.cell_capacity.max(1)).find(mesh);
    let components = find_connected_components(mesh);
    let degeneracies = find_degeneracies(mesh, Tolerance::for_mesh(mesh, options.tolerance));

    let report = MeshReport {
        vertex_count: mesh.vertex_count(),
        face_count: mesh.face_count(),
        boundary_loop_count: loops.len(),
        boundary_loop_sizes: loops.iter().map(Vec::len).collect(),
        boundary_loops: options.list_loops.then_some(loops),
        boundary_defect_count,
        boundary_edge_count: adjacency.boundary_edge_count(),
        non_manifold_edge_count: adjacency.non_manifold_edge_count(),
        intersecting_face_count: intersections.count(),
        intersecting_faces: options.list_intersections.then_some(intersections.faces),
        component_count: components.component_count,
        component_sizes: components.sizes(),
        degenerate_face_count: degeneracies.total() - degeneracies.duplicates.len(),
        duplicate_face_count: degeneracies.duplicates.len(),
        bounds: mesh
            .bounds()
            .map(|(min, max)| ([min.x, min.y, min.z], [max.x, max.y, max.z])),
        surface_area: mesh.surface_area(),
        signed_volume: mesh.signed_volume(),
    };

    if report.non_manifold_edge_count > 0 || report.boundary_defect_count > 0 {
        warn!(
            "Mesh is not manifold: {} non-manifold edges, {} open boundary chains",
            report.non_manifold_edge_count, report.boundary_defect_count
        );
    }
    debug!("{}", report);

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        CUBE_FACES, CUBE_VERTICES, cube_at, merge_parts, open_cube, sphere_arrays, unit_cube,
    };
    use approx::assert_relative_eq;

    #[test]
    fn test_diagnose_closed_cube() {
        let report = diagnose(&unit_cube(), &DiagnosticsOptions::default());
        assert_eq!(report.vertex_count, 8);
        assert_eq!(report.face_count, 12);
        assert_eq!(report.boundary_loop_count, 0);
        assert_eq!(report.component_sizes, vec![12]);
        assert!(report.is_watertight());
        assert!(report.is_manifold());
        assert!(report.is_clean());
        assert!(report.boundary_loops.is_none());
        assert!(report.intersecting_faces.is_none());
        assert_relative_eq!(report.signed_volume, 1.0, epsilon = 1e-12);
        assert_relative_eq!(report.surface_area, 6.0, epsilon = 1e-12);
        assert_eq!(report.bounds, Some(([0.0; 3], [1.0; 3])));
    }

    #[test]
    fn test_diagnose_open_cube() {
        let report = diagnose(&open_cube(), &DiagnosticsOptions::detailed());
        assert_eq!(report.boundary_loop_count, 1);
        assert_eq!(report.boundary_loop_sizes, vec![4]);
        assert_eq!(report.boundary_edge_count, 4);
        let loops = report.boundary_loops.as_ref().unwrap();
        assert_eq!(loops.len(), 1);
        let mut rim = loops[0].clone();
        rim.sort_unstable();
        assert_eq!(rim, vec![4, 5, 6, 7]);
        assert!(!report.is_watertight());
        assert!(report.is_manifold());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_diagnose_intersections() {
        let mesh = merge_parts(&[
            sphere_arrays(2, 1.0, [0.0; 3]),
            sphere_arrays(2, 1.0, [1.0, 0.0, 0.0]),
        ]);
        let report = diagnose(&mesh, &DiagnosticsOptions::detailed());
        assert!(report.intersecting_face_count > 0);
        let faces = report.intersecting_faces.as_ref().unwrap();
        assert_eq!(faces.len(), report.intersecting_face_count);
        assert!(faces.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(report.component_count, 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_diagnose_components_sorted() {
        let mut small = cube_at([4.0, 0.0, 0.0], 1.0);
        small.1.truncate(2);
        let mesh = merge_parts(&[small, cube_at([0.0; 3], 1.0)]);
        let report = diagnose(&mesh, &DiagnosticsOptions::default());
        assert_eq!(report.component_count, 2);
        assert_eq!(report.component_sizes, vec![12, 2]);
    }

    #[test]
    fn test_diagnose_degenerate_and_duplicate() {
        let mut faces = CUBE_FACES.to_vec();
        faces.push(CUBE_FACES[4]);
        faces.push([0, 0, 1]);
        let mesh = Mesh::from_arrays(&CUBE_VERTICES, &faces).unwrap();
        let report = diagnose(&mesh, &DiagnosticsOptions::default());
        assert_eq!(report.duplicate_face_count, 1);
        assert_eq!(report.degenerate_face_count, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_diagnose_does_not_mutate() {
        let mesh = open_cube();
        let generation = mesh.generation();
        diagnose(&mesh, &DiagnosticsOptions::detailed());
        assert_eq!(mesh.generation(), generation);
        assert_eq!(mesh.face_count(), 10);
    }

    #[test]
    fn test_diagnose_empty() {
        let report = diagnose(&Mesh::new(), &DiagnosticsOptions::default());
        assert_eq!(report.face_count, 0);
        assert_eq!(report.component_count, 0);
        assert!(report.bounds.is_none());
    }

    #[test]
    fn test_report_display() {
        let report = diagnose(&open_cube(), &DiagnosticsOptions::detailed());
        let text = report.to_string();
        assert!(text.contains("Mesh Report:"));
        assert!(text.contains("Boundary loops: 1 [4]"));
        assert!(text.contains("loop 0:"));
        assert!(text.contains("Watertight: NO"));
        assert!(text.contains("Clean: NO"));
    }
}
