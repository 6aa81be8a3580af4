//! Fluent builder API for mesh repair.
//!
//! # Example
//!
//! ```no_run
//! use mesh_fix::{RepairBuilder, load_mesh};
//!
//! let mesh = load_mesh("scan.stl").unwrap();
//!
//! let repaired = RepairBuilder::new(mesh)
//!     .thorough()               // Large iteration budget
//!     .join_components(true)    // Bridge nearby shells first
//!     .max_hole_edges(200)      // Leave very large openings alone
//!     .build()
//!     .unwrap();
//!
//! println!("{}", repaired.report);
//! ```

use crate::Mesh;
use crate::error::MeshResult;
use crate::repair::{JoinStage, RepairParams, RepairReport, repair};

/// Result from [`RepairBuilder::build`]: the repaired mesh and what was done.
#[derive(Debug, Clone)]
pub struct RepairResult {
    /// The repaired mesh.
    pub mesh: Mesh,
    /// Everything the pipeline did.
    pub report: RepairReport,
}

impl RepairResult {
    /// Whether the repair reached a fixed point.
    pub fn is_clean(&self) -> bool {
        self.report.is_clean()
    }
}

/// Fluent, consuming builder over a mesh and its [`RepairParams`].
///
/// Setters adjust one parameter each; presets replace the whole parameter
/// set, so call them first.
///
/// # Example
///
/// ```
/// use mesh_fix::{Mesh, RepairBuilder};
///
/// let mesh = Mesh::from_arrays(
///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
///     &[[0, 1, 2]],
/// )
/// .unwrap();
///
/// let builder = RepairBuilder::new(mesh).fast().max_iters(2).refine(false);
/// assert_eq!(builder.params().max_iters, 2);
/// assert_eq!(builder.params().inner_loops, 1);
/// ```
#[derive(Debug, Clone)]
pub struct RepairBuilder {
    mesh: Mesh,
    params: RepairParams,
}

impl RepairBuilder {
    /// Create a builder with default parameters.
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            params: RepairParams::default(),
        }
    }

    // =========================================================================
    // Presets
    // =========================================================================

    /// Replace all parameters.
    pub fn with_params(mut self, params: RepairParams) -> Self {
        self.params = params;
        self
    }

    /// Use [`RepairParams::fast`].
    pub fn fast(self) -> Self {
        self.with_params(RepairParams::fast())
    }

    /// Use [`RepairParams::thorough`].
    pub fn thorough(self) -> Self {
        self.with_params(RepairParams::thorough())
    }

    // =========================================================================
    // Individual Parameters
    // =========================================================================

    /// Outer iterations of the clean loop.
    pub fn max_iters(mut self, max_iters: usize) -> Self {
        self.params.max_iters = max_iters;
        self
    }

    /// Inner passes per outer iteration.
    pub fn inner_loops(mut self, inner_loops: usize) -> Self {
        self.params.inner_loops = inner_loops;
        self
    }

    /// Bridge nearby components.
    pub fn join_components(mut self, join: bool) -> Self {
        self.params.join_components = join;
        self
    }

    /// Bridge nearby components at `stage` of the pipeline.
    pub fn join_stage(mut self, stage: JoinStage) -> Self {
        self.params.join_components = true;
        self.params.join_stage = stage;
        self
    }

    /// Only join components closer than `distance`.
    pub fn max_join_distance(mut self, distance: f64) -> Self {
        self.params.max_join_distance = Some(distance);
        self
    }

    /// Keep the `keep` largest components and delete the rest.
    pub fn keep_components(mut self, keep: usize) -> Self {
        self.params.remove_smallest_components = true;
        self.params.keep_components = keep;
        self
    }

    /// Keep every component.
    pub fn keep_all_components(mut self) -> Self {
        self.params.remove_smallest_components = false;
        self
    }

    /// Only fill loops with fewer edges than `max_edges`; `0` fills all.
    pub fn max_hole_edges(mut self, max_edges: usize) -> Self {
        self.params.fill_holes = true;
        self.params.max_hole_edges = max_edges;
        self
    }

    /// Leave every boundary loop open.
    pub fn skip_hole_filling(mut self) -> Self {
        self.params.fill_holes = false;
        self
    }

    /// Refine hole patches to the surrounding density.
    pub fn refine(mut self, refine: bool) -> Self {
        self.params.refine = refine;
        self
    }

    /// Orient faces consistently before repair.
    pub fn orient_faces(mut self, orient: bool) -> Self {
        self.params.orient_faces = orient;
        self
    }

    /// Cell capacity of the intersection search tree.
    pub fn cell_capacity(mut self, cell_capacity: usize) -> Self {
        self.params.cell_capacity = cell_capacity;
        self
    }

    /// Degeneracy tolerance relative to the bounding-box diagonal.
    pub fn tolerance(mut self, relative: f64) -> Self {
        self.params.tolerance = relative;
        self
    }

    /// Report stage progress at `info` level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.params.verbose = verbose;
        self
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run the repair pipeline and hand back the mesh with its report.
    ///
    /// # Errors
    ///
    /// Propagates [`repair`] errors, i.e. invalid parameters.
    pub fn build(mut self) -> MeshResult<RepairResult> {
        let report = repair(&mut self.mesh, &self.params)?;
        Ok(RepairResult {
            mesh: self.mesh,
            report,
        })
    }

    /// Get the mesh back without repairing it.
    pub fn into_mesh(self) -> Mesh {
        self.mesh
    }

    /// Get a reference to the mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Get the configured parameters.
    pub fn params(&self) -> &RepairParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{cube_at, facing_open_cubes, merge_parts, open_cube, unit_cube};

    #[test]
    fn test_builder_defaults() {
        let builder = RepairBuilder::new(unit_cube());
        assert_eq!(builder.params(), &RepairParams::default());
        assert_eq!(builder.mesh().face_count(), 12);
    }

    #[test]
    fn test_builder_chaining() {
        let builder = RepairBuilder::new(unit_cube())
            .thorough()
            .join_components(true)
            .max_join_distance(2.0)
            .keep_components(3)
            .max_hole_edges(40)
            .verbose(true);

        let params = builder.params();
        assert_eq!(params.max_iters, 30);
        assert!(params.join_components);
        assert_eq!(params.max_join_distance, Some(2.0));
        assert_eq!(params.keep_components, 3);
        assert_eq!(params.max_hole_edges, 40);
        assert!(params.verbose);
    }

    #[test]
    fn test_preset_replaces_earlier_settings() {
        let builder = RepairBuilder::new(unit_cube()).max_iters(99).fast();
        assert_eq!(builder.params(), &RepairParams::fast());
    }

    #[test]
    fn test_build_fills_hole() {
        let result = RepairBuilder::new(open_cube()).build().unwrap();
        assert!(result.is_clean());
        assert_eq!(result.report.holes_filled, 1);
        assert_eq!(result.report.boundary_loops_remaining, 0);
        assert_eq!(result.mesh.face_count(), result.report.final_faces);
    }

    #[test]
    fn test_build_skip_hole_filling() {
        let result = RepairBuilder::new(open_cube())
            .skip_hole_filling()
            .build()
            .unwrap();
        assert_eq!(result.report.holes_filled, 0);
        assert_eq!(result.report.boundary_loops_remaining, 1);
    }

    #[test]
    fn test_build_keep_all_components() {
        let mesh = merge_parts(&[cube_at([0.0; 3], 1.0), cube_at([5.0, 0.0, 0.0], 0.5)]);
        let result = RepairBuilder::new(mesh).keep_all_components().build().unwrap();
        assert_eq!(result.report.components_removed, 0);
        assert_eq!(result.mesh.face_count(), 24);
    }

    #[test]
    fn test_build_join_after_clean() {
        let result = RepairBuilder::new(facing_open_cubes())
            .keep_all_components()
            .join_stage(JoinStage::AfterClean)
            .build()
            .unwrap();
        assert!(result.is_clean());
        assert_eq!(result.report.join.joins, 1);
        assert_eq!(result.report.holes_filled, 0);
        assert!(result.report.second_clean.is_some());
        assert!(result.report.is_watertight());
    }

    #[test]
    fn test_build_invalid_params() {
        let err = RepairBuilder::new(unit_cube())
            .max_iters(0)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_into_mesh() {
        let recovered = RepairBuilder::new(open_cube()).into_mesh();
        assert_eq!(recovered.face_count(), 10);
    }
}
