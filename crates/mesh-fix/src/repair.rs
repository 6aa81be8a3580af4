//! The repair pipeline: orientation, component pruning and joining, hole
//! filling and the clean loop, driven by one [`RepairParams`].

use std::fmt;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::Mesh;
use crate::boundary::{boundary_count, scan_boundaries};
use crate::clean::{CleanOutcome, CleanReport, Cleaner, ResidualDefects};
use crate::components::{JoinReport, join_closest_components, remove_smallest_components};
use crate::error::{MeshError, MeshResult};
use crate::holes::{FillSummary, fill_boundaries_under};
use crate::intersect::DEFAULT_CELL_CAPACITY;
use crate::tracing_ext::{OperationTimer, log_mesh_stats, log_repair_report, progress};
use crate::winding::{OrientReport, orient_faces};

/// When [`repair`] bridges nearby components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum JoinStage {
    /// Join right after pruning, then fill and clean.
    #[default]
    BeforeClean,
    /// Clean first, then join and fill whatever the clean left open, and
    /// clean again.
    AfterClean,
}

/// Configuration for [`repair`].
///
/// # Example
///
/// ```
/// use mesh_fix::RepairParams;
///
/// // Use defaults
/// let params = RepairParams::default();
/// assert_eq!(params.max_iters, 10);
///
/// // Or customize
/// let params = RepairParams {
///     join_components: true,
///     max_hole_edges: 100,
///     ..Default::default()
/// };
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct RepairParams {
    /// Outer iterations of the clean loop.
    ///
    /// Default: `10`
    pub max_iters: usize,

    /// Inner passes per outer iteration.
    ///
    /// Default: `3`
    pub inner_loops: usize,

    /// Bridge nearby components with connecting triangles.
    ///
    /// Default: `false`
    pub join_components: bool,

    /// Whether joining runs before or after the main clean loop.
    ///
    /// Default: [`JoinStage::BeforeClean`]
    pub join_stage: JoinStage,

    /// Delete all but the `keep_components` largest components.
    ///
    /// Default: `true`
    pub remove_smallest_components: bool,

    /// Components kept by `remove_smallest_components`.
    ///
    /// Default: `1`
    pub keep_components: usize,

    /// Fill boundary loops before and after cleaning.
    ///
    /// Default: `true`
    pub fill_holes: bool,

    /// Only fill loops with fewer edges than this; `0` fills every loop.
    ///
    /// Default: `0`
    pub max_hole_edges: usize,

    /// Insert interior vertices so patches match the surrounding density.
    ///
    /// Default: `true`
    pub refine: bool,

    /// Make face winding consistent and outward before anything else.
    ///
    /// Default: `true`
    pub orient_faces: bool,

    /// Cell capacity of the intersection search tree.
    ///
    /// Default: `50`
    pub cell_capacity: usize,

    /// Degeneracy tolerance, relative to the bounding-box diagonal.
    ///
    /// Default: `1e-9`
    pub tolerance: f64,

    /// Components farther apart than this are not joined. `None` joins at
    /// any distance.
    ///
    /// Default: `None`
    pub max_join_distance: Option<f64>,

    /// Report stage progress at `info` instead of `debug`.
    ///
    /// Default: `false`
    pub verbose: bool,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            max_iters: 10,
            inner_loops: 3,
            join_components: false,
            join_stage: JoinStage::BeforeClean,
            remove_smallest_components: true,
            keep_components: 1,
            fill_holes: true,
            max_hole_edges: 0,
            refine: true,
            orient_faces: true,
            cell_capacity: DEFAULT_CELL_CAPACITY,
            tolerance: 1e-9,
            max_join_distance: None,
            verbose: false,
        }
    }
}

impl RepairParams {
    /// Short budget and unrefined patches, for quick previews.
    pub fn fast() -> Self {
        Self {
            max_iters: 3,
            inner_loops: 1,
            refine: false,
            ..Default::default()
        }
    }

    /// Large budget for meshes with many interacting defects.
    pub fn thorough() -> Self {
        Self {
            max_iters: 30,
            inner_loops: 5,
            ..Default::default()
        }
    }

    /// Check every field for a usable value.
    ///
    /// # Errors
    ///
    /// [`MeshError::InvalidParameter`] naming the first offending field.
    pub fn validate(&self) -> MeshResult<()> {
        if self.max_iters == 0 {
            return Err(MeshError::invalid_parameter("max_iters", "must be at least 1"));
        }
        if self.inner_loops == 0 {
            return Err(MeshError::invalid_parameter("inner_loops", "must be at least 1"));
        }
        if self.remove_smallest_components && self.keep_components == 0 {
            return Err(MeshError::invalid_parameter(
                "keep_components",
                "must be at least 1 when removing components",
            ));
        }
        if self.cell_capacity == 0 {
            return Err(MeshError::invalid_parameter("cell_capacity", "must be at least 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(MeshError::invalid_parameter(
                "tolerance",
                format!("must be finite and non-negative, got {}", self.tolerance),
            ));
        }
        if let Some(distance) = self.max_join_distance
            && !(distance.is_finite() && distance >= 0.0)
        {
            return Err(MeshError::invalid_parameter(
                "max_join_distance",
                format!("must be finite and non-negative, got {}", distance),
            ));
        }
        Ok(())
    }
}

/// Everything [`repair`] did.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct RepairReport {
    /// Live vertices before repair.
    pub initial_vertices: usize,
    /// Live faces before repair.
    pub initial_faces: usize,
    /// Vertices after repair.
    pub final_vertices: usize,
    /// Faces after repair.
    pub final_faces: usize,
    /// Winding correction.
    pub orientation: OrientReport,
    /// Components deleted by pruning.
    pub components_removed: usize,
    /// Component joining.
    pub join: JoinReport,
    /// Boundary loops filled over all fill rounds.
    pub holes_filled: usize,
    /// Loops left open because of `max_hole_edges`.
    pub holes_skipped: usize,
    /// Loops that could not be triangulated, over all fill rounds.
    pub holes_failed: usize,
    /// Faces added by hole filling.
    pub fill_triangles_added: usize,
    /// Vertices added by hole filling.
    pub fill_vertices_added: usize,
    /// Boundary walks that could not be closed, in the last fill round.
    pub boundary_defects: usize,
    /// The main clean run.
    pub clean: CleanReport,
    /// The last clean run after the main one, when another was needed.
    pub second_clean: Option<CleanReport>,
    /// Boundary loops left on the final mesh.
    pub boundary_loops_remaining: usize,
    /// Loops under the fill limit that are still open. Any makes the
    /// outcome [`CleanOutcome::Exhausted`].
    pub unfilled_loops: usize,
}

impl RepairReport {
    fn new(mesh: &Mesh) -> Self {
        Self {
            initial_vertices: mesh.vertex_count(),
            initial_faces: mesh.face_count(),
            final_vertices: mesh.vertex_count(),
            final_faces: mesh.face_count(),
            orientation: OrientReport::default(),
            components_removed: 0,
            join: JoinReport::default(),
            holes_filled: 0,
            holes_skipped: 0,
            holes_failed: 0,
            fill_triangles_added: 0,
            fill_vertices_added: 0,
            boundary_defects: 0,
            clean: CleanReport::new(),
            second_clean: None,
            boundary_loops_remaining: 0,
            unfilled_loops: 0,
        }
    }

    /// Outcome of the last clean run, with loops that should have been
    /// filled counted as residual defects.
    pub fn outcome(&self) -> CleanOutcome {
        let last = self.second_clean.as_ref().unwrap_or(&self.clean);
        match last.outcome {
            CleanOutcome::Clean { .. } if self.unfilled_loops > 0 => CleanOutcome::Exhausted {
                iterations: last.outer_iterations,
                residual: ResidualDefects {
                    open_loops: self.unfilled_loops,
                    ..ResidualDefects::default()
                },
            },
            CleanOutcome::Exhausted {
                iterations,
                mut residual,
            } => {
                residual.open_loops = self.unfilled_loops;
                CleanOutcome::Exhausted {
                    iterations,
                    residual,
                }
            }
            clean => clean,
        }
    }

    /// Whether the last clean run reached a fixed point and every loop under
    /// the fill limit was closed.
    pub fn is_clean(&self) -> bool {
        self.outcome().is_clean()
    }

    /// Residual defects of the last clean run.
    pub fn residual_defects(&self) -> usize {
        self.outcome().residual_defects()
    }

    /// Whether the result is a closed surface that reached a fixed point.
    pub fn is_watertight(&self) -> bool {
        self.is_clean() && self.boundary_loops_remaining == 0
    }

    fn absorb_fill(&mut self, summary: &FillSummary) {
        self.holes_filled += summary.filled;
        self.holes_skipped = summary.skipped;
        self.holes_failed += summary.failed.len();
        self.fill_triangles_added += summary.triangles_added;
        self.fill_vertices_added += summary.vertices_added;
        self.boundary_defects = summary.defects.len();
    }
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Repair Report")?;
        writeln!(
            f,
            "  Vertices: {} -> {}",
            self.initial_vertices, self.final_vertices
        )?;
        writeln!(f, "  Faces: {} -> {}", self.initial_faces, self.final_faces)?;
        if self.orientation.flipped > 0 || self.orientation.inverted_components > 0 {
            writeln!(
                f,
                "  Winding: {} face(s) flipped, {} component(s) inverted",
                self.orientation.flipped, self.orientation.inverted_components
            )?;
        }
        if self.components_removed > 0 {
            writeln!(f, "  Components removed: {}", self.components_removed)?;
        }
        if self.join.joins > 0 {
            writeln!(
                f,
                "  Components joined: {} ({} -> {})",
                self.join.joins, self.join.components_before, self.join.components_after
            )?;
        }
        writeln!(
            f,
            "  Holes: {} filled, {} skipped, {} failed ({} triangles, {} vertices added)",
            self.holes_filled,
            self.holes_skipped,
            self.holes_failed,
            self.fill_triangles_added,
            self.fill_vertices_added
        )?;
        writeln!(f, "  {}", self.clean.outcome)?;
        if let Some(second) = &self.second_clean {
            writeln!(f, "  Second pass: {}", second.outcome)?;
        }
        write!(
            f,
            "  Result: {}, {} boundary loop(s) remaining",
            if self.is_clean() { "CLEAN" } else { "EXHAUSTED" },
            self.boundary_loops_remaining
        )
    }
}

/// Run the full repair pipeline.
///
/// # Repair Steps
///
/// 1. Orient faces consistently (optional)
/// 2. Remove small components (optional)
/// 3. Join nearby components, with [`JoinStage::BeforeClean`] (optional)
/// 4. Fill boundary loops (optional)
/// 5. Clean until a fixed point or the budget runs out
/// 6. Join nearby components, with [`JoinStage::AfterClean`] (optional)
/// 7. While fillable loops remain, fill and clean again, at most
///    `max_iters` rounds
///
/// Loops under `max_hole_edges` that are still open at the end make the
/// outcome [`CleanOutcome::Exhausted`].
///
/// An exhausted clean loop is not an error: check
/// [`RepairReport::is_clean`] or convert with
/// [`CleanOutcome::into_result`].
///
/// # Example
///
/// ```
/// use mesh_fix::{Mesh, RepairParams, repair};
///
/// // A unit cube with its top missing.
/// let mut mesh = Mesh::from_arrays(
///     &[
///         [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
///         [0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0],
///     ],
///     &[
///         [0, 2, 1], [0, 3, 2], [0, 1, 5], [0, 5, 4], [3, 7, 6],
///         [3, 6, 2], [0, 4, 7], [0, 7, 3], [1, 2, 6], [1, 6, 5],
///     ],
/// )
/// .unwrap();
///
/// let report = repair(&mut mesh, &RepairParams::default()).unwrap();
/// assert!(report.is_watertight());
/// assert_eq!(report.holes_filled, 1);
/// ```
///
/// # Errors
///
/// [`MeshError::InvalidParameter`] when `params` fails
/// [`RepairParams::validate`].
pub fn repair(mesh: &mut Mesh, params: &RepairParams) -> MeshResult<RepairReport> {
    params.validate()?;
    let _timer = OperationTimer::with_context("repair", mesh);
    log_mesh_stats(mesh, "before repair");

    let mut report = RepairReport::new(mesh);
    if mesh.face_count() == 0 {
        warn!("Mesh has no faces, skipping repair");
        return Ok(report);
    }

    if params.orient_faces {
        report.orientation = orient_faces(mesh);
        progress!(
            params.verbose,
            "Orientation: {} face(s) flipped",
            report.orientation.flipped
        );
    }

    if params.remove_smallest_components {
        report.components_removed = remove_smallest_components(mesh, params.keep_components)?;
        progress!(
            params.verbose,
            "Component pruning: {} removed",
            report.components_removed
        );
    }

    let join_after = params.join_components && params.join_stage == JoinStage::AfterClean;
    if params.join_components && !join_after {
        run_join(mesh, params, &mut report);
    }

    if params.fill_holes && !join_after {
        let summary = fill_boundaries_under(mesh, params.max_hole_edges, params.refine);
        report.absorb_fill(&summary);
        progress!(
            params.verbose,
            "Hole filling: {} filled, {} skipped",
            summary.filled,
            summary.skipped
        );
    }

    report.clean = run_clean(mesh, params)?;

    if join_after {
        run_join(mesh, params, &mut report);
        if report.join.joins > 0 {
            report.second_clean = Some(run_clean(mesh, params)?);
        }
    }

    if params.fill_holes {
        for round in 1..=params.max_iters {
            if open_loops(mesh, params.max_hole_edges).0 == 0 {
                break;
            }
            let summary = fill_boundaries_under(mesh, params.max_hole_edges, params.refine);
            report.absorb_fill(&summary);
            if summary.filled == 0 {
                break;
            }
            progress!(
                params.verbose,
                "Fill round {}: {} hole(s), cleaning again",
                round,
                summary.filled
            );
            report.second_clean = Some(run_clean(mesh, params)?);
        }
        (report.unfilled_loops, report.holes_skipped) = open_loops(mesh, params.max_hole_edges);
        if report.unfilled_loops > 0 {
            warn!(
                "{} boundary loop(s) under the fill limit are still open",
                report.unfilled_loops
            );
        }
    }

    report.final_vertices = mesh.vertex_count();
    report.final_faces = mesh.face_count();
    report.boundary_loops_remaining = boundary_count(mesh);

    log_mesh_stats(mesh, "after repair");
    log_repair_report(&report);
    Ok(report)
}

fn run_join(mesh: &mut Mesh, params: &RepairParams, report: &mut RepairReport) {
    report.join = join_closest_components(mesh, params.max_join_distance);
    progress!(
        params.verbose,
        "Component joining: {} bridge(s)",
        report.join.joins
    );
}

/// Open loops as `(fillable, over the edge limit)`.
fn open_loops(mesh: &Mesh, max_edges: usize) -> (usize, usize) {
    let loops = scan_boundaries(mesh).loops;
    let fillable = loops
        .iter()
        .filter(|boundary| max_edges == 0 || boundary.edge_count() < max_edges)
        .count();
    (fillable, loops.len() - fillable)
}

fn run_clean(mesh: &mut Mesh, params: &RepairParams) -> MeshResult<CleanReport> {
    Cleaner::new(mesh)
        .with_cell_capacity(params.cell_capacity)
        .with_tolerance(params.tolerance)
        .verbose(params.verbose)
        .run(params.max_iters, params.inner_loops)
}

/// Repair independent meshes in parallel, one session per mesh.
///
/// Results are in input order.
pub fn repair_batch(meshes: &mut [Mesh], params: &RepairParams) -> Vec<MeshResult<RepairReport>> {
    info!("Repairing {} meshes in parallel", meshes.len());
    meshes
        .par_iter_mut()
        .map(|mesh| repair(mesh, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::MeshAdjacency;
    use approx::assert_relative_eq;
    use crate::error::ErrorKind;
    use crate::components::compute_components;
    use crate::intersect::find_intersecting_triangles;
    use crate::test_support::{
        cube_at, facing_open_cubes, merge_parts, open_cube, sphere, sphere_arrays, unit_cube,
    };

    #[test]
    fn test_default_params() {
        let params = RepairParams::default();
        assert_eq!(params.max_iters, 10);
        assert_eq!(params.inner_loops, 3);
        assert!(!params.join_components);
        assert!(params.remove_smallest_components);
        assert_eq!(params.keep_components, 1);
        assert_eq!(params.max_hole_edges, 0);
        assert_eq!(params.cell_capacity, 50);
        assert!(params.validate().is_ok());
        assert!(RepairParams::fast().validate().is_ok());
        assert!(RepairParams::thorough().validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        let bad = [
            RepairParams {
                max_iters: 0,
                ..Default::default()
            },
            RepairParams {
                inner_loops: 0,
                ..Default::default()
            },
            RepairParams {
                keep_components: 0,
                ..Default::default()
            },
            RepairParams {
                tolerance: f64::NAN,
                ..Default::default()
            },
            RepairParams {
                max_join_distance: Some(-1.0),
                ..Default::default()
            },
        ];
        for params in bad {
            let mut mesh = unit_cube();
            let err = repair(&mut mesh, &params).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }

        // keep_components is irrelevant when not pruning.
        let params = RepairParams {
            keep_components: 0,
            remove_smallest_components: false,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_repair_open_cube() {
        let mut mesh = open_cube();
        let report = repair(&mut mesh, &RepairParams::default()).unwrap();

        assert!(report.is_clean());
        assert!(report.is_watertight());
        assert_eq!(report.holes_filled, 1);
        assert_eq!(report.initial_faces, 10);
        assert_eq!(report.final_faces, mesh.face_count());
        assert!(MeshAdjacency::build(&mesh).is_closed_manifold());
    }

    #[test]
    fn test_repair_clean_mesh_is_idempotent() {
        let mut mesh = sphere(2);
        let generation = mesh.generation();
        let report = repair(&mut mesh, &RepairParams::default()).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.final_faces, report.initial_faces);
        assert_eq!(report.final_vertices, report.initial_vertices);
        assert_eq!(report.holes_filled, 0);
        assert!(report.second_clean.is_none());
        assert!(!report.clean.changed_mesh());
        assert_eq!(mesh.generation(), generation);
    }

    #[test]
    fn test_repair_removes_fragments() {
        let mut mesh = merge_parts(&[
            cube_at([0.0; 3], 1.0),
            (
                vec![[4.0, 0.0, 0.0], [5.0, 0.0, 0.0], [4.0, 1.0, 0.0]],
                vec![[0, 1, 2]],
            ),
        ]);
        let report = repair(&mut mesh, &RepairParams::default()).unwrap();
        assert_eq!(report.components_removed, 1);
        assert_eq!(mesh.face_count(), 12);
        assert!(report.is_watertight());
    }

    #[test]
    fn test_repair_keep_all_components() {
        let mut mesh = merge_parts(&[cube_at([0.0; 3], 1.0), cube_at([3.0, 0.0, 0.0], 1.0)]);
        let params = RepairParams {
            remove_smallest_components: false,
            ..Default::default()
        };
        let report = repair(&mut mesh, &params).unwrap();
        assert_eq!(report.components_removed, 0);
        assert_eq!(mesh.face_count(), 24);
    }

    #[test]
    fn test_repair_respects_hole_limit() {
        let mut mesh = open_cube();
        let params = RepairParams {
            max_hole_edges: 3,
            ..Default::default()
        };
        let report = repair(&mut mesh, &params).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.holes_filled, 0);
        assert_eq!(report.holes_skipped, 1);
        assert_eq!(report.boundary_loops_remaining, 1);
        assert!(!report.is_watertight());
    }

    #[test]
    fn test_repair_empty_mesh() {
        let mut mesh = Mesh::new();
        let report = repair(&mut mesh, &RepairParams::default()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.final_faces, 0);
    }

    fn overlapping_spheres(subdivisions: usize) -> Mesh {
        merge_parts(&[
            sphere_arrays(subdivisions, 1.0, [0.0; 3]),
            sphere_arrays(subdivisions, 1.0, [1.0, 0.2, 0.1]),
        ])
    }

    fn assert_clean_means_closed(report: &RepairReport, mesh: &Mesh) {
        if report.is_clean() {
            assert_eq!(report.boundary_loops_remaining, 0, "{}", report);
            assert_eq!(boundary_count(mesh), 0);
            assert!(MeshAdjacency::build(mesh).is_closed_manifold());
            assert!(find_intersecting_triangles(mesh, 50).is_clean());
        }
    }

    #[test]
    fn test_repair_intersecting_spheres() {
        let mut mesh = overlapping_spheres(3);
        let params = RepairParams {
            remove_smallest_components: false,
            ..RepairParams::default()
        };
        let report = repair(&mut mesh, &params).unwrap();
        assert!(report.is_clean(), "{}", report);
        assert!(report.is_watertight());
        assert_eq!(report.unfilled_loops, 0);
        assert_clean_means_closed(&report, &mesh);
    }

    #[test]
    fn test_clean_repair_is_always_closed() {
        for (subdivisions, params) in [
            (2, RepairParams::fast()),
            (2, RepairParams::thorough()),
            (3, RepairParams::fast()),
        ] {
            let mut mesh = overlapping_spheres(subdivisions);
            let params = RepairParams {
                remove_smallest_components: false,
                ..params
            };
            let report = repair(&mut mesh, &params).unwrap();
            assert_clean_means_closed(&report, &mesh);
            if !report.is_clean() {
                assert!(report.residual_defects() > 0);
            }
        }
    }

    #[test]
    fn test_open_loops_make_outcome_exhausted() {
        let mesh = unit_cube();
        let mut report = RepairReport::new(&mesh);
        assert!(report.is_clean());

        report.unfilled_loops = 2;
        assert!(!report.is_clean());
        assert!(!report.is_watertight());
        assert_eq!(report.residual_defects(), 2);
        assert!(matches!(
            report.outcome(),
            CleanOutcome::Exhausted {
                residual: ResidualDefects { open_loops: 2, .. },
                ..
            }
        ));
        assert!(report.to_string().contains("Result: EXHAUSTED"));
    }

    #[test]
    fn test_repair_join_before_clean() {
        let mut mesh = facing_open_cubes();
        let params = RepairParams {
            remove_smallest_components: false,
            join_components: true,
            ..Default::default()
        };
        let report = repair(&mut mesh, &params).unwrap();
        assert_eq!(report.join.joins, 1);
        assert_eq!(report.holes_filled, 0);
        assert!(report.second_clean.is_none());
        assert!(report.is_watertight());
        assert_relative_eq!(mesh.signed_volume(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_repair_join_after_clean() {
        let mut mesh = facing_open_cubes();
        let params = RepairParams {
            remove_smallest_components: false,
            join_components: true,
            join_stage: JoinStage::AfterClean,
            ..Default::default()
        };
        let report = repair(&mut mesh, &params).unwrap();
        // The first clean saw two open shells; joining came after it.
        assert_eq!(report.clean.outcome, CleanOutcome::Clean { passes: 1 });
        assert_eq!(report.join.components_before, 2);
        assert_eq!(report.join.joins, 1);
        assert_eq!(report.holes_filled, 0);
        assert!(report.second_clean.is_some());
        assert!(report.is_watertight());
        assert_eq!(compute_components(&mesh).component_count(), 1);
        assert_relative_eq!(mesh.signed_volume(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_join_after_clean_falls_back_to_filling() {
        let mut mesh = facing_open_cubes();
        let params = RepairParams {
            remove_smallest_components: false,
            join_components: true,
            join_stage: JoinStage::AfterClean,
            max_join_distance: Some(0.5),
            ..Default::default()
        };
        let report = repair(&mut mesh, &params).unwrap();
        assert_eq!(report.join.joins, 0);
        assert_eq!(report.holes_filled, 2);
        assert!(report.is_watertight());
        assert_eq!(compute_components(&mesh).component_count(), 2);
    }

    #[test]
    fn test_repair_batch() {
        let mut meshes = vec![open_cube(), unit_cube(), sphere(1)];
        let results = repair_batch(&mut meshes, &RepairParams::fast());
        assert_eq!(results.len(), 3);
        for (result, mesh) in results.iter().zip(&meshes) {
            let report = result.as_ref().unwrap();
            assert!(report.is_watertight());
            assert_eq!(report.final_faces, mesh.face_count());
        }
    }

    #[test]
    fn test_report_display() {
        let mut mesh = open_cube();
        let report = repair(&mut mesh, &RepairParams::default()).unwrap();
        let text = report.to_string();
        assert!(text.contains("Mesh Repair Report"));
        assert!(text.contains("Holes: 1 filled"));
        assert!(text.contains("Result: CLEAN"));
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_params_from_partial_json() {
        let params: RepairParams =
            serde_json::from_str(r#"{ "max_iters": 4, "join_components": true }"#).unwrap();
        assert_eq!(params.max_iters, 4);
        assert!(params.join_components);
        assert_eq!(params.inner_loops, 3);
        assert_eq!(params.max_join_distance, None);
    }
}
