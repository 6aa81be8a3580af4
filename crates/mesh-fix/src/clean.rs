//! Fixed-point clean loop.
//!
//! Each inner pass runs one degeneracy sweep, drops faces on non-manifold
//! edges, then searches for self-intersections and re-triangulates the
//! regions around them. A pass that changes nothing and finds nothing is a
//! fixed point. The loop is bounded by an outer and an inner iteration count;
//! running out of budget is reported as [`CleanOutcome::Exhausted`] with the
//! residual defect counts, not as an error.
//!
//! ```text
//! Dirty ──run──> Cleaning ──fixed point──> Clean
//!                   │
//!                   └────budget spent────> Exhausted
//! ```

use std::fmt;

use hashbrown::HashSet;
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::adjacency::{MeshAdjacency, face_edges, normalize_edge};
use crate::boundary::{BoundaryLoop, scan_boundaries};
use crate::components::compute_components_with;
use crate::degeneracy::{
    DegeneracyReport, Tolerance, find_degeneracies, remove_degeneracies,
};
use crate::error::{MeshError, MeshResult};
use crate::holes::fill_loop;
use crate::intersect::{DEFAULT_CELL_CAPACITY, IntersectionDetector, IntersectionParams};
use crate::tracing_ext::progress;

/// A carve may take at most `1 / CARVE_SHARE_DIVISOR` of the faces it can reach.
const CARVE_SHARE_DIVISOR: usize = 4;

/// Where a [`Cleaner`] is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum RepairState {
    /// Not yet cleaned since the mesh was handed over.
    Dirty,
    /// Inside [`Cleaner::run`].
    Cleaning,
    /// The last run reached a fixed point.
    Clean,
    /// The last run spent its budget.
    Exhausted,
}

/// Defects left when a run ends without reaching a fixed point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct ResidualDefects {
    /// Faces still classified as degenerate or duplicate.
    pub degenerate_faces: usize,
    /// Faces still involved in a self-intersection.
    pub intersecting_faces: usize,
    /// Edges with more than two faces.
    pub non_manifold_edges: usize,
    /// Boundary loops the fill stage should have closed but did not.
    pub open_loops: usize,
}

impl ResidualDefects {
    /// Sum of all residual counts.
    pub fn total(&self) -> usize {
        self.degenerate_faces + self.intersecting_faces + self.non_manifold_edges + self.open_loops
    }
}

/// How a clean run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum CleanOutcome {
    /// A fixed point was reached after `passes` inner passes.
    Clean { passes: usize },
    /// The budget ran out after `iterations` outer iterations.
    Exhausted {
        iterations: usize,
        residual: ResidualDefects,
    },
}

impl CleanOutcome {
    /// Whether a fixed point was reached.
    pub fn is_clean(&self) -> bool {
        matches!(self, CleanOutcome::Clean { .. })
    }

    /// Residual defect count, zero when clean.
    pub fn residual_defects(&self) -> usize {
        match self {
            CleanOutcome::Clean { .. } => 0,
            CleanOutcome::Exhausted { residual, .. } => residual.total(),
        }
    }

    /// Convert into a `Result`, yielding the pass count when clean.
    ///
    /// # Errors
    ///
    /// [`MeshError::RepairExhausted`] when the budget ran out.
    pub fn into_result(self) -> MeshResult<usize> {
        match self {
            CleanOutcome::Clean { passes } => Ok(passes),
            CleanOutcome::Exhausted {
                iterations,
                residual,
            } => Err(MeshError::RepairExhausted {
                iterations,
                residual_defects: residual.total(),
            }),
        }
    }
}

impl fmt::Display for CleanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanOutcome::Clean { passes } => write!(f, "clean after {} pass(es)", passes),
            CleanOutcome::Exhausted {
                iterations,
                residual,
            } => write!(
                f,
                "exhausted after {} iteration(s): {} degenerate, {} intersecting, {} non-manifold edge(s), {} open loop(s) remain",
                iterations,
                residual.degenerate_faces,
                residual.intersecting_faces,
                residual.non_manifold_edges,
                residual.open_loops
            ),
        }
    }
}

/// Counts accumulated over one clean run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct CleanReport {
    /// How the run ended.
    pub outcome: CleanOutcome,
    /// Outer iterations started.
    pub outer_iterations: usize,
    /// Inner passes run.
    pub inner_passes: usize,
    /// Degeneracy sweeps, summed.
    pub degeneracies: DegeneracyReport,
    /// Faces dropped from non-manifold edges.
    pub non_manifold_faces_removed: usize,
    /// Intersecting faces reported, summed over passes.
    pub intersections_found: usize,
    /// Faces deleted around intersections.
    pub faces_retriangulated: usize,
    /// Faces added when re-filling carved regions.
    pub triangles_added: usize,
    /// Steiner vertices added when re-filling carved regions.
    pub vertices_added: usize,
    /// Carved loops that could not be re-filled.
    pub fill_failures: usize,
}

impl CleanReport {
    pub(crate) fn new() -> Self {
        Self {
            outcome: CleanOutcome::Clean { passes: 0 },
            outer_iterations: 0,
            inner_passes: 0,
            degeneracies: DegeneracyReport::default(),
            non_manifold_faces_removed: 0,
            intersections_found: 0,
            faces_retriangulated: 0,
            triangles_added: 0,
            vertices_added: 0,
            fill_failures: 0,
        }
    }

    /// Whether the run changed the mesh at all.
    pub fn changed_mesh(&self) -> bool {
        self.degeneracies.total() > 0
            || self.non_manifold_faces_removed > 0
            || self.faces_retriangulated > 0
            || self.triangles_added > 0
    }

    fn absorb_carve(&mut self, carve: &Carve) {
        self.faces_retriangulated += carve.faces_removed;
        self.triangles_added += carve.triangles_added;
        self.vertices_added += carve.vertices_added;
        self.fill_failures += carve.fill_failures;
    }
}

impl fmt::Display for CleanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Clean: {}", self.outcome)?;
        writeln!(
            f,
            "  {} outer iteration(s), {} inner pass(es)",
            self.outer_iterations, self.inner_passes
        )?;
        writeln!(
            f,
            "  degeneracies: {} face(s) removed, {} vertex merge(s)",
            self.degeneracies.faces_removed(),
            self.degeneracies.vertices_merged
        )?;
        if self.non_manifold_faces_removed > 0 {
            writeln!(
                f,
                "  non-manifold: {} face(s) removed",
                self.non_manifold_faces_removed
            )?;
        }
        write!(
            f,
            "  intersections: {} found, {} face(s) re-triangulated into {}",
            self.intersections_found, self.faces_retriangulated, self.triangles_added
        )
    }
}

/// Drives the clean loop over one mesh.
///
/// The intersection detector is kept across passes; it rebuilds its tree
/// whenever the mesh generation moves, so it never sees stale geometry.
pub struct Cleaner<'m> {
    mesh: &'m mut Mesh,
    detector: IntersectionDetector,
    relative_tolerance: f64,
    verbose: bool,
    state: RepairState,
}

impl<'m> Cleaner<'m> {
    /// Cleaner with default cell capacity and tolerance.
    pub fn new(mesh: &'m mut Mesh) -> Self {
        Self {
            mesh,
            detector: IntersectionDetector::new(DEFAULT_CELL_CAPACITY),
            relative_tolerance: Tolerance::DEFAULT_RELATIVE,
            verbose: false,
            state: RepairState::Dirty,
        }
    }

    /// Cell capacity for the intersection search.
    pub fn with_cell_capacity(mut self, cell_capacity: usize) -> Self {
        self.detector = IntersectionDetector::with_params(IntersectionParams {
            cell_capacity,
            ..*self.detector.params()
        });
        self
    }

    /// Degeneracy tolerance relative to the bounding-box diagonal.
    pub fn with_tolerance(mut self, relative: f64) -> Self {
        self.relative_tolerance = relative;
        self
    }

    /// Report per-pass progress at `info` level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Current state.
    pub fn state(&self) -> RepairState {
        self.state
    }

    /// The mesh being cleaned.
    pub fn mesh(&self) -> &Mesh {
        self.mesh
    }

    fn tolerance(&self) -> Tolerance {
        Tolerance::for_mesh(self.mesh, self.relative_tolerance)
    }

    /// Run the loop.
    ///
    /// # Errors
    ///
    /// [`MeshError::InvalidParameter`] when either budget is zero. Running out
    /// of budget is not an error; see [`CleanReport::outcome`].
    pub fn run(&mut self, max_iters: usize, inner_loops: usize) -> MeshResult<CleanReport> {
        if max_iters == 0 {
            return Err(MeshError::invalid_parameter(
                "max_iters",
                "at least one outer iteration is required",
            ));
        }
        if inner_loops == 0 {
            return Err(MeshError::invalid_parameter(
                "inner_loops",
                "at least one inner pass is required",
            ));
        }

        self.state = RepairState::Cleaning;
        let mut report = CleanReport::new();

        for outer in 0..max_iters {
            report.outer_iterations = outer + 1;
            for _ in 0..inner_loops {
                report.inner_passes += 1;
                if self.inner_pass(outer + 1, &mut report) {
                    self.mesh.compact();
                    self.state = RepairState::Clean;
                    report.outcome = CleanOutcome::Clean {
                        passes: report.inner_passes,
                    };
                    info!(
                        "Clean loop reached a fixed point after {} pass(es)",
                        report.inner_passes
                    );
                    return Ok(report);
                }
            }
            self.mesh.compact();
            progress!(
                self.verbose,
                "Outer iteration {} done: {} faces, {} vertices",
                outer + 1,
                self.mesh.face_count(),
                self.mesh.vertex_count()
            );
        }

        let residual = self.residual();
        self.state = RepairState::Exhausted;
        report.outcome = CleanOutcome::Exhausted {
            iterations: max_iters,
            residual,
        };
        warn!(
            "Clean loop exhausted after {} iteration(s) with {} residual defect(s)",
            max_iters,
            residual.total()
        );
        Ok(report)
    }

    /// One inner pass; returns whether it was a fixed point.
    fn inner_pass(&mut self, rings: usize, report: &mut CleanReport) -> bool {
        let tolerance = self.tolerance();
        let (degeneracies, refill) = sweep_and_refill(self.mesh, tolerance);
        report.degeneracies.absorb(&degeneracies);
        report.absorb_carve(&refill);

        let non_manifold = remove_non_manifold_faces(self.mesh);
        report.non_manifold_faces_removed += non_manifold.removed;
        if !non_manifold.touched.is_empty() {
            let touched = &non_manifold.touched;
            let carve = fill_loops_matching(self.mesh, |boundary| {
                boundary.vertices.iter().any(|v| touched.contains(v))
            });
            report.absorb_carve(&carve);
        }

        let intersections = self.detector.find(self.mesh);
        report.intersections_found += intersections.count();

        progress!(
            self.verbose,
            "Pass {}: {} degeneracy change(s), {} non-manifold face(s), {} intersecting face(s)",
            report.inner_passes,
            degeneracies.total(),
            non_manifold.removed,
            intersections.count()
        );

        if degeneracies.total() == 0 && non_manifold.removed == 0 && intersections.is_clean() {
            return true;
        }

        if !intersections.is_clean() {
            let carve = carve_and_fill(self.mesh, &intersections.faces, rings);
            report.absorb_carve(&carve);
        }
        false
    }

    /// Count what is left without changing the mesh.
    pub fn residual(&mut self) -> ResidualDefects {
        let tolerance = self.tolerance();
        ResidualDefects {
            degenerate_faces: find_degeneracies(self.mesh, tolerance).total(),
            intersecting_faces: self.detector.count(self.mesh),
            non_manifold_edges: MeshAdjacency::build(self.mesh).non_manifold_edge_count(),
            open_loops: 0,
        }
    }
}

/// Run the clean loop with default settings.
///
/// # Example
///
/// ```
/// use mesh_fix::{CleanOutcome, Mesh, clean};
///
/// let mut mesh = Mesh::from_arrays(
///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
///     &[[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]],
/// )
/// .unwrap();
///
/// let report = clean(&mut mesh, 10, 3).unwrap();
/// assert_eq!(report.outcome, CleanOutcome::Clean { passes: 1 });
/// ```
///
/// # Errors
///
/// [`MeshError::InvalidParameter`] when either budget is zero.
pub fn clean(mesh: &mut Mesh, max_iters: usize, inner_loops: usize) -> MeshResult<CleanReport> {
    Cleaner::new(mesh).run(max_iters, inner_loops)
}

/// Outcome of a strong removal run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct StrongRemovalReport {
    /// Iterations run.
    pub iterations: usize,
    /// Whether the targeted defect class is gone.
    pub converged: bool,
    /// Degeneracy sweeps, summed.
    pub degeneracies: DegeneracyReport,
    /// Faces carved out around stubborn defects.
    pub faces_removed: usize,
    /// Faces added when re-filling.
    pub triangles_added: usize,
    /// Steiner vertices added when re-filling.
    pub vertices_added: usize,
    /// Targeted defects left at the end.
    pub remaining: usize,
}

impl StrongRemovalReport {
    fn absorb_carve(&mut self, carve: &Carve) {
        self.faces_removed += carve.faces_removed;
        self.triangles_added += carve.triangles_added;
        self.vertices_added += carve.vertices_added;
    }
}

fn require_iterations(max_iters: usize) -> MeshResult<()> {
    if max_iters == 0 {
        return Err(MeshError::invalid_parameter(
            "max_iters",
            "at least one iteration is required",
        ));
    }
    Ok(())
}

/// Remove degeneracies until none are left.
///
/// Faces that survive a sweep are carved out with a growing neighbourhood and
/// the hole is re-filled.
///
/// # Errors
///
/// [`MeshError::InvalidParameter`] when `max_iters` is zero.
pub fn strong_degeneracy_removal(mesh: &mut Mesh, max_iters: usize) -> MeshResult<StrongRemovalReport> {
    require_iterations(max_iters)?;
    let mut report = StrongRemovalReport::default();

    for iteration in 0..max_iters {
        report.iterations = iteration + 1;
        let tolerance = Tolerance::for_mesh(mesh, Tolerance::DEFAULT_RELATIVE);
        let (degeneracies, refill) = sweep_and_refill(mesh, tolerance);
        report.degeneracies.absorb(&degeneracies);
        report.absorb_carve(&refill);

        let scan = find_degeneracies(mesh, tolerance);
        report.remaining = scan.total();
        if scan.is_empty() {
            report.converged = true;
            break;
        }

        let mut seeds: Vec<u32> = [scan.index_degenerate, scan.needles, scan.caps, scan.duplicates]
            .concat();
        seeds.sort_unstable();
        seeds.dedup();
        debug!(
            "Strong degeneracy removal {}: carving around {} face(s)",
            iteration + 1,
            seeds.len()
        );
        let carve = carve_and_fill(mesh, &seeds, iteration + 1);
        report.absorb_carve(&carve);
    }

    if report.converged {
        mesh.compact();
    } else {
        warn!(
            "Strong degeneracy removal left {} degenerate face(s)",
            report.remaining
        );
    }
    Ok(report)
}

/// Carve out intersecting regions until none are left.
///
/// # Errors
///
/// [`MeshError::InvalidParameter`] when `max_iters` is zero.
pub fn strong_intersection_removal(mesh: &mut Mesh, max_iters: usize) -> MeshResult<StrongRemovalReport> {
    require_iterations(max_iters)?;
    let mut report = StrongRemovalReport::default();
    let mut detector = IntersectionDetector::new(DEFAULT_CELL_CAPACITY);

    for iteration in 0..max_iters {
        report.iterations = iteration + 1;
        let intersections = detector.find(mesh);
        report.remaining = intersections.count();
        if intersections.is_clean() {
            report.converged = true;
            break;
        }
        let carve = carve_and_fill(mesh, &intersections.faces, iteration + 1);
        report.absorb_carve(&carve);
        mesh.compact();
    }

    if !report.converged {
        report.remaining = detector.count(mesh);
        report.converged = report.remaining == 0;
    }
    if !report.converged {
        warn!(
            "Strong intersection removal left {} intersecting face(s)",
            report.remaining
        );
    }
    Ok(report)
}

/// What one carve-and-fill step did.
#[derive(Debug, Default)]
struct Carve {
    faces_removed: usize,
    triangles_added: usize,
    vertices_added: usize,
    fill_failures: usize,
}

/// Delete `seeds` grown by `rings` vertex rings and re-fill the loops left
/// around the removed region.
///
/// Growth stops before the selection would exceed a quarter of the faces in
/// the components the seeds belong to; the seeds themselves are always taken.
fn carve_and_fill(mesh: &mut Mesh, seeds: &[u32], rings: usize) -> Carve {
    let adjacency = MeshAdjacency::build(mesh);
    let mut selected = vec![false; mesh.face_slots()];
    let mut frontier: Vec<u32> = seeds
        .iter()
        .copied()
        .filter(|&f| mesh.is_face_live(f))
        .collect();
    for &f in &frontier {
        selected[f as usize] = true;
    }

    let labels = compute_components_with(mesh, &adjacency);
    let seeded: HashSet<u32> = frontier.iter().filter_map(|&f| labels.label(f)).collect();
    let reachable: usize = seeded.iter().map(|&c| labels.sizes()[c as usize]).sum();
    let budget = (reachable / CARVE_SHARE_DIVISOR).max(frontier.len());
    let mut taken = frontier.len();

    for _ in 0..rings {
        let mut next = Vec::new();
        for &f in &frontier {
            let Some(face) = mesh.face(f) else { continue };
            for v in face {
                for &g in adjacency.faces_for_vertex(v) {
                    if !selected[g as usize] {
                        selected[g as usize] = true;
                        next.push(g);
                    }
                }
            }
        }
        if next.is_empty() {
            break;
        }
        if taken + next.len() > budget {
            for g in next {
                selected[g as usize] = false;
            }
            break;
        }
        taken += next.len();
        frontier = next;
    }

    let mut touched: HashSet<u32> = HashSet::new();
    let mut faces_removed = 0;
    for (f, selected) in selected.into_iter().enumerate() {
        if !selected {
            continue;
        }
        if let Some(face) = mesh.face(f as u32) {
            touched.extend(face);
            mesh.remove_face(f as u32);
            faces_removed += 1;
        }
    }
    mesh.remove_unreferenced_vertices();

    let mut carve =
        fill_loops_matching(mesh, |boundary| boundary.vertices.iter().any(|v| touched.contains(v)));
    carve.faces_removed += faces_removed;
    debug!(
        "Carved {} face(s) ({} ring(s)), re-filled with {} triangle(s)",
        faces_removed, rings, carve.triangles_added
    );
    carve
}

/// Fill every boundary loop accepted by `keep`.
fn fill_loops_matching(mesh: &mut Mesh, keep: impl Fn(&BoundaryLoop) -> bool) -> Carve {
    let mut carve = Carve::default();
    let loops: Vec<_> = scan_boundaries(mesh)
        .loops
        .into_iter()
        .filter(|boundary| keep(boundary))
        .collect();
    if loops.is_empty() {
        return carve;
    }

    let adjacency = MeshAdjacency::build(mesh);
    let mut added_edges = HashSet::new();
    for (index, boundary) in loops.iter().enumerate() {
        match fill_loop(mesh, &adjacency, &mut added_edges, boundary, index, true) {
            Ok(fill) => {
                carve.triangles_added += fill.triangles_added;
                carve.vertices_added += fill.vertices_added;
                carve.faces_removed += fill.faces_removed;
            }
            Err(err) => {
                debug!("Re-fill skipped: {}", err);
                carve.fill_failures += 1;
            }
        }
    }
    carve
}

/// One degeneracy sweep, then re-fill every loop the deleted faces opened.
fn sweep_and_refill(mesh: &mut Mesh, tolerance: Tolerance) -> (DegeneracyReport, Carve) {
    let before: Vec<Option<[u32; 3]>> =
        (0..mesh.face_slots() as u32).map(|f| mesh.face(f)).collect();
    let degeneracies = remove_degeneracies(mesh, tolerance);
    if degeneracies.faces_removed() == 0 {
        return (degeneracies, Carve::default());
    }
    let opened = removed_face_edges(mesh, &before);
    let refill = fill_loops_matching(mesh, |boundary| {
        boundary
            .edges()
            .any(|(a, b)| opened.contains(&normalize_edge(a, b)))
    });
    if refill.triangles_added > 0 {
        debug!(
            "Re-filled loops opened by the degeneracy sweep: {} triangle(s)",
            refill.triangles_added
        );
    }
    (degeneracies, refill)
}

/// Normalized edges of faces that were live in `before` and are gone now.
fn removed_face_edges(mesh: &Mesh, before: &[Option<[u32; 3]>]) -> HashSet<(u32, u32)> {
    before
        .iter()
        .enumerate()
        .filter(|(f, _)| !mesh.is_face_live(*f as u32))
        .filter_map(|(_, face)| *face)
        .flat_map(face_edges)
        .map(|(a, b)| normalize_edge(a, b))
        .collect()
}

/// Faces dropped by [`remove_non_manifold_faces`] and the vertices they used.
#[derive(Debug, Default)]
pub(crate) struct NonManifoldRemoval {
    pub(crate) removed: usize,
    pub(crate) touched: HashSet<u32>,
}

/// Keep the two largest faces on every edge shared by more than two.
pub(crate) fn remove_non_manifold_faces(mesh: &mut Mesh) -> NonManifoldRemoval {
    let adjacency = MeshAdjacency::build(mesh);
    let mut edges: Vec<(u32, u32)> = adjacency.non_manifold_edges().collect();
    let mut result = NonManifoldRemoval::default();
    if edges.is_empty() {
        return result;
    }
    edges.sort_unstable();

    let mut doomed: Vec<u32> = Vec::new();
    for (a, b) in &edges {
        let mut faces: Vec<(u32, f64)> = adjacency
            .faces_for_edge(*a, *b)
            .iter()
            .filter(|&&f| !doomed.contains(&f))
            .filter_map(|&f| Some((f, mesh.triangle(f)?.area())))
            .collect();
        if faces.len() <= 2 {
            continue;
        }
        // Largest first; equal areas keep slot order.
        faces.sort_by(|x, y| y.1.total_cmp(&x.1));
        doomed.extend(faces.iter().skip(2).map(|(f, _)| *f));
    }

    for f in doomed {
        if let Some(face) = mesh.face(f) {
            result.touched.extend(face);
            mesh.remove_face(f);
            result.removed += 1;
        }
    }
    if result.removed > 0 {
        mesh.remove_unreferenced_vertices();
        info!(
            "Removed {} face(s) from {} non-manifold edge(s)",
            result.removed,
            edges.len()
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::intersect::find_intersecting_triangles;
    use crate::test_support::{CUBE_FACES, CUBE_VERTICES, merge_parts, sphere, sphere_arrays, unit_cube};

    fn overlapping_spheres() -> Mesh {
        merge_parts(&[
            sphere_arrays(2, 1.0, [0.0; 3]),
            sphere_arrays(2, 1.0, [1.0, 0.2, 0.1]),
        ])
    }

    #[test]
    fn test_clean_mesh_is_fixed_point() {
        let mut mesh = sphere(2);
        let generation = mesh.generation();
        let faces = mesh.face_count();

        let mut cleaner = Cleaner::new(&mut mesh);
        assert_eq!(cleaner.state(), RepairState::Dirty);
        let report = cleaner.run(10, 3).unwrap();
        assert_eq!(cleaner.state(), RepairState::Clean);

        assert_eq!(report.outcome, CleanOutcome::Clean { passes: 1 });
        assert!(!report.changed_mesh());
        assert_eq!(report.outcome.residual_defects(), 0);
        assert_eq!(mesh.face_count(), faces);
        assert_eq!(mesh.generation(), generation);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut mesh = unit_cube();
        let err = clean(&mut mesh, 0, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = clean(&mut mesh, 3, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_degeneracies_cleaned() {
        let mut faces: Vec<[i64; 3]> = CUBE_FACES.to_vec();
        faces.push([0, 1, 2]); // duplicate of face 0, reversed
        faces.push([3, 3, 4]); // repeated index
        let mut mesh = Mesh::from_arrays(&CUBE_VERTICES, &faces).unwrap();

        let report = clean(&mut mesh, 10, 3).unwrap();
        assert!(report.outcome.is_clean());
        assert_eq!(report.degeneracies.duplicates_removed, 1);
        assert_eq!(report.degeneracies.index_degenerate_removed, 1);
        assert_eq!(mesh.face_count(), 12);
        // Compacted at the pass boundary.
        assert_eq!(mesh.face_slots(), 12);
        assert!(MeshAdjacency::build(&mesh).is_closed_manifold());
    }

    #[test]
    fn test_intersections_are_carved() {
        let mut mesh = merge_parts(&[
            sphere_arrays(3, 1.0, [0.0; 3]),
            sphere_arrays(3, 1.0, [1.0, 0.2, 0.1]),
        ]);
        assert!(!find_intersecting_triangles(&mesh, 50).is_clean());

        let report = clean(&mut mesh, 30, 5).unwrap();
        assert!(report.faces_retriangulated > 0);
        assert!(report.outcome.is_clean(), "{}", report);
        assert!(find_intersecting_triangles(&mesh, 50).is_clean());
        assert!(MeshAdjacency::build(&mesh).is_closed_manifold());
    }

    #[test]
    fn test_sweep_refills_loops_it_opens() {
        // A two-sided flap on cube corner 1: both copies close each other's
        // edges until the duplicate sweep drops one of them.
        let mut vertices = CUBE_VERTICES.to_vec();
        vertices.extend([[2.0, 0.0, -0.5], [2.0, 1.0, -0.5]]);
        let mut faces: Vec<[i64; 3]> = CUBE_FACES.to_vec();
        faces.extend([[1, 8, 9], [1, 9, 8]]);
        let mut mesh = Mesh::from_arrays(&vertices, &faces).unwrap();
        assert!(MeshAdjacency::build(&mesh).is_closed_manifold());

        let report = clean(&mut mesh, 10, 3).unwrap();
        assert!(report.outcome.is_clean());
        assert_eq!(report.degeneracies.duplicates_removed, 1);
        assert_eq!(mesh.face_count(), 12);
        assert_eq!(scan_boundaries(&mesh).loop_count(), 0);
        assert!(MeshAdjacency::build(&mesh).is_closed_manifold());
    }

    #[test]
    fn test_budget_exhaustion_is_reported() {
        let mut mesh = overlapping_spheres();
        let mut cleaner = Cleaner::new(&mut mesh).verbose(true);
        let report = cleaner.run(1, 1).unwrap();

        assert_eq!(cleaner.state(), RepairState::Exhausted);
        assert!(matches!(
            report.outcome,
            CleanOutcome::Exhausted { iterations: 1, .. }
        ));
        assert_eq!(report.inner_passes, 1);
    }

    #[test]
    fn test_exhausted_into_result() {
        let outcome = CleanOutcome::Exhausted {
            iterations: 4,
            residual: ResidualDefects {
                degenerate_faces: 1,
                intersecting_faces: 2,
                non_manifold_edges: 0,
                open_loops: 0,
            },
        };
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RepairExhausted);
        assert!(matches!(
            err,
            MeshError::RepairExhausted {
                iterations: 4,
                residual_defects: 3
            }
        ));
        assert_eq!(CleanOutcome::Clean { passes: 2 }.into_result().unwrap(), 2);
    }

    #[test]
    fn test_non_manifold_fin_removed() {
        // A closed cube plus a fin hanging off edge 0-1.
        let mut vertices = CUBE_VERTICES.to_vec();
        vertices.push([0.5, -0.5, -0.5]);
        let mut faces: Vec<[i64; 3]> = CUBE_FACES.to_vec();
        faces.push([1, 0, 8]);
        let mut mesh = Mesh::from_arrays(&vertices, &faces).unwrap();

        let removal = remove_non_manifold_faces(&mut mesh);
        assert_eq!(removal.removed, 1);
        assert!(!mesh.is_face_live(12));
        assert!(!mesh.is_vertex_live(8));
        assert!(MeshAdjacency::build(&mesh).is_closed_manifold());
    }

    #[test]
    fn test_carve_and_fill_keeps_surface_closed() {
        let mut mesh = sphere(2);
        let carve = carve_and_fill(&mut mesh, &[0], 1);
        assert!(carve.faces_removed > 1);
        assert_eq!(carve.fill_failures, 0);
        assert!(carve.triangles_added > 0);
        assert!(MeshAdjacency::build(&mesh).is_closed_manifold());
    }

    #[test]
    fn test_carve_growth_is_capped() {
        let mut mesh = merge_parts(&[
            sphere_arrays(1, 1.0, [0.0; 3]),
            sphere_arrays(1, 1.0, [1.0, 0.2, 0.1]),
        ]);
        let seeds = find_intersecting_triangles(&mesh, 50).faces;
        assert!(!seeds.is_empty());
        let total = mesh.face_count();

        let carve = carve_and_fill(&mut mesh, &seeds, 20);
        assert!(carve.faces_removed <= (total / CARVE_SHARE_DIVISOR).max(seeds.len()));
        assert!(mesh.face_count() > 12);
    }

    #[test]
    fn test_strong_degeneracy_removal() {
        let mut faces: Vec<[i64; 3]> = CUBE_FACES.to_vec();
        faces.push([0, 2, 1]);
        let mut mesh = Mesh::from_arrays(&CUBE_VERTICES, &faces).unwrap();

        let report = strong_degeneracy_removal(&mut mesh, 5).unwrap();
        assert!(report.converged);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.degeneracies.duplicates_removed, 1);
        assert_eq!(mesh.face_count(), 12);
    }

    #[test]
    fn test_strong_intersection_removal() {
        let mut mesh = overlapping_spheres();
        let report = strong_intersection_removal(&mut mesh, 10).unwrap();
        assert!(report.faces_removed > 0);
        assert_eq!(report.converged, report.remaining == 0);
        assert!(strong_intersection_removal(&mut mesh, 0).is_err());
    }

    #[test]
    fn test_report_display() {
        let mut mesh = unit_cube();
        let report = clean(&mut mesh, 2, 2).unwrap();
        let text = report.to_string();
        assert!(text.contains("clean after 1 pass(es)"));
    }
}
