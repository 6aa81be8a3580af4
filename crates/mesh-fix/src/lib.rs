//! Triangle mesh repair.
//!
//! Turns a raw triangle soup into a closed, consistently oriented 2-manifold
//! that is free of self-intersections and degenerate triangles. It also
//! reports honestly when that could not be reached within an iteration budget.
//!
//! # Features
//!
//! - **File I/O**: Load and save STL, PLY, OBJ and OFF
//! - **Diagnostics**: Boundary loops, self-intersections, components and
//!   degeneracies, all without touching the mesh
//! - **Repair**: Winding, component pruning and joining, hole filling with
//!   density-matched patches, and an iterated clean loop that removes
//!   degeneracies and re-triangulates intersecting regions
//!
//! # Coordinate System
//!
//! Face winding is **counter-clockwise (CCW) when viewed from outside** the
//! mesh, so normals point outward by the right-hand rule. Tolerances are
//! relative to the bounding-box diagonal, so no unit is assumed.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_fix::{RepairParams, load_mesh, repair, save_mesh};
//!
//! let mut mesh = load_mesh("scan.stl").unwrap();
//!
//! let report = repair(&mut mesh, &RepairParams::default()).unwrap();
//! println!("{}", report);
//!
//! save_mesh(&mesh, "repaired.stl").unwrap();
//! ```
//!
//! # Diagnostics Before Repair
//!
//! ```no_run
//! use mesh_fix::{DiagnosticsOptions, diagnose, load_mesh};
//!
//! let mesh = load_mesh("part.ply").unwrap();
//! let report = diagnose(&mesh, &DiagnosticsOptions::detailed());
//!
//! if !report.is_watertight() {
//!     println!("{} boundary loop(s): {:?}", report.boundary_loop_count, report.boundary_loop_sizes);
//! }
//! if report.intersecting_face_count > 0 {
//!     println!("{} self-intersecting faces", report.intersecting_face_count);
//! }
//! ```
//!
//! # Lower-level Building Blocks
//!
//! Every repair stage is also available on its own:
//!
//! ```
//! use mesh_fix::{Mesh, clean, fill_boundaries_under, scan_boundaries};
//!
//! // A tetrahedron without its base.
//! let mut mesh = Mesh::from_arrays(
//!     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
//!     &[[0, 1, 3], [1, 2, 3], [0, 3, 2]],
//! )
//! .unwrap();
//! assert_eq!(scan_boundaries(&mesh).loop_count(), 1);
//!
//! let summary = fill_boundaries_under(&mut mesh, 0, false);
//! assert_eq!(summary.filled, 1);
//!
//! let report = clean(&mut mesh, 10, 3).unwrap();
//! assert!(report.outcome.is_clean());
//! ```
//!
//! # Error Handling
//!
//! Fallible operations return `MeshResult<T>`, which is
//! `Result<T, MeshError>`. Branch on [`MeshError::kind`] rather than on the
//! message:
//!
//! ```
//! use mesh_fix::{ErrorKind, load_mesh};
//!
//! match load_mesh("nonexistent.stl") {
//!     Ok(_) => println!("Loaded successfully"),
//!     Err(e) if e.kind() == ErrorKind::Io => println!("Cannot read: {}", e),
//!     Err(e) => println!("Other error [{}]: {}", e.code(), e),
//! }
//! ```
//!
//! An exhausted clean loop is a normal outcome, not an error; convert it with
//! [`CleanOutcome::into_result`] when `?` is more convenient.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Binary | Notes |
//! |--------|-----------|------|------|--------|-------|
//! | STL    | `.stl`    | ✓    | ✓    | ✓      | Shared corners are merged on load |
//! | PLY    | `.ply`    | ✓    | ✓    | ✓      | Polygons are fan-triangulated |
//! | OBJ    | `.obj`    | ✓    | ✓    | ✗      | All objects merge into one mesh |
//! | OFF    | `.off`    | ✓    | ✓    | ✗      | Colour columns are ignored |

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod builder;
mod error;
pub mod tracing_ext;
mod types;

#[cfg(test)]
mod test_support;

pub mod adjacency;
pub mod boundary;
pub mod clean;
pub mod components;
pub mod degeneracy;
pub mod holes;
pub mod intersect;
pub mod io;
pub mod repair;
pub mod validate;
pub mod winding;

// Re-export core types at crate root
pub use error::{
    ErrorCode, ErrorKind, MeshError, MeshLocation, MeshResult, RecoverySuggestion,
};
pub use types::{Compaction, ExportedArrays, Mesh, Triangle, Vertex};

pub use adjacency::{AdjacencyCache, MeshAdjacency};
pub use boundary::{
    BoundaryLoop, BoundaryLoops, BoundaryScan, boundary_count, find_boundary_loops,
    scan_boundaries,
};
pub use clean::{
    CleanOutcome, CleanReport, Cleaner, RepairState, ResidualDefects, StrongRemovalReport, clean,
    strong_degeneracy_removal, strong_intersection_removal,
};
pub use components::{
    ComponentAnalysis, ComponentLabels, JoinReport, compute_components,
    find_connected_components, join_closest_components, remove_smallest_components,
    split_into_components,
};
pub use degeneracy::{
    DegeneracyReport, DegeneracyScan, Tolerance, find_degeneracies, merge_coincident_vertices,
    remove_degeneracies,
};
pub use holes::{FillReport, FillSummary, fill_boundaries_under, fill_boundary};
pub use intersect::{
    IntersectionDetector, IntersectionParams, IntersectionReport, SpatialTree,
    find_intersecting_triangles,
};
pub use io::{MeshFormat, SaveOptions, load_mesh, load_mesh_as, save_mesh, save_mesh_with};
pub use repair::{JoinStage, RepairParams, RepairReport, repair, repair_batch};
pub use validate::{DiagnosticsOptions, MeshReport, diagnose};
pub use winding::{OrientReport, orient_faces};

// Builder API
pub use builder::{RepairBuilder, RepairResult};
