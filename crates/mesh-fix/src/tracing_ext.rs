//! Tracing extensions for mesh operations.
//!
//! Enable output by installing a subscriber in the application:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // RUST_LOG=mesh_fix=debug for per-pass detail
//! ```
//!
//! # Log Levels
//!
//! - **WARN**: Diagnostics such as open boundary chains, unfillable loops or
//!   an exhausted repair
//! - **INFO**: Stage summaries and timing
//! - **DEBUG**: Per-pass detail
//! - **TRACE**: Per-element dumps

use std::time::Instant;
use tracing::{Span, debug, info, warn};

use crate::Mesh;
use crate::repair::RepairReport;

/// Emit a stage progress event, at `info` when `verbose` and `debug` otherwise.
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            ::tracing::info!(target: "mesh_fix::progress", $($arg)+)
        } else {
            ::tracing::debug!(target: "mesh_fix::progress", $($arg)+)
        }
    };
}
pub(crate) use progress;

/// A performance timer that logs duration on drop.
///
/// # Example
///
/// ```rust,ignore
/// use mesh_fix::tracing_ext::OperationTimer;
///
/// fn expensive_operation() {
///     let _timer = OperationTimer::new("expensive_operation");
///     // ... do work ...
/// } // Timer logs duration when dropped
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("mesh_operation", operation = name);
        debug!(target: "mesh_fix::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Create a timer that also records the mesh size.
    pub fn with_context(name: &'static str, mesh: &Mesh) -> Self {
        let span = tracing::info_span!(
            "mesh_operation",
            operation = name,
            faces = mesh.face_count(),
            vertices = mesh.vertex_count()
        );
        debug!(
            target: "mesh_fix::timing",
            operation = name,
            faces = mesh.face_count(),
            vertices = mesh.vertex_count(),
            "Starting operation"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Get the elapsed time.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Get the span for this timer.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        info!(
            target: "mesh_fix::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", elapsed_ms),
            "Operation completed"
        );
    }
}

/// Log mesh statistics at debug level.
pub fn log_mesh_stats(mesh: &Mesh, context: &str) {
    let (min_bounds, max_bounds) = mesh.bounds().unwrap_or_default();
    let dims = max_bounds - min_bounds;

    debug!(
        target: "mesh_fix::mesh_state",
        context = context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.4} x {:.4} x {:.4}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
}

/// Log the outcome of a repair.
pub fn log_repair_report(report: &RepairReport) {
    if report.is_clean() {
        info!(
            target: "mesh_fix::repair",
            vertices = report.final_vertices,
            faces = report.final_faces,
            holes_filled = report.holes_filled,
            boundary_loops = report.boundary_loops_remaining,
            "Mesh repair reached a fixed point"
        );
    } else {
        warn!(
            target: "mesh_fix::repair",
            vertices = report.final_vertices,
            faces = report.final_faces,
            residual_defects = report.residual_defects(),
            boundary_loops = report.boundary_loops_remaining,
            "Mesh repair exhausted its iteration budget"
        );
    }
}
