//! Error types for mesh repair with rich diagnostics.
//!
//! Every error carries:
//! - An [`ErrorKind`] for programmatic branching (never match on message text)
//! - A machine-readable [`ErrorCode`] in the format `MESH-XXXX`
//! - A recovery suggestion and, where known, a location in the mesh
//!
//! # Error Codes
//!
//! - `MESH-1xxx`: I/O errors (reading, writing)
//! - `MESH-2xxx`: Invalid input (array shapes, indices, coordinates)
//! - `MESH-3xxx`: Repair conditions (boundaries, exhausted iteration budget)
//! - `MESH-4xxx`: Format errors (unsupported or malformed files)
//!
//! # Example
//!
//! ```
//! use mesh_fix::{ErrorKind, Mesh};
//!
//! let err = Mesh::from_arrays(&[[0.0, 0.0, 0.0]], &[[0, 1, 2]]).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidInput);
//! assert_eq!(err.code().as_str(), "MESH-2001");
//! ```

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Broad classification of a [`MeshError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed arrays, out-of-range indices, unreadable or unsupported files.
    /// Always surfaced immediately.
    InvalidInput,
    /// A boundary walk could not close into a simple loop. Diagnostic only.
    NonManifoldBoundary,
    /// The hole filler could not triangulate a loop. That loop is skipped.
    DegenerateBoundary,
    /// The clean loop hit its iteration cap without reaching a fixed point.
    RepairExhausted,
    /// File system failure. Fatal.
    Io,
}

impl ErrorKind {
    /// Whether an operation reporting this kind should stop immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::InvalidInput | ErrorKind::Io)
    }
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // I/O errors (1xxx)
    /// MESH-1001: Failed to read file
    IoRead = 1001,
    /// MESH-1002: Failed to write file
    IoWrite = 1002,

    // Invalid input (2xxx)
    /// MESH-2001: Face references a vertex index outside the vertex array
    InvalidVertexIndex = 2001,
    /// MESH-2002: Vertex has NaN or infinite coordinate
    InvalidCoordinate = 2002,
    /// MESH-2003: Array does not have the expected N×3 shape
    InvalidShape = 2003,
    /// MESH-2004: Parameter out of its valid range
    InvalidParameter = 2004,

    // Repair conditions (3xxx)
    /// MESH-3001: Boundary walk could not be closed into a loop
    NonManifoldBoundary = 3001,
    /// MESH-3002: Boundary loop could not be triangulated
    DegenerateBoundary = 3002,
    /// MESH-3003: Iteration budget exhausted before a fixed point
    RepairExhausted = 3003,

    // Format errors (4xxx)
    /// MESH-4001: Unsupported file format
    UnsupportedFormat = 4001,
    /// MESH-4002: Malformed file content
    ParseError = 4002,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `MESH-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "MESH-1001",
            ErrorCode::IoWrite => "MESH-1002",
            ErrorCode::InvalidVertexIndex => "MESH-2001",
            ErrorCode::InvalidCoordinate => "MESH-2002",
            ErrorCode::InvalidShape => "MESH-2003",
            ErrorCode::InvalidParameter => "MESH-2004",
            ErrorCode::NonManifoldBoundary => "MESH-3001",
            ErrorCode::DegenerateBoundary => "MESH-3002",
            ErrorCode::RepairExhausted => "MESH-3003",
            ErrorCode::UnsupportedFormat => "MESH-4001",
            ErrorCode::ParseError => "MESH-4002",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for mesh errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Fix the input data before loading.
    FixInput { checks: Vec<String> },
    /// Use a different file format.
    UseDifferentFormat { suggested: Vec<String> },
    /// Adjust repair parameters.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Run another repair step first.
    RunRepair { operations: Vec<String> },
    /// Check file system access.
    CheckFileSystem { checks: Vec<String> },
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::FixInput { checks } => {
                write!(f, "Check the input data for: {}", checks.join(", "))
            }
            RecoverySuggestion::UseDifferentFormat { suggested } => {
                write!(f, "Try using a different format: {}", suggested.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::RunRepair { operations } => {
                write!(f, "Run repair operations: {}", operations.join(", "))
            }
            RecoverySuggestion::CheckFileSystem { checks } => {
                write!(f, "Check: {}", checks.join(", "))
            }
            RecoverySuggestion::None => write!(f, "No automatic recovery available"),
        }
    }
}

/// Location information for mesh errors.
#[derive(Debug, Clone)]
pub enum MeshLocation {
    /// A single vertex.
    Vertex { index: usize },
    /// A single face.
    Face { index: usize },
    /// A chain or loop of boundary vertices.
    Boundary { vertices: Vec<u32> },
    /// A file on disk.
    File { path: PathBuf },
}

impl std::fmt::Display for MeshLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshLocation::Vertex { index } => write!(f, "vertex {}", index),
            MeshLocation::Face { index } => write!(f, "face {}", index),
            MeshLocation::Boundary { vertices } => {
                const SHOWN: usize = 8;
                let head: Vec<String> = vertices.iter().take(SHOWN).map(|v| v.to_string()).collect();
                if vertices.len() > SHOWN {
                    write!(
                        f,
                        "boundary [{}, ...] ({} vertices)",
                        head.join(", "),
                        vertices.len()
                    )
                } else {
                    write!(f, "boundary [{}]", head.join(", "))
                }
            }
            MeshLocation::File { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Errors produced by the repair engine.
#[derive(Debug, Error, Diagnostic)]
pub enum MeshError {
    /// Error reading from a file.
    #[error("failed to read mesh from {path}")]
    #[diagnostic(
        code(mesh::io::read),
        help("Check that the file exists and is readable")
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write mesh to {path}")]
    #[diagnostic(
        code(mesh::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Face references a vertex that does not exist.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(
        code(mesh::input::vertex_index),
        help("Face indices must be zero-based and lie in [0, vertex count)")
    )]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: i64,
        vertex_count: usize,
    },

    /// Vertex coordinate is NaN or infinite.
    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    #[diagnostic(
        code(mesh::input::coordinate),
        help("All vertex coordinates must be finite")
    )]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// Array has the wrong shape.
    #[error("invalid {array} array: {details}")]
    #[diagnostic(
        code(mesh::input::shape),
        help("Vertices must be an N×3 float array and faces an M×3 integer array")
    )]
    InvalidShape {
        array: &'static str,
        details: String,
    },

    /// A parameter is outside its valid range.
    #[error("invalid parameter {name}: {details}")]
    #[diagnostic(code(mesh::input::parameter))]
    InvalidParameter {
        name: &'static str,
        details: String,
    },

    /// A boundary walk could not be closed into a simple loop.
    #[error("non-manifold boundary: open chain of {} vertices", .chain.len())]
    #[diagnostic(
        code(mesh::repair::non_manifold_boundary),
        severity(Warning),
        help("The region is left for a later pass; inconsistent face winding is a common cause")
    )]
    NonManifoldBoundary { chain: Vec<u32> },

    /// A boundary loop could not be triangulated.
    #[error("cannot fill boundary loop {loop_index}: {details}")]
    #[diagnostic(
        code(mesh::repair::degenerate_boundary),
        severity(Warning),
        help("The loop was skipped; other loops were still processed")
    )]
    DegenerateBoundary {
        loop_index: usize,
        vertices: Vec<u32>,
        details: String,
    },

    /// The clean loop reached its iteration cap.
    #[error(
        "repair did not converge after {iterations} iteration(s): {residual_defects} defect(s) remain"
    )]
    #[diagnostic(
        code(mesh::repair::exhausted),
        severity(Warning),
        help("The partially repaired mesh is still available; retry with a larger iteration budget")
    )]
    RepairExhausted {
        iterations: usize,
        residual_defects: usize,
    },

    /// Unsupported file format.
    #[error("unsupported mesh format: {extension:?}")]
    #[diagnostic(
        code(mesh::format::unsupported),
        help("Supported formats: STL, PLY, OBJ, OFF")
    )]
    UnsupportedFormat { extension: Option<String> },

    /// Malformed file content.
    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(mesh::format::parse),
        help("The file may be truncated or in an unsupported variant of the format")
    )]
    ParseError { path: PathBuf, details: String },
}

impl MeshError {
    /// Returns the broad kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshError::IoRead { .. } | MeshError::IoWrite { .. } => ErrorKind::Io,
            MeshError::InvalidVertexIndex { .. }
            | MeshError::InvalidCoordinate { .. }
            | MeshError::InvalidShape { .. }
            | MeshError::InvalidParameter { .. }
            | MeshError::UnsupportedFormat { .. }
            | MeshError::ParseError { .. } => ErrorKind::InvalidInput,
            MeshError::NonManifoldBoundary { .. } => ErrorKind::NonManifoldBoundary,
            MeshError::DegenerateBoundary { .. } => ErrorKind::DegenerateBoundary,
            MeshError::RepairExhausted { .. } => ErrorKind::RepairExhausted,
        }
    }

    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MeshError::IoRead { .. } => ErrorCode::IoRead,
            MeshError::IoWrite { .. } => ErrorCode::IoWrite,
            MeshError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            MeshError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            MeshError::InvalidShape { .. } => ErrorCode::InvalidShape,
            MeshError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            MeshError::NonManifoldBoundary { .. } => ErrorCode::NonManifoldBoundary,
            MeshError::DegenerateBoundary { .. } => ErrorCode::DegenerateBoundary,
            MeshError::RepairExhausted { .. } => ErrorCode::RepairExhausted,
            MeshError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            MeshError::ParseError { .. } => ErrorCode::ParseError,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            MeshError::IoRead { .. } => RecoverySuggestion::CheckFileSystem {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            MeshError::IoWrite { .. } => RecoverySuggestion::CheckFileSystem {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            MeshError::InvalidVertexIndex { .. } => RecoverySuggestion::FixInput {
                checks: vec!["zero-based face indices".into(), "vertex count".into()],
            },
            MeshError::InvalidCoordinate { .. } => RecoverySuggestion::FixInput {
                checks: vec!["NaN or infinite coordinates".into()],
            },
            MeshError::InvalidShape { .. } => RecoverySuggestion::FixInput {
                checks: vec!["array shape is N×3".into()],
            },
            MeshError::InvalidParameter { name, .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![((*name).into(), "a positive value".into())],
            },
            MeshError::NonManifoldBoundary { .. } => RecoverySuggestion::RunRepair {
                operations: vec!["orient_faces".into(), "clean".into()],
            },
            MeshError::DegenerateBoundary { .. } => RecoverySuggestion::RunRepair {
                operations: vec!["remove_degeneracies".into(), "clean".into()],
            },
            MeshError::RepairExhausted { iterations, .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![("max_iters".into(), format!("> {}", iterations))],
                }
            }
            MeshError::UnsupportedFormat { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["STL".into(), "PLY".into(), "OBJ".into(), "OFF".into()],
            },
            MeshError::ParseError { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["binary STL".into(), "PLY".into()],
            },
        }
    }

    /// Returns location information if available.
    pub fn location(&self) -> Option<MeshLocation> {
        match self {
            MeshError::IoRead { path, .. }
            | MeshError::IoWrite { path, .. }
            | MeshError::ParseError { path, .. } => Some(MeshLocation::File { path: path.clone() }),
            MeshError::InvalidVertexIndex { face_index, .. } => {
                Some(MeshLocation::Face { index: *face_index })
            }
            MeshError::InvalidCoordinate { vertex_index, .. } => Some(MeshLocation::Vertex {
                index: *vertex_index,
            }),
            MeshError::NonManifoldBoundary { chain } => Some(MeshLocation::Boundary {
                vertices: chain.clone(),
            }),
            MeshError::DegenerateBoundary { vertices, .. } => Some(MeshLocation::Boundary {
                vertices: vertices.clone(),
            }),
            _ => None,
        }
    }

    // Constructor helpers for common error patterns

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an InvalidShape error.
    pub fn invalid_shape(array: &'static str, details: impl Into<String>) -> Self {
        MeshError::InvalidShape {
            array,
            details: details.into(),
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(name: &'static str, details: impl Into<String>) -> Self {
        MeshError::InvalidParameter {
            name,
            details: details.into(),
        }
    }

    /// Create a DegenerateBoundary error.
    pub fn degenerate_boundary(
        loop_index: usize,
        vertices: &[u32],
        details: impl Into<String>,
    ) -> Self {
        MeshError::DegenerateBoundary {
            loop_index,
            vertices: vertices.to_vec(),
            details: details.into(),
        }
    }
}
