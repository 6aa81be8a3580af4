//! Mesh file I/O for STL, PLY, OBJ, and OFF formats.
//!
//! Loading validates coordinates and indices the same way
//! [`Mesh::from_arrays`] does. Saving always writes the compacted mesh.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::OperationTimer;
use crate::types::Triangle;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Stl,
    Ply,
    Obj,
    /// Object File Format.
    Off,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "stl" => Some(MeshFormat::Stl),
                "ply" => Some(MeshFormat::Ply),
                "obj" => Some(MeshFormat::Obj),
                "off" => Some(MeshFormat::Off),
                _ => None,
            })
    }

    /// Canonical file extension.
    pub fn extension(self) -> &'static str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Ply => "ply",
            MeshFormat::Obj => "obj",
            MeshFormat::Off => "off",
        }
    }

    /// Whether the format has a binary encoding.
    pub fn supports_binary(self) -> bool {
        matches!(self, MeshFormat::Stl | MeshFormat::Ply)
    }
}

fn detect_format(path: &Path) -> MeshResult<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
        extension: path.extension().and_then(|e| e.to_str()).map(String::from),
    })
}

/// Load a mesh from file, auto-detecting format from extension.
///
/// # Errors
///
/// - [`MeshError::UnsupportedFormat`] for an unknown extension
/// - [`MeshError::IoRead`] when the file cannot be opened
/// - [`MeshError::ParseError`] for malformed content
pub fn load_mesh(path: impl AsRef<Path>) -> MeshResult<Mesh> {
    let path = path.as_ref();
    load_mesh_as(path, detect_format(path)?)
}

/// Load a mesh from file in an explicit format.
pub fn load_mesh_as(path: impl AsRef<Path>, format: MeshFormat) -> MeshResult<Mesh> {
    let path = path.as_ref();
    let _timer = OperationTimer::new("load_mesh");
    info!("Loading mesh from {:?} (format: {:?})", path, format);

    let (vertices, faces) = match format {
        MeshFormat::Stl => read_stl(path)?,
        MeshFormat::Ply => read_ply(path)?,
        MeshFormat::Obj => read_obj(path)?,
        MeshFormat::Off => read_off(path)?,
    };
    let mesh = Mesh::from_arrays(&vertices, &faces)?;

    if let Some((min, max)) = mesh.bounds() {
        let dims = max - min;
        info!(
            "Loaded mesh: {} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        );
        debug!(
            "Dimensions: {:.4} x {:.4} x {:.4}",
            dims.x, dims.y, dims.z
        );
    }
    if mesh.face_count() == 0 {
        warn!("{:?} contains no faces", path);
    }

    Ok(mesh)
}

fn open(path: &Path) -> MeshResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| MeshError::io_read(path, e))
}

type RawMesh = (Vec<[f64; 3]>, Vec<[i64; 3]>);

/// Push the fan triangulation of a polygon.
fn push_fan(faces: &mut Vec<[i64; 3]>, polygon: &[i64]) {
    for i in 1..polygon.len().saturating_sub(1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

/// Load STL (binary or ASCII), merging bit-identical corners into shared
/// vertices.
fn read_stl(path: &Path) -> MeshResult<RawMesh> {
    let mut reader = open(path)?;
    let stl = stl_io::read_stl(&mut reader).map_err(|e| MeshError::parse_error(path, e.to_string()))?;

    debug!(
        "STL contains {} vertices, {} triangles",
        stl.vertices.len(),
        stl.faces.len()
    );

    let mut slot_of: HashMap<[u32; 3], i64> = HashMap::with_capacity(stl.vertices.len());
    let mut vertices: Vec<[f64; 3]> = Vec::with_capacity(stl.vertices.len());
    let mut remap: Vec<i64> = Vec::with_capacity(stl.vertices.len());
    for v in &stl.vertices {
        let key = v.0.map(f32::to_bits);
        let slot = *slot_of.entry(key).or_insert_with(|| {
            vertices.push(v.0.map(f64::from));
            vertices.len() as i64 - 1
        });
        remap.push(slot);
    }

    let mut faces = Vec::with_capacity(stl.faces.len());
    for face in &stl.faces {
        let mut corners = [0i64; 3];
        for (corner, &v) in corners.iter_mut().zip(&face.vertices) {
            *corner = *remap
                .get(v)
                .ok_or_else(|| MeshError::parse_error(path, format!("vertex index {} out of range", v)))?;
        }
        faces.push(corners);
    }

    if vertices.len() < stl.vertices.len() {
        debug!(
            "Merged {} duplicate STL vertices",
            stl.vertices.len() - vertices.len()
        );
    }
    Ok((vertices, faces))
}

/// Load PLY (ASCII or binary), fan-triangulating polygons.
fn read_ply(path: &Path) -> MeshResult<RawMesh> {
    use ply_rs::parser::Parser;
    use ply_rs::ply::Property;

    let mut reader = open(path)?;
    let parser = Parser::<ply_rs::ply::DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| MeshError::parse_error(path, format!("PLY parse error: {}", e)))?;

    let mut vertices = Vec::new();
    if let Some(elements) = ply.payload.get("vertex") {
        vertices.reserve(elements.len());
        for element in elements {
            vertices.push([
                ply_scalar(element.get("x"), "x", path)?,
                ply_scalar(element.get("y"), "y", path)?,
                ply_scalar(element.get("z"), "z", path)?,
            ]);
        }
    }

    let mut faces = Vec::new();
    if let Some(elements) = ply.payload.get("face") {
        faces.reserve(elements.len());
        for element in elements {
            // Face indices can be stored under either name.
            let indices = element
                .get("vertex_indices")
                .or_else(|| element.get("vertex_index"));
            let polygon: Vec<i64> = match indices {
                Some(Property::ListInt(l)) => l.iter().map(|&i| i64::from(i)).collect(),
                Some(Property::ListUInt(l)) => l.iter().map(|&i| i64::from(i)).collect(),
                Some(Property::ListShort(l)) => l.iter().map(|&i| i64::from(i)).collect(),
                Some(Property::ListUShort(l)) => l.iter().map(|&i| i64::from(i)).collect(),
                Some(Property::ListChar(l)) => l.iter().map(|&i| i64::from(i)).collect(),
                Some(Property::ListUChar(l)) => l.iter().map(|&i| i64::from(i)).collect(),
                _ => {
                    return Err(MeshError::parse_error(
                        path,
                        "face element without an integer vertex_indices list",
                    ));
                }
            };
            push_fan(&mut faces, &polygon);
        }
    }

    debug!(
        "PLY loaded: {} vertices, {} faces",
        vertices.len(),
        faces.len()
    );
    Ok((vertices, faces))
}

fn ply_scalar(prop: Option<&ply_rs::ply::Property>, name: &str, path: &Path) -> MeshResult<f64> {
    use ply_rs::ply::Property;

    match prop {
        Some(Property::Float(v)) => Ok(f64::from(*v)),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(f64::from(*v)),
        Some(Property::UInt(v)) => Ok(f64::from(*v)),
        Some(Property::Short(v)) => Ok(f64::from(*v)),
        Some(Property::UShort(v)) => Ok(f64::from(*v)),
        Some(Property::Char(v)) => Ok(f64::from(*v)),
        Some(Property::UChar(v)) => Ok(f64::from(*v)),
        _ => Err(MeshError::parse_error(
            path,
            format!("missing or invalid PLY property: {}", name),
        )),
    }
}

/// Load OBJ, merging all models and triangulating polygons.
fn read_obj(path: &Path) -> MeshResult<RawMesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        },
    )
    .map_err(|e| match e {
        tobj::LoadError::OpenFileFailed => MeshError::io_read(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        ),
        _ => MeshError::parse_error(path, e.to_string()),
    })?;

    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for model in &models {
        debug!("OBJ model '{}': loading", model.name);
        let offset = vertices.len() as i64;
        vertices.extend(
            model
                .mesh
                .positions
                .chunks_exact(3)
                .map(|c| [f64::from(c[0]), f64::from(c[1]), f64::from(c[2])]),
        );
        faces.extend(model.mesh.indices.chunks_exact(3).map(|c| {
            [
                i64::from(c[0]) + offset,
                i64::from(c[1]) + offset,
                i64::from(c[2]) + offset,
            ]
        }));
    }

    debug!(
        "OBJ loaded: {} vertices, {} faces from {} models",
        vertices.len(),
        faces.len(),
        models.len()
    );
    Ok((vertices, faces))
}

/// Load OFF. Per-element colours after the required fields are ignored.
fn read_off(path: &Path) -> MeshResult<RawMesh> {
    let reader = open(path)?;
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| MeshError::io_read(path, e))?;
        let content = line.split('#').next().unwrap_or_default().trim().to_string();
        if !content.is_empty() {
            lines.push(content);
        }
    }
    parse_off(&lines, path)
}

fn parse_off(lines: &[String], path: &Path) -> MeshResult<RawMesh> {
    let bad = |details: String| MeshError::parse_error(path, details);
    let mut rows = lines.iter().map(|l| l.split_whitespace().collect::<Vec<_>>());

    let mut header = rows.next().ok_or_else(|| bad("empty OFF file".into()))?;
    if header.first().is_some_and(|t| t.ends_with("OFF")) {
        header.remove(0);
        if header.is_empty() {
            header = rows.next().ok_or_else(|| bad("missing OFF counts".into()))?;
        }
    }
    let count = |token: Option<&&str>, what: &str| -> MeshResult<usize> {
        token
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| bad(format!("invalid {} count", what)))
    };
    let vertex_count = count(header.first(), "vertex")?;
    let face_count = count(header.get(1), "face")?;

    let body = rows.len();
    if vertex_count
        .checked_add(face_count)
        .is_none_or(|declared| declared > body)
    {
        return Err(bad(format!(
            "header declares {} vertices and {} faces, but only {} lines follow",
            vertex_count, face_count, body
        )));
    }

    let mut vertices = Vec::with_capacity(vertex_count);
    for i in 0..vertex_count {
        let row = rows
            .next()
            .ok_or_else(|| bad(format!("expected {} vertices, found {}", vertex_count, i)))?;
        let mut coords = [0.0; 3];
        for (axis, coord) in coords.iter_mut().enumerate() {
            *coord = row
                .get(axis)
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| bad(format!("vertex {}: invalid coordinate", i)))?;
        }
        vertices.push(coords);
    }

    let mut faces = Vec::with_capacity(face_count);
    for i in 0..face_count {
        let row = rows
            .next()
            .ok_or_else(|| bad(format!("expected {} faces, found {}", face_count, i)))?;
        let n: usize = row
            .first()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| bad(format!("face {}: invalid vertex count", i)))?;
        if n < 3 || row.len() < n + 1 {
            return Err(bad(format!("face {}: needs at least 3 indices", i)));
        }
        let polygon = row[1..=n]
            .iter()
            .map(|t| t.parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| bad(format!("face {}: {}", i, e)))?;
        push_fan(&mut faces, &polygon);
    }

    Ok((vertices, faces))
}

/// How to write a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Output format; `None` infers it from the extension.
    pub format: Option<MeshFormat>,
    /// Binary encoding for formats that have one.
    pub binary: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            format: None,
            binary: true,
        }
    }
}

impl SaveOptions {
    /// Text encoding, format from the extension.
    pub fn ascii() -> Self {
        Self {
            format: None,
            binary: false,
        }
    }
}

/// Save mesh to file, auto-detecting format from extension.
pub fn save_mesh(mesh: &Mesh, path: impl AsRef<Path>) -> MeshResult<()> {
    save_mesh_with(mesh, path, &SaveOptions::default())
}

/// Save mesh with explicit options.
///
/// # Errors
///
/// - [`MeshError::UnsupportedFormat`] when no format is given and the
///   extension is unknown
/// - [`MeshError::IoWrite`] when the file cannot be written
pub fn save_mesh_with(mesh: &Mesh, path: impl AsRef<Path>, options: &SaveOptions) -> MeshResult<()> {
    let path = path.as_ref();
    let format = match options.format {
        Some(format) => format,
        None => detect_format(path)?,
    };
    let binary = options.binary && format.supports_binary();
    info!(
        "Saving mesh to {:?} ({:?}, {})",
        path,
        format,
        if binary { "binary" } else { "ascii" }
    );

    let (vertices, faces) = mesh.export_arrays();
    let file = File::create(path).map_err(|e| MeshError::io_write(path, e))?;
    let mut writer = BufWriter::new(file);

    match (format, binary) {
        (MeshFormat::Stl, true) => write_stl_binary(&mut writer, &vertices, &faces),
        (MeshFormat::Stl, false) => write_stl_ascii(&mut writer, &vertices, &faces),
        (MeshFormat::Ply, _) => write_ply(&mut writer, &vertices, &faces, binary),
        (MeshFormat::Obj, _) => write_obj(&mut writer, &vertices, &faces),
        (MeshFormat::Off, _) => write_off(&mut writer, &vertices, &faces),
    }
    .and_then(|()| writer.flush())
    .map_err(|e| MeshError::io_write(path, e))?;

    info!(
        "Saved {} vertices and {} faces to {:?}",
        vertices.len(),
        faces.len(),
        path
    );
    Ok(())
}

fn corner_triangle(vertices: &[[f64; 3]], face: &[u32; 3]) -> Triangle {
    let [a, b, c] = face.map(|v| Point3::from(vertices[v as usize]));
    Triangle::new(a, b, c)
}

fn write_stl_binary<W: Write>(w: &mut W, vertices: &[[f64; 3]], faces: &[[u32; 3]]) -> std::io::Result<()> {
    let to_f32 = |p: [f64; 3]| stl_io::Vertex::new(p.map(|c| c as f32));
    let triangles: Vec<stl_io::Triangle> = faces
        .iter()
        .map(|face| {
            let n = corner_triangle(vertices, face).normal().unwrap_or_else(Vector3::zeros);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: face.map(|v| to_f32(vertices[v as usize])),
            }
        })
        .collect();
    stl_io::write_stl(w, triangles.iter())
}

fn write_stl_ascii<W: Write>(w: &mut W, vertices: &[[f64; 3]], faces: &[[u32; 3]]) -> std::io::Result<()> {
    writeln!(w, "solid meshfix")?;
    for face in faces {
        let n = corner_triangle(vertices, face).normal().unwrap_or_else(Vector3::zeros);
        writeln!(w, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z)?;
        writeln!(w, "    outer loop")?;
        for &v in face {
            let [x, y, z] = vertices[v as usize];
            writeln!(w, "      vertex {:e} {:e} {:e}", x, y, z)?;
        }
        writeln!(w, "    endloop")?;
        writeln!(w, "  endfacet")?;
    }
    writeln!(w, "endsolid meshfix")
}

fn write_ply<W: Write>(
    w: &mut W,
    vertices: &[[f64; 3]],
    faces: &[[u32; 3]],
    binary: bool,
) -> std::io::Result<()> {
    use ply_rs::ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
        ScalarType,
    };
    use ply_rs::writer::Writer;

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = if binary {
        Encoding::BinaryLittleEndian
    } else {
        Encoding::Ascii
    };

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for axis in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            axis.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::UInt),
    ));
    ply.header.elements.add(face_def);

    let vertex_payload = vertices
        .iter()
        .map(|p| {
            let mut element = DefaultElement::new();
            for (axis, &value) in ["x", "y", "z"].iter().zip(p) {
                element.insert(axis.to_string(), Property::Double(value));
            }
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertex_payload);

    let face_payload = faces
        .iter()
        .map(|face| {
            let mut element = DefaultElement::new();
            element.insert("vertex_indices".to_string(), Property::ListUInt(face.to_vec()));
            element
        })
        .collect();
    ply.payload.insert("face".to_string(), face_payload);

    // Header counts must match the payload.
    ply.make_consistent()
        .map_err(|e| std::io::Error::other(format!("PLY consistency error: {:?}", e)))?;

    Writer::new().write_ply(w, &mut ply)?;
    Ok(())
}

fn write_obj<W: Write>(w: &mut W, vertices: &[[f64; 3]], faces: &[[u32; 3]]) -> std::io::Result<()> {
    writeln!(w, "# OBJ file exported by meshfix")?;
    writeln!(w, "# Vertices: {}", vertices.len())?;
    writeln!(w, "# Faces: {}", faces.len())?;
    for [x, y, z] in vertices {
        writeln!(w, "v {} {} {}", x, y, z)?;
    }
    // OBJ uses 1-based indexing.
    for [a, b, c] in faces {
        writeln!(w, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}

fn write_off<W: Write>(w: &mut W, vertices: &[[f64; 3]], faces: &[[u32; 3]]) -> std::io::Result<()> {
    writeln!(w, "OFF")?;
    writeln!(w, "{} {} 0", vertices.len(), faces.len())?;
    for [x, y, z] in vertices {
        writeln!(w, "{} {} {}", x, y, z)?;
    }
    for [a, b, c] in faces {
        writeln!(w, "3 {} {} {}", a, b, c)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::MeshAdjacency;
    use crate::error::ErrorKind;
    use crate::test_support::{open_cube, sphere, unit_cube};
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn temp_with(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn assert_same_geometry(a: &Mesh, b: &Mesh, epsilon: f64) {
        let (va, fa) = a.export_arrays();
        let (vb, fb) = b.export_arrays();
        assert_eq!(fa, fb);
        assert_eq!(va.len(), vb.len());
        for (p, q) in va.iter().zip(&vb) {
            for axis in 0..3 {
                assert_relative_eq!(p[axis], q[axis], epsilon = epsilon);
            }
        }
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(MeshFormat::from_path(Path::new("a.stl")), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path(Path::new("a.STL")), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path(Path::new("a.ply")), Some(MeshFormat::Ply));
        assert_eq!(MeshFormat::from_path(Path::new("a.Obj")), Some(MeshFormat::Obj));
        assert_eq!(MeshFormat::from_path(Path::new("a.off")), Some(MeshFormat::Off));
        assert_eq!(MeshFormat::from_path(Path::new("a.3mf")), None);
        assert_eq!(MeshFormat::from_path(Path::new("noext")), None);
        assert!(MeshFormat::Stl.supports_binary());
        assert!(!MeshFormat::Off.supports_binary());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_mesh("model.xyz").unwrap_err();
        assert!(matches!(err, MeshError::UnsupportedFormat { ref extension } if extension.as_deref() == Some("xyz")));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let dir = TempDir::new().unwrap();
        let err = save_mesh(&unit_cube(), dir.path().join("cube.dat")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_mesh(dir.path().join("missing.stl")).unwrap_err();
        assert!(matches!(err, MeshError::IoRead { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_ascii_stl_merges_shared_corners() {
        let file = temp_with(
            ".stl",
            "solid quad
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 1 1 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 1 0
      vertex 0 1 0
    endloop
  endfacet
endsolid quad
",
        );
        let mesh = load_mesh(file.path()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        let adjacency = MeshAdjacency::build(&mesh);
        assert_eq!(adjacency.boundary_edge_count(), 4);
    }

    #[test]
    fn test_stl_round_trip_reconstructs_connectivity() {
        let dir = TempDir::new().unwrap();
        for (name, options) in [
            ("binary.stl", SaveOptions::default()),
            ("ascii.stl", SaveOptions::ascii()),
        ] {
            let path = dir.path().join(name);
            save_mesh_with(&unit_cube(), &path, &options).unwrap();
            let reloaded = load_mesh(&path).unwrap();
            assert_eq!(reloaded.vertex_count(), 8, "{}", name);
            assert_eq!(reloaded.face_count(), 12, "{}", name);
            assert!(MeshAdjacency::build(&reloaded).is_closed_manifold(), "{}", name);
            assert_relative_eq!(reloaded.signed_volume(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_ply_round_trip() {
        let dir = TempDir::new().unwrap();
        let mesh = sphere(1);
        for (name, options) in [
            ("binary.ply", SaveOptions::default()),
            ("ascii.ply", SaveOptions::ascii()),
        ] {
            let path = dir.path().join(name);
            save_mesh_with(&mesh, &path, &options).unwrap();
            let reloaded = load_mesh(&path).unwrap();
            assert_same_geometry(&mesh, &reloaded, 1e-12);
        }
    }

    #[test]
    fn test_ply_polygons_are_fanned() {
        let file = temp_with(
            ".ply",
            "ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
1 1 0
0 1 0
4 0 1 2 3
",
        );
        let mesh = load_mesh(file.path()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.face(0), Some([0, 1, 2]));
        assert_eq!(mesh.face(1), Some([0, 2, 3]));
    }

    #[test]
    fn test_obj_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.obj");
        save_mesh(&unit_cube(), &path).unwrap();
        let reloaded = load_mesh(&path).unwrap();
        assert_eq!(reloaded.vertex_count(), 8);
        assert_eq!(reloaded.face_count(), 12);
        assert!(MeshAdjacency::build(&reloaded).is_closed_manifold());
        assert_relative_eq!(reloaded.signed_volume(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_obj_quad_triangulated() {
        let file = temp_with(
            ".obj",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
        );
        let mesh = load_mesh(file.path()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn test_off_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sphere.off");
        let mesh = sphere(2);
        save_mesh(&mesh, &path).unwrap();
        let reloaded = load_mesh(&path).unwrap();
        assert_same_geometry(&mesh, &reloaded, 0.0);
    }

    #[test]
    fn test_off_with_comments_colours_and_quads() {
        let file = temp_with(
            ".off",
            "OFF # header
# a unit square
4 1 0
0 0 0
1 0 0
1 1 0
0 1 0
4 0 1 2 3 255 0 0
",
        );
        let mesh = load_mesh(file.path()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn test_malformed_off() {
        for content in ["OFF\n3 1 0\n0 0 0\n1 0 0\n", "OFF\nx y z\n", "OFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n2 0 1\n"] {
            let file = temp_with(".off", content);
            let err = load_mesh(file.path()).unwrap_err();
            assert!(matches!(err, MeshError::ParseError { .. }), "{:?}", content);
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_off_header_counts_beyond_body_rejected() {
        for content in [
            "OFF\n100000000000000000 0 0\n",
            "OFF\n18446744073709551615 18446744073709551615 0\n0 0 0\n",
            "OFF\n3 5 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n",
        ] {
            let file = temp_with(".off", content);
            let err = load_mesh(file.path()).unwrap_err();
            assert!(matches!(err, MeshError::ParseError { .. }), "{:?}", content);
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let file = temp_with(".off", "OFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 7\n");
        let err = load_mesh(file.path()).unwrap_err();
        assert!(matches!(err, MeshError::InvalidVertexIndex { .. }));
    }

    #[test]
    fn test_save_writes_compacted_mesh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.off");
        let mut mesh = unit_cube();
        mesh.remove_face(2);
        mesh.remove_face(3);
        save_mesh(&mesh, &path).unwrap();

        let reloaded = load_mesh(&path).unwrap();
        assert_eq!(reloaded.face_count(), 10);
        assert_same_geometry(&open_cube(), &reloaded, 0.0);
    }

    #[test]
    fn test_explicit_format_overrides_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.dat");
        let options = SaveOptions {
            format: Some(MeshFormat::Stl),
            binary: true,
        };
        save_mesh_with(&unit_cube(), &path, &options).unwrap();
        let reloaded = load_mesh_as(&path, MeshFormat::Stl).unwrap();
        assert_eq!(reloaded.face_count(), 12);
    }
}
