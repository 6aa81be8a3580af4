//! meshfix convert command - convert between mesh formats.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_fix::{MeshFormat, SaveOptions, load_mesh, save_mesh_with};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct ConvertResult {
    input: String,
    output: String,
    input_format: String,
    output_format: String,
    binary: bool,
    vertices: usize,
    faces: usize,
}

fn format_name(path: &Path) -> String {
    MeshFormat::from_path(path)
        .map(|f| f.extension().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn run(input: &Path, output_path: &Path, ascii: bool, cli: &Cli) -> Result<()> {
    let mesh = load_mesh(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let options = SaveOptions {
        format: None,
        binary: !ascii,
    };
    save_mesh_with(&mesh, output_path, &options)
        .with_context(|| format!("Failed to save mesh to {:?}", output_path))?;

    let binary = !ascii
        && MeshFormat::from_path(output_path).is_some_and(|f| f.supports_binary());
    let result = ConvertResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        input_format: format_name(input),
        output_format: format_name(output_path),
        binary,
        vertices: mesh.vertex_count(),
        faces: mesh.face_count(),
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Converted {} to {}", input.display(), output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!(
                    "  {}: {} → {}{}",
                    "Format".cyan(),
                    result.input_format.to_uppercase(),
                    result.output_format.to_uppercase(),
                    if result.binary { " (binary)" } else { "" }
                );
                println!(
                    "  {}: {} vertices, {} faces",
                    "Size".cyan(),
                    result.vertices,
                    result.faces
                );
            }
        }
    }

    Ok(())
}
