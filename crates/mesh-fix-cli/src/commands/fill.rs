//! meshfix fill command - close boundary loops without the clean loop.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_fix::{SaveOptions, fill_boundaries_under, load_mesh, save_mesh_with, scan_boundaries};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct FillResult {
    input: String,
    output: String,
    loops_before: usize,
    loops_after: usize,
    filled: usize,
    skipped: usize,
    failed: Vec<FailedLoop>,
    triangles_added: usize,
    vertices_added: usize,
}

#[derive(Serialize)]
struct FailedLoop {
    index: usize,
    code: String,
    message: String,
}

pub fn run(
    input: &Path,
    output_path: &Path,
    max_hole_edges: usize,
    refine: bool,
    ascii: bool,
    cli: &Cli,
) -> Result<()> {
    let mut mesh =
        load_mesh(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let loops_before = scan_boundaries(&mesh).loop_count();
    let summary = fill_boundaries_under(&mut mesh, max_hole_edges, refine);
    let loops_after = scan_boundaries(&mesh).loop_count();

    let options = SaveOptions {
        format: None,
        binary: !ascii,
    };
    save_mesh_with(&mesh, output_path, &options)
        .with_context(|| format!("Failed to save mesh to {:?}", output_path))?;

    let result = FillResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        loops_before,
        loops_after,
        filled: summary.filled,
        skipped: summary.skipped,
        failed: summary
            .failed
            .iter()
            .map(|(index, err)| FailedLoop {
                index: *index,
                code: err.code().to_string(),
                message: err.to_string(),
            })
            .collect(),
        triangles_added: summary.triangles_added,
        vertices_added: summary.vertices_added,
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Filled mesh saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!(
                    "  {}: {} → {}",
                    "Boundary loops".cyan(),
                    result.loops_before,
                    result.loops_after
                );
                println!(
                    "  {}: {} ({} triangles, {} vertices)",
                    "Filled".green(),
                    result.filled,
                    result.triangles_added,
                    result.vertices_added
                );
                if result.skipped > 0 {
                    println!(
                        "  {}: {} over the edge limit",
                        "Skipped".yellow(),
                        result.skipped
                    );
                }
                for failed in &result.failed {
                    println!(
                        "  {}: loop #{} [{}] {}",
                        "Failed".red(),
                        failed.index,
                        failed.code,
                        failed.message
                    );
                }
            }
        }
    }

    Ok(())
}
