//! meshfix info command - print diagnostics without touching the mesh.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_fix::{DiagnosticsOptions, MeshFormat, MeshReport, diagnose, load_mesh};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct MeshInfo {
    path: String,
    format: &'static str,
    watertight: bool,
    manifold: bool,
    clean: bool,
    #[serde(flatten)]
    report: MeshReport,
}

fn format_name(path: &Path) -> &'static str {
    match MeshFormat::from_path(path) {
        Some(format) => format.extension(),
        None => "unknown",
    }
}

pub fn run(input: &Path, list_loops: bool, list_intersections: bool, cli: &Cli) -> Result<()> {
    let mesh = load_mesh(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let options = DiagnosticsOptions {
        list_loops,
        list_intersections,
        ..Default::default()
    };
    let report = diagnose(&mesh, &options);

    let info = MeshInfo {
        path: input.display().to_string(),
        format: format_name(input),
        watertight: report.is_watertight(),
        manifold: report.is_manifold(),
        clean: report.is_clean(),
        report,
    };

    match cli.format {
        OutputFormat::Json => output::print(&info, cli.format, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                print_text(&info);
            }
        }
    }

    Ok(())
}

fn yes_no(flag: bool) -> String {
    if flag {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}

fn print_text(info: &MeshInfo) {
    let r = &info.report;
    println!("{}", "Mesh Information".bold().underline());
    println!("  {}: {}", "File".cyan(), info.path);
    println!("  {}: {}", "Format".cyan(), info.format.to_uppercase());
    println!("  {}: {}", "Vertices".cyan(), r.vertex_count);
    println!("  {}: {}", "Faces".cyan(), r.face_count);
    println!(
        "  {}: {} {:?}",
        "Components".cyan(),
        r.component_count,
        r.component_sizes
    );

    if let Some((min, max)) = r.bounds {
        println!(
            "  {}: {:.4} x {:.4} x {:.4}",
            "Dimensions".cyan(),
            max[0] - min[0],
            max[1] - min[1],
            max[2] - min[2]
        );
    }
    println!("  {}: {:.6}", "Surface area".cyan(), r.surface_area);
    println!("  {}: {:.6}", "Signed volume".cyan(), r.signed_volume);

    println!();
    println!("{}", "Defects".bold().underline());
    println!(
        "  {}: {} ({} edges)",
        "Boundary loops".cyan(),
        r.boundary_loop_count,
        r.boundary_edge_count
    );
    if let Some(loops) = &r.boundary_loops {
        for (i, vertices) in loops.iter().enumerate() {
            println!("    #{}: {:?}", i, vertices);
        }
    }
    if r.boundary_defect_count > 0 {
        println!(
            "  {}: {}",
            "Unclosed boundary walks".yellow(),
            r.boundary_defect_count
        );
    }
    println!(
        "  {}: {}",
        "Non-manifold edges".cyan(),
        r.non_manifold_edge_count
    );
    println!(
        "  {}: {}",
        "Intersecting faces".cyan(),
        r.intersecting_face_count
    );
    if let Some(faces) = &r.intersecting_faces {
        println!("    {:?}", faces);
    }
    println!(
        "  {}: {}",
        "Degenerate faces".cyan(),
        r.degenerate_face_count
    );
    println!("  {}: {}", "Duplicate faces".cyan(), r.duplicate_face_count);

    println!();
    println!("  {}: {}", "Watertight".cyan(), yes_no(info.watertight));
    println!("  {}: {}", "Manifold".cyan(), yes_no(info.manifold));
    println!("  {}: {}", "Clean".cyan(), yes_no(info.clean));
}
