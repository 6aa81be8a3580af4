//! meshfix repair command - run the full repair pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use mesh_fix::{
    JoinStage, RepairParams, RepairReport, SaveOptions, load_mesh, repair, save_mesh_with,
};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Args)]
pub struct RepairArgs {
    /// Input mesh file
    input: PathBuf,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Outer iterations of the clean loop
    #[arg(long)]
    max_iters: Option<usize>,

    /// Inner passes per outer iteration
    #[arg(long)]
    inner_loops: Option<usize>,

    /// Bridge nearby components
    #[arg(long)]
    join: bool,

    /// When to bridge components; implies --join
    #[arg(long, value_enum)]
    join_stage: Option<JoinStageArg>,

    /// Keep every connected component
    #[arg(long, conflicts_with = "keep")]
    keep_all: bool,

    /// Keep this many of the largest components
    #[arg(long)]
    keep: Option<usize>,

    /// Only fill loops with fewer edges than this (0 fills all)
    #[arg(long)]
    max_hole_edges: Option<usize>,

    /// Keep the coarse patch triangulation
    #[arg(long)]
    no_refine: bool,

    /// Use ASCII encoding when available (STL, PLY)
    #[arg(long)]
    ascii: bool,

    /// JSON file with repair parameters; other flags override it
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum JoinStageArg {
    /// Join before the clean loop
    Before,
    /// Join after the clean loop, then fill and clean again
    After,
}

impl From<JoinStageArg> for JoinStage {
    fn from(stage: JoinStageArg) -> Self {
        match stage {
            JoinStageArg::Before => JoinStage::BeforeClean,
            JoinStageArg::After => JoinStage::AfterClean,
        }
    }
}

#[derive(Serialize)]
struct RepairOutput {
    input: String,
    output: String,
    clean: bool,
    watertight: bool,
    report: RepairReport,
}

fn load_params(path: &Path) -> Result<RepairParams> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid repair config in {:?}", path))
}

impl RepairArgs {
    fn params(&self) -> Result<RepairParams> {
        let mut params = match &self.config {
            Some(path) => load_params(path)?,
            None => RepairParams::default(),
        };

        if let Some(max_iters) = self.max_iters {
            params.max_iters = max_iters;
        }
        if let Some(inner_loops) = self.inner_loops {
            params.inner_loops = inner_loops;
        }
        if self.join {
            params.join_components = true;
        }
        if let Some(stage) = self.join_stage {
            params.join_components = true;
            params.join_stage = stage.into();
        }
        if self.keep_all {
            params.remove_smallest_components = false;
        }
        if let Some(keep) = self.keep {
            params.remove_smallest_components = true;
            params.keep_components = keep;
        }
        if let Some(max_edges) = self.max_hole_edges {
            params.max_hole_edges = max_edges;
        }
        if self.no_refine {
            params.refine = false;
        }
        Ok(params)
    }
}

/// Returns whether the repair reached a clean fixed point.
pub fn run(args: &RepairArgs, cli: &Cli) -> Result<bool> {
    let params = args.params()?;
    let mut mesh = load_mesh(&args.input)
        .with_context(|| format!("Failed to load mesh from {:?}", args.input))?;

    let report = repair(&mut mesh, &params)?;

    let options = SaveOptions {
        format: None,
        binary: !args.ascii,
    };
    save_mesh_with(&mesh, &args.output, &options)
        .with_context(|| format!("Failed to save repaired mesh to {:?}", args.output))?;

    let clean = report.is_clean();
    let result = RepairOutput {
        input: args.input.display().to_string(),
        output: args.output.display().to_string(),
        clean,
        watertight: report.is_watertight(),
        report,
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                print_text(&result, cli);
            }
        }
    }

    Ok(clean)
}

fn print_text(result: &RepairOutput, cli: &Cli) {
    let report = &result.report;
    if result.clean {
        output::success(
            &format!("Repaired mesh saved to {}", result.output),
            cli.format,
            cli.quiet,
        );
    } else {
        output::warning(
            &format!(
                "Repair incomplete with {} defect(s) left; partial result saved to {}",
                report.residual_defects(),
                result.output
            ),
            cli.format,
            cli.quiet,
        );
    }

    println!(
        "  {}: {} → {} vertices",
        "Vertices".cyan(),
        report.initial_vertices,
        report.final_vertices
    );
    println!(
        "  {}: {} → {} faces",
        "Faces".cyan(),
        report.initial_faces,
        report.final_faces
    );
    if report.orientation.flipped > 0 {
        println!(
            "  {}: {} faces flipped",
            "Orientation".green(),
            report.orientation.flipped
        );
    }
    if report.components_removed > 0 {
        println!(
            "  {}: {} small components removed",
            "Components".green(),
            report.components_removed
        );
    }
    if report.join.joins > 0 {
        println!("  {}: {} bridges built", "Joins".green(), report.join.joins);
    }
    if report.holes_filled > 0 {
        println!(
            "  {}: {} holes filled ({} triangles)",
            "Holes".green(),
            report.holes_filled,
            report.fill_triangles_added
        );
    }
    if report.holes_skipped > 0 || report.holes_failed > 0 {
        println!(
            "  {}: {} skipped, {} failed",
            "Open holes".yellow(),
            report.holes_skipped,
            report.holes_failed
        );
    }
    let degeneracies = report.clean.degeneracies.faces_removed();
    if degeneracies > 0 {
        println!(
            "  {}: {} degenerate faces removed",
            "Cleanup".green(),
            degeneracies
        );
    }
    if report.clean.faces_retriangulated > 0 {
        println!(
            "  {}: {} faces re-triangulated",
            "Intersections".green(),
            report.clean.faces_retriangulated
        );
    }
    println!(
        "  {}: {}",
        "Watertight".cyan(),
        if result.watertight { "yes" } else { "no" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RepairArgs,
    }

    fn params_for(argv: &[&str]) -> RepairParams {
        let argv = ["meshfix", "in.stl", "-o", "out.stl"].iter().chain(argv).copied();
        Harness::parse_from(argv).args.params().unwrap()
    }

    #[test]
    fn test_join_stage_implies_join() {
        let params = params_for(&["--join-stage", "after"]);
        assert!(params.join_components);
        assert_eq!(params.join_stage, JoinStage::AfterClean);

        let params = params_for(&["--join"]);
        assert!(params.join_components);
        assert_eq!(params.join_stage, JoinStage::BeforeClean);

        let params = params_for(&[]);
        assert!(!params.join_components);
    }

    #[test]
    fn test_overrides_apply() {
        let params = params_for(&["--keep-all", "--max-hole-edges", "12", "--no-refine"]);
        assert!(!params.remove_smallest_components);
        assert_eq!(params.max_hole_edges, 12);
        assert!(!params.refine);
    }
}
