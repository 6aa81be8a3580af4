//! meshfix: command-line front end for the mesh-fix repair engine.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_fix=info` - Stage progress
//! - `RUST_LOG=mesh_fix=debug` - Per-pass detail
//! - `RUST_LOG=mesh_fix::timing=debug` - Performance timing
//!
//! # Exit Status
//!
//! `0` on success, `1` on error, `2` when a repair ran out of iterations
//! before reaching a clean mesh (the output is still written).
//!
//! # Example
//!
//! ```bash
//! meshfix repair scan.stl -o fixed.stl --join
//! RUST_LOG=debug meshfix info fixed.stl --list-loops
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{convert, fill, info, repair};

/// meshfix - Repair triangle meshes into closed, oriented 2-manifolds.
#[derive(Parser)]
#[command(name = "meshfix")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full repair pipeline
    Repair(repair::RepairArgs),

    /// Print diagnostics without modifying the mesh
    Info {
        /// Input mesh file
        input: PathBuf,

        /// List the vertices of every boundary loop
        #[arg(long)]
        list_loops: bool,

        /// List the indices of self-intersecting faces
        #[arg(long)]
        list_intersections: bool,
    },

    /// Fill boundary loops only
    Fill {
        /// Input mesh file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Only fill loops with fewer edges than this (0 fills all)
        #[arg(long, default_value = "0")]
        max_hole_edges: usize,

        /// Keep the coarse patch triangulation
        #[arg(long)]
        no_refine: bool,

        /// Use ASCII encoding when available (STL, PLY)
        #[arg(long)]
        ascii: bool,
    },

    /// Convert a mesh between formats
    Convert {
        /// Input mesh file
        input: PathBuf,

        /// Output file path (format determined by extension)
        #[arg(short, long)]
        output: PathBuf,

        /// Use ASCII encoding when available (STL, PLY)
        #[arg(long)]
        ascii: bool,
    },
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "mesh_fix=info",
            2 => "mesh_fix=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn report_error(e: &anyhow::Error) {
    if let Some(mesh_err) = e.downcast_ref::<mesh_fix::MeshError>() {
        eprintln!("{}: {}", "Error".red().bold(), mesh_err);
        eprintln!("  {}: {}", "Code".cyan(), mesh_err.code());
        eprintln!(
            "  {}: {}",
            "Suggestion".green(),
            mesh_err.recovery_suggestion()
        );
        if let Some(location) = mesh_err.location() {
            eprintln!("  {}: {}", "Location".yellow(), location);
        }
    } else {
        eprintln!("{}: {}", "Error".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {}: {}", "Caused by".yellow(), cause);
        }
    }
}

fn main() -> ExitCode {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result: Result<ExitCode> = match &cli.command {
        Commands::Repair(args) => repair::run(args, &cli).map(|clean| {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }),
        Commands::Info {
            input,
            list_loops,
            list_intersections,
        } => info::run(input, *list_loops, *list_intersections, &cli).map(|()| ExitCode::SUCCESS),
        Commands::Fill {
            input,
            output,
            max_hole_edges,
            no_refine,
            ascii,
        } => fill::run(input, output, *max_hole_edges, !*no_refine, *ascii, &cli)
            .map(|()| ExitCode::SUCCESS),
        Commands::Convert {
            input,
            output,
            ascii,
        } => convert::run(input, output, *ascii, &cli).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            if !cli.quiet {
                report_error(&e);
            }
            ExitCode::FAILURE
        }
    }
}
