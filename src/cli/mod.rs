//! CLI command definitions and handlers

mod init;
mod quarantine;
mod scan;

use crate::reporters::OutputFormat;
use crate::triangulate::TargetMode;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse a coverage threshold in 0..=1
fn parse_threshold(s: &str) -> Result<f64, String> {
    let t: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if (0.0..=1.0).contains(&t) {
        Ok(t)
    } else {
        Err("coverage threshold must be within 0 and 1".to_string())
    }
}

/// rie - repository integrity engine
#[derive(Parser, Debug)]
#[command(name = "rie")]
#[command(
    version,
    about = "Evidence graph, entrypoint triangulation and reversible quarantine for messy repositories",
    long_about = "rie builds a dependency graph from collected evidence, splits the repository \
into surfaces, finds the smallest set of entrypoints that reaches the live code, and plans \
which files can be moved out of the way.\n\n\
Every move is recorded in a ledger next to the repository and can be restored.",
    after_help = "\
Examples:
  rie scan evidence.json                 Scan and print a summary
  rie scan evidence.json --target engine Restrict to configured engine roots
  rie scan evidence.json --format json   Full report as JSON
  rie plan                               Show the last quarantine plan
  rie apply --tier t3 --dry-run          Preview zero-evidence moves
  rie apply --tier t2,t3                 Move shadow and ghost files
  rie restore --count 5                  Undo the five most recent moves"
)]
pub struct Cli {
    /// Path to repository (default: current directory)
    #[arg(long, short = 'C', global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64)
    #[arg(long, global = true, default_value = "8", value_parser = parse_workers)]
    pub workers: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an engine_target.toml template into the repository
    Init {
        /// Overwrite an existing engine_target.toml
        #[arg(long)]
        force: bool,
    },

    /// Build the evidence graph, triangulate entrypoints and plan quarantine
    #[command(after_help = "\
Targets:
  auto      Infer engine scopes from live files (default)
  global    Whole repository
  engine    include_roots from engine_target.toml, else the strongest scope
  <folder>  One explicit folder")]
    Scan {
        /// Evidence bundle produced by the collectors
        evidence: PathBuf,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text")]
        format: OutputFormat,

        /// Engine target: auto, global, engine, or a folder
        #[arg(long, default_value = "auto")]
        target: String,

        /// Maximum entrypoints to select
        #[arg(long = "k")]
        max_k: Option<usize>,

        /// Stop selecting once this fraction of the target is covered
        #[arg(long, value_parser = parse_threshold)]
        coverage_threshold: Option<f64>,

        /// Liveness target: active_or_runtime, active_only, runtime_only
        #[arg(long)]
        target_mode: Option<TargetMode>,

        /// Do not cache the report for later plan/apply
        #[arg(long)]
        no_cache: bool,
    },

    /// Show graph structure and surfaces from the last scan
    Graph {
        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text")]
        format: OutputFormat,
    },

    /// Show the quarantine plan from the last scan
    Plan {
        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text")]
        format: OutputFormat,
    },

    /// Move planned files into the quarantine directory
    #[command(after_help = "\
Tiers:
  t1  periphery (gui, tools, excluded folders)
  t2  shadow (archive/, *_old, *_v2, *.bak)
  t3  ghost (zero evidence)
  all t1 + t2 + t3

T0 (core) is never moved.")]
    Apply {
        /// Comma-separated tiers to move
        #[arg(long, default_value = "t3")]
        tier: String,

        /// List what would move without touching the filesystem
        #[arg(long)]
        dry_run: bool,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text")]
        format: OutputFormat,
    },

    /// Move quarantined files back, most recent first
    Restore {
        /// Number of moves to undo (default: all)
        #[arg(long)]
        count: Option<usize>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text")]
        format: OutputFormat,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { force } => init::run(&cli.path, force),

        Commands::Scan {
            evidence,
            format,
            target,
            max_k,
            coverage_threshold,
            target_mode,
            no_cache,
        } => scan::run(
            &cli.path,
            &evidence,
            scan::ScanArgs {
                format,
                target,
                max_k,
                coverage_threshold,
                target_mode,
                cache: !no_cache,
                workers: cli.workers,
            },
        ),

        Commands::Graph { format } => scan::show_graph(&cli.path, format),

        Commands::Plan { format } => scan::show_plan(&cli.path, format),

        Commands::Apply {
            tier,
            dry_run,
            format,
        } => quarantine::apply(&cli.path, &tier, dry_run, format),

        Commands::Restore { count, format } => quarantine::restore(&cli.path, count, format),
    }
}
