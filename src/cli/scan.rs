//! Scan command and the views over its cached report

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::pipeline::{Pipeline, ScanOptions, ScanReport, TargetSpec};
use crate::reporters::{self, OutputFormat};
use crate::triangulate::TargetMode;

pub(super) struct ScanArgs {
    pub format: OutputFormat,
    pub target: String,
    pub max_k: Option<usize>,
    pub coverage_threshold: Option<f64>,
    pub target_mode: Option<TargetMode>,
    pub cache: bool,
    pub workers: usize,
}

pub(super) fn repo_root(path: &Path) -> Result<PathBuf> {
    let repo_path = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    if !repo_path.is_dir() {
        anyhow::bail!("Path is not a directory: {}", repo_path.display());
    }
    Ok(repo_path)
}

pub(super) fn run(path: &Path, evidence: &Path, args: ScanArgs) -> Result<()> {
    let repo_path = repo_root(path)?;
    let options = ScanOptions {
        target: args.target.parse::<TargetSpec>()?,
        max_k: args.max_k,
        coverage_threshold: args.coverage_threshold,
        target_mode: args.target_mode,
    };

    let pipeline = Pipeline::new(&repo_path)?.with_workers(args.workers);
    let report = pipeline.scan_file(evidence, &options)?;

    if args.cache {
        let cached = report.save_cached(&repo_path)?;
        info!("Saved scan report to {}", cached.display());
    }

    println!("{}", reporters::render_scan(&report, args.format)?);
    Ok(())
}

pub(super) fn show_graph(path: &Path, format: OutputFormat) -> Result<()> {
    let report = ScanReport::load_cached(&repo_root(path)?)?;
    println!("{}", reporters::render_graph(&report, format)?);
    Ok(())
}

pub(super) fn show_plan(path: &Path, format: OutputFormat) -> Result<()> {
    let report = ScanReport::load_cached(&repo_root(path)?)?;
    println!("{}", reporters::render_plan(&report, format)?);
    Ok(())
}
