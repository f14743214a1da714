//! Apply and restore commands

use anyhow::Result;
use console::style;
use std::path::Path;

use super::scan::repo_root;
use crate::pipeline::ScanReport;
use crate::quarantine::{parse_tiers, Quarantine};
use crate::reporters::{self, OutputFormat};

pub(super) fn apply(path: &Path, tier: &str, dry_run: bool, format: OutputFormat) -> Result<()> {
    let repo_path = repo_root(path)?;
    let tiers = parse_tiers(tier).map_err(anyhow::Error::msg)?;
    let report = ScanReport::load_cached(&repo_path)?;

    let quarantine = Quarantine::new(&repo_path);
    let outcome = quarantine.apply(&report.plan, &tiers, dry_run)?;
    println!("{}", reporters::render_apply(&outcome, format)?);
    if let Some(e) = &outcome.ledger_error {
        anyhow::bail!(
            "{} file(s) moved but the ledger was not written: {}",
            outcome.moved.len(),
            e.message
        );
    }

    if !dry_run && !outcome.moved.is_empty() && format == OutputFormat::Text {
        println!(
            "\nUndo with {}",
            style(format!("rie restore --count {}", outcome.moved.len())).cyan()
        );
    }
    Ok(())
}

pub(super) fn restore(path: &Path, count: Option<usize>, format: OutputFormat) -> Result<()> {
    let repo_path = repo_root(path)?;
    let quarantine = Quarantine::new(&repo_path);
    let outcome = quarantine.restore(count)?;
    println!("{}", reporters::render_restore(&outcome, format)?);
    Ok(())
}
