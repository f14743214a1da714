//! Init command - write an engine_target.toml template

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use super::scan::repo_root;
use crate::config::CONFIG_TEMPLATE;

/// Run the init command
pub fn run(path: &Path, force: bool) -> Result<()> {
    let repo_path = repo_root(path)?;
    let config_path = repo_path.join("engine_target.toml");

    if config_path.exists() && !force {
        println!(
            "{} Already initialized at {} (use --force to overwrite)",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    std::fs::write(&config_path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );

    println!("\nNext steps:");
    println!("  {} Declare surfaces and engine roots", style("edit engine_target.toml").cyan());
    println!("  {} Scan collected evidence", style("rie scan evidence.json").cyan());
    println!("  {} Preview zero-evidence moves", style("rie apply --tier t3 --dry-run").cyan());

    Ok(())
}
