//! Output reporters for scan results
//!
//! Supports two output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON

mod json;
mod text;

use crate::pipeline::ScanReport;
use crate::quarantine::{ApplyOutcome, RestoreOutcome};
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Full scan summary
pub fn render_scan(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render_scan(report),
        OutputFormat::Json => json::render(report),
    }
}

/// Graph structure and surfaces
pub fn render_graph(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render_graph(report),
        OutputFormat::Json => json::render(&serde_json::json!({
            "graph": report.graph,
            "surfaces": report.surfaces,
            "surface_metrics": report.surface_metrics,
            "cross_edges": report.cross_edges,
        })),
    }
}

/// Quarantine plan
pub fn render_plan(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render_plan(&report.plan),
        OutputFormat::Json => json::render(&report.plan),
    }
}

pub fn render_apply(outcome: &ApplyOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render_apply(outcome),
        OutputFormat::Json => json::render(outcome),
    }
}

pub fn render_restore(outcome: &RestoreOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render_restore(outcome),
        OutputFormat::Json => json::render(outcome),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::EngineTargetConfig;
    use crate::evidence::EvidenceBundle;
    use crate::models::{Confidence, Evidence, FileRecord};
    use crate::pipeline::{Pipeline, ScanOptions};

    /// Scan a tiny in-memory repository
    pub(crate) fn test_report() -> ScanReport {
        let bundle = EvidenceBundle {
            files: vec![
                FileRecord::new("engine/main.py", Confidence::High)
                    .with_evidence(Evidence::RuntimeTrace),
                FileRecord::new("engine/core.py", Confidence::Med)
                    .with_evidence(Evidence::StaticImport),
                FileRecord::new("engine/stale.py", Confidence::Low),
                FileRecord::new("gui/view.py", Confidence::Med)
                    .with_evidence(Evidence::StaticImport),
                FileRecord::new("archive/engine_old.py", Confidence::Low),
            ],
            static_edges: vec![
                ("engine/main.py".to_string(), "engine/core.py".to_string()),
                ("gui/view.py".to_string(), "engine/core.py".to_string()),
            ],
            ..Default::default()
        };
        let dir = std::env::temp_dir();
        Pipeline::with_config(dir, EngineTargetConfig::default())
            .expect("valid config")
            .scan(bundle, &ScanOptions::default())
            .expect("scan")
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("sarif").is_err());
    }

    #[test]
    fn test_graph_json_sections() {
        let report = test_report();
        let out = render_graph(&report, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["graph"]["edge_count"], 2);
        assert_eq!(parsed["cross_edges"]["total"], 1);
        assert_eq!(parsed["cross_edges"]["by_pair"]["gui->engine"], 1);
    }
}
