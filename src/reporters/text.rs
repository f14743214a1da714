//! Text (terminal) reporter with colors and formatting

use crate::pipeline::ScanReport;
use crate::quarantine::{ApplyOutcome, QuarantinePlan, RestoreOutcome, Tier};
use crate::tagger::Role;
use anyhow::Result;
use std::fmt::Write;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

const RULE: &str = "──────────────────────────────────────";
/// Rows shown per list before eliding
const LIST_LIMIT: usize = 10;

fn tier_color(tier: Tier) -> &'static str {
    match tier {
        Tier::T0 => GREEN,
        Tier::T1 => CYAN,
        Tier::T2 => YELLOW,
        Tier::T3 => RED,
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Boot => "boot",
        Role::CoreDriver => "driver",
        Role::CliTool => "cli",
        Role::TestHarness => "test",
    }
}

fn pct(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Render a full scan as terminal output
pub fn render_scan(report: &ScanReport) -> Result<String> {
    let mut out = String::new();
    let meta = &report.metadata;

    writeln!(out, "\n{BOLD}Repository Integrity Scan{RESET}")?;
    writeln!(out, "{DIM}{RULE}{RESET}")?;
    writeln!(
        out,
        "Files: {}  Edges: {}  Surfaces: {}  Target: {}",
        report.graph.node_count,
        report.graph.edge_count,
        report.surfaces.surfaces.len(),
        meta.target
    )?;
    writeln!(
        out,
        "Engine scopes: {BOLD}{}{RESET} {DIM}({:?} confidence){RESET}",
        meta.engine_scopes.join(", "),
        meta.scope_confidence
    )?;
    if meta.trace.attempted > 0 {
        let color = if meta.trace.partial { YELLOW } else { GREEN };
        writeln!(
            out,
            "Trace: {color}{}{RESET} complete ({} of {} timed out, {} sandbox violations)",
            pct(meta.trace.completeness),
            meta.trace.timed_out,
            meta.trace.attempted,
            meta.trace.violations
        )?;
    }
    if !report.graph.diagnostics.undeclared.is_empty() {
        writeln!(
            out,
            "{YELLOW}{} edge endpoint(s) not declared as files{RESET}",
            report.graph.diagnostics.undeclared.len()
        )?;
    }
    out.push('\n');

    // Triangulation
    let sel = &report.triangulation.selection;
    writeln!(
        out,
        "{BOLD}ENTRYPOINTS{RESET} ({} selected, {} of {} target files covered, {})",
        sel.selected.len(),
        sel.covered,
        sel.target_size,
        pct(sel.coverage_ratio)
    )?;
    for (i, s) in sel.selected.iter().enumerate() {
        writeln!(
            out,
            "  {:>2}. {:<48} +{:<4} {DIM}{}{RESET}",
            i + 1,
            s.path,
            s.marginal_gain,
            pct(s.cumulative_ratio)
        )?;
    }
    out.push('\n');

    // Engine
    let engine = &report.engine;
    match &engine.primary_scope {
        Some(scope) => writeln!(out, "{BOLD}PRIMARY ENGINE{RESET} {GREEN}{scope}{RESET}")?,
        None => writeln!(out, "{BOLD}PRIMARY ENGINE{RESET} {YELLOW}none found{RESET}")?,
    }
    for c in engine
        .candidates
        .iter()
        .filter(|c| Some(&c.scope) == engine.primary_scope.as_ref())
        .take(LIST_LIMIT)
    {
        writeln!(
            out,
            "  {:<50} {:<7} {:.3}",
            c.path,
            role_label(c.role),
            c.score
        )?;
    }
    for g in &engine.other_scopes {
        writeln!(
            out,
            "  {DIM}also: {} ({} entrypoint(s), score {:.3}){RESET}",
            g.scope,
            g.entrypoints.len(),
            g.score
        )?;
    }
    if !engine.tools.is_empty() {
        writeln!(out, "  {DIM}tools: {}{RESET}", engine.tools.join(", "))?;
    }
    out.push('\n');

    // Cross-surface
    let cross = &report.cross_edges;
    if cross.total > 0 {
        let color = if cross.unauthorized > 0 { RED } else { GREEN };
        writeln!(
            out,
            "{BOLD}CROSS-SURFACE{RESET} {} edge(s), {color}{} unauthorized{RESET}",
            cross.total, cross.unauthorized
        )?;
        for (pair, count) in &cross.by_pair {
            writeln!(out, "  {pair:<30} {count}")?;
        }
        out.push('\n');
    }

    out.push_str(&render_plan(&report.plan)?);
    Ok(out)
}

/// Render graph classification and per-surface metrics
pub fn render_graph(report: &ScanReport) -> Result<String> {
    let mut out = String::new();
    let class = &report.graph.classification;
    let diag = &report.graph.diagnostics;

    writeln!(out, "\n{BOLD}Dependency Graph{RESET}")?;
    writeln!(out, "{DIM}{RULE}{RESET}")?;
    writeln!(
        out,
        "Nodes: {}  Edges: {} ({} static, {} dynamic)",
        report.graph.node_count, report.graph.edge_count, diag.static_edges, diag.dynamic_edges
    )?;
    writeln!(
        out,
        "Roots: {}  Leaves: {}  Connectors: {}",
        class.roots.len(),
        class.leaves.len(),
        class.connectors.len()
    )?;
    if diag.self_edges_dropped > 0 {
        writeln!(out, "{DIM}{} self edge(s) dropped{RESET}", diag.self_edges_dropped)?;
    }
    for path in diag.undeclared.iter().take(LIST_LIMIT) {
        writeln!(out, "  {YELLOW}undeclared{RESET} {path}")?;
    }
    out.push('\n');

    writeln!(out, "{BOLD}SURFACES{RESET}")?;
    writeln!(
        out,
        "{DIM}  {:<24} {:>6} {:>6} {:>7} {:>8} {:>9}{RESET}",
        "ID", "FILES", "ACTIVE", "EDGES", "OUT", "COVERAGE"
    )?;
    for (id, m) in &report.surface_metrics {
        writeln!(
            out,
            "  {:<24} {:>6} {:>6} {:>7} {:>8} {:>9}",
            id,
            m.file_count,
            m.active,
            m.internal_edges,
            m.cross_edges_out,
            pct(m.coverage)
        )?;
    }
    writeln!(
        out,
        "{DIM}  {} file(s) outside every surface root{RESET}",
        report.surfaces.unassigned_count
    )?;
    Ok(out)
}

/// Render the tier breakdown
pub fn render_plan(plan: &QuarantinePlan) -> Result<String> {
    let mut out = String::new();
    let s = &plan.summary;

    writeln!(
        out,
        "{BOLD}QUARANTINE PLAN{RESET} ({} files, {} movable)",
        s.total_files, s.total_movable
    )?;
    for tier in [Tier::T0, Tier::T1, Tier::T2, Tier::T3] {
        let records = plan.tier(tier);
        let color = tier_color(tier);
        writeln!(
            out,
            "  {color}{BOLD}{}{RESET} {:<28} {}",
            tier,
            tier.label(),
            records.len()
        )?;
        if tier == Tier::T0 {
            continue;
        }
        for r in records.iter().take(LIST_LIMIT) {
            writeln!(out, "      {:<48} {DIM}{}{RESET}", r.file, r.reason)?;
        }
        if records.len() > LIST_LIMIT {
            writeln!(out, "      {DIM}... {} more{RESET}", records.len() - LIST_LIMIT)?;
        }
    }
    Ok(out)
}

pub fn render_apply(outcome: &ApplyOutcome) -> Result<String> {
    let mut out = String::new();
    let tiers: Vec<String> = outcome.tiers.iter().map(|t| t.to_string()).collect();

    if outcome.dry_run {
        writeln!(
            out,
            "{BOLD}Dry run{RESET} ({}): {} file(s) would move",
            tiers.join(", "),
            outcome.would_move.len()
        )?;
        for m in outcome.would_move.iter().take(LIST_LIMIT * 2) {
            writeln!(out, "  {}{}{RESET} {}", tier_color(m.tier), m.tier, m.file)?;
        }
        return Ok(out);
    }

    writeln!(
        out,
        "{GREEN}Moved {} file(s){RESET} ({}), {} skipped, {} error(s)",
        outcome.moved.len(),
        tiers.join(", "),
        outcome.skipped.len(),
        outcome.errors.len()
    )?;
    for e in &outcome.errors {
        writeln!(out, "  {RED}{:?}{RESET} {} {DIM}{}{RESET}", e.kind, e.file, e.message)?;
    }
    if outcome.removed_dirs > 0 {
        writeln!(out, "{DIM}Removed {} empty director(ies){RESET}", outcome.removed_dirs)?;
    }
    if let Some(e) = &outcome.ledger_error {
        writeln!(
            out,
            "{RED}Ledger not written:{RESET} {} {DIM}(files above cannot be restored automatically){RESET}",
            e.message
        )?;
    } else if !outcome.moved.is_empty() {
        writeln!(out, "{DIM}Ledger: {}{RESET}", outcome.ledger_path.display())?;
    }
    Ok(out)
}

pub fn render_restore(outcome: &RestoreOutcome) -> Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "{GREEN}Restored {} file(s){RESET}, {} error(s), {} still quarantined",
        outcome.restored.len(),
        outcome.errors.len(),
        outcome.remaining
    )?;
    for e in &outcome.errors {
        writeln!(out, "  {RED}{:?}{RESET} {} {DIM}{}{RESET}", e.kind, e.file, e.message)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_scan_text_sections() {
        let out = render_scan(&test_report()).unwrap();
        assert!(out.contains("Repository Integrity Scan"));
        assert!(out.contains("ENTRYPOINTS"));
        assert!(out.contains("PRIMARY ENGINE"));
        assert!(out.contains("CROSS-SURFACE"));
        assert!(out.contains("gui->engine"));
        assert!(out.contains("QUARANTINE PLAN"));
    }

    #[test]
    fn test_plan_lists_movable_files() {
        let report = test_report();
        let out = render_plan(&report.plan).unwrap();
        assert!(out.contains("archive/engine_old.py"));
        assert!(out.contains("engine/stale.py"));
    }

    #[test]
    fn test_graph_text() {
        let out = render_graph(&test_report()).unwrap();
        assert!(out.contains("Nodes: 5"));
        assert!(out.contains("SURFACES"));
    }

    #[test]
    fn test_dry_run_text() {
        let outcome = ApplyOutcome {
            dry_run: true,
            tiers: vec![Tier::T3],
            would_move: vec![crate::quarantine::PlannedMove {
                file: "engine/stale.py".to_string(),
                tier: Tier::T3,
            }],
            ..Default::default()
        };
        let out = render_apply(&outcome).unwrap();
        assert!(out.contains("Dry run"));
        assert!(out.contains("engine/stale.py"));
    }

    #[test]
    fn test_ledger_failure_is_shown() {
        use crate::error::{FileError, FileErrorKind};

        let outcome = ApplyOutcome {
            tiers: vec![Tier::T3],
            moved: vec!["engine/stale.py".to_string()],
            ledger_error: Some(FileError {
                file: "/q/quarantine_ledger.json".to_string(),
                kind: FileErrorKind::Io,
                message: "IO error: Is a directory".to_string(),
            }),
            ..Default::default()
        };
        let out = render_apply(&outcome).unwrap();
        assert!(out.contains("Ledger not written"));
        assert!(!out.contains("Ledger: "));
    }
}
