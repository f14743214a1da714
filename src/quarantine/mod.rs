//! Quarantine planning and reversible isolation
//!
//! Tiers:
//!   T0 (core)      - engine entrypoints and everything they reach. Never moved.
//!   T1 (periphery) - out-of-scope surfaces (gui/, tools/, excluded folders).
//!   T2 (shadow)    - archive/ and legacy-named files (`_old`, `_v2`, `.bak`).
//!   T3 (ghost)     - zero evidence of use.
//!
//! Planning in this module is pure. File moves live in [`mover`] and the
//! transaction log in [`ledger`].

pub mod ledger;
pub mod mover;

pub use ledger::{Ledger, LedgerEntry, LEDGER_VERSION};
pub use mover::{ApplyOutcome, PlannedMove, Quarantine, RestoreOutcome};

use crate::config::EngineTargetConfig;
use crate::graph::DependencyGraph;
use crate::models::{Confidence, Evidence, FileRecord, Status};
use crate::tagger::TaggedEntrypoint;
use crate::triangulate::ScopeFilter;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Quarantine risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    T0,
    T1,
    T2,
    T3,
}

impl Tier {
    pub const MOVABLE: [Tier; 3] = [Tier::T1, Tier::T2, Tier::T3];

    pub fn label(&self) -> &'static str {
        match self {
            Tier::T0 => "core",
            Tier::T1 => "periphery",
            Tier::T2 => "shadow",
            Tier::T3 => "ghost",
        }
    }

    /// Sub-directory of the quarantine directory for this tier
    pub fn dir_name(&self) -> &'static str {
        match self {
            Tier::T0 => "t0",
            Tier::T1 => "t1",
            Tier::T2 => "t2",
            Tier::T3 => "t3",
        }
    }

    pub fn is_movable(&self) -> bool {
        *self != Tier::T0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "t0" | "tier0" | "core" => Ok(Tier::T0),
            "t1" | "tier1" | "periphery" => Ok(Tier::T1),
            "t2" | "tier2" | "shadow" => Ok(Tier::T2),
            "t3" | "tier3" | "ghost" => Ok(Tier::T3),
            _ => Err(format!("Unknown tier: {}. Use t1, t2, t3 or all", s)),
        }
    }
}

/// Parse a tier list such as `t1,tier3` or `all`
pub fn parse_tiers(spec: &str) -> Result<Vec<Tier>, String> {
    let mut tiers = BTreeSet::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.eq_ignore_ascii_case("all") {
            tiers.extend(Tier::MOVABLE);
        } else {
            tiers.insert(part.parse::<Tier>()?);
        }
    }
    if tiers.is_empty() {
        return Err("No tiers specified".to_string());
    }
    Ok(tiers.into_iter().collect())
}

/// One file's tier assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRecord {
    pub file: String,
    pub tier: Tier,
    pub reason: String,
    pub confidence: Confidence,
    pub status: Status,
    pub evidence: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Folder-level inputs to the tier cascade
#[derive(Debug, Clone)]
pub struct TierPolicy {
    pub scopes: ScopeFilter,
    /// Lowercased top-level folders forced to periphery
    pub exclude: BTreeSet<String>,
    /// Lowercased default periphery folders
    pub periphery: BTreeSet<String>,
}

impl TierPolicy {
    pub fn new(scopes: ScopeFilter, config: &EngineTargetConfig) -> Self {
        Self {
            scopes,
            exclude: config.exclude.iter().map(|s| s.to_lowercase()).collect(),
            periphery: config.periphery_dirs().into_iter().collect(),
        }
    }
}

static SHADOW_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn shadow_patterns() -> &'static [Regex] {
    SHADOW_PATTERNS.get_or_init(|| {
        [
            r"(?i)_(?:old|backup|deprecated|legacy|bak|copy|orig)\.\w+$",
            r"(?i)_v\d+\.\w+$",
            r"(?i)\.bak$",
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

/// Legacy naming such as `engine_old.py`, `tool_v2.py` or `config.bak`
pub fn matches_shadow(path: &str) -> bool {
    shadow_patterns().iter().any(|re| re.is_match(path))
}

/// Forward closure of every eligible entrypoint. This is T0.
pub fn core_set(graph: &DependencyGraph, entrypoints: &[TaggedEntrypoint]) -> BTreeSet<String> {
    graph.reachable_from_all(
        entrypoints
            .iter()
            .filter(|e| e.eligible)
            .map(|e| e.path.as_str()),
    )
}

/// Run the tier cascade for one file; first matching rule wins
pub fn tier_file(file: &FileRecord, core: &BTreeSet<String>, policy: &TierPolicy) -> (Tier, String) {
    if core.contains(&file.path) {
        return (Tier::T0, "reachable from engine entrypoint".to_string());
    }

    let in_scope = policy.scopes.contains(&file.path);
    if in_scope && file.confidence == Confidence::High {
        return (Tier::T0, "in-scope + runtime traced".to_string());
    }
    if in_scope && file.is_active() && file.has_evidence() {
        return (Tier::T0, "in-scope + active with evidence".to_string());
    }

    let lower = file.path.to_lowercase();
    if lower.split('/').any(|part| part == "archive") || matches_shadow(&file.path) {
        return (Tier::T2, "archive or legacy pattern".to_string());
    }

    let top = lower.split('/').next().unwrap_or("");
    if policy.exclude.contains(top) {
        return (Tier::T1, format!("excluded by configuration ({top}/)"));
    }
    if lower.contains('/') && policy.periphery.contains(top) {
        return (Tier::T1, format!("periphery directory ({top}/)"));
    }
    if !in_scope {
        return (Tier::T1, "outside engine scope".to_string());
    }

    if !file.has_evidence() && !file.is_active() {
        return (
            Tier::T3,
            "zero evidence (no imports, no runtime, no text refs)".to_string(),
        );
    }

    (Tier::T0, "in-scope with partial evidence".to_string())
}

/// Counts shown with every plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_files: usize,
    pub t0_keep: usize,
    pub t1_move_low_risk: usize,
    pub t2_move_med_risk: usize,
    pub t3_move_zero_evidence: usize,
    pub total_movable: usize,
    pub engine_scopes: Vec<String>,
    pub core_entrypoints: Vec<String>,
}

/// Every file assigned to exactly one tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarantinePlan {
    pub t0_core: Vec<TierRecord>,
    pub t1_periphery: Vec<TierRecord>,
    pub t2_shadow: Vec<TierRecord>,
    pub t3_ghost: Vec<TierRecord>,
    pub summary: PlanSummary,
}

impl QuarantinePlan {
    pub fn tier(&self, tier: Tier) -> &[TierRecord] {
        match tier {
            Tier::T0 => &self.t0_core,
            Tier::T1 => &self.t1_periphery,
            Tier::T2 => &self.t2_shadow,
            Tier::T3 => &self.t3_ghost,
        }
    }

    /// Tier of a path, if the plan knows it
    pub fn tier_of(&self, path: &str) -> Option<Tier> {
        [Tier::T0, Tier::T1, Tier::T2, Tier::T3]
            .into_iter()
            .find(|t| self.tier(*t).iter().any(|r| r.file == path))
    }

    /// Files to move for the requested tiers, in tier then path order
    pub fn moves_for(&self, tiers: &[Tier]) -> Vec<PlannedMove> {
        let wanted: BTreeSet<Tier> = tiers.iter().copied().filter(Tier::is_movable).collect();
        wanted
            .into_iter()
            .flat_map(|tier| {
                self.tier(tier).iter().map(move |r| PlannedMove {
                    file: r.file.clone(),
                    tier,
                })
            })
            .collect()
    }
}

/// Tier every file.
///
/// `core_entrypoints` only feeds the summary; `core` must already hold the
/// closure computed by [`core_set`].
pub fn build_plan(
    files: &[FileRecord],
    core: &BTreeSet<String>,
    policy: &TierPolicy,
    core_entrypoints: Vec<String>,
) -> QuarantinePlan {
    let mut plan = QuarantinePlan::default();

    for file in files {
        let (tier, reason) = tier_file(file, core, policy);
        let record = TierRecord {
            file: file.path.clone(),
            tier,
            reason,
            confidence: file.confidence,
            status: file.status,
            evidence: file.evidence.iter().copied().collect(),
            domain: file.domain.clone(),
        };
        match tier {
            Tier::T0 => plan.t0_core.push(record),
            Tier::T1 => plan.t1_periphery.push(record),
            Tier::T2 => plan.t2_shadow.push(record),
            Tier::T3 => plan.t3_ghost.push(record),
        }
    }

    for list in [
        &mut plan.t0_core,
        &mut plan.t1_periphery,
        &mut plan.t2_shadow,
        &mut plan.t3_ghost,
    ] {
        list.sort_by(|a, b| a.file.cmp(&b.file));
    }

    let movable = plan.t1_periphery.len() + plan.t2_shadow.len() + plan.t3_ghost.len();
    plan.summary = PlanSummary {
        total_files: files.len(),
        t0_keep: plan.t0_core.len(),
        t1_move_low_risk: plan.t1_periphery.len(),
        t2_move_med_risk: plan.t2_shadow.len(),
        t3_move_zero_evidence: plan.t3_ghost.len(),
        total_movable: movable,
        engine_scopes: policy.scopes.scopes(),
        core_entrypoints,
    };
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineTargetConfig;
    use crate::models::Evidence;

    fn policy(scopes: &[&str]) -> TierPolicy {
        let scopes: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();
        TierPolicy::new(
            ScopeFilter::from_scopes(&scopes),
            &EngineTargetConfig {
                exclude: vec!["Blender".to_string()],
                ..Default::default()
            },
        )
    }

    fn tier(file: &FileRecord, core: &[&str], policy: &TierPolicy) -> Tier {
        let core: BTreeSet<String> = core.iter().map(|s| s.to_string()).collect();
        tier_file(file, &core, policy).0
    }

    #[test]
    fn test_archive_runtime_file_stays_core() {
        let file = FileRecord::new("archive/old_tool_v2.py", Confidence::High)
            .with_evidence(Evidence::RuntimeTrace);
        let p = policy(&["."]);
        assert_eq!(tier(&file, &[], &p), Tier::T0);
        assert_eq!(
            tier_file(&file, &BTreeSet::new(), &p).1,
            "in-scope + runtime traced"
        );

        let med = FileRecord::new("archive/old_tool_v2.py", Confidence::Med)
            .with_evidence(Evidence::StaticImport);
        assert_eq!(tier(&med, &[], &p), Tier::T0);

        // Core reachability wins even out of scope
        let scoped = policy(&["engine"]);
        assert_eq!(tier(&file, &["archive/old_tool_v2.py"], &scoped), Tier::T0);
        // Out of scope and not core: legacy naming applies
        assert_eq!(tier(&file, &[], &scoped), Tier::T2);
    }

    #[test]
    fn test_cascade_order() {
        let p = policy(&["engine"]);
        let dead = |path: &str| FileRecord::new(path, Confidence::Low);

        assert_eq!(tier(&dead("engine/core_old.py"), &[], &p), Tier::T2);
        assert_eq!(tier(&dead("engine/config.bak"), &[], &p), Tier::T2);
        assert_eq!(tier(&dead("blender/addon.py"), &[], &p), Tier::T1);
        assert_eq!(tier(&dead("gui/window.py"), &[], &p), Tier::T1);
        assert_eq!(tier(&dead("lab/probe.py"), &[], &p), Tier::T1);
        assert_eq!(tier(&dead("engine/unused.py"), &[], &p), Tier::T3);

        let partial = FileRecord::new("engine/partial.py", Confidence::LowMed)
            .with_evidence(Evidence::TextReference);
        assert_eq!(tier(&partial, &[], &p), Tier::T0);
    }

    #[test]
    fn test_unrestricted_scope_never_uses_outside_rule() {
        let p = policy(&["."]);
        let dead = FileRecord::new("lab/probe.py", Confidence::Low);
        assert_eq!(tier(&dead, &[], &p), Tier::T3);
    }

    #[test]
    fn test_root_level_file_named_like_periphery_folder() {
        let p = policy(&["."]);
        let file = FileRecord::new("tools", Confidence::Low);
        assert_eq!(tier(&file, &[], &p), Tier::T3);
    }

    #[test]
    fn test_shadow_patterns() {
        assert!(matches_shadow("engine/loader_v3.py"));
        assert!(matches_shadow("a/b_Backup.rs"));
        assert!(matches_shadow("settings.bak"));
        assert!(!matches_shadow("engine/version.py"));
        assert!(!matches_shadow("engine/vold.py"));
    }

    #[test]
    fn test_plan_partitions_files() {
        let files = vec![
            FileRecord::new("engine/main.py", Confidence::Med).with_evidence(Evidence::StaticImport),
            FileRecord::new("engine/dead.py", Confidence::Low),
            FileRecord::new("gui/app.py", Confidence::Med),
            FileRecord::new("archive/x.py", Confidence::Low),
            FileRecord::new("engine/b.py", Confidence::Low),
        ];
        let graph = DependencyGraph::build(
            &files,
            &[("engine/main.py".to_string(), "engine/b.py".to_string())],
            &[],
        );
        let core = graph.reachable_from_all(["engine/main.py"]);
        let plan = build_plan(&files, &core, &policy(&["engine"]), vec!["engine/main.py".into()]);

        let total = plan.t0_core.len()
            + plan.t1_periphery.len()
            + plan.t2_shadow.len()
            + plan.t3_ghost.len();
        assert_eq!(total, files.len());
        for f in &core {
            assert_eq!(plan.tier_of(f), Some(Tier::T0));
        }
        assert_eq!(plan.tier_of("engine/dead.py"), Some(Tier::T3));
        assert_eq!(plan.tier_of("gui/app.py"), Some(Tier::T1));
        assert_eq!(plan.tier_of("archive/x.py"), Some(Tier::T2));
        assert_eq!(plan.summary.total_movable, 3);
        assert_eq!(plan.summary.engine_scopes, vec!["engine".to_string()]);

        let moves = plan.moves_for(&[Tier::T3, Tier::T0, Tier::T1]);
        let files: Vec<(&str, Tier)> = moves.iter().map(|m| (m.file.as_str(), m.tier)).collect();
        assert_eq!(files, vec![("gui/app.py", Tier::T1), ("engine/dead.py", Tier::T3)]);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("tier1".parse::<Tier>().unwrap(), Tier::T1);
        assert_eq!("Ghost".parse::<Tier>().unwrap(), Tier::T3);
        assert!("t9".parse::<Tier>().is_err());
        assert_eq!(parse_tiers("t3, t1").unwrap(), vec![Tier::T1, Tier::T3]);
        assert_eq!(parse_tiers("all").unwrap(), Tier::MOVABLE.to_vec());
        assert!(parse_tiers(" , ").is_err());
    }
}
