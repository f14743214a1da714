//! Scan pipeline
//!
//! Orchestrates one full integrity scan:
//! 1. Load configuration and the evidence bundle
//! 2. Build the dependency graph
//! 3. Resolve surfaces and classify cross-surface edges
//! 4. Resolve engine scopes for the requested target
//! 5. Triangulate entrypoints and tag them
//! 6. Gate primary engine candidates
//! 7. Build the quarantine plan

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::{load_engine_target, EngineTargetConfig, SourceFilter};
use crate::evidence::{EvidenceBundle, TraceSummary};
use crate::graph::{DependencyGraph, GraphDiagnostics, GraphExport, RootClassification};
use crate::models::FileRecord;
use crate::paths;
use crate::quarantine::{build_plan, core_set, QuarantinePlan, TierPolicy};
use crate::surface::{
    infer_scopes, CrossEdge, ScopeConfidence, ScopeInference, SurfaceDetection, SurfaceMetrics,
    SurfaceResolver,
};
use crate::tagger::{EntryTagger, FsInspector, Intent, Role, TaggedEntrypoint};
use crate::triangulate::{ScopeFilter, TargetMode, TriangulationResult, Triangulator};

/// Path prefixes that can never hold a primary engine entrypoint
const ENGINE_DENY_DIRS: &[&str] = &["tests/", "test/", "archive/", "docs/", "doc/", "__pycache__/"];

/// Which part of the repository counts as the engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetSpec {
    /// Scopes inferred from where the live files are
    #[default]
    Auto,
    /// The whole repository
    Global,
    /// Configured `include_roots`, else the strongest inferred scope
    Engine,
    /// One explicit folder
    Path(String),
}

impl FromStr for TargetSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "auto" => Ok(TargetSpec::Auto),
            "global" | "." | "./" => Ok(TargetSpec::Global),
            "engine" => Ok(TargetSpec::Engine),
            _ => {
                let path = trimmed
                    .replace('\\', "/")
                    .trim_start_matches("./")
                    .trim_end_matches('/')
                    .to_string();
                if path.is_empty() {
                    anyhow::bail!("Invalid target '{}'", s);
                }
                Ok(TargetSpec::Path(path))
            }
        }
    }
}

impl std::fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetSpec::Auto => write!(f, "auto"),
            TargetSpec::Global => write!(f, "global"),
            TargetSpec::Engine => write!(f, "engine"),
            TargetSpec::Path(p) => write!(f, "{p}"),
        }
    }
}

/// Turn a target into engine scopes
pub fn resolve_target(
    target: &TargetSpec,
    config: &EngineTargetConfig,
    files: &[FileRecord],
) -> ScopeInference {
    match target {
        TargetSpec::Global => ScopeInference {
            engine_scopes: vec![".".to_string()],
            confidence: ScopeConfidence::High,
        },
        TargetSpec::Path(p) => ScopeInference {
            engine_scopes: vec![p.clone()],
            confidence: ScopeConfidence::High,
        },
        TargetSpec::Engine if !config.include_roots.is_empty() => ScopeInference {
            engine_scopes: config
                .include_roots
                .iter()
                .map(|r| r.trim_end_matches('/').to_string())
                .collect(),
            confidence: ScopeConfidence::High,
        },
        TargetSpec::Engine => {
            let mut inferred = infer_scopes(files);
            inferred.engine_scopes.truncate(1);
            inferred
        }
        TargetSpec::Auto => infer_scopes(files),
    }
}

/// Command-line overrides for one scan
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub target: TargetSpec,
    pub max_k: Option<usize>,
    pub coverage_threshold: Option<f64>,
    pub target_mode: Option<TargetMode>,
}

impl ScanOptions {
    fn apply_to(&self, config: &mut EngineTargetConfig) {
        if let Some(k) = self.max_k {
            config.triangulation.max_k = k;
        }
        if let Some(t) = self.coverage_threshold {
            config.triangulation.coverage_threshold = t;
        }
        if let Some(mode) = self.target_mode {
            config.triangulation.target_mode = mode;
        }
    }
}

/// A gated engine entrypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineCandidate {
    pub path: String,
    pub scope: String,
    pub role: Role,
    pub score: f64,
}

/// Engine candidates grouped by the scope holding them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeGroup {
    pub scope: String,
    /// Sum of the members' composite scores
    pub score: f64,
    pub entrypoints: Vec<String>,
}

/// Primary engine recommendation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSummary {
    pub primary_scope: Option<String>,
    /// Every gated candidate, best score first
    pub candidates: Vec<EngineCandidate>,
    /// Remaining scope groups, best first
    pub other_scopes: Vec<ScopeGroup>,
    /// Non-test candidates that look like utilities or sit outside scope
    pub tools: Vec<String>,
}

impl EngineSummary {
    /// Entrypoints of the primary scope
    pub fn primary_entrypoints(&self) -> Vec<&str> {
        match &self.primary_scope {
            Some(scope) => self
                .candidates
                .iter()
                .filter(|c| &c.scope == scope)
                .map(|c| c.path.as_str())
                .collect(),
            None => Vec::new(),
        }
    }
}

fn is_test_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or("");
    lower.contains("/test_") || name.starts_with("test_")
}

fn is_engine_denied(path: &str) -> bool {
    let lower = path.to_lowercase();
    ENGINE_DENY_DIRS
        .iter()
        .any(|d| lower.starts_with(d) || lower.contains(&format!("/{d}")))
        || is_test_file(path)
}

fn passes_engine_gate(entry: &TaggedEntrypoint, scopes: &ScopeFilter) -> bool {
    entry.in_scope
        && scopes.contains(&entry.path)
        && !is_engine_denied(&entry.path)
        && entry.eligible
        && entry.intent == Intent::Runtime
        && entry.role.is_engine_role()
}

/// Hard-gate tagged entrypoints into primary engine candidates and group
/// them by scope. Groups are ranked by summed composite score.
pub fn gate_engine(tagged: &[TaggedEntrypoint], scopes: &ScopeFilter) -> EngineSummary {
    let mut candidates: Vec<EngineCandidate> = tagged
        .iter()
        .filter(|e| passes_engine_gate(e, scopes))
        .map(|e| EngineCandidate {
            path: e.path.clone(),
            scope: scopes.matching_scope(&e.path).unwrap_or(".").to_string(),
            role: e.role,
            score: e.score,
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut groups: BTreeMap<&str, ScopeGroup> = BTreeMap::new();
    for c in &candidates {
        let group = groups.entry(c.scope.as_str()).or_insert_with(|| ScopeGroup {
            scope: c.scope.clone(),
            score: 0.0,
            entrypoints: Vec::new(),
        });
        group.score += c.score;
        group.entrypoints.push(c.path.clone());
    }
    let mut ranked_groups: Vec<ScopeGroup> = groups
        .into_values()
        .map(|mut g| {
            g.score = (g.score * 10_000.0).round() / 10_000.0;
            g
        })
        .collect();
    ranked_groups.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.scope.cmp(&b.scope))
    });

    let primary_scope = ranked_groups.first().map(|g| g.scope.clone());
    let other_scopes = ranked_groups.into_iter().skip(1).collect();

    let tools = tagged
        .iter()
        .filter(|e| !candidates.iter().any(|c| c.path == e.path))
        .filter(|e| e.role != Role::TestHarness && !is_test_file(&e.path))
        .filter(|e| matches!(e.intent, Intent::Tools | Intent::Gui) || !e.in_scope)
        .map(|e| e.path.clone())
        .collect();

    EngineSummary {
        primary_scope,
        candidates,
        other_scopes,
        tools,
    }
}

/// Run identity and inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub repo_root: PathBuf,
    pub target: String,
    /// Short SHA-256 of the effective configuration
    pub config_hash: String,
    pub engine_scopes: Vec<String>,
    pub scope_confidence: ScopeConfidence,
    pub trace: TraceSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSection {
    pub node_count: usize,
    pub edge_count: usize,
    pub classification: RootClassification,
    pub diagnostics: GraphDiagnostics,
    pub export: GraphExport,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossEdgeSummary {
    pub intra: usize,
    pub total: usize,
    pub unauthorized: usize,
    /// Edge counts keyed `"from->to"`
    pub by_pair: BTreeMap<String, usize>,
    pub edges: Vec<CrossEdge>,
}

/// Everything one scan produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub metadata: ScanMetadata,
    pub graph: GraphSection,
    pub surfaces: SurfaceDetection,
    pub surface_metrics: BTreeMap<String, SurfaceMetrics>,
    pub cross_edges: CrossEdgeSummary,
    pub triangulation: TriangulationResult,
    pub entrypoints: Vec<TaggedEntrypoint>,
    pub engine: EngineSummary,
    pub plan: QuarantinePlan,
}

impl ScanReport {
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write scan report {}", path.display()))?;
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scan report {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scan report {}", path.display()))
    }

    /// Cache as the repository's last scan
    pub fn save_cached(&self, repo_root: &Path) -> Result<PathBuf> {
        paths::ensure_cache_dir(repo_root)
            .context("Failed to create cache directory")?;
        let path = paths::get_last_scan_path(repo_root);
        self.save_to(&path)?;
        debug!("Cached scan report at {}", path.display());
        Ok(path)
    }

    /// Last cached scan of the repository
    pub fn load_cached(repo_root: &Path) -> Result<Self> {
        let path = paths::get_last_scan_path(repo_root);
        if !path.exists() {
            anyhow::bail!("No scan results found. Run 'rie scan <evidence.json>' first.");
        }
        Self::load_from(&path)
    }
}

fn config_hash(config: &EngineTargetConfig) -> Result<String> {
    let json = serde_json::to_string(config).context("Failed to serialize configuration")?;
    let digest = Sha256::digest(json.as_bytes());
    Ok(digest.iter().take(8).map(|b| format!("{b:02x}")).collect())
}

/// Full scan pipeline over one repository.
pub struct Pipeline {
    repo_root: PathBuf,
    config: EngineTargetConfig,
    workers: usize,
}

impl Pipeline {
    /// Pipeline with the repository's own configuration (or defaults)
    pub fn new(repo_root: impl Into<PathBuf>) -> Result<Self> {
        let repo_root = repo_root.into();
        let config = load_engine_target(&repo_root).unwrap_or_default();
        Self::with_config(repo_root, config)
    }

    pub fn with_config(repo_root: impl Into<PathBuf>, config: EngineTargetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repo_root: repo_root.into(),
            config,
            workers: 1,
        })
    }

    /// Set the ranking thread count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn config(&self) -> &EngineTargetConfig {
        &self.config
    }

    /// Load the bundle at `evidence_path` and scan
    pub fn scan_file(&self, evidence_path: &Path, options: &ScanOptions) -> Result<ScanReport> {
        let bundle = EvidenceBundle::load(evidence_path, &self.repo_root)?;
        self.scan(bundle, options)
    }

    /// Run every phase over an already normalised bundle
    pub fn scan(&self, bundle: EvidenceBundle, options: &ScanOptions) -> Result<ScanReport> {
        let mut config = self.config.clone();
        options.apply_to(&mut config);
        config.validate()?;

        let trace = bundle.trace.report();
        let detected = bundle.detected_set();
        let mut files = bundle.files;

        let graph = DependencyGraph::build(&files, &bundle.static_edges, &bundle.dynamic_edges);
        info!(
            "Built graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        let resolver = SurfaceResolver::new(&config, &files);
        resolver.tag_files(&mut files);
        let classified = resolver.classify_edges(&graph);
        let surface_metrics = resolver.surface_metrics(&files, &graph);
        let cross_edges = CrossEdgeSummary {
            intra: classified.intra_count,
            total: classified.cross_count,
            unauthorized: classified.unauthorized(),
            by_pair: classified.pair_counts(),
            edges: classified.cross,
        };

        let scope = resolve_target(&options.target, &config, &files);
        let scopes = ScopeFilter::from_scopes(&scope.engine_scopes);
        info!(
            "Engine scopes ({}): {}",
            options.target,
            scopes.scopes().join(", ")
        );

        let source_filter = SourceFilter::from_config(&config);
        let triangulation = Triangulator::new(&graph, self.workers).triangulate(
            &files,
            detected.as_ref(),
            &source_filter,
            &scopes,
            &config.triangulation,
        )?;

        let inspector = FsInspector::new(&self.repo_root);
        let tagger =
            EntryTagger::new(&graph, &inspector, &config)?.with_trace_partial(trace.partial);
        // Only the top-ranked candidates are tagged, so the core set is
        // bounded by triangulate::RANKED_REPORT_LIMIT
        let entrypoints = tagger.tag_all(&triangulation.ranked);

        let engine = gate_engine(&entrypoints, &scopes);
        if let Some(primary) = &engine.primary_scope {
            info!("Primary engine surface: {}", primary);
        }

        let core = core_set(&graph, &entrypoints);
        let core_entrypoints = entrypoints
            .iter()
            .filter(|e| e.eligible)
            .map(|e| e.path.clone())
            .collect();
        let plan = build_plan(
            &files,
            &core,
            &TierPolicy::new(scopes.clone(), &config),
            core_entrypoints,
        );

        Ok(ScanReport {
            metadata: ScanMetadata {
                run_id: uuid::Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                repo_root: self.repo_root.clone(),
                target: options.target.to_string(),
                config_hash: config_hash(&config)?,
                engine_scopes: scopes.scopes(),
                scope_confidence: scope.confidence,
                trace,
            },
            graph: GraphSection {
                node_count: graph.node_count(),
                edge_count: graph.edge_count(),
                classification: graph.classify_roots(),
                diagnostics: graph.diagnostics(),
                export: graph.export(),
            },
            surfaces: resolver.detection().clone(),
            surface_metrics,
            cross_edges,
            triangulation,
            entrypoints,
            engine,
            plan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Evidence};
    use crate::quarantine::Tier;
    use crate::tagger::ScoreBreakdown;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture_repo() -> (tempfile::TempDir, EvidenceBundle) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "engine/main.py",
            "import sys\nfrom engine import core\n\nif __name__ == \"__main__\":\n    core.run()\n",
        );
        write(root, "engine/core.py", "from engine import util\n\ndef run():\n    util.go()\n");
        write(root, "engine/util.py", "def go():\n    pass\n");
        write(root, "engine/dead.py", "def unused():\n    pass\n");
        write(root, "tools/helper.py", "print('hi')\n");
        write(root, "archive/old_tool_v2.py", "print('old')\n");

        let files = vec![
            FileRecord::new("engine/main.py", Confidence::High).with_evidence(Evidence::StaticImport),
            FileRecord::new("engine/core.py", Confidence::Med).with_evidence(Evidence::StaticImport),
            FileRecord::new("engine/util.py", Confidence::Med).with_evidence(Evidence::StaticImport),
            FileRecord::new("engine/dead.py", Confidence::Low),
            FileRecord::new("tools/helper.py", Confidence::Low),
            FileRecord::new("archive/old_tool_v2.py", Confidence::Low),
        ];
        let bundle = EvidenceBundle {
            files,
            static_edges: vec![
                ("engine/main.py".to_string(), "engine/core.py".to_string()),
                ("engine/core.py".to_string(), "engine/util.py".to_string()),
            ],
            ..Default::default()
        };
        (dir, bundle)
    }

    fn tagged(path: &str, intent: Intent, role: Role, score: f64, in_scope: bool) -> TaggedEntrypoint {
        TaggedEntrypoint {
            path: path.to_string(),
            intent,
            intent_tags: vec![format!("intent:{intent}")],
            behavior_tags: Vec::new(),
            role,
            role_scores: BTreeMap::new(),
            eligible: EntryTagger::is_eligible(intent, role),
            denied: false,
            score,
            in_scope,
            covered: 0,
            cover_ratio: 0.0,
            breakdown: ScoreBreakdown {
                coverage: 0.0,
                centrality: 0.0,
                naming: 0.0,
                role: 0.0,
                has_guard: false,
                static_signal: 0.0,
                graph_signal: 0.0,
                trace_partial: false,
            },
        }
    }

    #[test]
    fn test_target_spec_parse() {
        assert_eq!("auto".parse::<TargetSpec>().unwrap(), TargetSpec::Auto);
        assert_eq!("global".parse::<TargetSpec>().unwrap(), TargetSpec::Global);
        assert_eq!(".".parse::<TargetSpec>().unwrap(), TargetSpec::Global);
        assert_eq!("ENGINE".parse::<TargetSpec>().unwrap(), TargetSpec::Engine);
        assert_eq!(
            "./EndGame/sim/".parse::<TargetSpec>().unwrap(),
            TargetSpec::Path("EndGame/sim".to_string())
        );
    }

    #[test]
    fn test_resolve_target_modes() {
        let files = vec![
            FileRecord::new("engine/a.py", Confidence::High).with_evidence(Evidence::RuntimeTrace),
            FileRecord::new("engine/b.py", Confidence::Med),
            FileRecord::new("gui/c.py", Confidence::Med),
        ];
        let config = EngineTargetConfig::default();

        let global = resolve_target(&TargetSpec::Global, &config, &files);
        assert_eq!(global.engine_scopes, vec!["."]);

        let path = resolve_target(&TargetSpec::Path("gui".to_string()), &config, &files);
        assert_eq!(path.engine_scopes, vec!["gui"]);

        let engine = resolve_target(&TargetSpec::Engine, &config, &files);
        assert_eq!(engine.engine_scopes, vec!["engine"]);

        let configured = EngineTargetConfig {
            include_roots: vec!["core/".to_string(), "sim".to_string()],
            ..Default::default()
        };
        let engine = resolve_target(&TargetSpec::Engine, &configured, &files);
        assert_eq!(engine.engine_scopes, vec!["core", "sim"]);
    }

    #[test]
    fn test_gate_engine_groups_by_scope() {
        let scopes = ScopeFilter::from_scopes(&["engine".to_string(), "sim".to_string()]);
        let tagged = vec![
            tagged("engine/main.py", Intent::Runtime, Role::Boot, 0.8, true),
            tagged("sim/run.py", Intent::Runtime, Role::CoreDriver, 0.5, true),
            tagged("sim/loop.py", Intent::Runtime, Role::CoreDriver, 0.4, true),
            tagged("engine/tests/test_main.py", Intent::Tests, Role::TestHarness, 0.9, true),
            tagged("engine/test_util.py", Intent::Runtime, Role::CoreDriver, 0.9, true),
            tagged("tools/cli.py", Intent::Tools, Role::CliTool, 0.3, false),
            tagged("scripts/build.py", Intent::Runtime, Role::CliTool, 0.2, false),
        ];

        let engine = gate_engine(&tagged, &scopes);
        let paths: Vec<&str> = engine.candidates.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["engine/main.py", "sim/run.py", "sim/loop.py"]);

        // sim sums to 0.9 and beats engine's 0.8
        assert_eq!(engine.primary_scope.as_deref(), Some("sim"));
        assert_eq!(engine.primary_entrypoints(), vec!["sim/run.py", "sim/loop.py"]);
        assert_eq!(engine.other_scopes.len(), 1);
        assert_eq!(engine.other_scopes[0].scope, "engine");

        assert_eq!(engine.tools, vec!["tools/cli.py", "scripts/build.py"]);
    }

    #[test]
    fn test_gate_engine_empty() {
        let engine = gate_engine(&[], &ScopeFilter::Unrestricted);
        assert!(engine.primary_scope.is_none());
        assert!(engine.candidates.is_empty());
    }

    #[test]
    fn test_engine_deny_dirs() {
        assert!(is_engine_denied("tests/a.py"));
        assert!(is_engine_denied("pkg/docs/a.py"));
        assert!(is_engine_denied("pkg/test_a.py"));
        assert!(is_engine_denied("test_a.py"));
        assert!(!is_engine_denied("engine/contest.py"));
    }

    #[test]
    fn test_full_scan() {
        let (dir, bundle) = fixture_repo();
        let pipeline = Pipeline::with_config(dir.path(), EngineTargetConfig::default())
            .unwrap()
            .with_workers(2);
        let report = pipeline.scan(bundle, &ScanOptions::default()).unwrap();

        assert_eq!(report.metadata.engine_scopes, vec!["engine"]);
        assert_eq!(report.graph.node_count, 6);
        assert_eq!(report.graph.edge_count, 2);

        let selected = report.triangulation.selection.paths();
        assert_eq!(selected, vec!["engine/main.py"]);
        assert_eq!(report.triangulation.selection.covered, 3);

        let main = report
            .entrypoints
            .iter()
            .find(|e| e.path == "engine/main.py")
            .unwrap();
        assert!(main.eligible);
        assert!(main.breakdown.has_guard);
        assert_eq!(report.engine.primary_scope.as_deref(), Some("engine"));
        assert_eq!(report.engine.candidates[0].path, "engine/main.py");

        let plan = &report.plan;
        assert_eq!(plan.tier_of("engine/main.py"), Some(Tier::T0));
        assert_eq!(plan.tier_of("engine/util.py"), Some(Tier::T0));
        assert_eq!(plan.tier_of("engine/dead.py"), Some(Tier::T3));
        assert_eq!(plan.tier_of("tools/helper.py"), Some(Tier::T1));
        assert_eq!(plan.tier_of("archive/old_tool_v2.py"), Some(Tier::T2));
        assert_eq!(plan.summary.total_files, 6);
        assert_eq!(plan.summary.total_movable, 3);
    }

    #[test]
    fn test_options_override_config() {
        let (dir, bundle) = fixture_repo();
        let pipeline = Pipeline::with_config(dir.path(), EngineTargetConfig::default()).unwrap();
        let options = ScanOptions {
            target: TargetSpec::Global,
            max_k: Some(0),
            ..Default::default()
        };
        let report = pipeline.scan(bundle, &options).unwrap();
        assert_eq!(report.metadata.engine_scopes, vec!["."]);
        assert!(report.triangulation.selection.selected.is_empty());
    }

    #[test]
    fn test_report_roundtrip_on_disk() {
        let (dir, bundle) = fixture_repo();
        let pipeline = Pipeline::with_config(dir.path(), EngineTargetConfig::default()).unwrap();
        let report = pipeline.scan(bundle, &ScanOptions::default()).unwrap();

        let path = dir.path().join("out").join("last_scan.json");
        report.save_to(&path).unwrap();
        let loaded = ScanReport::load_from(&path).unwrap();
        assert_eq!(loaded.metadata.run_id, report.metadata.run_id);
        assert_eq!(loaded.plan, report.plan);
        assert_eq!(loaded.engine, report.engine);
    }

    #[test]
    fn test_config_hash_changes_with_config() {
        let a = EngineTargetConfig::default();
        let mut b = EngineTargetConfig::default();
        b.triangulation.max_k = 3;
        assert_eq!(config_hash(&a).unwrap(), config_hash(&a).unwrap());
        assert_ne!(config_hash(&a).unwrap(), config_hash(&b).unwrap());
        assert_eq!(config_hash(&a).unwrap().len(), 16);
    }
}
