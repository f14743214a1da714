//! Surface & scope resolution
//!
//! A surface is an independently rooted sub-codebase inside one repository.
//! Every file maps to exactly one surface id. Surfaces come either straight
//! from configuration or from folder heuristics:
//!
//! - a top-level folder with at least 3 source files is a surface
//! - a surface with 20+ source files that holds at least 2 sub-folders with
//!   3+ source files each is replaced by one surface per such sub-folder
//! - loose files at the repository root are unassigned
//!
//! Resolution is longest-prefix over the surface roots and falls back to the
//! top-level folder name, so it is total.

use crate::config::{EngineTargetConfig, SourceFilter};
use crate::graph::DependencyGraph;
use crate::models::{path_under, top_level_folder, FileRecord};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Surface id for loose files at the repository root
pub const ROOT_SURFACE: &str = "_root";

/// Folders never promoted to surfaces by the heuristics
const SKIP_FOLDERS: &[&str] = &[
    "archive",
    "docs",
    "reports",
    ".git",
    "__pycache__",
    "node_modules",
    "_quarantine",
];

/// Folders ignored when inferring engine scopes
const SCOPE_SKIP_FOLDERS: &[&str] = &[
    "archive",
    "docs",
    "tests",
    "test",
    ".git",
    "__pycache__",
    "reports",
    "node_modules",
    "_quarantine",
];

const MIN_SURFACE_SOURCES: usize = 3;
const SPLIT_THRESHOLD: usize = 20;
const MIN_SPLIT_CHILDREN: usize = 2;
const MAX_INFERRED_SCOPES: usize = 5;

/// How a surface came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    Configured,
    AutoDetected,
    AutoSplit,
}

/// A detected or configured surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Surface {
    pub id: String,
    /// Root prefixes, each ending in `/`
    pub roots: Vec<String>,
    pub file_count: usize,
    pub source_count: usize,
    pub active_count: usize,
    pub runtime_count: usize,
    pub kind: SurfaceKind,
    /// Parent folder for auto-split surfaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Free-form label from configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Result of surface detection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurfaceDetection {
    pub surfaces: IndexMap<String, Surface>,
    /// Files that belong to no surface root
    pub unassigned_count: usize,
}

/// Ordered (source surface, destination surface) key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfacePair {
    pub from: String,
    pub to: String,
}

impl std::fmt::Display for SurfacePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

impl Serialize for SurfacePair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An edge whose endpoints live on different surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossEdge {
    pub source: String,
    pub target: String,
    pub source_surface: String,
    pub target_surface: String,
    pub allowed: bool,
}

/// Intra/cross split of all graph edges
#[derive(Debug, Clone, Default, Serialize)]
pub struct EdgeClassification {
    pub intra_count: usize,
    pub cross_count: usize,
    pub cross: Vec<CrossEdge>,
    pub by_pair: BTreeMap<SurfacePair, Vec<(String, String)>>,
}

impl EdgeClassification {
    /// Cross edges not covered by an allow rule
    pub fn unauthorized(&self) -> usize {
        self.cross.iter().filter(|e| !e.allowed).count()
    }

    pub fn pair_counts(&self) -> BTreeMap<String, usize> {
        self.by_pair
            .iter()
            .map(|(pair, edges)| (pair.to_string(), edges.len()))
            .collect()
    }
}

/// Per-surface summary metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMetrics {
    pub file_count: usize,
    pub source_count: usize,
    pub active: usize,
    pub runtime: usize,
    pub internal_edges: usize,
    pub cross_edges_out: usize,
    pub cross_edges_in: usize,
    /// active / file_count (0 for an empty surface)
    pub coverage: f64,
}

/// Confidence in an inferred engine scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeConfidence {
    High,
    Medium,
    Low,
}

/// Engine scopes inferred from where the live files are
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeInference {
    /// Folder prefixes; `["."]` means unrestricted
    pub engine_scopes: Vec<String>,
    pub confidence: ScopeConfidence,
}

#[derive(Default)]
struct FolderStats {
    files: usize,
    sources: usize,
    active: usize,
    runtime: usize,
}

impl FolderStats {
    fn add(&mut self, file: &FileRecord, filter: &SourceFilter) {
        self.files += 1;
        if filter.is_source(&file.path) {
            self.sources += 1;
        }
        if file.is_active() {
            self.active += 1;
        }
        if file.is_runtime_traced() {
            self.runtime += 1;
        }
    }
}

/// Assigns surfaces to files and summarises edges per surface.
///
/// The per-path cache lives on the resolver instance. Call [`refresh`] after
/// the underlying file data changes (for example after runtime evidence has
/// been merged in) so stale assignments are dropped.
///
/// [`refresh`]: SurfaceResolver::refresh
pub struct SurfaceResolver {
    config: EngineTargetConfig,
    filter: SourceFilter,
    detection: SurfaceDetection,
    /// (surface id, root without trailing slash), longest root first
    roots: Vec<(String, String)>,
    cache: DashMap<String, String>,
}

impl SurfaceResolver {
    pub fn new(config: &EngineTargetConfig, files: &[FileRecord]) -> Self {
        let mut resolver = Self {
            config: config.clone(),
            filter: SourceFilter::from_config(config),
            detection: SurfaceDetection::default(),
            roots: Vec::new(),
            cache: DashMap::new(),
        };
        resolver.refresh(files);
        resolver
    }

    /// Re-run detection against fresh file data and drop cached assignments
    pub fn refresh(&mut self, files: &[FileRecord]) {
        self.detection = self.detect_surfaces(files);

        let mut roots: Vec<(String, String)> = Vec::new();
        for (id, surface) in &self.detection.surfaces {
            for root in &surface.roots {
                roots.push((id.clone(), root.trim_end_matches('/').to_string()));
            }
        }
        // Stable sort keeps declaration order among equal lengths
        roots.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        self.roots = roots;

        self.invalidate_cache();
    }

    /// Forget every cached path assignment
    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_paths(&self) -> usize {
        self.cache.len()
    }

    pub fn detection(&self) -> &SurfaceDetection {
        &self.detection
    }

    pub fn surfaces(&self) -> &IndexMap<String, Surface> {
        &self.detection.surfaces
    }

    // ----------------------------------------------------------------
    // Surface detection
    // ----------------------------------------------------------------

    /// Detect the surfaces of a file set.
    ///
    /// With configured surfaces this is an exact contract and no heuristics
    /// run.
    pub fn detect_surfaces(&self, files: &[FileRecord]) -> SurfaceDetection {
        if self.config.has_surfaces() {
            return self.detect_from_config(files);
        }

        let mut folders: BTreeMap<&str, FolderStats> = BTreeMap::new();
        let mut root_files = 0;

        for file in files {
            let Some(top) = file.top_level() else {
                root_files += 1;
                continue;
            };
            if SKIP_FOLDERS.contains(&top.to_lowercase().as_str()) {
                continue;
            }
            folders.entry(top).or_default().add(file, &self.filter);
        }

        let mut surfaces = IndexMap::new();
        for (folder, stats) in folders {
            if stats.sources < MIN_SURFACE_SOURCES {
                continue;
            }

            if stats.sources >= SPLIT_THRESHOLD {
                let children = self.split_candidates(folder, files);
                if children.len() >= MIN_SPLIT_CHILDREN {
                    debug!("Splitting surface {} into {} sub-surfaces", folder, children.len());
                    for (sub, sub_stats) in children {
                        let id = format!("{folder}/{sub}");
                        surfaces.insert(
                            id.clone(),
                            Surface {
                                roots: vec![format!("{id}/")],
                                id,
                                file_count: sub_stats.files,
                                source_count: sub_stats.sources,
                                active_count: sub_stats.active,
                                runtime_count: sub_stats.runtime,
                                kind: SurfaceKind::AutoSplit,
                                parent: Some(folder.to_string()),
                                label: None,
                            },
                        );
                    }
                    continue;
                }
            }

            surfaces.insert(
                folder.to_string(),
                Surface {
                    id: folder.to_string(),
                    roots: vec![format!("{folder}/")],
                    file_count: stats.files,
                    source_count: stats.sources,
                    active_count: stats.active,
                    runtime_count: stats.runtime,
                    kind: SurfaceKind::AutoDetected,
                    parent: None,
                    label: None,
                },
            );
        }

        SurfaceDetection {
            surfaces,
            unassigned_count: root_files,
        }
    }

    /// Sub-folders of `folder` holding enough source files to stand alone
    fn split_candidates<'a>(
        &self,
        folder: &str,
        files: &'a [FileRecord],
    ) -> BTreeMap<&'a str, FolderStats> {
        let mut subs: BTreeMap<&str, FolderStats> = BTreeMap::new();
        for file in files {
            let Some(rest) = file
                .path
                .strip_prefix(folder)
                .and_then(|r| r.strip_prefix('/'))
            else {
                continue;
            };
            if let Some(sub) = top_level_folder(rest) {
                subs.entry(sub).or_default().add(file, &self.filter);
            }
        }
        subs.retain(|_, s| s.sources >= MIN_SURFACE_SOURCES);
        subs
    }

    fn detect_from_config(&self, files: &[FileRecord]) -> SurfaceDetection {
        let mut surfaces = IndexMap::new();
        for (id, conf) in &self.config.surfaces {
            let root = conf.root_for(id);
            let mut stats = FolderStats::default();
            for file in files.iter().filter(|f| path_under(&f.path, &root)) {
                stats.add(file, &self.filter);
            }
            surfaces.insert(
                id.clone(),
                Surface {
                    id: id.clone(),
                    roots: vec![root],
                    file_count: stats.files,
                    source_count: stats.sources,
                    active_count: stats.active,
                    runtime_count: stats.runtime,
                    kind: SurfaceKind::Configured,
                    parent: None,
                    label: conf.kind.clone(),
                },
            );
        }

        let unassigned_count = files
            .iter()
            .filter(|f| {
                !surfaces
                    .values()
                    .any(|s: &Surface| s.roots.iter().any(|r| path_under(&f.path, r)))
            })
            .count();

        SurfaceDetection {
            surfaces,
            unassigned_count,
        }
    }

    // ----------------------------------------------------------------
    // Surface assignment
    // ----------------------------------------------------------------

    /// Surface id for a path. Cached per resolver.
    ///
    /// Longest root prefix wins, ties go to the surface declared first.
    /// A root may name a single file or be empty (the whole repository).
    /// Unmatched paths fall back to their top-level folder; root-level files
    /// resolve to [`ROOT_SURFACE`].
    pub fn resolve_surface(&self, path: &str) -> String {
        if let Some(hit) = self.cache.get(path) {
            return hit.value().clone();
        }

        let resolved = self
            .roots
            .iter()
            .find(|(_, root)| path_under(path, root))
            .map(|(id, _)| id.clone())
            .unwrap_or_else(|| top_level_folder(path).unwrap_or(ROOT_SURFACE).to_string());

        self.cache.insert(path.to_string(), resolved.clone());
        resolved
    }

    /// Write the surface id into every record
    pub fn tag_files(&self, files: &mut [FileRecord]) {
        for file in files.iter_mut() {
            file.surface_id = Some(self.resolve_surface(&file.path));
        }
    }

    // ----------------------------------------------------------------
    // Cross-surface edge analysis
    // ----------------------------------------------------------------

    /// Split every edge into intra- or cross-surface
    pub fn classify_edges(&self, graph: &DependencyGraph) -> EdgeClassification {
        let mut result = EdgeClassification::default();

        for edge in graph.edges() {
            let src_surface = self.resolve_surface(&edge.source);
            let dst_surface = self.resolve_surface(&edge.target);
            if src_surface == dst_surface {
                result.intra_count += 1;
                continue;
            }

            let allowed = self.is_cross_allowed(&src_surface, &dst_surface);
            result
                .by_pair
                .entry(SurfacePair {
                    from: src_surface.clone(),
                    to: dst_surface.clone(),
                })
                .or_default()
                .push((edge.source.clone(), edge.target.clone()));
            result.cross.push(CrossEdge {
                source: edge.source,
                target: edge.target,
                source_surface: src_surface,
                target_surface: dst_surface,
                allowed,
            });
        }

        result.cross_count = result.cross.len();
        result
    }

    /// Whether configuration permits edges from `src` to `dst`
    pub fn is_cross_allowed(&self, src: &str, dst: &str) -> bool {
        self.config.is_cross_allowed(src, dst)
    }

    // ----------------------------------------------------------------
    // Per-surface queries
    // ----------------------------------------------------------------

    /// Summary metrics for every detected surface, plus one bucket per
    /// fallback id that files resolve to
    pub fn surface_metrics(
        &self,
        files: &[FileRecord],
        graph: &DependencyGraph,
    ) -> BTreeMap<String, SurfaceMetrics> {
        let mut metrics: BTreeMap<String, SurfaceMetrics> = self
            .detection
            .surfaces
            .keys()
            .map(|id| (id.clone(), SurfaceMetrics::default()))
            .collect();

        for file in files {
            let m = metrics.entry(self.resolve_surface(&file.path)).or_default();
            m.file_count += 1;
            if self.filter.is_source(&file.path) {
                m.source_count += 1;
            }
            if file.is_active() {
                m.active += 1;
            }
            if file.is_runtime_traced() {
                m.runtime += 1;
            }
        }

        let mut surface_of: HashMap<&str, String> = HashMap::new();
        for (src, dst) in graph.edge_pairs() {
            let s = surface_of
                .entry(src)
                .or_insert_with(|| self.resolve_surface(src))
                .clone();
            let d = surface_of
                .entry(dst)
                .or_insert_with(|| self.resolve_surface(dst))
                .clone();
            if s == d {
                metrics.entry(s).or_default().internal_edges += 1;
            } else {
                metrics.entry(s).or_default().cross_edges_out += 1;
                metrics.entry(d).or_default().cross_edges_in += 1;
            }
        }

        for m in metrics.values_mut() {
            m.coverage = if m.file_count == 0 {
                0.0
            } else {
                m.active as f64 / m.file_count as f64
            };
        }

        metrics
    }

    /// Files that resolve to the given surface
    pub fn surface_files<'a>(&self, files: &'a [FileRecord], surface_id: &str) -> Vec<&'a FileRecord> {
        files
            .iter()
            .filter(|f| self.resolve_surface(&f.path) == surface_id)
            .collect()
    }
}

/// Infer engine scopes from the top-level folders holding the most live files.
///
/// Each folder scores `3 * runtime + active` over its ACTIVE files. Folders
/// within half of the best score are kept, at most five.
pub fn infer_scopes(files: &[FileRecord]) -> ScopeInference {
    let mut scores: BTreeMap<&str, usize> = BTreeMap::new();
    let mut saw_active = false;

    for file in files.iter().filter(|f| f.is_active()) {
        saw_active = true;
        let top = file.top_level().unwrap_or(".");
        if SCOPE_SKIP_FOLDERS.contains(&top.to_lowercase().as_str()) {
            continue;
        }
        let score = scores.entry(top).or_default();
        *score += 1;
        if file.is_runtime_traced() {
            *score += 3;
        }
    }

    let unrestricted = ScopeInference {
        engine_scopes: vec![".".to_string()],
        confidence: ScopeConfidence::Low,
    };
    if !saw_active || scores.is_empty() {
        return unrestricted;
    }

    let mut ranked: Vec<(&str, usize)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let max_score = ranked[0].1;

    let engine_scopes: Vec<String> = ranked
        .iter()
        .take_while(|(_, score)| (*score as f64) >= max_score as f64 * 0.5)
        .take(MAX_INFERRED_SCOPES)
        .map(|(folder, _)| folder.to_string())
        .collect();

    let confidence = if max_score < 3 {
        ScopeConfidence::Low
    } else if engine_scopes.len() == 1 {
        ScopeConfidence::High
    } else {
        ScopeConfidence::Medium
    };

    ScopeInference {
        engine_scopes,
        confidence,
    }
}
