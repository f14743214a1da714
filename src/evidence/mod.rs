//! Evidence bundle input
//!
//! Collectors (static extraction, runtime tracing, text scanning) run outside
//! this crate and hand their results over as one JSON document:
//!
//! ```json
//! {
//!   "root": "/abs/path/to/repo",
//!   "files": [{"path": "engine/main.py", "evidence": ["static_import"], "confidence": "MED"}],
//!   "static_edges": [["engine/main.py", "engine/core.py"]],
//!   "dynamic_edges": [],
//!   "detected_entrypoints": ["engine/main.py"],
//!   "runtime_files": ["engine/core.py"],
//!   "trace": {"mode": "sandboxed", "entrypoints": [{"path": "engine/main.py", "status": "completed"}]}
//! }
//! ```
//!
//! Paths may be absolute (under `root` or the scanned repository) or
//! repo-relative; they are normalised to repo-relative `/`-separated form.

use crate::error::IntegrityError;
use crate::models::{is_contained_path, Confidence, Evidence, FileRecord};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Trace completeness below this marks the run as partial
pub const PARTIAL_TRACE_THRESHOLD: f64 = 0.9;

/// Everything the collectors produced for one repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Absolute repository root the collectors ran against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub static_edges: Vec<(String, String)>,
    #[serde(default)]
    pub dynamic_edges: Vec<(String, String)>,
    /// Entrypoints found by config/entrypoint discovery, if any ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_entrypoints: Option<Vec<String>>,
    /// Files observed loading during runtime tracing
    #[serde(default)]
    pub runtime_files: Vec<String>,
    #[serde(default)]
    pub trace: TraceMeta,
}

impl EvidenceBundle {
    /// Read a bundle from disk and normalise it against `repo_root`
    pub fn load(path: &Path, repo_root: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read evidence bundle {}", path.display()))?;
        let mut bundle: EvidenceBundle = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse evidence bundle {}", path.display()))?;
        bundle.normalize(repo_root);
        debug!(
            "Loaded evidence: {} files, {} static edges, {} dynamic edges",
            bundle.files.len(),
            bundle.static_edges.len(),
            bundle.dynamic_edges.len()
        );
        Ok(bundle)
    }

    /// Make every path repo-relative, merge duplicate file records, derive
    /// status from confidence and fold in runtime evidence
    pub fn normalize(&mut self, repo_root: &Path) {
        let roots = root_candidates(repo_root, self.root.as_deref());
        let rel = |p: &str| normalize_path(p, &roots);

        let mut merged: Vec<FileRecord> = Vec::with_capacity(self.files.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        for mut file in std::mem::take(&mut self.files) {
            file.path = rel(&file.path);
            if file.path.is_empty() {
                continue;
            }
            if !is_contained_path(&file.path) {
                warn!("Ignoring file outside the repository: {}", file.path);
                continue;
            }
            match index.get(&file.path).copied() {
                Some(i) => {
                    let existing = &mut merged[i];
                    existing.evidence.extend(file.evidence.iter().copied());
                    if file.confidence > existing.confidence {
                        existing.confidence = file.confidence;
                    }
                    existing.normalize_status();
                }
                None => {
                    file.normalize_status();
                    index.insert(file.path.clone(), merged.len());
                    merged.push(file);
                }
            }
        }
        self.files = merged;

        for edges in [&mut self.static_edges, &mut self.dynamic_edges] {
            for (a, b) in edges.iter_mut() {
                *a = rel(a);
                *b = rel(b);
            }
            let before = edges.len();
            edges.retain(|(a, b)| is_contained_path(a) && is_contained_path(b));
            if edges.len() < before {
                warn!(
                    "Ignoring {} edge(s) with an endpoint outside the repository",
                    before - edges.len()
                );
            }
        }
        if let Some(detected) = self.detected_entrypoints.as_mut() {
            for p in detected.iter_mut() {
                *p = rel(p);
            }
            detected.retain(|p| is_contained_path(p));
        }
        for p in self.runtime_files.iter_mut() {
            *p = rel(p);
        }
        self.runtime_files.retain(|p| is_contained_path(p));
        for outcome in self.trace.entrypoints.iter_mut() {
            outcome.path = rel(&outcome.path);
        }

        let runtime: BTreeSet<String> = self.runtime_files.iter().cloned().collect();
        enrich_runtime(&mut self.files, &runtime);
    }

    pub fn detected_set(&self) -> Option<BTreeSet<String>> {
        self.detected_entrypoints
            .as_ref()
            .map(|d| d.iter().cloned().collect())
    }
}

fn root_candidates(repo_root: &Path, declared: Option<&Path>) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(d) = declared {
        roots.push(d.to_path_buf());
    }
    roots.push(repo_root.to_path_buf());
    if let Ok(c) = repo_root.canonicalize() {
        roots.push(c);
    }
    roots
}

/// Repo-relative, `/`-separated form of a path
fn normalize_path(path: &str, roots: &[PathBuf]) -> String {
    let unified = path.replace('\\', "/");
    let p = Path::new(&unified);
    let relative = if p.is_absolute() {
        roots
            .iter()
            .find_map(|r| p.strip_prefix(r).ok())
            .map(|r| r.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|| unified.clone())
    } else {
        unified.clone()
    };
    let mut out = relative.as_str();
    while let Some(rest) = out.strip_prefix("./") {
        out = rest;
    }
    // Absolute paths outside every root keep their leading slash
    out.trim_end_matches('/').to_string()
}

/// Mark files as observed at runtime: adds runtime evidence, raises
/// confidence to HIGH and re-derives status.
///
/// Returns how many records changed.
pub fn enrich_runtime(files: &mut [FileRecord], runtime_paths: &BTreeSet<String>) -> usize {
    let mut changed = 0;
    for file in files.iter_mut().filter(|f| runtime_paths.contains(&f.path)) {
        let before = (file.confidence, file.is_runtime_traced());
        file.evidence.insert(Evidence::RuntimeTrace);
        file.set_confidence(Confidence::High);
        if before != (Confidence::High, true) {
            changed += 1;
        }
    }
    changed
}

/// Outcome of tracing one entrypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    #[default]
    Completed,
    TimedOut,
    SandboxViolation,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceOutcome {
    pub path: String,
    #[serde(default)]
    pub status: TraceStatus,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub files_observed: usize,
    /// Blocked operation for sandbox violations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

/// Metadata from the runtime tracing collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMeta {
    #[serde(default = "default_trace_mode")]
    pub mode: String,
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_boot_timeout")]
    pub boot_timeout_secs: u64,
    #[serde(default)]
    pub entrypoints: Vec<TraceOutcome>,
}

fn default_trace_mode() -> String {
    "disabled".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_boot_timeout() -> u64 {
    15
}

impl Default for TraceMeta {
    fn default() -> Self {
        Self {
            mode: default_trace_mode(),
            default_timeout_secs: default_timeout(),
            boot_timeout_secs: default_boot_timeout(),
            entrypoints: Vec::new(),
        }
    }
}

/// Aggregate trace health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub mode: String,
    pub attempted: usize,
    pub timed_out: usize,
    pub violations: usize,
    pub failed: usize,
    /// (attempted - timed_out) / attempted, 1.0 when nothing was traced
    pub completeness: f64,
    pub partial: bool,
}

impl TraceMeta {
    pub fn summary(&self) -> TraceSummary {
        let count = |s: TraceStatus| self.entrypoints.iter().filter(|e| e.status == s).count();
        let attempted = self.entrypoints.len();
        let timed_out = count(TraceStatus::TimedOut);
        let completeness = if attempted == 0 {
            1.0
        } else {
            (attempted - timed_out) as f64 / attempted as f64
        };
        TraceSummary {
            mode: self.mode.clone(),
            attempted,
            timed_out,
            violations: count(TraceStatus::SandboxViolation),
            failed: count(TraceStatus::Failed),
            completeness: (completeness * 10_000.0).round() / 10_000.0,
            partial: completeness < PARTIAL_TRACE_THRESHOLD,
        }
    }

    /// Timeouts and sandbox violations as warnings. Partial evidence from
    /// these traces is kept.
    pub fn warnings(&self) -> Vec<IntegrityError> {
        self.entrypoints
            .iter()
            .filter_map(|e| match e.status {
                TraceStatus::TimedOut => Some(IntegrityError::TraceTimeout {
                    entrypoint: e.path.clone(),
                    timeout_secs: self.default_timeout_secs,
                }),
                TraceStatus::SandboxViolation => Some(IntegrityError::SandboxViolation {
                    entrypoint: e.path.clone(),
                    operation: e.operation.clone().unwrap_or_else(|| "unknown".to_string()),
                }),
                _ => None,
            })
            .collect()
    }

    /// Log every warning and return the summary
    pub fn report(&self) -> TraceSummary {
        for w in self.warnings() {
            warn!("{}", w);
        }
        let summary = self.summary();
        if summary.partial {
            warn!(
                "Trace completeness {:.0}%: {}/{} entrypoints timed out; static graph is the primary signal",
                summary.completeness * 100.0,
                summary.timed_out,
                summary.attempted
            );
        }
        summary
    }
}
