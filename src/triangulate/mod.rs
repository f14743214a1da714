//! Entrypoint triangulation
//!
//! Finds a small set of entrypoints whose forward reachability explains the
//! liveness target. Ranking computes one BFS per candidate on a bounded rayon
//! pool; selection is a greedy set cover over those reach sets.

use crate::config::{SourceFilter, TriangulationConfig};
use crate::graph::DependencyGraph;
use crate::models::{path_under, FileRecord};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// How many ranked candidates a report keeps
pub const RANKED_REPORT_LIMIT: usize = 50;

/// Which files make up the liveness target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    #[default]
    ActiveOrRuntime,
    ActiveOnly,
    RuntimeOnly,
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMode::ActiveOrRuntime => write!(f, "active_or_runtime"),
            TargetMode::ActiveOnly => write!(f, "active_only"),
            TargetMode::RuntimeOnly => write!(f, "runtime_only"),
        }
    }
}

impl FromStr for TargetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "active_or_runtime" => Ok(TargetMode::ActiveOrRuntime),
            "active_only" | "active" => Ok(TargetMode::ActiveOnly),
            "runtime_only" | "runtime" => Ok(TargetMode::RuntimeOnly),
            _ => Err(format!(
                "Unknown target mode: {}. Use active_or_runtime, active_only or runtime_only",
                s
            )),
        }
    }
}

/// The set of files an entrypoint cover should explain
pub fn target_set(files: &[FileRecord], mode: TargetMode) -> BTreeSet<String> {
    files
        .iter()
        .filter(|f| match mode {
            TargetMode::ActiveOrRuntime => f.is_active() || f.is_runtime_traced(),
            TargetMode::ActiveOnly => f.is_active(),
            TargetMode::RuntimeOnly => f.is_runtime_traced(),
        })
        .map(|f| f.path.clone())
        .collect()
}

/// Folder prefixes a candidate must live under to be selectable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    Unrestricted,
    Prefixes(Vec<String>),
}

impl ScopeFilter {
    /// `[]` and `["."]` both mean unrestricted
    pub fn from_scopes(scopes: &[String]) -> Self {
        let prefixes: Vec<String> = scopes
            .iter()
            .map(|s| s.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if prefixes.is_empty() || prefixes.iter().any(|s| s == ".") {
            ScopeFilter::Unrestricted
        } else {
            ScopeFilter::Prefixes(prefixes)
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        match self {
            ScopeFilter::Unrestricted => true,
            ScopeFilter::Prefixes(prefixes) => prefixes.iter().any(|p| path_under(path, p)),
        }
    }

    /// First scope prefix that holds `path`
    pub fn matching_scope(&self, path: &str) -> Option<&str> {
        match self {
            ScopeFilter::Unrestricted => Some("."),
            ScopeFilter::Prefixes(prefixes) => prefixes
                .iter()
                .find(|p| path_under(path, p))
                .map(String::as_str),
        }
    }

    pub fn scopes(&self) -> Vec<String> {
        match self {
            ScopeFilter::Unrestricted => vec![".".to_string()],
            ScopeFilter::Prefixes(prefixes) => prefixes.clone(),
        }
    }
}

/// One candidate with its reach statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntrypoint {
    pub path: String,
    pub reachable_count: usize,
    /// |reach ∩ target|
    pub covered: usize,
    /// covered / |target|
    pub cover_ratio: f64,
    pub in_scope: bool,
    #[serde(skip)]
    pub reach: BTreeSet<String>,
}

/// One greedy pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedEntrypoint {
    pub path: String,
    /// Newly covered target files at the time of the pick
    pub marginal_gain: usize,
    pub cumulative_covered: usize,
    pub cumulative_ratio: f64,
}

/// Why greedy selection stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EmptyTarget,
    MaxK,
    TargetCovered,
    ThresholdReached,
    NoGain,
}

/// Result of greedy entrypoint selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub selected: Vec<SelectedEntrypoint>,
    pub target_size: usize,
    pub covered: usize,
    pub coverage_ratio: f64,
    pub stop_reason: StopReason,
}

impl Selection {
    pub fn paths(&self) -> Vec<&str> {
        self.selected.iter().map(|s| s.path.as_str()).collect()
    }
}

/// Everything one triangulation run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangulationResult {
    pub target_mode: TargetMode,
    pub target_size: usize,
    pub candidate_count: usize,
    pub in_scope_count: usize,
    /// Best candidates, at most [`RANKED_REPORT_LIMIT`]
    pub ranked: Vec<RankedEntrypoint>,
    pub selection: Selection,
}

/// Reachability-based entrypoint ranking over one graph
pub struct Triangulator<'g> {
    graph: &'g DependencyGraph,
    workers: usize,
}

impl<'g> Triangulator<'g> {
    pub fn new(graph: &'g DependencyGraph, workers: usize) -> Self {
        Self {
            graph,
            workers: workers.max(1),
        }
    }

    /// Roots with outgoing edges plus every ACTIVE source file.
    ///
    /// A non-empty externally detected entrypoint set narrows the result, so
    /// high fan-out library modules cannot pose as entrypoints.
    pub fn candidates(
        &self,
        files: &[FileRecord],
        detected: Option<&BTreeSet<String>>,
        filter: &SourceFilter,
    ) -> Vec<String> {
        let mut out: BTreeSet<String> = self
            .graph
            .roots_with_outgoing()
            .into_iter()
            .map(String::from)
            .collect();
        out.extend(
            files
                .iter()
                .filter(|f| f.is_active() && filter.is_source(&f.path))
                .map(|f| f.path.clone()),
        );

        if let Some(detected) = detected.filter(|d| !d.is_empty()) {
            out.retain(|c| detected.contains(c));
        }
        out.into_iter().collect()
    }

    /// Rank candidates by how much of the target they reach.
    ///
    /// Sorted by covered count descending, then path. An empty target ranks
    /// nothing.
    pub fn rank(
        &self,
        candidates: &[String],
        target: &BTreeSet<String>,
        scopes: &ScopeFilter,
    ) -> anyhow::Result<Vec<RankedEntrypoint>> {
        if target.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let mut ranked: Vec<RankedEntrypoint> = pool.install(|| {
            candidates
                .par_iter()
                .map(|c| self.rank_one(c, target, scopes))
                .collect()
        });
        sort_ranked(&mut ranked);

        debug!(
            "Ranked {} candidates against {} target files ({} workers)",
            ranked.len(),
            target.len(),
            self.workers
        );
        Ok(ranked)
    }

    /// Single-threaded ranking; same output as [`rank`](Self::rank)
    pub fn rank_sequential(
        &self,
        candidates: &[String],
        target: &BTreeSet<String>,
        scopes: &ScopeFilter,
    ) -> Vec<RankedEntrypoint> {
        if target.is_empty() {
            return Vec::new();
        }
        let mut ranked: Vec<RankedEntrypoint> = candidates
            .iter()
            .map(|c| self.rank_one(c, target, scopes))
            .collect();
        sort_ranked(&mut ranked);
        ranked
    }

    fn rank_one(
        &self,
        candidate: &str,
        target: &BTreeSet<String>,
        scopes: &ScopeFilter,
    ) -> RankedEntrypoint {
        let reach = self.graph.reachable(candidate);
        let covered = reach.iter().filter(|p| target.contains(*p)).count();
        RankedEntrypoint {
            path: candidate.to_string(),
            reachable_count: reach.len(),
            covered,
            cover_ratio: covered as f64 / target.len() as f64,
            in_scope: scopes.contains(candidate),
            reach,
        }
    }

    /// Full run: target, candidates, ranking and greedy selection
    pub fn triangulate(
        &self,
        files: &[FileRecord],
        detected: Option<&BTreeSet<String>>,
        filter: &SourceFilter,
        scopes: &ScopeFilter,
        settings: &TriangulationConfig,
    ) -> anyhow::Result<TriangulationResult> {
        let target = target_set(files, settings.target_mode);
        let candidates = self.candidates(files, detected, filter);
        let ranked = self.rank(&candidates, &target, scopes)?;
        let selection = select_entrypoints(
            &ranked,
            &target,
            settings.max_k,
            settings.coverage_threshold,
        );

        info!(
            "Selected {} entrypoint(s) covering {:.1}% of {} target files",
            selection.selected.len(),
            selection.coverage_ratio * 100.0,
            target.len()
        );

        let in_scope_count = ranked.iter().filter(|r| r.in_scope).count();
        let mut top = ranked;
        top.truncate(RANKED_REPORT_LIMIT);

        Ok(TriangulationResult {
            target_mode: settings.target_mode,
            target_size: target.len(),
            candidate_count: candidates.len(),
            in_scope_count,
            ranked: top,
            selection,
        })
    }
}

fn sort_ranked(ranked: &mut [RankedEntrypoint]) {
    ranked.sort_by(|a, b| b.covered.cmp(&a.covered).then_with(|| a.path.cmp(&b.path)));
}

/// Greedy set cover over ranked candidates.
///
/// Only in-scope candidates are picked. Each round takes the candidate with
/// the largest marginal gain (earliest in ranked order on ties) and stops at
/// `max_k` picks, full coverage, zero gain, or once the covered ratio reaches
/// `coverage_threshold`.
pub fn select_entrypoints(
    ranked: &[RankedEntrypoint],
    target: &BTreeSet<String>,
    max_k: usize,
    coverage_threshold: f64,
) -> Selection {
    let target_size = target.len();
    let mut selection = Selection {
        selected: Vec::new(),
        target_size,
        covered: 0,
        coverage_ratio: 0.0,
        stop_reason: StopReason::EmptyTarget,
    };
    if target_size == 0 {
        return selection;
    }

    let mut uncovered: FxHashSet<&str> = target.iter().map(String::as_str).collect();
    let mut chosen = vec![false; ranked.len()];

    selection.stop_reason = loop {
        if selection.selected.len() >= max_k {
            break StopReason::MaxK;
        }
        if uncovered.is_empty() {
            break StopReason::TargetCovered;
        }
        if selection.coverage_ratio >= coverage_threshold {
            break StopReason::ThresholdReached;
        }

        let mut best: Option<(usize, usize)> = None;
        for (i, cand) in ranked.iter().enumerate() {
            if chosen[i] || !cand.in_scope {
                continue;
            }
            let gain = cand
                .reach
                .iter()
                .filter(|p| uncovered.contains(p.as_str()))
                .count();
            if best.map_or(true, |(_, g)| gain > g) {
                best = Some((i, gain));
            }
        }

        let Some((idx, gain)) = best.filter(|(_, g)| *g > 0) else {
            break StopReason::NoGain;
        };

        chosen[idx] = true;
        let cand = &ranked[idx];
        for p in &cand.reach {
            uncovered.remove(p.as_str());
        }
        selection.covered = target_size - uncovered.len();
        selection.coverage_ratio = selection.covered as f64 / target_size as f64;
        selection.selected.push(SelectedEntrypoint {
            path: cand.path.clone(),
            marginal_gain: gain,
            cumulative_covered: selection.covered,
            cumulative_ratio: selection.coverage_ratio,
        });
    };

    selection
}
