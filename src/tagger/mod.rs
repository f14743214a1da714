//! Entrypoint tagging
//!
//! Separates *intent* (where a file should live, from its path) from *role*
//! (what it behaves like, from imports and source markers), decides whether
//! a candidate may be a primary entrypoint, and blends everything into one
//! composite score.
//!
//! Composite score weights:
//!
//! | signal     | weight | depends on trace |
//! |------------|--------|------------------|
//! | coverage   | 0.35   | yes              |
//! | centrality | 0.25   | yes              |
//! | naming     | 0.15   | no               |
//! | role       | 0.15   | no               |
//! | guard      | 0.10   | no               |

mod signals;
mod source;

pub use signals::{
    default_role_rules, deny_patterns, filename_role, naming_score, Intent, Role, RoleRule,
};
pub use source::{extract_imports, FsInspector, MapInspector, SourceFacts, SourceInspector};

use crate::config::EngineTargetConfig;
use crate::error::{IntegrityError, IntegrityResult};
use crate::graph::DependencyGraph;
use crate::triangulate::RankedEntrypoint;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const W_COVERAGE: f64 = 0.35;
const W_CENTRALITY: f64 = 0.25;
const W_NAMING: f64 = 0.15;
const W_ROLE: f64 = 0.15;
const W_GUARD: f64 = 0.10;

/// Multiplier for ineligible candidates
const INELIGIBLE_PENALTY: f64 = 0.3;
/// Highest role score the built-in table can produce
const ROLE_SCORE_CEILING: f64 = 12.0;
const CLI_ROLE_BOOST: f64 = 0.3;
/// Roles within this fraction of the best score are tagged as behaviors
const BEHAVIOR_TAG_RATIO: f64 = 0.7;

/// How a composite score was assembled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub coverage: f64,
    pub centrality: f64,
    pub naming: f64,
    pub role: f64,
    pub has_guard: bool,
    /// Weighted naming + role + guard; deterministic
    pub static_signal: f64,
    /// Weighted coverage + centrality; understated when tracing was partial
    pub graph_signal: f64,
    pub trace_partial: bool,
}

/// A ranked candidate with intent, role and composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedEntrypoint {
    pub path: String,
    pub intent: Intent,
    pub intent_tags: Vec<String>,
    pub behavior_tags: Vec<String>,
    pub role: Role,
    pub role_scores: BTreeMap<Role, u32>,
    pub eligible: bool,
    pub denied: bool,
    /// Composite score in 0..=1
    pub score: f64,
    pub in_scope: bool,
    pub covered: usize,
    pub cover_ratio: f64,
    pub breakdown: ScoreBreakdown,
}

struct CompiledRule {
    rule: RoleRule,
    path_patterns: Vec<Regex>,
}

/// Tags ranked candidates against one graph and source inspector
pub struct EntryTagger<'a> {
    graph: &'a DependencyGraph,
    inspector: &'a dyn SourceInspector,
    rules: Vec<CompiledRule>,
    extra_deny: Vec<Regex>,
    max_out_degree: usize,
    trace_partial: bool,
}

impl<'a> EntryTagger<'a> {
    /// Build a tagger. Configured `roles` replace the built-in table and
    /// configured `deny` patterns extend the built-in deny list.
    pub fn new(
        graph: &'a DependencyGraph,
        inspector: &'a dyn SourceInspector,
        config: &EngineTargetConfig,
    ) -> IntegrityResult<Self> {
        let table = if config.roles.is_empty() {
            default_role_rules()
        } else {
            config.roles.clone()
        };

        let mut rules = Vec::with_capacity(table.len());
        for rule in table {
            let path_patterns = rule
                .path_patterns
                .iter()
                .map(|p| compile(p))
                .collect::<IntegrityResult<Vec<_>>>()?;
            rules.push(CompiledRule {
                rule,
                path_patterns,
            });
        }

        let extra_deny = config
            .deny
            .iter()
            .map(|p| compile(p))
            .collect::<IntegrityResult<Vec<_>>>()?;

        Ok(Self {
            graph,
            inspector,
            rules,
            extra_deny,
            max_out_degree: graph.max_out_degree(),
            trace_partial: false,
        })
    }

    /// Mark graph-derived signals as possibly understated
    pub fn with_trace_partial(mut self, partial: bool) -> Self {
        self.trace_partial = partial;
        self
    }

    pub fn is_denied(&self, path: &str) -> bool {
        deny_patterns().iter().any(|re| re.is_match(path))
            || self.extra_deny.iter().any(|re| re.is_match(path))
    }

    /// Raw per-role scores, in rule order
    fn score_roles(&self, path: &str, facts: &SourceFacts, denied: bool) -> Vec<(Role, u32)> {
        let mut scores: Vec<(Role, u32)> = Vec::new();
        for CompiledRule {
            rule,
            path_patterns,
        } in &self.rules
        {
            let mut score = 0;
            if rule
                .imports
                .iter()
                .any(|m| facts.imports.contains(&m.to_lowercase()))
            {
                score += rule.import_weight;
            }
            if rule
                .keywords
                .iter()
                .any(|kw| facts.text.contains(&kw.to_lowercase()))
            {
                score += rule.keyword_weight;
            }
            if score > 0 && facts.has_main_guard && !denied {
                score += rule.guard_bonus;
            }
            if path_patterns.iter().any(|re| re.is_match(path)) {
                score += rule.path_bonus;
            }

            match scores.iter_mut().find(|(r, _)| *r == rule.role) {
                Some((_, s)) => *s += score,
                None => scores.push((rule.role, score)),
            }
        }
        scores
    }

    /// Pick the role with the highest score.
    ///
    /// Ties and all-zero scores defer to the filename; a filename guess that
    /// does not match any tied role falls back to core driver.
    fn pick_role(path: &str, scores: &[(Role, u32)]) -> Role {
        let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        let guess = filename_role(path);
        if best == 0 {
            return guess;
        }
        let tied: Vec<Role> = scores
            .iter()
            .filter(|(_, s)| *s == best)
            .map(|(r, _)| *r)
            .collect();
        match tied.as_slice() {
            [only] => *only,
            _ if tied.contains(&guess) => guess,
            _ => Role::CoreDriver,
        }
    }

    /// Whether a candidate may be a primary entrypoint, before deny patterns
    pub fn is_eligible(intent: Intent, role: Role) -> bool {
        match (intent, role) {
            (Intent::Archive | Intent::Tests | Intent::Docs, _) => false,
            (_, Role::TestHarness) => false,
            (Intent::Runtime, Role::Boot | Role::CoreDriver | Role::CliTool) => true,
            (Intent::Tools | Intent::Gui, Role::Boot | Role::CoreDriver) => true,
            _ => false,
        }
    }

    /// Out-degree normalised by the graph's maximum out-degree
    pub fn centrality(&self, path: &str) -> f64 {
        if self.max_out_degree == 0 {
            return 0.0;
        }
        (self.graph.out_degree(path) as f64 / self.max_out_degree as f64).min(1.0)
    }

    fn role_boost(role: Role, best: u32, denied: bool) -> f64 {
        if denied {
            return 0.0;
        }
        match role {
            Role::Boot | Role::CoreDriver => (best as f64 / ROLE_SCORE_CEILING).min(1.0),
            Role::CliTool => CLI_ROLE_BOOST,
            Role::TestHarness => 0.0,
        }
    }

    /// Tag a single ranked candidate
    pub fn classify(&self, entry: &RankedEntrypoint) -> TaggedEntrypoint {
        let path = entry.path.as_str();
        let facts = self.inspector.inspect(path);
        let intent = Intent::from_path(path);
        let denied = self.is_denied(path);

        let scores = self.score_roles(path, &facts, denied);
        let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        let role = Self::pick_role(path, &scores);
        let behavior_tags: Vec<String> = scores
            .iter()
            .filter(|(_, s)| *s > 0 && *s as f64 >= best as f64 * BEHAVIOR_TAG_RATIO)
            .map(|(r, _)| format!("behavior:{r}"))
            .collect();

        let eligible = !denied && Self::is_eligible(intent, role);

        let coverage = entry.cover_ratio;
        let centrality = self.centrality(path);
        let naming = naming_score(path);
        let role_boost = Self::role_boost(role, best, denied);
        let guard = if facts.has_main_guard { W_GUARD } else { 0.0 };

        let static_signal = naming * W_NAMING + role_boost * W_ROLE + guard;
        let graph_signal = coverage * W_COVERAGE + centrality * W_CENTRALITY;
        let mut score = static_signal + graph_signal;
        if !eligible {
            score *= INELIGIBLE_PENALTY;
        }

        TaggedEntrypoint {
            path: entry.path.clone(),
            intent,
            intent_tags: vec![format!("intent:{intent}")],
            behavior_tags,
            role,
            role_scores: scores.into_iter().collect(),
            eligible,
            denied,
            score: round4(score),
            in_scope: entry.in_scope,
            covered: entry.covered,
            cover_ratio: entry.cover_ratio,
            breakdown: ScoreBreakdown {
                coverage: round4(coverage),
                centrality: round4(centrality),
                naming: round4(naming),
                role: round4(role_boost),
                has_guard: facts.has_main_guard,
                static_signal: round4(static_signal),
                graph_signal: round4(graph_signal),
                trace_partial: self.trace_partial,
            },
        }
    }

    /// Tag every candidate, best composite score first
    pub fn tag_all(&self, ranked: &[RankedEntrypoint]) -> Vec<TaggedEntrypoint> {
        let mut tagged: Vec<TaggedEntrypoint> = ranked.iter().map(|e| self.classify(e)).collect();
        tagged.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.path.cmp(&b.path))
        });
        debug!(
            "Tagged {} entrypoint candidates ({} eligible)",
            tagged.len(),
            tagged.iter().filter(|t| t.eligible).count()
        );
        tagged
    }
}

fn compile(pattern: &str) -> IntegrityResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| IntegrityError::Config(format!("invalid pattern '{pattern}': {e}")))
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests;
