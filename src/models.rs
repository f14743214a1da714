//! Core data models for the integrity engine
//!
//! `FileRecord` is the unit every phase works on: the evidence collectors
//! create one per discovered file, later phases fill in surface and domain
//! data, and reporting reads the final state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path};

/// Kind of evidence showing that a file is alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    /// Imported by another file according to static extraction
    StaticImport,
    /// Observed loading during a runtime trace
    RuntimeTrace,
    /// Mentioned by name in free text (configs, docs, scripts)
    TextReference,
}

impl std::fmt::Display for Evidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Evidence::StaticImport => write!(f, "static_import"),
            Evidence::RuntimeTrace => write!(f, "runtime_trace"),
            Evidence::TextReference => write!(f, "text_reference"),
        }
    }
}

/// Confidence that a file is live. Ordered: `Low < LowMed < Med < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Confidence {
    #[default]
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "LOW-MED", alias = "LOW_MED")]
    LowMed,
    #[serde(rename = "MED")]
    Med,
    #[serde(rename = "HIGH")]
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "LOW"),
            Confidence::LowMed => write!(f, "LOW-MED"),
            Confidence::Med => write!(f, "MED"),
            Confidence::High => write!(f, "HIGH"),
        }
    }
}

/// Liveness status, derived from confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Active,
    #[default]
    Legacy,
}

impl Status {
    /// ACTIVE iff confidence is MED or better
    pub fn from_confidence(confidence: Confidence) -> Self {
        if confidence >= Confidence::Med {
            Status::Active
        } else {
            Status::Legacy
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Active => write!(f, "ACTIVE"),
            Status::Legacy => write!(f, "LEGACY"),
        }
    }
}

/// One discovered file and everything known about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Repo-relative path with `/` separators (unique key)
    #[serde(alias = "file")]
    pub path: String,
    #[serde(default)]
    pub evidence: BTreeSet<Evidence>,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub status: Status,
    /// Assigned by the surface resolver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_id: Option<String>,
    /// Assigned by the external domain resolver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            path: path.into(),
            evidence: BTreeSet::new(),
            confidence,
            status: Status::from_confidence(confidence),
            surface_id: None,
            domain: None,
            intent: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.insert(evidence);
        self
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    /// Change confidence and re-derive status
    pub fn set_confidence(&mut self, confidence: Confidence) {
        self.confidence = confidence;
        self.status = Status::from_confidence(confidence);
    }

    /// Re-derive status from the current confidence (used after loading raw input)
    pub fn normalize_status(&mut self) {
        self.status = Status::from_confidence(self.confidence);
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn has_evidence(&self) -> bool {
        !self.evidence.is_empty()
    }

    pub fn is_runtime_traced(&self) -> bool {
        self.evidence.contains(&Evidence::RuntimeTrace)
    }

    /// Top-level folder, or `None` for root-level loose files
    pub fn top_level(&self) -> Option<&str> {
        top_level_folder(&self.path)
    }
}

/// Top-level folder of a repo-relative path, `None` for root-level files
pub fn top_level_folder(path: &str) -> Option<&str> {
    match path.split_once('/') {
        Some((top, rest)) if !top.is_empty() && !rest.is_empty() => Some(top),
        _ => None,
    }
}

/// True if `path` equals `prefix` or lives underneath it. An empty prefix
/// is the repository root and covers every path.
pub fn path_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    prefix.is_empty()
        || path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'/')
}

/// True if `path` is relative and stays inside the repository: no `..`,
/// no root or drive prefix.
pub fn is_contained_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
