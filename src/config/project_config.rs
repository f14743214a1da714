//! Engine target configuration
//!
//! Loads per-repository configuration from `engine_target.toml`,
//! `engine_target.json`, or `engine_target.yaml` in the repository root.
//!
//! # Configuration Format
//!
//! ```toml
//! # engine_target.toml
//! include_roots = ["engine"]
//! exclude = ["blender", "trae"]
//!
//! [surfaces.sim]
//! root = "EndGame/godotsim/"
//!
//! [surfaces.engine]
//! root = "EndGame/"
//!
//! [[cross_surface.allow]]
//! from = "sim"
//! to = "engine"
//!
//! [triangulation]
//! max_k = 10
//! coverage_threshold = 0.95
//! target_mode = "active_or_runtime"
//! ```

use crate::tagger::RoleRule;
use crate::triangulate::TargetMode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Extensions counted as "source files" when nothing is configured
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &[
    "py", "pyw", "js", "mjs", "cjs", "jsx", "ts", "tsx", "rs", "go", "java", "kt", "rb", "php",
    "c", "cc", "cpp", "h", "hpp", "cs", "sh",
];

/// Top-level folders that are periphery (T1) unless they are in engine scope
pub const DEFAULT_PERIPHERY: &[&str] = &[
    "gui",
    "tools",
    "scripts",
    "docs",
    "doc",
    "examples",
    "samples",
    "bench",
    "benchmark",
    "vendor",
    "third_party",
    "external",
];

/// Repository configuration loaded from engine_target.toml or similar
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EngineTargetConfig {
    /// Engine roots used when the target is `engine`
    #[serde(default)]
    pub include_roots: Vec<String>,

    /// Top-level folders forced to periphery
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Explicit surfaces, in declaration order
    #[serde(default)]
    pub surfaces: IndexMap<String, SurfaceConfig>,

    /// Cross-surface edge policy
    #[serde(default)]
    pub cross_surface: CrossSurfaceConfig,

    /// Extra regex patterns that can never be entrypoints
    #[serde(default)]
    pub deny: Vec<String>,

    /// Extensions that count as source files (empty = defaults)
    #[serde(default)]
    pub source_extensions: Vec<String>,

    /// Periphery folder override (empty = defaults)
    #[serde(default)]
    pub periphery: Vec<String>,

    /// Triangulation knobs
    #[serde(default)]
    pub triangulation: TriangulationConfig,

    /// Replacement role signal table (empty = built-in table)
    #[serde(default)]
    pub roles: Vec<RoleRule>,
}

/// One configured surface
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SurfaceConfig {
    /// Root prefix; defaults to `<id>/`
    #[serde(default)]
    pub root: Option<String>,

    /// Free-form type label (default: "configured")
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl SurfaceConfig {
    /// Effective root prefix ending in `/`, or empty for the whole repository
    pub fn root_for(&self, id: &str) -> String {
        let mut root = self.root.clone().unwrap_or_else(|| format!("{id}/"));
        if let Some(rest) = root.strip_prefix("./") {
            root = rest.to_string();
        }
        // Empty root is the whole repository
        if !root.is_empty() && !root.ends_with('/') {
            root.push('/');
        }
        root
    }
}

/// Cross-surface edge allow list
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CrossSurfaceConfig {
    #[serde(default)]
    pub allow: Vec<AllowRule>,
}

/// Permits edges from one surface to another
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AllowRule {
    pub from: String,
    pub to: String,
    /// When true the rule also permits `to -> from` (default: true)
    #[serde(default = "default_true")]
    pub bidirectional: bool,
}

impl AllowRule {
    pub fn permits(&self, src: &str, dst: &str) -> bool {
        (self.from == src && self.to == dst)
            || (self.bidirectional && self.from == dst && self.to == src)
    }
}

fn default_true() -> bool {
    true
}

/// Triangulation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriangulationConfig {
    /// Maximum entrypoints to select (default: 10)
    #[serde(default = "default_max_k")]
    pub max_k: usize,

    /// Stop once this fraction of the target is covered (default: 0.95)
    #[serde(default = "default_coverage_threshold")]
    pub coverage_threshold: f64,

    /// Which files make up the liveness target
    #[serde(default)]
    pub target_mode: TargetMode,
}

impl Default for TriangulationConfig {
    fn default() -> Self {
        Self {
            max_k: default_max_k(),
            coverage_threshold: default_coverage_threshold(),
            target_mode: TargetMode::default(),
        }
    }
}

fn default_max_k() -> usize {
    10
}

fn default_coverage_threshold() -> f64 {
    0.95
}

/// Load engine target configuration from the repository root.
///
/// Searches for configuration files in this order:
/// 1. `engine_target.toml`
/// 2. `engine_target.json`
/// 3. `engine_target.yaml` / `engine_target.yml`
///
/// Returns `None` if no config file is found or none could be parsed.
pub fn load_engine_target(repo_path: &Path) -> Option<EngineTargetConfig> {
    let toml_path = repo_path.join("engine_target.toml");
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded engine target from {}", toml_path.display());
                return Some(config);
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = repo_path.join("engine_target.json");
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded engine target from {}", json_path.display());
                return Some(config);
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    for yaml_name in &["engine_target.yaml", "engine_target.yml"] {
        let yaml_path = repo_path.join(yaml_name);
        if yaml_path.exists() {
            match load_yaml_config(&yaml_path) {
                Ok(config) => {
                    debug!("Loaded engine target from {}", yaml_path.display());
                    return Some(config);
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", yaml_path.display(), e);
                }
            }
        }
    }

    debug!("No engine target config found, using heuristics");
    None
}

fn load_toml_config(path: &Path) -> anyhow::Result<EngineTargetConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: EngineTargetConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

fn load_json_config(path: &Path) -> anyhow::Result<EngineTargetConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: EngineTargetConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

fn load_yaml_config(path: &Path) -> anyhow::Result<EngineTargetConfig> {
    let content = std::fs::read_to_string(path)?;

    // YAML is a superset of JSON, so pure-JSON YAML files work
    if let Ok(config) = serde_json::from_str::<EngineTargetConfig>(&content) {
        config.validate()?;
        return Ok(config);
    }

    anyhow::bail!(
        "YAML config files with non-JSON syntax are not supported.\n\
         Please convert {} to TOML (engine_target.toml) or use JSON syntax.",
        path.display()
    )
}

impl EngineTargetConfig {
    /// Reject values that would make triangulation meaningless
    pub fn validate(&self) -> Result<(), crate::error::IntegrityError> {
        use crate::error::IntegrityError;

        let t = &self.triangulation;
        if !(0.0..=1.0).contains(&t.coverage_threshold) {
            return Err(IntegrityError::Config(format!(
                "triangulation.coverage_threshold must be within 0..=1, got {}",
                t.coverage_threshold
            )));
        }
        for pattern in &self.deny {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(IntegrityError::Config(format!(
                    "invalid deny pattern '{pattern}': {e}"
                )));
            }
        }
        Ok(())
    }

    /// True if explicit surfaces are configured
    pub fn has_surfaces(&self) -> bool {
        !self.surfaces.is_empty()
    }

    /// Effective source extensions
    pub fn source_extensions(&self) -> Vec<String> {
        if self.source_extensions.is_empty() {
            DEFAULT_SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect()
        } else {
            self.source_extensions
                .iter()
                .map(|s| s.trim_start_matches('.').to_lowercase())
                .collect()
        }
    }

    /// Effective periphery folder list
    pub fn periphery_dirs(&self) -> Vec<String> {
        if self.periphery.is_empty() {
            DEFAULT_PERIPHERY.iter().map(|s| s.to_string()).collect()
        } else {
            self.periphery.iter().map(|s| s.to_lowercase()).collect()
        }
    }

    /// Check whether an edge between two surfaces is allowed
    pub fn is_cross_allowed(&self, src: &str, dst: &str) -> bool {
        self.cross_surface.allow.iter().any(|r| r.permits(src, dst))
    }
}

/// Decides which paths count as source files
#[derive(Debug, Clone)]
pub struct SourceFilter {
    extensions: Vec<String>,
}

impl SourceFilter {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    pub fn from_config(config: &EngineTargetConfig) -> Self {
        Self::new(config.source_extensions())
    }

    pub fn is_source(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self::from_config(&EngineTargetConfig::default())
    }
}

/// Template written by `rie init`
pub const CONFIG_TEMPLATE: &str = r#"# Repository Integrity Engine configuration
#
# Engine roots used by `rie scan --target engine`
# include_roots = ["engine"]

# Top-level folders that are always periphery (tier 1)
# exclude = ["blender", "experiments"]

# Explicit surfaces. When present, no surface heuristics run.
# [surfaces.engine]
# root = "engine/"
#
# [surfaces.gui]
# root = "gui/"

# Cross-surface edges that are not policy violations
# [[cross_surface.allow]]
# from = "gui"
# to = "engine"
# bidirectional = false

# Extra patterns that may never be entrypoints
# deny = ["(?:^|/)sandbox/"]

[triangulation]
max_k = 10
coverage_threshold = 0.95
target_mode = "active_or_runtime"
"#;
