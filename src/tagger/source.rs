//! Source inspection for role scoring
//!
//! The tagger only needs coarse facts about a file: which top-level modules
//! it imports, its text for keyword matching, and whether it has a top-level
//! execution guard. [`FsInspector`] reads them from disk with regexes;
//! [`MapInspector`] serves canned facts for tests and callers that already
//! hold the source in memory.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Files larger than this are not inspected
const MAX_INSPECT_BYTES: u64 = 2 * 1024 * 1024;

/// Coarse facts about one source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFacts {
    /// Top-level imported module names, lowercased
    pub imports: BTreeSet<String>,
    /// Lowercased source text
    pub text: String,
    pub has_main_guard: bool,
}

impl SourceFacts {
    /// Extract facts from source text
    pub fn from_source(source: &str) -> Self {
        Self {
            imports: extract_imports(source),
            text: source.to_lowercase(),
            has_main_guard: guard_pattern().is_match(source),
        }
    }
}

/// Supplies [`SourceFacts`] for repo-relative paths
pub trait SourceInspector: Send + Sync {
    /// Facts for `path`; unreadable or missing files yield empty facts
    fn inspect(&self, path: &str) -> SourceFacts;
}

/// Reads files below a repository root
pub struct FsInspector {
    root: PathBuf,
}

impl FsInspector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, path: &Path) -> Option<String> {
        let meta = std::fs::metadata(path).ok()?;
        if !meta.is_file() || meta.len() > MAX_INSPECT_BYTES {
            return None;
        }
        let bytes = std::fs::read(path).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl SourceInspector for FsInspector {
    fn inspect(&self, path: &str) -> SourceFacts {
        let full = self.root.join(path);
        match self.read(&full) {
            Some(source) => SourceFacts::from_source(&source),
            None => {
                debug!("No readable source for {}", path);
                SourceFacts::default()
            }
        }
    }
}

/// In-memory sources keyed by repo-relative path
#[derive(Default)]
pub struct MapInspector {
    sources: HashMap<String, String>,
}

impl MapInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, path: &str, source: &str) -> Self {
        self.sources.insert(path.to_string(), source.to_string());
        self
    }
}

impl SourceInspector for MapInspector {
    fn inspect(&self, path: &str) -> SourceFacts {
        self.sources
            .get(path)
            .map(|s| SourceFacts::from_source(s))
            .unwrap_or_default()
    }
}

static IMPORT_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
static GUARD_PATTERN: OnceLock<Regex> = OnceLock::new();

fn import_patterns() -> &'static [Regex] {
    IMPORT_PATTERNS.get_or_init(|| {
        [
            // Python
            r"(?m)^\s*import\s+([A-Za-z_][\w\.]*)",
            r"(?m)^\s*from\s+([A-Za-z_][\w\.]*)\s+import\b",
            // JavaScript / TypeScript
            r#"require\(\s*['"]([^'"]+)['"]\s*\)"#,
            r#"(?m)^\s*import\s+(?:[^'";]*?\s+from\s+)?['"]([^'"]+)['"]"#,
            // Rust
            r"(?m)^\s*(?:pub\s+)?use\s+([A-Za-z_]\w*)",
            r"(?m)^\s*extern\s+crate\s+([A-Za-z_]\w*)",
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

fn guard_pattern() -> &'static Regex {
    GUARD_PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?m)^if\s+__name__\s*==\s*['"]__main__['"]|require\.main\s*===?\s*module|^\s*(?:pub\s+)?(?:async\s+)?fn\s+main\s*\("#,
        )
        .expect("valid regex")
    })
}

/// Reduce an import specifier to its top-level module name
fn module_root(spec: &str) -> Option<String> {
    let spec = spec.strip_prefix("node:").unwrap_or(spec);
    if spec.starts_with('.') || spec.starts_with('/') {
        return None;
    }
    let root = if let Some(scoped) = spec.strip_prefix('@') {
        scoped.split('/').nth(1).unwrap_or(scoped)
    } else {
        spec.split(['.', '/']).next().unwrap_or(spec)
    };
    if root.is_empty() || matches!(root, "crate" | "self" | "super" | "std") {
        return None;
    }
    Some(root.to_lowercase())
}

/// Top-level module names imported by a source text
pub fn extract_imports(source: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for re in import_patterns() {
        for caps in re.captures_iter(source) {
            if let Some(root) = caps.get(1).and_then(|m| module_root(m.as_str())) {
                out.insert(root);
            }
        }
    }
    out
}
