//! Signal tables for entrypoint tagging
//!
//! Roles are scored from ordered, data-driven rules. A rule lists imported
//! module names (strong signal) and source keywords (weaker signal, counted
//! once per rule), plus optional bonuses. The built-in table can be replaced
//! from `engine_target.toml` via `[[roles]]`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Behavioral role of an entrypoint candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "infrastructure_boot", alias = "boot")]
    Boot,
    #[serde(rename = "core_logic_driver", alias = "core_driver")]
    CoreDriver,
    #[serde(rename = "tooling_cli", alias = "cli")]
    CliTool,
    #[serde(rename = "test_harness")]
    TestHarness,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Boot => "infrastructure_boot",
            Role::CoreDriver => "core_logic_driver",
            Role::CliTool => "tooling_cli",
            Role::TestHarness => "test_harness",
        }
    }

    /// Roles that may run an engine
    pub fn is_engine_role(&self) -> bool {
        matches!(self, Role::Boot | Role::CoreDriver | Role::CliTool)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a file should live, judged from its path alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Archive,
    Tests,
    Tools,
    Docs,
    Gui,
    Runtime,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Archive => "archive",
            Intent::Tests => "tests",
            Intent::Tools => "tools",
            Intent::Docs => "docs",
            Intent::Gui => "gui",
            Intent::Runtime => "runtime",
        }
    }

    /// Evaluate the intent predicates in priority order; first match wins
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_lowercase();
        let mut segments: Vec<&str> = lower.split('/').collect();
        let file_name = segments.pop().unwrap_or("");
        let has_dir = |names: &[&str]| segments.iter().any(|s| names.contains(s));

        if has_dir(&["archive"]) {
            Intent::Archive
        } else if has_dir(&["tests", "test"]) || file_name.starts_with("test_") {
            Intent::Tests
        } else if has_dir(&["tools"]) {
            Intent::Tools
        } else if has_dir(&["docs", "doc"]) {
            Intent::Docs
        } else if has_dir(&["gui"]) {
            Intent::Gui
        } else {
            Intent::Runtime
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role's scoring rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRule {
    pub role: Role,

    /// Top-level module names whose import signals this role
    #[serde(default)]
    pub imports: Vec<String>,

    /// Case-insensitive source markers; any number of hits scores once
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default = "default_import_weight")]
    pub import_weight: u32,

    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: u32,

    /// Added when the file has a top-level execution guard and the rule
    /// already matched something
    #[serde(default)]
    pub guard_bonus: u32,

    /// Regexes over the repo-relative path that earn `path_bonus`
    #[serde(default)]
    pub path_patterns: Vec<String>,

    #[serde(default)]
    pub path_bonus: u32,
}

fn default_import_weight() -> u32 {
    5
}

fn default_keyword_weight() -> u32 {
    4
}

impl RoleRule {
    fn new(role: Role, imports: &[&str], keywords: &[&str]) -> Self {
        Self {
            role,
            imports: imports.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            import_weight: default_import_weight(),
            keyword_weight: default_keyword_weight(),
            guard_bonus: 0,
            path_patterns: Vec::new(),
            path_bonus: 0,
        }
    }
}

/// Built-in role table, in tie-break order
pub fn default_role_rules() -> Vec<RoleRule> {
    let mut boot = RoleRule::new(
        Role::Boot,
        &[
            "socket", "flask", "fastapi", "http", "uvicorn", "aiohttp", "tornado", "bottle",
            "cherrypy", "gunicorn", "waitress", "starlette", "websockets", "grpc", "xmlrpc",
            "express", "koa", "hyper", "axum", "actix_web", "tokio",
        ],
        &[
            "bind",
            "listen",
            "server.start",
            "run_forever",
            "serve",
            "app.run",
            "uvicorn.run",
            "serve_forever",
            "start_server",
        ],
    );
    boot.guard_bonus = 3;

    let driver = RoleRule::new(
        Role::CoreDriver,
        &[
            "rules",
            "scene",
            "config",
            "engine",
            "state_machine",
            "kernel",
            "runtime",
            "scheduler",
            "dispatcher",
            "pipeline",
            "processor",
        ],
        &[
            "load_scene",
            "evaluate_rule",
            "run_cycle",
            "main_loop",
            "execute_action",
            "process_frame",
            "tick",
            "update",
            "step",
            "game_loop",
            "simulation",
            "run_engine",
        ],
    );

    let mut cli = RoleRule::new(
        Role::CliTool,
        &[
            "argparse", "click", "typer", "fire", "optparse", "getopt", "clap", "commander",
            "yargs",
        ],
        &[
            "add_argument",
            "parse_args",
            "click.command",
            "click.group",
            "typer.run",
            "fire.fire",
            "parser.parse_args",
        ],
    );
    cli.guard_bonus = 4;

    let mut harness = RoleRule::new(
        Role::TestHarness,
        &["unittest", "pytest", "nose", "doctest", "hypothesis", "jest", "mocha"],
        &[
            "testcase",
            "assertequal",
            "assert_called",
            "test_",
            "fixture",
            "parametrize",
            "mock.patch",
        ],
    );
    harness.path_patterns = vec![
        r"(?i)(?:^|/)test_[^/]*$".to_string(),
        r"(?i)(?:^|/)tests/".to_string(),
    ];
    harness.path_bonus = 5;

    vec![boot, driver, cli, harness]
}

/// Filename patterns that suggest an engine entrypoint, with their weights
static NAMING_PATTERNS: OnceLock<Vec<(Regex, f64)>> = OnceLock::new();

pub fn naming_patterns() -> &'static [(Regex, f64)] {
    NAMING_PATTERNS.get_or_init(|| {
        [
            (r"(?i)(?:^|/)(?:launch|boot|start)\w*\.\w+$", 0.15),
            (r"(?i)(?:^|/)main\.\w+$", 0.10),
            (r"(?i)(?:^|/)(?:server|app|wsgi|asgi)\.\w+$", 0.10),
            (r"(?i)(?:^|/)(?:run|entry|init)\w*\.\w+$", 0.08),
            (r"(?i)(?:^|/)(?:engine|runtime|driver|core)\w*\.\w+$", 0.08),
            (r"(?i)(?:^|/)sim_runtime\w*\.\w+$", 0.10),
        ]
        .into_iter()
        .map(|(p, w)| (Regex::new(p).expect("valid regex"), w))
        .collect()
    })
}

/// Paths that can never be primary entrypoints
static DENY_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

pub fn deny_patterns() -> &'static [Regex] {
    DENY_PATTERNS.get_or_init(|| {
        [
            r"(?i)(?:^|/)tests?/",
            r"(?i)(?:^|/)test_",
            r"(?i)(?:^|/)docs?/",
            r"(?i)(?:^|/)archive/",
            r"(?i)(?:^|/)__pycache__/",
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

/// Summed naming weights, capped at 1.0
pub fn naming_score(path: &str) -> f64 {
    naming_patterns()
        .iter()
        .filter(|(re, _)| re.is_match(path))
        .map(|(_, w)| w)
        .sum::<f64>()
        .min(1.0)
}

/// Role guessed from the filename alone
pub fn filename_role(path: &str) -> Role {
    let lower = path.to_lowercase();
    let file_name = lower.rsplit('/').next().unwrap_or(&lower);
    if file_name.starts_with("test_") || lower.contains("/tests/") || lower.starts_with("tests/") {
        Role::TestHarness
    } else if ["server", "app", "launch", "boot"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        Role::Boot
    } else {
        Role::CoreDriver
    }
}
