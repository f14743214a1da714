use super::*;
use crate::models::{Confidence, FileRecord};
use std::collections::BTreeSet;

const SERVER_SRC: &str = "import socket\n\nsock.bind(('0.0.0.0', 80))\n\nif __name__ == '__main__':\n    main()\n";
const CLI_SRC: &str = "import argparse\nparser = argparse.ArgumentParser()\nparser.add_argument('x')\nargs = parser.parse_args()\n\nif __name__ == '__main__':\n    run(args)\n";
const TEST_SRC: &str = "import pytest\n\ndef test_boot():\n    assert True\n";

fn ranked(path: &str, cover_ratio: f64) -> RankedEntrypoint {
    RankedEntrypoint {
        path: path.to_string(),
        reachable_count: 1,
        covered: 1,
        cover_ratio,
        in_scope: true,
        reach: BTreeSet::from([path.to_string()]),
    }
}

fn graph() -> DependencyGraph {
    let files: Vec<FileRecord> = [
        "engine/server.py",
        "engine/a.py",
        "engine/b.py",
        "tools/convert.py",
        "tests/test_engine.py",
    ]
    .iter()
    .map(|p| FileRecord::new(*p, Confidence::Med))
    .collect();
    let edges = vec![
        ("engine/server.py".to_string(), "engine/a.py".to_string()),
        ("engine/server.py".to_string(), "engine/b.py".to_string()),
        ("tools/convert.py".to_string(), "engine/a.py".to_string()),
    ];
    DependencyGraph::build(&files, &edges, &[])
}

fn inspector() -> MapInspector {
    MapInspector::new()
        .with_source("engine/server.py", SERVER_SRC)
        .with_source("tools/convert.py", CLI_SRC)
        .with_source("tests/test_engine.py", TEST_SRC)
        .with_source("web/app.py", "import flask\nimport click\n")
        .with_source("engine/loop.py", "import flask\nimport click\n")
}

#[test]
fn test_boot_server_composite_score() {
    let graph = graph();
    let inspector = inspector();
    let tagger = EntryTagger::new(&graph, &inspector, &EngineTargetConfig::default()).unwrap();
    let tagged = tagger.classify(&ranked("engine/server.py", 1.0));

    assert_eq!(tagged.intent, Intent::Runtime);
    assert_eq!(tagged.role, Role::Boot);
    assert_eq!(tagged.role_scores[&Role::Boot], 12);
    assert!(tagged.eligible);
    assert!(!tagged.denied);
    assert!(tagged.breakdown.has_guard);
    assert!((tagged.breakdown.centrality - 1.0).abs() < 1e-9);
    assert!((tagged.breakdown.role - 1.0).abs() < 1e-9);

    // 0.35 coverage + 0.25 centrality + 0.15 * 0.10 naming + 0.15 role + 0.10 guard
    assert!((tagged.score - 0.865).abs() < 1e-4);
    assert!((tagged.breakdown.static_signal - 0.265).abs() < 1e-4);
    assert!((tagged.breakdown.graph_signal - 0.6).abs() < 1e-4);
    assert_eq!(tagged.intent_tags, vec!["intent:runtime".to_string()]);
    assert_eq!(
        tagged.behavior_tags,
        vec!["behavior:infrastructure_boot".to_string()]
    );
}

#[test]
fn test_cli_under_tools_is_ineligible() {
    let graph = graph();
    let inspector = inspector();
    let tagger = EntryTagger::new(&graph, &inspector, &EngineTargetConfig::default()).unwrap();
    let tagged = tagger.classify(&ranked("tools/convert.py", 0.5));

    assert_eq!(tagged.intent, Intent::Tools);
    assert_eq!(tagged.role, Role::CliTool);
    assert_eq!(tagged.role_scores[&Role::CliTool], 13);
    assert!(!tagged.eligible);
    assert!((tagged.breakdown.role - 0.3).abs() < 1e-9);

    let unpenalised = tagged.breakdown.static_signal + tagged.breakdown.graph_signal;
    assert!((tagged.score - unpenalised * 0.3).abs() < 1e-3);
}

#[test]
fn test_test_harness_is_denied() {
    let graph = graph();
    let inspector = inspector();
    let tagger = EntryTagger::new(&graph, &inspector, &EngineTargetConfig::default()).unwrap();
    let tagged = tagger.classify(&ranked("tests/test_engine.py", 1.0));

    assert_eq!(tagged.intent, Intent::Tests);
    assert_eq!(tagged.role, Role::TestHarness);
    assert_eq!(tagged.role_scores[&Role::TestHarness], 14);
    assert!(tagged.denied);
    assert!(!tagged.eligible);
    assert_eq!(tagged.breakdown.role, 0.0);
}

#[test]
fn test_zero_scores_fall_back_to_filename() {
    let graph = graph();
    let inspector = MapInspector::new();
    let tagger = EntryTagger::new(&graph, &inspector, &EngineTargetConfig::default()).unwrap();

    assert_eq!(tagger.classify(&ranked("engine/loop.py", 0.0)).role, Role::CoreDriver);
    assert_eq!(tagger.classify(&ranked("web/server.py", 0.0)).role, Role::Boot);
    let tagged = tagger.classify(&ranked("pkg/test_x.py", 0.0));
    assert_eq!(tagged.role, Role::TestHarness);
    assert!(tagged.behavior_tags.len() == 1);
}

#[test]
fn test_tied_roles() {
    let graph = graph();
    let inspector = inspector();
    let tagger = EntryTagger::new(&graph, &inspector, &EngineTargetConfig::default()).unwrap();

    let app = tagger.classify(&ranked("web/app.py", 0.0));
    assert_eq!(app.role_scores[&Role::Boot], 5);
    assert_eq!(app.role_scores[&Role::CliTool], 5);
    assert_eq!(app.role, Role::Boot);
    assert_eq!(app.behavior_tags.len(), 2);

    let lp = tagger.classify(&ranked("engine/loop.py", 0.0));
    assert_eq!(lp.role, Role::CoreDriver);
}

#[test]
fn test_eligibility_matrix() {
    use Intent::*;
    use Role::*;
    assert!(EntryTagger::is_eligible(Runtime, Boot));
    assert!(EntryTagger::is_eligible(Runtime, CoreDriver));
    assert!(EntryTagger::is_eligible(Runtime, CliTool));
    assert!(EntryTagger::is_eligible(Tools, Boot));
    assert!(EntryTagger::is_eligible(Gui, CoreDriver));
    assert!(!EntryTagger::is_eligible(Gui, CliTool));
    assert!(!EntryTagger::is_eligible(Runtime, TestHarness));
    assert!(!EntryTagger::is_eligible(Archive, Boot));
    assert!(!EntryTagger::is_eligible(Tests, CoreDriver));
    assert!(!EntryTagger::is_eligible(Docs, Boot));
}

#[test]
fn test_configured_deny_pattern() {
    let graph = graph();
    let inspector = MapInspector::new();
    let config = EngineTargetConfig {
        deny: vec!["(?:^|/)sandbox/".to_string()],
        ..Default::default()
    };
    let tagger = EntryTagger::new(&graph, &inspector, &config).unwrap();
    let tagged = tagger.classify(&ranked("sandbox/main.py", 1.0));
    assert!(tagged.denied);
    assert!(!tagged.eligible);
}

#[test]
fn test_custom_role_table() {
    let graph = graph();
    let inspector = MapInspector::new().with_source("jobs/nightly.py", "import celery\n");
    let config: EngineTargetConfig = toml::from_str(
        r#"
[[roles]]
role = "core_driver"
imports = ["celery"]
import_weight = 12
"#,
    )
    .unwrap();
    let tagger = EntryTagger::new(&graph, &inspector, &config).unwrap();
    let tagged = tagger.classify(&ranked("jobs/nightly.py", 0.0));
    assert_eq!(tagged.role, Role::CoreDriver);
    assert!((tagged.breakdown.role - 1.0).abs() < 1e-9);
    assert_eq!(tagged.role_scores.len(), 1);
}

#[test]
fn test_invalid_role_pattern_is_config_error() {
    let graph = graph();
    let inspector = MapInspector::new();
    let mut config = EngineTargetConfig::default();
    let mut rule = default_role_rules().remove(0);
    rule.path_patterns = vec!["(broken".to_string()];
    config.roles = vec![rule];
    assert!(matches!(
        EntryTagger::new(&graph, &inspector, &config),
        Err(IntegrityError::Config(_))
    ));
}

#[test]
fn test_tag_all_sorts_and_flags_partial_trace() {
    let graph = graph();
    let inspector = inspector();
    let tagger = EntryTagger::new(&graph, &inspector, &EngineTargetConfig::default())
        .unwrap()
        .with_trace_partial(true);
    let tagged = tagger.tag_all(&[
        ranked("tests/test_engine.py", 1.0),
        ranked("engine/server.py", 1.0),
        ranked("tools/convert.py", 0.5),
    ]);

    assert_eq!(tagged[0].path, "engine/server.py");
    for pair in tagged.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert!(tagged.iter().all(|t| t.breakdown.trace_partial));
}
