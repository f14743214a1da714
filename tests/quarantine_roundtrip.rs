//! End-to-end scan, quarantine and restore against a real directory tree

use rie::config::EngineTargetConfig;
use rie::evidence::EvidenceBundle;
use rie::pipeline::{Pipeline, ScanOptions};
use rie::quarantine::{Quarantine, Tier};
use std::fs;
use std::path::Path;

const FILES: &[(&str, &str)] = &[
    (
        "engine/main.py",
        "from engine import core\n\nif __name__ == \"__main__\":\n    core.main_loop()\n",
    ),
    ("engine/core.py", "def main_loop():\n    pass\n"),
    ("engine/render.py", "def draw():\n    pass\n"),
    ("engine/ghost.py", "def never_called():\n    pass\n"),
    ("archive/old_tool_v2.py", "print('retired')\n"),
    ("gui/panel.py", "from engine import core\n"),
];

fn setup_repo() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("game");
    for (rel, content) in FILES {
        let path = repo.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    let repo = repo.canonicalize().unwrap();
    (dir, repo)
}

fn evidence(repo: &Path) -> EvidenceBundle {
    let root = repo.display();
    let json = format!(
        r#"{{
        "root": "{root}",
        "files": [
            {{"path": "{root}/engine/main.py", "evidence": ["static_import"], "confidence": "MED"}},
            {{"path": "engine/core.py", "evidence": ["static_import"], "confidence": "MED"}},
            {{"path": "engine/render.py", "evidence": ["static_import"], "confidence": "MED"}},
            {{"path": "engine/ghost.py", "confidence": "LOW"}},
            {{"path": "archive/old_tool_v2.py", "confidence": "LOW"}},
            {{"path": "gui/panel.py", "evidence": ["text_reference"], "confidence": "LOW-MED"}}
        ],
        "static_edges": [
            ["{root}/engine/main.py", "{root}/engine/core.py"],
            ["engine/core.py", "engine/render.py"],
            ["gui/panel.py", "engine/core.py"]
        ],
        "detected_entrypoints": ["{root}/engine/main.py"],
        "runtime_files": ["engine/core.py"]
    }}"#
    );
    let mut bundle: EvidenceBundle = serde_json::from_str(&json).unwrap();
    bundle.normalize(repo);
    bundle
}

#[test]
fn test_apply_then_restore_returns_tree_to_original_state() {
    let (_dir, repo) = setup_repo();
    let report = Pipeline::with_config(&repo, EngineTargetConfig::default())
        .unwrap()
        .scan(evidence(&repo), &ScanOptions::default())
        .unwrap();

    let plan = &report.plan;
    assert_eq!(plan.tier_of("engine/main.py"), Some(Tier::T0));
    assert_eq!(plan.tier_of("engine/render.py"), Some(Tier::T0));
    assert_eq!(plan.tier_of("engine/ghost.py"), Some(Tier::T3));
    assert_eq!(plan.tier_of("archive/old_tool_v2.py"), Some(Tier::T2));
    assert_eq!(plan.tier_of("gui/panel.py"), Some(Tier::T1));

    let quarantine = Quarantine::new(&repo);
    assert_eq!(
        quarantine.quarantine_dir(),
        repo.parent().unwrap().join("_quarantine_game")
    );

    let outcome = quarantine
        .apply(plan, &[Tier::T2, Tier::T3], false)
        .unwrap();
    assert_eq!(outcome.moved.len(), 2);
    assert!(outcome.errors.is_empty());
    assert!(!repo.join("engine/ghost.py").exists());
    assert!(!repo.join("archive").exists(), "empty archive/ should be removed");
    assert!(quarantine
        .quarantine_dir()
        .join("t3/engine/ghost.py")
        .exists());
    assert!(quarantine
        .quarantine_dir()
        .join("t2/archive/old_tool_v2.py")
        .exists());
    assert_eq!(quarantine.load_ledger().len(), 2);

    // Core files are untouched
    assert!(repo.join("engine/main.py").exists());
    assert!(repo.join("engine/render.py").exists());

    let restored = quarantine.restore(None).unwrap();
    assert_eq!(restored.restored.len(), 2);
    assert_eq!(restored.remaining, 0);
    for (rel, content) in FILES {
        assert_eq!(&fs::read_to_string(repo.join(rel)).unwrap(), content);
    }
    assert!(quarantine.load_ledger().is_empty());
}

#[test]
fn test_dry_run_touches_nothing() {
    let (_dir, repo) = setup_repo();
    let report = Pipeline::with_config(&repo, EngineTargetConfig::default())
        .unwrap()
        .scan(evidence(&repo), &ScanOptions::default())
        .unwrap();

    let quarantine = Quarantine::new(&repo);
    let outcome = quarantine.apply(&report.plan, &Tier::MOVABLE, true).unwrap();
    assert_eq!(outcome.would_move.len(), 3);
    assert!(outcome.moved.is_empty());
    assert!(!quarantine.ledger_path().exists());
    for (rel, _) in FILES {
        assert!(repo.join(rel).exists());
    }
}

#[test]
fn test_second_apply_skips_already_moved_files() {
    let (_dir, repo) = setup_repo();
    let report = Pipeline::with_config(&repo, EngineTargetConfig::default())
        .unwrap()
        .scan(evidence(&repo), &ScanOptions::default())
        .unwrap();

    let quarantine = Quarantine::new(&repo);
    quarantine.apply(&report.plan, &[Tier::T3], false).unwrap();
    let again = quarantine.apply(&report.plan, &[Tier::T3], false).unwrap();
    assert!(again.moved.is_empty());
    assert_eq!(again.skipped, vec!["engine/ghost.py"]);
    assert_eq!(quarantine.load_ledger().len(), 1);
}
