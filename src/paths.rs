//! Path utilities
//!
//! - cache: `~/.cache/rie/<repo-hash>/` (never inside the scanned repo)
//! - quarantine: `<parent>/_quarantine_<repo-name>/`, a sibling of the repo

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Ledger file name inside the quarantine directory
pub const LEDGER_FILE: &str = ".rie_ledger.json";

/// Cache directory for a repository.
/// Uses ~/.cache/rie/<repo-hash>/ on Unix, %LOCALAPPDATA%/rie/<repo-hash>/ on Windows.
pub fn get_cache_dir(repo_path: &Path) -> PathBuf {
    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("rie").join(hash_path(repo_path))
}

/// Cached report of the most recent scan
pub fn get_last_scan_path(repo_path: &Path) -> PathBuf {
    get_cache_dir(repo_path).join("last_scan.json")
}

/// Quarantine directory, a sibling of the repository root
pub fn quarantine_dir(repo_path: &Path) -> PathBuf {
    let canonical = repo_path
        .canonicalize()
        .unwrap_or_else(|_| repo_path.to_path_buf());
    let name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo");
    let parent = canonical.parent().unwrap_or(&canonical);
    parent.join(format!("_quarantine_{name}"))
}

pub fn ledger_path(quarantine_dir: &Path) -> PathBuf {
    quarantine_dir.join(LEDGER_FILE)
}

/// Deterministic directory name for a repository: `<name>-<sha256 prefix>`
fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();

    let repo_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(20)
        .collect::<String>();

    format!("{}-{}", repo_name, hex)
}

/// Ensure the cache directory exists
pub fn ensure_cache_dir(repo_path: &Path) -> std::io::Result<PathBuf> {
    let cache_dir = get_cache_dir(repo_path);
    std::fs::create_dir_all(&cache_dir)?;
    Ok(cache_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_path_deterministic() {
        let path = Path::new("/tmp/test-repo");
        assert_eq!(hash_path(path), hash_path(path));
        assert!(hash_path(path).starts_with("test-repo-"));
    }

    #[test]
    fn test_cache_dir_format() {
        let cache = get_cache_dir(Path::new("/home/user/my-project"));
        assert!(cache.to_string_lossy().contains("rie"));
        assert!(cache.to_string_lossy().contains("my-project"));
    }

    #[test]
    fn test_quarantine_dir_is_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("game");
        std::fs::create_dir(&repo).unwrap();
        let q = quarantine_dir(&repo);
        assert_eq!(q.file_name().unwrap(), "_quarantine_game");
        assert_eq!(q.parent(), repo.canonicalize().unwrap().parent());
        assert_eq!(ledger_path(&q).file_name().unwrap(), LEDGER_FILE);
    }
}
