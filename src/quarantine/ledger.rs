//! Transaction ledger for quarantine moves
//!
//! The ledger is the only authority for reversing a move. It lives in the
//! quarantine directory, outside the scanned repository, and is rewritten
//! atomically (temp file, fsync, rename) once per batch.

use super::Tier;
use crate::error::IntegrityError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LEDGER_VERSION: u32 = 1;
const TEMP_SUFFIX: &str = ".tmp";

/// One recorded move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Absolute original location
    pub src: PathBuf,
    /// Absolute location inside the quarantine directory
    pub dst: PathBuf,
    /// Repo-relative path
    pub rel: String,
    pub tier: Tier,
    pub timestamp: DateTime<Utc>,
}

/// Ordered list of moves still in quarantine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub moves: Vec<LedgerEntry>,
}

fn default_version() -> u32 {
    LEDGER_VERSION
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            created: None,
            moves: Vec::new(),
        }
    }
}

impl Ledger {
    /// Load a ledger; a missing file is an empty ledger.
    ///
    /// A malformed ledger is also treated as empty and logged, so a damaged
    /// file never blocks planning. Moves it recorded cannot be restored
    /// automatically.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No ledger at {}", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!(
                    "{}",
                    IntegrityError::LedgerUnreadable {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    }
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<Ledger>(&content) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(
                    "{}; treating it as empty",
                    IntegrityError::LedgerUnreadable {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    }
                );
                Self::default()
            }
        }
    }

    /// Persist the whole ledger atomically
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        atomic_write(path, &json)
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn record(&mut self, entry: LedgerEntry) {
        if self.created.is_none() {
            self.created = Some(entry.timestamp);
        }
        self.moves.push(entry);
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path `{}` has no parent directory", path.display()),
        )
    })?;
    fs::create_dir_all(parent)?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!("{TEMP_SUFFIX}.{}", std::process::id()));
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| -> io::Result<()> {
        let mut tmp = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, path)?;
        sync_dir(parent)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rel: &str) -> LedgerEntry {
        LedgerEntry {
            src: PathBuf::from(format!("/repo/{rel}")),
            dst: PathBuf::from(format!("/q/t3/{rel}")),
            rel: rel.to_string(),
            tier: Tier::T3,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(&dir.path().join("none.json"));
        assert!(ledger.is_empty());
        assert_eq!(ledger.version, LEDGER_VERSION);
    }

    #[test]
    fn test_malformed_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".rie_ledger.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Ledger::load(&path).is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q").join(".rie_ledger.json");

        let mut ledger = Ledger::default();
        ledger.record(entry("a.py"));
        ledger.record(entry("pkg/b.py"));
        ledger.save(&path).unwrap();

        let loaded = Ledger::load(&path);
        assert_eq!(loaded, ledger);
        assert!(loaded.created.is_some());

        let leftovers: Vec<String> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.contains(TEMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
    }

    #[test]
    fn test_ledger_json_shape() {
        let json = r#"{"moves": [{"src": "/r/a.py", "dst": "/q/t1/a.py", "rel": "a.py",
            "tier": "t1", "timestamp": "2024-01-01T00:00:00Z"}]}"#;
        let ledger: Ledger = serde_json::from_str(json).unwrap();
        assert_eq!(ledger.version, 1);
        assert_eq!(ledger.moves[0].tier, Tier::T1);
    }
}
