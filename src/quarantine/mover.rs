//! Applying and restoring quarantine moves
//!
//! Per-file failures never abort a batch: they are collected as
//! [`FileError`]s next to the successes. The ledger is persisted once per
//! batch, after every move has been attempted. A failed ledger write is
//! reported in the outcome rather than as `Err`, so the caller still learns
//! which files moved. A crash mid-batch can leave moved files without a
//! ledger record.

use super::ledger::{Ledger, LedgerEntry};
use super::{QuarantinePlan, Tier};
use crate::error::{FileError, IntegrityError, IntegrityResult};
use crate::models::is_contained_path;
use crate::paths;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A file the plan would move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMove {
    pub file: String,
    pub tier: Tier,
}

/// Result of [`Quarantine::apply`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub dry_run: bool,
    pub tiers: Vec<Tier>,
    /// Filled for dry runs only
    pub would_move: Vec<PlannedMove>,
    pub moved: Vec<String>,
    /// Files already absent from the repository
    pub skipped: Vec<String>,
    pub errors: Vec<FileError>,
    pub ledger_path: PathBuf,
    /// Set when the ledger could not be written; `moved` then lists files
    /// that `restore` cannot bring back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_error: Option<FileError>,
    pub removed_dirs: usize,
}

/// Result of [`Quarantine::restore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreOutcome {
    pub restored: Vec<String>,
    pub errors: Vec<FileError>,
    /// Entries still in the ledger afterwards
    pub remaining: usize,
}

/// Moves files between a repository and its sibling quarantine directory
pub struct Quarantine {
    repo_root: PathBuf,
    quarantine_dir: PathBuf,
}

impl Quarantine {
    /// Quarantine for a repository, using the default sibling directory
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let quarantine_dir = paths::quarantine_dir(&repo_root);
        Self::with_dir(repo_root, quarantine_dir)
    }

    pub fn with_dir(repo_root: impl Into<PathBuf>, quarantine_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            quarantine_dir: quarantine_dir.into(),
        }
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine_dir
    }

    pub fn ledger_path(&self) -> PathBuf {
        paths::ledger_path(&self.quarantine_dir)
    }

    pub fn load_ledger(&self) -> Ledger {
        Ledger::load(&self.ledger_path())
    }

    /// Move every file of the requested tiers into `<quarantine>/<tier>/<path>`.
    ///
    /// T0 is never moved. A dry run only lists the planned moves.
    pub fn apply(
        &self,
        plan: &QuarantinePlan,
        tiers: &[Tier],
        dry_run: bool,
    ) -> IntegrityResult<ApplyOutcome> {
        if tiers.contains(&Tier::T0) {
            warn!("Tier t0 (core) is never quarantined; ignoring it");
        }
        let tiers: Vec<Tier> = tiers
            .iter()
            .copied()
            .filter(Tier::is_movable)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if tiers.is_empty() {
            return Err(IntegrityError::Config(
                "no movable tier requested (use t1, t2 or t3)".to_string(),
            ));
        }

        let planned = plan.moves_for(&tiers);
        let mut outcome = ApplyOutcome {
            dry_run,
            tiers: tiers.clone(),
            ledger_path: self.ledger_path(),
            ..Default::default()
        };

        if dry_run {
            outcome.would_move = planned;
            return Ok(outcome);
        }

        let mut ledger = self.load_ledger();

        for PlannedMove { file, tier } in planned {
            if !is_contained_path(&file) {
                let err = IntegrityError::InvalidPath(file.clone());
                warn!("Refusing to quarantine {}: {}", file, err);
                outcome.errors.push(FileError::new(file, &err));
                continue;
            }
            let src = self.repo_root.join(&file);
            let dst = self.quarantine_dir.join(tier.dir_name()).join(&file);

            match fs::symlink_metadata(&src) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("Skipping {}: not present", file);
                    outcome.skipped.push(file);
                    continue;
                }
                Err(e) => {
                    let err = IntegrityError::from(e);
                    warn!("Cannot inspect {}: {}", file, err);
                    outcome.errors.push(FileError::new(file, &err));
                    continue;
                }
            }

            match move_file(&src, &dst) {
                Ok(()) => {
                    ledger.record(LedgerEntry {
                        src,
                        dst,
                        rel: file.clone(),
                        tier,
                        timestamp: Utc::now(),
                    });
                    outcome.moved.push(file);
                }
                Err(e) => {
                    warn!("Failed to quarantine {}: {}", file, e);
                    outcome.errors.push(FileError::new(file, &e));
                }
            }
        }

        if let Err(e) = ledger.save(&outcome.ledger_path) {
            let err = IntegrityError::from(e);
            warn!(
                "Failed to write ledger {}: {}; {} moved file(s) are unrecorded",
                outcome.ledger_path.display(),
                err,
                outcome.moved.len()
            );
            outcome.ledger_error = Some(FileError::new(
                outcome.ledger_path.display().to_string(),
                &err,
            ));
        }
        outcome.removed_dirs = self.cleanup_empty_dirs();

        info!(
            "Quarantined {} file(s) ({} skipped, {} errors)",
            outcome.moved.len(),
            outcome.skipped.len(),
            outcome.errors.len()
        );
        Ok(outcome)
    }

    /// Move the most recent `count` ledger entries back (all when `None`),
    /// newest first.
    pub fn restore(&self, count: Option<usize>) -> IntegrityResult<RestoreOutcome> {
        let ledger_path = self.ledger_path();
        let mut ledger = self.load_ledger();
        let mut outcome = RestoreOutcome::default();

        if ledger.is_empty() {
            info!("Ledger is empty, nothing to restore");
            return Ok(outcome);
        }

        let take = count.unwrap_or(ledger.len()).min(ledger.len());
        let start = ledger.len() - take;
        let mut restored_idx = BTreeSet::new();

        for idx in (start..ledger.len()).rev() {
            let entry = &ledger.moves[idx];
            match restore_entry(entry) {
                Ok(()) => {
                    restored_idx.insert(idx);
                    outcome.restored.push(entry.rel.clone());
                }
                Err(e) => {
                    warn!("Failed to restore {}: {}", entry.rel, e);
                    outcome.errors.push(FileError::new(entry.rel.clone(), &e));
                }
            }
        }

        let mut idx = 0;
        ledger.moves.retain(|_| {
            let keep = !restored_idx.contains(&idx);
            idx += 1;
            keep
        });
        ledger.save(&ledger_path)?;
        outcome.remaining = ledger.len();

        info!(
            "Restored {} file(s), {} still quarantined",
            outcome.restored.len(),
            outcome.remaining
        );
        Ok(outcome)
    }

    /// Remove empty directories left in the repository. Never removes the
    /// root or anything under `.git`.
    fn cleanup_empty_dirs(&self) -> usize {
        let mut removed = 0;
        let walker = WalkDir::new(&self.repo_root)
            .contents_first(true)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_dir() || entry.depth() == 0 {
                continue;
            }
            let is_empty = fs::read_dir(entry.path())
                .map(|mut d| d.next().is_none())
                .unwrap_or(false);
            if is_empty && fs::remove_dir(entry.path()).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("Removed {} empty directories", removed);
        }
        removed
    }
}

/// Move one file, refusing to overwrite and checking write permission first
fn move_file(src: &Path, dst: &Path) -> IntegrityResult<()> {
    let meta = fs::symlink_metadata(src)?;
    if meta.permissions().readonly() {
        return Err(IntegrityError::PermissionDenied(src.to_path_buf()));
    }
    if fs::symlink_metadata(dst).is_ok() {
        return Err(IntegrityError::MoveConflict(dst.to_path_buf()));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    rename_or_copy(src, dst)
}

fn restore_entry(entry: &LedgerEntry) -> IntegrityResult<()> {
    if fs::symlink_metadata(&entry.dst).is_err() {
        return Err(IntegrityError::MissingSource(format!(
            "not in quarantine: {}",
            entry.dst.display()
        )));
    }
    if fs::symlink_metadata(&entry.src).is_ok() {
        return Err(IntegrityError::MoveConflict(entry.src.clone()));
    }
    if let Some(parent) = entry.src.parent() {
        fs::create_dir_all(parent)?;
    }
    rename_or_copy(&entry.dst, &entry.src)
}

/// Rename, falling back to copy + remove across filesystems
fn rename_or_copy(from: &Path, to: &Path) -> IntegrityResult<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(IntegrityError::PermissionDenied(from.to_path_buf()))
        }
        Err(rename_err) => {
            debug!(
                "rename {} failed ({}), copying instead",
                from.display(),
                rename_err
            );
            fs::copy(from, to)?;
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(e.into());
            }
            Ok(())
        }
    }
}
