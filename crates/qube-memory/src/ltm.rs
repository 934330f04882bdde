//! Long-term memory manager: the durable, versioned concept→vertex mapping.
//!
//! Every mutation to the mapping is paired with a timestamped deep-copied
//! snapshot appended to an append-only version history and persisted twice:
//! the main file carries the full current state for crash recovery, and a
//! dedicated per-snapshot backup file is the substrate for point-in-time
//! rollback. Rollback itself is a forward-only, audited event: it restores
//! a backup's mapping and immediately snapshots again, never editing
//! history.
//!
//! Protected vertices are locked: promotion onto one requires explicit
//! human approval, no matter what the automatic checks said.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use qube_core::{AuditLog, Hypercube, StoragePaths};

/// One snapshot in the version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtmVersion {
    pub ts: i64,
    pub label: String,
    pub mapping: IndexMap<String, u32>,
}

/// On-disk form of the main state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LtmState {
    mapping: IndexMap<String, u32>,
    versions: Vec<LtmVersion>,
}

/// How the manager started: loaded from the main file, or fresh. The
/// fallback on a missing/corrupt file is deliberate best-effort startup,
/// surfaced here so callers log it instead of a silent catch-all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LtmLoadOutcome {
    pub loaded: bool,
    pub note: String,
}

/// Versioned concept→vertex mapping with protected-vertex locks.
pub struct LtmManager<'a> {
    path: PathBuf,
    backups_dir: PathBuf,
    audit: &'a AuditLog,
    cube: Option<Hypercube>,
    mapping: IndexMap<String, u32>,
    protected_vertices: BTreeSet<u32>,
    versions: Vec<LtmVersion>,
}

impl<'a> LtmManager<'a> {
    /// Open at the configured paths, loading persisted state when present.
    pub fn open(
        paths: &StoragePaths,
        protected: &[u32],
        audit: &'a AuditLog,
    ) -> Result<(Self, LtmLoadOutcome)> {
        Self::open_at(paths.ltm_file(), paths.ltm_backups_dir(), protected, audit)
    }

    /// Open with explicit file locations.
    pub fn open_at(
        path: &Path,
        backups_dir: &Path,
        protected: &[u32],
        audit: &'a AuditLog,
    ) -> Result<(Self, LtmLoadOutcome)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
        fs::create_dir_all(backups_dir)
            .with_context(|| format!("failed to create {:?}", backups_dir))?;

        let (state, outcome) = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<LtmState>(&raw) {
                Ok(state) => (
                    state,
                    LtmLoadOutcome {
                        loaded: true,
                        note: format!("loaded {:?}", path),
                    },
                ),
                Err(e) => (
                    LtmState::default(),
                    LtmLoadOutcome {
                        loaded: false,
                        note: format!("corrupt state in {:?} ({}), starting empty", path, e),
                    },
                ),
            },
            Err(_) => (
                LtmState::default(),
                LtmLoadOutcome {
                    loaded: false,
                    note: format!("no state at {:?}, starting empty", path),
                },
            ),
        };

        Ok((
            LtmManager {
                path: path.to_path_buf(),
                backups_dir: backups_dir.to_path_buf(),
                audit,
                cube: None,
                mapping: state.mapping,
                protected_vertices: protected.iter().copied().collect(),
                versions: state.versions,
            },
            outcome,
        ))
    }

    /// Bind a topology so promotions validate vertex ids against it.
    pub fn with_topology(mut self, cube: Hypercube) -> Self {
        self.cube = Some(cube);
        self
    }

    pub fn mapping(&self) -> &IndexMap<String, u32> {
        &self.mapping
    }

    pub fn versions(&self) -> &[LtmVersion] {
        &self.versions
    }

    pub fn protect_vertex(&mut self, vid: u32) {
        self.protected_vertices.insert(vid);
    }

    pub fn unprotect_vertex(&mut self, vid: u32) {
        self.protected_vertices.remove(&vid);
    }

    pub fn can_modify_vertex(&self, vid: u32) -> bool {
        !self.protected_vertices.contains(&vid)
    }

    /// Append a version and persist twice: full state to the main file, the
    /// version alone to a timestamped backup. Returns the backup path.
    pub fn snapshot(&mut self, label: &str) -> Result<PathBuf> {
        let ts = chrono::Utc::now().timestamp();
        let version = LtmVersion {
            ts,
            label: label.to_string(),
            mapping: self.mapping.clone(),
        };
        self.versions.push(version.clone());

        let state = LtmState {
            mapping: self.mapping.clone(),
            versions: self.versions.clone(),
        };
        let main = serde_json::to_string_pretty(&state)?;
        fs::write(&self.path, main)
            .with_context(|| format!("failed to write {:?}", self.path))?;

        let backup = self.backup_path(ts);
        let body = serde_json::to_string_pretty(&version)?;
        fs::write(&backup, body).with_context(|| format!("failed to write {:?}", backup))?;

        self.audit.record(
            "snapshot",
            json!({"label": label, "backup": backup.to_string_lossy()}),
        )?;
        Ok(backup)
    }

    /// Next free backup path for `ts` (same-second snapshots get a suffix).
    fn backup_path(&self, ts: i64) -> PathBuf {
        let base = self.backups_dir.join(format!("ltm_snapshot_{}.json", ts));
        if !base.exists() {
            return base;
        }
        let mut seq = 1usize;
        loop {
            let candidate = self
                .backups_dir
                .join(format!("ltm_snapshot_{}_{}.json", ts, seq));
            if !candidate.exists() {
                return candidate;
            }
            seq += 1;
        }
    }

    /// Promotion policy, three ordered guards:
    ///
    /// 1. a protected vertex cannot be taken without human approval;
    /// 2. a candidate must have passed automatic validation or carry human
    ///    approval;
    /// 3. the write happens iff it survived `min_gens` generations or a
    ///    human approved it.
    ///
    /// Any rejection returns `Ok(false)` with no side effects.
    pub fn propose_promote(
        &mut self,
        concept: &str,
        vid: u32,
        passed_auto: bool,
        human_approved: bool,
        generations_survived: usize,
        min_gens: usize,
    ) -> Result<bool> {
        if let Some(cube) = &self.cube {
            assert!(
                vid < cube.vertex_count(),
                "vertex id {} out of range for dimension {}",
                vid,
                cube.dimension()
            );
        }
        if self.protected_vertices.contains(&vid) && !human_approved {
            return Ok(false);
        }
        if !passed_auto && !human_approved {
            return Ok(false);
        }
        if generations_survived >= min_gens || human_approved {
            self.mapping.insert(concept.to_string(), vid);
            self.snapshot(&format!("promote_{}_{}", concept, vid))?;
            self.audit.record(
                "promote",
                json!({
                    "concept": concept,
                    "vertex_id": vid,
                    "human_approved": human_approved,
                    "generations_survived": generations_survived,
                }),
            )?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Restore a backup's mapping verbatim, then snapshot the restoration
    /// as a new version. Returns `Ok(false)` when the backup is missing.
    pub fn rollback_to(&mut self, backup_path: &Path) -> Result<bool> {
        if !backup_path.exists() {
            return Ok(false);
        }
        let raw = fs::read_to_string(backup_path)
            .with_context(|| format!("failed to read backup {:?}", backup_path))?;
        let version: LtmVersion = serde_json::from_str(&raw)
            .with_context(|| format!("invalid backup {:?}", backup_path))?;
        self.mapping = version.mapping;

        let file_name = backup_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.snapshot(&format!("rollback_from_{}", file_name))?;
        self.audit
            .record("rollback", json!({"backup": file_name}))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        path: PathBuf,
        backups: PathBuf,
        audit: AuditLog,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ltm_map.json");
        let backups = dir.path().join("ltm_backups");
        let audit = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();
        Fixture {
            _dir: dir,
            path,
            backups,
            audit,
        }
    }

    #[test]
    fn test_starts_empty_without_state() {
        let fx = fixture();
        let (ltm, outcome) =
            LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
        assert!(!outcome.loaded);
        assert!(ltm.mapping().is_empty());
    }

    #[test]
    fn test_promote_survivor_writes_and_snapshots() {
        let fx = fixture();
        let (mut ltm, _) = LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
        let promoted = ltm
            .propose_promote("gravity", 5, true, false, 4, 3)
            .unwrap();
        assert!(promoted);
        assert_eq!(ltm.mapping().get("gravity"), Some(&5));
        assert_eq!(ltm.versions().len(), 1);
        assert!(fx.path.exists());
        assert_eq!(fs::read_dir(&fx.backups).unwrap().count(), 1);
    }

    #[test]
    fn test_protected_vertex_rejected_without_human() {
        let fx = fixture();
        let (mut ltm, _) =
            LtmManager::open_at(&fx.path, &fx.backups, &[7], &fx.audit).unwrap();
        let promoted = ltm.propose_promote("taboo", 7, true, false, 10, 3).unwrap();
        assert!(!promoted);
        assert!(ltm.mapping().is_empty());
        assert!(ltm.versions().is_empty());

        // human approval unlocks it
        let promoted = ltm.propose_promote("taboo", 7, true, true, 0, 3).unwrap();
        assert!(promoted);
        assert_eq!(ltm.mapping().get("taboo"), Some(&7));
    }

    #[test]
    fn test_unvalidated_candidate_rejected() {
        let fx = fixture();
        let (mut ltm, _) = LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
        assert!(!ltm.propose_promote("x", 1, false, false, 99, 3).unwrap());
        // human approval substitutes for automatic validation
        assert!(ltm.propose_promote("x", 1, false, true, 0, 3).unwrap());
    }

    #[test]
    fn test_too_young_candidate_rejected() {
        let fx = fixture();
        let (mut ltm, _) = LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
        assert!(!ltm.propose_promote("young", 2, true, false, 2, 3).unwrap());
        assert!(ltm.mapping().is_empty());
    }

    #[test]
    fn test_state_round_trips_through_reopen() {
        let fx = fixture();
        {
            let (mut ltm, _) =
                LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
            ltm.propose_promote("a", 1, true, false, 5, 3).unwrap();
            ltm.propose_promote("b", 2, true, false, 5, 3).unwrap();
        }
        let (ltm, outcome) =
            LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
        assert!(outcome.loaded);
        assert_eq!(ltm.mapping().get("a"), Some(&1));
        assert_eq!(ltm.mapping().get("b"), Some(&2));
        assert_eq!(ltm.versions().len(), 2);
    }

    #[test]
    fn test_corrupt_state_starts_empty_with_note() {
        let fx = fixture();
        fs::write(&fx.path, "{not json").unwrap();
        let (ltm, outcome) =
            LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
        assert!(!outcome.loaded);
        assert!(outcome.note.contains("corrupt"));
        assert!(ltm.mapping().is_empty());
    }

    #[test]
    fn test_rollback_restores_mapping_and_records_version() {
        let fx = fixture();
        let (mut ltm, _) = LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
        ltm.propose_promote("keep", 1, true, false, 5, 3).unwrap();
        let backup = ltm.snapshot("anchor").unwrap();
        ltm.propose_promote("later", 2, true, false, 5, 3).unwrap();
        assert_eq!(ltm.mapping().len(), 2);
        let versions_before = ltm.versions().len();

        assert!(ltm.rollback_to(&backup).unwrap());
        assert_eq!(ltm.mapping().len(), 1);
        assert_eq!(ltm.mapping().get("keep"), Some(&1));
        // rollback is a new version, not a history edit
        assert_eq!(ltm.versions().len(), versions_before + 1);
        let label = &ltm.versions().last().unwrap().label;
        assert!(label.starts_with("rollback_from_"));
    }

    #[test]
    fn test_rollback_to_missing_backup_is_noop() {
        let fx = fixture();
        let (mut ltm, _) = LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
        ltm.propose_promote("a", 1, true, false, 5, 3).unwrap();
        let missing = fx.backups.join("nope.json");
        assert!(!ltm.rollback_to(&missing).unwrap());
        assert_eq!(ltm.mapping().len(), 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_promotion_validates_vertex_against_topology() {
        let fx = fixture();
        let (ltm, _) = LtmManager::open_at(&fx.path, &fx.backups, &[], &fx.audit).unwrap();
        let mut ltm = ltm.with_topology(Hypercube::new(3));
        let _ = ltm.propose_promote("big", 8, true, false, 5, 3);
    }
}
