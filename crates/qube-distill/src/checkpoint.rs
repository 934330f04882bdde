//! Checkpoint store: tagged student-state blobs with rollback tracking.
//!
//! The student writes its own opaque state blob; the store adds a metadata
//! sidecar (`timestamp`, `experimental`), remembers the most recent
//! production (non-experimental) checkpoint as "best known good", and
//! audits every save and restore.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use qube_core::AuditLog;

use crate::model::StudentModel;

/// Metadata sidecar for one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub ts: i64,
    pub experimental: bool,
}

/// One saved checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    pub path: PathBuf,
    pub meta: CheckpointMeta,
}

/// Directory of tagged checkpoints.
pub struct CheckpointStore<'a> {
    dir: PathBuf,
    audit: &'a AuditLog,
    best_production: Option<PathBuf>,
}

impl<'a> CheckpointStore<'a> {
    pub fn new(dir: &Path, audit: &'a AuditLog) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {:?}", dir))?;
        Ok(CheckpointStore {
            dir: dir.to_path_buf(),
            audit,
            best_production: None,
        })
    }

    /// Most recent non-experimental checkpoint, the rollback anchor.
    pub fn best_production(&self) -> Option<&Path> {
        self.best_production.as_deref()
    }

    /// Save the student under `name`. Production saves become the new best
    /// known good.
    pub fn save(
        &mut self,
        name: &str,
        experimental: bool,
        student: &dyn StudentModel,
    ) -> Result<CheckpointRecord> {
        let path = self.dir.join(format!("{}.ckpt", name));
        student
            .save_state(&path)
            .with_context(|| format!("student failed to write {:?}", path))?;

        let meta = CheckpointMeta {
            ts: chrono::Utc::now().timestamp(),
            experimental,
        };
        let meta_path = self.dir.join(format!("{}.meta.json", name));
        fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)
            .with_context(|| format!("failed to write {:?}", meta_path))?;

        if !experimental {
            self.best_production = Some(path.clone());
        }
        self.audit.record(
            "ckpt_save",
            json!({"path": path.to_string_lossy(), "experimental": experimental}),
        )?;
        Ok(CheckpointRecord { path, meta })
    }

    /// Restore the student from `path`. Returns `Ok(false)` when the blob
    /// is missing.
    pub fn restore(&self, path: &Path, student: &mut dyn StudentModel) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        student
            .load_state(path)
            .with_context(|| format!("student failed to load {:?}", path))?;
        self.audit.record(
            "ckpt_rollback",
            json!({"path": path.to_string_lossy()}),
        )?;
        Ok(true)
    }
}
