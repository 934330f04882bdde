//! Append-only audit log.
//!
//! Every structural mutation in the harness (population init, crossover,
//! mutate, promotion, snapshot, rollback, checkpoint save/restore) appends
//! one newline-delimited JSON record carrying at least `{evt, ts}`. The log
//! is the causally-ordered history of a run; records are never rewritten.
//!
//! Writes happen one record at a time through a single [`AuditLog`] value,
//! which is the serialization point if a caller ever evaluates in parallel.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Value};

/// Handle on one append-only JSONL audit file.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Open (creating parent directories as needed). The file itself is
    /// created lazily on the first record.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create audit dir {:?}", parent))?;
        }
        Ok(AuditLog { path })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. `fields` must be a JSON object (or `Null` for no
    /// extra fields); `evt` and `ts` are stamped by the log.
    pub fn record(&self, evt: &str, fields: Value) -> Result<()> {
        let mut entry = json!({
            "evt": evt,
            "ts": chrono::Utc::now().timestamp(),
        });
        if let Value::Object(extra) = fields {
            let obj = entry.as_object_mut().expect("entry is an object");
            for (k, v) in extra {
                obj.entry(k).or_insert(v);
            }
        }
        let line = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open audit log {:?}", self.path))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("failed to append to audit log {:?}", self.path))?;
        Ok(())
    }

    /// Read every record back (test and tooling helper). Malformed lines are
    /// an error: the log is core-owned, so corruption is worth surfacing.
    pub fn read_all(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read audit log {:?}", self.path))?;
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).with_context(|| format!("bad audit line: {}", l)))
            .collect()
    }
}
