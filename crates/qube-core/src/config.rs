//! Storage-path configuration for QUBE components.
//!
//! Every component that persists state (LTM mapping, transition table,
//! checkpoints, audit logs) receives a [`StoragePaths`] at construction and
//! owns its storage root from there. There is deliberately no process-wide
//! instance: path wiring is explicit so two harness runs can live side by
//! side in one process.
//!
//! Paths can come from:
//! 1. A builder (tests, embedding callers)
//! 2. A TOML config file
//! 3. Default system directories
//!
//! # Example
//!
//! ```
//! use qube_core::config::StoragePaths;
//!
//! let paths = StoragePaths::builder()
//!     .root("/tmp/qube-run")
//!     .build();
//!
//! assert!(paths.ltm_file().ends_with("ltm_map.json"));
//! assert!(paths.checkpoints_dir().ends_with("checkpoints"));
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Resolved storage locations for one harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    root: PathBuf,
    ltm_file: PathBuf,
    ltm_backups_dir: PathBuf,
    transition_table_file: PathBuf,
    checkpoints_dir: PathBuf,
    audit_dir: PathBuf,
}

/// Where a [`StoragePaths`] value came from. Returned alongside the paths by
/// [`StoragePaths::load_or_default`] so callers can log the decision instead
/// of silently falling back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathsSource {
    /// Read from this config file.
    File(PathBuf),
    /// File missing or unreadable; defaults were used.
    Defaults(String),
}

/// TOML form of the config file. Every field optional; anything unset falls
/// back to a location under the root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoragePathsFile {
    pub root: Option<PathBuf>,
    pub ltm_file: Option<PathBuf>,
    pub ltm_backups_dir: Option<PathBuf>,
    pub transition_table_file: Option<PathBuf>,
    pub checkpoints_dir: Option<PathBuf>,
    pub audit_dir: Option<PathBuf>,
}

impl StoragePaths {
    /// Start a builder.
    pub fn builder() -> StoragePathsBuilder {
        StoragePathsBuilder::default()
    }

    /// Load from a TOML file when present and valid, otherwise defaults.
    /// Never fails: the fallback is an explicit, reportable decision.
    pub fn load_or_default(config_file: Option<&Path>) -> (Self, PathsSource) {
        let candidate = config_file.map(PathBuf::from).or_else(|| {
            ProjectDirs::from("", "", "qube").map(|dirs| dirs.config_dir().join("storage.toml"))
        });

        if let Some(path) = candidate {
            match fs::read_to_string(&path) {
                Ok(raw) => match toml::from_str::<StoragePathsFile>(&raw) {
                    Ok(file) => {
                        let paths = Self::builder().from_file(file).build();
                        return (paths, PathsSource::File(path));
                    }
                    Err(e) => {
                        let note = format!("invalid config {:?}: {}", path, e);
                        return (Self::builder().build(), PathsSource::Defaults(note));
                    }
                },
                Err(_) => {
                    let note = format!("config {:?} not readable", path);
                    return (Self::builder().build(), PathsSource::Defaults(note));
                }
            }
        }
        (
            Self::builder().build(),
            PathsSource::Defaults("no config location available".to_string()),
        )
    }

    /// Create every directory the paths reference.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)?;
        if let Some(parent) = self.ltm_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.ltm_backups_dir)?;
        if let Some(parent) = self.transition_table_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.checkpoints_dir)?;
        fs::create_dir_all(&self.audit_dir)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ltm_file(&self) -> &Path {
        &self.ltm_file
    }

    pub fn ltm_backups_dir(&self) -> &Path {
        &self.ltm_backups_dir
    }

    pub fn transition_table_file(&self) -> &Path {
        &self.transition_table_file
    }

    pub fn checkpoints_dir(&self) -> &Path {
        &self.checkpoints_dir
    }

    pub fn audit_dir(&self) -> &Path {
        &self.audit_dir
    }

    fn default_root() -> PathBuf {
        if let Some(dirs) = ProjectDirs::from("", "", "qube") {
            dirs.data_dir().to_path_buf()
        } else {
            env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".qube")
        }
    }
}

/// Builder for [`StoragePaths`]. Unset paths land under the root.
#[derive(Debug, Clone, Default)]
pub struct StoragePathsBuilder {
    file: StoragePathsFile,
}

impl StoragePathsBuilder {
    pub fn root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file.root = Some(path.into());
        self
    }

    pub fn ltm_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file.ltm_file = Some(path.into());
        self
    }

    pub fn ltm_backups_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file.ltm_backups_dir = Some(path.into());
        self
    }

    pub fn transition_table_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file.transition_table_file = Some(path.into());
        self
    }

    pub fn checkpoints_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file.checkpoints_dir = Some(path.into());
        self
    }

    pub fn audit_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file.audit_dir = Some(path.into());
        self
    }

    fn from_file(mut self, file: StoragePathsFile) -> Self {
        self.file = file;
        self
    }

    pub fn build(self) -> StoragePaths {
        let root = self.file.root.unwrap_or_else(StoragePaths::default_root);
        StoragePaths {
            ltm_file: self.file.ltm_file.unwrap_or_else(|| root.join("ltm_map.json")),
            ltm_backups_dir: self
                .file
                .ltm_backups_dir
                .unwrap_or_else(|| root.join("ltm_backups")),
            transition_table_file: self
                .file
                .transition_table_file
                .unwrap_or_else(|| root.join("bit_transitions.json")),
            checkpoints_dir: self
                .file
                .checkpoints_dir
                .unwrap_or_else(|| root.join("checkpoints")),
            audit_dir: self.file.audit_dir.unwrap_or_else(|| root.join("audit")),
            root,
        }
    }
}
