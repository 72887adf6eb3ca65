//! Durable read/load/save of the workspace document
//!
//! The document is a single pretty-printed JSON file. Saves are atomic:
//! the new content goes to a temp file in the same directory, is synced
//! to disk, and then two ordered renames run: current main file to the
//! backup path, temp file to the main path. At any crash point the main
//! path holds either the old valid document or the new valid document,
//! and the backup holds the previous one for recovery.

pub mod lock;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{TrackerError, TrackerResult};
use crate::workspace::Workspace;

/// Access mode for a workspace store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Point-in-time snapshots only; all mutating calls are rejected
    Read,
    /// Full read/write access; creates the document if absent
    Write,
}

/// Handle on one on-disk workspace document
#[derive(Debug)]
pub struct WorkspaceStore {
    path: PathBuf,
    backup_path: PathBuf,
    mode: StoreMode,
}

impl WorkspaceStore {
    /// Open a workspace document.
    ///
    /// Read mode on a missing path fails with
    /// [`TrackerError::NotFound`]. Write mode creates and persists an
    /// empty default workspace if the path does not exist yet.
    pub fn open(path: impl Into<PathBuf>, mode: StoreMode) -> TrackerResult<Self> {
        Self::open_with(path, mode, Workspace::default)
    }

    /// Open a workspace document, seeding a missing one from `seed`.
    ///
    /// The seed is only invoked in write mode when the document does not
    /// exist yet.
    pub fn open_with(
        path: impl Into<PathBuf>,
        mode: StoreMode,
        seed: impl FnOnce() -> Workspace,
    ) -> TrackerResult<Self> {
        let path = path.into();
        let store = Self {
            backup_path: path.with_extension("bak"),
            path,
            mode,
        };

        if !store.path.exists() {
            match mode {
                StoreMode::Read => {
                    return Err(TrackerError::not_found(store.path.display()));
                }
                StoreMode::Write => {
                    if let Some(parent) = store.path.parent() {
                        if !parent.as_os_str().is_empty() {
                            fs::create_dir_all(parent)?;
                        }
                    }
                    let workspace = seed();
                    store.write_document(&workspace)?;
                    info!(path = %store.path.display(), "created new workspace document");
                }
            }
        }

        Ok(store)
    }

    /// Path of the main document file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the backup snapshot
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Whether this store was opened read-only
    pub fn is_read_only(&self) -> bool {
        self.mode == StoreMode::Read
    }

    /// Reject mutations on a read-only store before any disk access
    pub fn ensure_writable(&self) -> TrackerResult<()> {
        if self.is_read_only() {
            return Err(TrackerError::ReadOnly);
        }
        Ok(())
    }

    /// Load and validate the current document.
    ///
    /// A main file that fails to read, parse, or validate falls back to
    /// the backup snapshot; recovery is transparent but logged. When the
    /// backup cannot help either, the main file's failure wins: a
    /// syntactically broken document surfaces as
    /// [`TrackerError::Corruption`], a well-formed document with an
    /// invalid shape as [`TrackerError::Format`], and a missing document
    /// as [`TrackerError::NotFound`].
    pub fn load(&self) -> TrackerResult<Workspace> {
        let main_err = match read_document(&self.path) {
            Ok(workspace) => return Ok(workspace),
            Err(e) => e,
        };

        match read_document(&self.backup_path) {
            Ok(workspace) => {
                warn!(
                    path = %self.path.display(),
                    backup = %self.backup_path.display(),
                    error = %main_err,
                    "workspace document unusable, recovered from backup"
                );
                Ok(workspace)
            }
            Err(backup_err) => {
                debug!(
                    backup = %self.backup_path.display(),
                    error = %backup_err,
                    "backup snapshot unusable"
                );
                match main_err {
                    TrackerError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Err(TrackerError::not_found(self.path.display()))
                    }
                    TrackerError::Format(msg) => Err(TrackerError::Format(msg)),
                    TrackerError::Corruption(msg) => Err(TrackerError::Corruption(msg)),
                    other => Err(other),
                }
            }
        }
    }

    /// Atomically replace the on-disk document.
    ///
    /// Rejected with [`TrackerError::ReadOnly`] on read-only stores
    /// without touching disk.
    pub fn save(&self, workspace: &Workspace) -> TrackerResult<()> {
        self.ensure_writable()?;
        self.write_document(workspace)
    }

    fn write_document(&self, workspace: &Workspace) -> TrackerResult<()> {
        let json = serde_json::to_string_pretty(workspace)?;

        // The temp file must live in the same directory as the document
        // so the final rename stays on one filesystem.
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.as_file().sync_all()?;

        // Ordered renames: the previous document becomes the backup
        // before the new one takes the main path.
        if self.path.exists() {
            fs::rename(&self.path, &self.backup_path)?;
        }
        temp.persist(&self.path).map_err(|e| TrackerError::Io(e.error))?;

        // Make the renames durable; directory fsync is best-effort on
        // platforms that do not support it.
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }

        debug!(
            path = %self.path.display(),
            items = workspace.items.len(),
            "workspace document saved"
        );
        Ok(())
    }
}

/// Read one document file through the full parse/deserialize/validate
/// pipeline, classifying each failure stage.
fn read_document(path: &Path) -> TrackerResult<Workspace> {
    let contents = fs::read_to_string(path)?;

    let value: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| TrackerError::corruption(format!("{}: {e}", path.display())))?;

    let workspace: Workspace = serde_json::from_value(value)
        .map_err(|e| TrackerError::format(format!("{}: {e}", path.display())))?;

    workspace.validate()?;
    Ok(workspace)
}
