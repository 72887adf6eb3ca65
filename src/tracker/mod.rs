//! Item lifecycle tracking over the durable workspace store
//!
//! Every mutating operation runs one atomic cycle: acquire the lock,
//! reload the latest on-disk state, apply the mutation, save atomically,
//! release the lock, then notify observers. Reloading on every call keeps
//! concurrent writers coherent at the cost of O(total items) I/O per
//! operation, which is comfortable into the tens of thousands of items.

pub mod events;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::error::TrackerResult;
use crate::store::lock::WorkspaceLock;
use crate::store::{StoreMode, WorkspaceStore};
use crate::workspace::stats::BatchStatistics;
use crate::workspace::{Item, Workspace, WorkflowProgress};
use events::{CallbackHandle, CallbackRegistry};

/// Builder for [`ItemTracker`] handles
pub struct ItemTrackerBuilder {
    path: PathBuf,
    mode: StoreMode,
    lock_timeout: Option<Duration>,
    source_directory: PathBuf,
    processing_mode: String,
}

impl ItemTrackerBuilder {
    /// Start building a tracker for the workspace document at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: StoreMode::Write,
            lock_timeout: None,
            source_directory: PathBuf::new(),
            processing_mode: "describe".to_string(),
        }
    }

    /// Open the store read-only; all mutating calls will be rejected
    pub fn read_only(mut self) -> Self {
        self.mode = StoreMode::Read;
        self
    }

    /// Bound the wait for the workspace file lock.
    ///
    /// Without a timeout, mutating calls block until the lock frees up.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Record the directory the batch was discovered from (used when the
    /// document is created)
    pub fn source_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_directory = dir.into();
        self
    }

    /// Label the processing mode (used when the document is created)
    pub fn processing_mode(mut self, mode: impl Into<String>) -> Self {
        self.processing_mode = mode.into();
        self
    }

    /// Open the store and build the tracker
    pub fn open(self) -> TrackerResult<ItemTracker> {
        let source_directory = self.source_directory;
        let processing_mode = self.processing_mode;
        let store = WorkspaceStore::open_with(self.path, self.mode, || {
            Workspace::new(source_directory, processing_mode)
        })?;
        let lock = WorkspaceLock::open(store.path())?;
        Ok(ItemTracker {
            store,
            lock: Mutex::new(lock),
            lock_timeout: self.lock_timeout,
            callbacks: CallbackRegistry::new(),
        })
    }
}

/// Progress tracker for one batch run.
///
/// Safe to share across threads; concurrent mutations serialize through
/// the process-local mutex, and cooperating processes on the same
/// document serialize through the advisory file lock.
pub struct ItemTracker {
    store: WorkspaceStore,
    lock: Mutex<WorkspaceLock>,
    lock_timeout: Option<Duration>,
    callbacks: CallbackRegistry,
}

impl ItemTracker {
    /// Open (creating if needed) a writable tracker
    pub fn open(path: impl Into<PathBuf>) -> TrackerResult<Self> {
        ItemTrackerBuilder::new(path).open()
    }

    /// Open an existing workspace for point-in-time reads only
    pub fn open_read_only(path: impl Into<PathBuf>) -> TrackerResult<Self> {
        ItemTrackerBuilder::new(path).read_only().open()
    }

    /// Start a builder for non-default options
    pub fn builder(path: impl Into<PathBuf>) -> ItemTrackerBuilder {
        ItemTrackerBuilder::new(path)
    }

    /// Path of the workspace document
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Track a new item.
    ///
    /// Re-adding an id with the same source path is an idempotent no-op;
    /// the same id with a different source is a conflict. Existing
    /// progress is never overwritten.
    pub fn add_item(&self, item: Item) -> TrackerResult<()> {
        let id = item.id.clone();
        self.mutate(move |workspace| {
            Ok(workspace.add_item(item)?.then(|| vec![id]))
        })?;
        Ok(())
    }

    /// Track a batch of items under a single lock/load/save cycle.
    ///
    /// One document rewrite covers the whole seeding pass. A conflicting
    /// item aborts the batch before anything is persisted. Returns the
    /// ids actually inserted (idempotent re-adds are skipped).
    pub fn add_items(&self, items: Vec<Item>) -> TrackerResult<Vec<String>> {
        let touched = self.mutate(move |workspace| {
            let mut touched = Vec::new();
            for item in items {
                let id = item.id.clone();
                if workspace.add_item(item)? {
                    touched.push(id);
                }
            }
            Ok(Some(touched))
        })?;
        Ok(touched.unwrap_or_default())
    }

    /// Record that a worker picked the item up.
    ///
    /// Terminal items are left untouched; resuming callers skip them via
    /// [`ItemTracker::get_remaining_items`] anyway.
    pub fn mark_processing(&self, id: &str) -> TrackerResult<()> {
        self.mutate(|workspace| {
            Ok(workspace.mark_processing(id)?.then(|| vec![id.to_string()]))
        })?;
        Ok(())
    }

    /// Record a successful description for the item.
    ///
    /// Counters and statistics are fed only by the first completion;
    /// repeat calls update the stored text (last writer wins).
    pub fn mark_completed(
        &self,
        id: &str,
        description: impl Into<String>,
        processing_time_ms: Option<u64>,
    ) -> TrackerResult<()> {
        let description = description.into();
        self.mutate(|workspace| {
            workspace.mark_completed(id, description, processing_time_ms)?;
            Ok(Some(vec![id.to_string()]))
        })?;
        Ok(())
    }

    /// Record a failed description for the item
    pub fn mark_failed(&self, id: &str, error_message: impl Into<String>) -> TrackerResult<()> {
        let error_message = error_message.into();
        self.mutate(|workspace| {
            workspace.mark_failed(id, error_message)?;
            Ok(Some(vec![id.to_string()]))
        })?;
        Ok(())
    }

    /// Return a terminal item to not started for a manual retry.
    ///
    /// Reports whether the item actually changed.
    pub fn reset_item(&self, id: &str) -> TrackerResult<bool> {
        let touched = self.mutate(|workspace| {
            Ok(workspace.reset_item(id)?.then(|| vec![id.to_string()]))
        })?;
        Ok(touched.is_some())
    }

    /// Store a caller-supplied configuration value verbatim
    pub fn set_config_value(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> TrackerResult<()> {
        let key = key.into();
        self.mutate(|workspace| {
            workspace.set_config_value(key, value);
            Ok(Some(Vec::new()))
        })?;
        Ok(())
    }

    /// Retrieve a caller-supplied configuration value
    pub fn config_value(&self, key: &str) -> TrackerResult<Option<serde_json::Value>> {
        self.inspect(|workspace| workspace.config_value(key).cloned())
    }

    /// First item, in insertion order, not yet in a terminal state:
    /// the resume point after an interruption
    pub fn get_resume_checkpoint(&self) -> TrackerResult<Option<String>> {
        self.inspect(Workspace::resume_checkpoint)
    }

    /// All item ids, in insertion order, not yet in a terminal state.
    ///
    /// An item stuck in processing when the previous run died counts as
    /// remaining and is retried from scratch.
    pub fn get_remaining_items(&self) -> TrackerResult<Vec<String>> {
        self.inspect(Workspace::remaining_items)
    }

    /// Point-in-time copy of the aggregate counters
    pub fn progress(&self) -> TrackerResult<WorkflowProgress> {
        self.inspect(|workspace| workspace.workflow_progress.clone())
    }

    /// Point-in-time copy of the batch statistics
    pub fn statistics(&self) -> TrackerResult<BatchStatistics> {
        self.inspect(|workspace| workspace.batch_statistics.clone())
    }

    /// Point-in-time copy of the whole document, for reporting tools
    pub fn snapshot(&self) -> TrackerResult<Workspace> {
        self.inspect(Clone::clone)
    }

    /// Register a change observer.
    ///
    /// Observers run synchronously after each successful save, outside
    /// the lock, with the ids touched by the mutation.
    pub fn add_change_callback(
        &self,
        callback: impl Fn(&[String]) + Send + Sync + 'static,
    ) -> CallbackHandle {
        self.callbacks.add(callback)
    }

    /// Remove a change observer
    pub fn remove_change_callback(&self, handle: CallbackHandle) -> bool {
        self.callbacks.remove(handle)
    }

    /// One atomic mutation cycle: lock, reload, mutate, save, unlock,
    /// notify. `op` returns the touched ids, or `None` to skip the save
    /// (nothing changed). Read-only stores are rejected before any disk
    /// access.
    fn mutate<F>(&self, op: F) -> TrackerResult<Option<Vec<String>>>
    where
        F: FnOnce(&mut Workspace) -> TrackerResult<Option<Vec<String>>>,
    {
        self.store.ensure_writable()?;

        let touched = {
            let mut lock = self.lock_handle();
            let _guard = match self.lock_timeout {
                Some(timeout) => lock.exclusive_timeout(timeout)?,
                None => lock.exclusive()?,
            };
            let mut workspace = self.store.load()?;
            match op(&mut workspace)? {
                Some(touched) => {
                    self.store.save(&workspace)?;
                    Some(touched)
                }
                None => {
                    debug!("mutation was a no-op, skipping save");
                    None
                }
            }
        };

        if let Some(ids) = &touched {
            self.callbacks.notify(ids);
        }
        Ok(touched)
    }

    /// Reload the latest document under the shared lock and inspect it
    fn inspect<F, T>(&self, f: F) -> TrackerResult<T>
    where
        F: FnOnce(&Workspace) -> T,
    {
        let lock = self.lock_handle();
        let _guard = lock.shared()?;
        let workspace = self.store.load()?;
        Ok(f(&workspace))
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, WorkspaceLock> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
