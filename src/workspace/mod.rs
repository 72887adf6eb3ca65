//! Persisted workspace model for batch description runs
//!
//! One `Workspace` document describes one batch: the tracked items, the
//! aggregate progress counters, and the running statistics. The document is
//! the single source of truth; the counters in [`WorkflowProgress`] are
//! redundant with the item states and are checked against them on load.

pub mod stats;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{TrackerError, TrackerResult};
use stats::BatchStatistics;

/// Current workspace schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Lifecycle status of a tracked item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Not yet picked up by any worker
    NotStarted,
    /// A worker has started the description call
    Processing,
    /// Description finished successfully
    Completed,
    /// Description failed
    Failed,
}

impl ItemStatus {
    /// Completed and failed items are terminal; everything else is
    /// remaining work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

/// Where a tracked item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// A standalone image file
    Image,
    /// A frame extracted from a video
    VideoFrame,
    /// Origin not recorded
    Unknown,
}

impl Default for SourceType {
    fn default() -> Self {
        SourceType::Unknown
    }
}

/// Processing outcome recorded per item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingInfo {
    /// Current lifecycle status
    pub status: ItemStatus,
    /// Source media kind
    #[serde(default)]
    pub source_type: SourceType,
    /// When the item reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Duration of the description call in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    /// Failure message, present only for failed items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProcessingInfo {
    fn new(source_type: SourceType) -> Self {
        Self {
            status: ItemStatus::NotStarted,
            source_type,
            processed_at: None,
            processing_time_ms: None,
            error_message: None,
        }
    }

    /// Clear the terminal outcome, returning the item to not started
    fn clear_outcome(&mut self) {
        self.status = ItemStatus::NotStarted;
        self.processed_at = None;
        self.processing_time_ms = None;
        self.error_message = None;
    }
}

/// One tracked unit of work: an image or an extracted video frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique item id, also the key in the workspace item map
    pub id: String,
    /// Path the item was discovered at
    pub original_file: PathBuf,
    /// Path currently shown to the user; diverges from `original_file`
    /// after e.g. a format conversion
    pub display_file: PathBuf,
    /// AI description result, present once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Monotonic insertion index; JSON objects do not guarantee key
    /// order, so add order is carried explicitly
    pub sequence: u64,
    /// Lifecycle and outcome details
    pub processing_info: ProcessingInfo,
}

impl Item {
    /// Create a new untracked item. The tracker assigns `sequence` when
    /// the item is added.
    pub fn new(
        id: impl Into<String>,
        original_file: impl Into<PathBuf>,
        source_type: SourceType,
    ) -> Self {
        let original_file = original_file.into();
        Self {
            id: id.into(),
            display_file: original_file.clone(),
            original_file,
            description: None,
            sequence: 0,
            processing_info: ProcessingInfo::new(source_type),
        }
    }

    /// Override the display path
    pub fn with_display_file(mut self, display_file: impl Into<PathBuf>) -> Self {
        self.display_file = display_file.into();
        self
    }

    /// Current lifecycle status
    pub fn status(&self) -> ItemStatus {
        self.processing_info.status
    }

    /// Whether the item has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.processing_info.status.is_terminal()
    }
}

/// Identity block of the workspace document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    /// Schema version of the document
    pub version: u32,
    /// Directory the batch was discovered from
    pub source_directory: PathBuf,
    /// Caller-defined processing mode label
    pub processing_mode: String,
}

/// Aggregate progress counters, maintained redundantly with item states
/// for O(1) summary reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowProgress {
    /// Identifier of this batch run
    pub batch_id: Uuid,
    /// Number of tracked items
    pub total_files: u64,
    /// Items that completed successfully
    pub completed_files: u64,
    /// Items that failed
    pub failed_files: u64,
    /// Id of the most recently completed item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed: Option<String>,
    /// When the batch started
    pub start_time: DateTime<Utc>,
}

impl WorkflowProgress {
    fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            total_files: 0,
            completed_files: 0,
            failed_files: 0,
            last_processed: None,
            start_time: Utc::now(),
        }
    }

    /// Items not yet in a terminal state
    pub fn pending_files(&self) -> u64 {
        self.total_files
            .saturating_sub(self.completed_files + self.failed_files)
    }
}

/// The root persisted document for one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Schema version and batch identity
    pub workspace_info: WorkspaceInfo,
    /// Aggregate counters
    pub workflow_progress: WorkflowProgress,
    /// Opaque caller-supplied configuration, stored verbatim
    #[serde(default)]
    pub processing_config: serde_json::Map<String, Value>,
    /// Tracked items keyed by item id
    #[serde(default)]
    pub items: BTreeMap<String, Item>,
    /// Incrementally maintained timing and error statistics
    #[serde(default)]
    pub batch_statistics: BatchStatistics,
}

impl Workspace {
    /// Create an empty workspace for a new batch run
    pub fn new(source_directory: impl Into<PathBuf>, processing_mode: impl Into<String>) -> Self {
        Self {
            workspace_info: WorkspaceInfo {
                version: SCHEMA_VERSION,
                source_directory: source_directory.into(),
                processing_mode: processing_mode.into(),
            },
            workflow_progress: WorkflowProgress::new(),
            processing_config: serde_json::Map::new(),
            items: BTreeMap::new(),
            batch_statistics: BatchStatistics::default(),
        }
    }

    /// Insert a new item and count it.
    ///
    /// Returns `Ok(true)` when the item was inserted, `Ok(false)` for the
    /// idempotent re-add of an identical source path (safe re-seeding
    /// after a crash, no double count). Adding a different source under
    /// an existing id is a conflict; existing progress is never
    /// overwritten.
    pub fn add_item(&mut self, mut item: Item) -> TrackerResult<bool> {
        if let Some(existing) = self.items.get(&item.id) {
            if existing.original_file == item.original_file {
                return Ok(false);
            }
            return Err(TrackerError::conflict(format!(
                "{} already tracks {}",
                item.id,
                existing.original_file.display()
            )));
        }

        item.sequence = self.next_sequence();
        self.items.insert(item.id.clone(), item);
        self.workflow_progress.total_files += 1;
        Ok(true)
    }

    /// Transition an item to processing.
    ///
    /// Terminal items are left untouched and report `Ok(false)`.
    pub fn mark_processing(&mut self, id: &str) -> TrackerResult<bool> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| TrackerError::item_not_found(id))?;
        if item.is_terminal() {
            return Ok(false);
        }
        item.processing_info.status = ItemStatus::Processing;
        Ok(true)
    }

    /// Record a successful description.
    ///
    /// The first completion sets the terminal state, counts the item, and
    /// feeds the timing sample into the statistics. Repeat completions
    /// update the stored text and timestamp only (last writer wins) so
    /// the counters stay idempotent.
    pub fn mark_completed(
        &mut self,
        id: &str,
        description: impl Into<String>,
        processing_time_ms: Option<u64>,
    ) -> TrackerResult<()> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| TrackerError::item_not_found(id))?;
        match item.processing_info.status {
            ItemStatus::Failed => Err(TrackerError::conflict(format!(
                "{id} already failed; reset it before completing"
            ))),
            ItemStatus::Completed => {
                item.description = Some(description.into());
                item.processing_info.processed_at = Some(Utc::now());
                Ok(())
            }
            _ => {
                item.description = Some(description.into());
                item.processing_info.status = ItemStatus::Completed;
                item.processing_info.processed_at = Some(Utc::now());
                item.processing_info.processing_time_ms = processing_time_ms;
                self.workflow_progress.completed_files += 1;
                self.workflow_progress.last_processed = Some(id.to_string());
                if let Some(ms) = processing_time_ms {
                    self.batch_statistics.record_processing_time(ms);
                }
                Ok(())
            }
        }
    }

    /// Record a failed description.
    ///
    /// The first failure sets the terminal state, counts the item, and
    /// categorizes the message into an error bucket. Repeat failures
    /// update the stored message and timestamp only.
    pub fn mark_failed(&mut self, id: &str, error_message: impl Into<String>) -> TrackerResult<()> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| TrackerError::item_not_found(id))?;
        let message = error_message.into();
        match item.processing_info.status {
            ItemStatus::Completed => Err(TrackerError::conflict(format!(
                "{id} already completed; reset it before failing"
            ))),
            ItemStatus::Failed => {
                item.processing_info.error_message = Some(message);
                item.processing_info.processed_at = Some(Utc::now());
                Ok(())
            }
            _ => {
                item.processing_info.status = ItemStatus::Failed;
                item.processing_info.processed_at = Some(Utc::now());
                item.processing_info.error_message = Some(message.clone());
                self.workflow_progress.failed_files += 1;
                self.batch_statistics.record_error(&message);
                Ok(())
            }
        }
    }

    /// Return a terminal item to not started for a manual retry.
    ///
    /// Decrements the matching terminal counter and clears the recorded
    /// outcome. Batch statistics are cumulative and are not rewound.
    /// Non-terminal items are left untouched and report `Ok(false)`.
    pub fn reset_item(&mut self, id: &str) -> TrackerResult<bool> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| TrackerError::item_not_found(id))?;
        match item.processing_info.status {
            ItemStatus::Completed => {
                self.workflow_progress.completed_files -= 1;
            }
            ItemStatus::Failed => {
                self.workflow_progress.failed_files -= 1;
            }
            _ => return Ok(false),
        }
        item.description = None;
        item.processing_info.clear_outcome();
        if self.workflow_progress.last_processed.as_deref() == Some(id) {
            self.workflow_progress.last_processed = None;
        }
        Ok(true)
    }

    /// Items in insertion order
    pub fn items_in_order(&self) -> Vec<&Item> {
        let mut items: Vec<&Item> = self.items.values().collect();
        items.sort_by_key(|item| item.sequence);
        items
    }

    /// First item, in insertion order, not yet in a terminal state.
    /// `None` means the batch has no remaining work.
    pub fn resume_checkpoint(&self) -> Option<String> {
        self.items_in_order()
            .into_iter()
            .find(|item| !item.is_terminal())
            .map(|item| item.id.clone())
    }

    /// All item ids, in insertion order, not yet in a terminal state
    pub fn remaining_items(&self) -> Vec<String> {
        self.items_in_order()
            .into_iter()
            .filter(|item| !item.is_terminal())
            .map(|item| item.id.clone())
            .collect()
    }

    /// Store a caller-supplied configuration value verbatim
    pub fn set_config_value(&mut self, key: impl Into<String>, value: Value) {
        self.processing_config.insert(key.into(), value);
    }

    /// Retrieve a caller-supplied configuration value
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.processing_config.get(key)
    }

    /// Next free insertion index
    fn next_sequence(&self) -> u64 {
        self.items
            .values()
            .map(|item| item.sequence)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Check document coherence after deserialization.
    ///
    /// Verifies the schema version is supported, map keys match item ids,
    /// sequences are unique, and the redundant counters equal what the
    /// item states recompute to.
    pub fn validate(&self) -> TrackerResult<()> {
        let version = self.workspace_info.version;
        if version == 0 || version > SCHEMA_VERSION {
            return Err(TrackerError::format(format!(
                "unsupported schema version {version} (supported: 1..={SCHEMA_VERSION})"
            )));
        }

        let mut sequences = HashSet::new();
        let mut completed = 0u64;
        let mut failed = 0u64;
        for (key, item) in &self.items {
            if key != &item.id {
                return Err(TrackerError::format(format!(
                    "item key {key} does not match item id {}",
                    item.id
                )));
            }
            if !sequences.insert(item.sequence) {
                return Err(TrackerError::format(format!(
                    "duplicate item sequence {}",
                    item.sequence
                )));
            }
            match item.processing_info.status {
                ItemStatus::Completed => completed += 1,
                ItemStatus::Failed => failed += 1,
                _ => {}
            }
        }

        let progress = &self.workflow_progress;
        if progress.total_files != self.items.len() as u64 {
            return Err(TrackerError::format(format!(
                "total_files {} does not match {} tracked items",
                progress.total_files,
                self.items.len()
            )));
        }
        if progress.completed_files != completed || progress.failed_files != failed {
            return Err(TrackerError::format(format!(
                "counters ({} completed, {} failed) do not match item states ({completed} completed, {failed} failed)",
                progress.completed_files, progress.failed_files
            )));
        }

        Ok(())
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(PathBuf::new(), "describe")
    }
}
