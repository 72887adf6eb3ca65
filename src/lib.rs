//! # Darkroom
//!
//! A crash-safe progress store for long-running AI photo description
//! batches. Each batch run owns one JSON workspace document; the tracker
//! records every item's lifecycle, survives crashes through atomic saves
//! with a backup snapshot, serializes concurrent writers through an
//! advisory file lock, and lets an interrupted batch resume exactly where
//! it left off.
//!
//! ## Modules
//!
//! - `error` - Error kinds shared across the store, lock, and tracker
//! - `store` - Durable document storage with atomic writes and backup
//!   recovery, plus the advisory file lock
//! - `tracker` - Item lifecycle operations, resume planning, and change
//!   notification
//! - `workspace` - The persisted data model and incremental statistics
//!
//! ## Example
//!
//! ```no_run
//! use darkroom::{Item, ItemTracker, SourceType};
//!
//! # fn main() -> darkroom::TrackerResult<()> {
//! let tracker = ItemTracker::open("workspace.json")?;
//! tracker.add_item(Item::new("img_1", "/photos/img_1.jpg", SourceType::Image))?;
//!
//! tracker.mark_processing("img_1")?;
//! tracker.mark_completed("img_1", "a lighthouse at dusk", Some(850))?;
//!
//! // After an interruption, pick up where the batch left off.
//! for id in tracker.get_remaining_items()? {
//!     println!("still to do: {id}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod store;
pub mod tracker;
pub mod workspace;

pub use error::{TrackerError, TrackerResult};
pub use store::{StoreMode, WorkspaceStore};
pub use tracker::events::CallbackHandle;
pub use tracker::{ItemTracker, ItemTrackerBuilder};
pub use workspace::stats::{BatchStatistics, ErrorCategory, ProcessingTimes};
pub use workspace::{
    Item, ItemStatus, ProcessingInfo, SourceType, Workspace, WorkflowProgress, WorkspaceInfo,
};
