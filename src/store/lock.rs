//! Advisory file locking around workspace read-modify-write cycles
//!
//! The lock file lives next to the workspace document (`<path>.lock`) so
//! cooperating processes sharing the document serialize through the same
//! OS-level lock. Guards release on drop, so the lock is never leaked on
//! an error path.

use fd_lock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};

const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Advisory lock on a workspace document
pub struct WorkspaceLock {
    lock: RwLock<File>,
}

impl WorkspaceLock {
    /// Open (creating if needed) the lock file for a workspace document
    pub fn open(document_path: &Path) -> TrackerResult<Self> {
        if let Some(parent) = document_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let lock_path = document_path.with_extension("lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| TrackerError::lock(format!("failed to open lock file: {e}")))?;

        Ok(Self {
            lock: RwLock::new(file),
        })
    }

    /// Acquire the exclusive lock, blocking until it is available
    pub fn exclusive(&mut self) -> TrackerResult<RwLockWriteGuard<'_, File>> {
        self.lock
            .write()
            .map_err(|e| TrackerError::lock(format!("failed to acquire exclusive lock: {e}")))
    }

    /// Acquire the exclusive lock with a bounded wait.
    ///
    /// Retries while the lock is held elsewhere and fails with
    /// [`TrackerError::LockTimeout`] once the deadline passes.
    pub fn exclusive_timeout(
        &mut self,
        timeout: Duration,
    ) -> TrackerResult<RwLockWriteGuard<'_, File>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.lock.try_write() {
                Ok(guard) => {
                    // SAFETY: reborrow the guard for the function's return
                    // lifetime. The guard borrows `self.lock`, and on this
                    // branch we return it immediately without touching
                    // `self.lock` again, so the borrow is valid for the
                    // whole return. This works around a borrow-checker
                    // limitation (NLL without Polonius) that cannot return a
                    // borrow acquired inside a loop; it changes no runtime
                    // behavior.
                    return Ok(unsafe {
                        std::mem::transmute::<
                            RwLockWriteGuard<'_, File>,
                            RwLockWriteGuard<'_, File>,
                        >(guard)
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(TrackerError::LockTimeout(timeout));
                    }
                    debug!("workspace lock held elsewhere, retrying");
                    thread::sleep(RETRY_DELAY.min(timeout));
                }
                Err(e) => {
                    return Err(TrackerError::lock(format!(
                        "failed to acquire exclusive lock: {e}"
                    )))
                }
            }
        }
    }

    /// Acquire the shared lock for a read-only pass
    pub fn shared(&self) -> TrackerResult<RwLockReadGuard<'_, File>> {
        self.lock
            .read()
            .map_err(|e| TrackerError::lock(format!("failed to acquire shared lock: {e}")))
    }
}
