//! Change notification for live progress observers
//!
//! Observers register closures that receive the item ids touched by each
//! successful mutation. The registry is owned by the tracker instance.
//! Callback execution is best-effort: by the time callbacks run the
//! mutation is already durable, and a panicking observer is logged and
//! skipped so it cannot break the tracker for the others.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Shared handle to a registered change observer
pub type ChangeCallback = Arc<dyn Fn(&[String]) + Send + Sync + 'static>;

/// Opaque handle returned by callback registration, used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackHandle(u64);

struct RegistryInner {
    next_id: u64,
    callbacks: Vec<(u64, ChangeCallback)>,
}

/// Registry of change observers
pub(crate) struct CallbackRegistry {
    inner: Mutex<RegistryInner>,
}

impl CallbackRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_id: 0,
                callbacks: Vec::new(),
            }),
        }
    }

    /// Register an observer and return its removal handle
    pub(crate) fn add(&self, callback: impl Fn(&[String]) + Send + Sync + 'static) -> CallbackHandle {
        let mut inner = self.lock_inner();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.callbacks.push((id, Arc::new(callback)));
        CallbackHandle(id)
    }

    /// Remove an observer; reports whether the handle was still registered
    pub(crate) fn remove(&self, handle: CallbackHandle) -> bool {
        let mut inner = self.lock_inner();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|(id, _)| *id != handle.0);
        inner.callbacks.len() != before
    }

    /// Invoke every observer with the touched item ids.
    ///
    /// Runs outside the store lock. Panics are caught per callback and
    /// never propagate.
    pub(crate) fn notify(&self, touched: &[String]) {
        let callbacks: Vec<ChangeCallback> = self
            .lock_inner()
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(touched))).is_err() {
                warn!(
                    touched = touched.len(),
                    "change callback panicked; mutation already durable, continuing"
                );
            }
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
