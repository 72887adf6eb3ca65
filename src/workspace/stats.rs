//! Incremental timing and error statistics
//!
//! Maintained without storing individual samples: extremes by direct
//! comparison, the mean by Welford-style running update, error counts by
//! keyword matching on the failure message.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Failure categories derived from error messages.
///
/// Categorization is a keyword heuristic, not a guarantee: messages are
/// matched case-insensitively against a small fixed vocabulary and
/// anything unmatched lands in [`ErrorCategory::Unknown`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The description call timed out
    Timeout,
    /// The worker ran out of memory
    Memory,
    /// The source file disappeared
    FileNotFound,
    /// The source file was not readable
    Permission,
    /// Anything the vocabulary does not cover
    Unknown,
}

impl ErrorCategory {
    /// Categorize a failure message by case-insensitive substring match
    pub fn categorize(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("timeout") {
            ErrorCategory::Timeout
        } else if message.contains("memory") {
            ErrorCategory::Memory
        } else if message.contains("file not found") || message.contains("not found") {
            ErrorCategory::FileNotFound
        } else if message.contains("permission") {
            ErrorCategory::Permission
        } else {
            ErrorCategory::Unknown
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Memory => "memory",
            ErrorCategory::FileNotFound => "file_not_found",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Running extremes and mean of the description call duration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimes {
    /// Fastest completed call in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest_ms: Option<u64>,
    /// Slowest completed call in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest_ms: Option<u64>,
    /// Running mean in milliseconds
    pub average_ms: f64,
    /// Number of completions that carried a timing value; the
    /// denominator of the mean
    pub samples: u64,
}

impl ProcessingTimes {
    fn record(&mut self, ms: u64) {
        self.fastest_ms = Some(self.fastest_ms.map_or(ms, |f| f.min(ms)));
        self.slowest_ms = Some(self.slowest_ms.map_or(ms, |s| s.max(ms)));
        self.samples += 1;
        self.average_ms += (ms as f64 - self.average_ms) / self.samples as f64;
    }
}

/// Statistics block of the workspace document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStatistics {
    /// Timing extremes and mean across completed items
    pub processing_times: ProcessingTimes,
    /// Failure counts per category
    #[serde(default)]
    pub errors: BTreeMap<ErrorCategory, u64>,
}

impl BatchStatistics {
    /// Feed one completed call's duration into the running statistics
    pub fn record_processing_time(&mut self, ms: u64) {
        self.processing_times.record(ms);
    }

    /// Categorize a failure message and bump its bucket
    pub fn record_error(&mut self, message: &str) -> ErrorCategory {
        let category = ErrorCategory::categorize(message);
        *self.errors.entry(category).or_insert(0) += 1;
        category
    }

    /// Count recorded for one category
    pub fn error_count(&self, category: ErrorCategory) -> u64 {
        self.errors.get(&category).copied().unwrap_or(0)
    }

    /// Total failures across all categories
    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }
}
