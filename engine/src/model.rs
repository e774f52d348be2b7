//! Core data model for backup jobs.
//!
//! This module defines the main data structures for representing a backup run:
//! - BackupJob: one filtered copy from a source root to a target root
//! - BackupItem: a single directory or file within a job
//! - ItemState, JobState, OverwritePolicy: enums controlling behavior
//! - BackupReport: summary handed back once a job has run

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::checksums::{ChecksumAlgorithm, Verification};
use crate::filter_set::FilterSet;

/// Represents a single backup job.
///
/// A BackupJob encompasses:
/// - Source and target root directories
/// - The filters deciding what is copied
/// - Every directory and file that survived filtering, with its grafted destination
/// - Current state and progress counters
#[derive(Debug)]
pub struct BackupJob {
    /// Unique identifier for this job
    pub id: Uuid,

    /// Root source directory
    pub source_path: PathBuf,

    /// Root target directory
    pub destination_path: PathBuf,

    /// Filters applied while scanning the source
    pub filters: FilterSet,

    /// How to handle existing destination files
    pub overwrite_policy: OverwritePolicy,

    /// Directories first (root included), then files
    pub items: Vec<BackupItem>,

    pub state: JobState,

    /// Total bytes to copy (sum of all planned file sizes)
    pub total_bytes_to_copy: u64,

    /// Bytes copied so far
    pub total_bytes_copied: u64,

    /// Index of currently processing item (if Running)
    pub current_item_index: Option<usize>,

    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    /// Hash both sides of every copied file when set
    pub verify_with: Option<ChecksumAlgorithm>,
}

impl BackupJob {
    pub fn directories(&self) -> impl Iterator<Item = &BackupItem> {
        self.items.iter().filter(|i| i.is_dir)
    }

    pub fn files(&self) -> impl Iterator<Item = &BackupItem> {
        self.items.iter().filter(|i| !i.is_dir)
    }

    /// Number of items currently in `state`.
    pub fn count(&self, state: ItemState) -> usize {
        self.items.iter().filter(|i| i.state == state).count()
    }
}

/// A single directory or file within a backup job.
#[derive(Debug, Clone)]
pub struct BackupItem {
    /// Full source path
    pub source_path: PathBuf,

    /// Grafted destination path
    pub destination_path: PathBuf,

    /// True if this item represents a directory
    pub is_dir: bool,

    /// File size in bytes at scan time (0 for directories)
    pub file_size: u64,

    pub state: ItemState,

    /// Bytes copied for this file
    pub bytes_copied: u64,

    /// OS error code if state is Failed
    pub error_code: Option<i32>,

    /// Human-readable error message naming the failed operation and path
    pub error_message: Option<String>,

    /// Set when verify-after-copy ran for this file
    pub verification: Option<Verification>,
}

impl BackupItem {
    pub(crate) fn new(
        source_path: PathBuf,
        destination_path: PathBuf,
        is_dir: bool,
        file_size: u64,
    ) -> Self {
        BackupItem {
            source_path,
            destination_path,
            is_dir,
            file_size,
            state: ItemState::Pending,
            bytes_copied: 0,
            error_code: None,
            error_message: None,
            verification: None,
        }
    }
}

/// The state of an individual item within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Not yet processed
    Pending,
    /// Currently being created or copied
    Copying,
    /// Directory exists at the destination, or file copied
    Done,
    /// Destination file existed and the policy said not to overwrite it
    Skipped,
    /// Error occurred; see `error_message`
    Failed,
}

impl ItemState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Done | ItemState::Skipped | ItemState::Failed)
    }
}

/// The state of an entire backup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created, not yet scanned
    Pending,
    /// Source scanned, items known
    Planned,
    /// Currently executing
    Running,
    /// All items processed (some may have failed)
    Completed,
    /// Stopped early by its cancellation token
    Cancelled,
}

impl JobState {
    pub(crate) fn name(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Planned => "planned",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Cancelled => "cancelled",
        }
    }
}

/// Policy for handling existing files at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Don't overwrite; leave existing files untouched
    #[default]
    Skip,
    /// Always overwrite existing files
    Overwrite,
}

impl From<bool> for OverwritePolicy {
    fn from(overwrite: bool) -> Self {
        if overwrite {
            OverwritePolicy::Overwrite
        } else {
            OverwritePolicy::Skip
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverwritePolicy::Skip => write!(f, "Skip"),
            OverwritePolicy::Overwrite => write!(f, "Overwrite"),
        }
    }
}

/// Outcome of one item, detached from the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub is_dir: bool,
    pub error: Option<String>,
}

impl From<&BackupItem> for ItemOutcome {
    fn from(item: &BackupItem) -> Self {
        ItemOutcome {
            source_path: item.source_path.clone(),
            destination_path: item.destination_path.clone(),
            is_dir: item.is_dir,
            error: item.error_message.clone(),
        }
    }
}

/// Per-item results of a finished job.
#[derive(Debug, Clone, Default)]
pub struct BackupReport {
    pub done: Vec<ItemOutcome>,
    pub skipped: Vec<ItemOutcome>,
    pub failed: Vec<ItemOutcome>,
    /// Items never reached because the job was cancelled
    pub pending: Vec<ItemOutcome>,
    pub bytes_copied: u64,
}

impl BackupReport {
    pub fn from_job(job: &BackupJob) -> Self {
        let mut report = BackupReport {
            bytes_copied: job.total_bytes_copied,
            ..Default::default()
        };
        for item in &job.items {
            let outcome = ItemOutcome::from(item);
            match item.state {
                ItemState::Done => report.done.push(outcome),
                ItemState::Skipped => report.skipped.push(outcome),
                ItemState::Failed => report.failed.push(outcome),
                ItemState::Pending | ItemState::Copying => report.pending.push(outcome),
            }
        }
        report
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.pending.is_empty()
    }
}
