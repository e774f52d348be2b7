//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which keeps the backup
//! engine independent of any specific front end.

use crate::model::{BackupItem, BackupJob};

/// Trait for receiving progress updates from a backup job.
///
/// All methods are called synchronously from the thread running the job.
pub trait ProgressCallback: Send {
    /// Called once, after validation, before the first item.
    fn on_job_started(&self, job: &BackupJob);

    /// Called when an item (directory or file) is about to be processed.
    fn on_item_started(&self, job: &BackupJob, index: usize, item: &BackupItem);

    /// Called when an item is done (created, copied, skipped, or failed).
    fn on_item_completed(&self, job: &BackupJob, index: usize, item: &BackupItem);

    /// Called when every item has been processed.
    fn on_job_completed(&self, job: &BackupJob);
}
