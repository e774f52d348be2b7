//! Job orchestration module.
//!
//! This module provides the backup lifecycle:
//! - Creating a job from source/target paths, filters and an overwrite policy
//! - Planning a job: scanning the filtered source tree and grafting every item
//! - Running a job: materializing directories, then copying files
//!
//! Per-item failures during a run are recorded on the item and do not stop
//! the remaining items. Nothing is rolled back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::checksums;
use crate::error::{EngineError, Result};
use crate::filter_set::FilterSet;
use crate::fs_ops;
use crate::graft::graft;
use crate::model::{BackupItem, BackupJob, BackupReport, ItemState, JobState, OverwritePolicy};
use crate::progress::ProgressCallback;
use crate::tree::FileTree;

/// Determine whether a file should be copied given its destination and policy.
fn should_copy_file(item: &BackupItem, policy: OverwritePolicy) -> bool {
    if !item.destination_path.exists() {
        return true;
    }

    match policy {
        OverwritePolicy::Skip => false,
        OverwritePolicy::Overwrite => true,
    }
}

fn require_state(job: &BackupJob, expected: JobState) -> Result<()> {
    if job.state == expected {
        Ok(())
    } else {
        Err(EngineError::InvalidState {
            expected: expected.name(),
            actual: job.state.name(),
        })
    }
}

fn record_failure(item: &mut BackupItem, err: &EngineError) {
    warn!(path = %item.source_path.display(), error = %err, "item failed");
    item.state = ItemState::Failed;
    item.error_code = err.raw_os_error();
    item.error_message = Some(match std::error::Error::source(err) {
        Some(cause) => format!("{}: {}", err, cause),
        None => err.to_string(),
    });
}

/// Create a new backup job.
///
/// Validates that the source path exists and is a directory. The target may
/// not exist yet; it is created during execution. Both roots are stored as
/// absolute paths.
///
/// # Errors
/// - `SourceNotFound` / `SourceAccessDenied` if the source cannot be inspected
/// - `InvalidPath` if the source is not a directory, the target is empty, or
///   the target resolves to the source itself
pub fn create_job<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    filters: FilterSet,
    overwrite_policy: OverwritePolicy,
) -> Result<BackupJob> {
    let source = source.as_ref();
    let destination = destination.as_ref();

    match fs::metadata(source) {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(EngineError::InvalidPath {
                    path: source.to_path_buf(),
                    reason: "source must be a directory".to_string(),
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EngineError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(EngineError::SourceAccessDenied {
                path: source.to_path_buf(),
                source: e,
            });
        }
    }

    if destination.as_os_str().is_empty() {
        return Err(EngineError::InvalidPath {
            path: destination.to_path_buf(),
            reason: "destination path is empty".to_string(),
        });
    }

    // The target must not resolve to the source directory.
    if let (Ok(canonical_source), Ok(canonical_target)) =
        (fs::canonicalize(source), fs::canonicalize(destination))
    {
        if canonical_source == canonical_target {
            return Err(EngineError::InvalidPath {
                path: destination.to_path_buf(),
                reason: format!("destination is the source directory {}", source.display()),
            });
        }
    }

    let absolute = |p: &Path| -> Result<PathBuf> {
        std::path::absolute(p).map_err(|e| EngineError::InvalidPath {
            path: p.to_path_buf(),
            reason: e.to_string(),
        })
    };

    Ok(BackupJob {
        id: Uuid::new_v4(),
        source_path: absolute(source)?,
        destination_path: absolute(destination)?,
        filters,
        overwrite_policy,
        items: Vec::new(),
        state: JobState::Pending,
        total_bytes_to_copy: 0,
        total_bytes_copied: 0,
        current_item_index: None,
        created_at: Utc::now(),
        start_time: None,
        end_time: None,
        verify_with: None,
    })
}

/// Plan a job by scanning the filtered source tree.
///
/// Populates `job.items` with every surviving directory (the source root
/// first, always included) followed by every surviving file, each carrying its
/// grafted destination.
///
/// # Errors
/// Any scan error aborts planning; the job stays `Pending`.
pub fn plan_job(job: &mut BackupJob, cancel: &CancelToken) -> Result<()> {
    require_state(job, JobState::Pending)?;

    let predicate = job.filters.predicate();
    let tree = FileTree::build(&job.source_path, Some(&predicate), cancel)?;
    let source_root = tree.root().path.clone();

    let mut items = Vec::with_capacity(tree.len());
    for dir in tree.directories() {
        let dest = graft(&dir.path, &source_root, &job.destination_path)?;
        items.push(BackupItem::new(dir.path.clone(), dest, true, 0));
    }
    for file in tree.files() {
        let dest = graft(&file.path, &source_root, &job.destination_path)?;
        let size = match fs::metadata(&file.path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "cannot stat file while planning");
                0
            }
        };
        items.push(BackupItem::new(file.path.clone(), dest, false, size));
    }

    job.total_bytes_to_copy = items.iter().filter(|i| !i.is_dir).map(|i| i.file_size).sum();
    job.items = items;
    job.state = JobState::Planned;

    debug!(
        job = %job.id,
        directories = job.directories().count(),
        files = job.files().count(),
        bytes = job.total_bytes_to_copy,
        "planned backup"
    );
    Ok(())
}

/// Run a planned job.
///
/// Directories are created (if absent) before any file is copied; planning
/// orders every directory item ahead of every file item. Each file is copied
/// when its destination is missing or the policy is `Overwrite`, otherwise it
/// is skipped untouched. A file whose destination directory could not be
/// created fails without a copy attempt.
///
/// # Errors
/// - `InvalidState` unless the job is `Planned`
/// - `Cancelled` if `cancel` fires; unprocessed items stay `Pending`
pub fn run_job(
    job: &mut BackupJob,
    progress_callback: Option<&dyn ProgressCallback>,
    cancel: &CancelToken,
) -> Result<()> {
    require_state(job, JobState::Planned)?;

    job.state = JobState::Running;
    job.start_time = Some(Utc::now());

    if let Some(callback) = progress_callback {
        callback.on_job_started(job);
    }

    let mut failed_dirs: Vec<PathBuf> = Vec::new();

    for index in 0..job.items.len() {
        if cancel.is_cancelled() {
            job.state = JobState::Cancelled;
            job.end_time = Some(Utc::now());
            job.current_item_index = None;
            info!(job = %job.id, processed = index, "backup cancelled");
            return Err(EngineError::Cancelled);
        }

        job.current_item_index = Some(index);

        if let Some(callback) = progress_callback {
            callback.on_item_started(job, index, &job.items[index]);
        }

        if job.items[index].is_dir {
            materialize_directory(&mut job.items[index], &mut failed_dirs);
        } else {
            let copied = copy_file(
                &mut job.items[index],
                job.overwrite_policy,
                job.verify_with,
                &failed_dirs,
            );
            job.total_bytes_copied += copied;
        }

        if let Some(callback) = progress_callback {
            callback.on_item_completed(job, index, &job.items[index]);
        }
    }

    job.state = JobState::Completed;
    job.end_time = Some(Utc::now());
    job.current_item_index = None;

    info!(
        job = %job.id,
        done = job.count(ItemState::Done),
        skipped = job.count(ItemState::Skipped),
        failed = job.count(ItemState::Failed),
        bytes = job.total_bytes_copied,
        "backup completed"
    );

    if let Some(callback) = progress_callback {
        callback.on_job_completed(job);
    }

    Ok(())
}

fn materialize_directory(item: &mut BackupItem, failed_dirs: &mut Vec<PathBuf>) {
    item.state = ItemState::Copying;
    match fs_ops::create_dir_if_absent(&item.destination_path) {
        Ok(created) => {
            if created {
                debug!(path = %item.destination_path.display(), "created directory");
            }
            item.state = ItemState::Done;
        }
        Err(e) => {
            record_failure(item, &e);
            failed_dirs.push(item.destination_path.clone());
        }
    }
}

/// Returns the number of bytes written.
fn copy_file(
    item: &mut BackupItem,
    policy: OverwritePolicy,
    verify_with: Option<checksums::ChecksumAlgorithm>,
    failed_dirs: &[PathBuf],
) -> u64 {
    if let Some(parent) = failed_dirs
        .iter()
        .find(|dir| item.destination_path.starts_with(dir))
    {
        item.state = ItemState::Failed;
        item.error_message = Some(format!(
            "not copied: destination directory {} could not be created",
            parent.display()
        ));
        return 0;
    }

    if !should_copy_file(item, policy) {
        item.state = ItemState::Skipped;
        return 0;
    }

    item.state = ItemState::Copying;
    let bytes = match fs_ops::copy_file_with_metadata(&item.source_path, &item.destination_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            record_failure(item, &e);
            return 0;
        }
    };
    item.bytes_copied = bytes;
    item.state = ItemState::Done;

    if let Some(algorithm) = verify_with {
        match checksums::verify_copy(&item.source_path, &item.destination_path, algorithm) {
            Ok(verification) => {
                if !verification.passed() {
                    item.state = ItemState::Failed;
                    item.error_message = Some(format!(
                        "verification failed for {}: source {} != destination {}",
                        item.destination_path.display(),
                        verification.source,
                        verification.destination
                    ));
                }
                item.verification = Some(verification);
            }
            Err(e) => record_failure(item, &e),
        }
    }

    bytes
}

/// Create, plan and run a backup in one call.
///
/// Equivalent to `create_job` + `plan_job` + `run_job` without progress
/// reporting or cancellation.
pub fn backup<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    filters: FilterSet,
    overwrite: bool,
) -> Result<BackupReport> {
    let cancel = CancelToken::new();
    let mut job = create_job(source, destination, filters, overwrite.into())?;
    plan_job(&mut job, &cancel)?;
    run_job(&mut job, None, &cancel)?;
    Ok(BackupReport::from_job(&job))
}
