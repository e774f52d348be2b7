//! # MacUp Engine - Filtered Backup Library
//!
//! A headless engine that copies a directory tree from a source root to a
//! target root, keeping only the entries that pass a list of filters.
//!
//! ## Overview
//!
//! - Regex and keyword filters, matched against file names or full paths,
//!   restricted to files, directories or both, used as whitelist or blacklist
//! - AND-combination of filters; filters that don't apply to an entry's kind abstain
//! - A filtered, arena-backed file tree built without call-stack recursion
//! - Component-wise path grafting from the source root to the target root
//! - Directory materialization followed by file copies under an overwrite policy
//! - Per-item outcome tracking, progress callbacks and cooperative cancellation
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{backup, Application, Filter, FilterSet, ItemType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let filters = FilterSet::new(vec![
//!     Filter::keyword("no-cache", "cache", Application::Filenames, ItemType::Directory, false),
//!     Filter::regex("no-temp", r"~\$", Application::Filenames, ItemType::Files, false)?,
//! ]);
//!
//! let report = backup("/home/me/docs", "/mnt/backup/docs", filters, false)?;
//! println!("{} copied, {} skipped", report.done.len(), report.skipped.len());
//! for failure in &report.failed {
//!     eprintln!("{}: {:?}", failure.source_path.display(), failure.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **filter**: single filter rules and their persisted form
//! - **filter_set**: AND-combination of filters
//! - **tree**: filtered file tree
//! - **graft**: source-to-target path relocation
//! - **job**: job orchestration (create, plan, run)
//! - **model**: job and item data structures
//! - **fs_ops**: low-level filesystem writes
//! - **checksums**: verify-after-copy
//! - **config**: saved configurations
//! - **progress**: progress callback trait
//! - **cancel**: cancellation token
//! - **error**: error types

pub mod cancel;
pub mod checksums;
pub mod config;
pub mod error;
pub mod filter;
pub mod filter_set;
pub mod fs_ops;
pub mod graft;
pub mod job;
pub mod model;
pub mod progress;
pub mod tree;

// Re-export main types and functions
pub use cancel::CancelToken;
pub use checksums::{compute_file_checksum, ChecksumAlgorithm, ChecksumValue, Verification};
pub use config::{ConfigStore, Configuration};
pub use error::{EngineError, ErrorCategory};
pub use filter::{Application, Filter, FilterKind, FilterRecord, FilterType, ItemType};
pub use filter_set::FilterSet;
pub use graft::{graft, graft_all};
pub use job::{backup, create_job, plan_job, run_job};
pub use model::{
    BackupItem, BackupJob, BackupReport, ItemOutcome, ItemState, JobState, OverwritePolicy,
};
pub use progress::ProgressCallback;
pub use tree::{FileNode, FileTree, NodeId};
