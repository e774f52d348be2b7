//! MacUp - Command-line interface for the filtered backup engine.
//!
//! Runs ad-hoc backups from command-line filters, or saved configurations
//! from a JSON store, reporting progress to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use engine::{
    create_job, plan_job, run_job, Application, BackupItem, BackupJob, CancelToken,
    ChecksumAlgorithm, ConfigStore, Configuration, Filter, FilterRecord, FilterSet, FilterType,
    ItemState, ItemType, OverwritePolicy, ProgressCallback,
};

/// MacUp - selectively back up a directory tree
#[derive(Parser, Debug)]
#[command(name = "macup")]
#[command(version)]
#[command(about = "Copy a directory tree, keeping only what passes your filters")]
struct Cli {
    /// Configuration store (JSON). Defaults to <config dir>/macup/configs.json
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Print every item and debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up SRC into DST using filters given on the command line
    Backup {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        verify: VerifyArgs,
    },
    /// Run a saved configuration
    Run {
        name: String,

        #[command(flatten)]
        verify: VerifyArgs,
    },
    /// Save (or replace) a named configuration
    Save {
        name: String,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// List saved configurations
    List,
    /// Show one saved configuration
    Show { name: String },
    /// Delete a saved configuration
    Delete { name: String },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Source directory
    #[arg(long, value_name = "PATH")]
    src: PathBuf,

    /// Target directory
    #[arg(long, value_name = "PATH")]
    dst: PathBuf,

    /// Filter as TYPE:APPLICATION:ITEM_TYPE:MODE:DATA,
    /// e.g. regex:filenames:files:exclude:^~\$ (repeatable)
    #[arg(long = "filter", value_name = "SPEC")]
    filters: Vec<String>,

    /// Overwrite files that already exist in the target
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Hash source and destination after every copy
    #[arg(long)]
    verify: bool,

    /// Checksum algorithm for verification: md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM", default_value = "sha256", requires = "verify")]
    hash: String,
}

impl VerifyArgs {
    fn algorithm(&self) -> Result<Option<ChecksumAlgorithm>> {
        if !self.verify {
            return Ok(None);
        }
        self.hash
            .parse::<ChecksumAlgorithm>()
            .map(Some)
            .map_err(|e| anyhow!(e))
    }
}

/// Parse `TYPE:APPLICATION:ITEM_TYPE:MODE:DATA`. DATA is everything after the
/// fourth colon, so it may itself contain colons.
fn parse_filter_spec(index: usize, spec: &str) -> Result<Filter> {
    let parts: Vec<&str> = spec.splitn(5, ':').collect();
    let [filter_type, application, item_type, mode, data] = parts[..] else {
        bail!(
            "filter '{}' must look like TYPE:APPLICATION:ITEM_TYPE:MODE:DATA",
            spec
        );
    };

    let whitelist = match mode.to_lowercase().as_str() {
        "include" | "whitelist" => true,
        "exclude" | "blacklist" => false,
        other => bail!(
            "filter '{}': mode must be include or exclude, got '{}'",
            spec,
            other
        ),
    };

    let filter = Filter::new(
        format!("filter-{}", index + 1),
        filter_type.parse::<FilterType>()?,
        data,
        application.parse::<Application>()?,
        item_type.parse::<ItemType>()?,
        whitelist,
    )?;
    Ok(filter)
}

fn parse_filters(specs: &[String]) -> Result<Vec<Filter>> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            parse_filter_spec(i, spec).with_context(|| format!("invalid --filter '{}'", spec))
        })
        .collect()
}

/// CLI implementation of ProgressCallback for displaying backup progress
struct CliProgress {
    verbose: bool,
    start_time: Instant,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

impl ProgressCallback for CliProgress {
    fn on_job_started(&self, job: &BackupJob) {
        eprintln!("Starting backup...");
        eprintln!("  Source: {}", job.source_path.display());
        eprintln!("  Target: {}", job.destination_path.display());
        eprintln!("  Filters: {}", job.filters.len());
        eprintln!("  Overwrite: {}", job.overwrite_policy);
        eprintln!(
            "  Plan: {} directories, {} files, {}",
            job.directories().count(),
            job.files().count(),
            Self::format_bytes(job.total_bytes_to_copy)
        );
    }

    fn on_item_started(&self, _job: &BackupJob, _index: usize, _item: &BackupItem) {}

    fn on_item_completed(&self, _job: &BackupJob, index: usize, item: &BackupItem) {
        if !self.verbose {
            return;
        }
        let status = match item.state {
            ItemState::Done if item.is_dir => "Dir",
            ItemState::Done => "Copied",
            ItemState::Skipped => "Skipped",
            ItemState::Failed => "Failed",
            _ => "Unknown",
        };
        eprintln!("[{:4}] {}: {}", index, status, item.destination_path.display());
    }

    fn on_job_completed(&self, job: &BackupJob) {
        eprintln!();
        eprintln!(
            "Summary: {} done, {} skipped, {} failed",
            job.count(ItemState::Done),
            job.count(ItemState::Skipped),
            job.count(ItemState::Failed)
        );
        eprintln!("Bytes copied: {}", Self::format_bytes(job.total_bytes_copied));
        eprintln!("Elapsed: {:.1?}", self.start_time.elapsed());

        let failed: Vec<_> = job
            .items
            .iter()
            .filter(|i| i.state == ItemState::Failed)
            .collect();
        if !failed.is_empty() {
            eprintln!();
            eprintln!("Failed items:");
            for item in failed {
                eprintln!(
                    "  {}: {}",
                    item.source_path.display(),
                    item.error_message.as_deref().unwrap_or("(unknown error)")
                );
            }
        }
    }
}

fn default_store_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow!("cannot determine a config directory; pass --store"))?;
    Ok(base.join("macup").join("configs.json"))
}

/// Returns `Ok(true)` when every item succeeded.
fn execute_backup(
    src: &Path,
    dst: &Path,
    filters: FilterSet,
    policy: OverwritePolicy,
    verify_with: Option<ChecksumAlgorithm>,
    verbose: bool,
) -> Result<bool> {
    let cancel = CancelToken::new();

    let mut job = create_job(src, dst, filters, policy).context("Job creation failed")?;
    job.verify_with = verify_with;

    plan_job(&mut job, &cancel).context("Scanning the source failed")?;

    let progress = CliProgress::new(verbose);
    run_job(&mut job, Some(&progress), &cancel).context("Backup failed")?;

    Ok(job.count(ItemState::Failed) == 0)
}

fn print_configuration(config: &Configuration) -> Result<()> {
    println!("{}", config.name);
    println!("  source:    {}", config.source_dir.display());
    println!("  target:    {}", config.target_dir.display());
    println!("  overwrite: {}", config.overwrite);
    let filters = config
        .filter_set()
        .with_context(|| format!("configuration '{}' has an invalid filter", config.name))?;
    if filters.is_empty() {
        println!("  filters:   (none)");
    } else {
        println!("  filters:");
        for filter in filters.filters() {
            println!("    {}", filter);
        }
    }
    Ok(())
}

/// Main CLI logic - separated for testability.
///
/// Returns `Ok(false)` when the command ran but some items failed.
fn run_cli(cli: &Cli) -> Result<bool> {
    let store = || -> Result<ConfigStore> {
        let path = match &cli.store {
            Some(path) => path.clone(),
            None => default_store_path()?,
        };
        Ok(ConfigStore::open(path))
    };

    match &cli.command {
        Command::Backup { target, verify } => {
            let filters = FilterSet::new(parse_filters(&target.filters)?);
            execute_backup(
                &target.src,
                &target.dst,
                filters,
                target.overwrite.into(),
                verify.algorithm()?,
                cli.verbose,
            )
        }
        Command::Run { name, verify } => {
            let store = store()?;
            let config = store.load(name)?.ok_or_else(|| {
                anyhow!(
                    "no configuration named '{}' in {}",
                    name,
                    store.path().display()
                )
            })?;
            let filters = config
                .filter_set()
                .with_context(|| format!("configuration '{}' has an invalid filter", name))?;
            execute_backup(
                &config.source_dir,
                &config.target_dir,
                filters,
                config.overwrite.into(),
                verify.algorithm()?,
                cli.verbose,
            )
        }
        Command::Save { name, target } => {
            let filters = parse_filters(&target.filters)?;
            let config = Configuration {
                name: name.clone(),
                source_dir: target.src.clone(),
                target_dir: target.dst.clone(),
                filters: filters.iter().map(FilterRecord::from).collect(),
                overwrite: target.overwrite,
            };
            let store = store()?;
            store.save(&config)?;
            eprintln!("Saved '{}' to {}", name, store.path().display());
            Ok(true)
        }
        Command::List => {
            for config in store()?.load_all()? {
                println!(
                    "{}\t{} -> {}",
                    config.name,
                    config.source_dir.display(),
                    config.target_dir.display()
                );
            }
            Ok(true)
        }
        Command::Show { name } => {
            let config = store()?
                .load(name)?
                .ok_or_else(|| anyhow!("no configuration named '{}'", name))?;
            print_configuration(&config)?;
            Ok(true)
        }
        Command::Delete { name } => {
            if !store()?.delete(name)? {
                bail!("no configuration named '{}'", name);
            }
            eprintln!("Deleted '{}'", name);
            Ok(true)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_cli(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("Error: one or more items failed to back up");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn cli(store: &Path, command: Command) -> Cli {
        Cli {
            store: Some(store.to_path_buf()),
            verbose: false,
            command,
        }
    }

    fn target(src: &Path, dst: &Path, filters: &[&str], overwrite: bool) -> TargetArgs {
        TargetArgs {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            filters: filters.iter().map(|s| s.to_string()).collect(),
            overwrite,
        }
    }

    fn no_verify() -> VerifyArgs {
        VerifyArgs {
            verify: false,
            hash: "sha256".to_string(),
        }
    }

    fn sample_source(dir: &TempDir) -> PathBuf {
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("A/B")).expect("Failed to create dirs");
        fs::write(src.join("A/x.txt"), b"x").expect("Failed to write file");
        fs::write(src.join("A/B/y.txt"), b"y").expect("Failed to write file");
        src
    }

    #[test]
    fn test_cli_parses_arguments() {
        let cli = Cli::try_parse_from([
            "macup",
            "--store",
            "/tmp/s.json",
            "backup",
            "--src",
            "/a",
            "--dst",
            "/b",
            "--filter",
            "keyword:paths:both:exclude:cache",
            "--overwrite",
        ])
        .expect("arguments should parse");

        match cli.command {
            Command::Backup { target, verify } => {
                assert_eq!(target.filters.len(), 1);
                assert!(target.overwrite);
                assert!(!verify.verify);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_hash_requires_verify() {
        let result = Cli::try_parse_from([
            "macup", "backup", "--src", "/a", "--dst", "/b", "--hash", "md5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_filter_spec() {
        let filter = parse_filter_spec(0, "regex:filenames:files:exclude:^a:b").unwrap();
        assert_eq!(filter.name(), "filter-1");
        assert_eq!(filter.filter_type(), FilterType::Regex);
        assert_eq!(filter.application(), Application::Filenames);
        assert_eq!(filter.item_type(), ItemType::Files);
        assert!(!filter.is_whitelist());
        assert_eq!(filter.data(), "^a:b");

        assert!(parse_filter_spec(0, "regex:filenames:files").is_err());
        assert!(parse_filter_spec(0, "regex:filenames:files:maybe:x").is_err());
        assert!(parse_filter_spec(0, "glob:filenames:files:include:x").is_err());
        assert!(parse_filter_spec(0, "regex:filenames:files:include:(").is_err());
    }

    #[test]
    fn test_cli_backup_with_filter() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let src = sample_source(&dir);
        let dst = dir.path().join("dst");

        let cli = cli(
            &dir.path().join("store.json"),
            Command::Backup {
                target: target(&src, &dst, &["regex:filenames:files:exclude:y"], true),
                verify: no_verify(),
            },
        );

        assert!(run_cli(&cli).expect("backup should run"));
        assert!(dst.join("A/x.txt").is_file());
        assert!(dst.join("A/B").is_dir());
        assert!(!dst.join("A/B/y.txt").exists());
    }

    #[test]
    fn test_cli_backup_with_verification() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let src = sample_source(&dir);
        let dst = dir.path().join("dst");

        let cli = cli(
            &dir.path().join("store.json"),
            Command::Backup {
                target: target(&src, &dst, &[], false),
                verify: VerifyArgs {
                    verify: true,
                    hash: "blake3".to_string(),
                },
            },
        );

        assert!(run_cli(&cli).expect("backup should run"));
    }

    #[test]
    fn test_cli_rejects_missing_source() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let cli = cli(
            &dir.path().join("store.json"),
            Command::Backup {
                target: target(
                    Path::new("/nonexistent/path"),
                    &dir.path().join("dst"),
                    &[],
                    false,
                ),
                verify: no_verify(),
            },
        );
        assert!(run_cli(&cli).is_err());
    }

    #[test]
    fn test_cli_rejects_invalid_hash_algorithm() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let src = sample_source(&dir);
        let cli = cli(
            &dir.path().join("store.json"),
            Command::Backup {
                target: target(&src, &dir.path().join("dst"), &[], false),
                verify: VerifyArgs {
                    verify: true,
                    hash: "crc32".to_string(),
                },
            },
        );
        assert!(run_cli(&cli).is_err());
    }

    #[test]
    fn test_cli_save_then_run() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let src = sample_source(&dir);
        let dst = dir.path().join("dst");
        let store_path = dir.path().join("store.json");

        let save = cli(
            &store_path,
            Command::Save {
                name: "docs".to_string(),
                target: target(&src, &dst, &["keyword:filenames:directory:exclude:B"], false),
            },
        );
        assert!(run_cli(&save).unwrap());

        let stored = ConfigStore::open(&store_path).load("docs").unwrap().unwrap();
        assert_eq!(stored.filters.len(), 1);
        assert_eq!(stored.filters[0].item_type, "DIRECTORY");

        let run = cli(
            &store_path,
            Command::Run {
                name: "docs".to_string(),
                verify: no_verify(),
            },
        );
        assert!(run_cli(&run).unwrap());
        assert!(dst.join("A/x.txt").is_file());
        assert!(!dst.join("A/B").exists());
    }

    #[test]
    fn test_cli_run_unknown_configuration() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let run = cli(
            &dir.path().join("store.json"),
            Command::Run {
                name: "missing".to_string(),
                verify: no_verify(),
            },
        );
        assert!(run_cli(&run).is_err());
    }

    #[test]
    fn test_cli_delete() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store_path = dir.path().join("store.json");
        ConfigStore::open(&store_path).save_new_blank("old").unwrap();

        let delete = |name: &str| {
            run_cli(&cli(
                &store_path,
                Command::Delete {
                    name: name.to_string(),
                },
            ))
        };
        assert!(delete("old").unwrap());
        assert!(delete("old").is_err());
    }

    #[test]
    fn test_cli_reports_item_failures() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let src = sample_source(&dir);
        let dst = dir.path().join("dst");
        fs::create_dir_all(dst.join("A")).unwrap();
        fs::write(dst.join("A/B"), b"blocking file").unwrap();

        let cli = cli(
            &dir.path().join("store.json"),
            Command::Backup {
                target: target(&src, &dst, &[], true),
                verify: no_verify(),
            },
        );
        assert!(!run_cli(&cli).expect("run completes with failures"));
    }
}
