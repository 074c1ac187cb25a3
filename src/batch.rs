//! Multi-repository runs.
//!
//! A batch is an ordered list of repository jobs, either discovered from the
//! subdirectories of a source directory or listed in a TOML manifest with
//! per-repository size overrides. Jobs run one after another; each job owns
//! its own traversal state and a failure in one never stops the others.

use crate::{
    budget::{DEFAULT_MAX_FILE_SIZE_KB, DEFAULT_MAX_OUTPUT_SIZE_KB},
    config::{repo_name_from_path, Config},
    error::{Error, Result},
    filter::InclusionPolicy,
    pipeline::{Pipeline, RunReport, RunStatus},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Importance of a manifest entry. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must be present in the knowledge set
    Critical,
    /// Strongly preferred
    High,
    /// Nice to have
    Medium,
    /// Optional
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        };
        f.write_str(label)
    }
}

/// TOML batch manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Default per-file limit for every entry
    #[serde(default)]
    pub max_file_size_kb: Option<u64>,

    /// Default output budget for every entry
    #[serde(default)]
    pub max_output_size_kb: Option<u64>,

    /// Repository groups, processed in order
    #[serde(default)]
    pub groups: Vec<ManifestGroup>,
}

/// A named set of repositories.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestGroup {
    /// Group label used in logs
    pub name: String,

    /// Repositories in this group
    #[serde(default)]
    pub repositories: Vec<ManifestRepository>,
}

/// One repository entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestRepository {
    /// Path, relative to the source directory unless absolute
    pub path: PathBuf,

    /// Name for the header and output file
    #[serde(default)]
    pub name: Option<String>,

    /// Importance label
    #[serde(default)]
    pub priority: Option<Priority>,

    /// Output budget for this repository in KB
    #[serde(default, alias = "max_output_size_kb")]
    pub max_size_kb: Option<u64>,

    /// Per-file limit for this repository in KB
    #[serde(default)]
    pub max_file_size_kb: Option<u64>,
}

impl Manifest {
    /// Loads a manifest from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content).map_err(|e| match e {
            Error::Manifest { message, .. } => Error::manifest(path, message),
            other => other,
        })
    }

    /// Parses a manifest from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid manifest.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::manifest("<inline>", e.to_string()))
    }

    /// Expands the manifest into jobs rooted at `source_dir`.
    #[must_use]
    pub fn jobs(&self, source_dir: &Path) -> Vec<RepoJob> {
        self.groups
            .iter()
            .flat_map(|group| {
                group.repositories.iter().map(move |repo| RepoJob {
                    path: source_dir.join(&repo.path),
                    name: repo.name.clone(),
                    group: Some(group.name.clone()),
                    priority: repo.priority,
                    max_output_size_kb: repo.max_size_kb.or(self.max_output_size_kb),
                    max_file_size_kb: repo.max_file_size_kb.or(self.max_file_size_kb),
                })
            })
            .collect()
    }
}

/// A single repository to process in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoJob {
    /// Repository directory
    pub path: PathBuf,

    /// Name override
    pub name: Option<String>,

    /// Manifest group, if any
    pub group: Option<String>,

    /// Manifest priority, if any
    pub priority: Option<Priority>,

    /// Output budget override in KB
    pub max_output_size_kb: Option<u64>,

    /// Per-file limit override in KB
    pub max_file_size_kb: Option<u64>,
}

impl RepoJob {
    /// Creates a job with no overrides.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            group: None,
            priority: None,
            max_output_size_kb: None,
            max_file_size_kb: None,
        }
    }

    /// Name the job reports under.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| repo_name_from_path(&self.path))
    }
}

/// Lists the immediate subdirectories of `source_dir` as jobs, sorted by name.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or has no subdirectories.
pub fn discover(source_dir: &Path) -> Result<Vec<RepoJob>> {
    let entries = fs::read_dir(source_dir).map_err(|e| Error::io(source_dir, e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(source_dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }

    if dirs.is_empty() {
        return Err(Error::no_repositories(source_dir));
    }

    dirs.sort();
    Ok(dirs.into_iter().map(RepoJob::new).collect())
}

/// Creates the output directory up front so an empty batch still leaves it.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn prepare_output_dir(output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))
}

/// Settings shared by every job in a batch.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Directory receiving all knowledge files
    pub output_dir: PathBuf,

    /// Output budget for jobs without an override, in KB
    pub max_output_size_kb: u64,

    /// Per-file limit for jobs without an override, in KB
    pub max_file_size_kb: u64,

    /// Selection rules applied to every job
    pub policy: InclusionPolicy,

    /// Dry run mode (no file writes)
    pub dry_run: bool,
}

impl BatchSettings {
    /// Creates settings with default limits and policy.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_output_size_kb: DEFAULT_MAX_OUTPUT_SIZE_KB,
            max_file_size_kb: DEFAULT_MAX_FILE_SIZE_KB,
            policy: InclusionPolicy::default(),
            dry_run: false,
        }
    }

    fn config_for(&self, job: &RepoJob) -> Result<Config> {
        let mut builder = Config::builder()
            .repo_dir(&job.path)
            .output_dir(&self.output_dir)
            .max_output_size_kb(job.max_output_size_kb.unwrap_or(self.max_output_size_kb))
            .max_file_size_kb(job.max_file_size_kb.unwrap_or(self.max_file_size_kb))
            .policy(self.policy.clone())
            .dry_run(self.dry_run);

        if let Some(name) = &job.name {
            builder = builder.repo_name(name.clone());
        }

        builder.build()
    }
}

/// Outcome of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Local time the batch finished
    pub generated_at: String,

    /// Directory receiving the knowledge files
    pub output_dir: PathBuf,

    /// Per-repository results, in processing order
    pub repositories: Vec<RunReport>,

    /// Repositories that were found and run
    pub processed: usize,

    /// Knowledge files written
    pub files_written: usize,

    /// Combined size of the written knowledge files in bytes
    pub total_output_bytes: u64,
}

impl BatchReport {
    fn new(output_dir: PathBuf, repositories: Vec<RunReport>) -> Self {
        let processed = repositories
            .iter()
            .filter(|r| !matches!(r.status, RunStatus::Missing))
            .count();
        let written: Vec<_> = repositories.iter().filter(|r| r.is_written()).collect();
        let files_written = written.len();
        let total_output_bytes = written.iter().map(|r| r.output_bytes).sum();

        Self {
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            output_dir,
            repositories,
            processed,
            files_written,
            total_output_bytes,
        }
    }

    /// Number of repositories whose run failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.repositories.iter().filter(|r| r.is_failed()).count()
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Prints a human-readable summary to stdout.
    #[allow(clippy::cast_precision_loss)]
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              Knowledge Batch Summary                  ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        for report in &self.repositories {
            let status = match &report.status {
                RunStatus::Written => "ok",
                RunStatus::NoFiles => "empty",
                RunStatus::DryRun => "dry",
                RunStatus::Missing => "missing",
                RunStatus::Failed { .. } => "failed",
            };
            println!(
                "║ {:<32} {:>7} {:>5} files  ║",
                truncate(&report.repository, 32),
                status,
                report.included
            );
        }
        println!("║                                                       ║");
        println!(
            "║ Repositories processed: {:>8}                      ║",
            self.processed
        );
        println!(
            "║ Knowledge files:        {:>8}                      ║",
            self.files_written
        );
        println!(
            "║ Total size:             {:>8.2} MB                   ║",
            self.total_output_bytes as f64 / (1024.0 * 1024.0)
        );
        println!("║ Output directory:                                     ║");
        println!("║   {}", self.output_dir.display());
        println!("║ Generated at: {}                     ║", self.generated_at);
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Runs every job in order and collects the reports.
///
/// Missing directories and failed runs are recorded and the batch moves on.
pub fn run_batch(jobs: &[RepoJob], settings: &BatchSettings) -> BatchReport {
    info!(
        "Processing {} repositories into {}",
        jobs.len(),
        settings.output_dir.display()
    );

    let reports = jobs.iter().map(|job| run_job(job, settings)).collect();
    let report = BatchReport::new(settings.output_dir.clone(), reports);

    info!(
        "All processing complete: {} repositories processed, {} knowledge files written",
        report.processed, report.files_written
    );
    report
}

fn run_job(job: &RepoJob, settings: &BatchSettings) -> RunReport {
    let name = job.display_name();

    if !job.path.is_dir() {
        warn!("Missing repository: {}", job.path.display());
        return RunReport::missing(name);
    }

    match (&job.group, job.priority) {
        (Some(group), Some(priority)) => info!("{} [{}] - processing {}", priority, group, name),
        (Some(group), None) => info!("[{}] - processing {}", group, name),
        (None, Some(priority)) => info!("{} - processing {}", priority, name),
        (None, None) => info!("Starting processing for {}", name),
    }

    match settings.config_for(job).and_then(Pipeline::new) {
        Ok(pipeline) => pipeline.run(),
        Err(e) => {
            error!("Error processing {}: {}", name, e);
            RunReport::failed(name, e.to_string())
        }
    }
}
