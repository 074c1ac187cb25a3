use crate::{
    config::Config,
    error::Result,
    scanner::{Aggregate, Scanner, SkipCounts},
    writer::Writer,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// How a repository run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// A knowledge file was written
    Written,
    /// No file qualified; nothing was written
    NoFiles,
    /// Dry run; nothing was written
    DryRun,
    /// Repository directory was not found
    Missing,
    /// The run failed; sibling runs are unaffected
    Failed {
        /// What went wrong
        message: String,
    },
}

/// Outcome of one repository run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Repository name
    pub repository: String,

    /// Files included in the knowledge file
    pub included: usize,

    /// Files skipped
    pub skipped: usize,

    /// Skips by reason
    pub skip_breakdown: SkipCounts,

    /// Size of the rendered file blocks in bytes
    pub body_bytes: u64,

    /// Whether the output budget cut the traversal short
    pub budget_exhausted: bool,

    /// Written knowledge file, if any
    pub output_path: Option<PathBuf>,

    /// Size of the written knowledge file in bytes
    pub output_bytes: u64,

    /// Final status
    pub status: RunStatus,

    /// Wall time of the run
    pub duration: Duration,
}

impl RunReport {
    fn empty(repository: String, status: RunStatus) -> Self {
        Self {
            repository,
            included: 0,
            skipped: 0,
            skip_breakdown: SkipCounts::default(),
            body_bytes: 0,
            budget_exhausted: false,
            output_path: None,
            output_bytes: 0,
            status,
            duration: Duration::ZERO,
        }
    }

    /// Report for a repository directory that does not exist.
    #[must_use]
    pub fn missing(repository: impl Into<String>) -> Self {
        Self::empty(repository.into(), RunStatus::Missing)
    }

    /// Report for a run that could not start or finish.
    #[must_use]
    pub fn failed(repository: impl Into<String>, message: impl Into<String>) -> Self {
        Self::empty(
            repository.into(),
            RunStatus::Failed {
                message: message.into(),
            },
        )
    }

    /// Returns true if a knowledge file was written.
    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self.status, RunStatus::Written)
    }

    /// Returns true if the run failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }

    /// Prints a human-readable summary to stdout.
    #[allow(clippy::cast_precision_loss)]
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║            Repository Knowledge Summary               ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Repository:   {:<40}║", self.repository);
        println!("║ Status:       {:<40}║", self.status_label());
        println!("║ Included:     {:>8} files                          ║", self.included);
        println!("║ Skipped:      {:>8} files                          ║", self.skipped);
        println!(
            "║   - excluded: {:>8}  unsupported: {:>8}        ║",
            self.skip_breakdown.excluded_name, self.skip_breakdown.unsupported_extension
        );
        println!(
            "║   - oversize: {:>8}  unreadable:  {:>8}        ║",
            self.skip_breakdown.oversized, self.skip_breakdown.unreadable
        );
        println!(
            "║ Output:       {:>8.2} KB                            ║",
            self.output_bytes as f64 / 1024.0
        );
        println!(
            "║ Duration:     {:>8.2}s                              ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }

    fn status_label(&self) -> String {
        match &self.status {
            RunStatus::Written => "written".to_string(),
            RunStatus::NoFiles => "no suitable files".to_string(),
            RunStatus::DryRun => "dry run".to_string(),
            RunStatus::Missing => "missing".to_string(),
            RunStatus::Failed { message } => format!("failed: {message}"),
        }
    }
}

/// Aggregates one repository and writes its knowledge file.
pub struct Pipeline {
    config: Config,
    scanner: Scanner,
    writer: Writer,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - Writer initialization fails
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let scanner = Scanner::new(
            config.repo_dir.clone(),
            config.policy.clone(),
            config.size_budget()?,
        );
        let writer = Writer::new(config.output_dir.clone())?;

        Ok(Self {
            config,
            scanner,
            writer,
        })
    }

    /// Runs the repository and reports the outcome.
    ///
    /// Never fails: write errors and any other failure end up in
    /// [`RunStatus::Failed`] so callers can move on to the next repository.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use repo_knowledge::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .repo_dir("./aiogram-dev-3.x")
    ///     .output_dir("./knowledge")
    ///     .build()?;
    ///
    /// let report = Pipeline::new(config)?.run();
    /// report.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(repo = %self.config.repo_dir.display()))]
    pub fn run(self) -> RunReport {
        let start_time = Instant::now();
        let repository = self.config.repository_name();

        info!("Processing repository: {}", repository);

        let aggregate = self.scanner.scan();
        let mut report = RunReport {
            repository,
            included: aggregate.included,
            skipped: aggregate.skipped,
            skip_breakdown: aggregate.skip_breakdown,
            body_bytes: aggregate.body_bytes,
            budget_exhausted: aggregate.budget_exhausted,
            output_path: None,
            output_bytes: 0,
            status: RunStatus::NoFiles,
            duration: Duration::ZERO,
        };

        let status = self.finish(&aggregate, &mut report);
        report.status = status;
        report.duration = start_time.elapsed();

        info!(
            "Included {} files, skipped {} files in {:.2}s",
            report.included,
            report.skipped,
            report.duration.as_secs_f64()
        );

        report
    }

    fn finish(&self, aggregate: &Aggregate, report: &mut RunReport) -> RunStatus {
        if aggregate.is_empty() {
            info!("No suitable files found to process for {}", report.repository);
            return RunStatus::NoFiles;
        }

        if self.config.dry_run {
            warn!("Dry run mode enabled - skipping write");
            return RunStatus::DryRun;
        }

        match self.writer.write(&report.repository, aggregate) {
            Ok(Some(written)) => {
                report.output_path = Some(written.path);
                report.output_bytes = written.bytes;
                RunStatus::Written
            }
            Ok(None) => RunStatus::NoFiles,
            Err(e) => {
                error!("Error writing knowledge file for {}: {}", report.repository, e);
                RunStatus::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::fs;
    use std::path::Path;

    fn config_for(repo: &Path, out: &Path) -> crate::config::ConfigBuilder {
        Config::builder().repo_dir(repo).output_dir(out)
    }

    #[test]
    fn test_pipeline_basic_execution() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("demo");
        repo.child("a.py").write_str("print(1)").unwrap();
        repo.child("a.md").write_str("# readme").unwrap();
        repo.child("secrets.log").write_str("hunter2").unwrap();
        let out = temp.child("out");

        let config = config_for(repo.path(), out.path())
            .exclude_files(vec!["secrets.log".to_string()])
            .build()
            .unwrap();
        let report = Pipeline::new(config).unwrap().run();

        assert_eq!(report.status, RunStatus::Written);
        assert_eq!(report.included, 2);
        assert_eq!(report.skipped, 1);

        let path = out.path().join("demo_knowledge.md");
        assert_eq!(report.output_path.as_deref(), Some(path.as_path()));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Repository: demo\n"));
        assert!(content.contains("**Files Included**: 2 files"));
        assert!(content.contains("## File: a.py\n\n```py\nprint(1)\n```"));
        assert!(content.contains("## File: a.md\n\n# readme\n\n"));
        assert!(!content.contains("hunter2"));
        assert_eq!(report.output_bytes, content.len() as u64);
    }

    #[test]
    fn test_pipeline_empty_repository_writes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("empty");
        repo.create_dir_all().unwrap();
        let out = temp.child("out");

        let config = config_for(repo.path(), out.path()).build().unwrap();
        let report = Pipeline::new(config).unwrap().run();

        assert_eq!(report.status, RunStatus::NoFiles);
        assert_eq!(report.included, 0);
        assert!(report.output_path.is_none());
        assert!(!out.path().join("empty_knowledge.md").exists());
    }

    #[test]
    fn test_pipeline_oversized_file_only() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("big");
        repo.child("huge.rs").write_str(&"a".repeat(2048)).unwrap();
        let out = temp.child("out");

        let config = config_for(repo.path(), out.path())
            .max_file_size_kb(1)
            .build()
            .unwrap();
        let report = Pipeline::new(config).unwrap().run();

        assert_eq!(report.status, RunStatus::NoFiles);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.skip_breakdown.oversized, 1);
        assert!(!out.exists());
    }

    #[test]
    fn test_pipeline_output_budget_bounds_document() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("bounded");
        for i in 0..3 {
            repo.child(format!("f{i}.txt")).write_str(&"b".repeat(500)).unwrap();
        }
        let out = temp.child("out");

        let config = config_for(repo.path(), out.path())
            .max_output_size_kb(1)
            .build()
            .unwrap();
        let report = Pipeline::new(config).unwrap().run();

        assert!(report.is_written());
        assert!(report.included <= 2);
        assert!(report.budget_exhausted);
        assert!(report.body_bytes <= 1024);

        let content = fs::read_to_string(out.path().join("bounded_knowledge.md")).unwrap();
        let body_start = content.find("## File:").unwrap();
        assert!(content[body_start..].len() as u64 <= 1024);
    }

    #[test]
    fn test_pipeline_dry_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("dry");
        repo.child("main.rs").write_str("fn main() {}").unwrap();
        let out = temp.child("out");

        let config = config_for(repo.path(), out.path())
            .dry_run(true)
            .build()
            .unwrap();
        let report = Pipeline::new(config).unwrap().run();

        assert_eq!(report.status, RunStatus::DryRun);
        assert_eq!(report.included, 1);
        assert!(!out.exists());
    }

    #[test]
    fn test_pipeline_write_failure_is_contained() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("repo");
        repo.child("main.rs").write_str("fn main() {}").unwrap();
        let blocker = temp.child("out");
        blocker.write_str("not a directory").unwrap();

        let config = config_for(repo.path(), blocker.path()).build().unwrap();
        let report = Pipeline::new(config).unwrap().run();

        assert!(report.is_failed());
        assert_eq!(report.included, 1);
        assert!(report.output_path.is_none());
    }

    #[test]
    fn test_pipeline_repo_name_override() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("python-telegram-bot-master");
        repo.child("bot.py").write_str("import telegram").unwrap();
        let out = temp.child("out");

        let config = config_for(repo.path(), out.path())
            .repo_name("Python_Telegram_Bot_Essential")
            .build()
            .unwrap();
        let report = Pipeline::new(config).unwrap().run();

        assert!(report.is_written());
        let content = fs::read_to_string(
            out.path().join("Python_Telegram_Bot_Essential_knowledge.md"),
        )
        .unwrap();
        assert!(content.starts_with("# Repository: Python_Telegram_Bot_Essential\n"));
    }

    #[test]
    fn test_pipeline_rerun_is_stable() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("stable");
        repo.child("src/lib.rs").write_str("pub fn f() {}").unwrap();
        repo.child("README.md").write_str("hello").unwrap();
        let out = temp.child("out");

        let run = || {
            let config = config_for(repo.path(), out.path()).build().unwrap();
            Pipeline::new(config).unwrap().run();
            fs::read_to_string(out.path().join("stable_knowledge.md")).unwrap()
        };

        let first = run();
        let second = run();
        let mut first_blocks: Vec<_> = first.split("## File: ").skip(1).collect();
        let mut second_blocks: Vec<_> = second.split("## File: ").skip(1).collect();
        first_blocks.sort_unstable();
        second_blocks.sort_unstable();
        assert_eq!(first_blocks, second_blocks);
    }

    #[test]
    fn test_report_constructors() {
        let missing = RunReport::missing("gone");
        assert_eq!(missing.status, RunStatus::Missing);
        assert!(!missing.is_written());

        let failed = RunReport::failed("broken", "boom");
        assert!(failed.is_failed());
        assert_eq!(failed.status_label(), "failed: boom");
    }
}
