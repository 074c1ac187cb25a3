//! # repo-knowledge
//!
//! Turns local source repositories into bounded-size Markdown knowledge files
//! meant to be fed to a language model as context.
//!
//! ## Features
//!
//! - Extension allow-list with directory and file-name exclusions
//! - Per-file size limit and a cumulative output budget
//! - Fenced code blocks tagged with a language derived from the extension
//! - Atomic writes of `{name}_knowledge.md`
//! - Batch runs over many repositories with TOML overrides
//!
//! ## Quick Start
//!
//! ```no_run
//! use repo_knowledge::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .repo_dir("./matrix-nio-main")
//!     .output_dir("./knowledge")
//!     .max_output_size_kb(500)
//!     .max_file_size_kb(50)
//!     .build()?;
//!
//! let report = Pipeline::new(config)?.run();
//! println!("{} included, {} skipped", report.included, report.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! One repository run is a short pipeline:
//! 1. **Filter**: decides per file name and extension whether a file is eligible
//! 2. **Budget**: rejects oversized files and stops once the output budget is met
//! 3. **Scanner**: walks the tree top-down and renders admitted files
//! 4. **Writer**: prepends the summary header and persists the document

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod budget;
mod config;
mod error;
mod file;
mod filter;
mod pipeline;
mod render;
mod scanner;
mod template;
mod writer;

pub mod batch;

pub use budget::{SizeBudget, DEFAULT_MAX_FILE_SIZE_KB, DEFAULT_MAX_OUTPUT_SIZE_KB};
pub use config::{repo_name_from_path, Config, ConfigBuilder};
pub use error::{Error, Result};
pub use file::{dotted_extension, CandidateFile};
pub use filter::{
    Classification, InclusionPolicy, SkipReason, DEFAULT_EXCLUDE_DIRS, DEFAULT_EXCLUDE_FILES,
    DEFAULT_INCLUDE_EXTENSIONS,
};
pub use pipeline::{Pipeline, RunReport, RunStatus};
pub use render::{language_tag, rendering_overhead, RenderedBlock};
pub use scanner::{Aggregate, SkipCounts};
pub use writer::KNOWLEDGE_FILE_SUFFIX;

use std::path::Path;

/// Aggregates one repository and writes its knowledge file.
///
/// This is the main entry point for the library. Only an invalid
/// configuration is returned as an error; everything that goes wrong during
/// the run itself is reported through [`RunReport::status`].
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Repository directory doesn't exist
///
/// # Examples
///
/// ```no_run
/// use repo_knowledge::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .repo_dir("./aiogram-dev-3.x")
///     .output_dir("./knowledge")
///     .build()?;
///
/// let report = run(config)?;
/// assert!(report.included > 0);
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<RunReport> {
    Ok(Pipeline::new(config)?.run())
}

/// Walks a repository and returns the rendered body without writing anything.
#[must_use]
pub fn aggregate(repo_dir: &Path, policy: &InclusionPolicy, budget: SizeBudget) -> Aggregate {
    scanner::Scanner::new(repo_dir, policy.clone(), budget).scan()
}
