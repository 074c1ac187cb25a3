use crate::budget::{SizeBudget, DEFAULT_MAX_FILE_SIZE_KB, DEFAULT_MAX_OUTPUT_SIZE_KB};
use crate::error::{Error, Result};
use crate::filter::InclusionPolicy;
use std::path::{Component, Path, PathBuf};

const DEFAULT_OUTPUT_DIR: &str = "out";

/// Configuration for one repository run.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Repository root to aggregate
    pub repo_dir: PathBuf,

    /// Directory receiving the knowledge file
    pub output_dir: PathBuf,

    /// Name used in the header and output file name; defaults to the
    /// repository directory's base name
    pub repo_name: Option<String>,

    /// Maximum knowledge file body size in KB
    pub max_output_size_kb: u64,

    /// Maximum individual file size in KB
    pub max_file_size_kb: u64,

    /// File and directory selection rules
    pub policy: InclusionPolicy,

    /// Dry run mode (no file writes)
    pub dry_run: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use repo_knowledge::Config;
    ///
    /// let config = Config::builder()
    ///     .repo_dir("./my-repo")
    ///     .output_dir("./knowledge")
    ///     .max_output_size_kb(800)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Repository directory doesn't exist or is not a directory
    /// - Either size limit is zero or too large
    pub fn validate(&self) -> Result<()> {
        if !self.repo_dir.exists() {
            return Err(Error::config(format!(
                "Repository directory does not exist: {}",
                self.repo_dir.display()
            )));
        }

        if !self.repo_dir.is_dir() {
            return Err(Error::config(format!(
                "Repository path is not a directory: {}",
                self.repo_dir.display()
            )));
        }

        if let Some(name) = &self.repo_name {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(Error::config(format!("Invalid repository name: '{name}'")));
            }
        }

        self.size_budget().map(|_| ())
    }

    /// Returns the byte limits derived from the KB settings.
    ///
    /// # Errors
    ///
    /// Returns an error if either limit is zero or overflows.
    pub fn size_budget(&self) -> Result<SizeBudget> {
        SizeBudget::from_kb(self.max_file_size_kb, self.max_output_size_kb)
    }

    /// Returns the effective repository name.
    #[must_use]
    pub fn repository_name(&self) -> String {
        self.repo_name
            .clone()
            .unwrap_or_else(|| repo_name_from_path(&self.repo_dir))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            repo_name: None,
            max_output_size_kb: DEFAULT_MAX_OUTPUT_SIZE_KB,
            max_file_size_kb: DEFAULT_MAX_FILE_SIZE_KB,
            policy: InclusionPolicy::default(),
            dry_run: false,
        }
    }
}

/// Base name of a repository path after normalization.
///
/// `./repos/demo/` yields `demo` and `repos/demo/..` yields `repos`; a path
/// with no named component falls back to the current directory's name.
#[must_use]
pub fn repo_name_from_path(path: &Path) -> String {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().to_string()),
            Component::ParentDir => {
                parts.pop();
            }
            _ => {}
        }
    }

    parts
        .pop()
        .or_else(|| {
            std::env::current_dir()
                .ok()
                .and_then(|cwd| cwd.file_name().map(|n| n.to_string_lossy().to_string()))
        })
        .unwrap_or_else(|| "repository".to_string())
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    repo_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    repo_name: Option<String>,
    max_output_size_kb: Option<u64>,
    max_file_size_kb: Option<u64>,
    policy: Option<InclusionPolicy>,
    include_extensions: Option<Vec<String>>,
    exclude_dirs: Option<Vec<String>>,
    exclude_files: Option<Vec<String>>,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Sets the repository directory to aggregate.
    #[must_use]
    pub fn repo_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_dir = Some(path.into());
        self
    }

    /// Sets the output directory for the knowledge file.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Overrides the repository name used in the header and file name.
    #[must_use]
    pub fn repo_name(mut self, name: impl Into<String>) -> Self {
        self.repo_name = Some(name.into());
        self
    }

    /// Sets the maximum knowledge file body size in KB.
    #[must_use]
    pub fn max_output_size_kb(mut self, kb: u64) -> Self {
        self.max_output_size_kb = Some(kb);
        self
    }

    /// Sets the maximum individual file size in KB.
    #[must_use]
    pub fn max_file_size_kb(mut self, kb: u64) -> Self {
        self.max_file_size_kb = Some(kb);
        self
    }

    /// Sets the whole inclusion policy.
    ///
    /// The individual list setters still apply on top of it.
    #[must_use]
    pub fn policy(mut self, policy: InclusionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Replaces the default allowed extensions.
    #[must_use]
    pub fn include_extensions(mut self, extensions: Vec<String>) -> Self {
        self.include_extensions = Some(extensions);
        self
    }

    /// Replaces the default excluded directory names.
    #[must_use]
    pub fn exclude_dirs(mut self, names: Vec<String>) -> Self {
        self.exclude_dirs = Some(names);
        self
    }

    /// Replaces the default excluded file names.
    #[must_use]
    pub fn exclude_files(mut self, names: Vec<String>) -> Self {
        self.exclude_files = Some(names);
        self
    }

    /// Enables dry run mode (no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let mut policy = self.policy.unwrap_or_default();
        if let Some(extensions) = self.include_extensions {
            policy = policy.include_extensions(extensions);
        }
        if let Some(dirs) = self.exclude_dirs {
            policy = policy.exclude_dirs(dirs);
        }
        if let Some(files) = self.exclude_files {
            policy = policy.exclude_files(files);
        }

        let config = Config {
            repo_dir: self.repo_dir.unwrap_or_else(|| PathBuf::from(".")),
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            repo_name: self.repo_name,
            max_output_size_kb: self
                .max_output_size_kb
                .unwrap_or(DEFAULT_MAX_OUTPUT_SIZE_KB),
            max_file_size_kb: self.max_file_size_kb.unwrap_or(DEFAULT_MAX_FILE_SIZE_KB),
            policy,
            dry_run: self.dry_run,
        };

        config.validate()?;
        Ok(config)
    }
}
