//! Inclusion policy and path classification.
//!
//! Decides, from names alone, whether a file may enter a knowledge file and
//! which directories are never descended into. No content sniffing happens
//! here: a name that passes is read later with lossy decoding.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fmt;

/// Extensions included by default, in lower-case leading-dot form.
pub const DEFAULT_INCLUDE_EXTENSIONS: &[&str] = &[
    // Documentation
    ".txt",
    ".md",
    ".markdown",
    ".rst",
    // Code & config
    ".py",
    ".js",
    ".ts",
    ".jsx",
    ".tsx",
    ".json",
    ".yaml",
    ".yml",
    // Web
    ".html",
    ".css",
    ".scss",
    ".less",
    ".xml",
    ".vue",
    ".svelte",
    // Other languages
    ".java",
    ".c",
    ".cpp",
    ".h",
    ".hpp",
    ".go",
    ".rs",
    ".php",
    ".sh",
    ".bash",
    ".rb",
    ".pl",
    ".sql",
    ".csv",
    ".tsv",
    ".toml",
    ".ini",
    ".cfg",
    ".conf",
    // Build and environment
    ".dockerfile",
    ".env",
    ".sample",
    ".log",
];

/// Directory names never descended into, at any depth.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "bower_components",
    "vendor",
    "build",
    "dist",
    "out",
    "target",
    ".idea",
    ".vscode",
    "__pycache__",
    ".pytest_cache",
    "obj",
    "bin",
    "logs",
    "tmp",
    "temp",
];

/// File names excluded regardless of extension.
pub const DEFAULT_EXCLUDE_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Pipfile.lock",
    "Gemfile.lock",
    ".DS_Store",
    "Thumbs.db",
    "npm-debug.log",
    "CVS",
];

static DEFAULT_POLICY: Lazy<InclusionPolicy> = Lazy::new(|| InclusionPolicy {
    include_extensions: DEFAULT_INCLUDE_EXTENSIONS
        .iter()
        .map(|ext| normalize_extension(ext))
        .collect(),
    exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| (*s).to_string()).collect(),
    exclude_files: DEFAULT_EXCLUDE_FILES.iter().map(|s| (*s).to_string()).collect(),
});

/// Why a file was left out of a knowledge file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Base name is in the excluded file set.
    ExcludedName,
    /// Extension is not in the allow-list.
    UnsupportedExtension,
    /// On-disk size exceeds the per-file limit.
    Oversized {
        /// Size on disk in bytes
        size: u64,
        /// Per-file limit in bytes
        limit: u64,
    },
    /// Size could not be determined.
    StatFailed(String),
    /// Content could not be read.
    ReadFailed(String),
    /// Including the file would overflow the output budget.
    BudgetExhausted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcludedName => write!(f, "explicitly excluded"),
            Self::UnsupportedExtension => write!(f, "unsupported file type"),
            Self::Oversized { size, limit } => {
                write!(f, "too large ({size} bytes > {limit} bytes)")
            }
            Self::StatFailed(msg) => write!(f, "could not get size: {msg}"),
            Self::ReadFailed(msg) => write!(f, "could not read: {msg}"),
            Self::BudgetExhausted => write!(f, "output budget exhausted"),
        }
    }
}

/// Outcome of classifying one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Eligible for inclusion, pending size checks.
    Include,
    /// Never included.
    Exclude(SkipReason),
}

/// Immutable file and directory selection rules.
///
/// Extension matching is case-insensitive; directory and file name
/// exclusion is exact and case-sensitive. Supplying any of the three sets
/// replaces the corresponding default entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionPolicy {
    include_extensions: HashSet<String>,
    exclude_dirs: HashSet<String>,
    exclude_files: HashSet<String>,
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}

impl InclusionPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the allowed extensions.
    ///
    /// Entries may be given with or without a leading dot and in any case.
    #[must_use]
    pub fn include_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.include_extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        self
    }

    /// Replaces the excluded directory names.
    #[must_use]
    pub fn exclude_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dirs = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the excluded file names.
    #[must_use]
    pub fn exclude_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_files = names.into_iter().map(Into::into).collect();
        self
    }

    /// Classifies a file by its base name and extension.
    ///
    /// `extension` is the leading-dot form (`".rs"`), or empty when the file
    /// has none. Name exclusion is checked first.
    #[must_use]
    pub fn classify(&self, file_name: &str, extension: &str) -> Classification {
        if self.exclude_files.contains(file_name) {
            return Classification::Exclude(SkipReason::ExcludedName);
        }

        if !self
            .include_extensions
            .contains(&extension.to_ascii_lowercase())
        {
            return Classification::Exclude(SkipReason::UnsupportedExtension);
        }

        Classification::Include
    }

    /// Returns true if a directory with this name must not be entered.
    #[must_use]
    pub fn is_excluded_dir(&self, dir_name: &str) -> bool {
        self.exclude_dirs.contains(dir_name)
    }

    /// Returns true if the extension is allowed.
    #[must_use]
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.include_extensions
            .contains(&normalize_extension(extension))
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_includes_common_types() {
        let policy = InclusionPolicy::default();
        assert_eq!(policy.classify("main.rs", ".rs"), Classification::Include);
        assert_eq!(policy.classify("README.md", ".md"), Classification::Include);
        assert_eq!(
            policy.classify("image.png", ".png"),
            Classification::Exclude(SkipReason::UnsupportedExtension)
        );
        assert_eq!(
            policy.classify("Makefile", ""),
            Classification::Exclude(SkipReason::UnsupportedExtension)
        );
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let policy = InclusionPolicy::default();
        assert_eq!(policy.classify("App.PY", ".PY"), Classification::Include);
        assert_eq!(
            policy.classify("prod.Dockerfile", ".Dockerfile"),
            Classification::Include
        );
    }

    #[test]
    fn test_name_exclusion_checked_before_extension() {
        let policy = InclusionPolicy::default();
        assert_eq!(
            policy.classify("package-lock.json", ".json"),
            Classification::Exclude(SkipReason::ExcludedName)
        );
        assert_eq!(
            policy.classify("CVS", ""),
            Classification::Exclude(SkipReason::ExcludedName)
        );
    }

    #[test]
    fn test_name_exclusion_is_case_sensitive() {
        let policy = InclusionPolicy::default();
        assert_eq!(
            policy.classify("YARN.lock", ".lock"),
            Classification::Exclude(SkipReason::UnsupportedExtension)
        );
        assert_eq!(
            policy.classify("Package-Lock.json", ".json"),
            Classification::Include
        );
    }

    #[test]
    fn test_excluded_dirs() {
        let policy = InclusionPolicy::default();
        assert!(policy.is_excluded_dir(".git"));
        assert!(policy.is_excluded_dir("node_modules"));
        assert!(!policy.is_excluded_dir("src"));
        assert!(!policy.is_excluded_dir("Node_Modules"));
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let policy = InclusionPolicy::default()
            .include_extensions(["RS", ".toml"])
            .exclude_dirs(["generated"])
            .exclude_files(["secrets.toml"]);

        assert_eq!(policy.classify("lib.rs", ".rs"), Classification::Include);
        assert_eq!(
            policy.classify("notes.md", ".md"),
            Classification::Exclude(SkipReason::UnsupportedExtension)
        );
        assert_eq!(
            policy.classify("secrets.toml", ".toml"),
            Classification::Exclude(SkipReason::ExcludedName)
        );
        assert_eq!(policy.classify("yarn.lock", ".toml"), Classification::Include);
        assert!(policy.is_excluded_dir("generated"));
        assert!(!policy.is_excluded_dir("node_modules"));
    }

    #[test]
    fn test_overrides_do_not_leak_into_defaults() {
        let _custom = InclusionPolicy::default().include_extensions([".zig"]);
        let fresh = InclusionPolicy::default();
        assert!(fresh.allows_extension(".py"));
        assert!(!fresh.allows_extension(".zig"));
    }

    #[test]
    fn test_allows_extension_normalizes() {
        let policy = InclusionPolicy::default();
        assert!(policy.allows_extension("rs"));
        assert!(policy.allows_extension(".YML"));
        assert!(!policy.allows_extension("exe"));
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::Oversized { size: 2048, limit: 1024 };
        assert_eq!(reason.to_string(), "too large (2048 bytes > 1024 bytes)");
        assert_eq!(SkipReason::ExcludedName.to_string(), "explicitly excluded");
    }
}
