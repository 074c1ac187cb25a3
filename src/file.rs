use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A file discovered during traversal, before any size checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Absolute (or caller-rooted) path used for IO
    pub path: PathBuf,

    /// Path relative to the repository root, as shown in headers
    pub relative_path: String,

    /// Base name of the file
    pub file_name: String,

    /// Lower-case leading-dot extension, empty when absent
    pub extension: String,
}

impl CandidateFile {
    /// Creates a candidate from its path and the repository root.
    #[must_use]
    pub fn new(path: &Path, root: &Path) -> Self {
        let relative_path = pathdiff::diff_paths(path, root)
            .unwrap_or_else(|| path.to_path_buf())
            .to_string_lossy()
            .to_string();

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            relative_path,
            file_name,
            extension: dotted_extension(path),
        }
    }

    /// Reads the on-disk size, following symlinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be stat-ed.
    pub fn size_on_disk(&self) -> Result<u64> {
        fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| Error::io(&self.path, e))
    }

    /// Reads the file as text, replacing invalid UTF-8 sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn read_lossy(&self) -> Result<String> {
        read_lossy(&self.path)
    }
}

/// Returns the lower-case extension with a leading dot, or an empty string.
///
/// Dotfiles such as `.env` have no extension.
#[must_use]
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Reads a file as UTF-8, substituting U+FFFD for invalid byte sequences.
///
/// Decoding never fails: losing a few characters is preferred over losing
/// the file.
///
/// # Errors
///
/// Returns an error only if the file cannot be read.
pub(crate) fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Replaced invalid UTF-8 in {}", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}
