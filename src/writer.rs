use crate::{
    error::{Error, Result},
    scanner::Aggregate,
    template::{HeaderContext, TemplateEngine},
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Suffix appended to the repository name to form the output file name.
pub const KNOWLEDGE_FILE_SUFFIX: &str = "_knowledge.md";

/// A persisted knowledge file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WrittenDocument {
    pub(crate) path: PathBuf,
    pub(crate) bytes: u64,
}

/// Writes knowledge files with atomic replace semantics.
pub(crate) struct Writer {
    output_dir: PathBuf,
    template_engine: TemplateEngine,
}

impl Writer {
    /// Creates a new writer targeting `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if template engine initialization fails.
    pub(crate) fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            output_dir: output_dir.into(),
            template_engine: TemplateEngine::new()?,
        })
    }

    /// Path of the knowledge file for a repository.
    pub(crate) fn output_path(&self, repo_name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{repo_name}{KNOWLEDGE_FILE_SUFFIX}"))
    }

    /// Renders the full document: header followed by the joined blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if the header template fails to render.
    pub(crate) fn render(&self, repo_name: &str, aggregate: &Aggregate) -> Result<String> {
        let header = self.template_engine.render_header(&HeaderContext::new(
            repo_name,
            aggregate.included,
            aggregate.body_bytes,
        ))?;

        let body_len = usize::try_from(aggregate.body_bytes).unwrap_or_default();
        let mut document = String::with_capacity(header.len() + body_len);
        document.push_str(&header);
        for block in &aggregate.blocks {
            document.push_str(block.as_str());
        }
        Ok(document)
    }

    /// Writes the knowledge file, replacing any existing one.
    ///
    /// Nothing is written when the aggregate is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Output directory cannot be created
    /// - Template rendering fails
    /// - File write operations fail
    pub(crate) fn write(
        &self,
        repo_name: &str,
        aggregate: &Aggregate,
    ) -> Result<Option<WrittenDocument>> {
        if aggregate.is_empty() {
            debug!("No content for {}, nothing written", repo_name);
            return Ok(None);
        }

        fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let document = self.render(repo_name, aggregate)?;
        let path = self.output_path(repo_name);
        write_file_atomic(&path, &document)?;

        let bytes = fs::metadata(&path)
            .map(|m| m.len())
            .unwrap_or(document.len() as u64);

        info!(
            "Created knowledge file {} ({} bytes)",
            path.display(),
            bytes
        );

        Ok(Some(WrittenDocument { path, bytes }))
    }
}

/// Writes a file atomically.
///
/// Content goes to a sibling temporary file which is synced and then
/// renamed over the target, so readers never observe a partial document.
/// The temporary file is removed on any failure.
fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("md.tmp");

    write_synced(&temp_path, content)
        .and_then(|()| fs::rename(&temp_path, path).map_err(|e| Error::io(path, e)))
        .inspect_err(|_| {
            let _ = fs::remove_file(&temp_path);
        })
}

fn write_synced(path: &Path, content: &str) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    file.write_all(content.as_bytes()).map_err(|e| Error::io(path, e))?;
    file.sync_all().map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderedBlock;
    use assert_fs::prelude::*;

    fn aggregate_of(blocks: Vec<RenderedBlock>) -> Aggregate {
        let body_bytes = blocks.iter().map(RenderedBlock::len).sum();
        Aggregate {
            included: blocks.len(),
            blocks,
            body_bytes,
            ..Aggregate::default()
        }
    }

    fn sample_aggregate() -> Aggregate {
        aggregate_of(vec![
            RenderedBlock::render("main.rs", ".rs", "fn main() {}"),
            RenderedBlock::render("README.md", ".md", "# Demo"),
        ])
    }

    #[test]
    fn test_writer_creates_output_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output_dir = temp.child("nested/output");

        let writer = Writer::new(output_dir.path()).unwrap();
        let written = writer.write("demo", &sample_aggregate()).unwrap().unwrap();

        assert!(output_dir.exists());
        assert_eq!(written.path, output_dir.path().join("demo_knowledge.md"));
        assert!(written.path.exists());
    }

    #[test]
    fn test_writer_document_layout() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = Writer::new(temp.path()).unwrap();
        let aggregate = sample_aggregate();

        let written = writer.write("demo", &aggregate).unwrap().unwrap();
        let content = fs::read_to_string(&written.path).unwrap();

        assert!(content.starts_with("# Repository: demo\n"));
        assert!(content.contains("**Files Included**: 2 files"));
        assert!(content.ends_with(&aggregate.body()));
        assert!(content.contains("---\n\n## File: main.rs\n\n```rs\nfn main() {}\n```\n\n"));
        assert_eq!(written.bytes, content.len() as u64);
    }

    #[test]
    fn test_writer_skips_empty_aggregate() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output_dir = temp.child("out");
        let writer = Writer::new(output_dir.path()).unwrap();

        let written = writer.write("empty", &Aggregate::default()).unwrap();

        assert!(written.is_none());
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_writer_overwrites_existing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let existing = temp.child("demo_knowledge.md");
        existing.write_str("stale content").unwrap();

        let writer = Writer::new(temp.path()).unwrap();
        writer.write("demo", &sample_aggregate()).unwrap();

        let content = fs::read_to_string(existing.path()).unwrap();
        assert!(!content.contains("stale content"));
        assert!(content.starts_with("# Repository: demo"));

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_writer_reports_unwritable_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        let blocker = temp.child("not_a_dir");
        blocker.write_str("file in the way").unwrap();

        let writer = Writer::new(blocker.path()).unwrap();
        let result = writer.write("demo", &sample_aggregate());

        assert!(result.unwrap_err().is_io());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_writer_removes_temp_file_on_failed_write() {
        let temp = assert_fs::TempDir::new().unwrap();
        let temp_file = temp.path().join("demo_knowledge.md.tmp");
        // Every write to /dev/full fails with ENOSPC.
        std::os::unix::fs::symlink("/dev/full", &temp_file).unwrap();

        let writer = Writer::new(temp.path()).unwrap();
        let result = writer.write("demo", &sample_aggregate());

        assert!(result.unwrap_err().is_io());
        assert!(fs::symlink_metadata(&temp_file).is_err());
        assert!(!temp.child("demo_knowledge.md").exists());
    }

    #[test]
    fn test_writer_removes_temp_file_on_failed_rename() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("demo_knowledge.md/occupied").write_str("x").unwrap();

        let writer = Writer::new(temp.path()).unwrap();
        let result = writer.write("demo", &sample_aggregate());

        assert!(result.unwrap_err().is_io());
        assert!(!temp.child("demo_knowledge.md.tmp").exists());
    }

    #[test]
    fn test_output_path() {
        let writer = Writer::new("/tmp/knowledge").unwrap();
        assert_eq!(
            writer.output_path("matrix-nio"),
            PathBuf::from("/tmp/knowledge/matrix-nio_knowledge.md")
        );
    }
}
