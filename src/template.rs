use crate::error::{Error, Result};
use serde::Serialize;
use tera::{Context, Tera};

const HEADER_TEMPLATE: &str = "knowledge.md";

/// Values substituted into the knowledge file header.
#[derive(Debug, Serialize)]
pub(crate) struct HeaderContext<'a> {
    pub(crate) repo_name: &'a str,
    pub(crate) files_included: usize,
    /// Body size in KiB, preformatted to one decimal
    pub(crate) total_size_kb: String,
}

impl<'a> HeaderContext<'a> {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn new(repo_name: &'a str, files_included: usize, body_bytes: u64) -> Self {
        Self {
            repo_name,
            files_included,
            total_size_kb: format!("{:.1}", body_bytes as f64 / 1024.0),
        }
    }
}

/// Renders the summary header that precedes the file blocks.
pub(crate) struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Creates a template engine with the built-in header registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in template fails to parse.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(
            HEADER_TEMPLATE,
            include_str!("../templates/knowledge.md.tera"),
        )
        .map_err(|e| Error::template(HEADER_TEMPLATE, &e))?;

        Ok(Self { tera })
    }

    /// Renders the header, always terminated by one blank line.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub(crate) fn render_header(&self, ctx: &HeaderContext<'_>) -> Result<String> {
        let context =
            Context::from_serialize(ctx).map_err(|e| Error::template(HEADER_TEMPLATE, &e))?;
        let rendered = self
            .tera
            .render(HEADER_TEMPLATE, &context)
            .map_err(|e| Error::template(HEADER_TEMPLATE, &e))?;

        Ok(format!("{}\n\n", rendered.trim_end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_contents() {
        let engine = TemplateEngine::new().unwrap();
        let header = engine
            .render_header(&HeaderContext::new("demo", 3, 2560))
            .unwrap();

        assert!(header.starts_with("# Repository: demo\n"));
        assert!(header.contains("**Repository Type**: GitHub Code Repository"));
        assert!(header.contains("**Purpose**: Knowledge base for LLM training on demo codebase"));
        assert!(header.contains("**Files Included**: 3 files"));
        assert!(header.contains("**Total Size**: ~2.5 KB"));
        assert!(header.contains("## Repository Overview\n"));
        assert!(header.contains("from the demo repository"));
        assert!(header.ends_with("---\n\n"));
    }

    #[test]
    fn test_header_does_not_escape_names() {
        let engine = TemplateEngine::new().unwrap();
        let header = engine
            .render_header(&HeaderContext::new("a&b<c>", 1, 10))
            .unwrap();
        assert!(header.starts_with("# Repository: a&b<c>\n"));
    }

    #[test]
    fn test_size_formatting() {
        assert_eq!(HeaderContext::new("r", 0, 0).total_size_kb, "0.0");
        assert_eq!(HeaderContext::new("r", 0, 1024).total_size_kb, "1.0");
        assert_eq!(HeaderContext::new("r", 0, 1536).total_size_kb, "1.5");
    }
}
