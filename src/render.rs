//! Per-file rendering into labeled Markdown blocks.

/// Extensions rendered inside a fenced code block.
const CODE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".jsx", ".tsx", ".json", ".yaml", ".yml", ".html", ".css", ".scss",
    ".less", ".java", ".c", ".cpp", ".go", ".rs", ".php", ".sh", ".bash", ".rb", ".pl", ".sql",
    ".toml", ".ini", ".cfg", ".conf", ".dockerfile",
];

/// One file's rendered text, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    relative_path: String,
    text: String,
}

impl RenderedBlock {
    /// Renders a file's content under a `## File:` header.
    ///
    /// Code-like extensions are fenced and tagged with a language derived
    /// from the extension; everything else is inserted verbatim.
    #[must_use]
    pub fn render(relative_path: &str, extension: &str, content: &str) -> Self {
        let header = header(relative_path);
        let text = match language_tag(extension) {
            Some(lang) => format!("{header}```{lang}\n{content}\n```\n\n"),
            None => format!("{header}{content}\n\n"),
        };

        Self {
            relative_path: relative_path.to_string(),
            text,
        }
    }

    /// Path relative to the repository root.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// The rendered Markdown.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Encoded length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.text.len() as u64
    }

    /// Always false: a block carries at least its header.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Returns the fence language for a code extension, `None` for text-like ones.
#[must_use]
pub fn language_tag(extension: &str) -> Option<String> {
    let ext = extension.to_ascii_lowercase();
    if !CODE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    let lang = ext.trim_start_matches('.');
    Some(match lang {
        "yml" => "yaml".to_string(),
        other => other.to_string(),
    })
}

/// Bytes a block adds on top of the file content itself.
///
/// Used to project a file's rendered size before reading it.
#[must_use]
pub fn rendering_overhead(relative_path: &str, extension: &str) -> u64 {
    let header_len = header(relative_path).len();
    let wrapper_len = match language_tag(extension) {
        // "```{lang}\n" + "\n```\n\n"
        Some(lang) => 3 + lang.len() + 1 + 1 + 3 + 2,
        None => 2,
    };
    (header_len + wrapper_len) as u64
}

fn header(relative_path: &str) -> String {
    format!("## File: {relative_path}\n\n")
}
