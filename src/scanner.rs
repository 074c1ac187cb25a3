use crate::{
    budget::SizeBudget,
    file::CandidateFile,
    filter::{Classification, InclusionPolicy, SkipReason},
    render::{rendering_overhead, RenderedBlock},
};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Breakdown of skipped files by reason.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    /// Excluded by file name
    pub excluded_name: usize,

    /// Extension not allowed
    pub unsupported_extension: usize,

    /// Larger than the per-file limit
    pub oversized: usize,

    /// Stat or read failures
    pub unreadable: usize,

    /// Dropped because the output budget ran out
    pub budget: usize,
}

impl SkipCounts {
    fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::ExcludedName => self.excluded_name += 1,
            SkipReason::UnsupportedExtension => self.unsupported_extension += 1,
            SkipReason::Oversized { .. } => self.oversized += 1,
            SkipReason::StatFailed(_) | SkipReason::ReadFailed(_) => self.unreadable += 1,
            SkipReason::BudgetExhausted => self.budget += 1,
        }
    }

    /// Sum of all skip reasons.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.excluded_name
            + self.unsupported_extension
            + self.oversized
            + self.unreadable
            + self.budget
    }
}

/// Result of aggregating one repository.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    /// Rendered blocks in discovery order
    pub blocks: Vec<RenderedBlock>,

    /// Encoded length of all blocks joined
    pub body_bytes: u64,

    /// Files included
    pub included: usize,

    /// Files skipped for any reason
    pub skipped: usize,

    /// Skips by reason
    pub skip_breakdown: SkipCounts,

    /// Whether traversal stopped early on the output budget
    pub budget_exhausted: bool,
}

impl Aggregate {
    /// Joins the blocks into the document body; empty when nothing qualified.
    #[must_use]
    pub fn body(&self) -> String {
        self.blocks.iter().map(RenderedBlock::as_str).collect()
    }

    /// Returns true if no file was included.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Mutable state for a single repository traversal.
#[derive(Debug, Default)]
struct TraversalState {
    aggregate: Aggregate,
}

impl TraversalState {
    fn skip(&mut self, candidate: &CandidateFile, reason: &SkipReason) {
        match reason {
            SkipReason::StatFailed(_) | SkipReason::ReadFailed(_) => {
                warn!("Skipping {}: {}", candidate.relative_path, reason);
            }
            _ => debug!("Skipping {}: {}", candidate.relative_path, reason),
        }
        self.aggregate.skipped += 1;
        self.aggregate.skip_breakdown.record(reason);
    }

    fn push(&mut self, block: RenderedBlock) {
        self.aggregate.body_bytes += block.len();
        self.aggregate.included += 1;
        self.aggregate.blocks.push(block);
    }

    fn halt(&mut self) {
        self.aggregate.budget_exhausted = true;
    }

    const fn is_halted(&self) -> bool {
        self.aggregate.budget_exhausted
    }
}

/// What the gatekeeper decided for one candidate.
enum Admission {
    Read { size: u64 },
    Skip(SkipReason),
    Halt,
}

/// Walks a repository and aggregates eligible files within a size budget.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    policy: InclusionPolicy,
    budget: SizeBudget,
}

impl Scanner {
    /// Creates a scanner for one repository.
    pub(crate) fn new(
        root_dir: impl Into<PathBuf>,
        policy: InclusionPolicy,
        budget: SizeBudget,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            policy,
            budget,
        }
    }

    /// Traverses the repository top-down and renders every admitted file.
    ///
    /// The files of a directory are visited before its subdirectories, and
    /// excluded directories are pruned before descent. Traversal ends for the
    /// whole repository as soon as the output budget trips. Per-file stat and
    /// read failures are counted as skips; traversal continues.
    pub(crate) fn scan(&self) -> Aggregate {
        debug!("Starting scan of {}", self.root_dir.display());

        let mut state = TraversalState::default();
        let walker = WalkDir::new(&self.root_dir)
            .follow_links(false)
            .sort_by(files_before_dirs)
            .into_iter()
            .filter_entry(|entry| !self.is_pruned(entry));

        for result in walker {
            if state.is_halted() {
                break;
            }

            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    continue;
                }
            };

            if !is_file_candidate(&entry) {
                continue;
            }

            trace!("Processing file: {}", entry.path().display());
            let candidate = CandidateFile::new(entry.path(), &self.root_dir);
            self.process(&candidate, &mut state);
        }

        let aggregate = state.aggregate;
        debug!(
            "Scan complete: {} included, {} skipped, {} bytes",
            aggregate.included, aggregate.skipped, aggregate.body_bytes
        );
        aggregate
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let pruned = entry
            .file_name()
            .to_str()
            .is_some_and(|name| self.policy.is_excluded_dir(name));
        if pruned {
            trace!("Pruning directory: {}", entry.path().display());
        }
        pruned
    }

    fn process(&self, candidate: &CandidateFile, state: &mut TraversalState) {
        let size = match self.admit(candidate, state.aggregate.body_bytes) {
            Admission::Read { size } => size,
            Admission::Skip(reason) => {
                state.skip(candidate, &reason);
                return;
            }
            Admission::Halt => {
                info!(
                    "Max output size reached before {}. Skipping remaining files.",
                    candidate.relative_path
                );
                state.skip(candidate, &SkipReason::BudgetExhausted);
                state.halt();
                return;
            }
        };

        let content = match candidate.read_lossy() {
            Ok(content) => content,
            Err(e) => {
                state.skip(candidate, &SkipReason::ReadFailed(e.to_string()));
                return;
            }
        };

        let block = RenderedBlock::render(&candidate.relative_path, &candidate.extension, &content);

        // Replacement characters can make the block larger than projected.
        if !self.budget.fits(state.aggregate.body_bytes, block.len()) {
            info!(
                "Rendered {} exceeds the remaining budget. Stopping.",
                candidate.relative_path
            );
            state.skip(candidate, &SkipReason::BudgetExhausted);
            state.halt();
            return;
        }

        trace!("Including {} ({} bytes on disk)", candidate.relative_path, size);
        state.push(block);

        if self.budget.is_exhausted(state.aggregate.body_bytes) {
            info!(
                "Max output size reached ({} bytes). Stopping.",
                self.budget.max_output_bytes()
            );
            state.halt();
        }
    }

    /// Applies the classifier, the per-file limit and the budget pre-check.
    fn admit(&self, candidate: &CandidateFile, running: u64) -> Admission {
        if let Classification::Exclude(reason) =
            self.policy.classify(&candidate.file_name, &candidate.extension)
        {
            return Admission::Skip(reason);
        }

        let size = match candidate.size_on_disk() {
            Ok(size) => size,
            Err(e) => return Admission::Skip(SkipReason::StatFailed(e.to_string())),
        };

        if let Err(reason) = self.budget.check_file_size(size) {
            return Admission::Skip(reason);
        }

        let projected =
            size + rendering_overhead(&candidate.relative_path, &candidate.extension);
        if !self.budget.fits(running, projected) {
            return Admission::Halt;
        }

        Admission::Read { size }
    }
}

/// Orders a directory's files ahead of its subdirectories, keeping the
/// native listing order within each group.
fn files_before_dirs(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type().is_dir().cmp(&b.file_type().is_dir())
}

/// Regular files, directly or behind a symlink.
///
/// Broken links stay candidates so they are counted as stat failures. FIFOs,
/// sockets and device nodes are never candidates.
fn is_file_candidate(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_symlink() {
        return fs::metadata(entry.path()).map_or(true, |meta| meta.is_file());
    }
    file_type.is_file()
}
